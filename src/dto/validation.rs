//! Validation helpers for DTOs.

use validator::ValidationError;

/// Longest accepted player name, in characters.
pub const MAX_PLAYER_NAME_CHARS: usize = 64;

/// Validates that a player name is non-blank and at most 64 characters.
///
/// # Examples
///
/// ```ignore
/// validate_player_name("ada")   // Ok
/// validate_player_name("   ")   // Err - blank
/// validate_player_name("")      // Err - empty
/// ```
pub fn validate_player_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        let mut err = ValidationError::new("player_name_blank");
        err.message = Some("Player name must not be blank".into());
        return Err(err);
    }

    let length = name.chars().count();
    if length > MAX_PLAYER_NAME_CHARS {
        let mut err = ValidationError::new("player_name_length");
        err.message = Some(
            format!("Player name must be at most {MAX_PLAYER_NAME_CHARS} characters (got {length})")
                .into(),
        );
        return Err(err);
    }

    Ok(())
}

/// Validates that a page title is non-blank.
pub fn validate_page(page: &str) -> Result<(), ValidationError> {
    if page.trim().is_empty() {
        let mut err = ValidationError::new("page_blank");
        err.message = Some("Page must not be blank".into());
        return Err(err);
    }
    Ok(())
}
