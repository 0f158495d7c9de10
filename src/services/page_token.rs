//! Opaque tokens standing in for page identifiers in visit URLs.
//!
//! A token is `<pad-length>:<base64url(ciphertext)>`. The page id is
//! zero-padded to the cipher block size and every block is encrypted on its
//! own; the pad length travels in clear so decoding can strip it again. This
//! only deters casual URL editing.

use std::{fs, io::ErrorKind, path::Path};

use aes::{
    Aes128,
    cipher::{BlockDecrypt, BlockEncrypt, KeyInit, generic_array::GenericArray},
};
use anyhow::{Context, bail};
use base64::{Engine, engine::general_purpose::URL_SAFE};
use percent_encoding::percent_decode_str;
use thiserror::Error;
use tracing::info;

/// Length in bytes of the symmetric key.
pub const PAGE_KEY_LENGTH: usize = 16;
const BLOCK_SIZE: usize = 16;

/// Why a token could not be turned back into a page id.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    /// The `<pad>:` part is missing.
    #[error("token has no `<pad>:` prefix")]
    MissingPrefix,
    /// The pad length is not a number, or too large for the payload.
    #[error("token pad length `{0}` is invalid")]
    BadPadding(String),
    /// The payload is not base64url.
    #[error("token payload is not valid base64")]
    BadEncoding,
    /// The payload is empty or not a whole number of blocks.
    #[error("token payload of {0} bytes is not block aligned")]
    Misaligned(usize),
    /// The decoded bytes are not text.
    #[error("decoded page id is not valid UTF-8")]
    NotUtf8,
    /// Empty page ids cannot be encoded.
    #[error("page id must not be empty")]
    EmptyPage,
}

/// Symmetric codec for page tokens.
#[derive(Clone)]
pub struct PageTokenCodec {
    cipher: Aes128,
}

impl PageTokenCodec {
    /// Codec keyed with `key`.
    pub fn new(key: &[u8; PAGE_KEY_LENGTH]) -> Self {
        Self {
            cipher: Aes128::new(GenericArray::from_slice(key)),
        }
    }

    /// Encode `page` into an opaque token.
    pub fn encrypt(&self, page: &str) -> Result<String, TokenError> {
        if page.is_empty() {
            return Err(TokenError::EmptyPage);
        }
        let (mut buffer, padding) = pad(page.as_bytes());
        for block in buffer.chunks_exact_mut(BLOCK_SIZE) {
            self.cipher.encrypt_block(GenericArray::from_mut_slice(block));
        }
        Ok(format!("{padding}:{}", URL_SAFE.encode(&buffer)))
    }

    /// Decode a token produced by [`PageTokenCodec::encrypt`].
    pub fn decrypt(&self, token: &str) -> Result<String, TokenError> {
        let (padding, payload) = token.split_once(':').ok_or(TokenError::MissingPrefix)?;
        let padding: usize = padding
            .parse()
            .ok()
            .filter(|padding| *padding < BLOCK_SIZE)
            .ok_or_else(|| TokenError::BadPadding(padding.to_string()))?;

        let mut buffer = URL_SAFE
            .decode(payload)
            .map_err(|_| TokenError::BadEncoding)?;
        if buffer.is_empty() || buffer.len() % BLOCK_SIZE != 0 {
            return Err(TokenError::Misaligned(buffer.len()));
        }
        if padding >= buffer.len() {
            return Err(TokenError::BadPadding(padding.to_string()));
        }

        for block in buffer.chunks_exact_mut(BLOCK_SIZE) {
            self.cipher.decrypt_block(GenericArray::from_mut_slice(block));
        }
        buffer.truncate(buffer.len() - padding);
        String::from_utf8(buffer).map_err(|_| TokenError::NotUtf8)
    }

    /// Link to the visit endpoint for `page`.
    pub fn visit_url(&self, page: &str) -> Result<String, TokenError> {
        Ok(format!("/visit?page={}", self.encrypt(page)?))
    }
}

/// Undo query escaping left in a decrypted page id: `+` becomes a space and
/// `%XX` sequences are decoded.
///
/// Page ids are taken from the encyclopedia's own links, which are escaped.
pub fn unescape_page(raw: &str) -> Result<String, TokenError> {
    let spaced = raw.replace('+', " ");
    let page = percent_decode_str(&spaced)
        .decode_utf8()
        .map_err(|_| TokenError::NotUtf8)?
        .into_owned();
    if page.is_empty() {
        return Err(TokenError::EmptyPage);
    }
    Ok(page)
}

/// Right-pad with zeros to a whole number of blocks.
fn pad(input: &[u8]) -> (Vec<u8>, usize) {
    let padding = (BLOCK_SIZE - input.len() % BLOCK_SIZE) % BLOCK_SIZE;
    let mut padded = Vec::with_capacity(input.len() + padding);
    padded.extend_from_slice(input);
    padded.resize(input.len() + padding, 0);
    (padded, padding)
}

/// Read the hex-encoded key at `path`, creating a random one on first start.
pub fn load_or_create_key(path: &Path) -> anyhow::Result<[u8; PAGE_KEY_LENGTH]> {
    match fs::read_to_string(path) {
        Ok(contents) => {
            let bytes = hex::decode(contents.trim())
                .with_context(|| format!("page key at {} is not hex", path.display()))?;
            let Ok(key) = <[u8; PAGE_KEY_LENGTH]>::try_from(bytes.as_slice()) else {
                bail!(
                    "page key at {} must be {PAGE_KEY_LENGTH} bytes, found {}",
                    path.display(),
                    bytes.len()
                );
            };
            info!(path = %path.display(), "loaded page token key");
            Ok(key)
        }
        Err(err) if err.kind() == ErrorKind::NotFound => {
            let key: [u8; PAGE_KEY_LENGTH] = rand::random();
            if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
                fs::create_dir_all(parent)
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
            fs::write(path, hex::encode(key))
                .with_context(|| format!("writing page key to {}", path.display()))?;
            info!(path = %path.display(), "generated new page token key");
            Ok(key)
        }
        Err(err) => Err(err).with_context(|| format!("reading page key at {}", path.display())),
    }
}
