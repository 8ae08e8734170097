//! Object key validation.
//!
//! Keys are opaque strings to an object store, but a handful of shapes are
//! always a mistake when migrating named files: empty keys, keys that only
//! name a "directory", and keys the S3 API will refuse outright.

use crate::error::{ErrorKind, Result};

/// Maximum key length accepted by S3, in bytes (UTF-8).
pub const MAX_KEY_LENGTH: usize = 1024;

/// Validates an object key.
///
/// > **Note:** This does **not** normalize anything. Keys are stored exactly
/// >           as given; `a//b` and `a/b` are different objects.
///
/// # Returns
/// Returns the key if valid, or [`InvalidKey`](crate::error::ErrorKind::InvalidKey)
/// if invalid.
///
/// # Examples
///
/// ```
/// use gfs2s3_storage::validate_key;
/// // Valid keys
/// assert!(validate_key("images/cat.png").is_ok());
/// assert!(validate_key("images/nested/cat.png").is_ok());
/// // Invalid keys
/// assert!(validate_key("").is_err());
/// assert!(validate_key("images/").is_err());
/// assert!(validate_key("a\0b").is_err());
/// ```
pub fn validate(key: &str) -> Result<&str> {
    if key.is_empty() || key.ends_with('/') || key.len() > MAX_KEY_LENGTH {
        exn::bail!(ErrorKind::InvalidKey(key.to_string()));
    }
    // Null bytes are accepted by S3 but break nearly every tool that lists
    // the bucket afterwards.
    if key.as_bytes().contains(&0) {
        exn::bail!(ErrorKind::InvalidKey(key.to_string()));
    }
    Ok(key)
}
