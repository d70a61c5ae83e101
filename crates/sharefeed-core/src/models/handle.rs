//! Node and user handles

use std::fmt;
use std::str::FromStr;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Significant bytes in a node handle.
pub const NODE_HANDLE_SIZE: usize = 6;
/// Significant bytes in a user handle.
pub const USER_HANDLE_SIZE: usize = 8;

const UNDEF_TEXT: &str = "UNDEF";

/// Opaque 64-bit identifier of a node or a user account.
///
/// The text form is the unpadded URL-safe base64 of the little-endian bytes:
/// 8 characters for node handles, 11 for user handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Handle(u64);

impl Handle {
    /// Sentinel for a missing or unknown handle
    pub const UNDEF: Self = Self(u64::MAX);

    /// Wrap a raw handle value
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Raw handle value
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Whether this is the undefined sentinel
    #[must_use]
    pub const fn is_undef(self) -> bool {
        self.0 == u64::MAX
    }

    /// Encode the first `size` little-endian bytes
    #[must_use]
    pub fn to_base64(self, size: usize) -> String {
        let bytes = self.0.to_le_bytes();
        URL_SAFE_NO_PAD.encode(&bytes[..size.min(bytes.len())])
    }

    /// Decode a handle of exactly `size` bytes
    pub fn from_base64(text: &str, size: usize) -> Result<Self> {
        let decoded = URL_SAFE_NO_PAD
            .decode(text.trim())
            .map_err(|error| Error::InvalidInput(format!("handle '{text}': {error}")))?;
        if decoded.len() != size || size > 8 {
            return Err(Error::InvalidInput(format!(
                "handle '{text}' has {} bytes, expected {size}",
                decoded.len()
            )));
        }

        let mut bytes = [0u8; 8];
        bytes[..size].copy_from_slice(&decoded);
        Ok(Self(u64::from_le_bytes(bytes)))
    }
}

impl Default for Handle {
    fn default() -> Self {
        Self::UNDEF
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_undef() {
            return f.write_str(UNDEF_TEXT);
        }
        let size = if self.0 >> 48 == 0 {
            NODE_HANDLE_SIZE
        } else {
            USER_HANDLE_SIZE
        };
        f.write_str(&self.to_base64(size))
    }
}

impl FromStr for Handle {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s == UNDEF_TEXT {
            return Ok(Self::UNDEF);
        }
        // 8 chars encode 6 bytes, 11 chars encode 8 bytes
        match s.len() {
            8 => Self::from_base64(s, NODE_HANDLE_SIZE),
            11 => Self::from_base64(s, USER_HANDLE_SIZE),
            _ => Err(Error::InvalidInput(format!("handle '{s}' has invalid length"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_handle_text_form() {
        let handle = Handle::new(0x0000_1234_5678_9abc);
        let text = handle.to_string();
        assert_eq!(text.len(), 8);
        assert_eq!(text.parse::<Handle>().unwrap(), handle);
    }

    #[test]
    fn test_user_handle_text_form() {
        let handle = Handle::new(0x0102_0304_0506_0708);
        let text = handle.to_string();
        assert_eq!(text.len(), 11);
        assert_eq!(text.parse::<Handle>().unwrap(), handle);
    }

    #[test]
    fn test_undef_display_and_parse() {
        assert_eq!(Handle::UNDEF.to_string(), "UNDEF");
        assert!("UNDEF".parse::<Handle>().unwrap().is_undef());
        assert!(Handle::default().is_undef());
    }

    #[test]
    fn test_from_base64_rejects_wrong_width() {
        let text = Handle::new(7).to_base64(USER_HANDLE_SIZE);
        assert!(Handle::from_base64(&text, NODE_HANDLE_SIZE).is_err());
        assert!("abc".parse::<Handle>().is_err());
        assert!("!!!!!!!!".parse::<Handle>().is_err());
    }
}
