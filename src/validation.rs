//! Input validation for identities, file names and persisted JSON.

/// Identity validation errors
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum IdentityError {
    #[error("Identity is empty")]
    Empty,

    #[error("Identity is too long (maximum {max} characters)")]
    TooLong { max: usize },

    #[error("Identity must be a 0x-prefixed hex address")]
    NotHex,
}

#[derive(Debug, PartialEq, Eq)]
pub enum SecurityError {
    /// Content exceeds maximum allowed size
    FileSizeExceeded { limit: usize },

    /// JSON format is invalid or malformed
    InvalidFormat,
}

impl std::fmt::Display for SecurityError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SecurityError::FileSizeExceeded { limit } => {
                write!(f, "File size exceeds limit ({} bytes)", limit)
            }
            SecurityError::InvalidFormat => write!(f, "Invalid format"),
        }
    }
}

impl std::error::Error for SecurityError {}

/// Longest accepted identity: `0x` plus a 252-bit felt in hex.
pub const MAX_IDENTITY_LEN: usize = 66;

/// Generate a safe filename from an arbitrary name using URL encoding
pub fn safe_filename(name: &str) -> String {
    use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
    utf8_percent_encode(name, NON_ALPHANUMERIC).to_string()
}

/// Validate an account identity and return it normalized to lowercase.
pub fn validate_identity(identity: &str) -> Result<String, IdentityError> {
    let trimmed = identity.trim();
    if trimmed.is_empty() {
        return Err(IdentityError::Empty);
    }
    if trimmed.len() > MAX_IDENTITY_LEN {
        return Err(IdentityError::TooLong {
            max: MAX_IDENTITY_LEN,
        });
    }
    let lower = trimmed.to_ascii_lowercase();
    match lower.strip_prefix("0x") {
        Some(hex) if !hex.is_empty() && hex.chars().all(|c| c.is_ascii_hexdigit()) => Ok(lower),
        _ => Err(IdentityError::NotHex),
    }
}

/// Parse JSON with a size cap
pub fn secure_json_parse<T>(content: &str, max_bytes: usize) -> Result<T, SecurityError>
where
    T: serde::de::DeserializeOwned,
{
    if content.len() > max_bytes {
        return Err(SecurityError::FileSizeExceeded { limit: max_bytes });
    }

    // Interrupted writes have been seen to leave leading NULs; valid JSON never starts with one.
    let normalized = content.trim_start_matches('\0');

    serde_json::from_str(normalized).map_err(|_| SecurityError::InvalidFormat)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_filename() {
        assert_eq!(safe_filename("echoes-store"), "echoes%2Dstore");
        assert_eq!(safe_filename("../etc"), "%2E%2E%2Fetc");
        assert_eq!(safe_filename("abc123"), "abc123");
    }

    #[test]
    fn test_identity_validation() {
        assert_eq!(validate_identity(" 0xABC "), Ok("0xabc".to_string()));
        assert_eq!(validate_identity(""), Err(IdentityError::Empty));
        assert_eq!(validate_identity("0x"), Err(IdentityError::NotHex));
        assert_eq!(validate_identity("alice"), Err(IdentityError::NotHex));
        assert_eq!(validate_identity("0xgg"), Err(IdentityError::NotHex));
        let long = format!("0x{}", "1".repeat(70));
        assert_eq!(
            validate_identity(&long),
            Err(IdentityError::TooLong {
                max: MAX_IDENTITY_LEN
            })
        );
    }

    #[test]
    fn test_secure_json_parse() {
        let v: serde_json::Value = secure_json_parse("\0\0{\"a\":1}", 100).unwrap();
        assert_eq!(v["a"], 1);
        assert_eq!(
            secure_json_parse::<serde_json::Value>("{}", 1),
            Err(SecurityError::FileSizeExceeded { limit: 1 })
        );
        assert_eq!(
            secure_json_parse::<serde_json::Value>("{", 100),
            Err(SecurityError::InvalidFormat)
        );
    }
}
