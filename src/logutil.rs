//! Logging utilities for sanitizing remote-provided strings so logs stay single-line.

/// Escape a string for single-line logging:
/// - `\n` => `\\n`
/// - `\r` => `\\r`
/// - `\t` => `\\t`
/// - backslash => `\\\\`
///
/// Truncates very long strings with an ellipsis to cap log noise.
pub fn escape_log(s: &str) -> String {
    const MAX_PREVIEW: usize = 300;
    let mut out = String::with_capacity(s.len().min(MAX_PREVIEW) + 8);
    for (count, ch) in s.chars().enumerate() {
        if count >= MAX_PREVIEW {
            out.push('…');
            break;
        }
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                use std::fmt::Write;
                let _ = write!(&mut out, "\\x{:02X}", c as u32);
            }
            c => out.push(c),
        }
    }
    out
}

/// Abbreviate a transaction hash or address as `0x1234…abcd`.
pub fn short_hash(hash: &str) -> String {
    let chars: Vec<char> = hash.chars().collect();
    if chars.len() <= 12 {
        return escape_log(hash);
    }
    let head: String = chars[..6].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}…{}", escape_log(&head), escape_log(&tail))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_newlines_and_truncates() {
        let s = "Line1\nLine2\r\tEnd";
        assert_eq!(escape_log(s), "Line1\\nLine2\\r\\tEnd");
        let long = "x".repeat(400);
        assert!(escape_log(&long).ends_with('…'));
    }

    #[test]
    fn shortens_long_hashes_only() {
        assert_eq!(short_hash("0xabc"), "0xabc");
        let h = format!("0x{:064x}", 0xdead_u64);
        assert_eq!(short_hash(&h), "0x0000…dead");
    }
}
