//! Input validation for client lines.
//!
//! Checks run in a fixed order and stop at the first failure:
//! 1. raw byte length (at most [`MAX_LINE_BYTES`])
//! 2. surrounding whitespace is trimmed
//! 3. every remaining character must be printable
//! 4. the bytes must be valid UTF-8
//!
//! Accepted lines are returned trimmed with a single trailing newline.

use std::fmt;

/// Largest raw line, terminator included, that is accepted.
pub const MAX_LINE_BYTES: usize = 1024;

/// Why a line was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    TooLong,
    NonPrintable,
    InvalidEncoding,
}

impl Rejection {
    /// Client-visible message for this rejection.
    pub fn message(self) -> &'static str {
        match self {
            Rejection::TooLong => "Message cannot be longer than 1024 bytes!",
            Rejection::NonPrintable => "Message contains non-printable characters!",
            Rejection::InvalidEncoding => "Message contains invalid UTF-8 characters!",
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Result of validating one raw line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    /// Trimmed text followed by exactly one `\n`.
    Accepted(String),
    Rejected(Rejection),
}

/// Validate a raw line as read from the socket.
pub fn validate(raw: &[u8]) -> ValidationOutcome {
    if raw.len() > MAX_LINE_BYTES {
        return ValidationOutcome::Rejected(Rejection::TooLong);
    }

    // Invalid sequences decode to U+FFFD here, which is printable, so the
    // encoding check below still gets to report them.
    let lossy = String::from_utf8_lossy(raw);
    if lossy.trim().chars().any(char::is_control) {
        return ValidationOutcome::Rejected(Rejection::NonPrintable);
    }

    match std::str::from_utf8(raw) {
        Ok(text) => {
            let trimmed = text.trim();
            let mut line = String::with_capacity(trimmed.len() + 1);
            line.push_str(trimmed);
            line.push('\n');
            ValidationOutcome::Accepted(line)
        }
        Err(_) => ValidationOutcome::Rejected(Rejection::InvalidEncoding),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn accepted(text: &str) -> ValidationOutcome {
        ValidationOutcome::Accepted(text.to_string())
    }

    #[test]
    fn test_plain_line() {
        assert_eq!(validate(b"hello world\n"), accepted("hello world\n"));
    }

    #[test]
    fn test_trims_surrounding_whitespace() {
        assert_eq!(validate(b"   spaced out \t\r\n"), accepted("spaced out\n"));
    }

    #[test]
    fn test_blank_line() {
        assert_eq!(validate(b"\n"), accepted("\n"));
        assert_eq!(validate(b"   \r\n"), accepted("\n"));
    }

    #[test]
    fn test_too_long() {
        let line = vec![b'A'; 2048];
        assert_eq!(
            validate(&line),
            ValidationOutcome::Rejected(Rejection::TooLong)
        );
    }

    #[test]
    fn test_length_boundary() {
        let mut line = vec![b'A'; MAX_LINE_BYTES - 1];
        line.push(b'\n');
        assert!(matches!(validate(&line), ValidationOutcome::Accepted(_)));

        let mut line = vec![b'A'; MAX_LINE_BYTES];
        line.push(b'\n');
        assert_eq!(
            validate(&line),
            ValidationOutcome::Rejected(Rejection::TooLong)
        );
    }

    #[test]
    fn test_too_long_wins_over_bad_bytes() {
        let line = vec![0u8; 2000];
        assert_eq!(
            validate(&line),
            ValidationOutcome::Rejected(Rejection::TooLong)
        );
    }

    #[test]
    fn test_nul_byte_is_non_printable() {
        assert_eq!(
            validate(b"Hello\x00World\n"),
            ValidationOutcome::Rejected(Rejection::NonPrintable)
        );
    }

    #[test]
    fn test_inner_tab_is_non_printable() {
        assert_eq!(
            validate(b"a\tb\n"),
            ValidationOutcome::Rejected(Rejection::NonPrintable)
        );
    }

    #[test]
    fn test_invalid_utf8() {
        assert_eq!(
            validate(&[0xff, 0xfe, 0xfd, b'\n']),
            ValidationOutcome::Rejected(Rejection::InvalidEncoding)
        );
    }

    #[test]
    fn test_control_checked_before_encoding() {
        assert_eq!(
            validate(&[0xff, 0x07, b'x', b'\n']),
            ValidationOutcome::Rejected(Rejection::NonPrintable)
        );
    }

    #[test]
    fn test_multibyte_text_accepted() {
        assert_eq!(validate("héllo wörld ✓\n".as_bytes()), accepted("héllo wörld ✓\n"));
    }

    #[test]
    fn test_revalidating_is_stable() {
        let first = match validate(b"  stable input  \n") {
            ValidationOutcome::Accepted(text) => text,
            other => panic!("unexpected: {:?}", other),
        };
        assert_eq!(validate(first.as_bytes()), ValidationOutcome::Accepted(first));
    }

    #[test]
    fn test_rejection_messages() {
        assert_eq!(
            Rejection::TooLong.to_string(),
            "Message cannot be longer than 1024 bytes!"
        );
        assert_eq!(
            Rejection::NonPrintable.to_string(),
            "Message contains non-printable characters!"
        );
        assert_eq!(
            Rejection::InvalidEncoding.to_string(),
            "Message contains invalid UTF-8 characters!"
        );
    }
}
