//! Filename sanitizing

/// Characters that are not allowed in a filename on any supported platform
const INVALID_CHARS: [char; 9] = ['\\', '/', '*', '?', ':', '"', '<', '>', '|'];

/// Remove characters that cannot appear in a filename.
///
/// Only the characters in `\ / * ? : " < > |` are dropped. Everything else,
/// including whitespace and non-ASCII letters, is kept in its original order.
pub fn sanitize(text: &str) -> String {
    text.chars().filter(|c| !INVALID_CHARS.contains(c)).collect()
}
