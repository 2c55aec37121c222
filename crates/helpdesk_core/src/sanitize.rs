//! Input sanitization for chat messages.
//!
//! Raw input is trimmed, capped at [`MAX_MESSAGE_CHARS`] characters and then
//! HTML-escaped. The cap applies to the unescaped text, so stored content may
//! grow slightly from entity expansion but never carries more than
//! [`MAX_MESSAGE_CHARS`] characters of user text.

use crate::error::{HelpdeskError, HelpdeskResult};

/// Maximum number of user characters kept from a message.
pub const MAX_MESSAGE_CHARS: usize = 5000;

/// Maximum length of a chat subject.
pub const SUBJECT_MAX_CHARS: usize = 50;

/// Trim, cap and escape raw message input.
pub fn sanitize_input(raw: &str) -> String {
    let trimmed = raw.trim();
    let capped: String = trimmed.chars().take(MAX_MESSAGE_CHARS).collect();
    escape_html(&capped)
}

/// Sanitize input and reject it when nothing is left.
pub fn sanitize_message(raw: &str) -> HelpdeskResult<String> {
    let content = sanitize_input(raw);
    if content.is_empty() {
        return Err(HelpdeskError::validation("Message cannot be empty."));
    }
    Ok(content)
}

/// Escape `&`, `<`, `>`, `"` and `'`.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            other => out.push(other),
        }
    }
    out
}

/// Chat subject derived from the first message: a plain character prefix.
pub fn subject_from(message: &str) -> String {
    message.chars().take(SUBJECT_MAX_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unescape(input: &str) -> String {
        input
            .replace("&lt;", "<")
            .replace("&gt;", ">")
            .replace("&quot;", "\"")
            .replace("&#039;", "'")
            .replace("&amp;", "&")
    }

    #[test]
    fn test_script_tags_are_escaped() {
        let clean = sanitize_input("<script>alert(1)</script>Hello");
        assert!(clean.contains("Hello"));
        assert!(!clean.contains("<script>"));
        assert_eq!(clean, "&lt;script&gt;alert(1)&lt;/script&gt;Hello");
    }

    #[test]
    fn test_quotes_are_escaped() {
        assert_eq!(escape_html(r#"say "hi" & 'bye'"#), "say &quot;hi&quot; &amp; &#039;bye&#039;");
    }

    #[test]
    fn test_input_is_trimmed() {
        assert_eq!(sanitize_input("   I need help \n"), "I need help");
    }

    #[test]
    fn test_long_input_is_capped() {
        let raw = "a".repeat(MAX_MESSAGE_CHARS + 1);
        let clean = sanitize_input(&raw);
        assert_eq!(clean.chars().count(), MAX_MESSAGE_CHARS);
    }

    #[test]
    fn test_cap_applies_before_escaping() {
        let raw = "<".repeat(MAX_MESSAGE_CHARS + 1);
        let clean = sanitize_input(&raw);
        assert_eq!(unescape(&clean).chars().count(), MAX_MESSAGE_CHARS);
    }

    #[test]
    fn test_multibyte_input_is_capped_by_chars() {
        let raw = "é".repeat(MAX_MESSAGE_CHARS + 10);
        assert_eq!(sanitize_input(&raw).chars().count(), MAX_MESSAGE_CHARS);
    }

    #[test]
    fn test_empty_message_is_rejected() {
        let err = sanitize_message("   \t ").unwrap_err();
        assert_eq!(err, HelpdeskError::validation("Message cannot be empty."));
    }

    #[test]
    fn test_subject_is_prefix() {
        let message = "My printer has stopped working after the latest driver update and now";
        let subject = subject_from(message);
        assert_eq!(subject, "My printer has stopped working after the latest dr");
        assert_eq!(subject.chars().count(), SUBJECT_MAX_CHARS);
        assert_eq!(subject_from("I need help"), "I need help");
    }
}
