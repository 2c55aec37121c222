//! Transfer-intent detection.
//!
//! A keyword heuristic deciding whether a user message asks for a human.
//! Matching is a case-insensitive substring search, so compound words that
//! contain a keyword ("agents", "personally") match as well.

/// Phrases that signal a request for a human.
pub const TRANSFER_KEYWORDS: [&str; 14] = [
    "human",
    "agent",
    "person",
    "talk to someone",
    "transfer",
    "representative",
    "speak to",
    "customer service",
    "real person",
    "not helping",
    "frustrated",
    "escalate",
    "supervisor",
    "manager",
];

/// First keyword found in the message, if any.
pub fn matched_keyword(message: &str) -> Option<&'static str> {
    let lower = message.trim().to_lowercase();
    TRANSFER_KEYWORDS
        .iter()
        .copied()
        .find(|keyword| lower.contains(keyword))
}

/// Whether the message should hand the chat over to the agent pool.
pub fn should_transfer_to_human(message: &str) -> bool {
    matched_keyword(message).is_some()
}
