//! Content-moderation classification of remote error messages
//!
//! The same predicate is applied to submission rejections (not billed) and to
//! failures reported while polling (already billed), so both paths give the same
//! answer for the same message.

/// Substrings that mark an error message as a moderation rejection
pub const MODERATION_KEYWORDS: &[&str] = &[
    "moderation",
    "content policy",
    "violates",
    "inappropriate",
    "blocked",
    "prohibited",
];

/// Returns true if the message looks like a content-moderation rejection
///
/// Matching is case-insensitive. Absent or empty messages are never moderation.
pub fn is_moderation_error(message: Option<&str>) -> bool {
    let Some(message) = message else {
        return false;
    };
    if message.trim().is_empty() {
        return false;
    }

    let lowered = message.to_lowercase();
    MODERATION_KEYWORDS
        .iter()
        .any(|keyword| lowered.contains(keyword))
}
