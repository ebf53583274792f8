//! Shared text helpers.

/// Default width for titles shown in grids.
pub const DEFAULT_TRUNCATE: usize = 80;

/// First line of a (commit) message.
pub fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or("")
}

/// Truncate to at most `max` characters, ending in `...` when shortened.
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let keep = max.saturating_sub(3);
    let mut out: String = text.chars().take(keep).collect();
    out.push_str("...");
    out
}

/// Local part of an email address (`dev@example.com` → `dev`).
pub fn email_head(email: &str) -> &str {
    email.split('@').next().unwrap_or(email)
}
