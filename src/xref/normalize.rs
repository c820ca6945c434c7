//! Canonical form of OE identifiers used as resolution index keys.

/// Canonicalise a raw identifier for equality comparison.
///
/// Two-character literal escape sequences (`\n`, `\r`, `\t` written as a
/// backslash plus a letter) are stripped first in a single left-to-right
/// pass, then every character outside `[A-Za-z0-9]` is dropped. Case is
/// preserved.
pub fn normalize(raw: &str) -> String {
    if raw.is_empty() {
        return String::new();
    }

    strip_literal_escapes(raw)
        .chars()
        .filter(|ch| ch.is_ascii_alphanumeric())
        .collect()
}

fn strip_literal_escapes(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '\\' && matches!(chars.peek(), Some('n' | 'r' | 't')) {
            chars.next();
            continue;
        }
        out.push(ch);
    }
    out
}
