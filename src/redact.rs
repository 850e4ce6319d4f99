//! Pattern-based scrubbing of identifying or secret-looking text.
//!
//! Used before free text reaches a log line or an audit record.

use std::sync::LazyLock;

use regex::Regex;

/// Patterns applied in order; each entry is (regex, replacement).
///
/// GUIDs run before the generic long-token pattern, which would
/// otherwise swallow them.
const PATTERNS: &[(&str, &str)] = &[
    (
        r"(?i)\b[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}\b",
        "[guid]",
    ),
    (
        r"(?i)[a-z0-9._%+\-]+@[a-z0-9\-]+(?:\.[a-z0-9\-]+)*\.[a-z]{2,}",
        "[email]",
    ),
    (r"(?i)\b(bearer|basic)\s+[A-Za-z0-9\-._~+/]+=*", "$1 [token]"),
    (
        r#"(?i)\b(password|passwd|pwd|secret|token|api[_-]?key|otp)(\s*[=:]\s*)[^\s&'",;]+"#,
        "$1$2[redacted]",
    ),
    (r"\b[A-Za-z0-9_\-]{32,}\b", "[token]"),
];

static COMPILED: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    PATTERNS
        .iter()
        .filter_map(|(pattern, replacement)| match Regex::new(pattern) {
            Ok(re) => Some((re, *replacement)),
            Err(e) => {
                tracing::error!(%pattern, error = %e, "invalid redaction pattern");
                None
            }
        })
        .collect()
});

/// Return `text` with emails, tokens and GUIDs replaced by placeholders.
pub fn redact(text: &str) -> String {
    let mut out = text.to_string();
    for (re, replacement) in COMPILED.iter() {
        if re.is_match(&out) {
            out = re.replace_all(&out, *replacement).into_owned();
        }
    }
    out
}
