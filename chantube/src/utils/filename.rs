//! Title to filename conversion.
//!
//! Local items are named after the sanitized item title, and the same
//! sanitization is applied to remote titles during deduplication, so both
//! sides must go through [`sanitize_title`].

/// Characters that cannot appear in a filename on at least one platform.
const INVALID_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Windows reserved filenames (case-insensitive).
const WINDOWS_RESERVED_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// Turn an item title (or channel name) into a filesystem-safe stem.
///
/// Invalid characters and control characters become spaces, runs of
/// whitespace collapse to a single space, and leading/trailing spaces and
/// dots are removed. An empty result becomes `"unnamed"`.
///
/// ```
/// use chantube::utils::filename::sanitize_title;
///
/// assert_eq!(sanitize_title("What is 1/2?"), "What is 1 2");
/// assert_eq!(sanitize_title("a  <b>  c"), "a b c");
/// assert_eq!(sanitize_title("???"), "unnamed");
/// ```
pub fn sanitize_title(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut pending_space = false;

    for c in input.chars() {
        if c.is_control() || c.is_whitespace() || INVALID_CHARS.contains(&c) {
            pending_space = !result.is_empty();
        } else {
            if pending_space {
                result.push(' ');
                pending_space = false;
            }
            result.push(c);
        }
    }

    let trimmed = result.trim_matches(|c| c == ' ' || c == '.');
    if trimmed.is_empty() {
        return "unnamed".to_string();
    }

    let upper = trimmed.to_uppercase();
    for reserved in WINDOWS_RESERVED_NAMES {
        if upper == *reserved || upper.starts_with(&format!("{}.", reserved)) {
            return format!("_{}", trimmed);
        }
    }

    trimmed.to_string()
}
