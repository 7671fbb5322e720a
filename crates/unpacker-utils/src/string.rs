/// Quotes `value` for a POSIX shell.
///
/// Strings made only of characters the shell never interprets are returned
/// as-is; everything else is wrapped in single quotes with embedded quotes
/// spelled `'\''`.
///
/// ```
/// use unpacker_utils::string::shell_quote;
///
/// assert_eq!(shell_quote("/opt/app"), "/opt/app");
/// assert_eq!(shell_quote("it's here"), r#"'it'\''s here'"#);
/// ```
pub fn shell_quote(value: &str) -> String {
    let safe = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | '.' | '-' | '_' | '+' | ':' | '=' | ','));
    if safe {
        return value.to_string();
    }
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Lowercases and keeps ASCII letters only.
///
/// Used to compare an application name against executable file names while
/// ignoring separators, digits and version suffixes.
pub fn simplify(value: &str) -> String {
    value
        .chars()
        .filter(char::is_ascii_alphabetic)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Lowercases `value` and drops everything outside `[a-z0-9_-]`.
///
/// Returns `None` when nothing survives so callers can choose a fallback.
pub fn sanitize_name(value: &str) -> Option<String> {
    let cleaned: String = value
        .chars()
        .map(|c| c.to_ascii_lowercase())
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '_' | '-'))
        .collect();
    (!cleaned.is_empty()).then_some(cleaned)
}
