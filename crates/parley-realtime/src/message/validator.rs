//! Chat content validation and sanitization.

use parley_core::error::AppError;
use parley_core::result::AppResult;

/// Trim, bound and HTML-escape raw chat content.
///
/// The length limit counts characters of the trimmed input, before escaping.
pub fn sanitize_content(raw: &str, max_chars: usize) -> AppResult<String> {
    let content = raw.trim();

    if content.is_empty() {
        return Err(AppError::validation("Message content is empty"));
    }

    if content.chars().count() > max_chars {
        return Err(AppError::validation(format!(
            "Message is too long (max {max_chars} characters)"
        )));
    }

    Ok(escape_html(content))
}

/// Escape the five HTML-significant characters.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            other => out.push(other),
        }
    }
    out
}
