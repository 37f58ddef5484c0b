//! Credential extraction from request metadata.

const BEARER_PREFIX: &str = "Bearer ";

/// Picks the bearer credential for a connection request.
///
/// The `Authorization` header wins when it carries a `Bearer` token.
/// Otherwise the `token` query parameter is used, with an optional
/// `Bearer ` prefix stripped.
pub fn extract_token(authorization: Option<&str>, query_token: Option<&str>) -> Option<String> {
    if let Some(token) = authorization
        .and_then(|h| h.strip_prefix(BEARER_PREFIX))
        .map(str::trim)
        .filter(|t| !t.is_empty())
    {
        return Some(token.to_string());
    }

    query_token
        .map(|t| t.strip_prefix(BEARER_PREFIX).unwrap_or(t).trim())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_preferred() {
        assert_eq!(
            extract_token(Some("Bearer abc"), Some("xyz")).as_deref(),
            Some("abc")
        );
    }

    #[test]
    fn test_query_fallback_strips_prefix() {
        assert_eq!(
            extract_token(None, Some("Bearer xyz")).as_deref(),
            Some("xyz")
        );
        assert_eq!(extract_token(None, Some("xyz")).as_deref(), Some("xyz"));
    }

    #[test]
    fn test_non_bearer_header_falls_back() {
        assert_eq!(
            extract_token(Some("Basic Zm9v"), Some("xyz")).as_deref(),
            Some("xyz")
        );
    }

    #[test]
    fn test_missing() {
        assert_eq!(extract_token(None, None), None);
        assert_eq!(extract_token(Some("Bearer "), Some("")), None);
    }
}
