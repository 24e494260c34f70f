use axum::http::{header, HeaderMap, HeaderValue};

/// `None` allow-list or a `"*"` entry allows every origin. Requests
/// without an `Origin` header are always allowed.
pub fn is_origin_allowed(origin: Option<&str>, allowed_origins: Option<&[String]>) -> bool {
    let (Some(origin), Some(allowed)) = (origin, allowed_origins) else {
        return true;
    };
    allowed.iter().any(|entry| entry == "*" || entry == origin)
}

/// CORS headers for an allowed origin. Empty unless both an origin and an
/// allow-list are present.
pub fn cors_headers(origin: Option<&str>, allowed_origins: Option<&[String]>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    let (Some(origin), Some(allowed)) = (origin, allowed_origins) else {
        return headers;
    };
    if !is_origin_allowed(Some(origin), Some(allowed)) {
        return headers;
    }

    if allowed.iter().any(|entry| entry == "*") {
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        );
    } else {
        let Ok(value) = HeaderValue::from_str(origin) else {
            return headers;
        };
        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, value);
        headers.insert(header::VARY, HeaderValue::from_static("Origin"));
    }
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("POST, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type, Authorization"),
    );
    headers
}

pub fn apply_cors(target: &mut HeaderMap, origin: Option<&str>, allowed_origins: Option<&[String]>) {
    target.extend(cors_headers(origin, allowed_origins));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(entries: &[&str]) -> Vec<String> {
        entries.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn allow_list_semantics() {
        let exact = list(&["https://app.example"]);
        let wildcard = list(&["*"]);
        assert!(is_origin_allowed(Some("https://evil.example"), None));
        assert!(is_origin_allowed(None, Some(&exact)));
        assert!(is_origin_allowed(Some("https://app.example"), Some(&exact)));
        assert!(!is_origin_allowed(Some("https://evil.example"), Some(&exact)));
        assert!(is_origin_allowed(Some("https://evil.example"), Some(&wildcard)));
    }

    #[test]
    fn exact_match_echoes_origin_and_varies() {
        let exact = list(&["https://app.example"]);
        let headers = cors_headers(Some("https://app.example"), Some(&exact));
        assert_eq!(
            headers[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "https://app.example"
        );
        assert_eq!(headers[header::VARY], "Origin");
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_METHODS], "POST, OPTIONS");
        assert_eq!(
            headers[header::ACCESS_CONTROL_ALLOW_HEADERS],
            "Content-Type, Authorization"
        );
    }

    #[test]
    fn wildcard_allows_any_origin_without_vary() {
        let wildcard = list(&["*"]);
        let headers = cors_headers(Some("https://x.example"), Some(&wildcard));
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert!(headers.get(header::VARY).is_none());
    }

    #[test]
    fn no_headers_without_origin_or_list_or_match() {
        let exact = list(&["https://app.example"]);
        assert!(cors_headers(None, Some(&exact)).is_empty());
        assert!(cors_headers(Some("https://app.example"), None).is_empty());
        assert!(cors_headers(Some("https://other.example"), Some(&exact)).is_empty());
    }
}
