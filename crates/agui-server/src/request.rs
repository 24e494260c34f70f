//! Request gates applied before a run starts.

use crate::service::ApiError;
use agui_protocol::RunAgentInput;
use agui_runtime::{Principal, RequestContext};
use axum::body::Body;
use axum::http::{header, HeaderMap, StatusCode};
use bytes::Bytes;

/// `application/json`, parameters such as `charset` allowed.
pub fn is_json_content_type(content_type: Option<&str>) -> bool {
    let Some(content_type) = content_type else {
        return false;
    };
    let media_type = content_type.split(';').next().unwrap_or_default();
    media_type.trim().eq_ignore_ascii_case("application/json")
}

pub fn ensure_json_content_type(headers: &HeaderMap) -> Result<(), ApiError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok());
    if is_json_content_type(content_type) {
        Ok(())
    } else {
        Err(ApiError::request(
            StatusCode::BAD_REQUEST,
            "Content-Type must be application/json",
        ))
    }
}

fn payload_too_large() -> ApiError {
    ApiError::request(StatusCode::PAYLOAD_TOO_LARGE, "Payload too large")
}

/// Reject a declared `Content-Length` above `limit`. A missing or
/// unparsable header passes; [`read_body`] still bounds the actual body.
pub fn enforce_max_content_length(headers: &HeaderMap, limit: Option<u64>) -> Result<(), ApiError> {
    let Some(limit) = limit else {
        return Ok(());
    };
    let declared = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok());
    match declared {
        Some(length) if length > limit => Err(payload_too_large()),
        _ => Ok(()),
    }
}

pub async fn read_body(body: Body, limit: Option<u64>) -> Result<Bytes, ApiError> {
    let max = limit
        .map(|limit| usize::try_from(limit).unwrap_or(usize::MAX))
        .unwrap_or(usize::MAX);
    axum::body::to_bytes(body, max).await.map_err(|err| {
        tracing::debug!(error = %err, "failed to read request body");
        if limit.is_some() {
            payload_too_large()
        } else {
            ApiError::request(StatusCode::BAD_REQUEST, "Failed to read request body")
        }
    })
}

pub fn parse_run_input(body: &[u8]) -> Result<RunAgentInput, ApiError> {
    Ok(RunAgentInput::from_json_slice(body)?)
}

/// Context handed to agents; header values that are not UTF-8 are dropped.
pub fn request_context(path: &str, headers: &HeaderMap, principal: Option<Principal>) -> RequestContext {
    headers
        .iter()
        .filter_map(|(name, value)| Some((name.as_str(), value.to_str().ok()?)))
        .fold(
            RequestContext::new(path).with_principal(principal),
            |ctx, (name, value)| ctx.with_header(name, value),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn with_header(name: header::HeaderName, value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(name, HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn json_content_type_accepts_parameters() {
        assert!(is_json_content_type(Some("application/json")));
        assert!(is_json_content_type(Some("application/json; charset=utf-8")));
        assert!(is_json_content_type(Some("Application/JSON")));
        assert!(!is_json_content_type(Some("text/plain")));
        assert!(!is_json_content_type(Some("application/jsonp")));
        assert!(!is_json_content_type(None));
    }

    #[test]
    fn missing_content_type_is_bad_request() {
        let err = ensure_json_content_type(&HeaderMap::new()).unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "Content-Type must be application/json");
    }

    #[test]
    fn declared_length_over_limit_is_rejected() {
        let headers = with_header(header::CONTENT_LENGTH, "2048");
        let err = enforce_max_content_length(&headers, Some(1024)).unwrap_err();
        assert_eq!(err.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert!(enforce_max_content_length(&headers, Some(4096)).is_ok());
        assert!(enforce_max_content_length(&headers, None).is_ok());
    }

    #[test]
    fn unparsable_length_is_ignored() {
        let headers = with_header(header::CONTENT_LENGTH, "lots");
        assert!(enforce_max_content_length(&headers, Some(1)).is_ok());
    }

    #[tokio::test]
    async fn body_read_is_bounded_by_limit() {
        let err = read_body(Body::from(vec![b'x'; 64]), Some(16))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::PAYLOAD_TOO_LARGE);
        let body = read_body(Body::from("{}"), Some(16)).await.unwrap();
        assert_eq!(body, Bytes::from("{}"));
    }

    #[test]
    fn invalid_payloads_map_to_bad_request() {
        let err = parse_run_input(b"{oops").unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert!(err.to_string().starts_with("Invalid JSON:"));
        let err = parse_run_input(br#"{"messages": 3}"#).unwrap_err();
        assert!(err.to_string().starts_with("Invalid request:"));
    }

    #[test]
    fn request_context_copies_headers() {
        let headers = with_header(header::USER_AGENT, "copilotkit");
        let ctx = request_context("/agents/echo", &headers, None);
        assert_eq!(ctx.path, "/agents/echo");
        assert_eq!(ctx.header("user-agent"), Some("copilotkit"));
    }
}
