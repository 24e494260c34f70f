use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderValue};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures::{Stream, StreamExt};
use std::convert::Infallible;

/// Streaming response for already-encoded packets.
pub fn sse_response<S>(content_type: &'static str, packets: S) -> Response
where
    S: Stream<Item = Bytes> + Send + 'static,
{
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(content_type),
    );
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert("x-accel-buffering", HeaderValue::from_static("no"));
    let body = packets.map(Ok::<Bytes, Infallible>);
    (headers, Body::from_stream(body)).into_response()
}
