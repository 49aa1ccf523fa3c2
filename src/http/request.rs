//! Request identification.
//!
//! Every request gets an `x-request-id` as early as possible: a client-supplied
//! value is kept, otherwise a UUID v4 is assigned. The id is copied to the
//! response and recorded on the request's tracing span.

use axum::body::Body;
use axum::http::{HeaderName, HeaderValue, Request};
use tower_http::request_id::{MakeRequestId, RequestId};
use tracing::Span;
use uuid::Uuid;

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Generates UUID v4 request ids.
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeRequestUuidV4;

impl MakeRequestId for MakeRequestUuidV4 {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

/// Read the request id header, if it is valid UTF-8.
pub fn request_id<B>(request: &Request<B>) -> Option<&str> {
    request.headers().get(&X_REQUEST_ID).and_then(|v| v.to_str().ok())
}

/// Span for one HTTP request, tagged with its id.
pub fn request_span(request: &Request<Body>) -> Span {
    tracing::info_span!(
        "request",
        request_id = request_id(request).unwrap_or("unknown"),
        method = %request.method(),
        path = %request.uri().path(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generates_distinct_uuids() {
        let request = Request::new(());
        let mut make = MakeRequestUuidV4;
        let a = make.make_request_id(&request).unwrap();
        let b = make.make_request_id(&request).unwrap();

        let a = a.header_value().to_str().unwrap();
        assert_ne!(a, b.header_value().to_str().unwrap());
        assert_eq!(Uuid::parse_str(a).unwrap().get_version_num(), 4);
    }

    #[test]
    fn reads_supplied_id() {
        let request = Request::builder()
            .header("x-request-id", "abc-123")
            .body(())
            .unwrap();
        assert_eq!(request_id(&request), Some("abc-123"));
    }
}
