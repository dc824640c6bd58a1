use axum::http;
#[derive(Clone)]
pub struct RequestIdSpan;

impl<B> tower_http::trace::MakeSpan<B> for RequestIdSpan {
    fn make_span(&mut self, request: &http::Request<B>) -> tracing::Span {
        let request_id = request
            .headers()
            .get("x-request-id")
            .and_then(|value| value.to_str().ok())
            .unwrap_or("-");
        tracing::info_span!(
            target: "access_log",
            "access_log",
            log = %format!("|{}|{}|{}|{:?}", request_id, request.method(), request.uri(), request.version()),
        )
    }
}
