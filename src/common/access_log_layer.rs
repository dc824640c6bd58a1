use axum::response::Response;
use std::time::Duration;
use tower_http::trace::OnResponse;
use tracing::Span;

/// Writes one line per finished request to the `access_log` target.
#[derive(Clone, Debug)]
pub struct AccessLogOnResponse;

impl<B> OnResponse<B> for AccessLogOnResponse {
    fn on_response(self, response: &Response<B>, latency: Duration, _: &Span) {
        let request_id = response
            .headers()
            .get("x-request-id")
            .and_then(|value| value.to_str().ok())
            .unwrap_or("-");
        let status = response.status();
        let log_str = format!(
            "|{}|{}ms|httpCode={}",
            request_id,
            latency.as_millis(),
            status.as_u16()
        );
        if status.is_server_error() {
            warn!(target: "access_log", "{}", log_str);
        } else {
            info!(target: "access_log", "{}", log_str);
        }
    }
}
