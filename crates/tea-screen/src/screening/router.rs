use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use serde::Deserialize;
use serde_json::json;

use super::record::SubmissionId;
use super::scorer::Scorer;
use super::service::ScreeningService;
use super::store::FormStore;
use crate::error::AppError;

pub const RESULT_PATH: &str = "/api/v1/screening/result";
pub const LATEST_PATH: &str = "/api/v1/screening/latest";
pub const BANDS_PATH: &str = "/api/v1/screening/bands";

/// Settings the HTTP layer needs besides the service itself.
#[derive(Debug, Clone, Default)]
pub struct RouterSettings {
    /// Shared token required as `?token=`; `None` leaves the endpoints open.
    pub access_token: Option<String>,
    /// Base URL personal result links are built on.
    pub public_url: String,
}

pub struct RouterState<S, M: ?Sized> {
    pub service: Arc<ScreeningService<S, M>>,
    pub settings: RouterSettings,
}

impl<S, M: ?Sized> RouterState<S, M> {
    fn authorized(&self, token: Option<&str>) -> bool {
        match (&self.settings.access_token, token) {
            (None, _) => true,
            (Some(expected), Some(given)) => {
                constant_time_eq(expected.as_bytes(), given.as_bytes())
            }
            (Some(_), None) => false,
        }
    }

    fn result_url(&self, submission_id: &SubmissionId) -> String {
        result_url(&self.settings.public_url, submission_id)
    }
}

/// Personal result link for one submission. The access token is never embedded.
pub fn result_url(public_url: &str, submission_id: &SubmissionId) -> String {
    format!(
        "{}{}?id={}",
        public_url,
        RESULT_PATH,
        encode_query_value(submission_id.as_str())
    )
}

#[derive(Debug, Deserialize)]
pub(crate) struct ResultQuery {
    #[serde(alias = "ID")]
    id: Option<String>,
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TokenQuery {
    token: Option<String>,
}

/// Router exposing the screening endpoints.
pub fn screening_router<S, M>(
    service: Arc<ScreeningService<S, M>>,
    settings: RouterSettings,
) -> Router
where
    S: FormStore + 'static,
    M: Scorer + ?Sized + 'static,
{
    let state = Arc::new(RouterState { service, settings });
    Router::new()
        .route(RESULT_PATH, get(result_handler::<S, M>))
        .route(LATEST_PATH, get(latest_handler::<S, M>))
        .route(BANDS_PATH, get(bands_handler::<S, M>))
        .with_state(state)
}

pub(crate) async fn result_handler<S, M>(
    State(state): State<Arc<RouterState<S, M>>>,
    Query(query): Query<ResultQuery>,
) -> Response
where
    S: FormStore + 'static,
    M: Scorer + ?Sized + 'static,
{
    if !state.authorized(query.token.as_deref()) {
        return forbidden();
    }
    let Some(raw_id) = query.id.filter(|id| !id.trim().is_empty()) else {
        let payload = json!({ "error": "missing submission id" });
        return (StatusCode::BAD_REQUEST, axum::Json(payload)).into_response();
    };

    let submission_id = SubmissionId(raw_id.trim().to_string());
    let service = Arc::clone(&state.service);
    let lookup_id = submission_id.clone();
    let outcome = tokio::task::spawn_blocking(move || service.predict(&lookup_id)).await;

    match outcome {
        Ok(Ok(result)) => {
            let view = result.view(&submission_id, state.result_url(&submission_id));
            (StatusCode::OK, axum::Json(view)).into_response()
        }
        Ok(Err(error)) => AppError::from(error).into_response(),
        Err(join_error) => internal_error(join_error.to_string()),
    }
}

pub(crate) async fn latest_handler<S, M>(
    State(state): State<Arc<RouterState<S, M>>>,
    Query(query): Query<TokenQuery>,
) -> Response
where
    S: FormStore + 'static,
    M: Scorer + ?Sized + 'static,
{
    if !state.authorized(query.token.as_deref()) {
        return forbidden();
    }

    let service = Arc::clone(&state.service);
    match tokio::task::spawn_blocking(move || service.latest_submission()).await {
        Ok(Ok(submission_id)) => {
            let payload = json!({
                "submission_id": submission_id,
                "result_url": state.result_url(&submission_id),
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Ok(Err(error)) => AppError::from(error).into_response(),
        Err(join_error) => internal_error(join_error.to_string()),
    }
}

pub(crate) async fn bands_handler<S, M>(State(state): State<Arc<RouterState<S, M>>>) -> Response
where
    S: FormStore + 'static,
    M: Scorer + ?Sized + 'static,
{
    (StatusCode::OK, axum::Json(state.service.bands().clone())).into_response()
}

fn forbidden() -> Response {
    let payload = json!({ "error": "access restricted" });
    (StatusCode::FORBIDDEN, axum::Json(payload)).into_response()
}

fn internal_error(message: String) -> Response {
    let payload = json!({ "error": message });
    (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(payload)).into_response()
}

/// Compares without short-circuiting on the first differing byte.
fn constant_time_eq(expected: &[u8], given: &[u8]) -> bool {
    if expected.len() != given.len() {
        return false;
    }
    expected
        .iter()
        .zip(given)
        .fold(0u8, |diff, (a, b)| diff | (a ^ b))
        == 0
}

/// Percent-encodes everything outside the RFC 3986 unreserved set.
fn encode_query_value(value: &str) -> String {
    let mut encoded = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                encoded.push(byte as char)
            }
            _ => encoded.push_str(&format!("%{byte:02X}")),
        }
    }
    encoded
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_time_eq_matches_only_identical_tokens() {
        assert!(constant_time_eq(b"TEA12345", b"TEA12345"));
        assert!(!constant_time_eq(b"TEA12345", b"TEA12346"));
        assert!(!constant_time_eq(b"TEA12345", b"TEA1234"));
    }

    #[test]
    fn result_links_carry_the_encoded_id_only() {
        let id = SubmissionId::from("01/03/2025 10:00:00");
        assert_eq!(
            result_url("https://screen.example", &id),
            "https://screen.example/api/v1/screening/result?id=01%2F03%2F2025%2010%3A00%3A00"
        );
    }

    #[test]
    fn query_values_are_percent_encoded() {
        assert_eq!(
            encode_query_value("2025/03/01 10:00:00"),
            "2025%2F03%2F01%2010%3A00%3A00"
        );
        assert_eq!(encode_query_value("abc-1.2_~"), "abc-1.2_~");
    }
}
