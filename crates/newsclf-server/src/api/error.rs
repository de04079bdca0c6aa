use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

/// Any failure while serving a request becomes a 500 `{"detail": "..."}`.
#[derive(Debug)]
pub struct AppError(anyhow::Error);

impl AppError {
    pub fn detail(&self) -> String {
        format!("{:#}", self.0)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        tracing::error!("Request failed: {:?}", self.0);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "detail": self.detail() })),
        )
            .into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
