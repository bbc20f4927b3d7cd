// JSON error body shared by the HTTP routes.

#[derive(Debug, serde::Serialize)]
pub struct ErrorResponse {
    pub error: String,
}
