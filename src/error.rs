use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("api error ({status}): {body}")]
    Api {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("failed to parse json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("missing api key: set {0}")]
    MissingApiKey(&'static str),
    #[error("input file {path} has no '{column}' column")]
    MissingColumn { path: String, column: &'static str },
}

pub type Result<T> = std::result::Result<T, RelayError>;
