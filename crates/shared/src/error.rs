use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Transport,
    Unauthorized,
    NotFound,
    Conflict,
    Decode,
    Service,
}

impl ErrorCode {
    pub fn from_status(status: u16) -> Self {
        match status {
            401 | 403 => ErrorCode::Unauthorized,
            404 => ErrorCode::NotFound,
            409 => ErrorCode::Conflict,
            _ => ErrorCode::Service,
        }
    }
}

/// Failure reported by the remote data service; the detail is opaque text.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{detail}")]
pub struct ServiceError {
    pub code: ErrorCode,
    pub detail: String,
}

impl ServiceError {
    pub fn new(code: ErrorCode, detail: impl Into<String>) -> Self {
        Self {
            code,
            detail: detail.into(),
        }
    }

    pub fn transport(detail: impl Into<String>) -> Self {
        Self::new(ErrorCode::Transport, detail)
    }

    pub fn decode(detail: impl Into<String>) -> Self {
        Self::new(ErrorCode::Decode, detail)
    }

    pub fn detail(&self) -> &str {
        &self.detail
    }
}

/// Error body returned by the REST layer of the hosted service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub details: Option<String>,
    #[serde(default)]
    pub hint: Option<String>,
}

impl ApiErrorBody {
    pub fn into_service_error(self, status: u16) -> ServiceError {
        let mut detail = self
            .message
            .unwrap_or_else(|| format!("request failed with status {status}"));
        if let Some(details) = self.details.filter(|d| !d.is_empty()) {
            detail = format!("{detail} ({details})");
        }
        ServiceError::new(ErrorCode::from_status(status), detail)
    }
}
