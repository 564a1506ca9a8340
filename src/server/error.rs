use crate::media::MediaError;
use axum::{
    http::{header::RETRY_AFTER, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::{debug, error};

const GENERIC_MESSAGE: &str = "Something went wrong";

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    error: String,
    message: Option<String>,
    retry_after_secs: Option<u64>,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

impl ApiError {
    pub fn bad_request(error: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            error: error.into(),
            message: None,
            retry_after_secs: None,
        }
    }

    pub fn not_found(error: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            error: error.into(),
            message: None,
            retry_after_secs: None,
        }
    }

    pub fn internal(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            error: error.into(),
            message: Some(message.into()),
            retry_after_secs: None,
        }
    }

    pub fn too_many_requests(retry_after_secs: u64) -> Self {
        Self {
            status: StatusCode::TOO_MANY_REQUESTS,
            error: "Too many requests from this IP, please try again later.".to_string(),
            message: None,
            retry_after_secs: Some(retry_after_secs),
        }
    }

    /// Maps a core failure to its HTTP shape. Upstream detail is only echoed
    /// back when `expose_details` is set.
    pub fn from_media(err: MediaError, action: &str, expose_details: bool) -> Self {
        match err {
            MediaError::InvalidUrl(detail) => {
                debug!("Rejected URL: {}", detail);
                Self::bad_request("Invalid URL provided")
            }
            other => {
                error!("{}: {}", action, other);
                let message = if expose_details {
                    other.to_string()
                } else {
                    GENERIC_MESSAGE.to_string()
                };
                Self::internal(action, message)
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.error,
            message: self.message,
        });

        let mut response = (self.status, body).into_response();
        if let Some(seconds) = self.retry_after_secs {
            if let Ok(value) = HeaderValue::from_str(&seconds.to_string()) {
                response.headers_mut().insert(RETRY_AFTER, value);
            }
        }
        response
    }
}
