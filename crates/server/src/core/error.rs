use axum::{
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
};

/// Challenge sent with every 401.
pub const BASIC_CHALLENGE: &str = r#"Basic realm="Restricted""#;

/// Per-request rejections produced before a request reaches the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    // Auth Errors
    AuthFailNoCredentials,
    AuthFailWrongCredentials,

    // Policy Errors
    ReadOnly { method: Method },

    // Routing
    MountNotFound,
}

pub type Result<T> = core::result::Result<T, Error>;

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        // Both auth failures share one payload so usernames cannot be probed.
        let (status, message) = match self {
            Error::AuthFailNoCredentials | Error::AuthFailWrongCredentials => {
                (StatusCode::UNAUTHORIZED, "Unauthorized")
            }
            Error::ReadOnly { .. } => (StatusCode::FORBIDDEN, "Forbidden: Read-only mode"),
            Error::MountNotFound => (StatusCode::NOT_FOUND, "404 page not found"),
        };

        let mut response = (status, message).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response.headers_mut().insert(
                header::WWW_AUTHENTICATE,
                HeaderValue::from_static(BASIC_CHALLENGE),
            );
        }
        response
    }
}
