use http::StatusCode;
use websession::{CsrfError, SessionError};

/// Helper trait for converting errors to a standard response error format
pub trait IntoResponseError<T> {
    fn into_response_error(self) -> Result<T, (StatusCode, String)>;
}

impl<T> IntoResponseError<T> for Result<T, SessionError> {
    fn into_response_error(self) -> Result<T, (StatusCode, String)> {
        self.map_err(|e| {
            let status = match e {
                SessionError::NotStarted => StatusCode::BAD_REQUEST,
                SessionError::Serde(_) => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            (status, e.to_string())
        })
    }
}

impl<T> IntoResponseError<T> for Result<T, CsrfError> {
    fn into_response_error(self) -> Result<T, (StatusCode, String)> {
        self.map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_error_status() {
        let result: Result<(), SessionError> = Err(SessionError::NotStarted);
        let (status, message) = result.into_response_error().unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(message, "Session is not started");

        let result: Result<(), SessionError> = Err(SessionError::Storage("down".to_string()));
        let (status, _) = result.into_response_error().unwrap_err();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_csrf_error_keeps_diagnostic() {
        let result: Result<(), CsrfError> = Err(CsrfError::TokenInvalid);
        let (status, message) = result.into_response_error().unwrap_err();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(message, "CSRF token is invalid or expired");
    }

    #[test]
    fn test_ok_passes_through() {
        let result: Result<u8, SessionError> = Ok(7);
        assert_eq!(result.into_response_error().unwrap(), 7);
    }
}
