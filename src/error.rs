use thiserror::Error;
use actix_web::{ResponseError, HttpResponse, http::StatusCode};
use serde_json::json;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication error: {0}")]
    AuthError(#[from] AuthError),

    #[error("Database error: {0}")]
    DatabaseError(#[from] DatabaseError),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Internal server error: {0}")]
    InternalError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl AppError {
    /// Short human-readable reason, returned to clients as `detail`.
    pub fn detail(&self) -> String {
        match self {
            AppError::AuthError(e) => e.to_string(),
            AppError::ValidationError(msg) => msg.clone(),
            AppError::DatabaseError(DatabaseError::NotFound) => "Not found".to_string(),
            // Internals stay in the logs
            _ => "Internal server error".to_string(),
        }
    }
}

// Implement conversion from config::ConfigError
impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(err.to_string())
    }
}

impl From<sqlx::Error> for DatabaseError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DatabaseError::NotFound,
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => DatabaseError::Duplicate,
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                DatabaseError::ConnectionError(err.to_string())
            }
            _ => DatabaseError::QueryError(err.to_string()),
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::DatabaseError(err.into())
    }
}

impl From<sqlx::migrate::MigrateError> for AppError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        AppError::DatabaseError(DatabaseError::ConnectionError(err.to_string()))
    }
}

// Add conversion from std::io::Error
impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::InternalError(err.to_string())
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        AppError::InternalError(err.to_string())
    }
}

// Implement actix_web::ResponseError for AppError
impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let response = json!({
            "error": {
                "status": status.as_u16(),
                "message": self.to_string()
            },
            "detail": self.detail()
        });
        HttpResponse::build(status).json(response)
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::AuthError(e) => match e {
                AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
                AuthError::TokenExpired => StatusCode::UNAUTHORIZED,
                AuthError::InvalidToken => StatusCode::UNAUTHORIZED,
                AuthError::MissingToken => StatusCode::UNAUTHORIZED,
                AuthError::UserExists => StatusCode::BAD_REQUEST,
            },
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::ConfigError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::DatabaseError(DatabaseError::NotFound) => StatusCode::NOT_FOUND,
            AppError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum AuthError {
    #[error("Invalid registration number or password")]
    InvalidCredentials,

    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token")]
    InvalidToken,

    #[error("No authorization token provided")]
    MissingToken,

    #[error("User with this email or registration number already exists")]
    UserExists,
}

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Query error: {0}")]
    QueryError(String),

    #[error("Record not found")]
    NotFound,

    #[error("Duplicate record")]
    Duplicate,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_error_conversion() {
        // Test IO error conversion
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let app_err: AppError = io_err.into();
        assert!(matches!(app_err, AppError::InternalError(_)));

        // Test config error conversion
        let config_err = config::ConfigError::NotFound(String::from("key not found"));
        let app_err: AppError = config_err.into();
        assert!(matches!(app_err, AppError::ConfigError(_)));

        // Test database error conversion
        let db_err = sqlx::Error::RowNotFound;
        let app_err: AppError = db_err.into();
        assert!(matches!(app_err, AppError::DatabaseError(DatabaseError::NotFound)));

        let app_err: AppError = sqlx::Error::PoolTimedOut.into();
        assert!(matches!(app_err, AppError::DatabaseError(DatabaseError::ConnectionError(_))));
    }

    #[test]
    fn test_error_status_codes() {
        let err = AppError::AuthError(AuthError::InvalidCredentials);
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);

        let err = AppError::AuthError(AuthError::TokenExpired);
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);

        let err = AppError::AuthError(AuthError::UserExists);
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);

        let err = AppError::ValidationError("invalid input".to_string());
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);

        let err = AppError::DatabaseError(DatabaseError::NotFound);
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);

        let err = AppError::DatabaseError(DatabaseError::ConnectionError("down".into()));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_error_display() {
        let err = AppError::ValidationError("test error".to_string());
        assert_eq!(err.to_string(), "Validation error: test error");

        let err = AppError::AuthError(AuthError::InvalidCredentials);
        assert_eq!(
            err.to_string(),
            "Authentication error: Invalid registration number or password"
        );

        let err = AppError::DatabaseError(DatabaseError::NotFound);
        assert_eq!(err.to_string(), "Database error: Record not found");
    }

    #[test]
    fn test_detail_hides_internals() {
        let err = AppError::DatabaseError(DatabaseError::QueryError("syntax error at or near".into()));
        assert_eq!(err.detail(), "Internal server error");

        let err = AppError::ValidationError("Reviewer or subject not found".into());
        assert_eq!(err.detail(), "Reviewer or subject not found");
    }
}
