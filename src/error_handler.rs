use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel_async::pooled_connection::bb8::RunError as BB8RunError;
use diesel_async::pooled_connection::PoolError;
use serde_json::json;
use std::fmt;

/// Failure of a plant store call. Conversation code matches on `Conflict` to
/// report duplicate names; everything else is logged and surfaced generically.
#[derive(Debug)]
pub enum ServiceError {
    Conflict(String),
    NotFound(String),
    DatabaseError(String),
    PoolError(String),
}

impl From<DieselError> for ServiceError {
    fn from(error: DieselError) -> ServiceError {
        match error {
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
                log::warn!("Duplicate name rejected by the store: {}", info.message());
                ServiceError::Conflict("That name is already taken.".to_string())
            }
            DieselError::DatabaseError(kind, info) => {
                log::error!("Store query failed: {:?} - {}", kind, info.message());
                ServiceError::DatabaseError("A store operation failed.".to_string())
            }
            DieselError::NotFound => ServiceError::NotFound("No such record.".to_string()),
            err => {
                log::error!("Unexpected Diesel error: {}", err);
                ServiceError::DatabaseError("An unexpected store error occurred.".to_string())
            }
        }
    }
}

impl From<PoolError> for ServiceError {
    fn from(error: PoolError) -> ServiceError {
        log::error!("Could not open a store connection: {:?}", error);
        ServiceError::PoolError("Could not connect to the plant store.".to_string())
    }
}

impl From<BB8RunError> for ServiceError {
    fn from(error: BB8RunError) -> ServiceError {
        log::error!("BB8 connection pool error: {:?}", error);
        ServiceError::PoolError("Could not obtain connection from database pool.".to_string())
    }
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let (kind, msg) = match self {
            ServiceError::Conflict(msg) => ("Conflict", msg),
            ServiceError::NotFound(msg) => ("Not Found", msg),
            ServiceError::DatabaseError(msg) => ("Database Error", msg),
            ServiceError::PoolError(msg) => ("Pool Error", msg),
        };
        write!(f, "{}: {}", kind, msg)
    }
}

impl std::error::Error for ServiceError {}

impl ResponseError for ServiceError {
    fn status_code(&self) -> StatusCode {
        match *self {
            ServiceError::Conflict(_) => StatusCode::CONFLICT,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServiceError::PoolError(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status_code = self.status_code();
        let message = if status_code.is_server_error() {
            log::error!("Responding with server error ({}): {}", status_code, self);
            "The service is not healthy. Please try again later.".to_string()
        } else {
            self.to_string()
        };

        HttpResponse::build(status_code).json(json!({
            "status": "error",
            "statusCode": status_code.as_u16(),
            "message": message
        }))
    }
}
