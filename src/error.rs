use crate::response::Status;
use serde::{Deserialize, Serialize};
use std::error;
use std::fmt;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServiceError {
    pub msg: String,
    pub status: Status,
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let json = serde_json::to_string_pretty(&self).map_err(|_| fmt::Error)?;
        write!(f, "{}", json)
    }
}

impl error::Error for ServiceError {}

impl ServiceError {
    pub fn bad_request<T: fmt::Display>(msg: T) -> ServiceError {
        ServiceError {
            msg: msg.to_string(),
            status: Status::BadRequest,
        }
    }

    pub fn internal_server_error<T: fmt::Display>(msg: T) -> ServiceError {
        ServiceError {
            msg: msg.to_string(),
            status: Status::InternalServerError,
        }
    }

    /// A required column is absent from the clustered file.
    pub fn missing_column(column: &str, aliases: &[&str]) -> ServiceError {
        let msg = if aliases.is_empty() {
            format!("file must contain column '{column}'")
        } else {
            format!(
                "file must contain column '{column}' (or one of: {})",
                aliases.join(", ")
            )
        };
        ServiceError::bad_request(msg)
    }

    pub fn is_client_error(&self) -> bool {
        matches!(self.status, Status::BadRequest)
    }
}
