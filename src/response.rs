use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::ServiceError;

/// HTTP-style status carried in the Lambda response envelope.
///
/// Serialised as its numeric code so the envelope reads like an API
/// Gateway proxy response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub enum Status {
    Ok,
    BadRequest,
    InternalServerError,
    GatewayTimeout,
}

impl Status {
    pub fn code(&self) -> u16 {
        match self {
            Status::Ok => 200,
            Status::BadRequest => 400,
            Status::InternalServerError => 500,
            Status::GatewayTimeout => 504,
        }
    }
}

impl From<Status> for u16 {
    fn from(status: Status) -> u16 {
        status.code()
    }
}

impl TryFrom<u16> for Status {
    type Error = String;

    fn try_from(code: u16) -> Result<Self, Self::Error> {
        match code {
            200 => Ok(Status::Ok),
            400 => Ok(Status::BadRequest),
            500 => Ok(Status::InternalServerError),
            504 => Ok(Status::GatewayTimeout),
            other => Err(format!("unsupported status code {other}")),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponsePayload {
    pub status_code: Status,
    pub headers: Value,
    pub body: Value,
}

impl ResponsePayload {
    pub fn new(status_code: Status, body: Value) -> Self {
        ResponsePayload {
            status_code,
            headers: default_headers(),
            body,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status_code == Status::Ok
    }
}

fn default_headers() -> Value {
    json!({
        "Content-Type": "application/json",
        "Access-Control-Allow-Origin": "*"
    })
}

/// Wraps a handler result in the response envelope. Service errors become
/// a non-200 envelope; only envelope serialisation failures escape as a
/// Lambda error.
pub fn make_response_payload<T: Serialize>(
    result: Result<T, ServiceError>,
) -> Result<Value, lambda_runtime::Error> {
    let response_payload = match result {
        Err(err) => ResponsePayload::new(err.status, Value::String(err.msg)),
        Ok(body) => ResponsePayload::new(Status::Ok, serde_json::to_value(body)?),
    };
    serde_json::to_value(response_payload).map_err(lambda_runtime::Error::from)
}
