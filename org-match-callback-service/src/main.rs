use org_match_service::dto::ResolveConfig;
use org_match_service::response::{make_response_payload, ResponsePayload, Status};
use org_match_service::{error::ServiceError, util};

use bytes::Bytes;
use lambda_runtime::{run, service_fn, Context, Error, LambdaEvent};
use lazy_static::lazy_static;
use log::{info, warn};
use rusoto_core::{Client, Region};
use rusoto_kms::{DecryptRequest, Kms, KmsClient};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;

lazy_static! {
    // AWS Region
    static ref REGION: Region = util::get_region().unwrap();
    // Callback Endpoint
    static ref ENDPOINT: String = util::get_env_var("ENDPOINT").unwrap();
    // Encrypted Api Key
    static ref API_KEY: String = util::get_env_var("API_KEY").unwrap();
    // Symmetric encryption key ID stored in AWS KMS
    static ref KEY_ID: String = util::get_env_var("KEY_ID").unwrap();
}

/// Invocation record delivered by the resolve function's Lambda destination.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DestinationRecord {
    request_payload: Option<Value>,
    response_payload: Option<Value>,
}

/// Shape of a response the Lambda runtime wrote on the function's behalf.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RuntimeFailure {
    error_message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CallbackBody {
    status_code: Status,
    body: Value,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));
    run(service_fn(process)).await?;
    Ok(())
}

async fn process(event: LambdaEvent<Value>) -> Result<Value, Error> {
    let (payload, context) = event.into_parts();
    let result = callback(payload, &context).await;
    make_response_payload(result)
}

async fn callback(payload: Value, context: &Context) -> Result<Value, ServiceError> {
    let body = extract(payload)?;
    if body.status_code != Status::Ok {
        warn!("forwarding failed resolution with status {}", body.status_code.code());
    }
    let client = reqwest::Client::builder()
        .build()
        .map_err(ServiceError::internal_server_error)?;
    let key = decrypt_api_key(function_name(context)?).await?;
    client
        .post(ENDPOINT.as_str())
        .header("X-API-KEY", key.as_str())
        .header("CONTENT-TYPE", "application/json")
        .json(&body)
        .send()
        .await
        .map_err(ServiceError::internal_server_error)?
        .error_for_status()
        .map_err(ServiceError::internal_server_error)?;
    info!("callback delivered to {}", ENDPOINT.as_str());
    Ok(json!({}))
}

fn extract(payload: Value) -> Result<CallbackBody, ServiceError> {
    let record: DestinationRecord =
        serde_json::from_value(payload).map_err(ServiceError::bad_request)?;
    let response = record
        .response_payload
        .ok_or_else(|| ise("No 'responsePayload' object found"))?;

    if let Ok(envelope) = serde_json::from_value::<ResponsePayload>(response.clone()) {
        if envelope.is_ok() {
            return Ok(CallbackBody {
                status_code: envelope.status_code,
                body: envelope.body,
            });
        }
        let config = request_config(record.request_payload)?;
        return Ok(CallbackBody {
            status_code: envelope.status_code,
            body: json!({ "message": envelope.body, "config": config }),
        });
    }

    let failure: RuntimeFailure = serde_json::from_value(response)
        .map_err(|_| ise("No 'errorMessage' field found"))?;
    let status_code = if failure.error_message.contains("timed out") {
        Status::GatewayTimeout
    } else {
        Status::InternalServerError
    };
    let config = request_config(record.request_payload)?;
    Ok(CallbackBody {
        status_code,
        body: json!({ "message": failure.error_message, "config": config }),
    })
}

/// The event that produced a failure. An event the resolve function could
/// not parse is forwarded verbatim so its 400 still reaches the endpoint.
fn request_config(request: Option<Value>) -> Result<Value, ServiceError> {
    let request = request.ok_or_else(|| ise("No 'requestPayload' object found"))?;
    match serde_json::from_value::<ResolveConfig>(request.clone()) {
        Ok(config) => serde_json::to_value(config).map_err(ServiceError::internal_server_error),
        Err(err) => {
            warn!("forwarding unparsable request as is: {err}");
            Ok(request)
        }
    }
}

fn ise(msg: &str) -> ServiceError {
    ServiceError::internal_server_error(msg)
}

async fn decrypt_api_key(function_name: &str) -> Result<String, ServiceError> {
    let client = KmsClient::new_with_client(Client::shared(), REGION.clone());
    let context = HashMap::from([(
        String::from("LambdaFunctionName"),
        String::from(function_name),
    )]);
    let ciphertext = base64::decode(API_KEY.as_bytes()).map_err(|err| ise(&err.to_string()))?;
    let request = DecryptRequest {
        ciphertext_blob: Bytes::from(ciphertext),
        key_id: Some(KEY_ID.clone()),
        encryption_context: Some(context),
        ..Default::default()
    };
    let response = client
        .decrypt(request)
        .await
        .map_err(|err| ise(&err.to_string()))?;
    let bytes = response
        .plaintext
        .ok_or_else(|| ise("Unable to decode api key"))?;
    String::from_utf8(bytes.to_vec()).map_err(|err| ise(&err.to_string()))
}

fn function_name(context: &Context) -> Result<&str, ServiceError> {
    context
        .invoked_function_arn
        .rsplit(':')
        .next()
        .filter(|name| !name.is_empty())
        .ok_or_else(|| ise("Unable to extract function name"))
}
