use org_match_service::error::ServiceError;
use org_match_service::response::{make_response_payload, ResponsePayload, Status};
use serde_json::json;

#[test]
fn ok_result_is_wrapped_with_status_200() {
    let value = make_response_payload(Ok(json!({ "accepted": 3 }))).unwrap();

    assert_eq!(value["statusCode"], 200);
    assert_eq!(value["body"]["accepted"], 3);
    assert_eq!(value["headers"]["Content-Type"], "application/json");
}

#[test]
fn service_error_keeps_its_status() {
    let result: Result<serde_json::Value, ServiceError> =
        Err(ServiceError::missing_column("cluster_id", &["cluster_id", "Cluster ID"]));
    let value = make_response_payload(result).unwrap();

    assert_eq!(value["statusCode"], 400);
    assert_eq!(
        value["body"],
        "file must contain column 'cluster_id' (or one of: cluster_id, Cluster ID)"
    );
}

#[test]
fn envelope_round_trips_through_status_codes() {
    let payload: ResponsePayload = serde_json::from_value(json!({
        "statusCode": 504,
        "headers": {},
        "body": "timed out",
    }))
    .unwrap();
    assert_eq!(payload.status_code, Status::GatewayTimeout);
    assert!(!payload.is_ok());

    let unknown = serde_json::from_value::<ResponsePayload>(json!({
        "statusCode": 418,
        "headers": {},
        "body": null,
    }));
    assert!(unknown.is_err());
}

#[test]
fn error_display_is_json() {
    let err = ServiceError::internal_server_error("Environment variable 'REGION' not found");
    let rendered: serde_json::Value = serde_json::from_str(&err.to_string()).unwrap();
    assert_eq!(rendered["status"], 500);
    assert!(!err.is_client_error());
}
