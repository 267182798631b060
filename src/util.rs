use crate::dto::DataFile;
use crate::error::ServiceError;
use futures::stream::TryStreamExt;
use log::debug;
use rusoto_core::Region;
use rusoto_s3::{GetObjectRequest, PutObjectRequest, S3Client, S3};
use std::env;
use std::str::FromStr;

pub fn get_region() -> Result<Region, ServiceError> {
    let val = get_env_var("REGION")?;
    Region::from_str(val.as_str()).map_err(|_| {
        ServiceError::internal_server_error(format!("Unable to parse region {}", val))
    })
}

pub fn get_env_var(name: &str) -> Result<String, ServiceError> {
    env::var(name).map_err(|_| {
        ServiceError::internal_server_error(format!("Environment variable '{}' not found", name))
    })
}

/// Output files land in the input bucket's `/output` sibling.
pub fn output_bucket(input_bucket: &str) -> String {
    input_bucket.replace("/input", "/output")
}

pub async fn download_object_from_s3(
    client: &S3Client,
    file: &DataFile,
) -> Result<Vec<u8>, ServiceError> {
    let request = GetObjectRequest {
        bucket: file.bucket.clone(),
        key: file.key.clone(),
        ..Default::default()
    };
    let mut object = client.get_object(request).await.map_err(|err| {
        ServiceError::internal_server_error(format!(
            "Unable to fetch s3://{}/{}: {}",
            file.bucket, file.key, err
        ))
    })?;
    let body = object
        .body
        .take()
        .ok_or_else(|| ServiceError::internal_server_error("Unable to extract body"))?;
    let bytes = body
        .map_ok(|b| b.to_vec())
        .try_concat()
        .await
        .map_err(ServiceError::internal_server_error)?;
    debug!("downloaded {} bytes from {}", bytes.len(), file.key);
    Ok(bytes)
}

pub async fn upload_object_to_s3(
    client: &S3Client,
    object: Vec<u8>,
    file: &DataFile,
) -> Result<(), ServiceError> {
    debug!("uploading {} bytes to {}", object.len(), file.key);
    let request = PutObjectRequest {
        bucket: file.bucket.clone(),
        key: file.key.clone(),
        body: Some(object.into()),
        content_type: Some(String::from("text/csv")),
        ..Default::default()
    };
    client
        .put_object(request)
        .await
        .map(|_| ())
        .map_err(ServiceError::internal_server_error)
}
