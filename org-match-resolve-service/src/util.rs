use crate::table::Table;
use org_match_service::dto::{ColumnNames, DataFile};
use org_match_service::error::ServiceError;
use org_match_service::util::{download_object_from_s3, upload_object_to_s3};
use rusoto_s3::S3Client;

pub async fn pull_data_file(
    client: &S3Client,
    data: &DataFile,
    names: &ColumnNames,
) -> Result<Table, ServiceError> {
    let bytes = download_object_from_s3(client, data).await?;
    Table::from_csv(bytes.as_slice(), names)
}

pub async fn push_result_file(
    client: &S3Client,
    object: Vec<u8>,
    target: DataFile,
) -> Result<String, ServiceError> {
    upload_object_to_s3(client, object, &target).await?;
    Ok(target.key)
}
