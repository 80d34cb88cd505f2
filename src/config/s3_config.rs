use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::{Client as S3Client, config::Credentials};

use crate::config::S3Settings;

pub async fn load_s3_client(settings: &S3Settings) -> S3Client {
    let credentials = Credentials::new(
        settings.access_key_id.clone(),
        settings.secret_access_key.clone(),
        None,
        None,
        "env-credentials",
    );

    let config = aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(settings.region.clone()))
        .credentials_provider(credentials)
        .load()
        .await;

    let s3_client = S3Client::new(&config);

    tracing::info!("AWS S3 client initialized for bucket {}", settings.bucket);

    s3_client
}
