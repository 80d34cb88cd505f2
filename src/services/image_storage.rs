use std::path::{Path, PathBuf};

use aws_sdk_s3::Client as S3Client;
use aws_sdk_s3::primitives::ByteStream;
use uuid::Uuid;

use crate::{
    config::{self, StorageConfig},
    error::{AppError, Result},
};

pub const PRODUCT_IMAGE_CATEGORY: &str = "qv-products-img";
pub const BANNER_IMAGE_CATEGORY: &str = "qv-banners-img";

pub const MAX_PRODUCT_IMAGE_BYTES: usize = 10 * 1024 * 1024;
pub const MAX_BANNER_IMAGE_BYTES: usize = 5 * 1024 * 1024;

const ALLOWED_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "gif", "webp", "bmp"];
const ALLOWED_MIME_TYPES: [&str; 6] = [
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/gif",
    "image/webp",
    "image/bmp",
];

/// Which attachment point an upload is destined for. The slot shapes the
/// local filename, so re-uploading the same slot overwrites in place.
#[derive(Debug, Clone, Copy)]
pub enum ImageSlot {
    Product(u8),
    Banner,
}

impl ImageSlot {
    fn label(&self) -> String {
        match self {
            ImageSlot::Product(n) => format!("img{}", n),
            ImageSlot::Banner => "banner".to_string(),
        }
    }
}

#[derive(Debug)]
pub struct StoredImage {
    pub url: String,
    pub key: String,
    pub storage_type: &'static str,
}

enum Backend {
    Local,
    S3 {
        client: S3Client,
        bucket: String,
        region: String,
    },
}

/// Image storage gateway, constructed once at startup and held in `AppState`.
/// The backend is fixed at construction: S3 when credentials are configured,
/// local disk otherwise.
pub struct ImageStorage {
    backend: Backend,
    upload_dir: PathBuf,
    base_url: Option<String>,
}

impl ImageStorage {
    pub async fn from_config(config: &StorageConfig) -> Result<Self> {
        let backend = match &config.s3 {
            Some(settings) => Backend::S3 {
                client: config::load_s3_client(settings).await,
                bucket: settings.bucket.clone(),
                region: settings.region.clone(),
            },
            None => {
                std::fs::create_dir_all(&config.upload_dir).map_err(|e| {
                    AppError::ConfigError(format!(
                        "Failed to create upload directory {}: {}",
                        config.upload_dir, e
                    ))
                })?;
                Backend::Local
            }
        };

        Ok(Self {
            backend,
            upload_dir: PathBuf::from(&config.upload_dir),
            base_url: config.base_url.clone(),
        })
    }

    /// Local-disk gateway rooted at `upload_dir`. Used directly in tests.
    pub fn local(upload_dir: PathBuf, base_url: Option<String>) -> Self {
        Self {
            backend: Backend::Local,
            upload_dir,
            base_url,
        }
    }

    pub fn storage_type(&self) -> &'static str {
        match self.backend {
            Backend::Local => "local",
            Backend::S3 { .. } => "s3",
        }
    }

    /// Store an uploaded image and return its publicly retrievable URL.
    pub async fn store(
        &self,
        category: &str,
        owner_key: &str,
        slot: ImageSlot,
        filename: &str,
        content_type: Option<&str>,
        bytes: &[u8],
        max_bytes: usize,
    ) -> Result<StoredImage> {
        if bytes.len() > max_bytes {
            return Err(AppError::PayloadTooLarge(format!(
                "File exceeds the {} MB limit",
                max_bytes / (1024 * 1024)
            )));
        }

        let extension = validate_image_file(filename, content_type)?;

        match &self.backend {
            Backend::Local => {
                self.store_local(owner_key, slot, &extension, bytes).await
            }
            Backend::S3 {
                client,
                bucket,
                region,
            } => {
                let key = s3_object_key(category, owner_key, &extension);
                let content_type = content_type
                    .map(str::to_string)
                    .unwrap_or_else(|| content_type_for_extension(&extension).to_string());

                tracing::info!("Uploading image to S3: {}", key);

                client
                    .put_object()
                    .bucket(bucket)
                    .key(&key)
                    .body(ByteStream::from(bytes.to_vec()))
                    .content_type(content_type)
                    .content_disposition("inline")
                    .cache_control("max-age=31536000")
                    .send()
                    .await
                    .map_err(|e| {
                        tracing::error!("S3 upload failed for {}: {}", key, e);
                        AppError::StorageUnavailable("Failed to upload image".to_string())
                    })?;

                Ok(StoredImage {
                    url: s3_public_url(bucket, region, &key),
                    key,
                    storage_type: "s3",
                })
            }
        }
    }

    async fn store_local(
        &self,
        owner_key: &str,
        slot: ImageSlot,
        extension: &str,
        bytes: &[u8],
    ) -> Result<StoredImage> {
        let filename = format!("{}_{}.{}", owner_key, slot.label(), extension);
        let path = self.upload_dir.join(&filename);

        tokio::fs::write(&path, bytes).await.map_err(|e| {
            AppError::InternalError(format!("Failed to write {}: {}", path.display(), e))
        })?;

        let url_path = format!("/uploads/{}", filename);
        let url = match &self.base_url {
            Some(base) => format!("{}{}", base.trim_end_matches('/'), url_path),
            None => url_path,
        };

        Ok(StoredImage {
            url,
            key: filename,
            storage_type: "local",
        })
    }

    /// Best-effort removal of a previously returned URL. Failures are logged
    /// and swallowed so they never block the owning mutation.
    pub async fn delete(&self, url: &str) {
        match &self.backend {
            Backend::Local => {
                let Some(filename) = local_filename_from_url(url) else {
                    tracing::warn!("Skipping delete of unrecognized image URL: {}", url);
                    return;
                };
                let path = self.upload_dir.join(filename);
                if let Err(e) = tokio::fs::remove_file(&path).await {
                    tracing::warn!("Failed to delete {}: {}", path.display(), e);
                }
            }
            Backend::S3 {
                client,
                bucket,
                region,
            } => {
                let prefix = s3_public_url(bucket, region, "");
                let Some(key) = url.strip_prefix(prefix.as_str()) else {
                    tracing::warn!("Skipping delete of unrecognized image URL: {}", url);
                    return;
                };
                if let Err(e) = client.delete_object().bucket(bucket).key(key).send().await {
                    tracing::warn!("Failed to delete S3 object {}: {}", key, e);
                }
            }
        }
    }
}

/// Check the extension and declared MIME type against the image allow-list,
/// returning the lowercased extension.
fn validate_image_file(filename: &str, content_type: Option<&str>) -> Result<String> {
    let extension = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .ok_or_else(|| AppError::BadRequest("File has no extension".to_string()))?;

    if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
        return Err(AppError::BadRequest(format!(
            "File type .{} is not allowed. Allowed types: {}",
            extension,
            ALLOWED_EXTENSIONS.join(", ")
        )));
    }

    if let Some(mime) = content_type {
        if !ALLOWED_MIME_TYPES.contains(&mime.to_lowercase().as_str()) {
            return Err(AppError::BadRequest(format!(
                "Content type {} is not allowed",
                mime
            )));
        }
    }

    Ok(extension)
}

/// `<category>/<owner>/<timestamp>_<short-uuid>.<ext>` — collision-resistant
/// and namespaced per owner so bulk deletes can list by prefix.
fn s3_object_key(category: &str, owner_key: &str, extension: &str) -> String {
    let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S");
    let unique = Uuid::new_v4().simple().to_string();
    format!(
        "{}/{}/{}_{}.{}",
        category,
        owner_key,
        timestamp,
        &unique[..8],
        extension
    )
}

fn s3_public_url(bucket: &str, region: &str, key: &str) -> String {
    format!("https://{}.s3.{}.amazonaws.com/{}", bucket, region, key)
}

fn local_filename_from_url(url: &str) -> Option<&str> {
    let (_, filename) = url.rsplit_once("/uploads/")?;
    if filename.is_empty() || filename.contains('/') || filename.contains("..") {
        return None;
    }
    Some(filename)
}

fn content_type_for_extension(extension: &str) -> &'static str {
    match extension {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local_storage(dir: &tempfile::TempDir) -> ImageStorage {
        ImageStorage::local(dir.path().to_path_buf(), None)
    }

    #[tokio::test]
    async fn local_store_writes_file_and_returns_mount_relative_url() {
        let dir = tempfile::tempdir().unwrap();
        let storage = local_storage(&dir);

        let stored = storage
            .store(
                PRODUCT_IMAGE_CATEGORY,
                "product_abc",
                ImageSlot::Product(2),
                "photo.PNG",
                Some("image/png"),
                b"fake-png",
                MAX_PRODUCT_IMAGE_BYTES,
            )
            .await
            .unwrap();

        assert_eq!(stored.storage_type, "local");
        assert_eq!(stored.url, "/uploads/product_abc_img2.png");
        assert!(dir.path().join("product_abc_img2.png").exists());
    }

    #[tokio::test]
    async fn local_store_prefixes_base_url_when_configured() {
        let dir = tempfile::tempdir().unwrap();
        let storage = ImageStorage::local(
            dir.path().to_path_buf(),
            Some("https://api.example.com/".to_string()),
        );

        let stored = storage
            .store(
                BANNER_IMAGE_CATEGORY,
                "user_abc",
                ImageSlot::Banner,
                "banner.jpg",
                None,
                b"fake-jpg",
                MAX_BANNER_IMAGE_BYTES,
            )
            .await
            .unwrap();

        assert_eq!(stored.url, "https://api.example.com/uploads/user_abc_banner.jpg");
    }

    #[tokio::test]
    async fn local_delete_removes_stored_file() {
        let dir = tempfile::tempdir().unwrap();
        let storage = local_storage(&dir);

        let stored = storage
            .store(
                PRODUCT_IMAGE_CATEGORY,
                "product_abc",
                ImageSlot::Product(1),
                "a.jpg",
                None,
                b"x",
                MAX_PRODUCT_IMAGE_BYTES,
            )
            .await
            .unwrap();

        let path = dir.path().join("product_abc_img1.jpg");
        assert!(path.exists());

        storage.delete(&stored.url).await;
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn local_delete_ignores_foreign_urls() {
        let dir = tempfile::tempdir().unwrap();
        let storage = local_storage(&dir);

        // must not panic or touch anything outside the upload dir
        storage.delete("https://elsewhere.example.com/image.png").await;
        storage.delete("/uploads/../etc/passwd").await;
    }

    #[tokio::test]
    async fn oversized_upload_is_rejected_before_any_write() {
        let dir = tempfile::tempdir().unwrap();
        let storage = local_storage(&dir);

        let result = storage
            .store(
                PRODUCT_IMAGE_CATEGORY,
                "product_abc",
                ImageSlot::Product(1),
                "big.jpg",
                None,
                &[0u8; 16],
                8,
            )
            .await;

        assert!(matches!(result, Err(AppError::PayloadTooLarge(_))));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn extension_allow_list_is_enforced() {
        assert!(validate_image_file("a.jpg", None).is_ok());
        assert!(validate_image_file("a.WEBP", None).is_ok());
        assert!(matches!(
            validate_image_file("a.pdf", None),
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            validate_image_file("no-extension", None),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn mime_allow_list_is_enforced() {
        assert!(validate_image_file("a.png", Some("image/png")).is_ok());
        assert!(matches!(
            validate_image_file("a.png", Some("application/pdf")),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn s3_keys_are_namespaced_and_unique() {
        let a = s3_object_key(PRODUCT_IMAGE_CATEGORY, "product_abc", "png");
        let b = s3_object_key(PRODUCT_IMAGE_CATEGORY, "product_abc", "png");

        assert!(a.starts_with("qv-products-img/product_abc/"));
        assert!(a.ends_with(".png"));
        assert_ne!(a, b);
    }

    #[test]
    fn s3_public_url_matches_amazonaws_pattern() {
        let url = s3_public_url("my-bucket", "eu-west-1", "qv-products-img/p/x.png");
        assert_eq!(
            url,
            "https://my-bucket.s3.eu-west-1.amazonaws.com/qv-products-img/p/x.png"
        );
    }

    #[test]
    fn local_filename_extraction_is_strict() {
        assert_eq!(
            local_filename_from_url("/uploads/p_img1.png"),
            Some("p_img1.png")
        );
        assert_eq!(
            local_filename_from_url("https://api.example.com/uploads/p_img1.png"),
            Some("p_img1.png")
        );
        assert_eq!(local_filename_from_url("/other/p.png"), None);
        assert_eq!(local_filename_from_url("/uploads/"), None);
    }
}
