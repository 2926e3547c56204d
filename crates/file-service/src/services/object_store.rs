//! Object store seam.
//!
//! Production talks to an S3-compatible endpoint (MinIO) with path-style
//! addressing; tests use [`memory::InMemoryObjectStore`].

use crate::config::StorageSettings;
use crate::errors::FileError;
use async_trait::async_trait;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{BucketLocationConstraint, CreateBucketConfiguration};
use aws_sdk_s3::Client;
use bytes::Bytes;
use common::secret::ExposeSecret;
use std::pin::Pin;
use std::time::Duration;
use tokio::io::AsyncRead;
use tracing::{info, instrument};

pub type ObjectReader = Pin<Box<dyn AsyncRead + Send>>;

/// A readable object body.
pub struct StoredObject {
    pub reader: ObjectReader,
    pub content_length: Option<u64>,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Create `bucket` when it does not exist yet.
    async fn ensure_bucket(&self, bucket: &str) -> Result<(), FileError>;

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<(), FileError>;

    /// A missing object yields [`FileError::NotFound`].
    async fn get_object(&self, bucket: &str, key: &str) -> Result<StoredObject, FileError>;

    /// Deleting a missing object succeeds.
    async fn delete_object(&self, bucket: &str, key: &str) -> Result<(), FileError>;

    async fn presigned_get_url(
        &self,
        bucket: &str,
        key: &str,
        expires_in: Duration,
    ) -> Result<String, FileError>;
}

/// Region that must not be sent as a location constraint.
const DEFAULT_S3_REGION: &str = "us-east-1";

pub struct S3ObjectStore {
    client: Client,
    region: String,
}

impl S3ObjectStore {
    pub fn new(settings: &StorageSettings) -> Self {
        let credentials = Credentials::new(
            &settings.access_key,
            settings.secret_key.expose_secret(),
            None,
            None,
            "file-service",
        );

        let config = aws_sdk_s3::config::Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(settings.region.clone()))
            .credentials_provider(credentials)
            .endpoint_url(&settings.endpoint)
            .force_path_style(true)
            .build();

        Self {
            client: Client::from_conf(config),
            region: settings.region.clone(),
        }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    #[instrument(skip(self), name = "file.store.ensure_bucket")]
    async fn ensure_bucket(&self, bucket: &str) -> Result<(), FileError> {
        match self.client.head_bucket().bucket(bucket).send().await {
            Ok(_) => return Ok(()),
            Err(e) => {
                let missing = e.as_service_error().is_some_and(|se| se.is_not_found());
                if !missing {
                    return Err(FileError::Storage(format!("head bucket {bucket}: {e}")));
                }
            }
        }

        let mut request = self.client.create_bucket().bucket(bucket);
        if self.region != DEFAULT_S3_REGION {
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(self.region.as_str()))
                    .build(),
            );
        }

        match request.send().await {
            Ok(_) => {
                info!(target: "file.store", bucket = %bucket, region = %self.region, "Bucket created");
                Ok(())
            }
            Err(e)
                if e.as_service_error().is_some_and(|se| {
                    se.is_bucket_already_owned_by_you() || se.is_bucket_already_exists()
                }) =>
            {
                Ok(())
            }
            Err(e) => Err(FileError::Storage(format!("create bucket {bucket}: {e}"))),
        }
    }

    #[instrument(skip(self, data), fields(size = data.len()), name = "file.store.put")]
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<(), FileError> {
        let length = i64::try_from(data.len()).map_err(|_| FileError::Internal)?;
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type(content_type)
            .content_length(length)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| FileError::Storage(format!("put {bucket}/{key}: {e}")))?;
        Ok(())
    }

    #[instrument(skip(self), name = "file.store.get")]
    async fn get_object(&self, bucket: &str, key: &str) -> Result<StoredObject, FileError> {
        let output = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().is_some_and(|se| se.is_no_such_key()) {
                    FileError::NotFound("file content is missing".to_string())
                } else {
                    FileError::Storage(format!("get {bucket}/{key}: {e}"))
                }
            })?;

        let content_length = output
            .content_length()
            .and_then(|len| u64::try_from(len).ok());
        Ok(StoredObject {
            reader: Box::pin(output.body.into_async_read()),
            content_length,
        })
    }

    #[instrument(skip(self), name = "file.store.delete")]
    async fn delete_object(&self, bucket: &str, key: &str) -> Result<(), FileError> {
        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| FileError::Storage(format!("delete {bucket}/{key}: {e}")))?;
        Ok(())
    }

    async fn presigned_get_url(
        &self,
        bucket: &str,
        key: &str,
        expires_in: Duration,
    ) -> Result<String, FileError> {
        let presigning = PresigningConfig::expires_in(expires_in)
            .map_err(|e| FileError::Storage(format!("presigning config: {e}")))?;

        let request = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .presigned(presigning)
            .await
            .map_err(|e| FileError::Storage(format!("presign {bucket}/{key}: {e}")))?;

        Ok(request.uri().to_string())
    }
}

/// In-memory object store for tests.
pub mod memory {
    use super::*;
    use std::collections::{HashMap, HashSet};
    use std::io::Cursor;
    use std::sync::{Mutex, MutexGuard};

    #[derive(Debug, Clone)]
    pub struct MemoryObject {
        pub data: Bytes,
        pub content_type: String,
    }

    #[derive(Default)]
    struct Inner {
        buckets: HashSet<String>,
        objects: HashMap<(String, String), MemoryObject>,
        fail_puts: bool,
        fail_deletes: bool,
    }

    #[derive(Default)]
    pub struct InMemoryObjectStore {
        inner: Mutex<Inner>,
    }

    impl InMemoryObjectStore {
        pub fn new() -> Self {
            Self::default()
        }

        fn lock(&self) -> MutexGuard<'_, Inner> {
            self.inner.lock().unwrap_or_else(|e| e.into_inner())
        }

        pub fn set_fail_puts(&self, fail: bool) {
            self.lock().fail_puts = fail;
        }

        pub fn set_fail_deletes(&self, fail: bool) {
            self.lock().fail_deletes = fail;
        }

        pub fn has_bucket(&self, bucket: &str) -> bool {
            self.lock().buckets.contains(bucket)
        }

        pub fn object(&self, bucket: &str, key: &str) -> Option<MemoryObject> {
            self.lock()
                .objects
                .get(&(bucket.to_string(), key.to_string()))
                .cloned()
        }

        pub fn object_count(&self) -> usize {
            self.lock().objects.len()
        }
    }

    #[async_trait]
    impl ObjectStore for InMemoryObjectStore {
        async fn ensure_bucket(&self, bucket: &str) -> Result<(), FileError> {
            self.lock().buckets.insert(bucket.to_string());
            Ok(())
        }

        async fn put_object(
            &self,
            bucket: &str,
            key: &str,
            data: Bytes,
            content_type: &str,
        ) -> Result<(), FileError> {
            let mut inner = self.lock();
            if inner.fail_puts {
                return Err(FileError::Storage("simulated put failure".to_string()));
            }
            inner.objects.insert(
                (bucket.to_string(), key.to_string()),
                MemoryObject {
                    data,
                    content_type: content_type.to_string(),
                },
            );
            Ok(())
        }

        async fn get_object(&self, bucket: &str, key: &str) -> Result<StoredObject, FileError> {
            let object = self
                .object(bucket, key)
                .ok_or_else(|| FileError::NotFound("file content is missing".to_string()))?;
            Ok(StoredObject {
                content_length: Some(object.data.len() as u64),
                reader: Box::pin(Cursor::new(object.data)),
            })
        }

        async fn delete_object(&self, bucket: &str, key: &str) -> Result<(), FileError> {
            let mut inner = self.lock();
            if inner.fail_deletes {
                return Err(FileError::Storage("simulated delete failure".to_string()));
            }
            inner.objects.remove(&(bucket.to_string(), key.to_string()));
            Ok(())
        }

        async fn presigned_get_url(
            &self,
            bucket: &str,
            key: &str,
            expires_in: Duration,
        ) -> Result<String, FileError> {
            Ok(format!(
                "http://objects.test/{bucket}/{key}?X-Amz-Expires={}",
                expires_in.as_secs()
            ))
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::memory::InMemoryObjectStore;
    use super::*;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn test_memory_store_round_trip_and_delete() {
        let store = InMemoryObjectStore::new();
        store
            .put_object("general-files", "a.txt", Bytes::from_static(b"hello"), "text/plain")
            .await
            .unwrap();

        let mut object = store.get_object("general-files", "a.txt").await.unwrap();
        assert_eq!(object.content_length, Some(5));
        let mut buf = Vec::new();
        object.reader.read_to_end(&mut buf).await.unwrap();
        assert_eq!(buf, b"hello");

        store.delete_object("general-files", "a.txt").await.unwrap();
        assert!(matches!(
            store.get_object("general-files", "a.txt").await,
            Err(FileError::NotFound(_))
        ));
        // Deleting twice is fine.
        store.delete_object("general-files", "a.txt").await.unwrap();
    }

    #[test]
    fn test_s3_store_builds_without_network() {
        let settings = StorageSettings {
            endpoint: "http://127.0.0.1:9000".to_string(),
            access_key: "minio".to_string(),
            secret_key: common::secret::SecretString::from("minio-secret".to_string()),
            region: "eu-west-1".to_string(),
        };
        let store = S3ObjectStore::new(&settings);
        assert_eq!(store.region, "eu-west-1");
    }
}
