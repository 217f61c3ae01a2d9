//! Object store access
//!
//! Context overlays can live in S3, and the audit row records the size and
//! receipt time of whichever object fed the run.

use aws_config::SdkConfig;
use aws_sdk_s3::Client;
use chrono::NaiveDateTime;
use tracing::debug;

use crate::error::{BatchError, BatchResult};

/// A parsed `s3://bucket/key` location
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3Location {
    pub bucket: String,
    pub key: String,
}

impl S3Location {
    /// Parse an `s3://bucket/key` string
    pub fn parse(path: &str) -> BatchResult<S3Location> {
        let remainder = path.strip_prefix("s3://").ok_or_else(|| {
            BatchError::object_store(path, "expected an s3:// location")
        })?;

        let (bucket, key) = remainder.split_once('/').ok_or_else(|| {
            BatchError::object_store(path, "expected s3://bucket/key")
        })?;

        if bucket.is_empty() || key.is_empty() {
            return Err(BatchError::object_store(
                path,
                "bucket and key must not be empty",
            ));
        }

        Ok(S3Location {
            bucket: bucket.to_string(),
            key: key.to_string(),
        })
    }

    /// The final path segment, used as the audit file name
    pub fn file_name(&self) -> &str {
        self.key.rsplit('/').next().unwrap_or(&self.key)
    }

    fn display(&self) -> String {
        format!("s3://{}/{}", self.bucket, self.key)
    }
}

/// Size and receipt time of an object, as recorded on the audit row
#[derive(Debug, Clone, Default)]
pub struct ObjectMetadata {
    pub size_bytes: Option<i64>,
    pub last_modified: Option<NaiveDateTime>,
}

/// Wrapper over the S3 client
#[derive(Clone)]
pub struct ObjectStore {
    client: Client,
}

impl ObjectStore {
    pub fn new(sdk_config: &SdkConfig) -> Self {
        Self {
            client: Client::new(sdk_config),
        }
    }

    /// Read an object's content as UTF-8 text
    pub async fn read_to_string(&self, location: &S3Location) -> BatchResult<String> {
        debug!(location = %location.display(), "Reading object");

        let response = self
            .client
            .get_object()
            .bucket(&location.bucket)
            .key(&location.key)
            .send()
            .await
            .map_err(|err| BatchError::object_store(location.display(), err.to_string()))?;

        let bytes = response
            .body
            .collect()
            .await
            .map_err(|err| BatchError::object_store(location.display(), err.to_string()))?
            .into_bytes();

        String::from_utf8(bytes.to_vec())
            .map_err(|err| BatchError::object_store(location.display(), err.to_string()))
    }

    /// Fetch an object's size and last-modified timestamp
    pub async fn object_metadata(&self, location: &S3Location) -> BatchResult<ObjectMetadata> {
        let response = self
            .client
            .head_object()
            .bucket(&location.bucket)
            .key(&location.key)
            .send()
            .await
            .map_err(|err| BatchError::object_store(location.display(), err.to_string()))?;

        let last_modified = response.last_modified().and_then(|ts| {
            chrono::DateTime::from_timestamp(ts.secs(), ts.subsec_nanos())
                .map(|dt| dt.naive_utc())
        });

        Ok(ObjectMetadata {
            size_bytes: response.content_length(),
            last_modified,
        })
    }
}
