use anyhow::Context;
use async_trait::async_trait;
use aws_sdk_s3::{config::Credentials, primitives::DateTimeFormat, types::Object};
use serde::Serialize;
use tracing::{debug, warn};

use crate::credentials::RoleCredentials;

/// One object descriptor from a bucket listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectEntry {
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,
}

impl ObjectEntry {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            size: None,
            last_modified: None,
        }
    }

    fn from_object(object: &Object) -> Option<Self> {
        let key = object.key()?;
        Some(Self {
            key: key.to_owned(),
            size: object.size(),
            last_modified: object
                .last_modified()
                .and_then(|t| t.fmt(DateTimeFormat::DateTime).ok()),
        })
    }
}

#[async_trait]
pub trait ObjectLister {
    /// Returns the bucket's objects in the order the store reports them.
    async fn list(
        &self,
        creds: &RoleCredentials,
        bucket: &str,
        prefix: Option<&str>,
    ) -> anyhow::Result<Vec<ObjectEntry>>;
}

/// Lists objects with a single, unpaginated `ListObjects` call.
#[derive(Clone)]
pub struct S3ObjectLister {
    pub config: aws_config::SdkConfig,
}

impl S3ObjectLister {
    pub fn new(config: aws_config::SdkConfig) -> Self {
        Self { config }
    }

    fn client(&self, creds: &RoleCredentials) -> aws_sdk_s3::Client {
        let provider = Credentials::new(
            creds.access_key_id.clone(),
            creds.secret_access_key.clone(),
            Some(creds.session_token.clone()),
            creds.expiration,
            "AssumeRole",
        );
        let conf = aws_sdk_s3::config::Builder::from(&self.config)
            .credentials_provider(provider)
            .force_path_style(self.config.endpoint_url().is_some())
            .build();
        aws_sdk_s3::Client::from_conf(conf)
    }
}

#[async_trait]
impl ObjectLister for S3ObjectLister {
    async fn list(
        &self,
        creds: &RoleCredentials,
        bucket: &str,
        prefix: Option<&str>,
    ) -> anyhow::Result<Vec<ObjectEntry>> {
        debug!("listing s3://{}/{}", bucket, prefix.unwrap_or_default());
        let resp = self
            .client(creds)
            .list_objects()
            .bucket(bucket)
            .set_prefix(prefix.map(str::to_owned))
            .send()
            .await
            .map_err(|e| e.into_service_error())
            .with_context(|| format!("s3:ListObjects failed for bucket {}", bucket))?;

        if resp.is_truncated().unwrap_or(false) {
            warn!(
                "listing of {} was truncated after {} objects",
                bucket,
                resp.contents().len()
            );
        }
        Ok(resp
            .contents()
            .iter()
            .filter_map(ObjectEntry::from_object)
            .collect())
    }
}
