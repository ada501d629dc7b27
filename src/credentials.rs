use std::{fmt, time::SystemTime};

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use tracing::debug;

/// Temporary credentials handed out for an assumed role.
#[derive(Clone, PartialEq, Eq)]
pub struct RoleCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: String,
    pub expiration: Option<SystemTime>,
}

impl fmt::Debug for RoleCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoleCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"** redacted **")
            .field("session_token", &"** redacted **")
            .field("expiration", &self.expiration)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssumeRoleRequest {
    pub role_arn: String,
    pub session_name: String,
    /// Left to the provider's default when unset.
    pub duration_seconds: Option<i32>,
}

#[async_trait]
pub trait RoleAssumer {
    async fn assume_role(&self, req: &AssumeRoleRequest) -> anyhow::Result<RoleCredentials>;
}

/// Assumes roles through STS, using whatever identity the client was built with.
#[derive(Clone)]
pub struct StsRoleAssumer {
    pub client: aws_sdk_sts::Client,
}

impl StsRoleAssumer {
    pub fn new(config: &aws_config::SdkConfig) -> Self {
        Self {
            client: aws_sdk_sts::Client::new(config),
        }
    }
}

#[async_trait]
impl RoleAssumer for StsRoleAssumer {
    async fn assume_role(&self, req: &AssumeRoleRequest) -> anyhow::Result<RoleCredentials> {
        debug!("assuming role {} as {}", req.role_arn, req.session_name);
        let resp = self
            .client
            .assume_role()
            .role_arn(&req.role_arn)
            .role_session_name(&req.session_name)
            .set_duration_seconds(req.duration_seconds)
            .send()
            .await
            .map_err(|e| e.into_service_error())
            .with_context(|| format!("sts:AssumeRole failed for {}", req.role_arn))?;

        let creds = resp
            .credentials()
            .ok_or_else(|| anyhow!("sts:AssumeRole returned no credentials for {}", req.role_arn))?;
        if let Some(user) = resp.assumed_role_user() {
            debug!("assumed {}", user.arn());
        }

        Ok(RoleCredentials {
            access_key_id: creds.access_key_id().to_owned(),
            secret_access_key: creds.secret_access_key().to_owned(),
            session_token: creds.session_token().to_owned(),
            expiration: SystemTime::try_from(*creds.expiration()).ok(),
        })
    }
}
