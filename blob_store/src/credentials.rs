//! Credentials for the S3 backend.
//!
//! A [`SharedCredentialsProvider`] is built once from [`CredentialsConfig`]
//! and handed to every S3 store explicitly. The same provider feeds both the
//! aws-sdk presigner and object_store, the latter through
//! [`SdkCredentialBridge`].

use std::sync::Arc;

use async_trait::async_trait;
use aws_config::{
    default_provider::credentials::DefaultCredentialsChain,
    sts::AssumeRoleProvider,
    BehaviorVersion,
    Region,
};
use aws_credential_types::{
    provider::{ProvideCredentials, SharedCredentialsProvider},
    Credentials,
};
use object_store::aws::AwsCredential;
use serde::{Deserialize, Serialize};
use tracing::info;

const STATIC_PROVIDER_NAME: &str = "download-gate-static";

#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CredentialsConfig {
    Static {
        access_key_id: String,
        secret_access_key: String,
        #[serde(default)]
        session_token: Option<String>,
    },
    /// Temporary credentials from STS AssumeRole; the caller identity comes
    /// from the default chain.
    AssumeRole {
        role_arn: String,
        session_name: String,
        #[serde(default)]
        region: Option<String>,
    },
    #[default]
    DefaultChain,
}

impl std::fmt::Debug for CredentialsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CredentialsConfig::Static { access_key_id, .. } => f
                .debug_struct("Static")
                .field("access_key_id", access_key_id)
                .finish_non_exhaustive(),
            CredentialsConfig::AssumeRole {
                role_arn,
                session_name,
                region,
            } => f
                .debug_struct("AssumeRole")
                .field("role_arn", role_arn)
                .field("session_name", session_name)
                .field("region", region)
                .finish(),
            CredentialsConfig::DefaultChain => f.write_str("DefaultChain"),
        }
    }
}

pub async fn build_credentials_provider(config: &CredentialsConfig) -> SharedCredentialsProvider {
    match config {
        CredentialsConfig::Static {
            access_key_id,
            secret_access_key,
            session_token,
        } => {
            info!(access_key_id = %access_key_id, "using static credentials");
            SharedCredentialsProvider::new(Credentials::new(
                access_key_id,
                secret_access_key,
                session_token.clone(),
                None,
                STATIC_PROVIDER_NAME,
            ))
        }
        CredentialsConfig::AssumeRole {
            role_arn,
            session_name,
            region,
        } => {
            let mut loader = aws_config::defaults(BehaviorVersion::latest());
            if let Some(region) = region {
                loader = loader.region(Region::new(region.clone()));
            }
            let base_config = loader.load().await;
            let provider = AssumeRoleProvider::builder(role_arn)
                .session_name(session_name)
                .configure(&base_config)
                .build()
                .await;
            info!(role_arn = %role_arn, session_name = %session_name, "assuming role for storage access");
            SharedCredentialsProvider::new(provider)
        }
        CredentialsConfig::DefaultChain => {
            info!("using default AWS credentials chain");
            SharedCredentialsProvider::new(DefaultCredentialsChain::builder().build().await)
        }
    }
}

/// Adapts an aws-sdk credentials provider to object_store.
#[derive(Debug)]
pub struct SdkCredentialBridge {
    inner: SharedCredentialsProvider,
}

impl SdkCredentialBridge {
    pub fn new(inner: SharedCredentialsProvider) -> Self {
        Self { inner }
    }
}

pub(crate) fn to_object_store_credential(credentials: &Credentials) -> AwsCredential {
    AwsCredential {
        key_id: credentials.access_key_id().to_string(),
        secret_key: credentials.secret_access_key().to_string(),
        token: credentials.session_token().map(str::to_string),
    }
}

#[async_trait]
impl object_store::CredentialProvider for SdkCredentialBridge {
    type Credential = AwsCredential;

    async fn get_credential(&self) -> object_store::Result<Arc<AwsCredential>> {
        let credentials = self
            .inner
            .provide_credentials()
            .await
            .map_err(|e| object_store::Error::Generic {
                store: "S3",
                source: Box::new(e),
            })?;
        Ok(Arc::new(to_object_store_credential(&credentials)))
    }
}
