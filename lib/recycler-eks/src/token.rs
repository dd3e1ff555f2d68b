//! IAM-derived bearer tokens for the EKS authentication webhook
//!
//! A token is a SigV4 presigned STS `GetCallerIdentity` URL, bound to the
//! cluster through the signed `x-k8s-aws-id` header, base64url encoded and
//! prefixed with `k8s-aws-v1.`. The webhook replays the URL against STS to
//! learn who the caller is.

use crate::{ClusterDescriptor, EksError, Result};
use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_credential_types::provider::ProvideCredentials;
use aws_credential_types::Credentials;
use aws_sdk_sts::config::Region;
use aws_sdk_sts::error::DisplayErrorContext;
use aws_sigv4::http_request::{
    sign, SignableBody, SignableRequest, SignatureLocation, SigningParams, SigningSettings,
};
use aws_sigv4::sign::v4;
use aws_smithy_runtime_api::client::identity::Identity;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use std::fmt;
use std::time::{Duration, SystemTime};
use tracing::{debug, info};
use url::Url;

pub const TOKEN_PREFIX: &str = "k8s-aws-v1.";
pub const CLUSTER_ID_HEADER: &str = "x-k8s-aws-id";
const TOKEN_EXPIRY: Duration = Duration::from_secs(60);

/// Short-lived bearer credential for one client configuration
#[derive(Clone)]
pub struct Credential {
    bearer_token: String,
    pub issued_at: DateTime<Utc>,
    /// ARN of the identity the token was derived from
    pub derivation_source: String,
}

impl Credential {
    pub fn new(
        bearer_token: impl Into<String>,
        issued_at: DateTime<Utc>,
        derivation_source: impl Into<String>,
    ) -> Self {
        Self {
            bearer_token: bearer_token.into(),
            issued_at,
            derivation_source: derivation_source.into(),
        }
    }

    pub fn bearer_token(&self) -> &str {
        &self.bearer_token
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("bearer_token", &"<redacted>")
            .field("issued_at", &self.issued_at)
            .field("derivation_source", &self.derivation_source)
            .finish()
    }
}

/// Derives a cluster credential from the ambient caller identity
#[async_trait]
pub trait CredentialMinter: Send + Sync {
    async fn mint(&self, cluster: &ClusterDescriptor) -> Result<Credential>;
}

/// CredentialMinter using STS and the SDK credential chain
pub struct IamTokenMinter {
    sdk: SdkConfig,
}

impl IamTokenMinter {
    pub fn new(sdk: SdkConfig) -> Self {
        Self { sdk }
    }

    async fn caller_arn(&self, region: &str) -> Result<String> {
        let config = aws_sdk_sts::config::Builder::from(&self.sdk)
            .region(Region::new(region.to_string()))
            .build();
        let output = aws_sdk_sts::Client::from_conf(config)
            .get_caller_identity()
            .send()
            .await
            .map_err(|e| {
                EksError::CredentialDerivation(format!(
                    "unable to resolve caller identity: {}",
                    DisplayErrorContext(&e)
                ))
            })?;

        output.arn().map(str::to_string).ok_or_else(|| {
            EksError::CredentialDerivation("caller identity has no ARN".to_string())
        })
    }

    async fn credentials(&self) -> Result<Credentials> {
        let provider = self.sdk.credentials_provider().ok_or_else(|| {
            EksError::CredentialDerivation("no AWS credentials provider configured".to_string())
        })?;
        provider.provide_credentials().await.map_err(|e| {
            EksError::CredentialDerivation(format!("unable to load AWS credentials: {}", e))
        })
    }
}

#[async_trait]
impl CredentialMinter for IamTokenMinter {
    async fn mint(&self, cluster: &ClusterDescriptor) -> Result<Credential> {
        let principal = self.caller_arn(&cluster.region).await?;
        debug!("Caller identity resolved as {}", principal);

        let credentials = self.credentials().await?;
        let now = SystemTime::now();
        let token = presign_token(&credentials, &cluster.identifier, &cluster.region, now)?;

        info!(
            principal = %principal,
            cluster = %cluster.identifier,
            "Minted cluster bearer token"
        );
        Ok(Credential::new(token, DateTime::<Utc>::from(now), principal))
    }
}

fn signing_error(err: impl fmt::Display) -> EksError {
    EksError::CredentialDerivation(format!("unable to presign token request: {}", err))
}

/// Build the bearer token for `cluster_name` from resolved AWS credentials
pub fn presign_token(
    credentials: &Credentials,
    cluster_name: &str,
    region: &str,
    time: SystemTime,
) -> Result<String> {
    let identity = Identity::from(credentials.clone());

    let mut settings = SigningSettings::default();
    settings.signature_location = SignatureLocation::QueryParams;
    settings.expires_in = Some(TOKEN_EXPIRY);

    let params: SigningParams<'_> = v4::SigningParams::builder()
        .identity(&identity)
        .region(region)
        .name("sts")
        .time(time)
        .settings(settings)
        .build()
        .map_err(signing_error)?
        .into();

    let mut url = Url::parse(&format!(
        "https://sts.{}.amazonaws.com/?Action=GetCallerIdentity&Version=2011-06-15",
        region
    ))
    .map_err(signing_error)?;
    let unsigned = url.to_string();

    let signable = SignableRequest::new(
        "GET",
        unsigned.as_str(),
        [(CLUSTER_ID_HEADER, cluster_name)].into_iter(),
        SignableBody::Bytes(&[]),
    )
    .map_err(signing_error)?;
    let (instructions, _signature) = sign(signable, &params).map_err(signing_error)?.into_parts();

    {
        let mut query = url.query_pairs_mut();
        for (name, value) in instructions.params() {
            query.append_pair(name, value);
        }
    }

    Ok(format!("{}{}", TOKEN_PREFIX, URL_SAFE_NO_PAD.encode(url.as_str())))
}
