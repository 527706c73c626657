//!
//! # Member cluster credentials
//!
//! Toolchain operators publish a secret per member cluster. The secret carries the
//! api url as the `url` annotation and the service account token and CA in its data.
//!
use std::time::Duration;

use tracing::debug;
use tracing::info;
use tracing::instrument;
use tracing::warn;

use k8_config::K8Config;
use kcp_client::ListArg;
use kcp_client::MetadataClient;
use kcp_client::config::ClientLimits;
use kcp_client::config::token_config;

use crate::CredentialError;
use crate::objects::SecretObj;
use crate::objects::SecretSpec;

pub const HOST_OPERATOR_NAMESPACE: &str = "toolchain-host-operator";
pub const MEMBER_OPERATOR_NAMESPACE: &str = "toolchain-member-operator";

pub const LABEL_TYPE: &str = "type";
pub const LABEL_NAMESPACE: &str = "namespace";
pub const LABEL_OWNER_CLUSTER_NAME: &str = "ownerClusterName";

pub const URL_ANNOTATION: &str = "url";
pub const TOKEN_KEY: &str = "token";
pub const CA_CRT_KEY: &str = "ca.crt";

pub const CLUSTER_QPS: f32 = 20.0;
pub const CLUSTER_BURST: u32 = 30;
pub const CLUSTER_TIMEOUT: Duration = Duration::from_secs(10);

/// Narrows the secrets considered by their cluster labels
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CredentialSelector {
    pub cluster_type: Option<String>,
    pub namespace: Option<String>,
    pub owner_cluster_name: Option<String>,
}

impl CredentialSelector {
    /// `None` when every secret in the namespace is selected
    pub fn label_selector(&self) -> Option<String> {
        let terms: Vec<String> = [
            (LABEL_TYPE, &self.cluster_type),
            (LABEL_NAMESPACE, &self.namespace),
            (LABEL_OWNER_CLUSTER_NAME, &self.owner_cluster_name),
        ]
        .into_iter()
        .filter_map(|(label, value)| value.as_ref().map(|value| format!("{label}={value}")))
        .collect();

        if terms.is_empty() {
            None
        } else {
            Some(terms.join(","))
        }
    }
}

/// Connection to one member cluster
#[derive(Debug, Clone)]
pub struct ClusterConfig {
    /// name of the secret it was loaded from
    pub name: String,
    pub url: String,
    pub config: K8Config,
    pub limits: ClientLimits,
}

/// Load the connection of every cluster published in `namespace`.
/// Either all selected secrets are usable or nothing is returned.
#[instrument(skip(client, selector))]
pub async fn load_cluster_configs<C>(
    client: &C,
    namespace: &str,
    selector: &CredentialSelector,
) -> Result<Vec<ClusterConfig>, CredentialError>
where
    C: MetadataClient,
{
    let option = selector.label_selector().map(|label_selector| ListArg {
        label_selector: Some(label_selector),
        ..Default::default()
    });
    let secrets = client
        .retrieve_items_with_option::<SecretSpec, _>(namespace, option)
        .await?
        .items;

    if secrets.is_empty() {
        let all = client
            .retrieve_items::<SecretSpec, _>(namespace)
            .await?
            .items;
        info!(
            namespace,
            total = all.len(),
            "no cluster secret matches the selector"
        );
        return Ok(vec![]);
    }

    let mut configs = vec![];
    for secret in secrets {
        if let Some(config) = cluster_config(secret)? {
            configs.push(config);
        }
    }

    debug!(clusters = configs.len(), "loaded cluster configs");
    Ok(configs)
}

fn cluster_config(secret: SecretObj) -> Result<Option<ClusterConfig>, CredentialError> {
    let name = secret.metadata.name.clone();
    let Some(url) = secret.metadata.annotations.get(URL_ANNOTATION).cloned() else {
        warn!(secret = %name, "the url annotation is not set, skipping");
        return Ok(None);
    };

    let token = required_data(&secret, TOKEN_KEY)?;
    let ca = required_data(&secret, CA_CRT_KEY)?;

    let token = String::from_utf8(token).map_err(|source| CredentialError::InvalidToken {
        secret: name.clone(),
        source,
    })?;

    let config = token_config(&name, &url, token.trim(), &ca).map_err(|source| {
        CredentialError::Config {
            secret: name.clone(),
            source,
        }
    })?;

    Ok(Some(ClusterConfig {
        name,
        url,
        config,
        limits: ClientLimits {
            qps: CLUSTER_QPS,
            burst: CLUSTER_BURST,
            timeout: Some(CLUSTER_TIMEOUT),
        },
    }))
}

fn required_data(secret: &SecretObj, key: &'static str) -> Result<Vec<u8>, CredentialError> {
    let missing = || CredentialError::MissingData {
        secret: secret.metadata.name.clone(),
        key,
    };
    match secret.header.decoded(key) {
        None => Err(missing()),
        Some(Err(source)) => Err(CredentialError::Base64 {
            secret: secret.metadata.name.clone(),
            key,
            source,
        }),
        Some(Ok(value)) if value.is_empty() => Err(missing()),
        Some(Ok(value)) => Ok(value),
    }
}
