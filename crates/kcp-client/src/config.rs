//!
//! # Connection configuration
//!
//! Kubeconfig parsing belongs to `k8-config`. This module copies a loaded
//! configuration with another server, which is how a single logical cluster
//! or a virtual workspace gets addressed, and assembles configurations for
//! clusters known only by url, token and CA.
//!
use std::path::Path;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use k8_config::K8Config;
use k8_config::KubeConfig;
use k8_config::KubeContext;
use serde_json::json;
use tracing::debug;

use crate::ConfigError;
use crate::LogicalCluster;

pub const DEFAULT_QPS: f32 = 5.0;
pub const DEFAULT_BURST: u32 = 10;

const DEFAULT_NAMESPACE: &str = "default";

/// Client side throttling applied on top of a [`K8Config`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClientLimits {
    pub qps: f32,
    pub burst: u32,
    pub timeout: Option<Duration>,
}

impl Default for ClientLimits {
    fn default() -> Self {
        Self {
            qps: DEFAULT_QPS,
            burst: DEFAULT_BURST,
            timeout: None,
        }
    }
}

/// Load from an explicit kubeconfig, otherwise the way `k8-config` finds one.
/// `context` overrides the current context of the file.
pub fn load_config(kubeconfig: Option<&Path>, context: Option<&str>) -> Result<K8Config, ConfigError> {
    let mut kube_config = match kubeconfig {
        Some(path) => {
            debug!(path = %path.display(), "loading kubeconfig");
            KubeConfig::from_file(path)?
        }
        None => match K8Config::load()? {
            K8Config::Pod(_) => return Err(ConfigError::PodConfig),
            K8Config::KubeConfig(kube_context) if context.is_none() => {
                return Ok(K8Config::KubeConfig(kube_context));
            }
            K8Config::KubeConfig(kube_context) => kube_context.config,
        },
    };

    if let Some(context) = context {
        kube_config.current_context = context.to_owned();
    }
    kube_context(kube_config).map(K8Config::KubeConfig)
}

/// server every request goes to, pod configurations have a fixed one
pub fn api_path(config: &K8Config) -> Option<&str> {
    match config {
        K8Config::Pod(_) => None,
        K8Config::KubeConfig(kube_context) => Some(&kube_context.api_path),
    }
}

/// copy of `config` sending requests to `host`, credentials are kept
pub fn with_host(config: &K8Config, host: &str) -> Result<K8Config, ConfigError> {
    let K8Config::KubeConfig(kube_context) = config else {
        return Err(ConfigError::PodConfig);
    };

    let mut kube_config: KubeConfig = serde_json::from_value(serde_json::to_value(&kube_context.config)?)?;
    let cluster_name = kube_config
        .current_context()
        .map(|context| context.context.cluster.clone())
        .ok_or_else(|| ConfigError::MissingContext(kube_config.current_context.clone()))?;
    let cluster = kube_config
        .clusters
        .iter_mut()
        .find(|cluster| cluster.name == cluster_name)
        .ok_or(ConfigError::MissingCluster(cluster_name))?;
    cluster.cluster.server = host.to_owned();

    Ok(K8Config::KubeConfig(KubeContext {
        namespace: kube_context.namespace.clone(),
        api_path: host.to_owned(),
        config: kube_config,
    }))
}

/// copy of `config` addressing a single logical cluster below its server
pub fn for_cluster(config: &K8Config, cluster: &LogicalCluster) -> Result<K8Config, ConfigError> {
    let base = api_path(config).ok_or(ConfigError::PodConfig)?;
    let host = format!("{}{}", base.trim_end_matches('/'), cluster.path());
    with_host(config, &host)
}

/// configuration authenticating with a bearer token and trusting `ca_data`
pub fn token_config(name: &str, url: &str, token: &str, ca_data: &[u8]) -> Result<K8Config, ConfigError> {
    let kube_config: KubeConfig = serde_json::from_value(json!({
        "apiVersion": "v1",
        "kind": "Config",
        "current-context": name,
        "clusters": [{
            "name": name,
            "cluster": {
                "server": url,
                "certificate-authority-data": STANDARD.encode(ca_data),
            }
        }],
        "contexts": [{
            "name": name,
            "context": { "cluster": name, "user": name }
        }],
        "users": [{
            "name": name,
            "user": { "token": token }
        }],
    }))?;
    kube_context(kube_config).map(K8Config::KubeConfig)
}

fn kube_context(config: KubeConfig) -> Result<KubeContext, ConfigError> {
    let context = config
        .current_context()
        .ok_or_else(|| ConfigError::MissingContext(config.current_context.clone()))?;
    let namespace = context
        .context
        .namespace
        .clone()
        .unwrap_or_else(|| DEFAULT_NAMESPACE.to_owned());
    let api_path = config
        .current_cluster()
        .map(|cluster| cluster.cluster.server.clone())
        .ok_or_else(|| ConfigError::MissingCluster(context.context.cluster.clone()))?;

    Ok(KubeContext {
        namespace,
        api_path,
        config,
    })
}
