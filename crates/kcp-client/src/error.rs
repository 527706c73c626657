use std::time::Duration;

use k8_client::ClientError as K8ClientError;
use k8_config::ConfigError as K8ConfigError;
use k8_types::MetaStatus;

#[derive(thiserror::Error, Debug)]
pub enum ClientError {
    #[error("k8 client error: {0}")]
    K8(K8ClientError),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("already exists: {0}")]
    AlreadyExists(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("api server returned {0:?}")]
    ApiStatus(MetaStatus),
    #[error("{0} is not registered with this client")]
    UnregisteredType(String),
    #[error("request did not complete within {0:?}")]
    Timeout(Duration),
    #[error("client configuration: {0}")]
    Config(#[from] ConfigError),
}

impl ClientError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists(_))
    }

    /// classify a failed response the way the api server reports it
    pub fn from_status(code: u16, status: MetaStatus) -> Self {
        let message = status.message.clone().unwrap_or_default();
        match (code, status.reason.as_deref()) {
            (404, _) | (_, Some("NotFound")) => Self::NotFound(message),
            (409, Some("AlreadyExists")) => Self::AlreadyExists(message),
            (409, _) | (_, Some("Conflict")) => Self::Conflict(message),
            _ => Self::ApiStatus(status),
        }
    }
}

impl From<K8ClientError> for ClientError {
    fn from(err: K8ClientError) -> Self {
        match err {
            K8ClientError::ApiResponse(status) => {
                let code = status.code.unwrap_or_default();
                Self::from_status(code, status)
            }
            other => Self::K8(other),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("k8 config error: {0}")]
    K8(#[from] K8ConfigError),
    #[error("kubeconfig encoding: {0}")]
    Json(#[from] serde_json::Error),
    #[error("pod service account config can not be scoped to a logical cluster")]
    PodConfig,
    #[error("context {0} not found in kubeconfig")]
    MissingContext(String),
    #[error("cluster {0} not found in kubeconfig")]
    MissingCluster(String),
}
