use std::fmt;

use chrono::SecondsFormat;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

use k8_types::Crd;
use k8_types::CrdNames;
use k8_types::DefaultHeader;
use k8_types::K8Obj;
use k8_types::Spec;
use k8_types::Status;
use kcp_client::LogicalCluster;

use super::ClusterWorkspaceTypeReference;
use super::TENANCY_GROUP;
use super::V1ALPHA1;

const CLUSTER_WORKSPACE_API: Crd = Crd {
    group: TENANCY_GROUP,
    version: V1ALPHA1,
    names: CrdNames {
        kind: "ClusterWorkspace",
        plural: "clusterworkspaces",
        singular: "clusterworkspace",
    },
};

pub const INITIALIZED_CONDITION: &str = "Initialized";
pub const BINDING_FAILED_REASON: &str = "APIBindingFailed";

pub type WorkspaceObj = K8Obj<ClusterWorkspaceSpec>;

/// Tenant workspace, a child logical cluster of the one it is created in
#[derive(Deserialize, Serialize, Debug, Default, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct ClusterWorkspaceSpec {
    #[serde(rename = "type")]
    pub type_: ClusterWorkspaceTypeReference,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shard: Option<ShardConstraints>,
}

impl Spec for ClusterWorkspaceSpec {
    type Status = ClusterWorkspaceStatus;
    type Header = DefaultHeader;

    const NAME_SPACED: bool = false;

    fn metadata() -> &'static Crd {
        &CLUSTER_WORKSPACE_API
    }
}

#[derive(Deserialize, Serialize, Debug, Default, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct ShardConstraints {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Deserialize, Serialize, Debug, Default, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct ClusterWorkspaceStatus {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
    /// controllers that still have to process the workspace
    pub initializers: Vec<String>,
    #[serde(rename = "baseURL", skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
    /// fields owned by other controllers, sent back unchanged on a status update
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Status for ClusterWorkspaceStatus {}

impl ClusterWorkspaceStatus {
    pub fn condition(&self, type_: &str) -> Option<&Condition> {
        self.conditions.iter().find(|c| c.type_ == type_)
    }

    /// replace the condition of the same type.
    /// transition time is kept when the status does not change
    pub fn set_condition(&mut self, mut condition: Condition) {
        match self.conditions.iter_mut().find(|c| c.type_ == condition.type_) {
            Some(existing) => {
                if existing.status == condition.status {
                    condition.last_transition_time = existing.last_transition_time.take();
                }
                *existing = condition;
            }
            None => self.conditions.push(condition),
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Default, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct Condition {
    #[serde(rename = "type")]
    pub type_: String,
    pub status: ConditionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Condition {
    pub fn new(type_: impl Into<String>, status: ConditionStatus) -> Self {
        Self {
            type_: type_.into(),
            status,
            last_transition_time: Some(Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)),
            ..Default::default()
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>, message: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self.message = Some(message.into());
        self
    }

    pub fn is_true(&self) -> bool {
        self.status == ConditionStatus::True
    }
}

#[derive(Deserialize, Serialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum ConditionStatus {
    True,
    False,
    #[default]
    Unknown,
}

/// Identity of a tenant workspace: parent logical cluster and name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkspaceKey {
    pub cluster: LogicalCluster,
    pub name: String,
}

impl WorkspaceKey {
    pub fn new(cluster: impl Into<LogicalCluster>, name: impl Into<String>) -> Self {
        Self {
            cluster: cluster.into(),
            name: name.into(),
        }
    }

    /// key of an object seen thru a cross cluster list or watch
    pub fn from_obj(obj: &WorkspaceObj) -> Option<Self> {
        LogicalCluster::of(&obj.metadata)
            .map(|cluster| Self::new(cluster, obj.metadata.name.clone()))
    }

    /// logical cluster of the tenant itself
    pub fn tenant_cluster(&self) -> LogicalCluster {
        self.cluster.join(&self.name)
    }
}

impl fmt::Display for WorkspaceKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}|{}", self.cluster, self.name)
    }
}
