use serde::Deserialize;
use serde::Serialize;

use k8_types::Crd;
use k8_types::CrdNames;
use k8_types::DefaultHeader;
use k8_types::Spec;
use k8_types::Status;

use super::Condition;
use super::TENANCY_GROUP;
use super::V1ALPHA1;

const CLUSTER_WORKSPACE_TYPE_API: Crd = Crd {
    group: TENANCY_GROUP,
    version: V1ALPHA1,
    names: CrdNames {
        kind: "ClusterWorkspaceType",
        plural: "clusterworkspacetypes",
        singular: "clusterworkspacetype",
    },
};

#[derive(Deserialize, Serialize, Debug, Default, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct ClusterWorkspaceTypeSpec {
    /// workspaces of this type wait for an initializer
    pub initializer: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_child_workspace_type: Option<ClusterWorkspaceTypeReference>,
}

impl Spec for ClusterWorkspaceTypeSpec {
    type Status = ClusterWorkspaceTypeStatus;
    type Header = DefaultHeader;

    const NAME_SPACED: bool = false;

    fn metadata() -> &'static Crd {
        &CLUSTER_WORKSPACE_TYPE_API
    }
}

#[derive(Deserialize, Serialize, Debug, Default, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct ClusterWorkspaceTypeReference {
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub path: String,
}

#[derive(Deserialize, Serialize, Debug, Default, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct ClusterWorkspaceTypeStatus {
    /// endpoints serving workspaces of this type, one per shard
    pub virtual_workspaces: Vec<VirtualWorkspace>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

impl Status for ClusterWorkspaceTypeStatus {}

#[derive(Deserialize, Serialize, Debug, Default, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct VirtualWorkspace {
    pub url: String,
}

impl VirtualWorkspace {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}
