use serde::Deserialize;
use serde::Serialize;

use k8_types::Crd;
use k8_types::CrdNames;
use k8_types::DefaultHeader;
use k8_types::Spec;
use k8_types::Status;

use super::APIS_GROUP;
use super::Condition;
use super::V1ALPHA1;

const API_BINDING_API: Crd = Crd {
    group: APIS_GROUP,
    version: V1ALPHA1,
    names: CrdNames {
        kind: "APIBinding",
        plural: "apibindings",
        singular: "apibinding",
    },
};

/// Binds an exported api into the logical cluster it is created in
#[derive(Deserialize, Serialize, Debug, Default, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct APIBindingSpec {
    pub reference: ExportReference,
}

impl Spec for APIBindingSpec {
    type Status = APIBindingStatus;
    type Header = DefaultHeader;

    const NAME_SPACED: bool = false;

    fn metadata() -> &'static Crd {
        &API_BINDING_API
    }
}

impl APIBindingSpec {
    pub fn workspace_export(path: impl Into<String>, export_name: impl Into<String>) -> Self {
        Self {
            reference: ExportReference {
                workspace: Some(WorkspaceExportReference {
                    path: path.into(),
                    export_name: export_name.into(),
                }),
            },
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Default, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct ExportReference {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace: Option<WorkspaceExportReference>,
}

#[derive(Deserialize, Serialize, Debug, Default, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkspaceExportReference {
    /// logical cluster holding the export
    pub path: String,
    pub export_name: String,
}

#[derive(Deserialize, Serialize, Debug, Default, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct APIBindingStatus {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

impl Status for APIBindingStatus {}
