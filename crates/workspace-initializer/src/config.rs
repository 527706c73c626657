use std::time::Duration;

use k8_types::InputK8Obj;
use k8_types::InputObjectMeta;

use crate::objects::APIBindingSpec;

pub const DEFAULT_WORKSPACE_TYPE: &str = "appstudio";
pub const DEFAULT_WORKERS: usize = 2;
pub const DEFAULT_REQUEUE_AFTER: Duration = Duration::from_secs(1);
pub const RESYNC_ERROR_DELAY: Duration = Duration::from_secs(10);

/// Api binding created in every tenant workspace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingTemplate {
    pub name: String,
    pub export_name: String,
    /// logical cluster of the export
    pub path: String,
}

impl BindingTemplate {
    pub fn new(
        name: impl Into<String>,
        export_name: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            export_name: export_name.into(),
            path: path.into(),
        }
    }

    /// platform compute surface
    pub fn workload() -> Self {
        Self::new("crcworkload", "kubernetes", "root:synctarget")
    }

    /// application service extension surface
    pub fn has() -> Self {
        Self::new("has", "application-service-has", "root:has")
    }

    /// bindings are cluster scoped, the tenant is chosen by the client creating it
    pub fn to_input(&self) -> InputK8Obj<APIBindingSpec> {
        InputK8Obj::new(
            APIBindingSpec::workspace_export(self.path.clone(), self.export_name.clone()),
            InputObjectMeta::named(self.name.as_str(), ""),
        )
    }
}

/// Runtime configuration of the initializer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitializerConfig {
    /// empty means the single workspace type present
    pub workspace_type: String,
    pub workers: usize,
    pub requeue_after: Duration,
    pub resync_error_delay: Duration,
    pub first_binding: BindingTemplate,
    pub second_binding: BindingTemplate,
}

impl Default for InitializerConfig {
    fn default() -> Self {
        Self {
            workspace_type: DEFAULT_WORKSPACE_TYPE.to_owned(),
            workers: DEFAULT_WORKERS,
            requeue_after: DEFAULT_REQUEUE_AFTER,
            resync_error_delay: RESYNC_ERROR_DELAY,
            first_binding: BindingTemplate::workload(),
            second_binding: BindingTemplate::has(),
        }
    }
}
