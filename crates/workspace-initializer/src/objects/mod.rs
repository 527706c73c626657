//!
//! # kcp objects
//!
//! Resource types addressed by the initializer.
//!
mod binding;
mod secret;
mod workspace;
mod workspace_type;

pub use binding::*;
pub use secret::*;
pub use workspace::*;
pub use workspace_type::*;

use std::sync::Arc;

use kcp_client::Registry;

pub const TENANCY_GROUP: &str = "tenancy.kcp.dev";
pub const APIS_GROUP: &str = "apis.kcp.dev";
pub const V1ALPHA1: &str = "v1alpha1";

/// every type the initializer is allowed to address
pub fn registry() -> Arc<Registry> {
    Registry::builder()
        .register::<ClusterWorkspaceSpec>()
        .register::<ClusterWorkspaceTypeSpec>()
        .register::<APIBindingSpec>()
        .register::<SecretSpec>()
        .build()
}

#[cfg(test)]
mod test {

    use k8_types::Spec;

    use super::*;

    #[test]
    fn test_registry_covers_all_types() {
        let registry = registry();
        assert_eq!(registry.len(), 4);
        assert!(registry.contains::<ClusterWorkspaceSpec>());
        assert!(registry.contains::<APIBindingSpec>());
        assert!(registry.contains::<SecretSpec>());
    }

    #[test]
    fn test_api_versions() {
        assert_eq!(ClusterWorkspaceSpec::api_version(), "tenancy.kcp.dev/v1alpha1");
        assert_eq!(APIBindingSpec::api_version(), "apis.kcp.dev/v1alpha1");
        assert_eq!(SecretSpec::api_version(), "v1");
        assert!(!ClusterWorkspaceSpec::NAME_SPACED);
        assert!(SecretSpec::NAME_SPACED);
    }
}
