use std::collections::HashSet;
use std::sync::Arc;

use k8_types::Spec;

use crate::ClientError;

/// Resource types a client is allowed to address.
/// Built once at startup and shared read-only with every client.
#[derive(Debug, Default, Clone)]
pub struct Registry {
    types: HashSet<(String, String)>,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    pub fn contains<S: Spec>(&self) -> bool {
        self.types.contains(&(S::api_version(), S::kind()))
    }

    pub fn check<S: Spec>(&self) -> Result<(), ClientError> {
        if self.contains::<S>() {
            Ok(())
        } else {
            Err(ClientError::UnregisteredType(format!(
                "{}/{}",
                S::api_version(),
                S::kind()
            )))
        }
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct RegistryBuilder {
    types: HashSet<(String, String)>,
}

impl RegistryBuilder {
    pub fn register<S: Spec>(mut self) -> Self {
        self.types.insert((S::api_version(), S::kind()));
        self
    }

    pub fn build(self) -> Arc<Registry> {
        Arc::new(Registry { types: self.types })
    }
}
