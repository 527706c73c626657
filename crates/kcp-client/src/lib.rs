mod client;
mod cluster;
mod error;
mod limiter;
mod registry;

pub mod config;

#[cfg(any(test, feature = "fixture"))]
pub mod fixture;

pub use client::ClusterClientFactory;
pub use client::KcpClient;
pub use client::KcpClientFactory;
pub use client::MetadataClient;
pub use client::SharedClient;
pub use client::TokenStreamResult;
pub use cluster::CLUSTER_ANNOTATION;
pub use cluster::LogicalCluster;
pub use error::ClientError;
pub use error::ConfigError;
pub use k8_client::meta_client::ListArg;
pub use k8_client::meta_client::NameSpace;
pub use limiter::RateLimiter;
pub use registry::Registry;
pub use registry::RegistryBuilder;
