use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::stream;
use futures_util::stream::BoxStream;
use k8_client::ClientError as K8ClientError;
use k8_client::K8Client;
use k8_client::meta_client::ListArg;
use k8_client::meta_client::MetadataClient as K8MetadataClient;
use k8_client::meta_client::NameSpace;
use k8_config::K8Config;
use k8_types::InputK8Obj;
use k8_types::K8List;
use k8_types::K8Meta;
use k8_types::K8Obj;
use k8_types::K8Watch;
use k8_types::Spec;
use k8_types::UpdateK8ObjStatus;
use parking_lot::Mutex;
use tokio::time::timeout;
use tracing::debug;

use crate::ClientError;
use crate::LogicalCluster;
use crate::RateLimiter;
use crate::Registry;
use crate::config::ClientLimits;
use crate::config::for_cluster;

pub type TokenStreamResult<S> = Result<Vec<Result<K8Watch<S>, ClientError>>, ClientError>;

pub type SharedClient<C> = Arc<C>;

/// Calls the controller makes against one endpoint, usually one logical cluster.
#[async_trait]
pub trait MetadataClient: Send + Sync {
    /// retrieval a single item
    async fn retrieve_item<S, M>(&self, metadata: &M) -> Result<K8Obj<S>, ClientError>
    where
        S: Spec,
        M: K8Meta + Send + Sync;

    async fn retrieve_items_with_option<S, N>(
        &self,
        namespace: N,
        option: Option<ListArg>,
    ) -> Result<K8List<S>, ClientError>
    where
        S: Spec,
        N: Into<NameSpace> + Send + Sync;

    async fn retrieve_items<S, N>(&self, namespace: N) -> Result<K8List<S>, ClientError>
    where
        S: Spec,
        N: Into<NameSpace> + Send + Sync,
    {
        self.retrieve_items_with_option(namespace, None).await
    }

    /// create new object
    async fn create_item<S>(&self, value: InputK8Obj<S>) -> Result<K8Obj<S>, ClientError>
    where
        S: Spec;

    /// create object, treating an existing object of the same name as success.
    /// returns true if this call created it
    async fn ensure_item<S>(&self, value: InputK8Obj<S>) -> Result<bool, ClientError>
    where
        S: Spec,
    {
        let name = value.metadata.name.clone();
        match self.create_item(value).await {
            Ok(_) => {
                debug!(%name, kind = %S::kind(), "created");
                Ok(true)
            }
            Err(err) if err.is_already_exists() => {
                debug!(%name, kind = %S::kind(), "already exists");
                Ok(false)
            }
            Err(err) => Err(err),
        }
    }

    /// replace the status subresource
    async fn update_status<S>(&self, value: &UpdateK8ObjStatus<S>) -> Result<K8Obj<S>, ClientError>
    where
        S: Spec;

    /// stream items since resource versions
    fn watch_stream_since<S, N>(
        &self,
        namespace: N,
        resource_version: Option<String>,
    ) -> BoxStream<'_, TokenStreamResult<S>>
    where
        S: Spec + 'static,
        S::Status: 'static,
        S::Header: 'static,
        N: Into<NameSpace>;
}

/// Produces clients bound to a single logical cluster.
pub trait ClusterClientFactory: Send + Sync {
    type Client: MetadataClient;

    /// no network call happens until the client is used
    fn cluster_client(&self, cluster: &LogicalCluster) -> Result<Self::Client, ClientError>;
}

/// [`K8Client`] restricted to registered types and throttled by a shared limiter
#[derive(Clone)]
pub struct KcpClient {
    inner: Arc<K8Client>,
    registry: Arc<Registry>,
    limiter: Arc<RateLimiter>,
    limits: ClientLimits,
}

impl KcpClient {
    pub fn new(config: K8Config, registry: Arc<Registry>, limits: ClientLimits) -> Result<Self, ClientError> {
        let limiter = Arc::new(RateLimiter::new(limits.qps, limits.burst));
        Self::with_limiter(config, registry, limiter, limits)
    }

    fn with_limiter(
        config: K8Config,
        registry: Arc<Registry>,
        limiter: Arc<RateLimiter>,
        limits: ClientLimits,
    ) -> Result<Self, ClientError> {
        Ok(Self {
            inner: Arc::new(K8Client::new(config)?),
            registry,
            limiter,
            limits,
        })
    }

    async fn call<T, F>(&self, request: F) -> Result<T, ClientError>
    where
        F: Future<Output = Result<T, K8ClientError>> + Send,
    {
        self.limiter.acquire().await;
        match self.limits.timeout {
            Some(limit) => timeout(limit, request)
                .await
                .map_err(|_| ClientError::Timeout(limit))?
                .map_err(ClientError::from),
            None => request.await.map_err(ClientError::from),
        }
    }
}

#[async_trait]
impl MetadataClient for KcpClient {
    async fn retrieve_item<S, M>(&self, metadata: &M) -> Result<K8Obj<S>, ClientError>
    where
        S: Spec,
        M: K8Meta + Send + Sync,
    {
        self.registry.check::<S>()?;
        self.call(self.inner.retrieve_item::<S, M>(metadata)).await
    }

    async fn retrieve_items_with_option<S, N>(
        &self,
        namespace: N,
        option: Option<ListArg>,
    ) -> Result<K8List<S>, ClientError>
    where
        S: Spec,
        N: Into<NameSpace> + Send + Sync,
    {
        self.registry.check::<S>()?;
        self.call(self.inner.retrieve_items_with_option::<S, N>(namespace, option))
            .await
    }

    async fn create_item<S>(&self, value: InputK8Obj<S>) -> Result<K8Obj<S>, ClientError>
    where
        S: Spec,
    {
        self.registry.check::<S>()?;
        self.call(self.inner.create_item(value)).await
    }

    async fn update_status<S>(&self, value: &UpdateK8ObjStatus<S>) -> Result<K8Obj<S>, ClientError>
    where
        S: Spec,
    {
        self.registry.check::<S>()?;
        self.call(self.inner.update_status(value)).await
    }

    fn watch_stream_since<S, N>(
        &self,
        namespace: N,
        resource_version: Option<String>,
    ) -> BoxStream<'_, TokenStreamResult<S>>
    where
        S: Spec + 'static,
        S::Status: 'static,
        S::Header: 'static,
        N: Into<NameSpace>,
    {
        if let Err(err) = self.registry.check::<S>() {
            return stream::once(async move { Err(err) }).boxed();
        }

        self.inner
            .watch_stream_since::<S, N>(namespace, resource_version)
            .map(|batch| match batch {
                Ok(events) => Ok(events
                    .into_iter()
                    .map(|event| event.map_err(ClientError::from))
                    .collect()),
                Err(err) => Err(err.into()),
            })
            .boxed()
    }
}

/// Builds [`KcpClient`]s for logical clusters below one base configuration.
/// Clients are built once per cluster and all of them share one limiter.
pub struct KcpClientFactory {
    base: K8Config,
    registry: Arc<Registry>,
    limits: ClientLimits,
    limiter: Arc<RateLimiter>,
    clients: Mutex<HashMap<LogicalCluster, KcpClient>>,
}

impl KcpClientFactory {
    pub fn new(base: K8Config, registry: Arc<Registry>, limits: ClientLimits) -> Self {
        Self {
            base,
            registry,
            limiter: Arc::new(RateLimiter::new(limits.qps, limits.burst)),
            limits,
            clients: Mutex::new(HashMap::new()),
        }
    }
}

impl ClusterClientFactory for KcpClientFactory {
    type Client = KcpClient;

    fn cluster_client(&self, cluster: &LogicalCluster) -> Result<KcpClient, ClientError> {
        let mut clients = self.clients.lock();
        if let Some(client) = clients.get(cluster) {
            return Ok(client.clone());
        }

        debug!(%cluster, "building cluster client");
        let client = KcpClient::with_limiter(
            for_cluster(&self.base, cluster)?,
            self.registry.clone(),
            self.limiter.clone(),
            self.limits,
        )?;
        clients.insert(cluster.clone(), client.clone());
        Ok(client)
    }
}
