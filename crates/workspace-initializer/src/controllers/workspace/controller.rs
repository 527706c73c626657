//!
//! # Workspace Controller
//!
//! Lists and watches tenant workspaces of every logical cluster and feeds their keys
//! to a pool of workers running the [`Reconcile`] handler.
//!
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::select;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::instrument;
use tracing::trace;
use tracing::warn;

use k8_types::K8Watch;
use kcp_client::ClientError;
use kcp_client::MetadataClient;
use kcp_client::NameSpace;
use kcp_client::SharedClient;

use crate::config::InitializerConfig;
use crate::controllers::queue::WorkQueue;
use crate::objects::ClusterWorkspaceSpec;
use crate::objects::WorkspaceKey;
use crate::objects::WorkspaceObj;

use super::Reconcile;

/// pause before watching again after the server closed the stream
const WATCH_RESTART_DELAY: Duration = Duration::from_millis(500);

pub struct WorkspaceController<C, R> {
    client: SharedClient<C>,
    reconciler: Arc<R>,
    queue: WorkQueue<WorkspaceKey>,
    config: InitializerConfig,
}

impl<C, R> WorkspaceController<C, R>
where
    C: MetadataClient + 'static,
    R: Reconcile,
{
    /// `client` must address the wildcard logical cluster to see every workspace
    pub fn new(client: C, reconciler: R, config: InitializerConfig) -> Self {
        Self {
            client: Arc::new(client),
            reconciler: Arc::new(reconciler),
            queue: WorkQueue::default(),
            config,
        }
    }

    /// run until `token` is cancelled
    pub async fn run(self, token: CancellationToken) {
        let workers = self.config.workers.max(1);
        info!(workers, "starting workspace controller");

        let handles: Vec<JoinHandle<()>> = (0..workers)
            .map(|id| {
                let worker = Worker {
                    id,
                    reconciler: self.reconciler.clone(),
                    queue: self.queue.clone(),
                };
                tokio::spawn(worker.run(token.clone()))
            })
            .collect();

        select! {
            _ = token.cancelled() => {
                info!("shutting down workspace controller");
            },
            _ = self.dispatch_loop() => {}
        }

        self.queue.shutdown();
        for handle in handles {
            if let Err(err) = handle.await {
                error!(%err, "worker terminated abnormally");
            }
        }
    }

    async fn dispatch_loop(&self) {
        loop {
            let delay = match self.inner_loop().await {
                Ok(()) => {
                    debug!("watch stream terminated, reconnecting");
                    WATCH_RESTART_DELAY
                }
                Err(err) => {
                    error!(%err, "error watching workspaces");
                    self.config.resync_error_delay
                }
            };
            sleep(delay).await;
        }
    }

    /// enqueue every workspace, then follow changes from the listed version
    #[instrument(skip(self), name = "WorkspaceController")]
    async fn inner_loop(&self) -> Result<(), ClientError> {
        let list = self
            .client
            .retrieve_items::<ClusterWorkspaceSpec, _>(NameSpace::All)
            .await?;
        let version = list.metadata.resource_version;
        debug!(items = list.items.len(), %version, "retrieved workspaces");
        for workspace in &list.items {
            self.enqueue(workspace);
        }

        let mut stream = self
            .client
            .watch_stream_since::<ClusterWorkspaceSpec, _>(NameSpace::All, Some(version));

        while let Some(batch) = stream.next().await {
            for event in batch? {
                match event? {
                    K8Watch::ADDED(workspace) | K8Watch::MODIFIED(workspace) => {
                        self.enqueue(&workspace)
                    }
                    K8Watch::DELETED(workspace) => {
                        trace!(name = %workspace.metadata.name, "ignoring deleted workspace");
                    }
                }
            }
        }

        Ok(())
    }

    fn enqueue(&self, workspace: &WorkspaceObj) {
        match WorkspaceKey::from_obj(workspace) {
            Some(key) => {
                trace!(%key, "enqueue");
                self.queue.add(key);
            }
            None => warn!(
                name = %workspace.metadata.name,
                "workspace without logical cluster, skipping"
            ),
        }
    }
}

struct Worker<R> {
    id: usize,
    reconciler: Arc<R>,
    queue: WorkQueue<WorkspaceKey>,
}

impl<R> Worker<R>
where
    R: Reconcile,
{
    async fn run(self, token: CancellationToken) {
        debug!(id = self.id, "worker started");
        while let Some(key) = self.queue.get().await {
            select! {
                _ = token.cancelled() => {
                    self.queue.done(&key);
                    break;
                },
                _ = self.process(&key) => {}
            }
            self.queue.done(&key);
        }
        debug!(id = self.id, "worker stopped");
    }

    async fn process(&self, key: &WorkspaceKey) {
        match self.reconciler.reconcile(key).await {
            Ok(result) => {
                self.queue.forget(key);
                if let Some(delay) = result.requeue_after {
                    debug!(%key, ?delay, "requeue");
                    self.queue.add_after(key.clone(), delay);
                }
            }
            Err(err) => {
                let retries = self.queue.num_requeues(key);
                error!(%key, %err, retries, "reconcile failed");
                self.queue.add_rate_limited(key.clone());
            }
        }
    }
}
