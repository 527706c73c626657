use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;
use tracing::info;
use tracing::instrument;
use tracing::warn;

use k8_types::InputObjectMeta;
use kcp_client::ClientError;
use kcp_client::ClusterClientFactory;
use kcp_client::LogicalCluster;
use kcp_client::MetadataClient;

use crate::ReconcileError;
use crate::config::BindingTemplate;
use crate::config::InitializerConfig;
use crate::objects::BINDING_FAILED_REASON;
use crate::objects::ClusterWorkspaceSpec;
use crate::objects::Condition;
use crate::objects::ConditionStatus;
use crate::objects::INITIALIZED_CONDITION;
use crate::objects::WorkspaceKey;
use crate::objects::WorkspaceObj;

use super::Action;
use super::ReconcileState;
use super::StepOutcome;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileResult {
    pub requeue_after: Option<Duration>,
}

impl ReconcileResult {
    pub fn done() -> Self {
        Self::default()
    }

    pub fn requeue_after(delay: Duration) -> Self {
        Self {
            requeue_after: Some(delay),
        }
    }
}

/// Level triggered handler of a single key
#[async_trait]
pub trait Reconcile: Send + Sync + 'static {
    async fn reconcile(&self, key: &WorkspaceKey) -> Result<ReconcileResult, ReconcileError>;
}

/// Binds platform apis into new tenant workspaces, then releases them
/// by clearing their initializers.
///
/// Every initializer is removed, not only the one of this controller.
/// kcp does not finish initialization otherwise, which also means
/// other initializers of the same workspace lose their chance to run.
pub struct WorkspaceReconciler<F> {
    factory: F,
    config: InitializerConfig,
}

impl<F> WorkspaceReconciler<F>
where
    F: ClusterClientFactory,
{
    pub fn new(factory: F, config: InitializerConfig) -> Self {
        Self { factory, config }
    }

    async fn execute(
        &self,
        action: Action,
        pass: &mut Pass<'_, F::Client>,
    ) -> Result<StepOutcome, ReconcileError> {
        match action {
            Action::FetchWorkspace => self.fetch(pass).await,
            Action::EnsureFirstBinding => {
                self.ensure_binding(pass, action, &self.config.first_binding)
                    .await
            }
            Action::EnsureSecondBinding => {
                self.ensure_binding(pass, action, &self.config.second_binding)
                    .await
            }
            Action::ClearInitializers => self.clear_initializers(pass).await,
        }
    }

    async fn fetch(&self, pass: &mut Pass<'_, F::Client>) -> Result<StepOutcome, ReconcileError> {
        match pass
            .parent
            .retrieve_item::<ClusterWorkspaceSpec, _>(&InputObjectMeta::named(pass.key.name.as_str(), ""))
            .await
        {
            Ok(workspace) => {
                debug!(tenant = %pass.tenant_cluster, "reconciling for cluster");
                pass.tenant = Some(self.factory.cluster_client(&pass.tenant_cluster)?);
                pass.workspace = Some(workspace);
                Ok(StepOutcome::Found)
            }
            Err(err) if err.is_not_found() => {
                debug!("workspace is gone");
                Ok(StepOutcome::NotFound)
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn ensure_binding(
        &self,
        pass: &Pass<'_, F::Client>,
        action: Action,
        template: &BindingTemplate,
    ) -> Result<StepOutcome, ReconcileError> {
        let tenant = pass.tenant.as_ref().ok_or(ReconcileError::OutOfOrder(action))?;
        debug!(binding = %template.name, "ensuring api binding");
        match tenant.ensure_item(template.to_input()).await {
            Ok(true) => {
                info!(binding = %template.name, "created api binding");
                Ok(StepOutcome::Created)
            }
            Ok(false) => Ok(StepOutcome::AlreadyExists),
            Err(err) => {
                self.record_binding_failure(pass, template, &err).await;
                Err(err.into())
            }
        }
    }

    /// best effort, the binding error is what gets reported
    async fn record_binding_failure(
        &self,
        pass: &Pass<'_, F::Client>,
        template: &BindingTemplate,
        err: &ClientError,
    ) {
        let Some(workspace) = &pass.workspace else {
            return;
        };

        let message = format!("creating api binding {}: {}", template.name, err);
        if let Some(current) = workspace.status.condition(INITIALIZED_CONDITION) {
            if current.status == ConditionStatus::False
                && current.reason.as_deref() == Some(BINDING_FAILED_REASON)
                && current.message.as_deref() == Some(message.as_str())
            {
                return;
            }
        }

        let mut status = workspace.status.clone();
        status.set_condition(
            Condition::new(INITIALIZED_CONDITION, ConditionStatus::False)
                .with_reason(BINDING_FAILED_REASON, message),
        );
        if let Err(update_err) = pass
            .parent
            .update_status(&workspace.as_status_update(status))
            .await
        {
            warn!(%update_err, "unable to record binding failure");
        }
    }

    async fn clear_initializers(
        &self,
        pass: &Pass<'_, F::Client>,
    ) -> Result<StepOutcome, ReconcileError> {
        let workspace = pass
            .workspace
            .as_ref()
            .ok_or(ReconcileError::OutOfOrder(Action::ClearInitializers))?;

        if workspace.status.initializers.is_empty() {
            debug!("initializers already cleared");
            return Ok(StepOutcome::AlreadyCleared);
        }

        info!(
            initializers = ?workspace.status.initializers,
            "removing all initializers"
        );
        let mut status = workspace.status.clone();
        status.initializers.clear();
        status.set_condition(Condition::new(INITIALIZED_CONDITION, ConditionStatus::True));
        pass.parent
            .update_status(&workspace.as_status_update(status))
            .await?;
        Ok(StepOutcome::Cleared)
    }
}

#[async_trait]
impl<F> Reconcile for WorkspaceReconciler<F>
where
    F: ClusterClientFactory + 'static,
    F::Client: 'static,
{
    #[instrument(skip_all, fields(%key))]
    async fn reconcile(&self, key: &WorkspaceKey) -> Result<ReconcileResult, ReconcileError> {
        let mut pass = Pass {
            key,
            parent: self.factory.cluster_client(&key.cluster)?,
            tenant_cluster: key.tenant_cluster(),
            tenant: None,
            workspace: None,
        };

        let mut state = ReconcileState::Pending;
        while let Some(action) = state.next_action() {
            let outcome = self.execute(action, &mut pass).await?;
            let next = state.advance(outcome)?;
            debug!(?action, ?outcome, from = ?state, to = ?next, "advanced");
            state = next;
        }

        match state {
            ReconcileState::Requeued => Ok(ReconcileResult::requeue_after(self.config.requeue_after)),
            _ => Ok(ReconcileResult::done()),
        }
    }
}

/// what a reconciliation pass learned so far
struct Pass<'a, C> {
    key: &'a WorkspaceKey,
    parent: C,
    tenant_cluster: LogicalCluster,
    tenant: Option<C>,
    workspace: Option<WorkspaceObj>,
}

#[cfg(test)]
mod test {

    use std::time::Duration;

    use kcp_client::fixture::MemoryCluster;
    use kcp_client::fixture::Operation;
    use kcp_client::fixture::Verb;
    use kcp_client::fixture::failure_status;
    use serde_json::json;

    use crate::ReconcileError;
    use crate::config::InitializerConfig;
    use crate::objects::APIBindingSpec;
    use crate::objects::BINDING_FAILED_REASON;
    use crate::objects::ClusterWorkspaceSpec;
    use crate::objects::ClusterWorkspaceStatus;
    use crate::objects::INITIALIZED_CONDITION;
    use crate::objects::WorkspaceKey;
    use crate::objects::WorkspaceObj;
    use crate::objects::registry;

    use super::Reconcile;
    use super::ReconcileResult;
    use super::WorkspaceReconciler;

    fn new_workspace(store: &MemoryCluster, cluster: &str, name: &str) -> WorkspaceKey {
        let workspace = WorkspaceObj::new(name.to_owned(), ClusterWorkspaceSpec::default()).set_status(
            ClusterWorkspaceStatus {
                phase: Some("Initializing".to_owned()),
                initializers: vec![
                    "root:appstudio".to_owned(),
                    "root:other-initializer".to_owned(),
                ],
                ..Default::default()
            },
        );
        store.insert(cluster, workspace);
        WorkspaceKey::new(cluster, name)
    }

    fn reconciler(store: &MemoryCluster) -> WorkspaceReconciler<MemoryCluster> {
        WorkspaceReconciler::new(store.clone(), InitializerConfig::default())
    }

    fn creates(store: &MemoryCluster) -> Vec<Operation> {
        store
            .operations()
            .into_iter()
            .filter(|op| op.verb == Verb::Create)
            .collect()
    }

    #[fluvio_future::test]
    async fn test_first_pass_creates_bindings_and_requeues() {
        let store = MemoryCluster::with_registry(registry());
        let key = new_workspace(&store, "root", "team-a");

        let result = reconciler(&store).reconcile(&key).await.expect("reconcile");
        assert_eq!(result, ReconcileResult::requeue_after(Duration::from_secs(1)));

        let creates = creates(&store);
        assert_eq!(creates.len(), 2);
        assert_eq!(creates[0].name, "crcworkload");
        assert_eq!(creates[1].name, "has");
        assert!(creates.iter().all(|op| op.cluster == "root:team-a"));

        let bindings = store.list::<APIBindingSpec>("root:team-a");
        assert_eq!(bindings.len(), 2);

        // status is untouched until the next pass
        let workspace = store
            .get::<ClusterWorkspaceSpec>("root", "", "team-a")
            .expect("workspace");
        assert_eq!(workspace.status.initializers.len(), 2);
        assert!(
            store
                .operations()
                .iter()
                .all(|op| op.verb != Verb::UpdateStatus)
        );
    }

    #[fluvio_future::test]
    async fn test_second_pass_clears_initializers() {
        let store = MemoryCluster::with_registry(registry());
        let key = new_workspace(&store, "root:org", "team-b");
        let reconciler = reconciler(&store);

        reconciler.reconcile(&key).await.expect("first pass");
        let result = reconciler.reconcile(&key).await.expect("second pass");
        assert_eq!(result, ReconcileResult::done());

        let workspace = store
            .get::<ClusterWorkspaceSpec>("root:org", "", "team-b")
            .expect("workspace");
        assert!(workspace.status.initializers.is_empty());
        let condition = workspace
            .status
            .condition(INITIALIZED_CONDITION)
            .expect("condition");
        assert!(condition.is_true());
        assert_eq!(store.list::<APIBindingSpec>("root:org:team-b").len(), 2);
    }

    #[fluvio_future::test]
    async fn test_settled_workspace_is_not_mutated() {
        let store = MemoryCluster::with_registry(registry());
        let key = new_workspace(&store, "root", "team-a");
        let reconciler = reconciler(&store);
        reconciler.reconcile(&key).await.expect("first pass");
        reconciler.reconcile(&key).await.expect("second pass");

        let before = store
            .get::<ClusterWorkspaceSpec>("root", "", "team-a")
            .expect("workspace");
        store.clear_operations();

        let result = reconciler.reconcile(&key).await.expect("third pass");
        assert_eq!(result, ReconcileResult::done());

        let after = store
            .get::<ClusterWorkspaceSpec>("root", "", "team-a")
            .expect("workspace");
        assert_eq!(before.metadata.resource_version, after.metadata.resource_version);
        assert!(
            store
                .operations()
                .iter()
                .all(|op| op.verb != Verb::UpdateStatus)
        );
        assert_eq!(store.list::<APIBindingSpec>("root:team-a").len(), 2);
    }

    #[fluvio_future::test]
    async fn test_missing_workspace_is_success() {
        let store = MemoryCluster::with_registry(registry());
        let result = reconciler(&store)
            .reconcile(&WorkspaceKey::new("root", "gone"))
            .await
            .expect("reconcile");
        assert_eq!(result, ReconcileResult::done());
        assert!(creates(&store).is_empty());
    }

    #[fluvio_future::test]
    async fn test_first_binding_failure_stops_pass() {
        let store = MemoryCluster::with_registry(registry());
        let key = new_workspace(&store, "root", "team-a");
        store.fail_next(
            Verb::Create,
            "APIBinding",
            failure_status(403, "Forbidden", "apibindings is forbidden"),
        );

        let err = reconciler(&store)
            .reconcile(&key)
            .await
            .expect_err("must fail");
        assert!(matches!(err, ReconcileError::Client(_)));

        // the second binding is never attempted before the first exists
        let creates = creates(&store);
        assert_eq!(creates.len(), 1);
        assert_eq!(creates[0].name, "crcworkload");
        assert!(store.list::<APIBindingSpec>("root:team-a").is_empty());

        let workspace = store
            .get::<ClusterWorkspaceSpec>("root", "", "team-a")
            .expect("workspace");
        let condition = workspace
            .status
            .condition(INITIALIZED_CONDITION)
            .expect("condition");
        assert!(!condition.is_true());
        assert_eq!(condition.reason.as_deref(), Some(BINDING_FAILED_REASON));
        assert_eq!(workspace.status.initializers.len(), 2);
    }

    #[fluvio_future::test]
    async fn test_status_conflict_is_returned() {
        let store = MemoryCluster::with_registry(registry());
        let key = new_workspace(&store, "root", "team-a");
        let reconciler = reconciler(&store);
        reconciler.reconcile(&key).await.expect("first pass");

        store.fail_next(
            Verb::UpdateStatus,
            "ClusterWorkspace",
            failure_status(409, "Conflict", "object has been modified"),
        );
        assert!(reconciler.reconcile(&key).await.is_err());

        reconciler.reconcile(&key).await.expect("retry");
        let workspace = store
            .get::<ClusterWorkspaceSpec>("root", "", "team-a")
            .expect("workspace");
        assert!(workspace.status.initializers.is_empty());
    }

    #[fluvio_future::test]
    async fn test_clearing_keeps_foreign_status_fields() {
        let store = MemoryCluster::with_registry(registry());
        store.insert_json::<ClusterWorkspaceSpec>(
            "root",
            json!({
                "apiVersion": "tenancy.kcp.dev/v1alpha1",
                "kind": "ClusterWorkspace",
                "metadata": { "name": "team-a" },
                "spec": { "type": { "name": "appstudio", "path": "root" } },
                "status": {
                    "phase": "Initializing",
                    "initializers": ["root:appstudio"],
                    "location": { "current": "shard-1", "target": "shard-1" }
                }
            }),
        );
        let key = WorkspaceKey::new("root", "team-a");
        let reconciler = reconciler(&store);
        reconciler.reconcile(&key).await.expect("first pass");
        reconciler.reconcile(&key).await.expect("second pass");

        let stored = store
            .get_json::<ClusterWorkspaceSpec>("root", "", "team-a")
            .expect("workspace");
        assert_eq!(stored["status"]["initializers"], json!([]));
        assert_eq!(
            stored["status"]["location"],
            json!({ "current": "shard-1", "target": "shard-1" })
        );
    }
}
