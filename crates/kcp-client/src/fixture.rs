//!
//! # In memory endpoint
//!
//! [`MemoryCluster`] keeps objects of every logical cluster in memory and hands out
//! [`MemoryClient`]s scoped to one of them. Every call is recorded so tests can
//! assert on ordering and on the absence of writes. Objects are stored as json
//! so fields a type does not model survive the same way they do on a real server.
//!
use std::collections::BTreeMap;
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::stream;
use futures_util::stream::BoxStream;
use k8_types::InputK8Obj;
use k8_types::K8List;
use k8_types::K8Meta;
use k8_types::K8Obj;
use k8_types::K8Watch;
use k8_types::ListMetadata;
use k8_types::MetaStatus;
use k8_types::Spec;
use k8_types::StatusEnum;
use k8_types::UpdateK8ObjStatus;
use parking_lot::Mutex;
use serde_json::Value;
use tracing::debug;

use crate::CLUSTER_ANNOTATION;
use crate::ClientError;
use crate::ClusterClientFactory;
use crate::ListArg;
use crate::LogicalCluster;
use crate::MetadataClient;
use crate::NameSpace;
use crate::Registry;
use crate::TokenStreamResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Get,
    List,
    Create,
    UpdateStatus,
    Watch,
}

impl Verb {
    pub fn is_mutation(&self) -> bool {
        matches!(self, Self::Create | Self::UpdateStatus)
    }
}

/// recorded call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    pub verb: Verb,
    pub cluster: String,
    pub kind: String,
    pub name: String,
}

/// status the api server sends back for a failed request
pub fn failure_status(code: u16, reason: &str, message: impl Into<String>) -> MetaStatus {
    MetaStatus {
        api_version: "v1".to_owned(),
        code: Some(code),
        details: None,
        kind: "Status".to_owned(),
        reason: Some(reason.to_owned()),
        status: StatusEnum::FAILURE,
        message: Some(message.into()),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct ObjectKey {
    cluster: String,
    api_version: String,
    kind: String,
    namespace: String,
    name: String,
}

impl ObjectKey {
    fn new<S: Spec>(cluster: &LogicalCluster, namespace: &str, name: &str) -> Self {
        let namespace = if S::NAME_SPACED {
            namespace.to_owned()
        } else {
            String::new()
        };
        Self {
            cluster: cluster.to_string(),
            api_version: S::api_version(),
            kind: S::kind(),
            namespace,
            name: name.to_owned(),
        }
    }
}

#[derive(Debug)]
struct InjectedFailure {
    verb: Verb,
    kind: String,
    status: MetaStatus,
}

/// event handed to the next watch on `kind`
#[derive(Debug)]
struct ScriptedEvent {
    kind: String,
    event: Result<Value, MetaStatus>,
}

#[derive(Debug, Default)]
struct Inner {
    objects: BTreeMap<ObjectKey, Value>,
    version: u64,
    operations: Vec<Operation>,
    failures: Vec<InjectedFailure>,
    watch_events: Vec<ScriptedEvent>,
}

impl Inner {
    fn next_version(&mut self) -> String {
        self.version += 1;
        self.version.to_string()
    }

    fn record<S: Spec>(
        &mut self,
        verb: Verb,
        cluster: &LogicalCluster,
        name: &str,
    ) -> Result<(), ClientError> {
        self.operations.push(Operation {
            verb,
            cluster: cluster.to_string(),
            kind: S::kind(),
            name: name.to_owned(),
        });

        let kind = S::kind();
        if let Some(pos) = self
            .failures
            .iter()
            .position(|f| f.verb == verb && f.kind == kind)
        {
            let failure = self.failures.remove(pos);
            let code = failure.status.code.unwrap_or(500);
            debug!(?verb, %kind, "injecting failure");
            return Err(ClientError::from_status(code, failure.status));
        }
        Ok(())
    }

    fn take_watch_events(&mut self, kind: &str) -> Vec<Result<Value, MetaStatus>> {
        let (taken, kept) = std::mem::take(&mut self.watch_events)
            .into_iter()
            .partition::<Vec<_>, _>(|scripted| scripted.kind == kind);
        self.watch_events = kept;
        taken.into_iter().map(|scripted| scripted.event).collect()
    }
}

/// Shared in memory store of all logical clusters
#[derive(Debug, Default, Clone)]
pub struct MemoryCluster {
    inner: Arc<Mutex<Inner>>,
    registry: Option<Arc<Registry>>,
}

impl MemoryCluster {
    pub fn new() -> Self {
        Self::default()
    }

    /// clients reject types missing from `registry`, like [`crate::KcpClient`] does
    pub fn with_registry(registry: Arc<Registry>) -> Self {
        Self {
            registry: Some(registry),
            ..Default::default()
        }
    }

    pub fn client(&self, cluster: impl Into<LogicalCluster>) -> MemoryClient {
        MemoryClient {
            store: self.clone(),
            scope: cluster.into(),
        }
    }

    /// seed an object without recording an operation
    pub fn insert<S: Spec>(&self, cluster: impl Into<LogicalCluster>, mut obj: K8Obj<S>) {
        let cluster = cluster.into();
        let mut inner = self.inner.lock();
        let key = ObjectKey::new::<S>(&cluster, &obj.metadata.namespace, &obj.metadata.name);
        obj.api_version = S::api_version();
        obj.kind = S::kind();
        obj.metadata
            .annotations
            .insert(CLUSTER_ANNOTATION.to_owned(), cluster.to_string());
        obj.metadata.resource_version = inner.next_version();
        if let Ok(value) = serde_json::to_value(&obj) {
            inner.objects.insert(key, value);
        }
    }

    /// seed an object given as raw json, fields no type models included
    pub fn insert_json<S: Spec>(&self, cluster: impl Into<LogicalCluster>, mut value: Value) {
        let cluster = cluster.into();
        let mut inner = self.inner.lock();
        let version = inner.next_version();
        let Some(metadata) = value.get_mut("metadata").and_then(Value::as_object_mut) else {
            return;
        };
        let namespace = metadata
            .get("namespace")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned();
        let name = metadata
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned();
        metadata.insert("resourceVersion".to_owned(), Value::String(version));
        let annotations = metadata
            .entry("annotations")
            .or_insert_with(|| Value::Object(Default::default()));
        if let Some(annotations) = annotations.as_object_mut() {
            annotations.insert(
                CLUSTER_ANNOTATION.to_owned(),
                Value::String(cluster.to_string()),
            );
        }
        let key = ObjectKey::new::<S>(&cluster, &namespace, &name);
        inner.objects.insert(key, value);
    }

    pub fn get<S: Spec>(
        &self,
        cluster: impl Into<LogicalCluster>,
        namespace: &str,
        name: &str,
    ) -> Option<K8Obj<S>> {
        self.get_json::<S>(cluster, namespace, name)
            .and_then(|value| serde_json::from_value(value).ok())
    }

    /// stored object as the server would return it
    pub fn get_json<S: Spec>(
        &self,
        cluster: impl Into<LogicalCluster>,
        namespace: &str,
        name: &str,
    ) -> Option<Value> {
        let key = ObjectKey::new::<S>(&cluster.into(), namespace, name);
        self.inner.lock().objects.get(&key).cloned()
    }

    /// objects of one kind in a logical cluster
    pub fn list<S: Spec>(&self, cluster: impl Into<LogicalCluster>) -> Vec<K8Obj<S>> {
        let cluster = cluster.into();
        let inner = self.inner.lock();
        select::<S>(&inner, &cluster, &NameSpace::All, None)
    }

    pub fn operations(&self) -> Vec<Operation> {
        self.inner.lock().operations.clone()
    }

    pub fn mutations(&self) -> Vec<Operation> {
        self.operations()
            .into_iter()
            .filter(|op| op.verb.is_mutation())
            .collect()
    }

    pub fn clear_operations(&self) {
        self.inner.lock().operations.clear();
    }

    /// next call with this verb on this kind fails with the given status
    pub fn fail_next(&self, verb: Verb, kind: &str, status: MetaStatus) {
        self.inner.lock().failures.push(InjectedFailure {
            verb,
            kind: kind.to_owned(),
            status,
        });
    }

    /// deliver `event` to the next watch on `S`, stored objects are not changed
    pub fn push_watch<S: Spec>(&self, event: K8Watch<S>) {
        if let Ok(value) = serde_json::to_value(&event) {
            self.inner.lock().watch_events.push(ScriptedEvent {
                kind: S::kind(),
                event: Ok(value),
            });
        }
    }

    /// the next watch on `S` reports `status` as an error
    pub fn push_watch_error<S: Spec>(&self, status: MetaStatus) {
        self.inner.lock().watch_events.push(ScriptedEvent {
            kind: S::kind(),
            event: Err(status),
        });
    }
}

impl ClusterClientFactory for MemoryCluster {
    type Client = MemoryClient;

    fn cluster_client(&self, cluster: &LogicalCluster) -> Result<MemoryClient, ClientError> {
        Ok(self.client(cluster.clone()))
    }
}

fn select<S: Spec>(
    inner: &Inner,
    cluster: &LogicalCluster,
    namespace: &NameSpace,
    label_selector: Option<&str>,
) -> Vec<K8Obj<S>> {
    let api_version = S::api_version();
    let kind = S::kind();
    inner
        .objects
        .iter()
        .filter(|(key, _)| key.api_version == api_version && key.kind == kind)
        .filter(|(key, _)| cluster.is_wildcard() || key.cluster == cluster.as_str())
        .filter(|(key, _)| match namespace {
            NameSpace::Named(ns) if S::NAME_SPACED => &key.namespace == ns,
            _ => true,
        })
        .filter_map(|(_, value)| serde_json::from_value::<K8Obj<S>>(value.clone()).ok())
        .filter(|obj| {
            label_selector
                .map(|selector| matches_labels(selector, &obj.metadata.labels))
                .unwrap_or(true)
        })
        .collect()
}

/// equality based label selector: `a=b,c!=d,e`
pub fn matches_labels(selector: &str, labels: &HashMap<String, String>) -> bool {
    selector
        .split(',')
        .map(str::trim)
        .filter(|term| !term.is_empty())
        .all(|term| {
            if let Some((key, value)) = term.split_once("!=") {
                labels.get(key.trim()).map(|v| v.as_str()) != Some(value.trim())
            } else if let Some((key, value)) = term.split_once("==").or_else(|| term.split_once('=')) {
                labels.get(key.trim()).map(|v| v.as_str()) == Some(value.trim())
            } else if let Some(key) = term.strip_prefix('!') {
                !labels.contains_key(key.trim())
            } else {
                labels.contains_key(term)
            }
        })
}

/// Client scoped to one logical cluster of a [`MemoryCluster`]
#[derive(Debug, Clone)]
pub struct MemoryClient {
    store: MemoryCluster,
    scope: LogicalCluster,
}

impl MemoryClient {
    fn check<S: Spec>(&self) -> Result<(), ClientError> {
        match &self.store.registry {
            Some(registry) => registry.check::<S>(),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl MetadataClient for MemoryClient {
    async fn retrieve_item<S, M>(&self, metadata: &M) -> Result<K8Obj<S>, ClientError>
    where
        S: Spec,
        M: K8Meta + Send + Sync,
    {
        self.check::<S>()?;
        let mut inner = self.store.inner.lock();
        inner.record::<S>(Verb::Get, &self.scope, metadata.name())?;
        let key = ObjectKey::new::<S>(&self.scope, metadata.namespace(), metadata.name());
        match inner.objects.get(&key) {
            Some(value) => Ok(serde_json::from_value(value.clone())?),
            None => Err(ClientError::NotFound(format!(
                "{} {} in {}",
                S::kind(),
                metadata.name(),
                self.scope
            ))),
        }
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
        self.check::<S>()?;
        let namespace = namespace.into();
        let mut inner = self.store.inner.lock();
        inner.record::<S>(Verb::List, &self.scope, "")?;
        let selector = option.and_then(|option| option.label_selector);
        let items = select::<S>(&inner, &self.scope, &namespace, selector.as_deref());
        Ok(K8List {
            api_version: S::api_version(),
            kind: S::kind(),
            metadata: ListMetadata {
                _continue: None,
                resource_version: inner.version.to_string(),
            },
            items,
        })
    }

    async fn create_item<S>(&self, value: InputK8Obj<S>) -> Result<K8Obj<S>, ClientError>
    where
        S: Spec,
    {
        self.check::<S>()?;
        let mut inner = self.store.inner.lock();
        inner.record::<S>(Verb::Create, &self.scope, &value.metadata.name)?;
        let key = ObjectKey::new::<S>(
            &self.scope,
            &value.metadata.namespace,
            &value.metadata.name,
        );
        if inner.objects.contains_key(&key) {
            return Err(ClientError::from_status(
                409,
                failure_status(
                    409,
                    "AlreadyExists",
                    format!("{} \"{}\" already exists", S::kind(), value.metadata.name),
                ),
            ));
        }

        let mut obj: K8Obj<S> = K8Obj::new(value.metadata.name.clone(), value.spec);
        obj.api_version = S::api_version();
        obj.kind = S::kind();
        obj.metadata.namespace = value.metadata.namespace;
        obj.metadata.labels = value.metadata.labels;
        obj.metadata.annotations = value.metadata.annotations;
        obj.metadata
            .annotations
            .insert(CLUSTER_ANNOTATION.to_owned(), self.scope.to_string());
        obj.metadata.uid = format!("uid-{}", inner.version + 1);
        obj.metadata.resource_version = inner.next_version();

        inner.objects.insert(key, serde_json::to_value(&obj)?);
        Ok(obj)
    }

    async fn update_status<S>(&self, value: &UpdateK8ObjStatus<S>) -> Result<K8Obj<S>, ClientError>
    where
        S: Spec,
    {
        self.check::<S>()?;
        let mut inner = self.store.inner.lock();
        inner.record::<S>(Verb::UpdateStatus, &self.scope, &value.metadata.name)?;

        let request = serde_json::to_value(value)?;
        let field = |pointer: &str| {
            request
                .pointer(pointer)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_owned()
        };
        let namespace = field("/metadata/namespace");
        let requested_version = field("/metadata/resourceVersion");

        let key = ObjectKey::new::<S>(&self.scope, &namespace, &value.metadata.name);
        let Some(stored) = inner.objects.get(&key).cloned() else {
            return Err(ClientError::NotFound(value.metadata.name.clone()));
        };
        let current_version = stored
            .pointer("/metadata/resourceVersion")
            .and_then(Value::as_str)
            .unwrap_or_default();
        if !requested_version.is_empty() && requested_version != current_version {
            return Err(ClientError::Conflict(format!(
                "{} has been modified, resource version {} is stale",
                value.metadata.name, requested_version
            )));
        }

        let current: K8Obj<S> = serde_json::from_value(stored)?;
        let mut updated = current.set_status(value.status.clone());
        updated.metadata.resource_version = inner.next_version();
        inner.objects.insert(key, serde_json::to_value(&updated)?);
        Ok(updated)
    }

    /// replays scripted events, then stays open without yielding
    fn watch_stream_since<S, N>(
        &self,
        _namespace: N,
        _resource_version: Option<String>,
    ) -> BoxStream<'_, TokenStreamResult<S>>
    where
        S: Spec + 'static,
        S::Status: 'static,
        S::Header: 'static,
        N: Into<NameSpace>,
    {
        if let Err(err) = self.check::<S>() {
            return stream::once(async move { Err(err) }).boxed();
        }

        let mut inner = self.store.inner.lock();
        if let Err(err) = inner.record::<S>(Verb::Watch, &self.scope, "") {
            return stream::once(async move { Err(err) }).boxed();
        }

        let batches: Vec<TokenStreamResult<S>> = inner
            .take_watch_events(&S::kind())
            .into_iter()
            .map(|event| match event {
                Ok(value) => Ok(vec![serde_json::from_value(value).map_err(ClientError::from)]),
                Err(status) => Err(ClientError::from_status(
                    status.code.unwrap_or(500),
                    status,
                )),
            })
            .collect();

        stream::iter(batches).chain(stream::pending()).boxed()
    }
}

#[cfg(test)]
mod test {

    use std::collections::HashMap;

    use futures_util::StreamExt;
    use k8_types::InputK8Obj;
    use k8_types::InputObjectMeta;
    use k8_types::K8Obj;
    use k8_types::K8Watch;

    use crate::ClientError;
    use crate::LogicalCluster;
    use crate::MetadataClient;
    use crate::NameSpace;
    use crate::Registry;
    use crate::test_types::{WidgetSpec, WidgetStatus};

    use super::{MemoryCluster, Verb, failure_status, matches_labels};

    fn widget_input(name: &str) -> InputK8Obj<WidgetSpec> {
        InputK8Obj::new(
            WidgetSpec { size: 1 },
            InputObjectMeta {
                name: name.to_owned(),
                namespace: "default".to_owned(),
                ..Default::default()
            },
        )
    }

    #[fluvio_future::test]
    async fn test_create_is_scoped_to_cluster() {
        let store = MemoryCluster::new();
        let team_a = store.client("root:team-a");
        let team_b = store.client("root:team-b");

        let created = team_a.create_item(widget_input("w1")).await.expect("create");
        assert_eq!(
            LogicalCluster::of(&created.metadata),
            Some(LogicalCluster::new("root:team-a"))
        );

        let err = team_a
            .create_item(widget_input("w1"))
            .await
            .expect_err("duplicate");
        assert!(err.is_already_exists());

        team_b.create_item(widget_input("w1")).await.expect("other cluster");
        assert_eq!(store.list::<WidgetSpec>("root:team-a").len(), 1);
        assert_eq!(store.mutations().len(), 3);
    }

    #[fluvio_future::test]
    async fn test_stale_status_update_conflicts() {
        let store = MemoryCluster::new();
        store.insert("root", K8Obj::new("w1".to_owned(), WidgetSpec { size: 1 }));
        let client = store.client("root");

        let current: K8Obj<WidgetSpec> = client
            .retrieve_item(&InputObjectMeta::named("w1", ""))
            .await
            .expect("get");
        let update = current.as_status_update(WidgetStatus { ready: true });
        client.update_status(&update).await.expect("first update");

        let err = client.update_status(&update).await.expect_err("stale");
        assert!(matches!(err, ClientError::Conflict(_)));
    }

    #[fluvio_future::test]
    async fn test_injected_failure_consumed_once() {
        let store = MemoryCluster::new();
        let client = store.client("root");
        store.fail_next(
            Verb::Create,
            "Widget",
            failure_status(500, "InternalError", "boom"),
        );

        assert!(client.create_item(widget_input("w1")).await.is_err());
        assert!(client.create_item(widget_input("w1")).await.is_ok());
    }

    #[fluvio_future::test]
    async fn test_registry_rejects_unknown_types() {
        let store = MemoryCluster::with_registry(Registry::builder().build());
        let err = store
            .client("root")
            .retrieve_items::<WidgetSpec, _>(NameSpace::All)
            .await
            .expect_err("unregistered");
        assert!(matches!(err, ClientError::UnregisteredType(_)));
        assert!(store.operations().is_empty());
    }

    #[fluvio_future::test]
    async fn test_scripted_watch_events() {
        let store = MemoryCluster::new();
        store.push_watch(K8Watch::MODIFIED(K8Obj::new(
            "w1".to_owned(),
            WidgetSpec { size: 2 },
        )));
        store.push_watch_error::<WidgetSpec>(failure_status(410, "Expired", "too old"));

        let client = store.client(LogicalCluster::wildcard());
        let mut stream = client.watch_stream_since::<WidgetSpec, _>(NameSpace::All, None);

        let events = stream.next().await.expect("batch").expect("events");
        match events.into_iter().next() {
            Some(Ok(K8Watch::MODIFIED(obj))) => assert_eq!(obj.spec.size, 2),
            other => panic!("unexpected {other:?}"),
        }
        assert!(stream.next().await.expect("batch").is_err());

        // consumed by the first watch
        assert!(store.inner.lock().watch_events.is_empty());
    }

    #[test]
    fn test_label_selector() {
        let mut labels = HashMap::new();
        labels.insert("type".to_owned(), "member".to_owned());
        labels.insert("namespace".to_owned(), "toolchain-member-operator".to_owned());

        assert!(matches_labels("type=member", &labels));
        assert!(matches_labels("type==member,namespace", &labels));
        assert!(matches_labels("type!=host,!ownerClusterName", &labels));
        assert!(!matches_labels("type=host", &labels));
        assert!(!matches_labels("ownerClusterName", &labels));
        assert!(matches_labels("", &labels));
    }
}
