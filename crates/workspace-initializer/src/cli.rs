//!
//! # CLI for the Workspace Initializer
//!
//! `run` starts the controller, `clusters` prints the member clusters
//! whose credentials are published in a namespace.
//!
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use anyhow::Result;
use clap::Args;
use clap::Parser;
use clap::Subcommand;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::error;
use tracing::info;

use k8_config::K8Config;
use kcp_client::ClusterClientFactory;
use kcp_client::KcpClient;
use kcp_client::KcpClientFactory;
use kcp_client::LogicalCluster;
use kcp_client::config::ClientLimits;
use kcp_client::config::api_path;
use kcp_client::config::load_config;

use crate::config::DEFAULT_WORKERS;
use crate::config::DEFAULT_WORKSPACE_TYPE;
use crate::config::InitializerConfig;
use crate::controllers::workspace::WorkspaceController;
use crate::controllers::workspace::WorkspaceReconciler;
use crate::credentials::CredentialSelector;
use crate::credentials::load_cluster_configs;
use crate::endpoint::rest_config_for_workspace_type;
use crate::objects;

/// cli options
#[derive(Debug, Parser)]
#[command(
    name = "workspace-initializer",
    about = "Initializes kcp tenant workspaces"
)]
pub struct InitializerOpt {
    /// path to the kubeconfig file
    #[arg(long, env = "KUBECONFIG", global = true)]
    kubeconfig: Option<PathBuf>,

    /// kubeconfig context, current context if not set
    #[arg(long, global = true)]
    context: Option<String>,

    #[command(subcommand)]
    command: InitializerCmd,
}

#[derive(Debug, Subcommand)]
pub enum InitializerCmd {
    /// Run the workspace controller
    Run(RunOpt),
    /// Print the clusters found in a credential namespace
    Clusters(ClustersOpt),
}

#[derive(Debug, Args)]
pub struct RunOpt {
    /// workspace type serving the virtual workspace, empty for the only type present
    #[arg(long, default_value = DEFAULT_WORKSPACE_TYPE)]
    workspace_type: String,

    /// number of concurrent reconciliations
    #[arg(long, default_value_t = DEFAULT_WORKERS)]
    workers: usize,

    /// delay before checking a workspace whose bindings were just created
    #[arg(long, default_value_t = 1000)]
    requeue_after_ms: u64,
}

impl RunOpt {
    pub fn as_config(self) -> InitializerConfig {
        InitializerConfig {
            workspace_type: self.workspace_type,
            workers: self.workers.max(1),
            requeue_after: Duration::from_millis(self.requeue_after_ms),
            ..Default::default()
        }
    }
}

#[derive(Debug, Args)]
pub struct ClustersOpt {
    /// namespace holding the cluster secrets
    #[arg(long, env = "WATCH_NAMESPACE")]
    namespace: String,

    /// cluster type label, `member` or `host`
    #[arg(long = "type")]
    cluster_type: Option<String>,

    /// operator namespace label of the cluster
    #[arg(long)]
    target_namespace: Option<String>,

    #[arg(long)]
    owner_cluster: Option<String>,
}

impl ClustersOpt {
    pub fn selector(&self) -> CredentialSelector {
        CredentialSelector {
            cluster_type: self.cluster_type.clone(),
            namespace: self.target_namespace.clone(),
            owner_cluster_name: self.owner_cluster.clone(),
        }
    }
}

impl InitializerOpt {
    pub async fn process(self) -> Result<()> {
        let base = load_config(self.kubeconfig.as_deref(), self.context.as_deref())
            .context("loading connection configuration")?;
        debug!(server = ?api_path(&base), "base configuration");

        match self.command {
            InitializerCmd::Run(opt) => run_controller(base, opt.as_config()).await,
            InitializerCmd::Clusters(opt) => print_clusters(base, opt).await,
        }
    }
}

async fn run_controller(base: K8Config, config: InitializerConfig) -> Result<()> {
    let registry = objects::registry();
    let root = KcpClient::new(base.clone(), registry.clone(), ClientLimits::default())?;
    let vw_config = rest_config_for_workspace_type(&root, &base, &config.workspace_type)
        .await
        .context("error looking up virtual workspace URL")?;

    let factory = KcpClientFactory::new(vw_config, registry, ClientLimits::default());
    let watch_client = factory.cluster_client(&LogicalCluster::wildcard())?;
    let reconciler = WorkspaceReconciler::new(factory, config.clone());

    let token = CancellationToken::new();
    let shutdown = token.clone();
    tokio::spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(%err, "unable to listen for shutdown signal");
            return;
        }
        info!("received shutdown signal");
        shutdown.cancel();
    });

    WorkspaceController::new(watch_client, reconciler, config)
        .run(token)
        .await;
    Ok(())
}

async fn print_clusters(base: K8Config, opt: ClustersOpt) -> Result<()> {
    let client = KcpClient::new(base, objects::registry(), ClientLimits::default())?;
    let clusters = load_cluster_configs(&client, &opt.namespace, &opt.selector()).await?;
    for cluster in clusters {
        println!("{}\t{}", cluster.name, cluster.url);
    }
    Ok(())
}

#[cfg(test)]
mod test {

    use std::time::Duration;

    use clap::Parser;

    use super::InitializerCmd;
    use super::InitializerOpt;

    #[test]
    fn test_run_defaults() {
        let opt = InitializerOpt::try_parse_from(["workspace-initializer", "run"]).expect("parse");
        let InitializerCmd::Run(run) = opt.command else {
            panic!("expected run");
        };
        let config = run.as_config();
        assert_eq!(config.workspace_type, "appstudio");
        assert_eq!(config.workers, 2);
        assert_eq!(config.requeue_after, Duration::from_secs(1));
        assert_eq!(config.first_binding.name, "crcworkload");
    }

    #[test]
    fn test_run_overrides() {
        let opt = InitializerOpt::try_parse_from([
            "workspace-initializer",
            "run",
            "--workspace-type",
            "",
            "--workers",
            "0",
            "--requeue-after-ms",
            "250",
            "--context",
            "kcp-admin",
        ])
        .expect("parse");
        assert_eq!(opt.context.as_deref(), Some("kcp-admin"));
        let InitializerCmd::Run(run) = opt.command else {
            panic!("expected run");
        };
        let config = run.as_config();
        assert_eq!(config.workspace_type, "");
        assert_eq!(config.workers, 1);
        assert_eq!(config.requeue_after, Duration::from_millis(250));
    }

    #[test]
    fn test_clusters_selector() {
        let opt = InitializerOpt::try_parse_from([
            "workspace-initializer",
            "clusters",
            "--namespace",
            "toolchain-host-operator",
            "--type",
            "member",
            "--owner-cluster",
            "host-1",
        ])
        .expect("parse");
        let InitializerCmd::Clusters(clusters) = opt.command else {
            panic!("expected clusters");
        };
        assert_eq!(clusters.namespace, "toolchain-host-operator");
        assert_eq!(
            clusters.selector().label_selector().as_deref(),
            Some("type=member,ownerClusterName=host-1")
        );
    }
}
