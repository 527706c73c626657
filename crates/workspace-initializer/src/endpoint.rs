//!
//! # Virtual endpoint resolution
//!
//! Workspaces of a type are initialized thru the virtual workspace published
//! on the status of their [`ClusterWorkspaceTypeSpec`].
//!
use tracing::debug;
use tracing::info;
use tracing::instrument;

use k8_config::K8Config;
use k8_types::InputObjectMeta;
use k8_types::K8Obj;
use kcp_client::MetadataClient;
use kcp_client::NameSpace;
use kcp_client::config::with_host;

use crate::ResolveError;
use crate::objects::ClusterWorkspaceTypeSpec;

/// url of the first virtual workspace of the named type.
/// empty name selects the only type present
#[instrument(skip(client))]
pub async fn resolve_virtual_workspace_url<C>(client: &C, name: &str) -> Result<String, ResolveError>
where
    C: MetadataClient,
{
    let workspace_type = find_workspace_type(client, name).await?;
    let type_name = workspace_type.metadata.name;
    // TODO: select the virtual workspace by shard instead of taking the first one
    match workspace_type.status.virtual_workspaces.into_iter().next() {
        Some(vw) => {
            debug!(%type_name, url = %vw.url, "resolved virtual workspace");
            Ok(vw.url)
        }
        None => Err(ResolveError::NoVirtualWorkspaces(type_name)),
    }
}

async fn find_workspace_type<C>(
    client: &C,
    name: &str,
) -> Result<K8Obj<ClusterWorkspaceTypeSpec>, ResolveError>
where
    C: MetadataClient,
{
    if !name.is_empty() {
        return match client
            .retrieve_item::<ClusterWorkspaceTypeSpec, _>(&InputObjectMeta::named(name, ""))
            .await
        {
            Ok(item) => Ok(item),
            Err(err) if err.is_not_found() => Err(ResolveError::NotFound(name.to_owned())),
            Err(err) => Err(err.into()),
        };
    }

    let mut types = client
        .retrieve_items::<ClusterWorkspaceTypeSpec, _>(NameSpace::All)
        .await?
        .items;
    match types.len() {
        0 => Err(ResolveError::Empty),
        1 => Ok(types.remove(0)),
        count => Err(ResolveError::Ambiguous(count)),
    }
}

/// copy of `base` addressing the virtual workspace of the workspace type
pub async fn rest_config_for_workspace_type<C>(
    client: &C,
    base: &K8Config,
    name: &str,
) -> Result<K8Config, ResolveError>
where
    C: MetadataClient,
{
    info!(workspace_type = name, "looking up virtual workspace url");
    let url = resolve_virtual_workspace_url(client, name).await?;
    info!(%url, "using virtual workspace url");
    Ok(with_host(base, &url)?)
}
