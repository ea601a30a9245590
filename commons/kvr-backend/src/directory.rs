use std::{collections::HashMap, sync::Arc};

use tracing::{debug, warn};

use crate::error::{DescriptorError, DirectoryError, DiscoveryError};

/// Entity metadata as reported by the discovery collaborator.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EntityDetail {
    pub id: String,
    /// Network name to the IP address the entity holds on it.
    pub networks: HashMap<String, String>,
    /// Environment entries in `KEY=VALUE` form.
    pub env: Vec<String>,
}

impl EntityDetail {
    /// Detail for an entity whose lookup failed. Only the id is known.
    pub fn partial(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }
}

#[async_trait::async_trait]
pub trait Discovery: Send + Sync {
    /// Ids of every live entity whose name matches `prefix`.
    async fn list_by_name_prefix(
        &self,
        prefix: &str,
    ) -> Result<Vec<String>, DiscoveryError>;

    async fn inspect(&self, id: &str) -> Result<EntityDetail, DiscoveryError>;
}

#[derive(Clone)]
pub struct BackendDirectory {
    discovery: Arc<dyn Discovery>,
}

impl BackendDirectory {
    pub fn new(discovery: Arc<dyn Discovery>) -> Self {
        Self { discovery }
    }

    /// Lists the live storage nodes in the order the collaborator returns them.
    ///
    /// Nothing is cached: every call goes back to the collaborator. An entity
    /// whose inspection fails stays in the list with an empty detail so the
    /// positions of the other entities do not shift.
    pub async fn list_nodes(
        &self,
        prefix: &str,
    ) -> Result<Vec<EntityDetail>, DirectoryError> {
        let ids = self
            .discovery
            .list_by_name_prefix(prefix)
            .await
            .map_err(|source| DirectoryError::Discovery {
                prefix: prefix.to_string(),
                source,
            })?;
        let mut nodes = Vec::with_capacity(ids.len());
        for id in ids {
            match self.discovery.inspect(&id).await {
                Ok(detail) => nodes.push(detail),
                Err(e) => {
                    warn!(entity = %id, error = %e, "could not inspect entity");
                    nodes.push(EntityDetail::partial(id));
                }
            }
        }
        debug!(prefix, count = nodes.len(), "listed storage nodes");
        Ok(nodes)
    }
}

/// Connection details of one storage node.
#[derive(Clone, PartialEq, Eq)]
pub struct NodeDescriptor {
    pub endpoint: String,
    pub access_key: String,
    pub secret_key: String,
}

impl std::fmt::Debug for NodeDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeDescriptor")
            .field("endpoint", &self.endpoint)
            .field("access_key", &self.access_key)
            .field("secret_key", &"***")
            .finish()
    }
}

/// Names of the environment entries that carry the node credentials.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CredentialKeys {
    pub access: String,
    pub secret: String,
}

impl Default for CredentialKeys {
    fn default() -> Self {
        Self {
            access: "MINIO_ACCESS_KEY".into(),
            secret: "MINIO_SECRET_KEY".into(),
        }
    }
}

pub fn build_descriptor(
    network: &str,
    port: u16,
    entity: &EntityDetail,
    keys: &CredentialKeys,
) -> Result<NodeDescriptor, DescriptorError> {
    let ip = entity.networks.get(network).ok_or_else(|| {
        DescriptorError::NotConnected {
            entity: entity.id.clone(),
            network: network.to_string(),
        }
    })?;

    let mut access_key = "";
    let mut secret_key = "";
    for entry in &entity.env {
        let Some((key, value)) = entry.split_once('=') else {
            continue;
        };
        if key == keys.access {
            access_key = value;
        } else if key == keys.secret {
            secret_key = value;
        }
    }
    if access_key.is_empty() || secret_key.is_empty() {
        return Err(DescriptorError::MissingCredentials(entity.id.clone()));
    }

    Ok(NodeDescriptor {
        endpoint: format!("{}:{}", ip, port),
        access_key: access_key.to_string(),
        secret_key: secret_key.to_string(),
    })
}
