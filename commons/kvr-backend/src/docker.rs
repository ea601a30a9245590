use std::collections::HashMap;

use bollard::{
    API_DEFAULT_VERSION, Docker,
    container::{InspectContainerOptions, ListContainersOptions},
    models::ContainerInspectResponse,
};
use tracing::info;

use crate::{
    directory::{Discovery, EntityDetail},
    error::DiscoveryError,
};

const CONNECT_TIMEOUT_SECS: u64 = 120;

/// Discovers storage nodes among the containers of a Docker engine.
#[derive(Clone, Debug)]
pub struct DockerDiscovery {
    docker: Docker,
}

impl DockerDiscovery {
    pub fn connect(socket: Option<&str>) -> Result<Self, DiscoveryError> {
        let docker = match socket {
            Some(path) => Docker::connect_with_unix(
                path,
                CONNECT_TIMEOUT_SECS,
                API_DEFAULT_VERSION,
            ),
            None => Docker::connect_with_local_defaults(),
        }
        .map_err(DiscoveryError::request)?;
        info!("connect docker discovery on {:?}", socket.unwrap_or("default"));
        Ok(Self { docker })
    }
}

#[async_trait::async_trait]
impl Discovery for DockerDiscovery {
    async fn list_by_name_prefix(
        &self,
        prefix: &str,
    ) -> Result<Vec<String>, DiscoveryError> {
        let options = ListContainersOptions::<String> {
            filters: HashMap::from([(
                "name".to_string(),
                vec![prefix.to_string()],
            )]),
            ..Default::default()
        };
        let containers = self
            .docker
            .list_containers(Some(options))
            .await
            .map_err(DiscoveryError::request)?;
        Ok(containers.into_iter().filter_map(|c| c.id).collect())
    }

    async fn inspect(&self, id: &str) -> Result<EntityDetail, DiscoveryError> {
        let resp = self
            .docker
            .inspect_container(id, None::<InspectContainerOptions>)
            .await
            .map_err(DiscoveryError::request)?;
        Ok(to_detail(id, resp))
    }
}

fn to_detail(id: &str, resp: ContainerInspectResponse) -> EntityDetail {
    let networks = resp
        .network_settings
        .and_then(|s| s.networks)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|(name, endpoint)| {
            endpoint
                .ip_address
                .filter(|ip| !ip.is_empty())
                .map(|ip| (name, ip))
        })
        .collect();
    let env = resp.config.and_then(|c| c.env).unwrap_or_default();
    EntityDetail {
        id: id.to_string(),
        networks,
        env,
    }
}
