use std::{hash::Hasher, sync::Arc, time::Duration};

use fnv::FnvHasher;
use kvr_backend::{
    BackendClient, BackendDirectory, CredentialKeys, StoreConnector,
    build_descriptor,
};
use tracing::debug;

use crate::{conf::Config, error::RouteError};

/// 64-bit FNV-1a.
pub fn fnv1a_64(bytes: &[u8]) -> u64 {
    let mut hasher = FnvHasher::default();
    hasher.write(bytes);
    hasher.finish()
}

/// Position of the node that owns `key` among `node_count` nodes, or `None`
/// when there are no nodes.
pub fn shard_index(key: &str, node_count: usize) -> Option<usize> {
    if node_count == 0 {
        return None;
    }
    Some((fnv1a_64(key.as_bytes()) % node_count as u64) as usize)
}

#[derive(Clone, Debug)]
pub struct RouteSettings {
    pub node_prefix: String,
    pub network: String,
    pub port: u16,
    pub bucket: String,
    pub keys: CredentialKeys,
    pub backend_timeout: Duration,
}

impl From<&Config> for RouteSettings {
    fn from(conf: &Config) -> Self {
        Self {
            node_prefix: conf.node_prefix.clone(),
            network: conf.node_network.clone(),
            port: conf.node_port,
            bucket: conf.bucket.clone(),
            keys: conf.credential_keys(),
            backend_timeout: conf.backend_timeout(),
        }
    }
}

/// Maps keys onto the storage nodes that are live at request time.
///
/// The node list is fetched again for every key and positions are taken in
/// discovery order, so a key only keeps its node while membership and
/// ordering stay unchanged.
pub struct ShardRouter {
    directory: BackendDirectory,
    connector: Arc<dyn StoreConnector>,
    settings: RouteSettings,
}

impl ShardRouter {
    pub fn new(
        directory: BackendDirectory,
        connector: Arc<dyn StoreConnector>,
        settings: RouteSettings,
    ) -> Self {
        Self {
            directory,
            connector,
            settings,
        }
    }

    pub async fn route(&self, key: &str) -> Result<BackendClient, RouteError> {
        let nodes = self.directory.list_nodes(&self.settings.node_prefix).await?;
        let index = shard_index(key, nodes.len())
            .ok_or(RouteError::NoNodesAvailable)?;
        let descriptor = build_descriptor(
            &self.settings.network,
            self.settings.port,
            &nodes[index],
            &self.settings.keys,
        )
        .map_err(|source| RouteError::Descriptor { index, source })?;
        let store = self.connector.connect(&descriptor).map_err(|source| {
            RouteError::Connect {
                endpoint: descriptor.endpoint.clone(),
                source,
            }
        })?;
        debug!(
            key,
            index,
            nodes = nodes.len(),
            endpoint = %descriptor.endpoint,
            "routed key"
        );
        Ok(BackendClient::new(
            store,
            self.settings.bucket.clone(),
            self.settings.backend_timeout,
        ))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use bytes::Bytes;
    use kvr_backend::{
        EntityDetail, Lookup,
        memory::{MemoryConnector, StaticDiscovery},
    };

    use super::*;

    const NET: &str = "storage";

    fn settings() -> RouteSettings {
        RouteSettings {
            node_prefix: "node".into(),
            network: NET.into(),
            port: 9000,
            bucket: "homework".into(),
            keys: CredentialKeys::default(),
            backend_timeout: Duration::from_secs(5),
        }
    }

    fn router(
        discovery: Arc<StaticDiscovery>,
        connector: Arc<MemoryConnector>,
    ) -> ShardRouter {
        ShardRouter::new(BackendDirectory::new(discovery), connector, settings())
    }

    #[test]
    fn fnv1a_matches_reference_vectors() {
        assert_eq!(fnv1a_64(b""), 0xcbf29ce484222325);
        assert_eq!(fnv1a_64(b"a"), 0xaf63dc4c8601ec8c);
        assert_eq!(fnv1a_64(b"foobar"), 0x85944171f73967e8);
    }

    #[test]
    fn shard_index_is_deterministic() {
        for n in 1..16 {
            for key in ["k1", "ABCD123", "", "über-key"] {
                let first = shard_index(key, n).unwrap();
                assert!(first < n);
                assert_eq!(shard_index(key, n), Some(first));
            }
        }
    }

    #[test]
    fn shard_index_without_nodes() {
        assert_eq!(shard_index("k1", 0), None);
    }

    #[test]
    fn every_shard_is_reachable() {
        for n in [1usize, 2, 3, 5, 8] {
            let seen: HashSet<usize> = (0..1000)
                .map(|i| shard_index(&format!("key-{}", i), n).unwrap())
                .collect();
            assert_eq!(seen.len(), n, "some shard of {} never selected", n);
        }
    }

    #[test]
    fn distribution_is_not_skewed() {
        let n = 4;
        let mut counts = vec![0usize; n];
        for i in 0..4000 {
            counts[shard_index(&format!("object-{}", i), n).unwrap()] += 1;
        }
        for c in counts {
            assert!(c > 600, "shard got only {} of 4000 keys", c);
        }
    }

    #[tokio::test]
    async fn same_key_goes_to_same_node() {
        let discovery = Arc::new(StaticDiscovery::storage_nodes(
            3,
            NET,
            &CredentialKeys::default(),
        ));
        let connector = Arc::new(MemoryConnector::new());
        let router = router(discovery, connector.clone());

        router
            .route("k1")
            .await
            .unwrap()
            .put("k1", Bytes::from_static(b"v1"))
            .await
            .unwrap();
        let found = router.route("k1").await.unwrap().get("k1").await.unwrap();
        assert_eq!(found, Lookup::Found(Bytes::from_static(b"v1")));

        let expected = format!("10.0.0.{}:9000", shard_index("k1", 3).unwrap() + 1);
        assert_eq!(connector.populated_endpoints(), vec![expected]);
    }

    #[tokio::test]
    async fn no_nodes_is_an_error() {
        let discovery = Arc::new(StaticDiscovery::new(vec![]));
        let router = router(discovery, Arc::new(MemoryConnector::new()));
        assert!(matches!(
            router.route("k1").await,
            Err(RouteError::NoNodesAvailable)
        ));
    }

    #[tokio::test]
    async fn discovery_failure_is_an_error() {
        let discovery = Arc::new(StaticDiscovery::storage_nodes(
            2,
            NET,
            &CredentialKeys::default(),
        ));
        discovery.set_unavailable(true);
        let router = router(discovery, Arc::new(MemoryConnector::new()));
        assert!(matches!(
            router.route("k1").await,
            Err(RouteError::Directory(_))
        ));
    }

    #[tokio::test]
    async fn node_without_credentials_is_an_error() {
        let discovery = Arc::new(StaticDiscovery::new(vec![EntityDetail {
            id: "node-0".into(),
            networks: [(NET.to_string(), "10.0.0.1".to_string())].into(),
            env: vec![],
        }]));
        let router = router(discovery, Arc::new(MemoryConnector::new()));
        assert!(matches!(
            router.route("k1").await,
            Err(RouteError::Descriptor { index: 0, .. })
        ));
    }

    #[tokio::test]
    async fn membership_change_moves_keys() {
        let keys = CredentialKeys::default();
        let key = (0..)
            .map(|i| format!("key-{}", i))
            .find(|k| shard_index(k, 3) != shard_index(k, 4))
            .unwrap();
        let discovery = Arc::new(StaticDiscovery::storage_nodes(3, NET, &keys));
        let connector = Arc::new(MemoryConnector::new());
        let router = router(discovery.clone(), connector.clone());

        router
            .route(&key)
            .await
            .unwrap()
            .put(&key, Bytes::from_static(b"v1"))
            .await
            .unwrap();
        let grown = BackendDirectory::new(Arc::new(
            StaticDiscovery::storage_nodes(4, NET, &keys),
        ));
        let nodes = grown.list_nodes("node").await.unwrap();
        discovery.set_nodes(nodes);

        let lookup = router.route(&key).await.unwrap().get(&key).await.unwrap();
        assert_eq!(lookup, Lookup::BucketAbsent);
        assert_eq!(connector.populated_endpoints().len(), 1);
    }
}
