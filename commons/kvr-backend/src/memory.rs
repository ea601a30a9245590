//! In-memory collaborators for tests and local runs without Docker or MinIO.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};

use bytes::Bytes;

use crate::{
    client::{ObjectStore, StoreConnector, StoredObject},
    directory::{CredentialKeys, Discovery, EntityDetail, NodeDescriptor},
    error::{DiscoveryError, StoreError},
};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

/// Misbehaviour a [`MemoryStore`] can be told to exhibit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Fault {
    /// Accept one byte less than given.
    ShortWrite,
    /// Return one byte less than advertised.
    ShortRead,
    /// Fail every call with a transport error.
    Unreachable,
    /// Never complete any call.
    Hang,
}

#[derive(Default)]
pub struct MemoryStore {
    buckets: Mutex<HashMap<String, HashMap<String, Bytes>>>,
    fault: Mutex<Option<Fault>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inject(&self, fault: Fault) {
        *lock(&self.fault) = Some(fault);
    }

    pub fn has_bucket(&self, bucket: &str) -> bool {
        lock(&self.buckets).contains_key(bucket)
    }

    pub fn object(&self, bucket: &str, key: &str) -> Option<Bytes> {
        lock(&self.buckets)
            .get(bucket)
            .and_then(|b| b.get(key))
            .cloned()
    }

    pub fn object_count(&self) -> usize {
        lock(&self.buckets).values().map(HashMap::len).sum()
    }

    async fn check(&self) -> Result<Option<Fault>, StoreError> {
        let fault = *lock(&self.fault);
        match fault {
            Some(Fault::Hang) => std::future::pending().await,
            Some(Fault::Unreachable) => {
                Err(StoreError::Transport("connection refused".into()))
            }
            other => Ok(other),
        }
    }
}

#[async_trait::async_trait]
impl ObjectStore for MemoryStore {
    async fn bucket_exists(&self, bucket: &str) -> Result<bool, StoreError> {
        self.check().await?;
        Ok(self.has_bucket(bucket))
    }

    async fn make_bucket(&self, bucket: &str) -> Result<(), StoreError> {
        self.check().await?;
        lock(&self.buckets).entry(bucket.to_string()).or_default();
        Ok(())
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
    ) -> Result<u64, StoreError> {
        let fault = self.check().await?;
        let body = match fault {
            Some(Fault::ShortWrite) if !body.is_empty() => {
                body.slice(..body.len() - 1)
            }
            _ => body,
        };
        let written = body.len() as u64;
        let mut buckets = lock(&self.buckets);
        let objects = buckets
            .get_mut(bucket)
            .ok_or_else(|| StoreError::Transport("no such bucket".into()))?;
        objects.insert(key.to_string(), body);
        Ok(written)
    }

    async fn get_object(
        &self,
        bucket: &str,
        key: &str,
    ) -> Result<StoredObject, StoreError> {
        let fault = self.check().await?;
        let body = self.object(bucket, key).ok_or(StoreError::NoSuchKey)?;
        let size = body.len() as u64;
        let body = match fault {
            Some(Fault::ShortRead) if !body.is_empty() => {
                body.slice(..body.len() - 1)
            }
            _ => body,
        };
        Ok(StoredObject { size, body })
    }
}

/// Hands out one shared [`MemoryStore`] per node endpoint.
#[derive(Default)]
pub struct MemoryConnector {
    stores: Mutex<HashMap<String, Arc<MemoryStore>>>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&self, endpoint: &str) -> Arc<MemoryStore> {
        lock(&self.stores)
            .entry(endpoint.to_string())
            .or_insert_with(|| Arc::new(MemoryStore::new()))
            .clone()
    }

    /// Endpoints that currently hold at least one object.
    pub fn populated_endpoints(&self) -> Vec<String> {
        let mut endpoints: Vec<String> = lock(&self.stores)
            .iter()
            .filter(|(_, s)| s.object_count() > 0)
            .map(|(e, _)| e.clone())
            .collect();
        endpoints.sort();
        endpoints
    }
}

impl StoreConnector for MemoryConnector {
    fn connect(
        &self,
        node: &NodeDescriptor,
    ) -> Result<Arc<dyn ObjectStore>, StoreError> {
        Ok(self.store(&node.endpoint))
    }
}

/// Discovery over a fixed, replaceable list of entities.
#[derive(Default)]
pub struct StaticDiscovery {
    nodes: Mutex<Vec<EntityDetail>>,
    unavailable: Mutex<bool>,
}

impl StaticDiscovery {
    pub fn new(nodes: Vec<EntityDetail>) -> Self {
        Self {
            nodes: Mutex::new(nodes),
            unavailable: Mutex::new(false),
        }
    }

    /// `count` storage nodes attached to `network` at `10.0.0.1`, `10.0.0.2`, ...
    pub fn storage_nodes(
        count: usize,
        network: &str,
        keys: &CredentialKeys,
    ) -> Self {
        let nodes = (0..count)
            .map(|i| EntityDetail {
                id: format!("node-{}", i),
                networks: HashMap::from([(
                    network.to_string(),
                    format!("10.0.0.{}", i + 1),
                )]),
                env: vec![
                    format!("{}=access-{}", keys.access, i),
                    format!("{}=secret-{}", keys.secret, i),
                ],
            })
            .collect();
        Self::new(nodes)
    }

    pub fn set_nodes(&self, nodes: Vec<EntityDetail>) {
        *lock(&self.nodes) = nodes;
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        *lock(&self.unavailable) = unavailable;
    }
}

#[async_trait::async_trait]
impl Discovery for StaticDiscovery {
    async fn list_by_name_prefix(
        &self,
        prefix: &str,
    ) -> Result<Vec<String>, DiscoveryError> {
        if *lock(&self.unavailable) {
            return Err(DiscoveryError::request(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "discovery unavailable",
            )));
        }
        Ok(lock(&self.nodes)
            .iter()
            .filter(|n| n.id.starts_with(prefix))
            .map(|n| n.id.clone())
            .collect())
    }

    async fn inspect(&self, id: &str) -> Result<EntityDetail, DiscoveryError> {
        lock(&self.nodes)
            .iter()
            .find(|n| n.id == id)
            .cloned()
            .ok_or_else(|| DiscoveryError::NotFound(id.to_string()))
    }
}
