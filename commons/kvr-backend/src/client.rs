use std::{future::Future, sync::Arc, time::Duration};

use bytes::Bytes;
use tracing::{debug, info};

use crate::{
    directory::NodeDescriptor,
    error::{BackendError, StoreError},
};

/// Object as returned by a store: the size it advertises and the bytes read.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredObject {
    pub size: u64,
    pub body: Bytes,
}

#[async_trait::async_trait]
pub trait ObjectStore: Send + Sync {
    async fn bucket_exists(&self, bucket: &str) -> Result<bool, StoreError>;

    async fn make_bucket(&self, bucket: &str) -> Result<(), StoreError>;

    /// Stores `body` and returns the number of bytes the store accepted.
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
    ) -> Result<u64, StoreError>;

    async fn get_object(
        &self,
        bucket: &str,
        key: &str,
    ) -> Result<StoredObject, StoreError>;
}

/// Opens an object store client against one storage node.
pub trait StoreConnector: Send + Sync {
    fn connect(
        &self,
        node: &NodeDescriptor,
    ) -> Result<Arc<dyn ObjectStore>, StoreError>;
}

/// Outcome of a read that reached the backend.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Lookup {
    Found(Bytes),
    KeyAbsent,
    BucketAbsent,
}

pub struct BackendClient {
    store: Arc<dyn ObjectStore>,
    bucket: String,
    timeout: Duration,
}

impl BackendClient {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        bucket: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            bucket: bucket.into(),
            timeout,
        }
    }

    pub async fn put(&self, key: &str, value: Bytes) -> Result<(), BackendError> {
        let exists = self
            .deadline("bucket_exists", self.store.bucket_exists(&self.bucket))
            .await?;
        if !exists {
            info!("create bucket '{}'", self.bucket);
            self.deadline("make_bucket", self.store.make_bucket(&self.bucket))
                .await?;
        }

        let expected = value.len() as u64;
        let written = self
            .deadline(
                "put_object",
                self.store.put_object(&self.bucket, key, value),
            )
            .await?;
        if written != expected {
            return Err(BackendError::ShortWrite { expected, written });
        }
        debug!(key, bytes = written, "stored object");
        Ok(())
    }

    pub async fn get(&self, key: &str) -> Result<Lookup, BackendError> {
        let exists = self
            .deadline("bucket_exists", self.store.bucket_exists(&self.bucket))
            .await?;
        if !exists {
            return Ok(Lookup::BucketAbsent);
        }

        let result = self
            .deadline("get_object", self.store.get_object(&self.bucket, key))
            .await;
        let object = match result {
            Ok(object) => object,
            Err(BackendError::Connection(StoreError::NoSuchKey)) => {
                return Ok(Lookup::KeyAbsent);
            }
            Err(e) => return Err(e),
        };
        let read = object.body.len() as u64;
        if read != object.size {
            return Err(BackendError::ShortRead {
                expected: object.size,
                read,
            });
        }
        Ok(Lookup::Found(object.body))
    }

    async fn deadline<T>(
        &self,
        op: &'static str,
        call: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, BackendError> {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result.map_err(BackendError::from),
            Err(_) => Err(BackendError::Timeout {
                op,
                timeout: self.timeout,
            }),
        }
    }
}
