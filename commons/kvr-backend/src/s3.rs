use std::sync::Arc;

use aws_sdk_s3::{
    Client,
    config::{BehaviorVersion, Builder, Credentials, Region},
    error::{DisplayErrorContext, SdkError},
    primitives::ByteStream,
};
use bytes::Bytes;
use tracing::debug;

use crate::{
    client::{ObjectStore, StoreConnector, StoredObject},
    directory::NodeDescriptor,
    error::StoreError,
};

fn transport<E, R>(e: SdkError<E, R>) -> StoreError
where
    E: std::error::Error + 'static,
    R: std::fmt::Debug,
{
    StoreError::Transport(DisplayErrorContext(&e).to_string())
}

/// S3 compatible store (MinIO) on one storage node.
#[derive(Clone, Debug)]
pub struct S3Store {
    client: Client,
}

impl S3Store {
    pub fn new(node: &NodeDescriptor, region: &str) -> Result<Self, StoreError> {
        if node.endpoint.is_empty() {
            return Err(StoreError::InvalidEndpoint(node.endpoint.clone()));
        }
        let credentials = Credentials::new(
            node.access_key.clone(),
            node.secret_key.clone(),
            None,
            None,
            "kvr-node-descriptor",
        );
        let conf = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .endpoint_url(format!("http://{}", node.endpoint))
            .region(Region::new(region.to_string()))
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();
        debug!("create s3 client for '{}'", node.endpoint);
        Ok(Self {
            client: Client::from_conf(conf),
        })
    }
}

#[async_trait::async_trait]
impl ObjectStore for S3Store {
    async fn bucket_exists(&self, bucket: &str) -> Result<bool, StoreError> {
        match self.client.head_bucket().bucket(bucket).send().await {
            Ok(_) => Ok(true),
            Err(e) if e.as_service_error().is_some_and(|s| s.is_not_found()) => {
                Ok(false)
            }
            Err(e) => Err(transport(e)),
        }
    }

    async fn make_bucket(&self, bucket: &str) -> Result<(), StoreError> {
        self.client
            .create_bucket()
            .bucket(bucket)
            .send()
            .await
            .map_err(transport)?;
        Ok(())
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
    ) -> Result<u64, StoreError> {
        let len = body.len() as u64;
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_length(len as i64)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(transport)?;
        // a successful PUT stores the whole declared body
        Ok(len)
    }

    async fn get_object(
        &self,
        bucket: &str,
        key: &str,
    ) -> Result<StoredObject, StoreError> {
        let out = match self.client.get_object().bucket(bucket).key(key).send().await
        {
            Ok(out) => out,
            Err(e)
                if e.as_service_error().is_some_and(|s| s.is_no_such_key()) =>
            {
                return Err(StoreError::NoSuchKey);
            }
            Err(e) => return Err(transport(e)),
        };
        let size = out.content_length().unwrap_or_default().max(0) as u64;
        let body = out
            .body
            .collect()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?
            .into_bytes();
        Ok(StoredObject { size, body })
    }
}

/// Builds a fresh [`S3Store`] for every routed request.
#[derive(Clone, Debug)]
pub struct S3Connector {
    region: String,
}

impl S3Connector {
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
        }
    }
}

impl StoreConnector for S3Connector {
    fn connect(
        &self,
        node: &NodeDescriptor,
    ) -> Result<Arc<dyn ObjectStore>, StoreError> {
        Ok(Arc::new(S3Store::new(node, &self.region)?))
    }
}
