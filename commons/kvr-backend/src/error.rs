use std::time::Duration;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(thiserror::Error, Debug)]
pub enum DiscoveryError {
    #[error("discovery request failed: {0}")]
    Request(#[source] BoxError),
    #[error("entity `{0}` not found")]
    NotFound(String),
}

impl DiscoveryError {
    pub fn request<E>(error: E) -> DiscoveryError
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        DiscoveryError::Request(Box::new(error))
    }
}

#[derive(thiserror::Error, Debug)]
pub enum DirectoryError {
    #[error("cannot list nodes with prefix `{prefix}`: {source}")]
    Discovery {
        prefix: String,
        #[source]
        source: DiscoveryError,
    },
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum DescriptorError {
    #[error("entity `{entity}` is not connected to network `{network}`")]
    NotConnected { entity: String, network: String },
    #[error("entity `{0}` is missing storage credentials")]
    MissingCredentials(String),
}

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("no such key")]
    NoSuchKey,
    #[error("invalid store endpoint `{0}`")]
    InvalidEndpoint(String),
    #[error("transport error: {0}")]
    Transport(String),
}

#[derive(thiserror::Error, Debug)]
pub enum BackendError {
    #[error("connection error: {0}")]
    Connection(#[from] StoreError),
    #[error("data uploaded partially: {written} of {expected} bytes")]
    ShortWrite { expected: u64, written: u64 },
    #[error("object partially read: {read} of {expected} bytes")]
    ShortRead { expected: u64, read: u64 },
    #[error("backend call `{op}` exceeded {timeout:?}")]
    Timeout { op: &'static str, timeout: Duration },
}
