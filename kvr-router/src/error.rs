use kvr_backend::{BackendError, DescriptorError, DirectoryError, StoreError};

/// Anything that stops a request from reaching or using its backend.
///
/// Clients only ever see these as a generic internal error; the variant is
/// kept for the server log.
#[derive(thiserror::Error, Debug)]
pub enum RouteError {
    #[error("{0}")]
    Directory(#[from] DirectoryError),
    #[error("no storage nodes available")]
    NoNodesAvailable,
    #[error("cannot resolve node {index}: {source}")]
    Descriptor {
        index: usize,
        #[source]
        source: DescriptorError,
    },
    #[error("cannot connect to node {endpoint}: {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: StoreError,
    },
}

#[derive(thiserror::Error, Debug)]
pub enum HandlerError {
    #[error("routing failed: {0}")]
    Route(#[from] RouteError),
    #[error("backend failed: {0}")]
    Backend(#[from] BackendError),
    #[error("stored value is not valid UTF-8")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),
}
