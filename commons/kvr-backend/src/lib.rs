//! Storage-node side of the router: discovering the live nodes and talking to
//! the object store that runs on each of them.

pub mod client;
pub mod directory;
pub mod docker;
pub mod error;
#[cfg(any(test, feature = "test-util"))]
pub mod memory;
pub mod s3;

pub use client::{BackendClient, Lookup, ObjectStore, StoreConnector, StoredObject};
pub use directory::{
    BackendDirectory, CredentialKeys, Discovery, EntityDetail, NodeDescriptor,
    build_descriptor,
};
pub use docker::DockerDiscovery;
pub use error::{
    BackendError, DescriptorError, DirectoryError, DiscoveryError, StoreError,
};
pub use s3::{S3Connector, S3Store};
