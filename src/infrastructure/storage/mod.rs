mod azure_store;
mod local_store;
mod mock_store;
mod s3_store;

pub use azure_store::AzureObjectStore;
pub use local_store::LocalObjectStore;
pub use mock_store::MockObjectStore;
pub use s3_store::S3ObjectStore;
