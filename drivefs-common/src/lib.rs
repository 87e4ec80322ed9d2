pub mod backend;
pub mod export;
pub mod records;

pub use backend::{CachePool, RemoteClient, RemoteError};
pub use records::RemoteRecord;
