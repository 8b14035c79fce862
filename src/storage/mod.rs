pub mod codec;
pub mod file_remote;
mod io_utils;
pub mod local;
pub mod memory;
pub mod remote;

pub use codec::SnapshotCodec;
pub use file_remote::JsonFileRemoteStore;
pub use local::{FileMedium, LocalMedium, LocalPersistence, MemoryMedium, PersistenceAdapter};
pub use memory::InMemoryRemoteStore;
pub use remote::{CountFilter, RemoteStore};
