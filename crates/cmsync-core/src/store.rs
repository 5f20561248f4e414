//! Local and remote item stores
//!
//! Both sides are generic over an [`ItemTypeConfig`](crate::kinds::ItemTypeConfig):
//! one [`LocalItemStore`] handles every folder of JSON artifacts and one
//! [`RestItemStore`] every REST endpoint. [`RemoteItemStore`] is the seam the
//! engine talks to, with [`MemoryItemStore`] standing in for the server in
//! tests and in the offline `status` command, which only computes push
//! working sets and never reaches the remote.

mod local;
mod memory;
mod remote;
mod rest;

pub use local::LocalItemStore;
pub use memory::{MemoryItemStore, StoreOp};
pub use remote::{RemoteItemStore, WriteOptions};
pub use rest::{Credentials, RestItemStore, is_conflict_response};
