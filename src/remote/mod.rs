//! Remote data store: typed rows and the HTTPS client that writes them.

pub mod api_types;
pub mod client;
#[cfg(test)]
pub mod mock;
pub mod types;

pub use client::{RemoteStore, RestClient};
pub use types::{Patch, Record, Row, Table};
