//! jsonstash library
//!
//! Fetches JSON documents by URL and keeps the last good copy of each on
//! disk, so that a failed fetch can be answered from the cache instead.

pub mod cache;
pub mod cli;
pub mod fetch;
pub mod remote;

pub use remote::{read_json, Fetched, PayloadOrigin, ReadJsonError, RemoteJson, Source};
