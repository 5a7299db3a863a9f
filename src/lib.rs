//! Deploywatch — polls a model-hosting inventory API and serves the
//! current deployments as a table over a local JSON-RPC socket.

pub mod api;
pub mod cache;
pub mod config;
pub mod decode;
pub mod error;
pub mod fetch;
pub mod model;
pub mod poller;
pub mod query;
pub mod server;
