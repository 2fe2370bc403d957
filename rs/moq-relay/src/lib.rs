//! Relay binary support crate: the announce registrar/client, remote fetcher, relay server, and
//! relay-local HTTP surface built on top of the transport-agnostic `moq-relay-core`.

pub mod announce;
pub mod config;
pub mod dto;
pub mod fetcher;
pub mod http;
pub mod server;
pub mod transport;
