//! # kvwire Sync Client
//!
//! Purpose: Dispatch Redis-compatible commands over RESP2 to one server, a
//! client-side sharded cluster, or a master/slave replication set.
//!
//! ## Design Principles
//! 1. **Composite Connections**: Single connections and aggregates share the
//!    `Connection` trait, so routing is invisible to the client facade.
//! 2. **Table-Driven Commands**: Key layout, replication access and reply
//!    parsing come from the `ServerProfile` catalogue.
//! 3. **Blocking and Explicit**: All I/O happens on the calling thread; no
//!    background work, no global state.
//! 4. **Minimal Allocation**: Arguments are `Bytes`; connections reuse their
//!    framing buffers.

mod client;
mod cluster;
mod command;
mod connection;
mod distribution;
mod factory;
mod parameters;
mod prefix;
mod profile;
mod replication;
mod value;

pub use client::{Client, ClientOptions, ClientTtl, Script, Topology};
pub use cluster::ClusterConnection;
pub use command::{Access, Command, CommandSpec, KeyStrategy};
pub use connection::{Connection, SingleConnection, StreamConnection};
pub use distribution::{extract_key_tag, Distributor, HashRing, DEFAULT_REPLICAS, DEFAULT_WEIGHT};
pub use factory::ConnectionFactory;
pub use parameters::{ConnectionParameters, Scheme};
pub use prefix::KeyPrefix;
pub use profile::ServerProfile;
pub use replication::{ReadOnly, ReplicationConnection, MASTER_ALIAS};
pub use value::{ResponseParser, Value};

pub use kvwire_common::{ClientError, ClientResult, DecodeError, ErrorReply, Reply};
