//! # Cluster Connection
//!
//! Purpose: Front a static set of servers and shard commands across them by
//! the hash of their routing key.
//!
//! ## Design Principles
//! 1. **Composite Pattern**: The cluster is itself a `Connection`; the client
//!    does not know it is talking to several servers.
//! 2. **Pluggable Distribution**: Node choice goes through a `Distributor`
//!    (consistent-hash ring by default).
//! 3. **No Guessing**: Commands without a single routing key are rejected,
//!    never sent to an arbitrary node.

use tracing::{debug, trace};

use kvwire_common::{ClientError, ClientResult, Reply};

use crate::command::Command;
use crate::connection::{Connection, SingleConnection, StreamConnection};
use crate::distribution::{Distributor, HashRing};

/// Client-side sharded set of connections.
#[derive(Debug)]
pub struct ClusterConnection<C = StreamConnection, D = HashRing> {
    // (node id, connection) in insertion order.
    nodes: Vec<(String, C)>,
    distributor: D,
}

impl<C: SingleConnection, D: Distributor + Default> Default for ClusterConnection<C, D> {
    fn default() -> Self {
        ClusterConnection::with_distributor(D::default())
    }
}

impl<C: SingleConnection, D: Distributor + Default> ClusterConnection<C, D> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<C: SingleConnection, D: Distributor> ClusterConnection<C, D> {
    pub fn with_distributor(distributor: D) -> Self {
        ClusterConnection {
            nodes: Vec::new(),
            distributor,
        }
    }

    pub fn distributor(&self) -> &D {
        &self.distributor
    }

    /// Adds `connection` to the cluster, replacing a member with the same id.
    pub fn add(&mut self, connection: C) {
        let id = connection.node_id();
        let weight = connection.parameters().weight;
        self.distributor.add(&id, weight);
        match self.nodes.iter_mut().find(|(node, _)| *node == id) {
            Some(entry) => entry.1 = connection,
            None => self.nodes.push((id, connection)),
        }
    }

    /// Removes the member named `id` (alias or identity) and returns it.
    pub fn remove(&mut self, id: &str) -> Option<C> {
        let idx = self.position(id)?;
        let (node, connection) = self.nodes.remove(idx);
        self.distributor.remove(&node);
        Some(connection)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Members in insertion order.
    pub fn connections(&self) -> impl Iterator<Item = &C> {
        self.nodes.iter().map(|(_, connection)| connection)
    }

    /// Direct lookup by alias or identity, bypassing hashing.
    pub fn get_connection_by_id(&mut self, id: &str) -> Option<&mut C> {
        let idx = self.position(id)?;
        Some(&mut self.nodes[idx].1)
    }

    /// Resolves the member that owns `command`'s routing key.
    pub fn get_connection(&mut self, command: &Command) -> ClientResult<&mut C> {
        let key = command.routing_key().ok_or_else(|| {
            ClientError::NotSupported(format!(
                "Cannot use '{}' over clusters of connections",
                command.id()
            ))
        })?;

        let node = self
            .distributor
            .node_for(key)
            .ok_or_else(|| ClientError::Configuration("cluster has no connections".to_string()))?;
        let idx = self
            .nodes
            .iter()
            .position(|(id, _)| id == node)
            .ok_or_else(|| ClientError::Configuration(format!("unknown cluster node '{node}'")))?;

        trace!(command = %command.id(), node = %self.nodes[idx].0, "routed");
        Ok(&mut self.nodes[idx].1)
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.nodes
            .iter()
            .position(|(node, connection)| node == id || connection.identity() == id)
    }
}

impl<C: SingleConnection, D: Distributor> Connection for ClusterConnection<C, D> {
    fn connect(&mut self) -> ClientResult<()> {
        let mut opened: Vec<usize> = Vec::new();
        for idx in 0..self.nodes.len() {
            let connection = &mut self.nodes[idx].1;
            if connection.is_connected() {
                continue;
            }
            if let Err(err) = connection.connect() {
                for &done in &opened {
                    let member: &mut C = &mut self.nodes[done].1;
                    member.disconnect();
                }
                return Err(err);
            }
            opened.push(idx);
        }
        debug!(nodes = self.nodes.len(), "cluster connected");
        Ok(())
    }

    fn disconnect(&mut self) {
        for (_, connection) in &mut self.nodes {
            connection.disconnect();
        }
    }

    fn is_connected(&self) -> bool {
        self.nodes.iter().any(|(_, connection)| connection.is_connected())
    }

    fn write_command(&mut self, command: &Command) -> ClientResult<()> {
        self.get_connection(command)?.write_command(command)
    }

    fn read_response(&mut self, command: &Command) -> ClientResult<Reply> {
        self.get_connection(command)?.read_response(command)
    }

    fn execute_command(&mut self, command: &Command) -> ClientResult<Reply> {
        self.get_connection(command)?.execute_command(command)
    }

    fn execute_on(&mut self, id: &str, command: &Command) -> ClientResult<Reply> {
        self.get_connection_by_id(id)
            .ok_or_else(|| ClientError::Configuration(format!("unknown connection '{id}'")))?
            .execute_command(command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::testing::MockConnection;
    use crate::profile::ServerProfile;

    fn cluster() -> ClusterConnection<MockConnection> {
        let mut cluster = ClusterConnection::new();
        cluster.add(MockConnection::tcp("127.0.0.1", 7001));
        cluster.add(MockConnection::tcp("127.0.0.1", 7002));
        cluster.add(MockConnection::aliased("third", 7003));
        cluster
    }

    #[test]
    fn same_key_routes_to_same_node() {
        let profile = ServerProfile::default();
        let mut cluster = cluster();
        let get = profile.create_command("GET", ["user:1"]).unwrap();
        let set = profile.create_command("SET", ["user:1", "v"]).unwrap();

        let first = cluster.get_connection(&get).unwrap().identity().to_string();
        let second = cluster.get_connection(&set).unwrap().identity().to_string();
        assert_eq!(first, second);
    }

    #[test]
    fn hash_tags_colocate_keys() {
        let profile = ServerProfile::default();
        let mut cluster = cluster();
        let nodes: Vec<String> = ["{user:42}:profile", "{user:42}:sessions", "{user:42}"]
            .iter()
            .map(|key| {
                let cmd = profile.create_command("GET", [*key]).unwrap();
                cluster.get_connection(&cmd).unwrap().identity().to_string()
            })
            .collect();
        assert!(nodes.windows(2).all(|pair| pair[0] == pair[1]));

        let mget = profile
            .create_command("MGET", ["{user:42}:a", "{user:42}:b"])
            .unwrap();
        assert_eq!(cluster.get_connection(&mget).unwrap().identity(), nodes[0]);
    }

    #[test]
    fn keyless_and_cross_slot_commands_are_rejected() {
        let profile = ServerProfile::default();
        let mut cluster = cluster();

        let ping = profile.create_command::<_, bytes::Bytes>("PING", []).unwrap();
        let err = cluster.execute_command(&ping).unwrap_err();
        assert!(matches!(err, ClientError::NotSupported(msg) if msg.contains("PING")));

        let del = profile.create_command("DEL", ["a", "b"]).unwrap();
        assert!(matches!(
            cluster.get_connection(&del),
            Err(ClientError::NotSupported(_))
        ));
    }

    #[test]
    fn lookup_by_alias_or_identity() {
        let mut cluster = cluster();
        assert!(cluster.get_connection_by_id("third").is_some());
        assert!(cluster.get_connection_by_id("tcp://127.0.0.1:7001").is_some());
        assert!(cluster.get_connection_by_id("tcp://127.0.0.1:9999").is_none());
    }

    #[test]
    fn execute_on_bypasses_hashing() {
        let profile = ServerProfile::default();
        let mut cluster = cluster();
        let ping = profile.create_command::<_, bytes::Bytes>("PING", []).unwrap();

        cluster.execute_on("third", &ping).unwrap();
        let third = cluster.get_connection_by_id("third").unwrap();
        assert_eq!(third.executed, vec!["PING".to_string()]);

        assert!(matches!(
            cluster.execute_on("nope", &ping),
            Err(ClientError::Configuration(_))
        ));
    }

    #[test]
    fn removal_only_moves_removed_keys() {
        let profile = ServerProfile::default();
        let mut cluster = cluster();
        let keys: Vec<String> = (0..200).map(|i| format!("key:{i}")).collect();
        let owner = |cluster: &mut ClusterConnection<MockConnection>, key: &str| {
            let cmd = profile.create_command("GET", [bytes::Bytes::copy_from_slice(key.as_bytes())]).unwrap();
            cluster.get_connection(&cmd).unwrap().node_id()
        };

        let before: Vec<String> = keys.iter().map(|key| owner(&mut cluster, key)).collect();
        assert!(cluster.remove("tcp://127.0.0.1:7002").is_some());
        assert_eq!(cluster.len(), 2);

        for (key, old) in keys.iter().zip(before) {
            let new = owner(&mut cluster, key);
            if old != "tcp://127.0.0.1:7002" {
                assert_eq!(new, old);
            }
        }
    }

    #[test]
    fn connect_is_all_or_nothing() {
        let mut cluster = ClusterConnection::<MockConnection>::new();
        cluster.add(MockConnection::tcp("127.0.0.1", 7001));
        let mut broken = MockConnection::tcp("127.0.0.1", 7002);
        broken.fail_connect = true;
        cluster.add(broken);

        assert!(cluster.connect().is_err());
        assert!(!cluster.is_connected());
        assert!(cluster.connections().all(|conn| !conn.is_connected()));
    }

    #[test]
    fn connect_and_disconnect_apply_to_all() {
        let mut cluster = cluster();
        assert!(!cluster.is_connected());
        cluster.connect().unwrap();
        assert!(cluster.connections().all(|conn| conn.is_connected()));

        cluster.get_connection_by_id("third").unwrap().disconnect();
        assert!(cluster.is_connected());

        cluster.disconnect();
        assert!(!cluster.is_connected());
    }
}
