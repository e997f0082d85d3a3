//! # Connection Factory
//!
//! Purpose: Turn connection parameters into ready-to-use connections, with
//! their initialization commands queued, and assemble aggregates from them.

use std::sync::Arc;

use bytes::Bytes;

use kvwire_common::{ClientError, ClientResult};

use crate::cluster::ClusterConnection;
use crate::connection::{SingleConnection, StreamConnection};
use crate::parameters::ConnectionParameters;
use crate::profile::ServerProfile;
use crate::replication::ReplicationConnection;

/// Builds connections for a given command catalogue.
#[derive(Debug, Clone, Default)]
pub struct ConnectionFactory {
    profile: Arc<ServerProfile>,
}

impl ConnectionFactory {
    pub fn new(profile: Arc<ServerProfile>) -> Self {
        ConnectionFactory { profile }
    }

    /// Creates a disconnected single connection.
    ///
    /// `AUTH` and `SELECT` are queued as initialization commands when the
    /// parameters carry a password or a database index.
    pub fn create(&self, parameters: ConnectionParameters) -> ClientResult<StreamConnection> {
        let mut connection = StreamConnection::new(parameters);
        self.prepare(&mut connection)?;
        Ok(connection)
    }

    /// Queues the initialization commands implied by the connection's parameters.
    pub fn prepare<C: SingleConnection>(&self, connection: &mut C) -> ClientResult<()> {
        let mut init = Vec::new();
        let parameters = connection.parameters();
        if let Some(password) = &parameters.password {
            init.push(self.profile.create_command("AUTH", [Bytes::from(password.clone())])?);
        }
        if let Some(database) = parameters.database {
            init.push(self.profile.create_command("SELECT", [Bytes::from(database.to_string())])?);
        }
        for command in init {
            connection.push_init_command(command);
        }
        Ok(())
    }

    /// Builds a sharded cluster over `nodes`.
    pub fn create_cluster<I>(&self, nodes: I) -> ClientResult<ClusterConnection>
    where
        I: IntoIterator<Item = ConnectionParameters>,
    {
        let mut cluster = ClusterConnection::new();
        for parameters in nodes {
            cluster.add(self.create(parameters)?);
        }
        if cluster.is_empty() {
            return Err(ClientError::InvalidParameters("a cluster needs at least one node".to_string()));
        }
        Ok(cluster)
    }

    /// Builds a master/slave set; the node aliased `master` is the master.
    pub fn create_replication<I>(&self, nodes: I) -> ClientResult<ReplicationConnection>
    where
        I: IntoIterator<Item = ConnectionParameters>,
    {
        let mut replication = ReplicationConnection::new();
        for parameters in nodes {
            replication.add(self.create(parameters)?);
        }
        Ok(replication)
    }
}
