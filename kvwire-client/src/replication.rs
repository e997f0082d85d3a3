//! # Replication Connection
//!
//! Purpose: Split traffic between one master and its slaves: reads go to a
//! slave until the first write, after which everything goes to the master.
//!
//! ## Design Principles
//! 1. **Sticky Promotion**: One write moves the aggregate to the master for
//!    good; only `switch_to` or `disconnect` moves it back.
//! 2. **Table Classification**: Read/write comes from the command spec, with
//!    per-id overrides (fixed or argument-dependent).
//! 3. **Lazy Master**: `connect()` opens a single slave; the master opens on
//!    first use.
//!
//! ## State Machine
//!
//! ```text
//!   (none) ──connect/read──▶ on-slave ──write──▶ on-master
//!      ▲                        │                   │
//!      └──────disconnect────────┴───────────────────┘
//! ```

use std::collections::HashMap;
use std::fmt;

use tracing::{debug, warn};

use kvwire_common::{ClientError, ClientResult, Reply};

use crate::command::{Access, Command};
use crate::connection::{Connection, SingleConnection, StreamConnection};

/// Alias that marks a connection as the master.
pub const MASTER_ALIAS: &str = "master";

/// Per-command override of the read/write classification.
pub enum ReadOnly {
    /// The command is always (or never) read-only.
    Always(bool),
    /// Decide from the command's arguments.
    Predicate(Box<dyn Fn(&Command) -> bool + Send + Sync>),
}

impl ReadOnly {
    pub fn predicate<F>(check: F) -> Self
    where
        F: Fn(&Command) -> bool + Send + Sync + 'static,
    {
        ReadOnly::Predicate(Box::new(check))
    }

    fn is_read_only(&self, command: &Command) -> bool {
        match self {
            ReadOnly::Always(read_only) => *read_only,
            ReadOnly::Predicate(check) => check(command),
        }
    }
}

impl fmt::Debug for ReadOnly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadOnly::Always(read_only) => f.debug_tuple("Always").field(read_only).finish(),
            ReadOnly::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Master,
    Slave(usize),
}

/// Master/slave aggregate with read/write splitting.
#[derive(Debug)]
pub struct ReplicationConnection<C = StreamConnection> {
    master: Option<C>,
    slaves: Vec<C>,
    current: Option<Role>,
    next_slave: usize,
    overrides: HashMap<String, ReadOnly>,
}

impl<C: SingleConnection> Default for ReplicationConnection<C> {
    fn default() -> Self {
        ReplicationConnection {
            master: None,
            slaves: Vec::new(),
            current: None,
            next_slave: 0,
            overrides: HashMap::new(),
        }
    }
}

impl<C: SingleConnection> ReplicationConnection<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `connection`: alias `master` takes the master slot, any
    /// other connection becomes a slave.
    pub fn add(&mut self, connection: C) {
        let id = connection.node_id();
        if id == MASTER_ALIAS {
            if self.master.is_some() {
                warn!(connection = %connection.identity(), "replacing replication master");
            }
            self.master = Some(connection);
            if self.current == Some(Role::Master) {
                self.current = None;
            }
            return;
        }

        match self.slaves.iter().position(|slave| slave.node_id() == id) {
            Some(idx) => {
                self.slaves[idx] = connection;
                if self.current == Some(Role::Slave(idx)) {
                    self.current = None;
                }
            }
            None => self.slaves.push(connection),
        }
    }

    /// Removes the member named `id` (alias or identity) and returns it.
    pub fn remove(&mut self, id: &str) -> Option<C> {
        if self.master.as_ref().is_some_and(|master| matches_id(master, id)) {
            if self.current == Some(Role::Master) {
                self.current = None;
            }
            return self.master.take();
        }

        let idx = self.slaves.iter().position(|slave| matches_id(slave, id))?;
        self.current = match self.current {
            Some(Role::Slave(current)) if current == idx => None,
            Some(Role::Slave(current)) if current > idx => Some(Role::Slave(current - 1)),
            other => other,
        };
        Some(self.slaves.remove(idx))
    }

    pub fn master(&self) -> Option<&C> {
        self.master.as_ref()
    }

    pub fn slaves(&self) -> &[C] {
        &self.slaves
    }

    /// Connection the next command would use, if one is selected.
    pub fn current(&self) -> Option<&C> {
        match self.current? {
            Role::Master => self.master.as_ref(),
            Role::Slave(idx) => self.slaves.get(idx),
        }
    }

    /// Overrides the read/write classification of command `id`.
    pub fn set_command_read_only(&mut self, id: &str, read_only: ReadOnly) {
        self.overrides.insert(id.to_ascii_uppercase(), read_only);
    }

    /// Returns true when `command` may be served by a slave.
    pub fn is_read_operation(&self, command: &Command) -> ClientResult<bool> {
        if let Some(read_only) = self.overrides.get(command.id()) {
            return Ok(read_only.is_read_only(command));
        }
        match command.spec().access {
            Access::Read => Ok(true),
            Access::Write => Ok(false),
            Access::Unsupported => Err(ClientError::NotSupported(format!(
                "The command {} is not allowed in replication mode",
                command.id()
            ))),
        }
    }

    /// Makes the member named `id` current, regardless of classification.
    pub fn switch_to(&mut self, id: &str) -> ClientResult<()> {
        let role = if self.master.as_ref().is_some_and(|master| matches_id(master, id)) {
            Role::Master
        } else {
            let idx = self
                .slaves
                .iter()
                .position(|slave| matches_id(slave, id))
                .ok_or_else(|| ClientError::Configuration(format!("unknown connection alias '{id}'")))?;
            Role::Slave(idx)
        };
        debug!(target_node = id, "replication switched");
        self.current = Some(role);
        Ok(())
    }

    /// Picks the member that must serve `command`.
    pub fn get_connection(&mut self, command: &Command) -> ClientResult<&mut C> {
        self.check()?;
        let read_only = self.is_read_operation(command)?;

        if !read_only && self.current != Some(Role::Master) {
            debug!(command = %command.id(), "write promotes replication to master");
            self.current = Some(Role::Master);
        }
        if self.current.is_none() {
            self.current = Some(Role::Slave(self.pick_slave()));
        }

        let member = match self.current {
            Some(Role::Master) => self.master.as_mut(),
            Some(Role::Slave(idx)) => self.slaves.get_mut(idx),
            None => None,
        };
        member.ok_or_else(missing_members)
    }

    /// Direct lookup by alias or identity.
    pub fn get_connection_by_id(&mut self, id: &str) -> Option<&mut C> {
        if self.master.as_ref().is_some_and(|master| matches_id(master, id)) {
            return self.master.as_mut();
        }
        self.slaves.iter_mut().find(|slave| matches_id(&**slave, id))
    }

    fn check(&self) -> ClientResult<()> {
        if self.master.is_none() || self.slaves.is_empty() {
            return Err(missing_members());
        }
        Ok(())
    }

    fn pick_slave(&mut self) -> usize {
        let idx = self.next_slave % self.slaves.len().max(1);
        self.next_slave = idx + 1;
        idx
    }
}

fn matches_id<C: SingleConnection>(connection: &C, id: &str) -> bool {
    connection.node_id() == id || connection.identity() == id
}

fn missing_members() -> ClientError {
    ClientError::Configuration("replication needs a master and at least one slave".to_string())
}

impl<C: SingleConnection> Connection for ReplicationConnection<C> {
    /// Opens the current member, picking a slave when none is selected yet.
    /// A promoted aggregate stays on the master.
    fn connect(&mut self) -> ClientResult<()> {
        self.check()?;
        let role = match self.current {
            Some(role) => role,
            None => Role::Slave(self.pick_slave()),
        };
        let member = match role {
            Role::Master => self.master.as_mut(),
            Role::Slave(idx) => self.slaves.get_mut(idx),
        }
        .ok_or_else(missing_members)?;
        if !member.is_connected() {
            member.connect()?;
        }
        debug!(connection = %member.identity(), "replication connected");
        self.current = Some(role);
        Ok(())
    }

    fn disconnect(&mut self) {
        if let Some(master) = self.master.as_mut() {
            master.disconnect();
        }
        for slave in &mut self.slaves {
            slave.disconnect();
        }
        self.current = None;
    }

    fn is_connected(&self) -> bool {
        self.master.as_ref().is_some_and(|master| master.is_connected())
            || self.slaves.iter().any(|slave| slave.is_connected())
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
            .ok_or_else(|| ClientError::Configuration(format!("unknown connection alias '{id}'")))?
            .execute_command(command)
    }
}
