mod id;

pub use self::id::NodeId;
use crate::{
    defaults::{DEFAULT_RECEIVE_BUFFER, EPHEMERAL_PORT_START},
    network::{SocketError, SocketId},
};
use std::collections::HashMap;

/// A host of the simulated [`Network`].
///
/// A node is little more than a port table: every [`Socket`] opened on the
/// node that has been bound owns one port. Incoming packets are handed to
/// the socket bound at their destination port.
///
/// You never construct a `Node` directly, use [`Network::new_node`].
///
/// [`Network`]: crate::network::Network
/// [`Network::new_node`]: crate::network::Network::new_node
/// [`Socket`]: crate::network::Socket
#[derive(Debug)]
pub struct Node {
    id: NodeId,

    /// optional human name, only used in logs
    name: Option<String>,

    /// receive buffer given to every socket opened on the node, in bytes
    receive_buffer: u64,

    ports: HashMap<u16, SocketId>,

    /// next candidate for an ephemeral port
    ephemeral: u16,
}

impl Node {
    pub(crate) fn new(id: NodeId) -> Self {
        Self {
            id,
            name: None,
            receive_buffer: DEFAULT_RECEIVE_BUFFER,
            ports: HashMap::new(),
            ephemeral: EPHEMERAL_PORT_START,
        }
    }

    #[inline]
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub(crate) fn set_name(&mut self, name: String) {
        self.name = Some(name);
    }

    pub fn receive_buffer(&self) -> u64 {
        self.receive_buffer
    }

    pub(crate) fn set_receive_buffer(&mut self, receive_buffer: u64) {
        self.receive_buffer = receive_buffer;
    }

    /// the socket bound to `port`, if any
    pub fn socket_at(&self, port: u16) -> Option<SocketId> {
        self.ports.get(&port).copied()
    }

    /// Reserve `port` for `socket`. Port `0` picks the next free ephemeral
    /// port.
    pub(crate) fn bind(&mut self, socket: SocketId, port: u16) -> Result<u16, SocketError> {
        let port = if port == 0 {
            self.ephemeral_port()?
        } else if self.ports.contains_key(&port) {
            return Err(SocketError::PortInUse {
                node: self.id,
                port,
            });
        } else {
            port
        };

        self.ports.insert(port, socket);
        Ok(port)
    }

    pub(crate) fn release(&mut self, port: u16) {
        self.ports.remove(&port);
    }

    fn ephemeral_port(&mut self) -> Result<u16, SocketError> {
        let range = usize::from(u16::MAX - EPHEMERAL_PORT_START) + 1;

        for _ in 0..range {
            let candidate = self.ephemeral;
            self.ephemeral = if candidate == u16::MAX {
                EPHEMERAL_PORT_START
            } else {
                candidate + 1
            };

            if !self.ports.contains_key(&candidate) {
                return Ok(candidate);
            }
        }

        Err(SocketError::PortsExhausted { node: self.id })
    }
}
