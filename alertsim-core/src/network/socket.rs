use super::Packet;
use crate::{app::AppId, node::NodeId};
use anyhow::{anyhow, bail};
use std::{collections::VecDeque, fmt, str::FromStr};
use thiserror::Error;

/// Identifier of a [`Socket`] opened with [`Network::open_socket`].
///
/// [`Network::open_socket`]: super::Network::open_socket
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SocketId(u64);

/// A transport address: a node and a port on that node.
///
/// ```
/// # use alertsim_core::network::Address;
/// let address: Address = "1:9000".parse().unwrap();
/// assert_eq!(address.port(), 9000);
/// assert_eq!(address.to_string(), "1:9000");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address {
    node: NodeId,
    port: u16,
}

/// A datagram endpoint living on a node.
///
/// Sockets are owned by the [`Network`] and manipulated through their
/// [`SocketId`]. A socket must be bound to a local port before it can send
/// or receive, and connected to a remote [`Address`] before [`send`] can be
/// used. Received packets wait in the socket's queue until read with
/// [`recv`]; the queue holds at most the socket's receive buffer in bytes.
///
/// [`Network`]: super::Network
/// [`send`]: super::Network::send
/// [`recv`]: super::Network::recv
#[derive(Debug)]
pub struct Socket {
    id: SocketId,
    node: NodeId,
    local_port: Option<u16>,
    remote: Option<Address>,

    received: VecDeque<Packet>,
    received_bytes: u64,
    receive_buffer: u64,

    /// application to notify when data is available
    handler: Option<AppId>,

    closed: bool,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SocketError {
    #[error("Socket ({0}) Not Found")]
    SocketNotFound(SocketId),
    #[error("Node ({0}) Not Found")]
    NodeNotFound(NodeId),
    #[error("Socket ({socket}) belongs to node {owner}, not to node {node}")]
    WrongNode {
        socket: SocketId,
        owner: NodeId,
        node: NodeId,
    },
    #[error("Port {port} already in use on node {node}")]
    PortInUse { node: NodeId, port: u16 },
    #[error("No ephemeral port left on node {node}")]
    PortsExhausted { node: NodeId },
    #[error("Socket ({0}) is already bound")]
    AlreadyBound(SocketId),
    #[error("Socket ({0}) is not bound")]
    NotBound(SocketId),
    #[error("Socket ({0}) is not connected")]
    NotConnected(SocketId),
    #[error("Socket ({0}) is closed")]
    Closed(SocketId),
}

impl SocketId {
    pub(crate) const fn new(id: u64) -> Self {
        Self(id)
    }

    #[must_use = "function does not modify the current value"]
    pub(crate) fn next(self) -> Self {
        Self::new(self.0 + 1)
    }
}

impl fmt::Display for SocketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "socket#{}", self.0)
    }
}

impl Address {
    pub const fn new(node: NodeId, port: u16) -> Self {
        Self { node, port }
    }

    #[inline]
    pub fn node(&self) -> NodeId {
        self.node
    }

    #[inline]
    pub fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.node, self.port)
    }
}

impl FromStr for Address {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some((node, port)) = s.split_once(':') else {
            bail!("Expecting `<node>:<port>', got `{s}'")
        };
        let node: NodeId = node.trim().parse()?;
        let port: u16 = port
            .trim()
            .parse()
            .map_err(|error| anyhow!("Invalid port `{port}': {error}"))?;
        Ok(Self::new(node, port))
    }
}

impl Socket {
    pub(crate) fn new(id: SocketId, node: NodeId, receive_buffer: u64) -> Self {
        Self {
            id,
            node,
            local_port: None,
            remote: None,
            received: VecDeque::new(),
            received_bytes: 0,
            receive_buffer,
            handler: None,
            closed: false,
        }
    }

    pub fn id(&self) -> SocketId {
        self.id
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    /// the address the socket is bound to
    pub fn local_address(&self) -> Option<Address> {
        self.local_port.map(|port| Address::new(self.node, port))
    }

    /// the address the socket is connected to
    pub fn remote_address(&self) -> Option<Address> {
        self.remote
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn handler(&self) -> Option<AppId> {
        self.handler
    }

    /// number of packets waiting to be read
    pub fn pending_packets(&self) -> usize {
        self.received.len()
    }

    pub(crate) fn ensure_open(&self) -> Result<(), SocketError> {
        if self.closed {
            Err(SocketError::Closed(self.id))
        } else {
            Ok(())
        }
    }

    pub(crate) fn set_local_port(&mut self, port: u16) {
        self.local_port = Some(port);
    }

    pub(crate) fn set_remote(&mut self, remote: Address) {
        self.remote = Some(remote);
    }

    pub(crate) fn set_handler(&mut self, handler: AppId) {
        self.handler = Some(handler);
    }

    /// `true` if a packet of `size` bytes fits in the receive buffer
    pub(crate) fn can_hold(&self, size: u64) -> bool {
        !self.closed && self.received_bytes.saturating_add(size) <= self.receive_buffer
    }

    /// queue a received packet, the caller checked [`Socket::can_hold`]
    pub(crate) fn push(&mut self, packet: Packet) {
        debug_assert!(self.can_hold(packet.bytes_size()));
        self.received_bytes += packet.bytes_size();
        self.received.push_back(packet);
    }

    pub(crate) fn pop(&mut self) -> Option<Packet> {
        let packet = self.received.pop_front()?;
        self.received_bytes -= packet.bytes_size();
        Some(packet)
    }

    /// mark the socket closed, returns the port it was bound to so it
    /// can be released on the node
    pub(crate) fn close(&mut self) -> Option<u16> {
        self.closed = true;
        self.received.clear();
        self.received_bytes = 0;
        self.handler = None;
        self.remote = None;
        self.local_port.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{SimTime, network::PacketIdGenerator};

    fn packet(generator: &mut PacketIdGenerator, size: usize) -> Packet {
        Packet::new(
            generator.generate(),
            Address::new(NodeId::ONE, 49_153),
            Address::new(NodeId::ZERO, 9_000),
            SimTime::ZERO,
            vec![0; size].into_boxed_slice(),
        )
    }

    #[test]
    fn address_parse() {
        assert_eq!(
            "3:9001".parse::<Address>().unwrap(),
            Address::new(NodeId::new(3), 9001)
        );
        assert!("3".parse::<Address>().is_err());
        assert!("3:70000".parse::<Address>().is_err());
        assert!("x:1".parse::<Address>().is_err());
    }

    #[test]
    fn receive_queue_is_fifo() {
        let mut generator = PacketIdGenerator::new();
        let mut socket = Socket::new(SocketId::new(1), NodeId::ZERO, 10_000);

        let first = packet(&mut generator, 10);
        let second = packet(&mut generator, 20);
        let (first_id, second_id) = (first.id(), second.id());

        socket.push(first);
        socket.push(second);
        assert_eq!(socket.pending_packets(), 2);

        assert_eq!(socket.pop().unwrap().id(), first_id);
        assert_eq!(socket.pop().unwrap().id(), second_id);
        assert!(socket.pop().is_none());
    }

    #[test]
    fn receive_buffer_overflow() {
        let mut generator = PacketIdGenerator::new();
        let mut socket = Socket::new(SocketId::new(1), NodeId::ZERO, 100);

        socket.push(packet(&mut generator, 60));
        assert!(!socket.can_hold(60));
        assert!(socket.can_hold(40));

        // reading frees the buffer
        socket.pop().unwrap();
        assert!(socket.can_hold(60));
    }

    #[test]
    fn close_releases_port_and_drops_queue() {
        let mut generator = PacketIdGenerator::new();
        let mut socket = Socket::new(SocketId::new(1), NodeId::ZERO, 1_000);
        socket.set_local_port(9_000);
        socket.push(packet(&mut generator, 10));

        assert_eq!(socket.close(), Some(9_000));
        assert!(socket.is_closed());
        assert_eq!(socket.pending_packets(), 0);
        assert_eq!(socket.close(), None);
        assert!(!socket.can_hold(10));
    }
}
