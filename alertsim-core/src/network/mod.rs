mod packet;
mod socket;

use crate::{
    SimTime,
    app::AppId,
    defaults::DEFAULT_QUEUE_CAPACITY,
    link::{Link, LinkDirection, LinkId},
    measure::{DataRate, Latency, PacketLoss},
    node::{Node, NodeId},
    stats::{DropReason, FlowMonitor, LinkStats, NetworkStats},
};
use rand_chacha::ChaChaRng;
use rand_core::SeedableRng as _;
use std::collections::HashMap;
use thiserror::Error;
use tracing::debug;

pub use self::{
    packet::{Packet, PacketId, PacketIdGenerator},
    socket::{Address, Socket, SocketError, SocketId},
};

/// This is the entry point for all transport activities of [`alertsim_core`].
///
/// The [`Network`] owns every [`Node`], every [`Link`] and every [`Socket`].
/// Sending through a socket computes, from the link's [`DataRate`], its
/// transmit queue and its [`Latency`], the virtual instant at which the
/// packet reaches the other end. The caller is responsible for calling
/// [`Network::deliver`] at that instant, which is what the [`Simulation`]
/// does by scheduling a delivery event.
///
/// [`alertsim_core`]: crate
/// [`Simulation`]: crate::sim::Simulation
pub struct Network {
    packet_id_generator: PacketIdGenerator,

    nodes: HashMap<NodeId, Node>,

    links: HashMap<LinkId, Link>,

    sockets: HashMap<SocketId, Socket>,

    /// the last assigned ID
    ///
    /// ID 0 is an error and shouldn't be given
    id: NodeId,

    /// the last assigned socket ID
    socket_id: SocketId,

    /// Centralised RNG for all packet-loss decisions on every link.
    ///
    /// A single source guarantees that the simulation is reproducible when
    /// seeded via [`Network::set_seed`].
    rng: ChaChaRng,

    flows: FlowMonitor,
}

/// Builder for configuring a new node before registering it with the network.
///
/// Obtained via [`Network::new_node`].
///
/// ```
/// use alertsim_core::network::Network;
///
/// let mut network = Network::new();
///
/// let cloud = network.new_node().set_name("cloud").build();
/// let station = network
///     .new_node()
///     .set_name("station-0")
///     .set_receive_buffer(64 * 1_024)
///     .build();
/// assert_eq!(network.node(station).unwrap().name(), Some("station-0"));
/// ```
pub struct NodeBuilder<'a> {
    node: Node,

    network: &'a mut Network,
}

/// Builder for configuring a link between two nodes.
///
/// Obtained via [`Network::configure_link`]. Call [`LinkBuilder::apply`] to
/// commit the configuration.
pub struct LinkBuilder<'a> {
    a: NodeId,
    b: NodeId,
    data_rate: DataRate,
    latency: Latency,
    packet_loss: PacketLoss,
    queue_capacity: usize,
    network: &'a mut Network,
}

/// A packet accepted by a link, on its way to the recipient.
#[derive(Debug)]
pub struct Transit {
    packet: Packet,
    arrival: SimTime,
}

/// Where a delivered packet ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delivery {
    pub socket: SocketId,
    /// the application to notify, if the socket has a receive handler
    pub handler: Option<AppId>,
}

/// Error returned when a route between two nodes cannot be established.
///
/// Nodes are not automatically connected when created, a link must be
/// explicitly configured via [`Network::configure_link`] before packets
/// can be sent between them.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RouteError {
    /// The receiving node ID was not found in the network.
    #[error("Recipient ({recipient}) Not Found")]
    RecipientNotFound { recipient: NodeId },
    /// No link has been configured between the two nodes.
    #[error("Link ({link}) Not Found: nodes are not directly connected, call configure_link first")]
    LinkNotFound { link: LinkId },
}

/// Error returned when [`Network::send`] fails.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SendError {
    #[error("{0}")]
    Route(#[from] RouteError),
    #[error("{0}")]
    Socket(#[from] SocketError),
    /// The transmitter of the link already holds `capacity` packets; the
    /// packet was dropped.
    #[error("Link ({link}) transmit queue is full ({capacity} packets)")]
    QueueFull { link: LinkId, capacity: usize },
}

impl Default for Network {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeBuilder<'_> {
    /// name used in the logs
    pub fn set_name(mut self, name: impl Into<String>) -> Self {
        self.node.set_name(name.into());
        self
    }

    /// Set the receive buffer, in bytes, of the sockets opened on this node.
    ///
    /// A packet arriving at a socket whose queued bytes plus the packet's
    /// size would exceed the buffer is dropped.
    pub fn set_receive_buffer(mut self, receive_buffer: u64) -> Self {
        self.node.set_receive_buffer(receive_buffer);
        self
    }

    /// Finalise the node configuration and register it with the network.
    ///
    /// Returns the [`NodeId`] assigned to this node.
    pub fn build(self) -> NodeId {
        let Self { node, network } = self;

        let id = node.id();

        network.nodes.insert(id, node);

        id
    }
}

impl LinkBuilder<'_> {
    /// Set the data rate of this link.
    ///
    /// The same rate applies to both directions independently.
    pub fn set_data_rate(mut self, data_rate: DataRate) -> Self {
        self.data_rate = data_rate;
        self
    }

    /// Set the one-way latency of this link.
    pub fn set_latency(mut self, latency: Latency) -> Self {
        self.latency = latency;
        self
    }

    /// Set the probabilistic packet loss rate for this link.
    pub fn set_packet_loss(mut self, packet_loss: PacketLoss) -> Self {
        self.packet_loss = packet_loss;
        self
    }

    /// Set how many packets each direction's transmitter can hold.
    pub fn set_queue_capacity(mut self, queue_capacity: usize) -> Self {
        self.queue_capacity = queue_capacity;
        self
    }

    /// Commit the link configuration to the network.
    pub fn apply(self) {
        let Self {
            a,
            b,
            data_rate,
            latency,
            packet_loss,
            queue_capacity,
            network,
        } = self;
        let id = LinkId::new((a, b));
        network.links.insert(
            id,
            Link::new(data_rate, latency, packet_loss, queue_capacity),
        );
    }
}

impl Transit {
    pub fn packet(&self) -> &Packet {
        &self.packet
    }

    /// the virtual instant the packet reaches the recipient's node
    pub fn arrival(&self) -> SimTime {
        self.arrival
    }

    pub fn into_parts(self) -> (Packet, SimTime) {
        (self.packet, self.arrival)
    }
}

impl Network {
    /// Create a new, empty simulated network.
    ///
    /// # Example
    ///
    /// ```
    /// use alertsim_core::network::Network;
    ///
    /// let mut network = Network::new();
    /// let n1 = network.new_node().build();
    /// let n2 = network.new_node().build();
    /// network.configure_link(n1, n2).apply();
    /// ```
    pub fn new() -> Self {
        Self {
            packet_id_generator: PacketIdGenerator::new(),
            nodes: HashMap::new(),
            links: HashMap::new(),
            sockets: HashMap::new(),
            id: NodeId::ZERO,
            socket_id: SocketId::new(0),
            rng: ChaChaRng::seed_from_u64(0),
            flows: FlowMonitor::new(),
        }
    }

    /// Re-seed the network's random-number generator.
    ///
    /// All packet-loss decisions for every link are drawn from a single
    /// [`ChaChaRng`]. The default seed is `0`.
    pub fn set_seed(&mut self, seed: u64) {
        self.rng = ChaChaRng::seed_from_u64(seed);
    }

    /// Create a new node and return a builder to configure it.
    ///
    /// Node IDs are assigned sequentially starting at `1`. [`NodeId::ZERO`] is
    /// reserved as a sentinel and is never returned by this method.
    pub fn new_node(&mut self) -> NodeBuilder<'_> {
        self.id = self.id.next();
        NodeBuilder {
            node: Node::new(self.id),
            network: self,
        }
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    /// Configure the link between two nodes.
    ///
    /// If a link already exists between these nodes it will be replaced,
    /// packets already in flight keep their arrival time.
    ///
    /// ```
    /// # use alertsim_core::{network::Network, Latency};
    /// # use std::time::Duration;
    /// let mut network = Network::new();
    /// let n1 = network.new_node().build();
    /// let n2 = network.new_node().build();
    ///
    /// network
    ///     .configure_link(n1, n2)
    ///     .set_latency(Latency::new(Duration::from_millis(10)))
    ///     .set_data_rate("100Mbps".parse().unwrap())
    ///     .set_queue_capacity(100)
    ///     .apply();
    /// ```
    pub fn configure_link(&mut self, a: NodeId, b: NodeId) -> LinkBuilder<'_> {
        LinkBuilder {
            a,
            b,
            data_rate: DataRate::default(),
            latency: Latency::default(),
            packet_loss: PacketLoss::default(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            network: self,
        }
    }

    pub fn link(&self, a: NodeId, b: NodeId) -> Option<&Link> {
        self.links.get(&LinkId::new((a, b)))
    }

    pub fn socket(&self, id: SocketId) -> Option<&Socket> {
        self.sockets.get(&id)
    }

    /// Open a new, unbound socket on `node`.
    pub fn open_socket(&mut self, node: NodeId) -> Result<SocketId, SocketError> {
        let Some(host) = self.nodes.get(&node) else {
            return Err(SocketError::NodeNotFound(node));
        };
        let receive_buffer = host.receive_buffer();

        self.socket_id = self.socket_id.next();
        let id = self.socket_id;
        self.sockets
            .insert(id, Socket::new(id, node, receive_buffer));

        Ok(id)
    }

    /// Bind the socket to `port` on its node. Port `0` picks the next
    /// free ephemeral port.
    ///
    /// # Errors
    ///
    /// [`SocketError::PortInUse`] if another socket of the node holds the
    /// port, [`SocketError::AlreadyBound`] if the socket already has a
    /// local address.
    pub fn bind(&mut self, socket: SocketId, port: u16) -> Result<Address, SocketError> {
        let Some(entry) = self.sockets.get_mut(&socket) else {
            return Err(SocketError::SocketNotFound(socket));
        };
        entry.ensure_open()?;
        if entry.local_address().is_some() {
            return Err(SocketError::AlreadyBound(socket));
        }
        let Some(node) = self.nodes.get_mut(&entry.node()) else {
            return Err(SocketError::NodeNotFound(entry.node()));
        };

        let port = node.bind(socket, port)?;
        entry.set_local_port(port);

        debug!(%socket, port, node = %node.id(), "bound");
        Ok(Address::new(node.id(), port))
    }

    /// Set the default destination used by [`Network::send`].
    pub fn connect(&mut self, socket: SocketId, remote: Address) -> Result<(), SocketError> {
        let entry = self.socket_mut(socket)?;
        entry.ensure_open()?;
        entry.set_remote(remote);
        Ok(())
    }

    /// Register the application notified when packets reach the socket.
    pub fn set_receive_handler(&mut self, socket: SocketId, app: AppId) -> Result<(), SocketError> {
        let entry = self.socket_mut(socket)?;
        entry.ensure_open()?;
        entry.set_handler(app);
        Ok(())
    }

    /// Pop the oldest packet waiting on the socket.
    pub fn recv(&mut self, socket: SocketId) -> Result<Option<Packet>, SocketError> {
        Ok(self.socket_mut(socket)?.pop())
    }

    /// Close the socket: release its port and drop whatever it had queued.
    ///
    /// Closing an already closed socket does nothing.
    pub fn close(&mut self, socket: SocketId) -> Result<(), SocketError> {
        let entry = self.socket_mut(socket)?;
        if entry.is_closed() {
            return Ok(());
        }
        let node = entry.node();
        if let Some(port) = entry.close()
            && let Some(node) = self.nodes.get_mut(&node)
        {
            node.release(port);
        }
        debug!(%socket, "closed");
        Ok(())
    }

    /// Send `payload` to the address the socket is connected to.
    ///
    /// # Errors
    ///
    /// [`SocketError::NotConnected`] if [`Network::connect`] was never
    /// called, otherwise see [`Network::send_to`].
    pub fn send(
        &mut self,
        now: SimTime,
        socket: SocketId,
        payload: Box<[u8]>,
    ) -> Result<Option<Transit>, SendError> {
        let entry = self.socket_mut(socket)?;
        entry.ensure_open()?;
        let Some(remote) = entry.remote_address() else {
            return Err(SocketError::NotConnected(socket).into());
        };
        self.send_to(now, socket, remote, payload)
    }

    /// Send `payload` from the socket to `to`.
    ///
    /// Returns the packet in transit and its arrival time, or `None` if the
    /// link's [`PacketLoss`] model dropped the packet (a lost packet is not
    /// an error, as for any datagram transport).
    ///
    /// # Errors
    ///
    /// - [`SendError::Socket`] if the socket is unknown, closed or unbound.
    /// - [`SendError::Route`] if the recipient node does not exist or no
    ///   link connects the two nodes.
    /// - [`SendError::QueueFull`] if the link's transmitter is at capacity.
    pub fn send_to(
        &mut self,
        now: SimTime,
        socket: SocketId,
        to: Address,
        payload: Box<[u8]>,
    ) -> Result<Option<Transit>, SendError> {
        let entry = self.socket_mut(socket)?;
        entry.ensure_open()?;
        let Some(from) = entry.local_address() else {
            return Err(SocketError::NotBound(socket).into());
        };

        if !self.nodes.contains_key(&to.node()) {
            return Err(RouteError::RecipientNotFound {
                recipient: to.node(),
            }
            .into());
        }
        let edge = LinkId::new((from.node(), to.node()));
        let Some(link) = self.links.get_mut(&edge) else {
            return Err(RouteError::LinkNotFound { link: edge }.into());
        };

        let packet = Packet::new(
            self.packet_id_generator.generate(),
            from,
            to,
            now,
            payload,
        );
        self.flows.transmitted(&packet, now);

        if link.drops(&mut self.rng) {
            debug!(id = %packet.id(), link = %edge, "lost on the link");
            self.flows.dropped(&packet, DropReason::LinkLoss);
            return Ok(None);
        }

        let direction = LinkDirection::between(from.node(), to.node());
        let Some(arrival) = link.transmit(direction, now, packet.bytes_size()) else {
            self.flows.dropped(&packet, DropReason::QueueFull);
            return Err(SendError::QueueFull {
                link: edge,
                capacity: link.queue_capacity(),
            });
        };

        debug!(id = %packet.id(), %from, %to, %arrival, "in transit");
        Ok(Some(Transit { packet, arrival }))
    }

    /// Hand a packet that reached its recipient node to the socket bound at
    /// its destination port.
    ///
    /// Returns `None` if the packet was dropped: nothing is bound at the
    /// port or the socket's receive buffer is full.
    pub fn deliver(&mut self, now: SimTime, packet: Packet) -> Option<Delivery> {
        let to = packet.to();
        let socket = self
            .nodes
            .get(&to.node())
            .and_then(|node| node.socket_at(to.port()))
            .and_then(|socket| self.sockets.get_mut(&socket));

        let Some(socket) = socket else {
            debug!(id = %packet.id(), %to, "dropped: port unreachable");
            self.flows.dropped(&packet, DropReason::PortUnreachable);
            return None;
        };

        if !socket.can_hold(packet.bytes_size()) {
            debug!(id = %packet.id(), %to, "dropped: receive buffer full");
            self.flows.dropped(&packet, DropReason::ReceiveBufferFull);
            return None;
        }

        self.flows.received(&packet, now);
        socket.push(packet);

        Some(Delivery {
            socket: socket.id(),
            handler: socket.handler(),
        })
    }

    /// per-flow counters accumulated since the network was created
    pub fn flows(&self) -> &FlowMonitor {
        &self.flows
    }

    /// Returns a point-in-time snapshot of the links.
    pub fn stats(&self, now: SimTime) -> NetworkStats {
        let mut links: Vec<_> = self
            .links
            .iter()
            .map(|(id, link)| LinkStats {
                id: *id,
                data_rate: link.data_rate(),
                latency: link.latency(),
                packet_loss: link.packet_loss(),
                queue_capacity: link.queue_capacity(),
                forward_backlog: link.backlog(LinkDirection::Forward, now),
                reverse_backlog: link.backlog(LinkDirection::Reverse, now),
            })
            .collect();
        links.sort_by_key(|stats| stats.id);

        NetworkStats { time: now, links }
    }

    fn socket_mut(&mut self, socket: SocketId) -> Result<&mut Socket, SocketError> {
        self.sockets
            .get_mut(&socket)
            .ok_or(SocketError::SocketNotFound(socket))
    }
}
