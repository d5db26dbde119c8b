//! Network statistics and observability types.
//!
//! [`FlowMonitor`] accumulates per-flow counters while the simulation runs,
//! obtain it via [`Network::flows`]. [`NetworkStats`] provides a
//! point-in-time snapshot of the links, obtain one via [`Network::stats`].
//!
//! [`Network::flows`]: crate::network::Network::flows
//! [`Network::stats`]: crate::network::Network::stats

use crate::{
    SimTime,
    link::LinkId,
    measure::{DataRate, Latency, PacketLoss},
    network::{Address, Packet},
};
use std::{collections::BTreeMap, fmt, time::Duration};

/// Snapshot of statistics for a single link.
#[derive(Debug, Clone)]
pub struct LinkStats {
    /// The link identifier (ordered pair of node IDs).
    pub id: LinkId,
    /// Configured data rate of this link (applies to both directions independently).
    pub data_rate: DataRate,
    /// Configured latency of this link.
    pub latency: Latency,
    /// Configured packet loss model for this link.
    pub packet_loss: PacketLoss,
    /// Maximum number of packets a transmitter holds.
    pub queue_capacity: usize,
    /// Packets not yet fully transmitted from the smaller to the larger node id.
    pub forward_backlog: usize,
    /// Packets not yet fully transmitted from the larger to the smaller node id.
    pub reverse_backlog: usize,
}

/// Point-in-time snapshot of the entire network state.
#[derive(Debug, Clone)]
pub struct NetworkStats {
    /// the virtual time of the snapshot
    pub time: SimTime,
    /// Per-link statistics.
    pub links: Vec<LinkStats>,
}

/// The packets exchanged from one [`Address`] to another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FlowId {
    pub source: Address,
    pub destination: Address,
}

/// Why the network dropped a packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DropReason {
    /// drawn by the link's [`PacketLoss`] model
    LinkLoss,
    /// the link transmitter already held its capacity
    QueueFull,
    /// nothing bound at the destination port
    PortUnreachable,
    /// the receiving socket's buffer could not hold the packet
    ReceiveBufferFull,
}

/// Dropped packets of a flow, by [`DropReason`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Drops {
    pub link_loss: u64,
    pub queue_full: u64,
    pub port_unreachable: u64,
    pub receive_buffer_full: u64,
}

/// Counters of a single flow.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlowStats {
    pub tx_packets: u64,
    pub tx_bytes: u64,
    pub rx_packets: u64,
    pub rx_bytes: u64,
    /// packets dropped anywhere between the sender and the receiving socket
    pub drops: Drops,
    pub first_tx: Option<SimTime>,
    pub last_tx: Option<SimTime>,
    pub first_rx: Option<SimTime>,
    pub last_rx: Option<SimTime>,
    /// sum of the one-way delays of the received packets
    pub delay_sum: Duration,
}

/// Per-flow statistics collected by the [`Network`].
///
/// [`Network`]: crate::network::Network
#[derive(Debug, Default)]
pub struct FlowMonitor {
    flows: BTreeMap<FlowId, FlowStats>,
}

impl FlowId {
    pub fn of(packet: &Packet) -> Self {
        Self {
            source: packet.from(),
            destination: packet.to(),
        }
    }
}

impl fmt::Display for FlowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.source, self.destination)
    }
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LinkLoss => f.write_str("link loss"),
            Self::QueueFull => f.write_str("queue full"),
            Self::PortUnreachable => f.write_str("port unreachable"),
            Self::ReceiveBufferFull => f.write_str("receive buffer full"),
        }
    }
}

impl Drops {
    pub fn get(&self, reason: DropReason) -> u64 {
        match reason {
            DropReason::LinkLoss => self.link_loss,
            DropReason::QueueFull => self.queue_full,
            DropReason::PortUnreachable => self.port_unreachable,
            DropReason::ReceiveBufferFull => self.receive_buffer_full,
        }
    }

    pub fn total(&self) -> u64 {
        self.link_loss + self.queue_full + self.port_unreachable + self.receive_buffer_full
    }

    fn count(&mut self, reason: DropReason) {
        let counter = match reason {
            DropReason::LinkLoss => &mut self.link_loss,
            DropReason::QueueFull => &mut self.queue_full,
            DropReason::PortUnreachable => &mut self.port_unreachable,
            DropReason::ReceiveBufferFull => &mut self.receive_buffer_full,
        };
        *counter += 1;
    }
}

/// Lists the non-zero counters, `"none"` if nothing was dropped.
impl fmt::Display for Drops {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reasons = [
            DropReason::LinkLoss,
            DropReason::QueueFull,
            DropReason::PortUnreachable,
            DropReason::ReceiveBufferFull,
        ];
        let mut first = true;
        for reason in reasons {
            let count = self.get(reason);
            if count == 0 {
                continue;
            }
            if !first {
                f.write_str(", ")?;
            }
            write!(f, "{reason} {count}")?;
            first = false;
        }
        if first {
            f.write_str("none")?;
        }
        Ok(())
    }
}

impl FlowStats {
    /// packets dropped for any reason
    pub fn lost_packets(&self) -> u64 {
        self.drops.total()
    }

    /// average one-way delay of the received packets
    pub fn mean_delay(&self) -> Option<Duration> {
        let count = u32::try_from(self.rx_packets).ok().filter(|c| *c > 0)?;
        Some(self.delay_sum / count)
    }

    /// received bits over the time between the first transmission and the
    /// last reception
    pub fn throughput(&self) -> Option<DataRate> {
        let window = self
            .last_rx?
            .saturating_duration_since(self.first_tx?)
            .as_nanos();
        if window == 0 {
            return None;
        }
        let bps = u128::from(self.rx_bytes) * 8 * 1_000_000_000 / window;
        Some(DataRate::new(u64::try_from(bps).unwrap_or(u64::MAX)))
    }
}

impl FlowMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, flow: &FlowId) -> Option<&FlowStats> {
        self.flows.get(flow)
    }

    /// every flow seen so far, ordered by source then destination
    pub fn iter(&self) -> impl Iterator<Item = (&FlowId, &FlowStats)> {
        self.flows.iter()
    }

    pub fn len(&self) -> usize {
        self.flows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flows.is_empty()
    }

    pub(crate) fn transmitted(&mut self, packet: &Packet, now: SimTime) {
        let stats = self.flows.entry(FlowId::of(packet)).or_default();
        stats.tx_packets += 1;
        stats.tx_bytes += packet.bytes_size();
        stats.first_tx.get_or_insert(now);
        stats.last_tx = Some(now);
    }

    pub(crate) fn dropped(&mut self, packet: &Packet, reason: DropReason) {
        let stats = self.flows.entry(FlowId::of(packet)).or_default();
        stats.drops.count(reason);
    }

    pub(crate) fn received(&mut self, packet: &Packet, now: SimTime) {
        let stats = self.flows.entry(FlowId::of(packet)).or_default();
        stats.rx_packets += 1;
        stats.rx_bytes += packet.bytes_size();
        stats.first_rx.get_or_insert(now);
        stats.last_rx = Some(now);
        stats.delay_sum += now.saturating_duration_since(packet.sent_at());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{network::PacketIdGenerator, node::NodeId};

    fn packet(generator: &mut PacketIdGenerator, sent_at: SimTime, size: usize) -> Packet {
        Packet::new(
            generator.generate(),
            Address::new(NodeId::new(2), 49_153),
            Address::new(NodeId::ONE, 9_000),
            sent_at,
            vec![0; size].into_boxed_slice(),
        )
    }

    #[test]
    fn counters() {
        let mut generator = PacketIdGenerator::new();
        let mut monitor = FlowMonitor::new();

        let first = packet(&mut generator, SimTime::from_secs(2), 1_000);
        let second = packet(&mut generator, SimTime::from_secs(3), 1_000);
        let flow = FlowId::of(&first);

        monitor.transmitted(&first, first.sent_at());
        monitor.transmitted(&second, second.sent_at());
        monitor.received(&first, SimTime::from_millis(2_010));
        monitor.dropped(&second, DropReason::QueueFull);

        let stats = monitor.get(&flow).unwrap();
        assert_eq!(monitor.len(), 1);
        assert_eq!(stats.tx_packets, 2);
        assert_eq!(stats.tx_bytes, 2_000);
        assert_eq!(stats.rx_packets, 1);
        assert_eq!(stats.lost_packets(), 1);
        assert_eq!(stats.drops.get(DropReason::QueueFull), 1);
        assert_eq!(stats.first_tx, Some(SimTime::from_secs(2)));
        assert_eq!(stats.last_tx, Some(SimTime::from_secs(3)));
        assert_eq!(stats.mean_delay(), Some(Duration::from_millis(10)));
    }

    #[test]
    fn throughput() {
        let stats = FlowStats {
            rx_packets: 1,
            rx_bytes: 1_250,
            first_tx: Some(SimTime::ZERO),
            last_rx: Some(SimTime::from_millis(1)),
            ..FlowStats::default()
        };

        // 10_000 bits in 1ms
        assert_eq!(stats.throughput(), Some(DataRate::from_mbps(10)));
    }

    #[test]
    fn nothing_received() {
        let stats = FlowStats::default();

        assert!(stats.mean_delay().is_none());
        assert!(stats.throughput().is_none());
    }

    #[test]
    fn drops_display() {
        assert_eq!(Drops::default().to_string(), "none");

        let drops = Drops {
            link_loss: 3,
            receive_buffer_full: 1,
            ..Drops::default()
        };
        assert_eq!(drops.total(), 4);
        assert_eq!(drops.to_string(), "link loss 3, receive buffer full 1");
    }

    #[test]
    fn flow_display() {
        let flow = FlowId {
            source: Address::new(NodeId::new(2), 49_153),
            destination: Address::new(NodeId::ONE, 9_000),
        };
        assert_eq!(flow.to_string(), "2:49153 -> 1:9000");
    }
}
