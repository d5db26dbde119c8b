mod id;

use crate::{
    SimTime,
    defaults::DEFAULT_QUEUE_CAPACITY,
    measure::{DataRate, Latency, PacketLoss},
    node::NodeId,
};
use rand_core::Rng;
use std::{collections::VecDeque, time::Duration};

pub use self::id::LinkId;

/// Which direction a packet is travelling across a link.
///
/// `(a, b)` and `(b, a)` map to the same [`LinkId`], the direction picks
/// the transmitter. `Forward` goes from the smaller to the larger node id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LinkDirection {
    Forward,
    Reverse,
}

impl LinkDirection {
    pub(crate) fn between(from: NodeId, to: NodeId) -> Self {
        if from < to {
            Self::Forward
        } else {
            Self::Reverse
        }
    }
}

/// A full-duplex point-to-point connection between two [`Node`]s.
///
/// Each direction has its own transmitter. A packet handed to the link
/// waits for the packets ahead of it, occupies the transmitter for
/// `size * 8 / data_rate` and arrives at the other end `latency` after its
/// last bit left. A transmitter holds at most `queue_capacity` packets
/// (the one on the wire included), additional packets are refused.
///
/// [`Node`]: crate::node::Node
#[derive(Debug)]
pub struct Link {
    data_rate: DataRate,
    latency: Latency,
    packet_loss: PacketLoss,
    queue_capacity: usize,

    forward: Transmitter,
    reverse: Transmitter,
}

/// the per-direction send queue of a [`Link`]
#[derive(Debug, Default)]
struct Transmitter {
    /// instants at which each accepted packet finishes leaving the
    /// transmitter, oldest first
    backlog: VecDeque<SimTime>,
}

impl Default for Link {
    fn default() -> Self {
        Self::new(
            DataRate::default(),
            Latency::default(),
            PacketLoss::default(),
            DEFAULT_QUEUE_CAPACITY,
        )
    }
}

impl Link {
    pub fn new(
        data_rate: DataRate,
        latency: Latency,
        packet_loss: PacketLoss,
        queue_capacity: usize,
    ) -> Self {
        Self {
            data_rate,
            latency,
            packet_loss,
            queue_capacity,
            forward: Transmitter::default(),
            reverse: Transmitter::default(),
        }
    }

    pub fn data_rate(&self) -> DataRate {
        self.data_rate
    }

    pub fn latency(&self) -> Latency {
        self.latency
    }

    pub fn packet_loss(&self) -> PacketLoss {
        self.packet_loss
    }

    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }

    /// Draw from `rng` whether the link drops the next packet.
    pub(crate) fn drops<R: Rng>(&self, rng: &mut R) -> bool {
        self.packet_loss.drops(rng)
    }

    /// Hand `bytes` to the transmitter of `direction` at `now`.
    ///
    /// Returns the arrival instant at the other end, or `None` if the
    /// transmitter queue is full.
    pub(crate) fn transmit(
        &mut self,
        direction: LinkDirection,
        now: SimTime,
        bytes: u64,
    ) -> Option<SimTime> {
        let duration = self.data_rate.transmission_time(bytes);
        let capacity = self.queue_capacity;
        let latency = self.latency.into_duration();

        let done = self
            .transmitter_mut(direction)
            .enqueue(now, duration, capacity)?;

        Some(done + latency)
    }

    /// packets accepted in `direction` that have not finished leaving the
    /// transmitter at `now`
    pub(crate) fn backlog(&self, direction: LinkDirection, now: SimTime) -> usize {
        let transmitter = match direction {
            LinkDirection::Forward => &self.forward,
            LinkDirection::Reverse => &self.reverse,
        };
        transmitter.backlog.iter().filter(|done| **done > now).count()
    }

    fn transmitter_mut(&mut self, direction: LinkDirection) -> &mut Transmitter {
        match direction {
            LinkDirection::Forward => &mut self.forward,
            LinkDirection::Reverse => &mut self.reverse,
        }
    }
}

impl Transmitter {
    fn enqueue(&mut self, now: SimTime, duration: Duration, capacity: usize) -> Option<SimTime> {
        while self.backlog.front().is_some_and(|done| *done <= now) {
            self.backlog.pop_front();
        }

        if self.backlog.len() >= capacity {
            return None;
        }

        let start = self.backlog.back().map_or(now, |busy| (*busy).max(now));
        let done = start + duration;
        self.backlog.push_back(done);

        Some(done)
    }
}
