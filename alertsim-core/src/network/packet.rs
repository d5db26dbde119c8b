use super::Address;
use crate::SimTime;
use std::fmt;

/// a generator for monotonicaly increasing **unique** [`PacketId`]
///
/// Starts at `1`, the `0` identifier is never handed out.
#[derive(Debug)]
pub struct PacketIdGenerator(u64);

/// # [`Packet`] Identifier
///
/// During the lifetime of the packet, this identifier can uniquely
/// identify the packet.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PacketId(u64);

/// # A datagram in flight
///
/// A [`Packet`] is an opaque payload with the sender and recipient
/// [`Address`]es and the virtual time at which it was handed to the
/// network.
///
pub struct Packet {
    id: PacketId,
    from: Address,
    to: Address,
    sent_at: SimTime,
    payload: Box<[u8]>,
}

impl PacketIdGenerator {
    pub fn new() -> Self {
        Self(1)
    }

    /// generate a new unique identifier
    pub fn generate(&mut self) -> PacketId {
        let id = self.0;
        self.0 = self.0.wrapping_add(1);

        debug_assert!(
            id != 0,
            "The only case this can be equal to 0 is if the generator overflowed. If this \
            happens it means we have generated `u64::MAX` unique packet identifier and we \
            wrapped around on overflow. This shouldn't happen!"
        );

        PacketId(id)
    }
}

impl Default for PacketIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl Packet {
    pub(crate) fn new(
        id: PacketId,
        from: Address,
        to: Address,
        sent_at: SimTime,
        payload: Box<[u8]>,
    ) -> Self {
        Self {
            id,
            from,
            to,
            sent_at,
            payload,
        }
    }

    pub fn id(&self) -> PacketId {
        self.id
    }

    pub fn from(&self) -> Address {
        self.from
    }

    pub fn to(&self) -> Address {
        self.to
    }

    /// virtual time at which the sender handed the packet to the network
    pub fn sent_at(&self) -> SimTime {
        self.sent_at
    }

    /// size of the payload in bytes
    pub fn bytes_size(&self) -> u64 {
        self.payload.len() as u64
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// consume the packet and get the payload
    pub fn into_payload(self) -> Box<[u8]> {
        self.payload
    }
}

impl fmt::Debug for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Packet")
            .field("id", &self.id)
            .field("from", &self.from)
            .field("to", &self.to)
            .field("sent_at", &self.sent_at)
            .field("bytes_size", &self.bytes_size())
            .finish_non_exhaustive()
    }
}

impl fmt::Display for PacketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:016x}", self.0)
    }
}
