use crate::measure::{DataRate, Latency};
use std::time::Duration;

/// Default [`Latency`] of a [`Link`].
///
/// ```
/// # use alertsim_core::defaults::*;
/// assert_eq!(
///     DEFAULT_LATENCY.to_string(),
///     "5ms"
/// );
/// ```
///
/// [`Link`]: crate::link::Link
pub const DEFAULT_LATENCY: Latency = Latency::new(Duration::from_millis(5));

/// Default [`DataRate`] of a [`Link`].
///
/// ```
/// # use alertsim_core::defaults::*;
/// assert_eq!(
///     DEFAULT_DATA_RATE.to_string(),
///     "100Mbps"
/// );
/// ```
///
/// [`Link`]: crate::link::Link
pub const DEFAULT_DATA_RATE: DataRate = DataRate::from_mbps(100);

/// Default number of packets a link transmitter holds (the one being sent
/// included) before dropping new ones.
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// Default receive buffer of a socket, in bytes.
///
/// Packets arriving at a socket whose buffer cannot hold them are dropped.
pub const DEFAULT_RECEIVE_BUFFER: u64 = 128 * 1_024;

/// First port handed out when a socket binds to port `0`.
pub const EPHEMERAL_PORT_START: u16 = 49_153;
