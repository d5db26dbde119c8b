use super::{Application, ConfigError, LifecycleError, Phase, StartError};
use crate::{
    measure::DataRate,
    network::{Address, SocketId},
    scheduler::EventId,
    sim::Context,
    trace::Role,
};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Sends `packet_budget` packets of `packet_size` bytes to a destination,
/// paced at a constant [`DataRate`].
///
/// The first packet leaves as soon as the emitter starts. Every send is
/// followed by a timer of `packet_size * 8 / rate` after which the next
/// packet leaves, until the budget is spent or the emitter is stopped.
/// Stopping cancels the pending timer, a packet is never sent after the
/// emitter stopped.
///
/// ```
/// use alertsim_core::{
///     Address, DataRate, Emitter, Network, Receiver, SimTime, Simulation,
/// };
///
/// let mut network = Network::new();
/// let station = network.new_node().build();
/// let cloud = network.new_node().build();
/// network.configure_link(station, cloud).apply();
/// let tx = network.open_socket(station).unwrap();
/// let rx = network.open_socket(cloud).unwrap();
///
/// let mut emitter = Emitter::new();
/// emitter
///     .configure(tx, Address::new(cloud, 9000), 5_120, 1, DataRate::from_mbps(10))
///     .unwrap();
///
/// let mut sim = Simulation::new(network);
/// let emitter = sim.add_application(station, emitter).unwrap();
/// let receiver = sim.add_application(cloud, Receiver::new(rx, 9000)).unwrap();
/// sim.activate(receiver, SimTime::ZERO).unwrap();
/// sim.activate(emitter, SimTime::from_secs(2)).unwrap();
/// sim.run(SimTime::from_secs(20));
///
/// assert_eq!(sim.application::<Emitter>(emitter).unwrap().packets_sent(), 1);
/// assert_eq!(sim.application::<Receiver>(receiver).unwrap().received(), 1);
/// ```
#[derive(Debug, Default)]
pub struct Emitter {
    config: Option<Config>,

    phase: Phase,

    packets_sent: u32,

    /// the timer of the next send, if any
    pending: Option<EventId>,
}

#[derive(Debug, Clone, Copy)]
struct Config {
    socket: SocketId,
    destination: Address,
    packet_size: u32,
    packet_budget: u32,
    rate: DataRate,
}

impl Emitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the socket to send from and what to send.
    ///
    /// The socket must have been opened on the node the emitter is added
    /// to. It is bound to an ephemeral port and connected to `destination`
    /// when the emitter starts, and closed when it stops.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::InvalidPacketSize`] if `packet_size` is `0`;
    /// - [`ConfigError::ZeroBudget`] if `packet_budget` is `0`;
    /// - [`ConfigError::ZeroRate`] if `rate` is zero;
    /// - [`LifecycleError::AlreadyActivated`] if the emitter has already
    ///   been started.
    pub fn configure(
        &mut self,
        socket: SocketId,
        destination: Address,
        packet_size: u32,
        packet_budget: u32,
        rate: DataRate,
    ) -> Result<(), ConfigError> {
        if self.phase != Phase::Idle {
            return Err(LifecycleError::AlreadyActivated.into());
        }
        if packet_size == 0 {
            return Err(ConfigError::InvalidPacketSize);
        }
        if packet_budget == 0 {
            return Err(ConfigError::ZeroBudget);
        }
        if rate.is_zero() {
            return Err(ConfigError::ZeroRate);
        }

        self.config = Some(Config {
            socket,
            destination,
            packet_size,
            packet_budget,
            rate,
        });
        Ok(())
    }

    pub fn packets_sent(&self) -> u32 {
        self.packets_sent
    }

    pub fn packet_budget(&self) -> Option<u32> {
        self.config.map(|config| config.packet_budget)
    }

    /// the timer of the next send, `None` once the budget is spent or the
    /// emitter stopped
    pub fn pending_event(&self) -> Option<EventId> {
        self.pending
    }

    /// the delay between two sends
    pub fn next_delay(&self) -> Option<Duration> {
        self.config.map(|config| config.next_delay())
    }

    fn send_packet(&mut self, ctx: &mut Context<'_>, config: Config) {
        let payload = vec![0u8; config.packet_size as usize].into_boxed_slice();
        if let Err(error) = ctx.send(config.socket, payload) {
            warn!(app = %ctx.app(), %error, "send refused");
        }

        self.packets_sent += 1;
        ctx.record(Role::Send, u64::from(config.packet_size), config.destination);
        info!(
            "Packet sent at {} | Size={} bytes",
            ctx.now(),
            config.packet_size
        );

        if self.packets_sent < config.packet_budget {
            let delay = config.next_delay();
            self.pending = Some(ctx.schedule(delay));
            debug!(app = %ctx.app(), ?delay, "next send scheduled");
        } else {
            self.pending = None;
        }
    }
}

impl Config {
    fn next_delay(&self) -> Duration {
        self.rate.transmission_time(u64::from(self.packet_size))
    }
}

impl Application for Emitter {
    fn start(&mut self, ctx: &mut Context<'_>) -> Result<(), StartError> {
        self.phase.ensure_startable()?;
        let config = self.config.ok_or(LifecycleError::NotConfigured)?;

        ctx.bind(config.socket, 0)?;
        ctx.connect(config.socket, config.destination)?;

        self.phase = Phase::Running;
        self.packets_sent = 0;
        self.send_packet(ctx, config);
        Ok(())
    }

    fn stop(&mut self, ctx: &mut Context<'_>) {
        if self.phase != Phase::Running {
            return;
        }
        self.phase = Phase::Stopped;

        if let Some(event) = self.pending.take() {
            ctx.cancel(event);
        }
        if let Some(config) = self.config
            && let Err(error) = ctx.close(config.socket)
        {
            warn!(app = %ctx.app(), %error, "failed to close the socket");
        }
    }

    fn on_timer(&mut self, ctx: &mut Context<'_>) {
        self.pending = None;
        if let (Phase::Running, Some(config)) = (self.phase, self.config) {
            self.send_packet(ctx, config);
        }
    }

    fn is_running(&self) -> bool {
        self.phase == Phase::Running
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        SimTime,
        app::{AppId, Receiver},
        network::Network,
        node::NodeId,
        sim::Simulation,
    };

    const ALERT_PORT: u16 = 9_001;

    struct Setup {
        sim: Simulation,
        emitter: AppId,
        receiver: AppId,
    }

    /// an emitter on node 1 sending to a receiver on node 2
    fn setup(packet_size: u32, packet_budget: u32, rate: DataRate) -> Setup {
        let mut network = Network::new();
        let a = network.new_node().build();
        let b = network.new_node().build();
        network.configure_link(a, b).apply();
        let tx = network.open_socket(a).unwrap();
        let rx = network.open_socket(b).unwrap();

        let mut emitter = Emitter::new();
        emitter
            .configure(
                tx,
                Address::new(b, ALERT_PORT),
                packet_size,
                packet_budget,
                rate,
            )
            .unwrap();

        let mut sim = Simulation::new(network);
        let emitter = sim.add_application(a, emitter).unwrap();
        let receiver = sim
            .add_application(b, Receiver::new(rx, ALERT_PORT))
            .unwrap();
        sim.activate(receiver, SimTime::ZERO).unwrap();

        Setup {
            sim,
            emitter,
            receiver,
        }
    }

    fn send_times(setup: &Setup) -> Vec<SimTime> {
        setup
            .sim
            .trace()
            .of(setup.emitter)
            .filter(|record| record.role == Role::Send)
            .map(|record| record.time)
            .collect()
    }

    fn emitter(setup: &Setup) -> &Emitter {
        setup.sim.application::<Emitter>(setup.emitter).unwrap()
    }

    #[test]
    fn single_packet_report() {
        let mut setup = setup(5_120, 1, DataRate::from_mbps(10));
        let start = SimTime::from_secs(2);
        setup.sim.activate(setup.emitter, start).unwrap();

        setup.sim.advance(SimTime::from_secs(3));

        assert_eq!(send_times(&setup), [start]);
        assert_eq!(emitter(&setup).packets_sent(), 1);
        assert!(emitter(&setup).pending_event().is_none());
        assert!(emitter(&setup).is_running());
    }

    #[test]
    fn sends_are_paced_by_the_rate() {
        let mut setup = setup(2_048, 3, DataRate::from_mbps(50));
        let start = SimTime::from_millis(2_100);
        let d = Duration::from_nanos(327_680);
        setup.sim.activate(setup.emitter, start).unwrap();

        setup.sim.advance(SimTime::from_secs(3));

        assert_eq!(send_times(&setup), [start, start + d, start + 2 * d]);
        assert_eq!(emitter(&setup).next_delay(), Some(d));
        assert!(emitter(&setup).pending_event().is_none());
    }

    #[test]
    fn stop_cancels_the_next_send() {
        let mut setup = setup(2_048, 3, DataRate::from_mbps(50));
        let start = SimTime::from_millis(2_100);
        let d = Duration::from_nanos(327_680);
        setup.sim.activate(setup.emitter, start).unwrap();
        setup
            .sim
            .deactivate(setup.emitter, start + d + d / 2)
            .unwrap();

        setup.sim.advance(SimTime::from_secs(3));

        assert_eq!(send_times(&setup), [start, start + d]);
        assert_eq!(emitter(&setup).packets_sent(), 2);
        assert!(emitter(&setup).pending_event().is_none());
        assert!(!emitter(&setup).is_running());
        assert_eq!(setup.sim.pending_events(), 0);
    }

    #[test]
    fn stop_after_the_budget_is_spent() {
        let mut setup = setup(2_048, 3, DataRate::from_mbps(50));
        let start = SimTime::from_millis(2_100);
        let d = Duration::from_nanos(327_680);
        setup.sim.activate(setup.emitter, start).unwrap();
        // the third send, at start + 2d, happens before the stop
        setup
            .sim
            .deactivate(setup.emitter, start + d + Duration::from_millis(1))
            .unwrap();

        setup.sim.advance(SimTime::from_secs(3));

        assert_eq!(send_times(&setup), [start, start + d, start + 2 * d]);
        assert!(!emitter(&setup).is_running());
    }

    #[test]
    fn stop_is_idempotent() {
        let mut setup = setup(2_048, 1, DataRate::from_mbps(50));
        setup.sim.activate(setup.emitter, SimTime::from_secs(1)).unwrap();
        setup.sim.deactivate(setup.emitter, SimTime::from_secs(2)).unwrap();
        setup.sim.deactivate(setup.emitter, SimTime::from_secs(3)).unwrap();

        setup.sim.run(SimTime::from_secs(4));

        assert_eq!(emitter(&setup).packets_sent(), 1);
        assert!(!emitter(&setup).is_running());
    }

    #[test]
    fn restart_is_rejected() {
        let mut setup = setup(2_048, 1, DataRate::from_mbps(50));
        setup.sim.activate(setup.emitter, SimTime::from_secs(1)).unwrap();
        setup.sim.deactivate(setup.emitter, SimTime::from_secs(2)).unwrap();
        setup.sim.activate(setup.emitter, SimTime::from_secs(3)).unwrap();

        setup.sim.advance(SimTime::from_secs(4));

        assert_eq!(send_times(&setup), [SimTime::from_secs(1)]);
        assert!(!emitter(&setup).is_running());
    }

    #[test]
    fn second_activation_does_not_reset_the_count() {
        let mut setup = setup(2_048, 2, DataRate::from_mbps(50));
        setup.sim.activate(setup.emitter, SimTime::from_secs(1)).unwrap();
        setup.sim.activate(setup.emitter, SimTime::from_secs(2)).unwrap();

        setup.sim.advance(SimTime::from_secs(3));

        assert_eq!(emitter(&setup).packets_sent(), 2);
        assert_eq!(send_times(&setup).len(), 2);
    }

    #[test]
    fn receiver_gets_every_packet() {
        let mut setup = setup(2_048, 3, DataRate::from_mbps(50));
        setup.sim.activate(setup.emitter, SimTime::from_secs(2)).unwrap();

        setup.sim.run(SimTime::from_secs(3));

        let receiver = setup.sim.application::<Receiver>(setup.receiver).unwrap();
        assert_eq!(receiver.received(), 3);
        assert_eq!(receiver.received_bytes(), 3 * 2_048);

        let arrivals: Vec<_> = setup
            .sim
            .trace()
            .of(setup.receiver)
            .map(|record| (record.time, record.bytes))
            .collect();
        assert_eq!(arrivals.len(), 3);
        assert!(arrivals.windows(2).all(|w| w[0].0 <= w[1].0));
        assert!(arrivals.iter().all(|(_, bytes)| *bytes == 2_048));

        // 100Mbps link with 5ms latency
        assert_eq!(
            arrivals[0].0,
            SimTime::from_secs(2) + Duration::from_nanos(163_840) + Duration::from_millis(5)
        );
    }

    #[test]
    fn refused_sends_keep_the_schedule() {
        let mut network = Network::new();
        let a = network.new_node().build();
        let b = network.new_node().build();
        // no link between a and b
        let tx = network.open_socket(a).unwrap();

        let mut emitter = Emitter::new();
        emitter
            .configure(tx, Address::new(b, ALERT_PORT), 100, 3, DataRate::from_mbps(1))
            .unwrap();
        let mut sim = Simulation::new(network);
        let id = sim.add_application(a, emitter).unwrap();
        sim.activate(id, SimTime::ZERO).unwrap();

        sim.run(SimTime::from_secs(1));

        assert_eq!(sim.application::<Emitter>(id).unwrap().packets_sent(), 3);
        assert_eq!(sim.trace().sends().count(), 3);
        assert_eq!(sim.trace().receives().count(), 0);
    }

    #[test]
    fn start_without_configuration() {
        let mut sim = Simulation::new(Network::new());
        let node = sim.network_mut().new_node().build();
        let id = sim.add_application(node, Emitter::new()).unwrap();
        sim.activate(id, SimTime::ZERO).unwrap();

        sim.run(SimTime::from_secs(1));

        assert!(!sim.application::<Emitter>(id).unwrap().is_running());
        assert!(sim.trace().is_empty());
    }

    #[test]
    fn invalid_configuration() {
        let socket = SocketId::new(1);
        let to = Address::new(NodeId::ONE, ALERT_PORT);
        let rate = DataRate::from_mbps(1);
        let mut emitter = Emitter::new();

        assert_eq!(
            emitter.configure(socket, to, 0, 1, rate),
            Err(ConfigError::InvalidPacketSize)
        );
        assert_eq!(
            emitter.configure(socket, to, 1, 0, rate),
            Err(ConfigError::ZeroBudget)
        );
        assert_eq!(
            emitter.configure(socket, to, 1, 1, DataRate::ZERO),
            Err(ConfigError::ZeroRate)
        );
        assert!(emitter.packet_budget().is_none());
    }

    #[test]
    fn configure_after_activation() {
        let mut setup = setup(2_048, 1, DataRate::from_mbps(50));
        setup.sim.activate(setup.emitter, SimTime::ZERO).unwrap();
        setup.sim.advance(SimTime::from_secs(1));

        let emitter = setup
            .sim
            .application_mut::<Emitter>(setup.emitter)
            .unwrap();
        let err = emitter
            .configure(
                SocketId::new(1),
                Address::new(NodeId::ONE, ALERT_PORT),
                10,
                10,
                DataRate::from_mbps(1),
            )
            .unwrap_err();

        assert_eq!(err, ConfigError::Lifecycle(LifecycleError::AlreadyActivated));
        assert_eq!(emitter.packet_budget(), Some(1));
    }
}
