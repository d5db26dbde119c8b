use super::{Application, Phase, StartError};
use crate::{network::SocketId, sim::Context, trace::Role};
use tracing::{info, warn};

const DEFAULT_LABEL: &str = "Received";

/// Listens on a port and logs every packet reaching it.
///
/// Every packet is read as soon as it arrives, recorded in the simulation
/// trace with its size and sender, and logged as
/// `"{label} at {time} | Size={bytes}"`. A notification drains everything
/// queued on the socket, not only the packet that raised it.
#[derive(Debug)]
pub struct Receiver {
    socket: SocketId,
    port: u16,
    label: String,

    phase: Phase,

    received: u64,
    received_bytes: u64,
}

impl Receiver {
    /// a receiver that binds `socket` to `port` when it starts
    pub fn new(socket: SocketId, port: u16) -> Self {
        Self {
            socket,
            port,
            label: DEFAULT_LABEL.to_owned(),
            phase: Phase::Idle,
            received: 0,
            received_bytes: 0,
        }
    }

    /// the beginning of the log line, e.g. `"Cloud received report"`
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// number of packets received
    pub fn received(&self) -> u64 {
        self.received
    }

    pub fn received_bytes(&self) -> u64 {
        self.received_bytes
    }
}

impl Application for Receiver {
    fn start(&mut self, ctx: &mut Context<'_>) -> Result<(), StartError> {
        self.phase.ensure_startable()?;

        ctx.bind(self.socket, self.port)?;
        ctx.set_receive_handler(self.socket)?;

        self.phase = Phase::Running;
        Ok(())
    }

    fn stop(&mut self, ctx: &mut Context<'_>) {
        if self.phase != Phase::Running {
            return;
        }
        self.phase = Phase::Stopped;

        if let Err(error) = ctx.close(self.socket) {
            warn!(app = %ctx.app(), %error, "failed to close the socket");
        }
    }

    fn on_data_available(&mut self, ctx: &mut Context<'_>, socket: SocketId) {
        loop {
            let packet = match ctx.recv(socket) {
                Ok(Some(packet)) => packet,
                Ok(None) => break,
                Err(error) => {
                    warn!(app = %ctx.app(), %error, "failed to read the socket");
                    break;
                }
            };

            let size = packet.bytes_size();
            self.received += 1;
            self.received_bytes += size;
            ctx.record(Role::Receive, size, packet.from());
            info!("{} at {} | Size={}", self.label, ctx.now(), size);
        }
    }

    fn is_running(&self) -> bool {
        self.phase == Phase::Running
    }
}
