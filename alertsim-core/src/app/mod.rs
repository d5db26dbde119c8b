//! Applications running on the nodes of the simulation.
//!
//! An application is anything implementing [`Application`]. The
//! [`Simulation`] owns the applications and calls their hooks when their
//! start or stop time is reached, when one of their timers fires or when a
//! packet reaches one of their sockets.
//!
//! Two applications are provided: the [`Emitter`], which sends a fixed
//! number of packets at a given data rate, and the [`Receiver`], which logs
//! every packet reaching its port.
//!
//! [`Simulation`]: crate::sim::Simulation

mod emitter;
mod receiver;

pub use self::{emitter::Emitter, receiver::Receiver};
use crate::{
    network::{SocketError, SocketId},
    sim::Context,
};
use std::{any::Any, fmt};
use thiserror::Error;

/// Identifier of an application registered with the [`Simulation`].
///
/// [`Simulation`]: crate::sim::Simulation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AppId(usize);

/// Trait for the software running on a node.
///
/// Every hook receives a [`Context`], the application's only way to reach
/// the virtual clock, the scheduler and the network. Hooks run to completion
/// before the next event is dispatched: there is no concurrency between
/// applications.
///
/// # lifecycle
///
/// [`start`] is called once, at the time given to [`Simulation::activate`].
/// [`stop`] is called at the time given to [`Simulation::deactivate`] and,
/// for the applications still running, when [`Simulation::run`] reaches its
/// horizon. An application is not restarted once stopped.
///
/// [`start`]: Application::start
/// [`stop`]: Application::stop
/// [`Simulation::activate`]: crate::sim::Simulation::activate
/// [`Simulation::deactivate`]: crate::sim::Simulation::deactivate
/// [`Simulation::run`]: crate::sim::Simulation::run
pub trait Application: Any {
    /// Called at the activation time.
    ///
    /// An error only fails this application; it is logged and the
    /// simulation carries on.
    fn start(&mut self, ctx: &mut Context<'_>) -> Result<(), StartError>;

    /// Called at the deactivation time. Must be idempotent.
    fn stop(&mut self, ctx: &mut Context<'_>);

    /// Called when a timer set with [`Context::schedule`] fires.
    fn on_timer(&mut self, ctx: &mut Context<'_>) {
        let _ = ctx;
    }

    /// Called when packets are waiting on `socket`, for sockets the
    /// application registered with [`Context::set_receive_handler`].
    fn on_data_available(&mut self, ctx: &mut Context<'_>, socket: SocketId) {
        let _ = (ctx, socket);
    }

    /// `true` between a successful [`start`](Application::start) and the
    /// following [`stop`](Application::stop).
    fn is_running(&self) -> bool;
}

/// Invalid parameters given to an application before it starts.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Packet size must be at least one byte")]
    InvalidPacketSize,
    #[error("Packet budget must be at least one packet")]
    ZeroBudget,
    #[error("Data rate must be greater than 0bps")]
    ZeroRate,
    #[error("{0}")]
    Lifecycle(#[from] LifecycleError),
}

/// An application hook called in the wrong state.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("Application already activated")]
    AlreadyActivated,
    #[error("Application cannot be restarted once stopped")]
    Restarted,
    #[error("Application started before being configured")]
    NotConfigured,
}

/// Error returned by [`Application::start`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StartError {
    #[error("{0}")]
    Lifecycle(#[from] LifecycleError),
    #[error("{0}")]
    Socket(#[from] SocketError),
}

/// where an application is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Phase {
    #[default]
    Idle,
    Running,
    Stopped,
}

impl AppId {
    pub(crate) const fn new(index: usize) -> Self {
        Self(index)
    }

    pub(crate) fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for AppId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "app#{}", self.0)
    }
}

impl Phase {
    /// check the application can move to [`Phase::Running`]
    fn ensure_startable(self) -> Result<(), LifecycleError> {
        match self {
            Self::Idle => Ok(()),
            Self::Running => Err(LifecycleError::AlreadyActivated),
            Self::Stopped => Err(LifecycleError::Restarted),
        }
    }
}
