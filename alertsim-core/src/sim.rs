/*!
# Simulation host

The [`Simulation`] owns the [`Scheduler`], the [`Network`] and the
applications. It turns scheduler events into application hooks:

* the start and stop events set with [`Simulation::activate`] and
  [`Simulation::deactivate`];
* the timers applications set with [`Context::schedule`];
* the delivery of packets, which are queued on the destination socket
  before the socket's application is told data is available.

Applications only see the world through the [`Context`] they are handed
in every hook. There is no global state: the simulation lends its
scheduler, its network and its trace for the duration of the hook.
*/

use crate::{
    SimTime,
    app::{AppId, Application},
    network::{Address, Delivery, Network, Packet, SendError, SocketError, SocketId, Transit},
    node::NodeId,
    scheduler::{EventId, ScheduleError, Scheduler},
    stats::FlowMonitor,
    trace::{Role, Trace, TraceRecord},
};
use std::{any::Any, time::Duration};
use thiserror::Error;
use tracing::{debug, warn};

pub(crate) enum Event {
    Start(AppId),
    Stop(AppId),
    Timer(AppId),
    Deliver(Packet),
}

pub struct Simulation {
    scheduler: Scheduler<Event>,
    network: Network,
    trace: Trace,
    apps: Vec<Slot>,
}

/// What an application can reach while one of its hooks runs.
pub struct Context<'a> {
    app: AppId,
    node: NodeId,
    scheduler: &'a mut Scheduler<Event>,
    network: &'a mut Network,
    trace: &'a mut Trace,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SimError {
    #[error("Application ({0}) Not Found")]
    UnknownApplication(AppId),
    #[error("Node ({0}) Not Found")]
    UnknownNode(NodeId),
    #[error("{0}")]
    Schedule(#[from] ScheduleError),
}

struct Slot {
    node: NodeId,
    app: Box<dyn Application>,
}

enum Hook {
    Start,
    Stop,
    Timer,
    DataAvailable(SocketId),
}

impl Simulation {
    pub fn new(network: Network) -> Self {
        Self {
            scheduler: Scheduler::new(),
            network,
            trace: Trace::new(),
            apps: Vec::new(),
        }
    }

    /// current virtual time
    pub fn now(&self) -> SimTime {
        self.scheduler.now()
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    pub fn network_mut(&mut self) -> &mut Network {
        &mut self.network
    }

    /// number of events still due to fire
    pub fn pending_events(&self) -> usize {
        self.scheduler.len()
    }

    /// Install `app` on `node`. It stays idle until [`activate`]d.
    ///
    /// [`activate`]: Simulation::activate
    pub fn add_application<A>(&mut self, node: NodeId, app: A) -> Result<AppId, SimError>
    where
        A: Application,
    {
        if self.network.node(node).is_none() {
            return Err(SimError::UnknownNode(node));
        }

        let id = AppId::new(self.apps.len());
        self.apps.push(Slot {
            node,
            app: Box::new(app),
        });
        Ok(id)
    }

    /// the node the application runs on
    pub fn node_of(&self, id: AppId) -> Option<NodeId> {
        self.apps.get(id.index()).map(|slot| slot.node)
    }

    /// Start the application at the virtual instant `at`.
    pub fn activate(&mut self, id: AppId, at: SimTime) -> Result<EventId, SimError> {
        self.ensure_exists(id)?;
        Ok(self.scheduler.schedule_at(at, Event::Start(id))?)
    }

    /// Stop the application at the virtual instant `at`.
    pub fn deactivate(&mut self, id: AppId, at: SimTime) -> Result<EventId, SimError> {
        self.ensure_exists(id)?;
        Ok(self.scheduler.schedule_at(at, Event::Stop(id))?)
    }

    /// Dispatch every event due up to and including `until`, then move the
    /// clock to `until`. Applications keep running.
    pub fn advance(&mut self, until: SimTime) {
        self.scheduler.run(until, |scheduler, event| {
            dispatch(
                scheduler,
                &mut self.network,
                &mut self.trace,
                &mut self.apps,
                event,
            )
        });
    }

    /// [`advance`] to `until`, then stop every application still running.
    ///
    /// [`advance`]: Simulation::advance
    pub fn run(&mut self, until: SimTime) {
        self.advance(until);

        for (index, slot) in self.apps.iter_mut().enumerate() {
            if !slot.app.is_running() {
                continue;
            }
            let mut ctx = Context {
                app: AppId::new(index),
                node: slot.node,
                scheduler: &mut self.scheduler,
                network: &mut self.network,
                trace: &mut self.trace,
            };
            slot.app.stop(&mut ctx);
        }
    }

    /// the application `id`, if it is an `A`
    pub fn application<A: Application>(&self, id: AppId) -> Option<&A> {
        let app: &dyn Any = &*self.apps.get(id.index())?.app;
        app.downcast_ref()
    }

    pub fn application_mut<A: Application>(&mut self, id: AppId) -> Option<&mut A> {
        let app: &mut dyn Any = &mut *self.apps.get_mut(id.index())?.app;
        app.downcast_mut()
    }

    pub fn trace(&self) -> &Trace {
        &self.trace
    }

    pub fn flow_stats(&self) -> &FlowMonitor {
        self.network.flows()
    }

    fn ensure_exists(&self, id: AppId) -> Result<(), SimError> {
        if id.index() < self.apps.len() {
            Ok(())
        } else {
            Err(SimError::UnknownApplication(id))
        }
    }
}

fn dispatch(
    scheduler: &mut Scheduler<Event>,
    network: &mut Network,
    trace: &mut Trace,
    apps: &mut [Slot],
    event: Event,
) {
    let (id, hook) = match event {
        Event::Start(id) => (id, Hook::Start),
        Event::Stop(id) => (id, Hook::Stop),
        Event::Timer(id) => (id, Hook::Timer),
        Event::Deliver(packet) => match network.deliver(scheduler.now(), packet) {
            Some(Delivery {
                socket,
                handler: Some(id),
            }) => (id, Hook::DataAvailable(socket)),
            _ => return,
        },
    };

    let Some(slot) = apps.get_mut(id.index()) else {
        warn!(app = %id, "event for an unknown application");
        return;
    };
    let mut ctx = Context {
        app: id,
        node: slot.node,
        scheduler,
        network,
        trace,
    };

    match hook {
        Hook::Start => {
            debug!(app = %id, node = %slot.node, "start");
            if let Err(error) = slot.app.start(&mut ctx) {
                warn!(app = %id, %error, "failed to start");
            }
        }
        Hook::Stop => {
            debug!(app = %id, node = %slot.node, "stop");
            slot.app.stop(&mut ctx);
        }
        Hook::Timer => slot.app.on_timer(&mut ctx),
        Hook::DataAvailable(socket) => slot.app.on_data_available(&mut ctx, socket),
    }
}

impl Context<'_> {
    /// current virtual time
    pub fn now(&self) -> SimTime {
        self.scheduler.now()
    }

    /// the node the application runs on
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// the application the hook is running for
    pub fn app(&self) -> AppId {
        self.app
    }

    /// Set a timer: [`Application::on_timer`] is called `delay` from now.
    pub fn schedule(&mut self, delay: Duration) -> EventId {
        self.scheduler.schedule(delay, Event::Timer(self.app))
    }

    /// Cancel a timer. Returns `false` if it already fired or was cancelled.
    pub fn cancel(&mut self, event: EventId) -> bool {
        self.scheduler.cancel(event)
    }

    pub fn is_pending(&self, event: EventId) -> bool {
        self.scheduler.is_pending(event)
    }

    pub fn bind(&mut self, socket: SocketId, port: u16) -> Result<Address, SocketError> {
        self.ensure_owned(socket)?;
        self.network.bind(socket, port)
    }

    pub fn connect(&mut self, socket: SocketId, remote: Address) -> Result<(), SocketError> {
        self.ensure_owned(socket)?;
        self.network.connect(socket, remote)
    }

    /// Send `payload` to the address the socket is connected to.
    ///
    /// Returns once the packet is handed to the link, the delivery happens
    /// later. A packet lost on the link is not an error.
    pub fn send(&mut self, socket: SocketId, payload: Box<[u8]>) -> Result<(), SendError> {
        self.ensure_owned(socket)?;
        let transit = self.network.send(self.now(), socket, payload)?;
        self.in_transit(transit);
        Ok(())
    }

    pub fn send_to(
        &mut self,
        socket: SocketId,
        to: Address,
        payload: Box<[u8]>,
    ) -> Result<(), SendError> {
        self.ensure_owned(socket)?;
        let transit = self.network.send_to(self.now(), socket, to, payload)?;
        self.in_transit(transit);
        Ok(())
    }

    /// Have [`Application::on_data_available`] called when packets reach
    /// the socket.
    pub fn set_receive_handler(&mut self, socket: SocketId) -> Result<(), SocketError> {
        self.ensure_owned(socket)?;
        self.network.set_receive_handler(socket, self.app)
    }

    pub fn recv(&mut self, socket: SocketId) -> Result<Option<Packet>, SocketError> {
        self.ensure_owned(socket)?;
        self.network.recv(socket)
    }

    pub fn close(&mut self, socket: SocketId) -> Result<(), SocketError> {
        self.ensure_owned(socket)?;
        self.network.close(socket)
    }

    /// Append a record to the simulation [`Trace`].
    pub fn record(&mut self, role: Role, bytes: u64, peer: Address) {
        self.trace.push(TraceRecord {
            time: self.now(),
            node: self.node,
            app: self.app,
            role,
            bytes,
            peer,
        });
    }

    fn ensure_owned(&self, socket: SocketId) -> Result<(), SocketError> {
        let Some(owner) = self.network.socket(socket).map(|socket| socket.node()) else {
            return Err(SocketError::SocketNotFound(socket));
        };
        if owner != self.node {
            return Err(SocketError::WrongNode {
                socket,
                owner,
                node: self.node,
            });
        }
        Ok(())
    }

    fn in_transit(&mut self, transit: Option<Transit>) {
        let Some(transit) = transit else {
            return;
        };
        let (packet, arrival) = transit.into_parts();
        let delay = arrival.saturating_duration_since(self.now());
        self.scheduler.schedule(delay, Event::Deliver(packet));
    }
}
