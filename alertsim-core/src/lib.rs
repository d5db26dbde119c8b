/*!
# Alert network simulator core

Deterministic discrete-event building blocks: a virtual clock and
[`Scheduler`], a datagram [`Network`] of nodes, full-duplex links and
sockets, and the [`Application`]s that run on the nodes, the rate-paced
[`Emitter`] and the [`Receiver`].

```
use alertsim_core::{
    Address, DataRate, Emitter, Latency, Network, Receiver, SimTime, Simulation,
};
use std::time::Duration;

let mut network = Network::new();
let cloud = network.new_node().set_name("cloud").build();
let station = network.new_node().set_name("station").build();
network
    .configure_link(cloud, station)
    .set_data_rate("100Mbps".parse().unwrap())
    .set_latency(Latency::new(Duration::from_millis(10)))
    .apply();

let tx = network.open_socket(cloud).unwrap();
let rx = network.open_socket(station).unwrap();

let mut alert = Emitter::new();
alert
    .configure(tx, Address::new(station, 9001), 2_048, 3, DataRate::from_mbps(50))
    .unwrap();

let mut sim = Simulation::new(network);
let alert = sim.add_application(cloud, alert).unwrap();
let receiver = sim
    .add_application(station, Receiver::new(rx, 9001).with_label("Station received ALERT"))
    .unwrap();
sim.activate(receiver, SimTime::ZERO).unwrap();
sim.activate(alert, "2.1s".parse().unwrap()).unwrap();
sim.run(SimTime::from_secs(20));

assert_eq!(sim.trace().sends().count(), 3);
assert_eq!(sim.trace().receives().count(), 3);
```
*/

pub mod app;
pub mod defaults;
pub mod link;
pub mod measure;
pub mod network;
pub mod node;
pub mod scheduler;
pub mod sim;
pub mod stats;
mod time;
pub mod trace;

pub use self::{
    app::{AppId, Application, Emitter, Receiver},
    link::LinkId,
    measure::{DataRate, Latency, PacketLoss},
    network::{Address, Network, Packet, PacketId, SocketId},
    node::NodeId,
    scheduler::{EventId, Scheduler},
    sim::{Context, Simulation},
    time::SimTime,
};
