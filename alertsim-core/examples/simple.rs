use alertsim_core::{Address, Emitter, Latency, Network, Receiver, SimTime, Simulation};
use std::time::Duration;

fn main() -> anyhow::Result<()> {
    let mut network = Network::new();

    let sender = network.new_node().set_name("sender").build();
    let receiver = network.new_node().set_name("receiver").build();

    // Connect the two nodes with a 50ms latency link.
    network
        .configure_link(sender, receiver)
        .set_latency(Latency::new(Duration::from_millis(50)))
        .set_data_rate("100Mbps".parse()?)
        .apply();

    let tx = network.open_socket(sender)?;
    let rx = network.open_socket(receiver)?;

    // 4 packets of 1KiB paced at 1Mbps: one every 8.192ms
    let mut emitter = Emitter::new();
    emitter.configure(tx, Address::new(receiver, 7), 1_024, 4, "1Mbps".parse()?)?;

    let mut sim = Simulation::new(network);
    let emitter = sim.add_application(sender, emitter)?;
    let sink = sim.add_application(receiver, Receiver::new(rx, 7))?;
    sim.activate(sink, SimTime::ZERO)?;
    sim.activate(emitter, SimTime::from_millis(10))?;

    sim.run(SimTime::from_secs(1));

    for record in sim.trace().iter() {
        println!("{record}");
    }

    Ok(())
}
