use crate::scenario::Outcome;
use alertsim_core::{Receiver, stats::FlowStats};
use std::{fmt::Write as _, time::Duration};

/// Render the end of run summary: what each receiver got, then the
/// per-flow counters.
pub fn summary(outcome: &Outcome) -> String {
    let sim = &outcome.sim;
    let mut out = String::new();

    let _ = writeln!(out, "Simulation ended at {}", sim.now());

    let receivers =
        std::iter::once(outcome.cloud_receiver).chain(outcome.station_receivers.iter().copied());
    for id in receivers {
        let Some(receiver) = sim.application::<Receiver>(id) else {
            continue;
        };
        let node = sim
            .node_of(id)
            .and_then(|node| sim.network().node(node))
            .map(|node| match node.name() {
                Some(name) => name.to_owned(),
                None => node.id().to_string(),
            })
            .unwrap_or_default();
        let _ = writeln!(
            out,
            "{node:>12} port {}: {} packets, {} bytes",
            receiver.port(),
            receiver.received(),
            receiver.received_bytes()
        );
    }

    for (flow, stats) in sim.flow_stats().iter() {
        let _ = writeln!(out, "Flow {flow}: {}", flow_line(stats));
    }

    out
}

fn flow_line(stats: &FlowStats) -> String {
    let delay = stats
        .mean_delay()
        .map(|delay| format!("{:?}", round_micros(delay)))
        .unwrap_or_else(|| "-".to_owned());
    let throughput = stats
        .throughput()
        .map(|rate| rate.to_string())
        .unwrap_or_else(|| "-".to_owned());

    format!(
        "tx {} packets ({} bytes), rx {} packets ({} bytes), lost {} ({}), mean delay {delay}, throughput {throughput}",
        stats.tx_packets,
        stats.tx_bytes,
        stats.rx_packets,
        stats.rx_bytes,
        stats.lost_packets(),
        stats.drops,
    )
}

fn round_micros(delay: Duration) -> Duration {
    Duration::from_micros(u64::try_from(delay.as_micros()).unwrap_or(u64::MAX))
}
