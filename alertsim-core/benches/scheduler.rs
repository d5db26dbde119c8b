use alertsim_core::{
    Address, DataRate, Emitter, Network, Receiver, SimTime, Simulation, scheduler::Scheduler,
};
use criterion::{
    BenchmarkGroup, Criterion, Throughput, black_box, criterion_group, criterion_main,
    measurement::WallTime,
};
use std::time::Duration;

const PACKET_SIZE: u32 = 1_500;
const RATE: DataRate = DataRate::from_mbps(100);

fn schedule_and_run(c: &mut Criterion) {
    let mut group = c.benchmark_group("scheduler");

    for size in [1_000u64, 10_000, 100_000] {
        group.throughput(Throughput::Elements(size));
        group.bench_function(format!("{size} events"), |b| {
            b.iter(|| {
                let mut scheduler = Scheduler::new();
                for i in 0..size {
                    // spread over 1s, half of them sharing an instant
                    scheduler.schedule(Duration::from_micros(i / 2), i);
                }
                let mut sum = 0u64;
                scheduler.run(SimTime::from_secs(1), |_, event| sum += event);
                black_box(sum)
            })
        });
    }

    group.finish();
}

fn bench_star_size(group: &mut BenchmarkGroup<'_, WallTime>, stations: u32, packets: u32) {
    group.throughput(Throughput::Elements(u64::from(stations * packets)));
    group.bench_function(format!("{stations} stations"), |b| {
        b.iter(|| {
            let mut network = Network::new();
            let cloud = network.new_node().build();

            let mut sim_apps = Vec::new();
            for _ in 0..stations {
                let station = network.new_node().build();
                network
                    .configure_link(cloud, station)
                    .set_queue_capacity(packets as usize)
                    .apply();

                let tx = network.open_socket(cloud).unwrap();
                let rx = network.open_socket(station).unwrap();
                let mut emitter = Emitter::new();
                emitter
                    .configure(tx, Address::new(station, 9001), PACKET_SIZE, packets, RATE)
                    .unwrap();
                sim_apps.push((station, emitter, Receiver::new(rx, 9001)));
            }

            let mut sim = Simulation::new(network);
            for (station, emitter, receiver) in sim_apps {
                let emitter = sim.add_application(cloud, emitter).unwrap();
                let receiver = sim.add_application(station, receiver).unwrap();
                sim.activate(receiver, SimTime::ZERO).unwrap();
                sim.activate(emitter, SimTime::from_secs(1)).unwrap();
            }

            sim.run(SimTime::from_secs(10));
            black_box(sim.trace().len())
        })
    });
}

fn star(c: &mut Criterion) {
    let mut group = c.benchmark_group("star");

    for stations in [5, 50, 200] {
        bench_star_size(&mut group, stations, 100);
    }

    group.finish();
}

criterion_group!(benches, schedule_and_run, star);
criterion_main!(benches);
