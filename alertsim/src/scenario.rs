//! The missing persons alert network.
//!
//! One cloud node and `stations` police stations, each station connected to
//! the cloud by its own link. Station 0 files a report with the cloud, then
//! the cloud broadcasts an alert to every station.

use alertsim_core::{
    Address, AppId, DataRate, Emitter, Latency, Network, NodeId, PacketLoss, Receiver, SimTime,
    Simulation,
};
use anyhow::{Context as _, Result, ensure};

pub const REPORT_PORT: u16 = 9_000;
pub const ALERT_PORT: u16 = 9_001;

#[derive(Debug, Clone)]
pub struct Scenario {
    pub stations: u32,
    pub sim_time: SimTime,
    pub seed: u64,
    pub link: LinkConfig,
    /// station 0 to the cloud
    pub report: FlowConfig,
    /// the cloud to every station
    pub alert: FlowConfig,
}

/// settings shared by every station to cloud link
#[derive(Debug, Clone, Copy)]
pub struct LinkConfig {
    pub data_rate: DataRate,
    pub latency: Latency,
    pub queue_capacity: usize,
    pub packet_loss: PacketLoss,
}

#[derive(Debug, Clone, Copy)]
pub struct FlowConfig {
    pub packet_size: u32,
    pub packet_count: u32,
    pub rate: DataRate,
    pub start: SimTime,
}

/// the simulation of a [`Scenario`] and the identifiers of its parts
pub struct Outcome {
    pub sim: Simulation,
    pub cloud: NodeId,
    pub stations: Vec<NodeId>,
    pub report: AppId,
    pub alerts: Vec<AppId>,
    pub cloud_receiver: AppId,
    pub station_receivers: Vec<AppId>,
}

impl Default for Scenario {
    fn default() -> Self {
        Self {
            stations: 5,
            sim_time: SimTime::from_secs(20),
            seed: 0,
            link: LinkConfig {
                data_rate: DataRate::from_mbps(100),
                latency: Latency::new(std::time::Duration::from_millis(10)),
                queue_capacity: 100,
                packet_loss: PacketLoss::NONE,
            },
            report: FlowConfig {
                packet_size: 5_120,
                packet_count: 1,
                rate: DataRate::from_mbps(10),
                start: SimTime::from_secs(2),
            },
            alert: FlowConfig {
                packet_size: 2_048,
                packet_count: 1,
                rate: DataRate::from_mbps(50),
                start: SimTime::from_millis(2_100),
            },
        }
    }
}

impl Scenario {
    /// Build the topology and the applications, with their start and stop
    /// times scheduled. Nothing has run yet.
    pub fn build(&self) -> Result<Outcome> {
        ensure!(self.stations > 0, "The alert network needs at least one station");

        let mut network = Network::new();
        network.set_seed(self.seed);

        let cloud = network.new_node().set_name("cloud").build();
        let stations: Vec<NodeId> = (0..self.stations)
            .map(|i| {
                let station = network.new_node().set_name(format!("station-{i}")).build();
                network
                    .configure_link(station, cloud)
                    .set_data_rate(self.link.data_rate)
                    .set_latency(self.link.latency)
                    .set_queue_capacity(self.link.queue_capacity)
                    .set_packet_loss(self.link.packet_loss)
                    .apply();
                station
            })
            .collect();

        // report: station 0 -> cloud
        let cloud_socket = network.open_socket(cloud)?;
        let report_socket = network.open_socket(stations[0])?;
        let mut report = Emitter::new();
        report
            .configure(
                report_socket,
                Address::new(cloud, REPORT_PORT),
                self.report.packet_size,
                self.report.packet_count,
                self.report.rate,
            )
            .context("Invalid report flow")?;

        // alerts: cloud -> every station
        let mut alerts = Vec::with_capacity(stations.len());
        let mut station_sockets = Vec::with_capacity(stations.len());
        for station in stations.iter().copied() {
            station_sockets.push(network.open_socket(station)?);

            let socket = network.open_socket(cloud)?;
            let mut alert = Emitter::new();
            alert
                .configure(
                    socket,
                    Address::new(station, ALERT_PORT),
                    self.alert.packet_size,
                    self.alert.packet_count,
                    self.alert.rate,
                )
                .context("Invalid alert flow")?;
            alerts.push(alert);
        }

        let mut sim = Simulation::new(network);

        let cloud_receiver = sim.add_application(
            cloud,
            Receiver::new(cloud_socket, REPORT_PORT).with_label("Cloud received report"),
        )?;
        sim.activate(cloud_receiver, SimTime::ZERO)?;

        let report = sim.add_application(stations[0], report)?;
        sim.activate(report, self.report.start)?;
        sim.deactivate(report, self.sim_time)?;

        let mut station_receivers = Vec::with_capacity(stations.len());
        for (station, socket) in stations.iter().copied().zip(station_sockets) {
            let receiver = sim.add_application(
                station,
                Receiver::new(socket, ALERT_PORT).with_label("Station received ALERT"),
            )?;
            sim.activate(receiver, SimTime::ZERO)?;
            station_receivers.push(receiver);
        }

        let alerts = alerts
            .into_iter()
            .map(|alert| {
                let id = sim.add_application(cloud, alert)?;
                sim.activate(id, self.alert.start)?;
                sim.deactivate(id, self.sim_time)?;
                Ok(id)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Outcome {
            sim,
            cloud,
            stations,
            report,
            alerts,
            cloud_receiver,
            station_receivers,
        })
    }

    /// build and run the simulation up to [`Scenario::sim_time`]
    pub fn run(&self) -> Result<Outcome> {
        let mut outcome = self.build()?;
        outcome.sim.run(self.sim_time);
        Ok(outcome)
    }
}
