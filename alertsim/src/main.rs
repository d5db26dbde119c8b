mod report;
mod scenario;

use alertsim_core::{DataRate, Latency, PacketLoss, SimTime};
use anyhow::Result;
use clap::Parser;
use scenario::{FlowConfig, LinkConfig, Scenario};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Missing persons alert network.
///
/// A star of police stations around a cloud: the first station files a
/// report with the cloud, then the cloud broadcasts an alert to every
/// station.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Number of police stations
    #[arg(long, default_value_t = 5)]
    stations: u32,

    /// Simulated time at which every application stops
    #[arg(long, default_value = "20s")]
    sim_time: SimTime,

    /// Seed of the packet loss decisions
    #[arg(long, default_value_t = 0)]
    seed: u64,

    #[arg(long, default_value = "100Mbps")]
    link_rate: DataRate,

    #[arg(long, default_value = "10ms")]
    link_delay: Latency,

    /// Packets a link direction holds before dropping
    #[arg(long, default_value_t = 100)]
    link_queue: usize,

    #[arg(long, default_value = "0%")]
    link_loss: PacketLoss,

    /// Report packet size in bytes
    #[arg(long, default_value_t = 5_120)]
    report_size: u32,

    #[arg(long, default_value_t = 1)]
    report_count: u32,

    #[arg(long, default_value = "10Mbps")]
    report_rate: DataRate,

    #[arg(long, default_value = "2s")]
    report_start: SimTime,

    /// Alert packet size in bytes
    #[arg(long, default_value_t = 2_048)]
    alert_size: u32,

    #[arg(long, default_value_t = 1)]
    alert_count: u32,

    #[arg(long, default_value = "50Mbps")]
    alert_rate: DataRate,

    #[arg(long, default_value = "2.1s")]
    alert_start: SimTime,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long)]
    verbose: bool,
}

impl From<&Cli> for Scenario {
    fn from(cli: &Cli) -> Self {
        Self {
            stations: cli.stations,
            sim_time: cli.sim_time,
            seed: cli.seed,
            link: LinkConfig {
                data_rate: cli.link_rate,
                latency: cli.link_delay,
                queue_capacity: cli.link_queue,
                packet_loss: cli.link_loss,
            },
            report: FlowConfig {
                packet_size: cli.report_size,
                packet_count: cli.report_count,
                rate: cli.report_rate,
                start: cli.report_start,
            },
            alert: FlowConfig {
                packet_size: cli.alert_size,
                packet_count: cli.alert_count,
                rate: cli.alert_rate,
                start: cli.alert_start,
            },
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let scenario = Scenario::from(&cli);
    info!(
        stations = scenario.stations,
        sim_time = %scenario.sim_time,
        "starting the alert network"
    );

    let outcome = scenario.run()?;
    print!("{}", report::summary(&outcome));

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_scenario() {
        let cli = Cli::try_parse_from(["alertsim"]).unwrap();
        let from_cli = Scenario::from(&cli);
        let default = Scenario::default();

        assert_eq!(from_cli.stations, default.stations);
        assert_eq!(from_cli.sim_time, default.sim_time);
        assert_eq!(from_cli.link.data_rate, default.link.data_rate);
        assert_eq!(from_cli.link.latency, default.link.latency);
        assert_eq!(from_cli.link.packet_loss, default.link.packet_loss);
        assert_eq!(from_cli.report.start, default.report.start);
        assert_eq!(from_cli.report.rate, default.report.rate);
        assert_eq!(from_cli.alert.start, default.alert.start);
        assert_eq!(from_cli.alert.packet_size, default.alert.packet_size);
    }

    #[test]
    fn parses_units() {
        let cli = Cli::try_parse_from([
            "alertsim",
            "--stations",
            "3",
            "--link-delay",
            "25ms",
            "--link-loss",
            "5%",
            "--alert-rate",
            "1Gbps",
            "-v",
        ])
        .unwrap();

        assert_eq!(cli.stations, 3);
        assert_eq!(cli.link_delay, "25ms".parse().unwrap());
        assert_eq!(cli.link_loss, PacketLoss::from_ppm(50_000).unwrap());
        assert_eq!(cli.alert_rate, DataRate::from_mbps(1_000));
        assert!(cli.verbose);
    }

    #[test]
    fn rejects_malformed_rates() {
        assert!(Cli::try_parse_from(["alertsim", "--report-rate", "fast"]).is_err());
    }
}
