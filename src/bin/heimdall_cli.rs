use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use structopt::StructOpt;

use heimdall::config::Config;
use heimdall::detection::detectors::{default_detectors, HighRiskCountryDetector};
use heimdall::detection::AnomalyEngine;
use heimdall::geolocation::GeoIpResolver;
use heimdall::input::PacketFileReader;
use heimdall::models::PacketRecord;
use heimdall::statistics::TrafficAggregator;

/// Traffic analysis command line interface
#[derive(StructOpt, Debug)]
#[structopt(name = "heimdall", about = "Network traffic analysis CLI")]
pub enum Cli {
    /// Analyze a file of decoded packet records (JSONL)
    Analyze {
        /// Path to the packet record file
        #[structopt(short, long)]
        file: PathBuf,
        /// Path to configuration file
        #[structopt(short, long, default_value = "config.toml")]
        config: PathBuf,
        /// Records folded into the aggregator per batch
        #[structopt(short, long, default_value = "10000")]
        batch_size: usize,
    },
    /// Generate a default configuration file
    Config {
        /// Output path for the configuration file
        #[structopt(short, long, default_value = "config.toml")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let cli = Cli::from_args();
    match cli {
        Cli::Analyze {
            file,
            config,
            batch_size,
        } => {
            let config = if config.exists() {
                Config::from_file(&config)?
            } else {
                log::warn!("Config file not found, using defaults");
                Config::default()
            };
            analyze(&file, &config, batch_size).await?;
        }
        Cli::Config { output } => {
            let config = Config::default();
            config.to_file(&output)?;
            println!("Default configuration written to: {:?}", output);
        }
    }

    Ok(())
}

async fn analyze(
    file: &PathBuf,
    config: &Config,
    batch_size: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    let aggregator = TrafficAggregator::new(config.aggregator.clone());
    let resolver = GeoIpResolver::new(&config.geoip);
    let engine = AnomalyEngine::new(&config.detection);
    for detector in default_detectors() {
        engine.register_detector(detector);
    }

    // Fold batches into the aggregator as they stream in; keep the records
    // for the whole-capture geolocation and detection passes.
    let mut reader = PacketFileReader::open(file)?;
    let mut packets: Vec<PacketRecord> = Vec::new();
    loop {
        let batch = reader.read_batch(batch_size)?;
        if batch.is_empty() {
            break;
        }
        aggregator.add_batch(&batch);
        packets.extend(batch);
    }
    log::info!(
        "Loaded {} packet records ({} malformed lines skipped)",
        packets.len(),
        reader.parse_errors()
    );

    let (country_traffic, flow_directions) = tokio::join!(
        resolver.analyze_country_traffic(&packets),
        resolver.analyze_flow_directions(&packets),
    );

    // Feed the resolved countries to the geo-threat detector before the
    // detection fan-out.
    let mut ip_countries: HashMap<String, String> = HashMap::new();
    for country in country_traffic.values() {
        for ip in &country.unique_ips {
            ip_countries.insert(ip.to_string(), country.country_code.clone());
        }
    }
    engine.register_detector(Arc::new(HighRiskCountryDetector::new(ip_countries)));

    let anomalies = {
        let engine = &engine;
        let packets = &packets;
        tokio::task::block_in_place(|| engine.detect_all(packets, None))
    };

    let snapshot = aggregator.build_statistics();
    let mut flows_by_pair = flow_directions;
    flows_by_pair.truncate(50);

    // Attach locations to the top endpoints for the report.
    let top_addresses: Vec<String> = snapshot
        .top_sources
        .iter()
        .chain(snapshot.top_destinations.iter())
        .map(|endpoint| endpoint.address.clone())
        .collect();
    let endpoint_locations = resolver.enrich_addresses(&top_addresses).await;

    let report = serde_json::json!({
        "statistics": &snapshot,
        "endpoint_locations": &endpoint_locations,
        "country_traffic": &country_traffic,
        "flow_directions": &flows_by_pair,
        "anomalies": &anomalies,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);

    log::info!(
        "Analysis complete: {} packets, {} countries, {} findings",
        snapshot.total_packets,
        country_traffic.len(),
        anomalies.len()
    );
    Ok(())
}
