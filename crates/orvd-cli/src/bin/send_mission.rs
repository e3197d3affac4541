use anyhow::{Context, Result};
use clap::Parser;
use orvd_core::crypto::KeyPair;
use orvd_sdk::MissionSenderClient;

#[derive(Parser, Debug)]
#[command(author, version, about = "Upload a QGC WPL 110 mission", long_about = None)]
struct Args {
    /// ORVD Server URL
    #[arg(long, default_value = "http://localhost:8080")]
    url: String,

    /// Mission sender id
    #[arg(long, default_value = "ms1")]
    sender: String,

    /// Target vehicle id
    #[arg(long)]
    vehicle: String,

    /// Path to the WPL file
    mission: std::path::PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let wpl = std::fs::read_to_string(&args.mission)
        .with_context(|| format!("Failed to read {}", args.mission.display()))?;

    let keys = KeyPair::generate(orvd_core::crypto::DEFAULT_KEY_BITS)?;
    let mut client = MissionSenderClient::new(args.url, args.sender, keys);
    client.exchange_keys().await?;

    let reply = client.upload_mission(&args.vehicle, &wpl).await?;
    println!("{} (status {}, verified: {})", reply.body(), reply.status, reply.verified);
    if !reply.is_success() {
        anyhow::bail!("Upload failed");
    }
    Ok(())
}
