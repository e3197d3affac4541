use anyhow::Result;
use clap::Parser;
use orvd_cli::sim::{FlightPath, MissionPath};
use orvd_core::crypto::KeyPair;
use orvd_sdk::telemetry::Fix;
use orvd_sdk::VehicleClient;
use tokio::time::{interval, Duration};

#[derive(Parser, Debug)]
#[command(author, version, about = "Simulated vehicle flying its accepted mission", long_about = None)]
struct Args {
    /// ORVD Server URL
    #[arg(long, default_value = "http://localhost:8080")]
    url: String,

    /// Vehicle id
    #[arg(long, default_value = "SIM1")]
    id: String,

    /// RSA modulus size for the vehicle key
    #[arg(long, default_value_t = 1024)]
    key_bits: usize,

    /// Update rate in Hz
    #[arg(long, default_value_t = 1.0)]
    rate: f64,

    /// Cruise speed in m/s
    #[arg(long, default_value_t = 10.0)]
    speed: f64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let keys = KeyPair::generate(args.key_bits)?;
    let mut client = VehicleClient::new(args.url, args.id, keys);

    client.exchange_keys().await?;
    let auth = client.auth().await?;
    println!("{} (verified: {})", auth.body(), auth.verified);

    let mission = client.fmission_kos().await?;
    let Some(steps) = mission.get("FlightMission") else {
        eprintln!("No accepted mission for {}: {}", client.id(), mission.body());
        return Ok(());
    };
    let path = MissionPath::from_compact(&steps, args.speed)?;
    println!(
        "Mission: {} positions, {:.0}s at {} m/s",
        path.points().len(),
        path.duration(),
        path.get_speed_mps()
    );

    println!("Requesting arm, waiting for the operator...");
    let arm = client.arm().await?;
    if arm.get("Arm").as_deref() != Some("0") {
        eprintln!("Arm refused: {}", arm.body());
        return Ok(());
    }
    println!("Armed. Taking off.");

    let tick = 1.0 / args.rate.max(0.01);
    let mut ticker = interval(Duration::from_secs_f64(tick));
    let mut t = 0.0;
    while t <= path.duration() {
        ticker.tick().await;
        let (lat, lon, alt_m) = path.get_position(t);
        let fix = Fix {
            lat,
            lon,
            alt_m,
            azimuth_deg: path.get_heading(t),
            dop: 1.0,
            sats: 12,
            speed: path.get_speed_mps(),
        };
        let reply = client.send_telemetry(&fix.encode()).await?;
        if reply.get("Arm:").as_deref() == Some("1") {
            println!("Disarmed by the relay at t={:.1}s, landing", t);
            break;
        }

        let kill = client.kill_switch().await?;
        if kill.get("KillSwitch:").as_deref() == Some("0") {
            println!("Kill switch engaged at t={:.1}s", t);
            break;
        }
        t += tick;
    }

    let log = client
        .send_log(&format!("flight finished after {:.1}s", t))
        .await?;
    println!("Log: {}", log.body());
    Ok(())
}
