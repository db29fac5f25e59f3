//! Hover-and-think flight over the simulated vehicle.
//!
//! A scripted decision service stands in for the vision model: it answers
//! each frame with the next label of a fixed script after a short delay.
//! Ctrl+C (or the end of `--duration`) trips the emergency latch and the
//! vehicle lands.
//!
//! ```bash
//! cargo run --example hover_think
//! RUST_LOG=hoverthink=debug cargo run --example hover_think -- --duration 60 --realtime
//! cargo run --example hover_think -- --config flight.toml --script turn_left,safe,error
//! ```

use clap::Parser;
use hoverthink::decision::InferenceRequest;
use hoverthink::{
    DecisionBroker, DecisionError, DecisionReply, EmergencyLatch, FlightConfig,
    FlightController, SimulatedQuadrotor, TickOutcome,
};
use std::path::PathBuf;
use std::time::{Duration, Instant};

#[derive(Parser, Debug)]
#[command(name = "hover_think")]
#[command(about = "Fly the hover-and-think loop against a simulated quadrotor")]
struct Args {
    /// TOML flight configuration; defaults are used when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Simulated seconds to fly before landing
    #[arg(long, default_value_t = 30.0)]
    duration: f64,

    /// Comma-separated decision labels, repeated in order
    #[arg(long, default_value = "turn_left,safe,turn_right,unsafe_forward,safe")]
    script: String,

    /// Simulated service latency in milliseconds
    #[arg(long, default_value_t = 200)]
    think_ms: u64,

    /// Pace the loop to wall-clock time
    #[arg(long)]
    realtime: bool,
}

fn scripted_service(
    labels: Vec<String>,
    latency: Duration,
) -> impl FnMut(&InferenceRequest, Duration) -> Result<DecisionReply, DecisionError> + Send + 'static
{
    let mut next = 0;
    move |request: &InferenceRequest, timeout: Duration| {
        if latency > timeout {
            std::thread::sleep(timeout);
            return Err(DecisionError::Timeout);
        }
        std::thread::sleep(latency);

        let label = labels[next % labels.len()].clone();
        next += 1;
        let caption = format!(
            "{}x{} frame, {} bytes of JPEG",
            request.width,
            request.height,
            request.jpeg.len()
        );
        Ok(DecisionReply::new(label).with_caption(caption))
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("hoverthink=info".parse()?)
                .add_directive("hover_think=info".parse()?),
        )
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => FlightConfig::load(path)?,
        None => FlightConfig::default(),
    };

    let labels: Vec<String> = args
        .script
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    if labels.is_empty() {
        return Err("decision script is empty".into());
    }

    let latch = EmergencyLatch::new();
    let handler_latch = latch.clone();
    ctrlc::set_handler(move || {
        tracing::warn!("interrupt received, landing");
        handler_latch.trip();
    })?;

    let service = scripted_service(labels, Duration::from_millis(args.think_ms));
    let broker = DecisionBroker::spawn(service, &config.decision)?;

    let period = config.dt();
    let mut vehicle = SimulatedQuadrotor::for_config(&config);
    let mut controller = FlightController::new(config, &vehicle, broker)?;
    let mut emergency = latch.clone();

    // Landing from cruise altitude takes a few seconds at the configured rate.
    let max_ticks = ((args.duration + 60.0) / period).ceil() as u64;
    let started = Instant::now();
    let mut last_report = 0.0;

    for tick in 0..max_ticks {
        if controller.flight_time() >= args.duration && !latch.is_tripped() {
            tracing::info!(t = controller.flight_time(), "flight time elapsed, landing");
            latch.trip();
        }

        if controller.tick(&mut vehicle, &mut emergency) == TickOutcome::Landed {
            break;
        }

        if controller.flight_time() - last_report >= 1.0 {
            last_report = controller.flight_time();
            let p = vehicle.state().position;
            tracing::info!(
                t = last_report,
                state = %controller.state(),
                x = p.x,
                y = p.y,
                z = p.z,
                yaw = vehicle.state().attitude.z,
                "status"
            );
        }

        if args.realtime {
            let target = started + Duration::from_secs_f64((tick + 1) as f64 * period);
            if let Some(wait) = target.checked_duration_since(Instant::now()) {
                std::thread::sleep(wait);
            }
        }
    }

    let p = vehicle.state().position;
    println!(
        "landed={} t={:.2}s position=({:.2}, {:.2}, {:.2}) frames={}",
        controller.is_landed(),
        controller.flight_time(),
        p.x,
        p.y,
        p.z,
        vehicle.frames_captured()
    );
    Ok(())
}
