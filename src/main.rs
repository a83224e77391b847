use geoanchor::algorithms::geomath::{initial_bearing, offset_to_point};
use geoanchor::core::DEFAULT_LEVEL_TOLERANCE_DEG;
use geoanchor::logging::init_logging;
use geoanchor::sensors::{Clock, MockLocationSource, MockOrientationSource, SystemClock};
use geoanchor::{
    ConfigurationManager, LocalOffset, LocationStream, OrientationStream, Placement,
    PlacementEngine, SessionConfig, TrackingEvent,
};
use rand::Rng;
use tracing::info;

const DEFAULT_STEPS: usize = 60;
/// Distance south of the target the simulated walk starts from
const START_DISTANCE_M: f64 = 120.0;
const WALK_SPEED_MPS: f64 = 1.4;
const GPS_JITTER_M: f64 = 3.0;
const COMPASS_NOISE_DEG: f64 = 4.0;

struct Args {
    config: Option<String>,
    steps: usize,
    json: bool,
}

fn usage(program: &str) -> String {
    format!("Usage: {} [--config <session.json>] [--steps <n>] [--json]", program)
}

fn parse_args() -> Result<Args, Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();
    let program = args.first().map_or("geoanchor", |s| s.as_str());

    let mut parsed = Args {
        config: None,
        steps: DEFAULT_STEPS,
        json: false,
    };

    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => {
                parsed.config = Some(iter.next().ok_or_else(|| usage(program))?.clone());
            }
            "--steps" => {
                parsed.steps = iter.next().ok_or_else(|| usage(program))?.parse()?;
            }
            "--json" => parsed.json = true,
            "--help" | "-h" => {
                println!("{}", usage(program));
                std::process::exit(0);
            }
            other => return Err(format!("Unknown argument '{}'\n{}", other, usage(program)).into()),
        }
    }

    Ok(parsed)
}

fn print_placement(placement: &Placement, json: bool) {
    if json {
        match serde_json::to_string(placement) {
            Ok(line) => println!("{}", line),
            Err(e) => eprintln!("failed to encode placement: {}", e),
        }
        return;
    }

    let (x, z) = placement.offset.to_camera_frame();
    println!(
        "#{:<4} dist={:>7.1} m  bearing={:>5.1}°  relative={:>+6.1}°  {:?}  camera=({:+.1}, {:+.1})  {}",
        placement.sequence,
        placement.distance_m,
        placement.bearing_to_target_deg,
        placement.relative_bearing_deg,
        placement.turn_hint,
        x,
        z,
        if placement.is_visible { "VISIBLE" } else { "hidden" }
    );
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = parse_args()?;

    let config = match &args.config {
        Some(path) => ConfigurationManager::from_file(path)?.config().clone(),
        None => SessionConfig::default(),
    };
    init_logging(config.log_level);

    let engine = PlacementEngine::from_config(&config)?;
    let target = *engine.target();

    let (location_source, gps) = MockLocationSource::new();
    let (orientation_source, compass) = MockOrientationSource::new();
    let mut location = LocationStream::new(Box::new(location_source));
    let mut orientation = OrientationStream::new(Box::new(orientation_source));
    let attachment = engine.attach(&location, &orientation);

    let json = args.json;
    engine.on_placement(move |placement| print_placement(placement, json));
    engine.on_event(|event| match event {
        TrackingEvent::SensorFailed { error } => eprintln!("sensor failure: {}", error),
        other => info!(event = ?other, "tracking event"),
    });

    location.start(config.location)?;
    orientation.start(config.orientation)?;

    let start_ms = SystemClock.now_ms();
    let mut rng = rand::thread_rng();
    let start = offset_to_point(target.point(), &LocalOffset::new(0.0, -START_DISTANCE_M));

    for step in 0..args.steps {
        let timestamp_ms = start_ms + step as u64 * 1_000;
        let walked = (step as f64 * WALK_SPEED_MPS).min(START_DISTANCE_M);
        let position = offset_to_point(&start, &LocalOffset::new(0.0, walked));

        gps.emit_with_jitter(position, GPS_JITTER_M, GPS_JITTER_M, timestamp_ms);

        // Sweep the device around before settling on the target
        let facing = if step < 8 {
            step as f64 * 45.0
        } else {
            initial_bearing(&position, target.point())
        };
        let noise = rng.gen_range(-COMPASS_NOISE_DEG..=COMPASS_NOISE_DEG);
        compass.emit_compass(facing + noise, timestamp_ms + 500);
    }

    if let Some(error) = location.check_first_fix_deadline() {
        eprintln!("{}", error);
    }
    if let Some(sample) = orientation.latest() {
        info!(
            heading_deg = sample.heading_deg,
            facing = sample.cardinal().abbreviation(),
            tilt = ?sample.tilt_hint(DEFAULT_LEVEL_TOLERANCE_DEG),
            "last orientation"
        );
    }

    attachment.detach(&location, &orientation);
    location.stop();
    orientation.stop();

    match engine.current_placement() {
        Some(placement) => info!(
            sequence = placement.sequence,
            distance_m = placement.distance_m,
            visible = placement.is_visible,
            "simulation finished"
        ),
        None => info!("simulation finished without a placement"),
    }

    Ok(())
}
