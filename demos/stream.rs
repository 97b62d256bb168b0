//! Print head orientation from the glasses to stdout.
//!
//! Usage: cargo run --example stream
//! Configure with RAYNEO_PROFILE / RAYNEO_READ_STRATEGY. Press Ctrl+C to stop.

use std::time::{Duration, Instant};

fn main() {
    env_logger::init();

    let mut session = rayneo::Session::new(rayneo::StreamConfig::from_env());
    if let Err(e) = session.start_device() {
        eprintln!("Failed to start sensor stream: {}", e);
        std::process::exit(1);
    }

    println!("Streaming orientation (Ctrl+C to stop)...");

    let start = Instant::now();
    let mut last_report = Instant::now();

    loop {
        std::thread::sleep(Duration::from_millis(100));

        let state = session.state();
        if state == rayneo::StreamState::Stopped {
            eprintln!("{}", session.status());
            break;
        }

        let [yaw, pitch, roll] = session.orientation().to_euler_deg();
        println!(
            "{:<9}  yaw={:+7.1}  pitch={:+7.1}  roll={:+7.1}",
            state.to_string(),
            yaw,
            pitch,
            roll
        );

        // Report rate every 3 seconds
        let now = Instant::now();
        if now.duration_since(last_report) >= Duration::from_secs(3) {
            let stats = session.stats();
            let elapsed = start.elapsed().as_secs_f64();
            println!(
                "--- {} packets in {:.1}s ({:.1} Hz), {} rejected, {} timeouts ---",
                stats.packets,
                elapsed,
                stats.packets as f64 / elapsed,
                stats.rejected,
                stats.timeouts
            );
            last_report = now;
        }
    }
}
