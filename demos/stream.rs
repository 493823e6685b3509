//! Stream endoscope poses to stdout.
//!
//! Usage: ENDOSCOPE_PORT=COM7 cargo run --example stream
//! Calibration is taken from ENDOSCOPE_* variables (see `DeviceConfig::from_env`).

use std::time::{Duration, Instant};

fn main() {
    env_logger::init();

    let settings = match endoscope::SerialSettings::from_env() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };
    let config = match endoscope::DeviceConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    println!("Port:   {} @ {} baud", settings.port, settings.baud_rate);
    println!("Config: {:?}", config);
    println!();

    let mut device = endoscope::UsartDevice::with_settings(settings);
    if let Err(e) = device.configure(config) {
        eprintln!("Bad configuration: {}", e);
        std::process::exit(1);
    }

    let stream = match endoscope::PoseStream::start(device, Duration::from_millis(1)) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to open device: {}", e);
            std::process::exit(1);
        }
    };

    println!("Streaming poses (Ctrl+C to stop)...");

    let start = Instant::now();
    let mut count: u64 = 0;
    let mut last_report = Instant::now();

    loop {
        match stream.recv_timeout(Duration::from_secs(2)) {
            Ok(sample) => {
                count += 1;
                let p = &sample.pose.position;
                let r = &sample.pose.rotation;

                // Print every ~50th sample to avoid flooding the terminal
                if count % 50 == 1 {
                    println!(
                        "#{:<8} pos=[{:+.5}, {:+.5}, {:+.5}]  r0=[{:+.3}, {:+.3}, {:+.3}]",
                        sample.sequence, p[0], p[1], p[2], r[0][0], r[0][1], r[0][2],
                    );
                }

                let now = Instant::now();
                if now.duration_since(last_report) >= Duration::from_secs(3) {
                    let elapsed = start.elapsed().as_secs_f64();
                    println!("--- {} poses in {:.1}s ({:.1} Hz) ---", count, elapsed, count as f64 / elapsed);
                    last_report = now;
                }
            }
            Err(endoscope::EndoscopeError::Timeout) => {
                eprintln!("Timeout waiting for a frame");
                break;
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                break;
            }
        }
    }

    if let Some(mut device) = stream.stop() {
        use endoscope::HapticDevice;
        if let Err(e) = device.close() {
            eprintln!("Close failed: {}", e);
        }
    }
}
