//! Interactive calibration prompt followed by a polling loop.
//!
//! Usage: cargo run --example configure -- <COM number | port path>
//! Press Enter to stop polling.

use endoscope::{DeviceConfig, HapticDevice, Polarity, PoseStream, SerialSettings, UsartDevice};
use std::io::{BufRead, Write};
use std::time::Duration;

fn prompt<T: std::str::FromStr>(lines: &mut impl Iterator<Item = String>, text: &str) -> T {
    loop {
        print!("{}: ", text);
        let _ = std::io::stdout().flush();
        let Some(line) = lines.next() else {
            eprintln!("stdin closed");
            std::process::exit(1);
        };
        match line.trim().parse() {
            Ok(v) => return v,
            Err(_) => println!("Could not parse '{}', try again.", line.trim()),
        }
    }
}

fn prompt_polarity(lines: &mut impl Iterator<Item = String>, text: &str) -> Polarity {
    loop {
        let v: i32 = prompt(&mut *lines, text);
        match Polarity::from_i32(v) {
            Some(p) => return p,
            None => println!("Enter 1 for positive or -1 for negative."),
        }
    }
}

fn main() {
    env_logger::init();

    let arg = std::env::args().nth(1).unwrap_or_else(|| "7".into());
    let settings = match arg.parse::<u32>() {
        Ok(n) => SerialSettings::com_port(n),
        Err(_) => SerialSettings::new(arg),
    };

    // The stdin lock is released before the stop-listener thread needs it.
    let entered = {
        let stdin = std::io::stdin();
        let mut lines = stdin.lock().lines().map_while(|l| l.ok());

        println!("Enter the scaling factor for zoom in/out.");
        let zoom_scale: f64 = prompt(&mut lines, "Zoom scale");
        let polarity_zoom = prompt_polarity(&mut lines, "Polarity for zoom (1 / -1)");
        println!("Enter the scaling factor for angles.");
        let angle_scale: f64 = prompt(&mut lines, "Angle scale");
        let polarity_angle = prompt_polarity(&mut lines, "Polarity for translations (1 / -1)");

        DeviceConfig::from_operator_input(zoom_scale, polarity_zoom, angle_scale, polarity_angle)
    };

    let config = match entered {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    let mut device = UsartDevice::with_settings(settings.clone());
    if let Err(e) = device.configure(config) {
        eprintln!("{}", e);
        std::process::exit(1);
    }

    let stream = match PoseStream::start(device, Duration::from_millis(1)) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to open device on {}: {}", settings.port, e);
            std::process::exit(1);
        }
    };
    println!("Opened device on {}. Press Enter to stop.", settings.port);

    // Stop request travels over a channel instead of a shared running flag.
    let (quit_tx, quit_rx) = crossbeam_channel::bounded::<()>(1);
    std::thread::spawn(move || {
        let mut line = String::new();
        let _ = std::io::stdin().read_line(&mut line);
        let _ = quit_tx.send(());
    });

    loop {
        if quit_rx.try_recv().is_ok() {
            break;
        }
        match stream.recv_timeout(Duration::from_millis(200)) {
            Ok(sample) => {
                if sample.sequence % 100 == 0 {
                    let p = sample.pose.position;
                    println!("pos=[{:+.5}, {:+.5}, {:+.5}]", p[0], p[1], p[2]);
                }
            }
            Err(endoscope::EndoscopeError::Timeout) => continue,
            Err(e) => {
                eprintln!("Error: {}", e);
                break;
            }
        }
    }

    if let Some(mut device) = stream.stop() {
        let _ = device.close();
    }
}
