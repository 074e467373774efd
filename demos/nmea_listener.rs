//! NMEA listener example.
//!
//! This example prints every sentence seen on the NAVD transmission group
//! until Enter is pressed.
//!
//! Run with: cargo run --example nmea_listener
//! Then send with: cargo run --example nmea_talker

use std::sync::Arc;

use nmea450::{NmeaEndpoint, NmeaListener, TransmissionGroup};

struct Printer;

impl NmeaListener for Printer {
    fn on_string_available(&self, source_id: &str, sentence: &str) {
        println!("{source_id}: {sentence}");
    }

    fn on_timeout(&self) {
        println!("(no traffic)");
    }

    fn on_connection_error(&self) {
        eprintln!("connection error");
    }

    fn on_checksum_error(&self) {
        eprintln!("tag block checksum error");
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let group = TransmissionGroup::Navd;
    println!("Listening on {group} ({})...", group.socket_addr());

    let mut endpoint = NmeaEndpoint::new(group);
    endpoint.set_listener(Arc::new(Printer));
    endpoint.start_listening()?;

    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;

    endpoint.stop_listening();
    println!("Stopped.");
    Ok(())
}
