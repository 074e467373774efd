//! NMEA talker example.
//!
//! This example sends a heading sentence once per second on the NAVD
//! transmission group.
//!
//! Run the listener first: cargo run --example nmea_listener
//! Then run: cargo run --example nmea_talker

use nmea450::{NmeaEndpoint, TransmissionGroup};
use std::thread;
use std::time::Duration;

const SOURCE_ID: &str = "GP0001";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let group = TransmissionGroup::Navd;
    println!("Opening {group} talker on {}...", group.socket_addr());

    let mut endpoint = NmeaEndpoint::new(group);
    endpoint.open()?;
    endpoint.register_source_id(SOURCE_ID);

    for i in 0..10u32 {
        let heading = format!("{:.2}", 270.0 + f64::from(i) * 0.5);
        let body = format!("GPHDT,{heading},T");
        let cs = nmea450::codec::checksum(body.as_bytes());
        let sentence = format!("${body}*{cs:02X}");

        let sent = endpoint.send(SOURCE_ID, &sentence)?;
        println!("Sent {sent} bytes: {sentence}");

        thread::sleep(Duration::from_secs(1));
    }

    println!("\nDone!");
    Ok(())
}
