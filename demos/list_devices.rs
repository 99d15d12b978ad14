//! Lists the output devices CPAL can see and the channel counts a
//! `channel_map` for each needs.
//!
//! Run with: cargo run --example list_devices

use stream_output::driver::CpalDriver;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    for device in CpalDriver::list_devices()? {
        let marker = if device.is_default { " (default)" } else { "" };
        match device.max_channels {
            Some(channels) => println!("{}{marker}: {channels} channels", device.name),
            None => println!("{}{marker}: no integer output formats", device.name),
        }
    }

    Ok(())
}
