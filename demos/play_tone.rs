//! Plays a two second sine tone through an output sink.
//!
//! Run with: cargo run --example play_tone -- [device] [channel_map]
//!
//! `device` defaults to the default output device. An optional
//! `channel_map` such as `0:1:-1:-1` routes the stereo tone onto a
//! multichannel device.

use std::time::Duration;

use stream_output::driver::CpalDriver;
use stream_output::format::{AudioFormat, SampleFormat};
use stream_output::source::MockSource;
use stream_output::{AudioSink, ConfigBlock};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let mut args = std::env::args().skip(1);
    let mut block = ConfigBlock::new().with_param("name", "demo", 1);
    if let Some(device) = args.next() {
        block.add_param("device", device, 2);
    }
    if let Some(map) = args.next() {
        block.add_param("channel_map", map, 3);
    }

    let mut sink = AudioSink::from_block(&block, CpalDriver::new())?;
    sink.enable()?;

    let mut format = AudioFormat::new(48000, 2, SampleFormat::S16);
    sink.open(&mut format)?;
    println!("Playing {format} on {:?}", sink.driver().device_name());

    let mut source = MockSource::new(format);
    for _ in 0..20 {
        source.generate_sine(440.0, 100);
        sink.write_all(&source.take_bytes())?;
    }

    // Let the last second drain before closing.
    std::thread::sleep(Duration::from_secs(1));

    let stats = sink.stats();
    println!(
        "Rendered {} frames, {} underruns",
        stats.frames_rendered, stats.underruns
    );

    sink.close()?;
    sink.disable()?;
    sink.finish()?;
    Ok(())
}
