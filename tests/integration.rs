//! Integration tests for stream-output.
//!
//! Note: Tests that require actual audio hardware are marked with
//! `#[ignore]` and should be run manually.

use std::thread;
use std::time::Duration;

use stream_output::driver::{MockDevice, MockDriver};
use stream_output::format::{decode_raw, AudioFormat, SampleFormat};
use stream_output::source::MockSource;
use stream_output::{AudioSink, ConfigBlock, OutputConfig, OutputError, SinkState};

fn open_sink(driver: MockDriver, format: &mut AudioFormat) -> AudioSink<MockDriver> {
    let mut sink = AudioSink::new(OutputConfig::default(), driver);
    sink.enable().unwrap();
    sink.open(format).unwrap();
    sink
}

#[test]
fn test_write_before_open_is_state_error() {
    let mut sink = AudioSink::new(OutputConfig::default(), MockDriver::new());
    assert!(sink.write(&[0; 4]).unwrap_err().is_state());

    sink.enable().unwrap();
    assert!(sink.write(&[0; 4]).unwrap_err().is_state());
}

#[test]
fn test_open_twice_is_state_error() {
    let mut format = AudioFormat::new(48000, 2, SampleFormat::S16);
    let mut sink = open_sink(MockDriver::new(), &mut format);

    let err = sink.open(&mut format).unwrap_err();
    assert!(matches!(
        err,
        OutputError::InvalidState {
            operation: "open",
            state: SinkState::Open
        }
    ));
}

#[test]
fn test_open_coerces_float_to_32_bit() {
    let mut format = AudioFormat::new(44100, 2, SampleFormat::Float);
    let sink = open_sink(MockDriver::new(), &mut format);

    assert_eq!(format.format, SampleFormat::S32);
    assert_eq!(format.frame_size(), 8);
    assert_eq!(sink.driver().configured_format(), Some(format));
}

#[test]
fn test_empty_buffer_renders_silence() {
    let mut format = AudioFormat::new(48000, 2, SampleFormat::S16);
    let sink = open_sink(MockDriver::new(), &mut format);

    let (rendered, data) = sink.driver().pull(4800).unwrap();
    assert_eq!(rendered, 0);
    assert_eq!(data.len(), 4800 * 4);
    assert!(data.iter().all(|&b| b == 0));
    assert_eq!(sink.stats().underruns, 1);
}

#[test]
fn test_one_second_end_to_end() {
    let mut format = AudioFormat::new(48000, 2, SampleFormat::S16);
    let sink = open_sink(MockDriver::new(), &mut format);

    let mut source = MockSource::new(format);
    source.generate_sine(440.0, 1000);
    let pcm = source.take_bytes();
    assert_eq!(pcm.len(), 192_000);

    // Four chunks of uneven size, three of them ending mid-frame
    for chunk in [&pcm[..10_001], &pcm[10_001..90_003], &pcm[90_003..150_002], &pcm[150_002..]] {
        sink.write_all(chunk).unwrap();
    }

    let mut played = Vec::with_capacity(pcm.len());
    let mut total = 0;
    for _ in 0..10 {
        let (rendered, data) = sink.driver().pull(4800).unwrap();
        assert_eq!(rendered, 4800);
        total += rendered;
        played.extend_from_slice(&data);
    }
    assert_eq!(total, 48000);
    assert_eq!(played, pcm);

    let (rendered, data) = sink.driver().pull(4800).unwrap();
    assert_eq!(rendered, 0);
    assert!(data.iter().all(|&b| b == 0));

    let stats = sink.stats();
    assert_eq!(stats.bytes_written, 192_000);
    assert_eq!(stats.frames_rendered, 48000);
    assert_eq!(stats.underruns, 1);
}

#[test]
fn test_concurrent_writer_and_driver() {
    let mut format = AudioFormat::new(8000, 2, SampleFormat::S16);
    let sink = open_sink(MockDriver::new(), &mut format);

    // Three seconds against a one second buffer forces the writer to wait.
    let mut source = MockSource::new(format);
    source.generate_sine(220.0, 3000);
    let pcm = source.take_bytes();
    let frame_size = format.frame_size();
    let total_frames = pcm.len() / frame_size;

    let played = thread::scope(|s| {
        s.spawn(|| sink.write_all(&pcm).unwrap());

        let mut played = Vec::with_capacity(pcm.len());
        let mut frames = 0;
        while frames < total_frames {
            let (rendered, data) = sink.driver().pull(400).unwrap();
            played.extend_from_slice(&data[..rendered * frame_size]);
            frames += rendered;
            if rendered == 0 {
                thread::sleep(Duration::from_millis(1));
            }
        }
        played
    });

    assert_eq!(played, pcm);
    assert_eq!(sink.buffered_bytes(), 0);
}

#[test]
fn test_cancel_after_mid_frame_chunk_keeps_channel_order() {
    let mut format = AudioFormat::new(48000, 2, SampleFormat::S16);
    let sink = open_sink(MockDriver::new(), &mut format);

    let mut source = MockSource::new(format);
    source.generate_frames(&vec![vec![0.5, -0.5]; 100]);
    let pcm = source.take_bytes();

    // Play part of a chunk that stops half way through a frame, then flush.
    sink.write_all(&pcm[..203]).unwrap();
    let (rendered, _) = sink.driver().pull(10).unwrap();
    assert_eq!(rendered, 10);
    sink.cancel().unwrap();
    assert_eq!(sink.buffered_bytes(), 0);

    // Enough audio to cross the end of the storage twice over.
    source.generate_frames(&vec![vec![0.25, -0.75]; 30_000]);
    let next = source.take_bytes();
    for _ in 0..4 {
        sink.write_all(&next).unwrap();
        let mut frames = 0;
        while frames < 30_000 {
            let (rendered, data) = sink.driver().pull(4800).unwrap();
            let samples = decode_raw(&data[..rendered * 4], SampleFormat::S16);
            for frame in samples.chunks_exact(2) {
                assert_eq!(frame, &[8191, -24575]);
            }
            frames += rendered;
        }
    }
    assert_eq!(sink.buffered_bytes(), 0);
}

#[test]
fn test_cancel_unblocks_waiting_writer() {
    let mut format = AudioFormat::new(48000, 2, SampleFormat::S16);
    let sink = open_sink(MockDriver::new(), &mut format);

    sink.write_all(&vec![1u8; 192_000]).unwrap();

    thread::scope(|s| {
        let writer = s.spawn(|| sink.write(&[2u8; 4]));

        thread::sleep(Duration::from_millis(50));
        sink.cancel().unwrap();

        assert_eq!(writer.join().unwrap().unwrap(), 4);
    });

    assert_eq!(sink.buffered_bytes(), 4);
    assert_eq!(sink.stats().bytes_discarded, 192_000);
}

#[test]
fn test_abort_releases_waiting_writer() {
    let mut format = AudioFormat::new(48000, 2, SampleFormat::S16);
    let sink = open_sink(MockDriver::new(), &mut format);

    sink.write_all(&vec![1u8; 192_000]).unwrap();

    thread::scope(|s| {
        let writer = s.spawn(|| sink.write(&[2u8; 4]));

        // The writer may not be waiting yet when the first abort lands.
        while !writer.is_finished() {
            sink.abort();
            thread::sleep(Duration::from_millis(5));
        }

        assert!(matches!(writer.join().unwrap(), Err(OutputError::Aborted)));
    });

    // Later writes are unaffected once space frees up.
    sink.cancel().unwrap();
    assert_eq!(sink.write(&[3u8; 4]).unwrap(), 4);
}

#[test]
fn test_left_right_routing_from_config_block() {
    let block = ConfigBlock::new()
        .with_param("name", "kitchen", 1)
        .with_param("device", "Surround", 2)
        .with_param("output_left", "3", 3)
        .with_param("output_right", "0x2", 4);
    let driver = MockDriver::new().with_device(MockDevice::new("Surround", 4));

    let mut sink = AudioSink::from_block(&block, driver).unwrap();
    sink.enable().unwrap();
    let mut format = AudioFormat::new(44100, 2, SampleFormat::S16);
    sink.open(&mut format).unwrap();

    let mut source = MockSource::new(format);
    source.generate_frames(&[vec![0.5, -0.5], vec![0.25, -0.25]]);
    sink.write_all(source.bytes()).unwrap();

    let (rendered, data) = sink.driver().pull(2).unwrap();
    assert_eq!(rendered, 2);
    assert_eq!(
        decode_raw(&data, SampleFormat::S16),
        vec![0, 0, -16383, 16383, 0, 0, -8191, 8191]
    );
}

#[test]
fn test_planar_pull_with_channel_map() {
    let config = OutputConfig::default()
        .with_routing(stream_output::ChannelRouting::Map("-1:1:0".to_string()));
    let driver = MockDriver::with_devices(vec![MockDevice::new("Three", 3)]);

    let mut sink = AudioSink::new(config, driver);
    sink.enable().unwrap();
    let mut format = AudioFormat::new(48000, 2, SampleFormat::S32);
    sink.open(&mut format).unwrap();

    let mut source = MockSource::new(format);
    source.generate_frames(&[vec![1.0, -1.0]]);
    sink.write_all(source.bytes()).unwrap();

    let (rendered, planes) = sink.driver().pull_planar(1).unwrap();
    assert_eq!(rendered, 1);
    assert_eq!(decode_raw(&planes[0], SampleFormat::S32), vec![0]);
    assert_eq!(decode_raw(&planes[1], SampleFormat::S32), vec![-i32::MAX]);
    assert_eq!(decode_raw(&planes[2], SampleFormat::S32), vec![i32::MAX]);
}

#[test]
fn test_full_lifecycle_with_drop() {
    let mut format = AudioFormat::new(48000, 1, SampleFormat::S8);
    let mut sink = open_sink(MockDriver::new(), &mut format);
    sink.write_all(&[1u8; 480]).unwrap();

    sink.close().unwrap();
    assert!(sink.write(&[1]).unwrap_err().is_state());
    sink.open(&mut format).unwrap();
    assert_eq!(sink.buffered_bytes(), 0);

    // Dropping an open sink closes and disables it.
    drop(sink);
}

#[test]
#[ignore = "requires audio hardware"]
fn test_real_playback() {
    use stream_output::driver::CpalDriver;

    let mut sink = AudioSink::new(OutputConfig::default(), CpalDriver::new());
    sink.enable().unwrap();

    let mut format = AudioFormat::new(48000, 2, SampleFormat::S16);
    sink.open(&mut format).unwrap();

    let mut source = MockSource::new(format);
    source.generate_sine(440.0, 500);
    sink.write_all(source.bytes()).unwrap();

    thread::sleep(Duration::from_millis(700));
    println!("Stats: {:?}", sink.stats());
    assert!(sink.stats().frames_rendered > 0);

    sink.close().unwrap();
    sink.disable().unwrap();
}
