//! End-to-end streaming scenarios over the simulated transmitter

use spdif_codec::decode::channel_status_from_block;
use spdif_codec::{
    decode_frame, DecodedFrame, EncodedFrame, Preamble, SampleFormat, SampleRate, WordLength, BLOCK_FRAMES, FRAME_BYTES,
};
use spdif_core::{Config, ConfigError, SpdifError};
use spdif_stream::{FillSource, Half, PcmStream, SimulatedLink, SimulatedTransmitter, SpdifDevice, StreamParams, Trigger};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn init_logging() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn device(buffer_frames: usize) -> (SpdifDevice<SimulatedTransmitter>, SimulatedLink) {
    init_logging();
    let mut config = Config::default();
    config.output.buffer_frames = buffer_frames;
    let (tx, link) = SimulatedTransmitter::new();
    (SpdifDevice::new(&config, tx).unwrap(), link)
}

fn counting_stream(ring_bytes: usize) -> (PcmStream, Arc<AtomicUsize>) {
    let elapsed = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&elapsed);
    let stream = PcmStream::new(ring_bytes, move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    (stream, elapsed)
}

/// Let the transmitter consume one segment, returning what went out on the
/// line before the device refilled it.
fn drain_segment(dev: &mut SpdifDevice<SimulatedTransmitter>, link: &SimulatedLink) -> Vec<EncodedFrame> {
    let completion = link.complete_segment().expect("transfer running");
    let start = completion.offset / FRAME_BYTES;
    let half = if start == 0 { Half::First } else { Half::Second };
    let sent = dev.buffer().half(half).to_vec();
    dev.on_segment_consumed(completion.residue);
    sent
}

fn decode_all(frames: &[EncodedFrame]) -> Vec<DecodedFrame> {
    frames.iter().map(|frame| decode_frame(frame).unwrap()).collect()
}

#[test]
fn test_end_to_end_48k_s16() {
    // 192 frame stream buffer: two completions consume one 192 frame period
    let (mut dev, link) = device(192);
    let (mut stream, elapsed) = counting_stream(8 * 192 * 4);

    for (i, frame) in stream.ring_mut().chunks_exact_mut(4).enumerate() {
        let (left, right): (i16, i16) = if i % 2 == 0 { (32767, -32768) } else { (-32768, 32767) };
        frame[..2].copy_from_slice(&left.to_le_bytes());
        frame[2..].copy_from_slice(&right.to_le_bytes());
    }

    dev.open(stream).unwrap();
    dev.prepare(&StreamParams::new(SampleFormat::S16Le, 48_000, 8 * 192, 192)).unwrap();
    dev.trigger(Trigger::Start).unwrap();

    let first = link.complete_segment().unwrap();
    assert_eq!(dev.on_segment_consumed(first.residue).source, FillSource::Live);
    let second = link.complete_segment().unwrap();
    assert_eq!(dev.on_segment_consumed(second.residue).source, FillSource::Live);

    assert_eq!(elapsed.load(Ordering::SeqCst), 1);
    assert_eq!(dev.pointer(), 192);

    let mut line = decode_all(dev.buffer().half(Half::First));
    line.extend(decode_all(dev.buffer().half(Half::Second)));

    for (i, frame) in line.iter().enumerate() {
        let (left, right) = if i % 2 == 0 { (32767, -32768) } else { (-32768, 32767) };
        assert_eq!(frame.left.signed_sample(), left << 8, "frame {}", i);
        assert_eq!(frame.right.signed_sample(), right << 8, "frame {}", i);
        assert_eq!(frame.right.preamble, Preamble::W);
    }
    // the refill continued the block opened by the prefill
    assert_eq!(line[0].left.preamble, Preamble::B);
    assert!(line[1..].iter().all(|frame| frame.left.preamble == Preamble::M));

    let status = channel_status_from_block(&line).unwrap();
    assert_eq!(status.sample_rate(), Some(SampleRate::Hz48000));
}

#[test]
fn test_silence_without_start() {
    let (mut dev, link) = device(384);
    let (stream, elapsed) = counting_stream(8 * 192 * 4);
    dev.open(stream).unwrap();
    dev.prepare(&StreamParams::new(SampleFormat::S16Le, 44_100, 8 * 192, 192)).unwrap();

    let mut line = Vec::new();
    for _ in 0..10 {
        line.extend(drain_segment(&mut dev, &link));
    }

    let decoded = decode_all(&line);
    assert!(decoded.iter().all(|f| f.left.sample == 0 && f.right.sample == 0));
    for (i, frame) in decoded.iter().enumerate() {
        let expected = if i % BLOCK_FRAMES == 0 { Preamble::B } else { Preamble::M };
        assert_eq!(frame.left.preamble, expected, "frame {}", i);
    }

    assert_eq!(elapsed.load(Ordering::SeqCst), 0);
    assert_eq!(dev.idle_counter().count(), 11);
    assert_eq!(dev.pointer(), 0);

    let status = channel_status_from_block(&decoded).unwrap();
    assert_eq!(status.sample_rate(), Some(SampleRate::Hz44100));
}

#[test]
fn test_period_every_second_refill() {
    let (mut dev, link) = device(192);
    let (stream, elapsed) = counting_stream(8 * 192 * 4);
    dev.open(stream).unwrap();
    dev.prepare(&StreamParams::new(SampleFormat::S16Le, 48_000, 8 * 192, 192)).unwrap();
    dev.trigger(Trigger::Start).unwrap();

    for refill in 1..=24 {
        let completion = link.complete_segment().unwrap();
        let outcome = dev.on_segment_consumed(completion.residue);
        let expected = usize::from(refill % 2 == 0);
        assert_eq!(outcome.periods_elapsed, expected, "refill {}", refill);
        assert_eq!(elapsed.load(Ordering::SeqCst), refill / 2);
    }

    // twelve periods wrap the eight period ring once
    assert_eq!(dev.pointer(), (12 * 192) % (8 * 192));
}

#[test]
fn test_start_reports_silenced_cycles() {
    let (mut dev, link) = device(384);
    let (stream, _) = counting_stream(8 * 192 * 4);
    dev.open(stream).unwrap();
    dev.prepare(&StreamParams::new(SampleFormat::S16Le, 48_000, 8 * 192, 192)).unwrap();

    for _ in 0..4 {
        drain_segment(&mut dev, &link);
    }
    assert_eq!(dev.idle_counter().count(), 5);

    dev.trigger(Trigger::Start).unwrap();
    assert!(dev.idle_counter().is_live());
    assert_eq!(drain_segment(&mut dev, &link).len(), 192);
    assert_eq!(dev.refill().stats().silent_refills, 4);
}

#[test]
fn test_unsupported_rates_rejected() {
    let (mut dev, link) = device(384);
    let (stream, _) = counting_stream(8 * 192 * 4);
    dev.open(stream).unwrap();

    for rate in [8_000, 22_050, 32_000, 64_000, 384_000] {
        let params = StreamParams::new(SampleFormat::S16Le, rate, 8 * 192, 192);
        match dev.prepare(&params) {
            Err(SpdifError::Setup(ConfigError::UnsupportedRate(r))) => assert_eq!(r, rate),
            other => panic!("rate {} accepted: {:?}", rate, other),
        }
    }

    assert!(!dev.is_running());
    assert_eq!(link.submissions(), 0);
    assert!(dev.stream().unwrap().runtime().is_none());
}

#[test]
fn test_every_format_reaches_the_line() {
    // same 24-bit value from every container layout
    let value: i32 = 0x12_3456;
    let cases: [(SampleFormat, Vec<u8>); 6] = [
        (SampleFormat::S24Le, value.to_le_bytes().to_vec()),
        (SampleFormat::S24Packed, value.to_le_bytes()[..3].to_vec()),
        (SampleFormat::S20Le, value.to_le_bytes().to_vec()),
        (SampleFormat::S20Packed, value.to_le_bytes()[..3].to_vec()),
        (SampleFormat::S32Le, (value << 8).to_le_bytes().to_vec()),
        (SampleFormat::S16Le, ((value >> 8) as i16).to_le_bytes().to_vec()),
    ];

    for (format, sample) in cases {
        let (mut dev, link) = device(384);
        let period = 192 * 24 / format.frame_bytes();
        let period = period - period % 192;
        let (mut stream, _) = counting_stream(8 * period * format.frame_bytes());
        for frame in stream.ring_mut().chunks_exact_mut(format.frame_bytes()) {
            frame[..sample.len()].copy_from_slice(&sample);
            frame[sample.len()..].copy_from_slice(&sample);
        }

        dev.open(stream).unwrap();
        dev.prepare(&StreamParams::new(format, 48_000, 8 * period, period)).unwrap();
        dev.trigger(Trigger::Start).unwrap();
        drain_segment(&mut dev, &link);

        let (expected, word_length) = match format.bit_depth() {
            16 => (value & !0xFF, WordLength::Bits16),
            20 => (value & !0xF, WordLength::Bits20),
            _ => (value, WordLength::Bits24),
        };
        let line = decode_all(dev.buffer().half(Half::First));
        for frame in &line {
            assert_eq!(frame.left.signed_sample(), expected, "{}", format);
            assert_eq!(frame.right.signed_sample(), expected, "{}", format);
        }

        let status = channel_status_from_block(&line).unwrap();
        assert_eq!(status.word_length(), Some(word_length), "{}", format);
        assert_eq!(status.bytes()[4], word_length.code(), "{}", format);
    }
}

#[test]
fn test_twenty_bit_word_length_code() {
    let (mut dev, link) = device(384);
    let (stream, _) = counting_stream(8 * 192 * 8);
    dev.open(stream).unwrap();
    dev.prepare(&StreamParams::new(SampleFormat::S20Le, 48_000, 8 * 192, 192)).unwrap();
    drain_segment(&mut dev, &link);

    let status = channel_status_from_block(&decode_all(dev.buffer().half(Half::First))).unwrap();
    assert_eq!(status.bytes()[4], 0x0A);
    assert_eq!(status.sample_rate(), Some(SampleRate::Hz48000));
}

#[test]
fn test_prepare_while_running_keeps_block_spacing() {
    // 96 frame halves: a block spans two refills
    let (mut dev, link) = device(192);
    let (stream, _) = counting_stream(8 * 192 * 4);
    dev.open(stream).unwrap();
    dev.prepare(&StreamParams::new(SampleFormat::S16Le, 48_000, 8 * 192, 192)).unwrap();

    let mut line = drain_segment(&mut dev, &link);
    dev.prepare(&StreamParams::new(SampleFormat::S16Le, 44_100, 8 * 192, 192)).unwrap();
    assert_eq!(link.submissions(), 1);
    for _ in 0..6 {
        line.extend(drain_segment(&mut dev, &link));
    }

    let line = decode_all(&line);
    let starts: Vec<usize> = line
        .iter()
        .enumerate()
        .filter(|(_, frame)| frame.left.preamble == Preamble::B)
        .map(|(i, _)| i)
        .collect();
    assert_eq!(starts, vec![0, 192, 384, 576]);

    // the first block opened after the change carries only the new status
    let status = channel_status_from_block(&line[384..]).unwrap();
    assert_eq!(status.sample_rate(), Some(SampleRate::Hz44100));
}

#[test]
fn test_submission_retry_after_exhaustion() {
    let (mut dev, link) = device(384);
    let (stream, _) = counting_stream(8 * 192 * 4);
    dev.open(stream).unwrap();
    let params = StreamParams::new(SampleFormat::S16Le, 48_000, 8 * 192, 192);

    link.fail_next_submissions(2);
    assert!(dev.prepare(&params).is_err());
    assert!(dev.prepare(&params).is_err());
    assert!(link.complete_segment().is_none());

    dev.prepare(&params).unwrap();
    dev.trigger(Trigger::Start).unwrap();
    assert_eq!(link.submissions(), 1);
    assert_eq!(drain_segment(&mut dev, &link).len(), 192);
}
