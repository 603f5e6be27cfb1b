use crate::bars::MAX_BAR_LEVEL;
use crate::state::{RedrawSignal, SharedViz, VizState, lock_or_recover, sleep_cancellable};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SampleFormat};
use log::{debug, info, warn};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

/// Pause between drain passes over the pending packet queue.
pub const REFRESH_INTERVAL: Duration = Duration::from_millis(30);

/// First delay before retrying a failed stream open.
const RETRY_BASE_DELAY: Duration = Duration::from_secs(2);

/// Ceiling for the exponential reopen backoff.
const RETRY_MAX_DELAY: Duration = Duration::from_secs(30);

/// Most packets held before the oldest is discarded.
const SINK_CAPACITY: usize = 64;

/// Bounded FIFO between the stream callback and the drain loop.
///
/// The callback runs on the audio backend's thread and must not stall,
/// so the sink only ever takes a short queue lock. When the drain side
/// falls behind, the oldest packet is dropped and counted.
pub struct SampleSink {
    packets: Mutex<VecDeque<Vec<f32>>>,
    dropped: AtomicU64,
}

impl SampleSink {
    pub fn new() -> Self {
        Self {
            packets: Mutex::new(VecDeque::with_capacity(SINK_CAPACITY)),
            dropped: AtomicU64::new(0),
        }
    }

    pub fn push(&self, packet: Vec<f32>) {
        let mut packets = lock_or_recover(&self.packets);
        if packets.len() == SINK_CAPACITY {
            packets.pop_front();
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
        packets.push_back(packet);
    }

    pub fn pop(&self) -> Option<Vec<f32>> {
        lock_or_recover(&self.packets).pop_front()
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    fn clear(&self) {
        lock_or_recover(&self.packets).clear();
    }
}

/// Mean absolute sample value over one interleaved packet: the scalar
/// loudness the bar update keys off. Channel count is irrelevant since
/// the mean runs over every interleaved sample.
pub fn mean_abs(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    samples.iter().map(|s| s.abs()).sum::<f32>() / samples.len() as f32
}

/// Maps instantaneous loudness to the `0..=20` bar activity level.
pub fn bar_level(total: f32, sensitivity: f32) -> i32 {
    let volume = (total * 100.0 * sensitivity) as i32;
    (volume / 2).clamp(0, MAX_BAR_LEVEL)
}

/// Keeps the cpal stream alive; dropping it releases the OS capture
/// handles.
struct LoopbackStream {
    _stream: cpal::Stream,
}

impl LoopbackStream {
    fn new(
        device: &cpal::Device,
        config: &cpal::StreamConfig,
        sample_format: SampleFormat,
        sink: Arc<SampleSink>,
        broken: Arc<AtomicBool>,
    ) -> Result<Self, anyhow::Error> {
        let stream = match sample_format {
            SampleFormat::F32 => build_stream::<f32>(device, config, sink, broken)?,
            SampleFormat::I16 => build_stream::<i16>(device, config, sink, broken)?,
            SampleFormat::U16 => build_stream::<u16>(device, config, sink, broken)?,
            other => return Err(anyhow::anyhow!("unsupported sample format {other:?}")),
        };

        stream.play()?;

        Ok(Self { _stream: stream })
    }
}

/// Opens loopback capture on the default render endpoint.
///
/// Building an *input* stream on the output device captures the mix the
/// device is currently playing (WASAPI loopback semantics).
fn open_loopback(
    sink: Arc<SampleSink>,
    broken: Arc<AtomicBool>,
) -> Result<LoopbackStream, anyhow::Error> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| anyhow::anyhow!("no default output device"))?;
    let name = device.name().unwrap_or_else(|_| "<unnamed>".into());

    let supported = device.default_output_config()?;
    let sample_format = supported.sample_format();
    let stream_config: cpal::StreamConfig = supported.into();
    info!(
        "Opening loopback capture on {name}: {} ch @ {} Hz, {sample_format:?}",
        stream_config.channels, stream_config.sample_rate.0
    );

    LoopbackStream::new(&device, &stream_config, sample_format, sink, broken)
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    sink: Arc<SampleSink>,
    broken: Arc<AtomicBool>,
) -> Result<cpal::Stream, anyhow::Error>
where
    T: Sample + FromSample<f32> + cpal::SizedSample,
    f32: FromSample<T>,
{
    let stream = device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            let samples: Vec<f32> = data.iter().map(|&s| s.to_sample()).collect();
            sink.push(samples);
        },
        move |err| {
            warn!("Capture stream error: {err}");
            broken.store(true, Ordering::Relaxed);
        },
        None,
    )?;

    Ok(stream)
}

/// Folds one packet into the bar heights. Sensitivity and bar count are
/// read under the same lock the heights are written under.
fn ingest_packet(state: &mut VizState, packet: &[f32]) {
    let total = mean_abs(packet);
    let level = bar_level(total, state.config.sensitivity);
    let bar_count = state.config.bar_count.max(0) as usize;
    state.bars.advance(bar_count, level);
}

/// Drains pending packets every refresh interval until the stream
/// breaks or shutdown is requested. Requests a redraw only after a pass
/// that actually consumed audio.
fn drain_until_broken(
    shared: &SharedViz,
    redraw: &RedrawSignal,
    shutdown: &AtomicBool,
    sink: &SampleSink,
    broken: &AtomicBool,
) {
    while !shutdown.load(Ordering::Relaxed) && !broken.load(Ordering::Relaxed) {
        let mut updated = false;
        while let Some(packet) = sink.pop() {
            ingest_packet(&mut lock_or_recover(shared), &packet);
            updated = true;
        }
        if updated {
            redraw.request();
        }
        thread::sleep(REFRESH_INTERVAL);
    }
}

/// Capture thread body: owns the stream, feeds the drain loop, and
/// reopens the stream with exponential backoff when it fails.
///
/// Setup failure never escalates past this thread; the overlay keeps
/// painting floor-level bars until a stream comes up.
pub fn run(shared: SharedViz, redraw: Arc<RedrawSignal>, shutdown: Arc<AtomicBool>) {
    debug!("Capture thread started");
    let sink = Arc::new(SampleSink::new());
    let mut retry_delay = RETRY_BASE_DELAY;

    while !shutdown.load(Ordering::Relaxed) {
        let broken = Arc::new(AtomicBool::new(false));
        match open_loopback(sink.clone(), broken.clone()) {
            Ok(stream) => {
                retry_delay = RETRY_BASE_DELAY;
                drain_until_broken(&shared, &redraw, &shutdown, &sink, &broken);
                drop(stream);
                sink.clear();
                if !shutdown.load(Ordering::Relaxed) {
                    info!("Capture stream closed by the backend, reopening in {RETRY_BASE_DELAY:?}");
                    sleep_cancellable(&shutdown, RETRY_BASE_DELAY);
                }
            }
            Err(err) => {
                warn!("Loopback capture unavailable: {err:#}, retrying in {retry_delay:?}");
                sleep_cancellable(&shutdown, retry_delay);
                retry_delay = (retry_delay * 2).min(RETRY_MAX_DELAY);
            }
        }
    }

    if sink.dropped() > 0 {
        debug!("Dropped {} capture packets under backpressure", sink.dropped());
    }
    debug!("Capture thread shutting down");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bars::BarField;
    use crate::config::VizConfig;

    #[test]
    fn mean_abs_averages_over_every_interleaved_sample() {
        // two frames of two channels
        let packet = [0.5_f32, -0.5, 1.0, 0.0];
        assert_eq!(mean_abs(&packet), 0.5);
    }

    #[test]
    fn mean_abs_of_nothing_is_zero() {
        assert_eq!(mean_abs(&[]), 0.0);
    }

    #[test]
    fn bar_level_scales_then_halves() {
        // 0.125 * 100 * 2.0 = 25, halved to 12
        assert_eq!(bar_level(0.125, 2.0), 12);
    }

    #[test]
    fn bar_level_is_capped_at_twenty() {
        assert_eq!(bar_level(1.0, 200.0), MAX_BAR_LEVEL);
    }

    #[test]
    fn silence_is_level_zero() {
        assert_eq!(bar_level(0.0, 200.0), 0);
    }

    #[test]
    fn sink_hands_packets_back_in_arrival_order() {
        let sink = SampleSink::new();
        sink.push(vec![0.1]);
        sink.push(vec![0.2]);
        assert_eq!(sink.pop(), Some(vec![0.1]));
        assert_eq!(sink.pop(), Some(vec![0.2]));
        assert_eq!(sink.pop(), None);
    }

    #[test]
    fn sink_drops_the_oldest_packet_when_full() {
        let sink = SampleSink::new();
        for i in 0..(SINK_CAPACITY + 3) {
            sink.push(vec![i as f32]);
        }
        assert_eq!(sink.dropped(), 3);
        assert_eq!(sink.pop(), Some(vec![3.0]));
    }

    #[test]
    fn loud_packets_lift_bars_and_silence_settles_them() {
        let mut state = VizState::new(VizConfig::default());
        state.bars = BarField::with_seed(5);

        ingest_packet(&mut state, &[1.0, -1.0, 1.0, -1.0]);
        assert_eq!(state.bars.heights().len(), 80);

        // the default 80-bar, sensitivity-200 setup: 50 silent buffers
        // bring every bar back down to the floor
        for _ in 0..50 {
            ingest_packet(&mut state, &[0.0; 128]);
        }
        assert!(state.bars.heights().iter().all(|&h| h == 1));
    }
}
