//! Audio playback
//!
//! `AudioSink` is what the receive loop writes frames into. The cpal-backed
//! sink keeps its stream on a dedicated thread (cpal streams are not `Send`
//! on every platform) and is fed through a lock-free [`SampleRing`].

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{FromSample, Sample, SampleFormat, SizedSample};
use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::audio::buffer::{SampleRing, SharedSampleRing};
use crate::audio::device::{resolve_output_device, OutputDevice};
use crate::config::StreamConfig;
use crate::error::{AudioError, PlaybackError};

/// Destination for decoded, gain-scaled frames
pub trait AudioSink: Send {
    /// Queue one frame of mono samples for playback
    fn write(&mut self, samples: &[i16]) -> Result<(), PlaybackError>;

    /// Stop and release the output stream. Must be idempotent.
    fn close(&mut self);

    /// Ring statistics as (overflows, underruns)
    fn xruns(&self) -> (u64, u64) {
        (0, 0)
    }
}

/// Opens sinks for a session
pub trait OutputBackend: Send + Sync {
    fn open(&self, config: &StreamConfig) -> Result<Box<dyn AudioSink>, AudioError>;
}

/// Backend playing through the host's output devices
#[derive(Debug, Default, Clone, Copy)]
pub struct CpalBackend;

impl OutputBackend for CpalBackend {
    fn open(&self, config: &StreamConfig) -> Result<Box<dyn AudioSink>, AudioError> {
        Ok(Box::new(CpalOutput::open(config)?))
    }
}

/// Output stream running on its own thread
pub struct CpalOutput {
    ring: SharedSampleRing,
    running: Arc<AtomicBool>,
    error_rx: Receiver<PlaybackError>,
    thread_handle: Option<JoinHandle<()>>,
    device_name: String,
}

impl CpalOutput {
    /// Open the configured output device and start the stream.
    /// Returns only after the stream is playing or has failed to start.
    pub fn open(config: &StreamConfig) -> Result<Self, AudioError> {
        let device = resolve_output_device(config.output_device.as_deref())?;
        let device_name = device.name.clone();
        let stream_config = device.output_config_for(config.sample_rate)?;
        tracing::debug!(
            "Output config for {}: {:?}, {} ch",
            device_name,
            stream_config.sample_format(),
            stream_config.channels()
        );

        let ring = Arc::new(SampleRing::new(config.buffer_samples()));
        let running = Arc::new(AtomicBool::new(true));
        let (ready_tx, ready_rx) = bounded::<Result<(), AudioError>>(1);
        let (error_tx, error_rx) = bounded::<PlaybackError>(16);

        let thread_ring = ring.clone();
        let thread_running = running.clone();

        let handle = thread::Builder::new()
            .name("playback".into())
            .spawn(move || {
                run_output_thread(
                    device,
                    stream_config,
                    thread_ring,
                    thread_running,
                    ready_tx,
                    error_tx,
                )
            })
            .map_err(|e| AudioError::BuildStream(e.to_string()))?;

        let mut output = Self {
            ring,
            running,
            error_rx,
            thread_handle: Some(handle),
            device_name,
        };

        match ready_rx.recv() {
            Ok(Ok(())) => {
                tracing::info!("Output stream started on {}", output.device_name);
                Ok(output)
            }
            Ok(Err(e)) => {
                output.close();
                Err(e)
            }
            Err(_) => {
                output.close();
                Err(AudioError::BuildStream("playback thread exited during startup".into()))
            }
        }
    }
}

impl AudioSink for CpalOutput {
    fn write(&mut self, samples: &[i16]) -> Result<(), PlaybackError> {
        match self.error_rx.try_recv() {
            Ok(err) => return Err(err),
            Err(TryRecvError::Disconnected) => return Err(PlaybackError::Disconnected),
            Err(TryRecvError::Empty) => {}
        }
        if !self.running.load(Ordering::Relaxed) {
            return Err(PlaybackError::Disconnected);
        }
        self.ring.push_frame(samples);
        Ok(())
    }

    fn close(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread_handle.take() {
            if handle.join().is_err() {
                tracing::warn!("Playback thread panicked");
            }
            tracing::debug!("Output stream on {} closed", self.device_name);
        }
    }

    fn xruns(&self) -> (u64, u64) {
        (self.ring.overflow_count(), self.ring.underrun_count())
    }
}

impl Drop for CpalOutput {
    fn drop(&mut self) {
        self.close();
    }
}

fn run_output_thread(
    device: OutputDevice,
    stream_config: cpal::SupportedStreamConfig,
    ring: SharedSampleRing,
    running: Arc<AtomicBool>,
    ready_tx: Sender<Result<(), AudioError>>,
    error_tx: Sender<PlaybackError>,
) {
    let stream = match build_stream(device, stream_config, ring, error_tx) {
        Ok(stream) => stream,
        Err(e) => {
            let _ = ready_tx.send(Err(e));
            return;
        }
    };

    if let Err(e) = stream.play() {
        let _ = ready_tx.send(Err(AudioError::PlayStream(e.to_string())));
        return;
    }
    let _ = ready_tx.send(Ok(()));

    // Keep the stream alive while running
    while running.load(Ordering::Relaxed) {
        thread::sleep(Duration::from_millis(10));
    }

    if let Err(e) = stream.pause() {
        tracing::debug!("Failed to pause output stream: {}", e);
    }
    // Stream is dropped here, releasing the device
}

fn build_stream(
    device: OutputDevice,
    stream_config: cpal::SupportedStreamConfig,
    ring: SharedSampleRing,
    error_tx: Sender<PlaybackError>,
) -> Result<cpal::Stream, AudioError> {
    let sample_format = stream_config.sample_format();

    // The mono stream is duplicated across the device's channels
    let config = cpal::StreamConfig {
        channels: stream_config.channels(),
        sample_rate: stream_config.sample_rate(),
        buffer_size: cpal::BufferSize::Default,
    };

    let device = device.into_inner();
    match sample_format {
        SampleFormat::F32 => build_typed_stream::<f32>(&device, &config, ring, error_tx),
        SampleFormat::I16 => build_typed_stream::<i16>(&device, &config, ring, error_tx),
        SampleFormat::U16 => build_typed_stream::<u16>(&device, &config, ring, error_tx),
        SampleFormat::I32 => build_typed_stream::<i32>(&device, &config, ring, error_tx),
        other => Err(AudioError::UnsupportedFormat(format!("{:?}", other))),
    }
}

fn build_typed_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    ring: SharedSampleRing,
    error_tx: Sender<PlaybackError>,
) -> Result<cpal::Stream, AudioError>
where
    T: SizedSample + FromSample<i16>,
{
    let channels = config.channels.max(1) as usize;

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                fill_output(data, channels, &ring);
            },
            move |err| {
                tracing::error!("Output stream error: {}", err);
                let _ = error_tx.try_send(PlaybackError::Stream(err.to_string()));
            },
            None,
        )
        .map_err(|e| AudioError::BuildStream(e.to_string()))
}

/// Fill one interleaved callback buffer from the ring, silence when it runs dry
fn fill_output<T>(data: &mut [T], channels: usize, ring: &SampleRing)
where
    T: Sample + FromSample<i16>,
{
    let mut starved = false;
    for frame in data.chunks_mut(channels) {
        let sample = match ring.pop() {
            Some(sample) => sample,
            None => {
                starved = true;
                0
            }
        };
        frame.fill(T::from_sample(sample));
    }
    if starved {
        ring.note_underrun();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_output_duplicates_mono_across_channels() {
        let ring = SampleRing::new(16);
        ring.push_frame(&[100, -100]);
        let mut out = [0i16; 4];
        fill_output(&mut out, 2, &ring);
        assert_eq!(out, [100, 100, -100, -100]);
        assert_eq!(ring.underrun_count(), 0);
    }

    #[test]
    fn test_fill_output_pads_with_silence() {
        let ring = SampleRing::new(16);
        ring.push_frame(&[i16::MAX]);
        let mut out = [1.0f32; 3];
        fill_output(&mut out, 1, &ring);
        assert!(out[0] > 0.99);
        assert_eq!(out[1], 0.0);
        assert_eq!(out[2], 0.0);
        assert_eq!(ring.underrun_count(), 1);
    }
}
