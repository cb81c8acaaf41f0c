use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SampleFormat, SizedSample};
use ringbuf::traits::{Consumer as _, Observer as _, Producer as _, Split as _};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use tracing::{error, info, warn};

use crate::audio::graph::{AudioGraph, CHANNELS, DEFAULT_SAMPLE_RATE};
use crate::types::error::{PlayerError, Result};
use crate::types::modes::VideoMode;

/// Which decoder is feeding samples into the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Feed {
    #[default]
    Primary,
    External,
}

/// The processing graph plus the ring the output device drains.
/// Samples from the inactive feed are discarded, which is how the video's
/// own audio gets muted while an external track plays.
pub struct AudioEngine {
    graph: AudioGraph,
    sink: Option<HeapProd<f32>>,
    active: Feed,
}

pub type SharedEngine = Arc<Mutex<AudioEngine>>;

/// Locks the engine, recovering the data if a streaming thread panicked.
pub fn lock(engine: &SharedEngine) -> MutexGuard<'_, AudioEngine> {
    engine.lock().unwrap_or_else(PoisonError::into_inner)
}

impl AudioEngine {
    pub fn new(sample_rate: u32, width_cap: f32) -> Self {
        Self {
            graph: AudioGraph::new(sample_rate, width_cap),
            sink: None,
            active: Feed::Primary,
        }
    }

    /// An engine with no device behind it. Processing still runs; samples
    /// are dropped.
    pub fn detached(width_cap: f32) -> SharedEngine {
        Arc::new(Mutex::new(Self::new(DEFAULT_SAMPLE_RATE, width_cap)))
    }

    pub fn attach_sink(&mut self, sink: HeapProd<f32>) {
        self.sink = Some(sink);
    }

    pub fn sample_rate(&self) -> u32 {
        self.graph.sample_rate()
    }

    pub fn graph(&self) -> &AudioGraph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut AudioGraph {
        &mut self.graph
    }

    pub fn active_feed(&self) -> Feed {
        self.active
    }

    pub fn set_active_feed(&mut self, feed: Feed) {
        self.active = feed;
    }

    pub fn set_mode(&mut self, mode: VideoMode) {
        self.graph.connect_branch(mode);
    }

    /// Runs interleaved stereo samples from `feed` through the graph and
    /// queues them for the device. Returns the number of samples queued.
    pub fn push(&mut self, feed: Feed, samples: &mut [f32]) -> usize {
        if feed != self.active {
            return 0;
        }
        self.graph.process(samples);
        let Some(sink) = self.sink.as_mut() else {
            return 0;
        };
        // Whole frames only, so channels never swap.
        let room = sink.vacant_len() / CHANNELS * CHANNELS;
        let n = room.min(samples.len() / CHANNELS * CHANNELS);
        sink.push_slice(&samples[..n])
    }
}

/// Keeps the device stream alive. Dropping it stops playback.
pub struct AudioOutput {
    _stream: cpal::Stream,
    engine: SharedEngine,
    sample_rate: u32,
}

impl AudioOutput {
    pub fn open(width_cap: f32) -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| PlayerError::AudioDevice("no output device".into()))?;
        let supported = device
            .default_output_config()
            .map_err(|e| PlayerError::AudioDevice(e.to_string()))?;
        let sample_rate = supported.sample_rate().0;
        let config: cpal::StreamConfig = supported.clone().into();

        // Half a second of stereo audio.
        let rb = HeapRb::<f32>::new(sample_rate as usize * CHANNELS / 2);
        let (prod, cons) = rb.split();

        let stream = match supported.sample_format() {
            SampleFormat::F32 => build_stream::<f32>(&device, &config, cons),
            SampleFormat::I16 => build_stream::<i16>(&device, &config, cons),
            SampleFormat::U16 => build_stream::<u16>(&device, &config, cons),
            fmt => {
                return Err(PlayerError::AudioDevice(format!(
                    "unsupported sample format: {fmt:?}"
                )));
            }
        }
        .map_err(|e| PlayerError::AudioDevice(e.to_string()))?;
        stream
            .play()
            .map_err(|e| PlayerError::AudioDevice(e.to_string()))?;

        let mut engine = AudioEngine::new(sample_rate, width_cap);
        engine.attach_sink(prod);
        info!(
            device = device.name().unwrap_or_else(|_| "<unknown>".into()),
            sample_rate,
            channels = config.channels,
            "audio output started"
        );

        Ok(Self {
            _stream: stream,
            engine: Arc::new(Mutex::new(engine)),
            sample_rate,
        })
    }

    pub fn engine(&self) -> SharedEngine {
        Arc::clone(&self.engine)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut cons: HeapCons<f32>,
) -> std::result::Result<cpal::Stream, cpal::BuildStreamError>
where
    T: SizedSample + FromSample<f32>,
{
    let channels = config.channels as usize;
    let mut scratch: Vec<f32> = Vec::new();
    let mut underruns = 0u64;
    device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            let frames = data.len() / channels;
            scratch.resize(frames * CHANNELS, 0.0);
            let got = cons.pop_slice(&mut scratch);
            if got < scratch.len() {
                scratch[got..].fill(0.0);
                underruns += 1;
                if underruns % 500 == 1 {
                    warn!(underruns, "audio output underrun");
                }
            }
            for (i, out) in data.chunks_exact_mut(channels).enumerate() {
                let (l, r) = (scratch[i * CHANNELS], scratch[i * CHANNELS + 1]);
                for (ch, sample) in out.iter_mut().enumerate() {
                    let v = match (channels, ch) {
                        (1, _) => 0.5 * (l + r),
                        (_, 0) => l,
                        (_, 1) => r,
                        _ => 0.0,
                    };
                    *sample = T::from_sample(v);
                }
            }
        },
        |err| error!(%err, "audio output stream error"),
        None,
    )
}
