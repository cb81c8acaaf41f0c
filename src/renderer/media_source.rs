use std::sync::{Arc, Mutex, PoisonError};

use gst::prelude::*;
use gstreamer as gst;
use gstreamer_app as gst_app;
use gstreamer_pbutils as gst_pbutils;
use gstreamer_video as gst_video;
use gstreamer_video::VideoFrameExt;
use tracing::{debug, info, warn};

use crate::audio::output::{Feed, SharedEngine, lock};
use crate::audio::tracks::ExternalClip;
use crate::renderer::frame_bridge::DecodedFrame;
use crate::types::error::{PlayerError, Result};
use crate::types::track::AudioTrackInfo;

/// Notifications from the media layer, drained once per render tick.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    MetadataReady {
        width: u32,
        height: u32,
        duration: Option<f64>,
    },
    /// A new decoded frame is waiting.
    FrameTick,
    /// The set of embedded audio streams changed.
    TracksChanged,
    Error {
        reason: String,
    },
    /// End of stream. The source has already rewound to the start.
    TrackEnded,
}

/// The decoder behind one loaded video.
pub trait VideoSource {
    fn play(&mut self) -> Result<()>;
    fn pause(&mut self) -> Result<()>;
    fn seek(&mut self, seconds: f64) -> Result<()>;
    fn set_rate(&mut self, rate: f64) -> Result<()>;
    fn position(&self) -> Option<f64>;
    fn duration(&self) -> Option<f64>;
    fn poll_events(&mut self) -> Vec<PlayerEvent>;
    fn take_frame(&mut self) -> Option<DecodedFrame>;
    fn audio_tracks(&self) -> Vec<AudioTrackInfo>;
    fn select_audio_stream(&mut self, index: usize) -> Result<()>;
}

/// Creates decoders for URIs.
pub trait SourceOpener {
    fn open_video(&mut self, uri: &str) -> Result<Box<dyn VideoSource>>;
    fn open_external_audio(&mut self, uri: &str) -> Result<Box<dyn ExternalClip>>;
}

fn seconds(t: gst::ClockTime) -> f64 {
    t.nseconds() as f64 / 1_000_000_000.0
}

fn clock_time(seconds: f64) -> gst::ClockTime {
    gst::ClockTime::from_nseconds((seconds.max(0.0) * 1_000_000_000.0) as u64)
}

fn audio_caps(sample_rate: u32) -> gst::Caps {
    gst::Caps::builder("audio/x-raw")
        .field("format", "F32LE")
        .field("layout", "interleaved")
        .field("channels", 2i32)
        .field("rate", sample_rate as i32)
        .build()
}

/// Forwards interleaved F32LE buffers from `sink` into the audio engine.
fn feed_engine(sink: &gst_app::AppSink, engine: SharedEngine, feed: Feed) {
    sink.set_callbacks(
        gst_app::AppSinkCallbacks::builder()
            .new_sample(move |sink| {
                let sample = sink.pull_sample().map_err(|_| gst::FlowError::Eos)?;
                let buffer = sample.buffer().ok_or(gst::FlowError::Error)?;
                let map = buffer.map_readable().map_err(|_| gst::FlowError::Error)?;
                let mut samples: Vec<f32> = map
                    .as_slice()
                    .chunks_exact(4)
                    .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                    .collect();
                lock(&engine).push(feed, &mut samples);
                Ok(gst::FlowSuccess::Ok)
            })
            .build(),
    );
}

/// Copies the first plane of an RGBA frame, dropping row padding.
fn copy_rgba(sample: &gst::Sample) -> std::result::Result<DecodedFrame, gst::FlowError> {
    let buffer = sample.buffer().ok_or(gst::FlowError::Error)?;
    let caps = sample.caps().ok_or(gst::FlowError::Error)?;
    let info = gst_video::VideoInfo::from_caps(caps).map_err(|_| gst::FlowError::Error)?;
    let frame = gst_video::VideoFrameRef::from_buffer_ref_readable(buffer, &info)
        .map_err(|_| gst::FlowError::Error)?;

    let (width, height) = (info.width(), info.height());
    let stride = frame.plane_stride()[0] as usize;
    let data = frame.plane_data(0).map_err(|_| gst::FlowError::Error)?;
    let row = width as usize * 4;
    let mut pixels = Vec::with_capacity(row * height as usize);
    for y in 0..height as usize {
        let start = y * stride;
        pixels.extend_from_slice(&data[start..start + row]);
    }
    Ok(DecodedFrame {
        width,
        height,
        pixels,
    })
}

#[derive(Default)]
struct FrameSlot {
    latest: Option<DecodedFrame>,
    fresh: bool,
}

/// `playbin` with an RGBA video appsink and an audio bin that feeds the
/// shared engine.
pub struct GstVideoSource {
    playbin: gst::Element,
    bus: gst::Bus,
    slot: Arc<Mutex<FrameSlot>>,
    reported_size: Option<(u32, u32)>,
    audio_count: i32,
    rate: f64,
}

impl GstVideoSource {
    pub fn open(uri: &str, engine: SharedEngine) -> Result<Self> {
        let playbin = gst::ElementFactory::make("playbin")
            .name("orbview-player")
            .build()?;
        playbin.set_property("uri", uri);

        let video_sink = gst_app::AppSink::builder()
            .caps(
                &gst_video::VideoCapsBuilder::new()
                    .format(gst_video::VideoFormat::Rgba)
                    .build(),
            )
            .max_buffers(1)
            .drop(true)
            .build();
        let slot = Arc::new(Mutex::new(FrameSlot::default()));
        let frames = Arc::clone(&slot);
        video_sink.set_callbacks(
            gst_app::AppSinkCallbacks::builder()
                .new_sample(move |sink| {
                    let sample = sink.pull_sample().map_err(|_| gst::FlowError::Eos)?;
                    let frame = copy_rgba(&sample)?;
                    let mut slot = frames.lock().unwrap_or_else(PoisonError::into_inner);
                    slot.latest = Some(frame);
                    slot.fresh = true;
                    Ok(gst::FlowSuccess::Ok)
                })
                .build(),
        );
        playbin.set_property("video-sink", &video_sink);

        let sample_rate = lock(&engine).sample_rate();
        let audio_bin = build_audio_bin(engine, sample_rate)?;
        playbin.set_property("audio-sink", &audio_bin);

        let bus = playbin
            .bus()
            .ok_or_else(|| PlayerError::Pipeline("playbin has no bus".into()))?;

        if let Err(err) = playbin.set_state(gst::State::Paused) {
            let _ = playbin.set_state(gst::State::Null);
            return Err(err.into());
        }
        info!(%uri, "video pipeline created");

        Ok(Self {
            playbin,
            bus,
            slot,
            reported_size: None,
            audio_count: 0,
            rate: 1.0,
        })
    }

    fn set_state(&self, state: gst::State) -> Result<()> {
        self.playbin.set_state(state)?;
        Ok(())
    }
}

/// audioconvert ! audioresample ! appsink, exposed through a ghost pad.
fn build_audio_bin(engine: SharedEngine, sample_rate: u32) -> Result<gst::Bin> {
    let bin = gst::Bin::builder().name("orbview-audio").build();
    let convert = gst::ElementFactory::make("audioconvert").build()?;
    let resample = gst::ElementFactory::make("audioresample").build()?;
    let sink = gst_app::AppSink::builder()
        .caps(&audio_caps(sample_rate))
        .build();
    feed_engine(&sink, engine, Feed::Primary);

    bin.add_many([&convert, &resample, sink.upcast_ref()])?;
    gst::Element::link_many([&convert, &resample, sink.upcast_ref()])?;

    let target = convert
        .static_pad("sink")
        .ok_or_else(|| PlayerError::Pipeline("audioconvert has no sink pad".into()))?;
    let ghost = gst::GhostPad::with_target(&target)?;
    ghost.set_active(true)?;
    bin.add_pad(&ghost)?;
    Ok(bin)
}

impl VideoSource for GstVideoSource {
    fn play(&mut self) -> Result<()> {
        self.set_state(gst::State::Playing)
    }

    fn pause(&mut self) -> Result<()> {
        self.set_state(gst::State::Paused)
    }

    fn seek(&mut self, seconds: f64) -> Result<()> {
        seek_at_rate(&self.playbin, self.rate, clock_time(seconds))?;
        Ok(())
    }

    fn set_rate(&mut self, rate: f64) -> Result<()> {
        let position = self
            .playbin
            .query_position::<gst::ClockTime>()
            .unwrap_or(gst::ClockTime::ZERO);
        seek_at_rate(&self.playbin, rate, position)?;
        self.rate = rate;
        debug!(rate, "playback rate changed");
        Ok(())
    }

    fn position(&self) -> Option<f64> {
        self.playbin.query_position::<gst::ClockTime>().map(seconds)
    }

    fn duration(&self) -> Option<f64> {
        self.playbin.query_duration::<gst::ClockTime>().map(seconds)
    }

    fn poll_events(&mut self) -> Vec<PlayerEvent> {
        let mut events = Vec::new();
        while let Some(msg) = self.bus.pop() {
            match msg.view() {
                gst::MessageView::Eos(..) => {
                    debug!("end of stream, looping");
                    if let Err(err) = self.seek(0.0) {
                        warn!(%err, "failed to rewind after end of stream");
                    }
                    events.push(PlayerEvent::TrackEnded);
                }
                gst::MessageView::Error(err) => {
                    let reason = err.error().to_string();
                    warn!(%reason, debug = ?err.debug(), "pipeline error");
                    events.push(PlayerEvent::Error { reason });
                }
                _ => {}
            }
        }

        let n_audio = self.playbin.property::<i32>("n-audio");
        if n_audio != self.audio_count {
            self.audio_count = n_audio;
            events.push(PlayerEvent::TracksChanged);
        }

        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(frame) = slot.latest.as_ref() {
            let size = (frame.width, frame.height);
            if self.reported_size != Some(size) {
                self.reported_size = Some(size);
                events.push(PlayerEvent::MetadataReady {
                    width: size.0,
                    height: size.1,
                    duration: self.duration(),
                });
            }
        }
        if std::mem::take(&mut slot.fresh) {
            events.push(PlayerEvent::FrameTick);
        }
        events
    }

    fn take_frame(&mut self) -> Option<DecodedFrame> {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        slot.latest.take()
    }

    fn audio_tracks(&self) -> Vec<AudioTrackInfo> {
        (0..self.audio_count)
            .map(|i| {
                let tags = self
                    .playbin
                    .emit_by_name::<Option<gst::TagList>>("get-audio-tags", &[&i]);
                let title = tags
                    .as_ref()
                    .and_then(|t| t.get::<gst::tags::Title>())
                    .map(|v| v.get().to_string());
                let language = tags
                    .as_ref()
                    .and_then(|t| t.get::<gst::tags::LanguageCode>())
                    .map(|v| v.get().to_string());
                AudioTrackInfo::embedded(i as usize, title, language)
            })
            .collect()
    }

    fn select_audio_stream(&mut self, index: usize) -> Result<()> {
        if index as i32 >= self.audio_count {
            return Err(PlayerError::Playback(format!(
                "audio stream {index} does not exist"
            )));
        }
        self.playbin.set_property("current-audio", index as i32);
        Ok(())
    }
}

impl Drop for GstVideoSource {
    fn drop(&mut self) {
        if let Err(err) = self.playbin.set_state(gst::State::Null) {
            warn!(%err, "failed to stop video pipeline");
        }
        debug!("video pipeline released");
    }
}

/// Flushing seek that keeps `rate`; `seek_simple` would reset it to 1.0.
fn seek_at_rate(
    element: &impl IsA<gst::Element>,
    rate: f64,
    position: gst::ClockTime,
) -> std::result::Result<(), gst::glib::BoolError> {
    element.seek(
        rate,
        gst::SeekFlags::FLUSH | gst::SeekFlags::ACCURATE,
        gst::SeekType::Set,
        position,
        gst::SeekType::End,
        gst::ClockTime::ZERO,
    )
}

/// An audio-only file decoded alongside the video.
pub struct GstExternalClip {
    pipeline: gst::Pipeline,
    bus: gst::Bus,
    rate: f64,
}

impl GstExternalClip {
    pub fn open(uri: &str, engine: SharedEngine) -> Result<Self> {
        let sample_rate = lock(&engine).sample_rate();
        let caps = audio_caps(sample_rate);
        let pipeline = gst::parse::launch(&format!(
            "uridecodebin uri=\"{uri}\" ! audioconvert ! audioresample ! appsink name=sink caps=\"{caps}\""
        ))?
        .downcast::<gst::Pipeline>()
        .map_err(|_| PlayerError::Pipeline("expected a pipeline".into()))?;

        let sink = pipeline
            .by_name("sink")
            .and_then(|e| e.downcast::<gst_app::AppSink>().ok())
            .ok_or_else(|| PlayerError::Pipeline("external audio sink missing".into()))?;
        feed_engine(&sink, engine, Feed::External);

        let bus = pipeline
            .bus()
            .ok_or_else(|| PlayerError::Pipeline("external audio has no bus".into()))?;
        if let Err(err) = pipeline.set_state(gst::State::Paused) {
            let _ = pipeline.set_state(gst::State::Null);
            return Err(err.into());
        }
        info!(%uri, "external audio pipeline created");
        Ok(Self {
            pipeline,
            bus,
            rate: 1.0,
        })
    }

    fn set_state(&self, state: gst::State) {
        if let Err(err) = self.pipeline.set_state(state) {
            warn!(%err, ?state, "external audio state change failed");
        }
    }
}

impl ExternalClip for GstExternalClip {
    fn position(&self) -> Option<f64> {
        self.pipeline.query_position::<gst::ClockTime>().map(seconds)
    }

    fn seek(&mut self, seconds: f64) {
        if let Err(err) = seek_at_rate(&self.pipeline, self.rate, clock_time(seconds)) {
            warn!(%err, "external audio seek failed");
        }
    }

    fn set_rate(&mut self, rate: f64) {
        self.rate = rate;
        let position = self
            .pipeline
            .query_position::<gst::ClockTime>()
            .unwrap_or(gst::ClockTime::ZERO);
        if let Err(err) = seek_at_rate(&self.pipeline, rate, position) {
            warn!(%err, rate, "external audio rate change failed");
        }
    }

    fn poll_errors(&mut self) -> Vec<String> {
        let mut errors = Vec::new();
        while let Some(msg) = self.bus.pop() {
            match msg.view() {
                gst::MessageView::Error(err) => {
                    warn!(error = %err.error(), debug = ?err.debug(), "external audio error");
                    errors.push(err.error().to_string());
                }
                gst::MessageView::Eos(..) => debug!("external audio reached its end"),
                _ => {}
            }
        }
        errors
    }

    fn play(&mut self) {
        self.set_state(gst::State::Playing);
    }

    fn pause(&mut self) {
        self.set_state(gst::State::Paused);
    }
}

impl Drop for GstExternalClip {
    fn drop(&mut self) {
        let _ = self.pipeline.set_state(gst::State::Null);
        debug!("external audio pipeline released");
    }
}

/// Checks that `uri` holds at least one audio stream. Returns its duration.
pub fn probe_audio(uri: &str) -> Result<Option<f64>> {
    let discoverer = gst_pbutils::Discoverer::new(gst::ClockTime::from_seconds(5))?;
    let info = discoverer.discover_uri(uri)?;
    if info.audio_streams().is_empty() {
        return Err(PlayerError::Playback(format!("{uri} has no audio stream")));
    }
    Ok(info.duration().map(seconds))
}

/// Opens GStreamer pipelines that feed one shared audio engine.
pub struct GstOpener {
    engine: SharedEngine,
}

impl GstOpener {
    pub fn new(engine: SharedEngine) -> Self {
        Self { engine }
    }
}

impl SourceOpener for GstOpener {
    fn open_video(&mut self, uri: &str) -> Result<Box<dyn VideoSource>> {
        Ok(Box::new(GstVideoSource::open(uri, Arc::clone(&self.engine))?))
    }

    fn open_external_audio(&mut self, uri: &str) -> Result<Box<dyn ExternalClip>> {
        let duration = probe_audio(uri)?;
        debug!(?duration, "external audio probed");
        Ok(Box::new(GstExternalClip::open(
            uri,
            Arc::clone(&self.engine),
        )?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_time_conversions() {
        assert_eq!(clock_time(1.5), gst::ClockTime::from_mseconds(1500));
        assert_eq!(clock_time(-3.0), gst::ClockTime::ZERO);
        assert_eq!(seconds(gst::ClockTime::from_mseconds(250)), 0.25);
    }

    #[test]
    fn test_audio_caps_match_engine_layout() {
        gst::init().unwrap();
        let caps = audio_caps(44_100);
        let s = caps.structure(0).unwrap();
        assert_eq!(s.name().as_str(), "audio/x-raw");
        assert_eq!(s.get::<&str>("format").unwrap(), "F32LE");
        assert_eq!(s.get::<i32>("channels").unwrap(), 2);
        assert_eq!(s.get::<i32>("rate").unwrap(), 44_100);
    }
}
