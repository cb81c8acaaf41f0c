use std::path::Path;
use std::time::Instant;

use glam::{Mat4, Vec3};
use tracing::{debug, info, warn};

use crate::audio::graph::STEREO_WIDTHS;
use crate::audio::output::{Feed, SharedEngine, lock};
use crate::audio::tracks::{AudioRoute, TrackManager};
use crate::ops::color::{ColorPipeline, ColorUniforms, EXPOSURE_STEP};
use crate::ops::geometry::{ProjectionMesh, Scene, SphereDetail, build_mesh, remap_uv};
use crate::ops::orientation::{OrientationController, WheelAction, WheelModifiers};
use crate::ops::sharpen::{SharpenPass, SharpenUniforms};
use crate::renderer::frame_bridge::{FrameBridge, TextureUpload};
use crate::renderer::media_source::{PlayerEvent, SourceOpener, VideoSource};
use crate::types::command::Command;
use crate::types::error::{PlayerError, Result};
use crate::types::media::{VideoMetadata, source_uri, validate_video_path};
use crate::types::modes::{ColorEncoding, Eye, ResolutionScale, ToneMapOperator, VideoMode};
use crate::types::playback_state::PlaybackSession;
use crate::types::track::AudioTrackInfo;

pub const CAMERA_NEAR: f32 = 0.1;
pub const CAMERA_FAR: f32 = 1100.0;
pub const KEY_SEEK_SECONDS: f64 = 10.0;
pub const KEY_VOLUME_STEP: f64 = 0.1;

/// Everything the GPU needs to draw one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameParams {
    pub view_proj: [[f32; 4]; 4],
    /// Offscreen scene target in physical pixels.
    pub target_size: (u32, u32),
    pub sharpen: SharpenUniforms,
}

/// GPU side of the scene. The loop only ever talks to this trait.
pub trait SceneBackend {
    fn upload_mesh(&mut self, generation: u64, mesh: &ProjectionMesh);
    fn update_uvs(&mut self, generation: u64, mesh: &ProjectionMesh);
    fn release_mesh(&mut self, generation: u64);
    fn upload_frame(&mut self, upload: &TextureUpload<'_>);
    fn release_texture(&mut self);
    fn set_color(&mut self, uniforms: &ColorUniforms);
    fn render(&mut self, params: &FrameParams);
    /// Largest width or height a video texture may have.
    fn max_texture_dimension(&self) -> u32;
}

/// Start-up values for the player, usually taken from the command line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerSettings {
    pub mode: VideoMode,
    pub sphere_detail: SphereDetail,
    pub tone_mapping: ToneMapOperator,
    pub encoding: ColorEncoding,
    pub exposure: f32,
    pub resolution_scale: ResolutionScale,
    pub sharpen_strength: f32,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            mode: VideoMode::default(),
            sphere_detail: SphereDetail::default(),
            tone_mapping: ToneMapOperator::default(),
            encoding: ColorEncoding::default(),
            exposure: crate::ops::color::DEFAULT_EXPOSURE,
            resolution_scale: ResolutionScale::default(),
            sharpen_strength: crate::ops::sharpen::DEFAULT_STRENGTH,
        }
    }
}

/// Logical size of the video area plus the display's pixel density.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
    pub pixels_per_point: f32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280.0,
            height: 720.0,
            pixels_per_point: 1.0,
        }
    }
}

impl Viewport {
    pub fn aspect(&self) -> f32 {
        if self.height > 0.0 {
            self.width / self.height
        } else {
            1.0
        }
    }
}

/// Initial longitude each mode opens at.
pub fn initial_longitude(mode: VideoMode) -> f32 {
    match mode {
        VideoMode::StereoLR => 180.0,
        VideoMode::Mono | VideoMode::StereoTB => -180.0,
        VideoMode::Flat => 0.0,
    }
}

/// Perspective camera at the origin looking along `look`.
pub fn view_projection(look: [f32; 3], fov_deg: f32, aspect: f32) -> Mat4 {
    let proj = Mat4::perspective_rh(fov_deg.to_radians(), aspect, CAMERA_NEAR, CAMERA_FAR);
    let view = Mat4::look_to_rh(Vec3::ZERO, Vec3::from(look), Vec3::Y);
    proj * view
}

/// The whole player: one session, one mesh, one texture, one audio graph.
pub struct Player {
    opener: Box<dyn SourceOpener>,
    engine: SharedEngine,
    source: Option<Box<dyn VideoSource>>,
    session: Option<PlaybackSession>,
    metadata: VideoMetadata,
    mode: VideoMode,
    eye: Eye,
    detail: SphereDetail,
    scene: Scene,
    mesh_stale: bool,
    uvs_stale: bool,
    frames: FrameBridge,
    texture_released: bool,
    orientation: OrientationController,
    color: ColorPipeline,
    sharpen: SharpenPass,
    tracks: TrackManager,
    viewport: Viewport,
    loading: bool,
    fullscreen: bool,
    last_error: Option<String>,
}

impl Player {
    pub fn new(opener: Box<dyn SourceOpener>, engine: SharedEngine, settings: PlayerSettings) -> Self {
        let mut player = Self {
            opener,
            engine,
            source: None,
            session: None,
            metadata: VideoMetadata::default(),
            mode: settings.mode,
            eye: Eye::default(),
            detail: settings.sphere_detail,
            scene: Scene::new(),
            mesh_stale: true,
            uvs_stale: false,
            frames: FrameBridge::new(),
            texture_released: false,
            orientation: OrientationController::new(),
            color: ColorPipeline::new(
                settings.tone_mapping,
                settings.encoding,
                settings.exposure,
                settings.resolution_scale,
            ),
            sharpen: SharpenPass::new(settings.sharpen_strength),
            tracks: TrackManager::new(),
            viewport: Viewport::default(),
            loading: false,
            fullscreen: false,
            last_error: None,
        };
        player.set_mode(settings.mode);
        player
    }

    pub fn session(&self) -> Option<&PlaybackSession> {
        self.session.as_ref()
    }

    pub fn has_video(&self) -> bool {
        self.session.is_some()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn metadata(&self) -> VideoMetadata {
        self.metadata
    }

    pub fn mode(&self) -> VideoMode {
        self.mode
    }

    pub fn eye(&self) -> Eye {
        self.eye
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn orientation(&self) -> &OrientationController {
        &self.orientation
    }

    pub fn color(&self) -> &ColorPipeline {
        &self.color
    }

    pub fn sharpen(&self) -> &SharpenPass {
        &self.sharpen
    }

    pub fn tracks(&self) -> &[AudioTrackInfo] {
        self.tracks.tracks()
    }

    pub fn current_track(&self) -> usize {
        self.tracks.current_index()
    }

    pub fn stereo_width(&self) -> f32 {
        lock(&self.engine).graph().stereo_width().width()
    }

    pub fn is_fullscreen(&self) -> bool {
        self.fullscreen
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn dismiss_error(&mut self) {
        self.last_error = None;
    }

    /// Shown when nothing is loaded or loading.
    pub fn wants_drop_target(&self) -> bool {
        !self.has_video() && !self.loading
    }

    pub fn handle_command(&mut self, command: Command) -> Result<()> {
        debug!(?command, "handling command");
        match command {
            Command::LoadVideo(path) => self.load_video(&path)?,
            Command::SetMode(mode) => self.set_mode(mode),
            Command::SetQuality(scale) => self.color.set_resolution_scale(scale),
            Command::SetToneMapping(op) => self.color.set_tone_mapping(op),
            Command::SetEncoding(encoding) => self.color.set_encoding(encoding),
            Command::ToggleFullscreen => self.fullscreen = !self.fullscreen,
            Command::ResetCamera => self.orientation.reset(),
        }
        Ok(())
    }

    /// Replaces the current session. An unsupported file leaves the current
    /// session untouched; any later failure leaves the player empty.
    pub fn load_video(&mut self, path: &Path) -> Result<()> {
        let path_str = path.to_string_lossy();
        if let Err(err) = validate_video_path(&path_str) {
            warn!(path = %path.display(), %err, "rejected video");
            self.last_error = Some(err.to_string());
            return Err(err);
        }

        self.unload();
        self.loading = true;
        self.last_error = None;

        let opened = source_uri(&path_str).and_then(|uri| self.opener.open_video(&uri));
        let mut source = match opened {
            Ok(source) => source,
            Err(err) => {
                self.fail_playback(&err.to_string());
                return Err(err);
            }
        };
        if let Err(err) = source.play() {
            self.fail_playback(&err.to_string());
            return Err(err);
        }

        let mut session = PlaybackSession::new(path.to_path_buf());
        session.is_playing = true;
        info!(path = %path.display(), mode = %self.mode, "video loaded");

        self.source = Some(source);
        self.session = Some(session);
        self.orientation.reset();
        self.mesh_stale = true;
        Ok(())
    }

    /// Drops the session and everything that belongs to it.
    fn unload(&mut self) {
        if self.source.take().is_some() {
            debug!("previous source stopped");
        }
        self.session = None;
        self.metadata = VideoMetadata::default();
        self.frames.dispose();
        self.texture_released = true;
        self.scene.clear();
        self.mesh_stale = true;
        self.tracks.clear();
        lock(&self.engine).set_active_feed(Feed::Primary);
        self.loading = false;
    }

    /// Shows `message` in the error window without touching the session.
    pub fn report_error(&mut self, message: String) {
        self.last_error = Some(message);
    }

    fn fail_playback(&mut self, reason: &str) {
        warn!(%reason, "playback failed");
        self.unload();
        self.last_error = Some(PlayerError::Playback(reason.to_string()).to_string());
    }

    /// Safe to call before a video is loaded; the mesh is built on load.
    pub fn set_mode(&mut self, mode: VideoMode) {
        if mode != self.mode {
            info!(from = %self.mode, to = %mode, "switching video mode");
        }
        self.mode = mode;
        self.orientation.set_locked(mode == VideoMode::Flat);
        self.orientation.reset();
        self.orientation.set_longitude(initial_longitude(mode));
        self.scene.clear();
        self.mesh_stale = true;
        lock(&self.engine).set_mode(mode);
    }

    pub fn set_eye(&mut self, eye: Eye) {
        if eye != self.eye {
            self.eye = eye;
            self.uvs_stale = true;
        }
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        if viewport == self.viewport {
            return;
        }
        let resized = viewport.width != self.viewport.width || viewport.height != self.viewport.height;
        self.viewport = viewport;
        if resized && self.mode == VideoMode::Flat {
            self.scene.clear();
            self.mesh_stale = true;
        }
    }

    pub fn pointer_down(&mut self, x: f32, y: f32) {
        self.orientation.pointer_down(x, y);
    }

    pub fn pointer_move(&mut self, x: f32, y: f32) {
        self.orientation.pointer_move(x, y);
    }

    pub fn pointer_up(&mut self) {
        self.orientation.pointer_up();
    }

    pub fn touch_start(&mut self, touches: &[(f32, f32)]) {
        self.orientation.touch_start(touches);
    }

    pub fn touch_move(&mut self, touches: &[(f32, f32)]) {
        self.orientation.touch_move(touches);
    }

    pub fn touch_end(&mut self) {
        self.orientation.touch_end();
    }

    pub fn wheel(&mut self, dy: f32, modifiers: WheelModifiers) {
        let flat = self.mode == VideoMode::Flat;
        match self.orientation.wheel(dy, modifiers, flat) {
            WheelAction::Seek(delta) => self.seek_relative(delta),
            WheelAction::Volume(delta) => self.nudge_volume(delta),
            WheelAction::Zoom(fov) => debug!(fov, "zoom"),
            WheelAction::Ignored => {}
        }
    }

    pub fn toggle_play(&mut self) {
        let (Some(source), Some(session)) = (self.source.as_mut(), self.session.as_mut()) else {
            return;
        };
        let result = if session.is_playing {
            source.pause()
        } else {
            source.play()
        };
        match result {
            Ok(()) => {
                session.is_playing = !session.is_playing;
                self.tracks.set_playing(session.is_playing);
            }
            Err(err) => warn!(%err, "play/pause failed"),
        }
    }

    pub fn seek_to(&mut self, seconds: f64) {
        let (Some(source), Some(session)) = (self.source.as_mut(), self.session.as_mut()) else {
            return;
        };
        let target = seconds.clamp(0.0, session.duration.unwrap_or(f64::MAX));
        match source.seek(target) {
            Ok(()) => session.current_time = target,
            Err(err) => warn!(%err, target, "seek failed"),
        }
    }

    pub fn seek_relative(&mut self, delta: f64) {
        if let Some(target) = self.session.as_ref().map(|s| s.seek_target(delta)) {
            self.seek_to(target);
        }
    }

    pub fn nudge_volume(&mut self, delta: f64) {
        if let Some(session) = self.session.as_mut() {
            session.nudge_volume(delta);
        }
    }

    pub fn set_volume(&mut self, volume: f64) {
        if let Some(session) = self.session.as_mut() {
            session.set_volume(volume);
        }
    }

    pub fn toggle_mute(&mut self) {
        if let Some(session) = self.session.as_mut() {
            session.muted = !session.muted;
        }
    }

    pub fn cycle_speed(&mut self) {
        let (Some(source), Some(session)) = (self.source.as_mut(), self.session.as_mut()) else {
            return;
        };
        let previous = session.playback_rate;
        let rate = session.cycle_speed();
        if let Err(err) = source.set_rate(rate) {
            warn!(%err, rate, "rate change failed");
            session.playback_rate = previous;
            return;
        }
        self.tracks.set_rate(rate);
    }

    pub fn reset_camera(&mut self) {
        self.orientation.reset();
    }

    pub fn nudge_exposure(&mut self, up: bool, now: Instant) {
        let delta = if up { EXPOSURE_STEP } else { -EXPOSURE_STEP };
        self.color.nudge_exposure(delta, now);
    }

    pub fn set_brightness(&mut self, value: f32, now: Instant) {
        self.color.set_brightness(value, now);
    }

    /// Steps through the stereo width presets. Only meaningful in Flat mode.
    pub fn cycle_stereo_width(&mut self) -> Option<f32> {
        if self.mode != VideoMode::Flat {
            return None;
        }
        let mut engine = lock(&self.engine);
        let current = engine.graph().stereo_width().width();
        let next = STEREO_WIDTHS
            .iter()
            .position(|w| (*w - current).abs() < 1e-3)
            .map(|i| STEREO_WIDTHS[(i + 1) % STEREO_WIDTHS.len()])
            .unwrap_or(STEREO_WIDTHS[0]);
        engine.graph_mut().set_stereo_width(next);
        info!(width = next, "stereo width");
        Some(next)
    }

    pub fn select_audio_track(&mut self, index: usize) {
        let time = self.current_time();
        if let Some(route) = self.tracks.select(index, time) {
            self.apply_route(route);
        }
    }

    pub fn cycle_audio_track(&mut self) {
        let time = self.current_time();
        if let Some(route) = self.tracks.cycle(time) {
            self.apply_route(route);
        }
    }

    /// Decodes `path` alongside the video and switches to it.
    pub fn load_external_audio(&mut self, path: &Path) -> Result<()> {
        let result = self.attach_external_audio(path);
        if let Err(err) = &result {
            warn!(path = %path.display(), %err, "external audio rejected");
            self.last_error = Some(err.to_string());
        }
        result
    }

    fn attach_external_audio(&mut self, path: &Path) -> Result<()> {
        if !self.has_video() {
            return Err(PlayerError::Playback("load a video first".into()));
        }
        let uri = source_uri(&path.to_string_lossy())?;
        let clip = self.opener.open_external_audio(&uri)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| uri.clone());
        let time = self.current_time();
        if let Some(route) = self.tracks.load_external(clip, name, time) {
            self.apply_route(route);
        }
        Ok(())
    }

    fn apply_route(&mut self, route: AudioRoute) {
        match route {
            AudioRoute::Embedded(index) => {
                if let Some(source) = self.source.as_mut() {
                    if let Err(err) = source.select_audio_stream(index) {
                        warn!(%err, index, "could not switch audio stream");
                    }
                }
                lock(&self.engine).set_active_feed(Feed::Primary);
            }
            AudioRoute::External => lock(&self.engine).set_active_feed(Feed::External),
        }
    }

    fn current_time(&self) -> f64 {
        self.session.as_ref().map_or(0.0, |s| s.current_time)
    }

    fn drain_events(&mut self, max_texture: u32) -> bool {
        let Some(events) = self.source.as_mut().map(|s| s.poll_events()) else {
            return false;
        };
        let mut new_frame = false;
        for event in events {
            match event {
                PlayerEvent::MetadataReady {
                    width,
                    height,
                    duration,
                } => {
                    if width.max(height) > max_texture {
                        let err = PlayerError::TextureTooLarge {
                            width,
                            height,
                            max: max_texture,
                        };
                        warn!(%err, "video rejected");
                        self.unload();
                        self.last_error = Some(err.to_string());
                        return false;
                    }
                    info!(width, height, ?duration, "video metadata ready");
                    let aspect_changed = self.metadata.resolution != Some((width, height));
                    self.metadata.resolution = Some((width, height));
                    self.metadata.duration = duration.or(self.metadata.duration);
                    if let Some(session) = self.session.as_mut() {
                        session.duration = self.metadata.duration;
                    }
                    self.loading = false;
                    if aspect_changed {
                        self.scene.clear();
                        self.mesh_stale = true;
                    }
                }
                PlayerEvent::FrameTick => {
                    if let Some(frame) = self.source.as_mut().and_then(|s| s.take_frame()) {
                        self.frames.submit(frame);
                        new_frame = true;
                    }
                }
                PlayerEvent::TracksChanged => {
                    if let Some(source) = self.source.as_ref() {
                        self.tracks.set_embedded(source.audio_tracks());
                    }
                }
                PlayerEvent::TrackEnded => {
                    if let Some(session) = self.session.as_mut() {
                        session.current_time = 0.0;
                    }
                }
                PlayerEvent::Error { reason } => {
                    self.fail_playback(&reason);
                    return false;
                }
            }
        }
        new_frame
    }

    /// Drops an external clip that failed and falls back to the video's audio.
    fn drain_external_errors(&mut self) {
        let Some(reason) = self.tracks.take_external_error() else {
            return;
        };
        warn!(%reason, "external audio failed");
        self.last_error = Some(format!("external audio: {reason}"));
        let time = self.current_time();
        match self.tracks.drop_external(time) {
            Some(route) => self.apply_route(route),
            None => lock(&self.engine).set_active_feed(Feed::Primary),
        }
    }

    /// Picks up the duration once the demuxer knows it.
    fn refresh_duration(&mut self) {
        let (Some(source), Some(session)) = (self.source.as_ref(), self.session.as_mut()) else {
            return;
        };
        if session.duration.is_some() {
            return;
        }
        if let Some(duration) = source.duration() {
            debug!(duration, "duration became known");
            session.duration = Some(duration);
            self.metadata.duration = Some(duration);
        }
    }

    fn sync_mesh(&mut self, backend: &mut dyn SceneBackend) {
        for generation in self.scene.take_retired() {
            backend.release_mesh(generation);
        }
        if std::mem::take(&mut self.texture_released) {
            backend.release_texture();
        }
        if !self.has_video() {
            return;
        }

        let aspect = self.metadata.aspect_ratio();
        if self.mesh_stale {
            self.mesh_stale = false;
            self.uvs_stale = false;
            let mut mesh = build_mesh(
                self.mode,
                aspect,
                self.orientation.fov(),
                self.viewport.aspect(),
                self.detail,
            );
            remap_uv(&mut mesh, self.mode, aspect, self.eye);
            let generation = self.scene.replace(mesh);
            if let Some(mesh) = self.scene.mesh() {
                backend.upload_mesh(generation, mesh);
            }
        } else if std::mem::take(&mut self.uvs_stale) {
            let (mode, eye) = (self.mode, self.eye);
            if let (Some(generation), Some(mesh)) = (self.scene.generation(), self.scene.mesh_mut()) {
                remap_uv(mesh, mode, aspect, eye);
                backend.update_uvs(generation, mesh);
            }
        }
    }

    fn look(&self) -> [f32; 3] {
        match self.scene.mesh() {
            Some(mesh) if self.mode == VideoMode::Flat => {
                Vec3::from(mesh.origin())
                    .try_normalize()
                    .unwrap_or(Vec3::NEG_Z)
                    .to_array()
            }
            _ => self.orientation.look_vector(),
        }
    }

    /// Scene target size in physical pixels after the resolution scale.
    pub fn target_size(&self) -> (u32, u32) {
        let ratio = self.color.effective_pixel_ratio(self.viewport.pixels_per_point);
        (
            (self.viewport.width * ratio).round().max(1.0) as u32,
            (self.viewport.height * ratio).round().max(1.0) as u32,
        )
    }

    /// One display refresh. Never blocks on the decoder.
    pub fn tick(&mut self, backend: &mut dyn SceneBackend) {
        let new_frame = self.drain_events(backend.max_texture_dimension());
        self.drain_external_errors();
        self.refresh_duration();
        self.sync_mesh(backend);

        self.orientation.ease();
        let look = self.look();

        let playing = self.session.as_ref().is_some_and(|s| s.is_playing);
        if playing || new_frame {
            self.frames.mark_dirty();
        }
        if let Some(upload) = self.frames.take_upload() {
            backend.upload_frame(&upload);
        }

        {
            let mut engine = lock(&self.engine);
            let graph = engine.graph_mut();
            graph.set_listener_look(look);
            graph.set_output_gain(self.session.as_ref().map_or(0.0, |s| s.output_gain()));
        }

        if let Some(uniforms) = self.color.take_update() {
            backend.set_color(&uniforms);
        }

        let (width, height) = self.target_size();
        self.sharpen.set_resolution(width, height);
        if self.scene.mesh().is_some() {
            let view_proj =
                view_projection(look, self.orientation.fov(), self.viewport.aspect());
            backend.render(&FrameParams {
                view_proj: view_proj.to_cols_array_2d(),
                target_size: (width, height),
                sharpen: self.sharpen.uniforms(),
            });
        }

        if let Some(position) = self.source.as_ref().and_then(|s| s.position()) {
            if let Some(session) = self.session.as_mut() {
                session.current_time = position;
            }
            self.tracks.sync(position);
        }
    }
}
