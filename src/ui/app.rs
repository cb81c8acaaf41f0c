use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use eframe::egui;
use rfd::FileDialog;
use tracing::{info, warn};

use crate::audio::output::{AudioEngine, AudioOutput};
use crate::config::Config;
use crate::ops::color::{MAX_BRIGHTNESS, MIN_BRIGHTNESS};
use crate::ops::transcode::TranscodeJob;
use crate::renderer::gpu::WgpuBackend;
use crate::renderer::media_source::GstOpener;
use crate::renderer::render_loop::{KEY_SEEK_SECONDS, KEY_VOLUME_STEP, Player};
use crate::types::command::Command;
use crate::types::media::SUPPORTED_EXTENSIONS;
use crate::types::modes::{ColorEncoding, Eye, ResolutionScale, ToneMapOperator, VideoMode};
use crate::ui::video_player::VideoPlayer;

pub const AUDIO_EXTENSIONS: [&str; 7] = ["mp3", "wav", "ogg", "flac", "aac", "m4a", "opus"];

/// What a dropped or picked file should be used for.
#[derive(Debug, Clone, PartialEq)]
pub enum DroppedFile {
    Video(PathBuf),
    Audio(PathBuf),
    Unsupported(PathBuf),
}

impl DroppedFile {
    pub fn classify(path: PathBuf) -> Self {
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        if SUPPORTED_EXTENSIONS.contains(&ext.as_str()) {
            DroppedFile::Video(path)
        } else if AUDIO_EXTENSIONS.contains(&ext.as_str()) {
            DroppedFile::Audio(path)
        } else {
            DroppedFile::Unsupported(path)
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Shortcut {
    TogglePlay,
    ToggleFullscreen,
    Seek(f64),
    Volume(f64),
    CycleSpeed,
    ToggleMute,
    ResetCamera,
    CycleStereoWidth,
    Exposure { up: bool },
    CycleAudioTrack,
}

fn shortcuts(input: &mut egui::InputState) -> Vec<Shortcut> {
    let mut out = Vec::new();
    // Ctrl+W first so the plain key table below never sees it.
    if input.consume_key(egui::Modifiers::COMMAND, egui::Key::W) {
        out.push(Shortcut::CycleStereoWidth);
    }
    if input.consume_key(egui::Modifiers::SHIFT, egui::Key::B) {
        out.push(Shortcut::Exposure { up: false });
    }
    let table = [
        (egui::Key::Space, Shortcut::TogglePlay),
        (egui::Key::F, Shortcut::ToggleFullscreen),
        (egui::Key::ArrowLeft, Shortcut::Seek(-KEY_SEEK_SECONDS)),
        (egui::Key::ArrowRight, Shortcut::Seek(KEY_SEEK_SECONDS)),
        (egui::Key::ArrowUp, Shortcut::Volume(KEY_VOLUME_STEP)),
        (egui::Key::ArrowDown, Shortcut::Volume(-KEY_VOLUME_STEP)),
        (egui::Key::S, Shortcut::CycleSpeed),
        (egui::Key::M, Shortcut::ToggleMute),
        (egui::Key::R, Shortcut::ResetCamera),
        (egui::Key::B, Shortcut::Exposure { up: true }),
        (egui::Key::A, Shortcut::CycleAudioTrack),
    ];
    for (key, shortcut) in table {
        if input.consume_key(egui::Modifiers::NONE, key) {
            out.push(shortcut);
        }
    }
    out
}

pub struct OrbviewApp {
    player: Player,
    backend: WgpuBackend,
    _audio: Option<AudioOutput>,
    fullscreen_applied: bool,
    transcode: Option<TranscodeJob>,
}

impl OrbviewApp {
    pub fn new(cc: &eframe::CreationContext<'_>, config: &Config) -> anyhow::Result<Self> {
        let render_state = cc
            .wgpu_render_state
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("the wgpu renderer is required"))?;
        let backend = WgpuBackend::new(render_state);

        let (audio, engine) = match AudioOutput::open(config.stereo_width_cap) {
            Ok(output) => {
                let engine = output.engine();
                (Some(output), engine)
            }
            Err(err) => {
                warn!(%err, "continuing without audio output");
                (None, AudioEngine::detached(config.stereo_width_cap))
            }
        };

        let opener = Box::new(GstOpener::new(engine.clone()));
        let mut player = Player::new(opener, engine, config.player_settings());

        let mut transcode = None;
        if let Some(video) = &config.video {
            if config.preprocess {
                transcode = Some(TranscodeJob::spawn(video.clone()));
            } else if let Err(err) = player.handle_command(Command::LoadVideo(video.clone())) {
                warn!(%err, "start-up video failed to load");
            }
        }

        Ok(Self {
            player,
            backend,
            _audio: audio,
            fullscreen_applied: false,
            transcode,
        })
    }

    /// Opens the re-encoded file once ffmpeg is done.
    fn poll_transcode(&mut self) {
        let Some(result) = self.transcode.as_ref().and_then(TranscodeJob::poll) else {
            return;
        };
        if let Some(job) = self.transcode.take() {
            match result {
                Ok(out) => {
                    info!(input = %job.input().display(), output = %out.display(), "preprocessing done");
                    self.open_video(&out);
                }
                Err(err) => {
                    warn!(input = %job.input().display(), %err, "preprocessing failed");
                    self.player.report_error(err.to_string());
                }
            }
        }
    }

    /// Dialog results and drops arrive as `video-selected` events.
    fn open_video(&mut self, path: &Path) {
        let command = Command::parse("video-selected", Some(path.to_string_lossy().as_ref()));
        match command {
            Ok(command) => {
                if let Err(err) = self.player.handle_command(command) {
                    warn!(%err, "could not open video");
                }
            }
            Err(err) => warn!(%err, "bad video selection"),
        }
    }

    fn open_audio(&mut self, path: &Path) {
        if let Err(err) = self.player.load_external_audio(path) {
            warn!(%err, "could not load audio track");
        }
    }

    fn run(&mut self, command: Command) {
        if let Err(err) = self.player.handle_command(command) {
            warn!(%err, "command failed");
        }
    }

    fn handle_drops(&mut self, ctx: &egui::Context) {
        let dropped: Vec<PathBuf> = ctx.input(|i| {
            i.raw
                .dropped_files
                .iter()
                .filter_map(|f| f.path.clone())
                .collect()
        });
        for path in dropped {
            match DroppedFile::classify(path) {
                DroppedFile::Video(path) => self.open_video(&path),
                DroppedFile::Audio(path) => self.open_audio(&path),
                DroppedFile::Unsupported(path) => {
                    info!(path = %path.display(), "ignoring dropped file");
                }
            }
        }
    }

    fn handle_keys(&mut self, ctx: &egui::Context) {
        if ctx.wants_keyboard_input() {
            return;
        }
        for shortcut in ctx.input_mut(shortcuts) {
            match shortcut {
                Shortcut::TogglePlay => self.player.toggle_play(),
                Shortcut::ToggleFullscreen => self.run(Command::ToggleFullscreen),
                Shortcut::Seek(delta) => self.player.seek_relative(delta),
                Shortcut::Volume(delta) => self.player.nudge_volume(delta),
                Shortcut::CycleSpeed => self.player.cycle_speed(),
                Shortcut::ToggleMute => self.player.toggle_mute(),
                Shortcut::ResetCamera => self.run(Command::ResetCamera),
                Shortcut::CycleStereoWidth => {
                    self.player.cycle_stereo_width();
                }
                Shortcut::Exposure { up } => self.player.nudge_exposure(up, Instant::now()),
                Shortcut::CycleAudioTrack => self.player.cycle_audio_track(),
            }
        }
    }

    fn menu_bar(&mut self, ui: &mut egui::Ui) {
        egui::menu::bar(ui, |ui| {
            ui.menu_button("File", |ui| {
                if ui.button("Open Video…").clicked() {
                    ui.close_menu();
                    if let Some(path) = FileDialog::new()
                        .add_filter("Video", &SUPPORTED_EXTENSIONS)
                        .pick_file()
                    {
                        self.open_video(&path);
                    }
                }
                if ui
                    .add_enabled(self.transcode.is_none(), egui::Button::new("Preprocess & Open…"))
                    .clicked()
                {
                    ui.close_menu();
                    if let Some(path) = FileDialog::new()
                        .add_filter("Video", &SUPPORTED_EXTENSIONS)
                        .pick_file()
                    {
                        self.transcode = Some(TranscodeJob::spawn(path));
                    }
                }
                ui.add_enabled_ui(self.player.has_video(), |ui| {
                    if ui.button("Load Audio Track…").clicked() {
                        ui.close_menu();
                        if let Some(path) = FileDialog::new()
                            .add_filter("Audio", &AUDIO_EXTENSIONS)
                            .pick_file()
                        {
                            self.open_audio(&path);
                        }
                    }
                });
                ui.separator();
                if ui.button("Quit").clicked() {
                    ui.ctx().send_viewport_cmd(egui::ViewportCommand::Close);
                }
            });

            ui.menu_button("Mode", |ui| {
                let current = self.player.mode();
                for mode in VideoMode::ALL {
                    if ui.radio(current == mode, mode.label()).clicked() {
                        self.run(Command::SetMode(mode));
                        ui.close_menu();
                    }
                }
                if matches!(current, VideoMode::StereoLR | VideoMode::StereoTB) {
                    ui.separator();
                    let eye = self.player.eye();
                    for (value, label) in [(Eye::Left, "Left Eye"), (Eye::Right, "Right Eye")] {
                        if ui.radio(eye == value, label).clicked() {
                            self.player.set_eye(value);
                            ui.close_menu();
                        }
                    }
                }
            });

            ui.menu_button("View", |ui| {
                ui.label("Quality");
                let scale = self.player.color().resolution_scale();
                for option in ResolutionScale::ALL {
                    if ui.radio(scale == option, option.label()).clicked() {
                        self.run(Command::SetQuality(option));
                    }
                }
                ui.separator();
                ui.menu_button("Tone Mapping", |ui| {
                    let op = self.player.color().tone_mapping();
                    for option in ToneMapOperator::ALL {
                        if ui.radio(op == option, option.label()).clicked() {
                            self.run(Command::SetToneMapping(option));
                            ui.close_menu();
                        }
                    }
                });
                ui.menu_button("Color Encoding", |ui| {
                    let encoding = self.player.color().encoding();
                    for option in ColorEncoding::ALL {
                        if ui.radio(encoding == option, option.label()).clicked() {
                            self.run(Command::SetEncoding(option));
                            ui.close_menu();
                        }
                    }
                });
                ui.separator();
                if ui.button("Reset Camera (R)").clicked() {
                    self.run(Command::ResetCamera);
                    ui.close_menu();
                }
                if ui.button("Fullscreen (F)").clicked() {
                    self.run(Command::ToggleFullscreen);
                    ui.close_menu();
                }
            });

            ui.menu_button("Audio", |ui| {
                let current = self.player.current_track();
                let labels: Vec<String> =
                    self.player.tracks().iter().map(|t| t.menu_label()).collect();
                if labels.is_empty() {
                    ui.label("No audio tracks");
                }
                for (index, label) in labels.into_iter().enumerate() {
                    if ui.radio(current == index, label).clicked() {
                        self.player.select_audio_track(index);
                        ui.close_menu();
                    }
                }
                if self.player.mode() == VideoMode::Flat {
                    ui.separator();
                    let label = format!("Stereo Width: {:.1} (Ctrl+W)", self.player.stereo_width());
                    if ui.button(label).clicked() {
                        self.player.cycle_stereo_width();
                    }
                }
            });
        });
    }

    fn control_bar(&mut self, ui: &mut egui::Ui) {
        let Some(session) = self.player.session().cloned() else {
            ui.label("No video loaded");
            return;
        };
        ui.horizontal(|ui| {
            let label = if session.is_playing { "Pause" } else { "Play" };
            if ui.button(label).clicked() {
                self.player.toggle_play();
            }

            let mut t = session.current_time;
            let end = session.duration.unwrap_or(0.0).max(t);
            let seek = ui.add(
                egui::Slider::new(&mut t, 0.0..=end)
                    .show_value(false)
                    .trailing_fill(true),
            );
            if seek.changed() {
                self.player.seek_to(t);
            }
            ui.label(session.time_label());

            ui.separator();
            let mute = if session.muted { "Unmute" } else { "Mute" };
            if ui.button(mute).clicked() {
                self.player.toggle_mute();
            }
            let mut volume = session.volume;
            if ui
                .add(egui::Slider::new(&mut volume, 0.0..=1.0).show_value(false))
                .changed()
            {
                self.player.set_volume(volume);
            }

            if ui.button(format!("{}x", session.playback_rate)).clicked() {
                self.player.cycle_speed();
            }

            ui.separator();
            let mut brightness = self.player.color().brightness();
            if ui
                .add(
                    egui::Slider::new(&mut brightness, MIN_BRIGHTNESS..=MAX_BRIGHTNESS)
                        .text("Brightness"),
                )
                .changed()
            {
                self.player.set_brightness(brightness, Instant::now());
            }
        });
    }

    fn error_window(&mut self, ctx: &egui::Context) {
        let Some(message) = self.player.last_error().map(str::to_owned) else {
            return;
        };
        let mut dismissed = false;
        egui::Window::new("Playback error")
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_TOP, [0.0, 40.0])
            .show(ctx, |ui| {
                ui.label(message);
                if ui.button("Dismiss").clicked() {
                    dismissed = true;
                }
            });
        if dismissed {
            self.player.dismiss_error();
        }
    }

    fn apply_fullscreen(&mut self, ctx: &egui::Context) {
        let wanted = self.player.is_fullscreen();
        if wanted != self.fullscreen_applied {
            ctx.send_viewport_cmd(egui::ViewportCommand::Fullscreen(wanted));
            self.fullscreen_applied = wanted;
        }
    }
}

impl eframe::App for OrbviewApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_transcode();
        self.handle_drops(ctx);
        self.handle_keys(ctx);
        self.player.tick(&mut self.backend);

        if !self.player.is_fullscreen() {
            egui::TopBottomPanel::top("menu_bar").show(ctx, |ui| self.menu_bar(ui));
            egui::TopBottomPanel::bottom("control_bar").show(ctx, |ui| self.control_bar(ui));
        }

        egui::CentralPanel::default()
            .frame(egui::Frame::NONE.fill(egui::Color32::BLACK))
            .show(ctx, |ui| {
                let busy = self.transcode.is_some();
                if VideoPlayer::show(ui, &mut self.player, busy) {
                    self.run(Command::ToggleFullscreen);
                }
            });

        self.error_window(ctx);
        self.apply_fullscreen(ctx);

        if self.player.has_video() || self.player.is_loading() {
            ctx.request_repaint();
        } else if self.transcode.is_some() {
            ctx.request_repaint_after(Duration::from_millis(100));
        } else if let Some(left) = self.player.color().indicator().remaining(Instant::now()) {
            ctx.request_repaint_after(left);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_dropped_files() {
        assert_eq!(
            DroppedFile::classify(PathBuf::from("/v/trip.MKV")),
            DroppedFile::Video(PathBuf::from("/v/trip.MKV"))
        );
        assert_eq!(
            DroppedFile::classify(PathBuf::from("commentary.flac")),
            DroppedFile::Audio(PathBuf::from("commentary.flac"))
        );
        assert_eq!(
            DroppedFile::classify(PathBuf::from("notes.txt")),
            DroppedFile::Unsupported(PathBuf::from("notes.txt"))
        );
        assert_eq!(
            DroppedFile::classify(PathBuf::from("no_extension")),
            DroppedFile::Unsupported(PathBuf::from("no_extension"))
        );
    }
}
