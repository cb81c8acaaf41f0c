use std::time::Instant;

use eframe::egui;

use crate::ops::orientation::WheelModifiers;
use crate::renderer::gpu::paint_scene;
use crate::renderer::render_loop::{Player, Viewport};

/// What is drawn on top of the video area.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Overlay {
    Spinner,
    DropTarget,
    Nothing,
}

fn overlay_for(player: &Player, busy: bool) -> Overlay {
    if busy || player.is_loading() {
        Overlay::Spinner
    } else if player.wants_drop_target() {
        Overlay::DropTarget
    } else {
        Overlay::Nothing
    }
}

/// The video area: forwards pointer, touch and wheel input to the player and
/// paints the sharpened scene plus overlays.
pub struct VideoPlayer;

impl VideoPlayer {
    /// Returns true when the area was double-clicked. `busy` shows the
    /// spinner while work outside the player (a re-encode) is running.
    pub fn show(ui: &mut egui::Ui, player: &mut Player, busy: bool) -> bool {
        let (rect, response) =
            ui.allocate_exact_size(ui.available_size(), egui::Sense::click_and_drag());
        player.set_viewport(Viewport {
            width: rect.width(),
            height: rect.height(),
            pixels_per_point: ui.ctx().pixels_per_point(),
        });

        Self::pointer_input(ui, &response, player);
        if response.hovered() {
            Self::wheel_input(ui, player);
        }

        let painter = ui.painter_at(rect);
        painter.rect_filled(rect, 0.0, egui::Color32::BLACK);
        if player.scene().mesh().is_some() {
            paint_scene(ui, rect, player.sharpen().uniforms());
        }
        Self::overlays(ui, rect, player, busy);

        response.double_clicked()
    }

    fn pointer_input(ui: &egui::Ui, response: &egui::Response, player: &mut Player) {
        let (touch, fingers) = ui.input(|i| {
            (
                i.any_touches(),
                i.multi_touch().map_or(1, |t| t.num_touches),
            )
        });
        if let Some(pos) = response.interact_pointer_pos() {
            let touches = vec![(pos.x, pos.y); fingers];
            if response.drag_started() {
                if touch {
                    player.touch_start(&touches);
                } else {
                    player.pointer_down(pos.x, pos.y);
                }
            } else if response.dragged() {
                if touch {
                    player.touch_move(&touches);
                } else {
                    player.pointer_move(pos.x, pos.y);
                }
            }
        }
        if response.drag_stopped() {
            if touch {
                player.touch_end();
            } else {
                player.pointer_up();
            }
        }
    }

    fn wheel_input(ui: &egui::Ui, player: &mut Player) {
        let (delta, modifiers) = ui.input(|i| (i.raw_scroll_delta, i.modifiers));
        // Shift+wheel may arrive on the horizontal axis.
        let raw = if delta.y != 0.0 { delta.y } else { delta.x };
        if raw == 0.0 {
            return;
        }
        player.wheel(
            -raw,
            WheelModifiers {
                ctrl: modifiers.ctrl || modifiers.command,
                shift: modifiers.shift,
            },
        );
    }

    fn overlays(ui: &mut egui::Ui, rect: egui::Rect, player: &Player, busy: bool) {
        let painter = ui.painter_at(rect);

        if let Some(text) = player.color().indicator().visible_text(Instant::now()) {
            let pos = rect.center_top() + egui::vec2(0.0, 24.0);
            let galley = painter.layout_no_wrap(
                text.to_string(),
                egui::FontId::proportional(18.0),
                egui::Color32::WHITE,
            );
            let bg = egui::Rect::from_center_size(
                pos + egui::vec2(0.0, galley.size().y / 2.0),
                galley.size() + egui::vec2(24.0, 12.0),
            );
            painter.rect_filled(bg, 6.0, egui::Color32::from_black_alpha(180));
            painter.galley(
                bg.center() - galley.size() / 2.0,
                galley,
                egui::Color32::WHITE,
            );
        }

        match overlay_for(player, busy) {
            Overlay::Spinner => {
                let spinner = egui::Rect::from_center_size(rect.center(), egui::vec2(48.0, 48.0));
                ui.put(spinner, egui::Spinner::new().size(48.0));
            }
            Overlay::DropTarget => Self::drop_target(ui, &painter, rect),
            Overlay::Nothing => {}
        }
    }

    fn drop_target(ui: &egui::Ui, painter: &egui::Painter, rect: egui::Rect) {
        let hovering = ui.ctx().input(|i| !i.raw.hovered_files.is_empty());
        let stroke_color = if hovering {
            egui::Color32::from_rgb(90, 160, 255)
        } else {
            egui::Color32::from_gray(90)
        };
        let target = rect.shrink(32.0);
        painter.rect_stroke(
            target,
            12.0,
            egui::Stroke::new(2.0, stroke_color),
            egui::StrokeKind::Inside,
        );
        painter.text(
            target.center(),
            egui::Align2::CENTER_CENTER,
            "Drop a video here (mp4, webm, mkv, mov)\nor use File > Open Video…",
            egui::FontId::proportional(20.0),
            egui::Color32::from_gray(200),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::output::AudioEngine;
    use crate::audio::tracks::ExternalClip;
    use crate::renderer::media_source::{SourceOpener, VideoSource};
    use crate::renderer::render_loop::PlayerSettings;
    use crate::types::error::{PlayerError, Result};

    struct NoMedia;

    impl SourceOpener for NoMedia {
        fn open_video(&mut self, _uri: &str) -> Result<Box<dyn VideoSource>> {
            Err(PlayerError::Pipeline("no media in tests".into()))
        }
        fn open_external_audio(&mut self, _uri: &str) -> Result<Box<dyn ExternalClip>> {
            Err(PlayerError::Pipeline("no media in tests".into()))
        }
    }

    #[test]
    fn test_spinner_replaces_drop_target_while_busy() {
        let player = Player::new(
            Box::new(NoMedia),
            AudioEngine::detached(2.0),
            PlayerSettings::default(),
        );
        assert_eq!(overlay_for(&player, false), Overlay::DropTarget);
        assert_eq!(overlay_for(&player, true), Overlay::Spinner);
    }
}
