use tracing::{debug, info};

use crate::types::track::AudioTrackInfo;

/// Maximum drift tolerated between an external clip and the video clock.
pub const SYNC_THRESHOLD: f64 = 0.1;

/// An independently decoded audio file played alongside the video.
/// Dropping it releases the underlying pipeline.
pub trait ExternalClip {
    /// `None` while the clip is still prerolling.
    fn position(&self) -> Option<f64>;
    fn seek(&mut self, seconds: f64);
    fn set_rate(&mut self, rate: f64);
    fn play(&mut self);
    fn pause(&mut self);
    /// Decoder errors reported since the last call.
    fn poll_errors(&mut self) -> Vec<String>;
}

/// Where audible sound should come from after a selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioRoute {
    /// Enable this embedded stream and unmute the video's own audio.
    Embedded(usize),
    /// Mute the video's own audio and play the external clip.
    External,
}

/// Ordered track list with exactly one selection.
#[derive(Default)]
pub struct TrackManager {
    tracks: Vec<AudioTrackInfo>,
    current: usize,
    external: Option<Box<dyn ExternalClip>>,
    /// Playback rate last set on the video, if it was ever changed.
    rate: Option<f64>,
}

impl std::fmt::Debug for TrackManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackManager")
            .field("tracks", &self.tracks)
            .field("current", &self.current)
            .field("has_external", &self.external.is_some())
            .field("rate", &self.rate)
            .finish()
    }
}

impl TrackManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tracks(&self) -> &[AudioTrackInfo] {
        &self.tracks
    }

    pub fn current(&self) -> Option<&AudioTrackInfo> {
        self.tracks.get(self.current)
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn is_external_active(&self) -> bool {
        self.current().is_some_and(|t| t.is_external) && self.external.is_some()
    }

    /// Replaces the embedded entries discovered from the source, keeping an
    /// external entry (if any) at the end of the list.
    pub fn set_embedded(&mut self, embedded: Vec<AudioTrackInfo>) {
        let external = self.tracks.iter().find(|t| t.is_external).cloned();
        let was_external = self.current().is_some_and(|t| t.is_external);

        self.tracks = embedded
            .into_iter()
            .filter(|t| !t.is_external)
            .enumerate()
            .map(|(i, mut t)| {
                t.index = i;
                t
            })
            .collect();
        if let Some(mut ext) = external {
            ext.index = self.tracks.len();
            self.tracks.push(ext);
        }

        self.current = if was_external {
            self.tracks.len().saturating_sub(1)
        } else {
            self.current.min(self.embedded_count().saturating_sub(1))
        };
        debug!(count = self.tracks.len(), "audio track list updated");
    }

    fn embedded_count(&self) -> usize {
        self.tracks.iter().filter(|t| !t.is_external).count()
    }

    /// Selects `index`. Returns `None` when the index is out of range.
    pub fn select(&mut self, index: usize, video_time: f64) -> Option<AudioRoute> {
        let track = self.tracks.get(index)?;
        self.current = index;
        info!(track = %track.menu_label(), "audio track selected");
        if track.is_external {
            let clip = self.external.as_mut()?;
            clip.seek(video_time);
            clip.play();
            Some(AudioRoute::External)
        } else {
            if let Some(clip) = self.external.as_mut() {
                clip.pause();
            }
            Some(AudioRoute::Embedded(index))
        }
    }

    /// Selects the track after the current one, wrapping around.
    pub fn cycle(&mut self, video_time: f64) -> Option<AudioRoute> {
        if self.tracks.is_empty() {
            return None;
        }
        let next = (self.current + 1) % self.tracks.len();
        self.select(next, video_time)
    }

    /// Installs a freshly loaded clip, replacing any previous external track,
    /// and selects it.
    pub fn load_external(
        &mut self,
        mut clip: Box<dyn ExternalClip>,
        file_name: String,
        video_time: f64,
    ) -> Option<AudioRoute> {
        self.tracks.retain(|t| !t.is_external);
        if let Some(rate) = self.rate {
            clip.set_rate(rate);
        }
        // The old clip is dropped here, before the new one starts.
        self.external = Some(clip);
        let index = self.tracks.len();
        self.tracks.push(AudioTrackInfo::external(index, file_name));
        self.select(index, video_time)
    }

    /// Hard-seeks the external clip when it drifted past [`SYNC_THRESHOLD`].
    /// Returns true when a seek was issued.
    pub fn sync(&mut self, video_time: f64) -> bool {
        if !self.is_external_active() {
            return false;
        }
        let Some(clip) = self.external.as_mut() else {
            return false;
        };
        let Some(position) = clip.position() else {
            return false;
        };
        if (position - video_time).abs() > SYNC_THRESHOLD {
            clip.seek(video_time);
            return true;
        }
        false
    }

    /// Mirrors play/pause of the video onto the active external clip.
    pub fn set_playing(&mut self, playing: bool) {
        if !self.is_external_active() {
            return;
        }
        if let Some(clip) = self.external.as_mut() {
            if playing {
                clip.play();
            } else {
                clip.pause();
            }
        }
    }

    /// Keeps the external clip running at the video's rate.
    pub fn set_rate(&mut self, rate: f64) {
        self.rate = Some(rate);
        if let Some(clip) = self.external.as_mut() {
            clip.set_rate(rate);
        }
    }

    /// First error the external clip reported since the last call.
    pub fn take_external_error(&mut self) -> Option<String> {
        self.external.as_mut()?.poll_errors().into_iter().next()
    }

    /// Removes the external track and releases its clip. When it was the
    /// selection, the first embedded track takes over.
    pub fn drop_external(&mut self, video_time: f64) -> Option<AudioRoute> {
        let was_selected = self.current().is_some_and(|t| t.is_external);
        self.tracks.retain(|t| !t.is_external);
        if self.external.take().is_some() {
            debug!("external audio released");
        }
        if !was_selected {
            return None;
        }
        self.current = 0;
        if self.tracks.is_empty() {
            None
        } else {
            self.select(0, video_time)
        }
    }

    /// Drops every track and releases the external clip.
    pub fn clear(&mut self) {
        self.tracks.clear();
        self.current = 0;
        self.external = None;
        self.rate = None;
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    #[derive(Debug, Default)]
    struct ClipState {
        position: Option<f64>,
        playing: bool,
        rate: Option<f64>,
        seeks: Vec<f64>,
        errors: Vec<String>,
        dropped: bool,
    }

    struct FakeClip(Rc<RefCell<ClipState>>);

    impl ExternalClip for FakeClip {
        fn position(&self) -> Option<f64> {
            self.0.borrow().position
        }
        fn seek(&mut self, seconds: f64) {
            let mut s = self.0.borrow_mut();
            s.position = Some(seconds);
            s.seeks.push(seconds);
        }
        fn set_rate(&mut self, rate: f64) {
            self.0.borrow_mut().rate = Some(rate);
        }
        fn poll_errors(&mut self) -> Vec<String> {
            std::mem::take(&mut self.0.borrow_mut().errors)
        }
        fn play(&mut self) {
            self.0.borrow_mut().playing = true;
        }
        fn pause(&mut self) {
            self.0.borrow_mut().playing = false;
        }
    }

    impl Drop for FakeClip {
        fn drop(&mut self) {
            self.0.borrow_mut().dropped = true;
        }
    }

    fn clip() -> (Box<dyn ExternalClip>, Rc<RefCell<ClipState>>) {
        let state = Rc::new(RefCell::new(ClipState::default()));
        (Box::new(FakeClip(state.clone())), state)
    }

    fn with_two_embedded() -> TrackManager {
        let mut tm = TrackManager::new();
        tm.set_embedded(vec![
            AudioTrackInfo::embedded(0, None, Some("en".into())),
            AudioTrackInfo::embedded(1, Some("Commentary".into()), None),
        ]);
        tm
    }

    #[test]
    fn test_selecting_embedded_track() {
        let mut tm = with_two_embedded();
        assert_eq!(tm.select(1, 0.0), Some(AudioRoute::Embedded(1)));
        assert_eq!(tm.current().unwrap().label, "Commentary");
        assert_eq!(tm.select(7, 0.0), None);
        assert_eq!(tm.current_index(), 1);
    }

    #[test]
    fn test_loading_external_appends_and_selects() {
        let mut tm = with_two_embedded();
        let (c, state) = clip();
        let route = tm.load_external(c, "dub.flac".into(), 12.5);
        assert_eq!(route, Some(AudioRoute::External));
        assert_eq!(tm.tracks().len(), 3);
        assert_eq!(tm.current_index(), 2);
        assert_eq!(tm.current().unwrap().menu_label(), "dub.flac (external)");
        assert!(state.borrow().playing);
        assert_eq!(state.borrow().position, Some(12.5));

        // Back to an embedded track pauses the clip.
        assert_eq!(tm.select(0, 13.0), Some(AudioRoute::Embedded(0)));
        assert!(!state.borrow().playing);
    }

    #[test]
    fn test_replacing_external_releases_old_clip() {
        let mut tm = with_two_embedded();
        let (first, first_state) = clip();
        tm.load_external(first, "a.mp3".into(), 0.0);
        let (second, _) = clip();
        tm.load_external(second, "b.mp3".into(), 0.0);
        assert!(first_state.borrow().dropped);
        assert_eq!(tm.tracks().iter().filter(|t| t.is_external).count(), 1);
        assert_eq!(tm.current().unwrap().label, "b.mp3");
    }

    #[test]
    fn test_drift_beyond_threshold_hard_seeks() {
        let mut tm = TrackManager::new();
        let (c, state) = clip();
        tm.load_external(c, "a.wav".into(), 0.0);

        state.borrow_mut().position = Some(10.0);
        assert!(tm.sync(10.35));
        assert_eq!(tm.current().map(|t| t.is_external), Some(true));
        assert_eq!(state.borrow().position, Some(10.35));

        state.borrow_mut().position = Some(20.05);
        assert!(!tm.sync(20.0));
        assert_eq!(state.borrow().position, Some(20.05));
    }

    #[test]
    fn test_sync_ignores_inactive_external() {
        let mut tm = with_two_embedded();
        let (c, state) = clip();
        tm.load_external(c, "a.wav".into(), 0.0);
        tm.select(0, 0.0);
        state.borrow_mut().position = Some(99.0);
        assert!(!tm.sync(1.0));
        assert_eq!(state.borrow().position, Some(99.0));
    }

    #[test]
    fn test_cycle_wraps() {
        let mut tm = with_two_embedded();
        assert_eq!(tm.cycle(0.0), Some(AudioRoute::Embedded(1)));
        assert_eq!(tm.cycle(0.0), Some(AudioRoute::Embedded(0)));
        assert_eq!(TrackManager::new().cycle(0.0), None);
    }

    #[test]
    fn test_rediscovery_keeps_external_selection() {
        let mut tm = with_two_embedded();
        let (c, _) = clip();
        tm.load_external(c, "a.wav".into(), 0.0);
        tm.set_embedded(vec![AudioTrackInfo::embedded(0, None, None)]);
        assert_eq!(tm.tracks().len(), 2);
        assert!(tm.is_external_active());
        assert_eq!(tm.current().unwrap().index, 1);
    }

    #[test]
    fn test_clear_releases_everything() {
        let mut tm = with_two_embedded();
        let (c, state) = clip();
        tm.load_external(c, "a.wav".into(), 0.0);
        tm.clear();
        assert!(tm.tracks().is_empty());
        assert!(state.borrow().dropped);
        assert!(!tm.is_external_active());
    }

    #[test]
    fn test_prerolling_clip_is_not_reseeked() {
        let mut tm = TrackManager::new();
        let (c, state) = clip();
        tm.load_external(c, "a.wav".into(), 0.0);
        state.borrow_mut().position = None;
        state.borrow_mut().seeks.clear();
        for t in [1.0, 1.016, 1.033] {
            assert!(!tm.sync(t));
        }
        assert!(state.borrow().seeks.is_empty());
    }

    #[test]
    fn test_rate_reaches_current_and_later_clips() {
        let mut tm = with_two_embedded();
        let (first, first_state) = clip();
        tm.load_external(first, "a.wav".into(), 0.0);
        tm.set_rate(1.5);
        assert_eq!(first_state.borrow().rate, Some(1.5));

        let (second, second_state) = clip();
        tm.load_external(second, "b.wav".into(), 0.0);
        assert_eq!(second_state.borrow().rate, Some(1.5));

        tm.clear();
        let (third, third_state) = clip();
        tm.load_external(third, "c.wav".into(), 0.0);
        assert_eq!(third_state.borrow().rate, None);
    }

    #[test]
    fn test_failed_external_falls_back_to_embedded() {
        let mut tm = with_two_embedded();
        let (c, state) = clip();
        tm.load_external(c, "a.wav".into(), 0.0);
        assert_eq!(tm.take_external_error(), None);

        state.borrow_mut().errors.push("stream decode error".into());
        assert_eq!(tm.take_external_error().as_deref(), Some("stream decode error"));
        assert_eq!(tm.take_external_error(), None);

        assert_eq!(tm.drop_external(3.0), Some(AudioRoute::Embedded(0)));
        assert!(state.borrow().dropped);
        assert_eq!(tm.tracks().len(), 2);
        assert!(!tm.is_external_active());
        assert_eq!(tm.current_index(), 0);
    }
}
