use std::path::PathBuf;

pub const PLAYBACK_SPEEDS: [f64; 6] = [0.5, 0.75, 1.0, 1.25, 1.5, 2.0];

/// Runtime state of the one video that is currently loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackSession {
    pub source: PathBuf,
    pub is_playing: bool,
    pub current_time: f64, // seconds
    pub duration: Option<f64>,
    pub volume: f64,
    pub muted: bool,
    pub playback_rate: f64,
}

impl PlaybackSession {
    pub fn new(source: PathBuf) -> Self {
        Self {
            source,
            is_playing: false,
            current_time: 0.0,
            duration: None,
            volume: 1.0,
            muted: false,
            playback_rate: 1.0,
        }
    }

    pub fn set_volume(&mut self, volume: f64) {
        self.volume = volume.clamp(0.0, 1.0);
    }

    pub fn nudge_volume(&mut self, delta: f64) {
        self.set_volume(self.volume + delta);
    }

    /// Target time for a relative seek, clamped to the known duration.
    pub fn seek_target(&self, delta: f64) -> f64 {
        let t = (self.current_time + delta).max(0.0);
        match self.duration {
            Some(d) => t.min(d),
            None => t,
        }
    }

    /// Advance to the next rate in [`PLAYBACK_SPEEDS`], wrapping around.
    pub fn cycle_speed(&mut self) -> f64 {
        let idx = PLAYBACK_SPEEDS
            .iter()
            .position(|s| (*s - self.playback_rate).abs() < f64::EPSILON)
            .map(|i| (i + 1) % PLAYBACK_SPEEDS.len())
            .unwrap_or(2);
        self.playback_rate = PLAYBACK_SPEEDS[idx];
        self.playback_rate
    }

    /// Gain applied at the end of the audio graph.
    pub fn output_gain(&self) -> f32 {
        if self.muted { 0.0 } else { self.volume as f32 }
    }

    /// "mm:ss / mm:ss" as shown in the control bar.
    pub fn time_label(&self) -> String {
        fn mmss(t: f64) -> String {
            let t = t.max(0.0) as u64;
            format!("{:02}:{:02}", t / 60, t % 60)
        }
        format!(
            "{} / {}",
            mmss(self.current_time),
            mmss(self.duration.unwrap_or(0.0))
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_volume_is_clamped() {
        let mut s = PlaybackSession::new(PathBuf::from("a.mp4"));
        s.nudge_volume(0.5);
        assert_eq!(s.volume, 1.0);
        s.set_volume(-3.0);
        assert_eq!(s.volume, 0.0);
    }

    #[test]
    fn test_cycle_speed_wraps() {
        let mut s = PlaybackSession::new(PathBuf::from("a.mp4"));
        assert_eq!(s.cycle_speed(), 1.25);
        assert_eq!(s.cycle_speed(), 1.5);
        assert_eq!(s.cycle_speed(), 2.0);
        assert_eq!(s.cycle_speed(), 0.5);
    }

    #[test]
    fn test_seek_target_clamps_to_duration() {
        let mut s = PlaybackSession::new(PathBuf::from("a.mp4"));
        s.duration = Some(12.0);
        s.current_time = 9.0;
        assert_eq!(s.seek_target(5.0), 12.0);
        assert_eq!(s.seek_target(-20.0), 0.0);
    }

    #[test]
    fn test_time_label() {
        let mut s = PlaybackSession::new(PathBuf::from("a.mp4"));
        s.current_time = 75.4;
        s.duration = Some(3600.0);
        assert_eq!(s.time_label(), "01:15 / 60:00");
    }
}
