//! Audio processing chain.
//!
//! ```text
//! Source -> Highpass -> Eq(0..10) -> Compressor -+-> Splitter -> Left/RightGain -> Merger -+-> Limiter -> Output
//!                                                +-> Panner ---------------------------------+
//! ```
//!
//! The shared upstream chain is wired once; [`AudioGraph::connect_branch`]
//! swaps only the mode-dependent middle section.

use std::collections::VecDeque;
use std::f32::consts::PI;

use tracing::debug;

use crate::types::modes::VideoMode;

pub const DEFAULT_SAMPLE_RATE: u32 = 48_000;
pub const CHANNELS: usize = 2;

pub const HIGHPASS_HZ: f32 = 30.0;
const HIGHPASS_Q: f32 = std::f32::consts::FRAC_1_SQRT_2;

pub const EQ_Q: f32 = 1.4;
/// (centre Hz, gain dB)
pub const EQ_BANDS: [(f32, f32); 10] = [
    (32.0, 0.5),
    (64.0, 1.0),
    (125.0, 2.0),
    (250.0, -1.0),
    (500.0, 0.0),
    (1000.0, 0.5),
    (2000.0, 2.0),
    (4000.0, 1.5),
    (8000.0, 3.0),
    (16000.0, 2.0),
];

pub const DEFAULT_STEREO_WIDTH: f32 = 1.5;
pub const DEFAULT_WIDTH_CAP: f32 = 2.0;
/// Values cycled by the width hotkey.
pub const STEREO_WIDTHS: [f32; 4] = [0.0, 0.5, 1.0, 1.5];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DynamicsSettings {
    pub threshold_db: f32,
    pub knee_db: f32,
    pub ratio: f32,
    /// seconds
    pub attack: f32,
    /// seconds
    pub release: f32,
}

pub const COMPRESSOR: DynamicsSettings = DynamicsSettings {
    threshold_db: -24.0,
    knee_db: 30.0,
    ratio: 4.0,
    attack: 0.003,
    release: 0.25,
};

pub const LIMITER: DynamicsSettings = DynamicsSettings {
    threshold_db: -1.0,
    knee_db: 0.0,
    ratio: 20.0,
    attack: 0.001,
    release: 0.1,
};

pub const PANNER_REF_DISTANCE: f32 = 1.0;
pub const PANNER_MAX_DISTANCE: f32 = 10_000.0;
pub const PANNER_ROLLOFF: f32 = 1.0;
/// Largest interaural time difference, seconds.
const MAX_ITD: f32 = 0.00066;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeId {
    Source,
    Highpass,
    Eq(usize),
    Compressor,
    Splitter,
    LeftGain,
    RightGain,
    Merger,
    Panner,
    Limiter,
    Output,
}

impl NodeId {
    fn in_branch(&self) -> bool {
        matches!(
            self,
            NodeId::Splitter | NodeId::LeftGain | NodeId::RightGain | NodeId::Merger | NodeId::Panner
        )
    }
}

/// Mode-dependent middle section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Branch {
    StereoWidth,
    Spatial,
}

impl Branch {
    pub fn for_mode(mode: VideoMode) -> Self {
        if mode.is_spherical() {
            Branch::Spatial
        } else {
            Branch::StereoWidth
        }
    }

    fn edges(&self) -> &'static [(NodeId, NodeId)] {
        match self {
            Branch::StereoWidth => &[
                (NodeId::Compressor, NodeId::Splitter),
                (NodeId::Splitter, NodeId::LeftGain),
                (NodeId::Splitter, NodeId::RightGain),
                (NodeId::LeftGain, NodeId::Merger),
                (NodeId::RightGain, NodeId::Merger),
                (NodeId::Merger, NodeId::Limiter),
            ],
            Branch::Spatial => &[
                (NodeId::Compressor, NodeId::Panner),
                (NodeId::Panner, NodeId::Limiter),
            ],
        }
    }
}

/// Transposed direct form II biquad with independent state per channel.
#[derive(Debug, Clone)]
pub struct Biquad {
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
    s1: [f32; CHANNELS],
    s2: [f32; CHANNELS],
}

impl Biquad {
    fn from_raw(b: [f32; 3], a: [f32; 3]) -> Self {
        Self {
            b0: b[0] / a[0],
            b1: b[1] / a[0],
            b2: b[2] / a[0],
            a1: a[1] / a[0],
            a2: a[2] / a[0],
            s1: [0.0; CHANNELS],
            s2: [0.0; CHANNELS],
        }
    }

    fn omega(freq: f32, sample_rate: f32) -> (f32, f32) {
        let w0 = 2.0 * PI * freq.min(sample_rate * 0.49) / sample_rate;
        (w0.cos(), w0.sin())
    }

    pub fn highpass(freq: f32, q: f32, sample_rate: f32) -> Self {
        let (cos, sin) = Self::omega(freq, sample_rate);
        let alpha = sin / (2.0 * q);
        Self::from_raw(
            [(1.0 + cos) / 2.0, -(1.0 + cos), (1.0 + cos) / 2.0],
            [1.0 + alpha, -2.0 * cos, 1.0 - alpha],
        )
    }

    pub fn peaking(freq: f32, q: f32, gain_db: f32, sample_rate: f32) -> Self {
        let (cos, sin) = Self::omega(freq, sample_rate);
        let a = 10f32.powf(gain_db / 40.0);
        let alpha = sin / (2.0 * q);
        Self::from_raw(
            [1.0 + alpha * a, -2.0 * cos, 1.0 - alpha * a],
            [1.0 + alpha / a, -2.0 * cos, 1.0 - alpha / a],
        )
    }

    #[inline]
    pub fn tick(&mut self, ch: usize, x: f32) -> f32 {
        let y = self.b0 * x + self.s1[ch];
        self.s1[ch] = self.b1 * x - self.a1 * y + self.s2[ch];
        self.s2[ch] = self.b2 * x - self.a2 * y;
        y
    }

    /// Linear magnitude response at `freq`.
    pub fn magnitude_at(&self, freq: f32, sample_rate: f32) -> f32 {
        let w = 2.0 * std::f64::consts::PI * freq as f64 / sample_rate as f64;
        let (c1, s1, c2, s2) = (w.cos(), w.sin(), (2.0 * w).cos(), (2.0 * w).sin());
        let [b0, b1, b2, a1, a2] = [self.b0, self.b1, self.b2, self.a1, self.a2].map(f64::from);
        let num_re = b0 + b1 * c1 + b2 * c2;
        let num_im = -(b1 * s1 + b2 * s2);
        let den_re = 1.0 + a1 * c1 + a2 * c2;
        let den_im = -(a1 * s1 + a2 * s2);
        ((num_re * num_re + num_im * num_im) / (den_re * den_re + den_im * den_im)).sqrt() as f32
    }
}

/// Feed-forward compressor with a soft knee and stereo-linked detection.
#[derive(Debug, Clone)]
pub struct Compressor {
    settings: DynamicsSettings,
    attack_coeff: f32,
    release_coeff: f32,
    envelope_db: f32,
}

impl Compressor {
    pub fn new(settings: DynamicsSettings, sample_rate: f32) -> Self {
        let coeff = |t: f32| (-1.0 / (t.max(1e-5) * sample_rate)).exp();
        Self {
            settings,
            attack_coeff: coeff(settings.attack),
            release_coeff: coeff(settings.release),
            envelope_db: 0.0,
        }
    }

    pub fn settings(&self) -> DynamicsSettings {
        self.settings
    }

    /// Static curve: output level in dB for an input level in dB.
    pub fn curve(&self, input_db: f32) -> f32 {
        let DynamicsSettings {
            threshold_db: t,
            knee_db: w,
            ratio: r,
            ..
        } = self.settings;
        let over = input_db - t;
        if 2.0 * over < -w {
            input_db
        } else if w > 0.0 && 2.0 * over.abs() <= w {
            input_db + (1.0 / r - 1.0) * (over + w / 2.0).powi(2) / (2.0 * w)
        } else {
            t + over / r
        }
    }

    #[inline]
    pub fn tick(&mut self, frame: [f32; CHANNELS]) -> [f32; CHANNELS] {
        let peak = frame[0].abs().max(frame[1].abs());
        let level_db = if peak > 1e-9 { 20.0 * peak.log10() } else { -180.0 };
        let reduction = self.curve(level_db) - level_db;
        let coeff = if reduction < self.envelope_db {
            self.attack_coeff
        } else {
            self.release_coeff
        };
        self.envelope_db = coeff * self.envelope_db + (1.0 - coeff) * reduction;
        let gain = 10f32.powf(self.envelope_db / 20.0);
        [frame[0] * gain, frame[1] * gain]
    }
}

/// Splitter, per-channel gain and merger of the flat-video branch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StereoWidth {
    width: f32,
    cap: f32,
    gain: f32,
}

impl StereoWidth {
    pub fn new(width: f32, cap: f32) -> Self {
        let mut sw = Self {
            width,
            cap,
            gain: 1.0,
        };
        sw.set_width(width);
        sw
    }

    pub fn set_width(&mut self, width: f32) -> f32 {
        self.width = width.max(0.0);
        self.gain = (1.0 + self.width).min(self.cap);
        self.gain
    }

    pub fn width(&self) -> f32 {
        self.width
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }

    #[inline]
    pub fn tick(&self, frame: [f32; CHANNELS]) -> [f32; CHANNELS] {
        [frame[0] * self.gain, frame[1] * self.gain]
    }
}

/// Positional processor for sphere modes: equal-power panning by azimuth,
/// an interaural delay on the far ear, and inverse distance attenuation.
/// The listener sits at the origin facing -Z with +Y up.
#[derive(Debug, Clone)]
pub struct Panner {
    position: [f32; 3],
    sample_rate: f32,
    gain_l: f32,
    gain_r: f32,
    distance_gain: f32,
    azimuth: f32,
    delay: [usize; CHANNELS],
    lines: [VecDeque<f32>; CHANNELS],
}

impl Panner {
    pub fn new(sample_rate: f32) -> Self {
        let mut p = Self {
            position: [0.0, 0.0, -1.0],
            sample_rate,
            gain_l: 0.0,
            gain_r: 1.0,
            distance_gain: 1.0,
            azimuth: 0.0,
            delay: [0; CHANNELS],
            lines: [VecDeque::new(), VecDeque::new()],
        };
        p.set_position(p.position);
        p
    }

    pub fn position(&self) -> [f32; 3] {
        self.position
    }

    pub fn azimuth(&self) -> f32 {
        self.azimuth
    }

    pub fn set_position(&mut self, position: [f32; 3]) {
        self.position = position;
        self.azimuth = azimuth_of(position);

        // Fold rear azimuths onto the front half-plane.
        let mut az = self.azimuth.clamp(-180.0, 180.0);
        if az < -90.0 {
            az = -180.0 - az;
        } else if az > 90.0 {
            az = 180.0 - az;
        }
        let x = if az <= 0.0 { (az + 90.0) / 90.0 } else { az / 90.0 };
        self.gain_l = (x * PI / 2.0).cos();
        self.gain_r = (x * PI / 2.0).sin();
        self.azimuth = az;

        let distance = norm(position).clamp(PANNER_REF_DISTANCE, PANNER_MAX_DISTANCE);
        self.distance_gain = PANNER_REF_DISTANCE
            / (PANNER_REF_DISTANCE + PANNER_ROLLOFF * (distance - PANNER_REF_DISTANCE));

        let itd = (az.to_radians().sin().abs() * MAX_ITD * self.sample_rate).round() as usize;
        self.delay = if az > 0.0 { [itd, 0] } else { [0, itd] };
    }

    pub fn gains(&self) -> (f32, f32) {
        (self.gain_l, self.gain_r)
    }

    pub fn reset(&mut self) {
        for line in &mut self.lines {
            line.clear();
        }
    }

    #[inline]
    pub fn tick(&mut self, frame: [f32; CHANNELS]) -> [f32; CHANNELS] {
        let [l, r] = frame;
        let (out_l, out_r) = if self.azimuth <= 0.0 {
            (l + r * self.gain_l, r * self.gain_r)
        } else {
            (l * self.gain_l, r + l * self.gain_r)
        };
        let mut out = [out_l * self.distance_gain, out_r * self.distance_gain];
        for (ch, sample) in out.iter_mut().enumerate() {
            let line = &mut self.lines[ch];
            line.push_back(*sample);
            while line.len() > self.delay[ch] + 1 {
                line.pop_front();
            }
            *sample = if line.len() > self.delay[ch] {
                line.front().copied().unwrap_or(0.0)
            } else {
                0.0
            };
        }
        out
    }
}

fn norm(v: [f32; 3]) -> f32 {
    (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt()
}

/// Azimuth in degrees of `position` as heard by the fixed listener:
/// 0 straight ahead, +90 to the right, -90 to the left.
pub fn azimuth_of(position: [f32; 3]) -> f32 {
    let len = norm(position);
    if len < 1e-6 {
        return 0.0;
    }
    let dir = [position[0] / len, position[1] / len, position[2] / len];
    // right = (1,0,0), up = (0,1,0), front = (0,0,-1)
    let projected = [dir[0], 0.0, dir[2]];
    let plen = norm(projected);
    if plen < 1e-6 {
        return 0.0;
    }
    let cos_right = (projected[0] / plen).clamp(-1.0, 1.0);
    let mut az = cos_right.acos().to_degrees();
    if -projected[2] / plen < 0.0 {
        az = 360.0 - az;
    }
    if (0.0..=270.0).contains(&az) {
        90.0 - az
    } else {
        450.0 - az
    }
}

/// Whole processing graph. Lives behind a mutex shared with the streaming
/// thread, so every mutation is atomic from either side's point of view.
#[derive(Debug, Clone)]
pub struct AudioGraph {
    sample_rate: f32,
    highpass: Biquad,
    eq: Vec<Biquad>,
    compressor: Compressor,
    width: StereoWidth,
    panner: Panner,
    limiter: Compressor,
    output_gain: f32,
    branch: Option<Branch>,
    edges: Vec<(NodeId, NodeId)>,
}

impl AudioGraph {
    /// Builds the shared chain. No branch is connected until
    /// [`connect_branch`](Self::connect_branch), so the graph is silent.
    pub fn new(sample_rate: u32, width_cap: f32) -> Self {
        let sr = sample_rate as f32;
        let mut edges = vec![(NodeId::Source, NodeId::Highpass), (NodeId::Highpass, NodeId::Eq(0))];
        for i in 0..EQ_BANDS.len() - 1 {
            edges.push((NodeId::Eq(i), NodeId::Eq(i + 1)));
        }
        edges.push((NodeId::Eq(EQ_BANDS.len() - 1), NodeId::Compressor));
        edges.push((NodeId::Limiter, NodeId::Output));

        Self {
            sample_rate: sr,
            highpass: Biquad::highpass(HIGHPASS_HZ, HIGHPASS_Q, sr),
            eq: EQ_BANDS
                .iter()
                .map(|&(f, g)| Biquad::peaking(f, EQ_Q, g, sr))
                .collect(),
            compressor: Compressor::new(COMPRESSOR, sr),
            width: StereoWidth::new(DEFAULT_STEREO_WIDTH, width_cap),
            panner: Panner::new(sr),
            limiter: Compressor::new(LIMITER, sr),
            output_gain: 1.0,
            branch: None,
            edges,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate as u32
    }

    pub fn branch(&self) -> Option<Branch> {
        self.branch
    }

    pub fn edges(&self) -> &[(NodeId, NodeId)] {
        &self.edges
    }

    /// Disconnects whatever branch is wired and connects the one for `mode`.
    /// Safe to call repeatedly and before anything is connected.
    pub fn connect_branch(&mut self, mode: VideoMode) {
        let branch = Branch::for_mode(mode);
        self.edges
            .retain(|(from, to)| !from.in_branch() && !to.in_branch());
        self.edges.extend_from_slice(branch.edges());
        if self.branch != Some(branch) {
            self.panner.reset();
            debug!(?branch, "audio branch connected");
        }
        self.branch = Some(branch);
    }

    /// True when a path leads from the source to the output.
    pub fn is_fully_connected(&self) -> bool {
        let mut seen = vec![NodeId::Source];
        let mut frontier = vec![NodeId::Source];
        while let Some(node) = frontier.pop() {
            if node == NodeId::Output {
                return true;
            }
            for (from, to) in &self.edges {
                if *from == node && !seen.contains(to) {
                    seen.push(*to);
                    frontier.push(*to);
                }
            }
        }
        false
    }

    pub fn set_stereo_width(&mut self, width: f32) -> f32 {
        self.width.set_width(width)
    }

    pub fn stereo_width(&self) -> &StereoWidth {
        &self.width
    }

    /// Places the source opposite the camera's look vector.
    pub fn set_listener_look(&mut self, look: [f32; 3]) {
        self.panner.set_position([-look[0], -look[1], -look[2]]);
    }

    pub fn panner(&self) -> &Panner {
        &self.panner
    }

    pub fn set_output_gain(&mut self, gain: f32) {
        self.output_gain = gain.max(0.0);
    }

    pub fn output_gain(&self) -> f32 {
        self.output_gain
    }

    pub fn compressor(&self) -> &Compressor {
        &self.compressor
    }

    pub fn limiter(&self) -> &Compressor {
        &self.limiter
    }

    pub fn eq(&self) -> &[Biquad] {
        &self.eq
    }

    /// Processes interleaved stereo samples in place.
    pub fn process(&mut self, samples: &mut [f32]) {
        let Some(branch) = self.branch else {
            samples.fill(0.0);
            return;
        };
        for frame in samples.chunks_exact_mut(CHANNELS) {
            let mut f = [frame[0], frame[1]];
            for (ch, s) in f.iter_mut().enumerate() {
                let mut x = self.highpass.tick(ch, *s);
                for band in &mut self.eq {
                    x = band.tick(ch, x);
                }
                *s = x;
            }
            f = self.compressor.tick(f);
            f = match branch {
                Branch::StereoWidth => self.width.tick(f),
                Branch::Spatial => self.panner.tick(f),
            };
            f = self.limiter.tick(f);
            frame[0] = f[0] * self.output_gain;
            frame[1] = f[1] * self.output_gain;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f32, frames: usize, amp: f32) -> Vec<f32> {
        (0..frames)
            .flat_map(|i| {
                let s = amp * (2.0 * PI * freq * i as f32 / DEFAULT_SAMPLE_RATE as f32).sin();
                [s, s]
            })
            .collect()
    }

    #[test]
    fn test_reconnect_is_idempotent() {
        let mut graph = AudioGraph::new(DEFAULT_SAMPLE_RATE, DEFAULT_WIDTH_CAP);
        assert!(!graph.is_fully_connected());

        for mode in [VideoMode::Flat, VideoMode::Mono] {
            graph.connect_branch(mode);
            let first = graph.edges().to_vec();
            graph.connect_branch(mode);
            assert_eq!(graph.edges(), first.as_slice());
            assert!(graph.is_fully_connected());

            let mut dedup = first.clone();
            dedup.sort();
            dedup.dedup();
            assert_eq!(dedup.len(), first.len(), "duplicate edges for {mode}");
        }
    }

    #[test]
    fn test_reconnect_swaps_only_the_branch() {
        let mut graph = AudioGraph::new(DEFAULT_SAMPLE_RATE, DEFAULT_WIDTH_CAP);
        graph.connect_branch(VideoMode::Flat);
        let shared: Vec<_> = graph
            .edges()
            .iter()
            .filter(|(a, b)| !a.in_branch() && !b.in_branch())
            .copied()
            .collect();

        graph.connect_branch(VideoMode::StereoTB);
        assert_eq!(graph.branch(), Some(Branch::Spatial));
        assert!(graph.edges().contains(&(NodeId::Compressor, NodeId::Panner)));
        assert!(!graph.edges().iter().any(|(a, _)| *a == NodeId::Splitter));
        for edge in shared {
            assert!(graph.edges().contains(&edge));
        }
    }

    #[test]
    fn test_unconnected_graph_is_silent_and_connected_graph_is_not() {
        let mut graph = AudioGraph::new(DEFAULT_SAMPLE_RATE, DEFAULT_WIDTH_CAP);
        let mut buf = sine(1000.0, 4800, 0.1);
        graph.process(&mut buf);
        assert!(buf.iter().all(|s| *s == 0.0));

        graph.connect_branch(VideoMode::Flat);
        let mut buf = sine(1000.0, 4800, 0.1);
        graph.process(&mut buf);
        let energy: f32 = buf.iter().map(|s| s * s).sum();
        assert!(energy > 1.0);
    }

    #[test]
    fn test_output_never_exceeds_full_scale_after_settling() {
        let mut graph = AudioGraph::new(DEFAULT_SAMPLE_RATE, DEFAULT_WIDTH_CAP);
        graph.connect_branch(VideoMode::Flat);
        let mut buf = sine(440.0, 48_000, 1.0);
        graph.process(&mut buf);
        let tail_peak = buf[48_000..].iter().fold(0.0f32, |m, s| m.max(s.abs()));
        assert!(tail_peak < 1.2, "peak {tail_peak}");
    }

    #[test]
    fn test_width_gain_is_capped() {
        let mut graph = AudioGraph::new(DEFAULT_SAMPLE_RATE, DEFAULT_WIDTH_CAP);
        assert_eq!(graph.stereo_width().gain(), 2.0);
        assert_eq!(graph.set_stereo_width(0.5), 1.5);
        assert_eq!(graph.set_stereo_width(0.0), 1.0);
        let mut loose = AudioGraph::new(DEFAULT_SAMPLE_RATE, 3.0);
        assert_eq!(loose.set_stereo_width(1.5), 2.5);
    }

    #[test]
    fn test_peaking_band_gain_matches_table() {
        let sr = DEFAULT_SAMPLE_RATE as f32;
        for (freq, gain_db) in EQ_BANDS {
            let band = Biquad::peaking(freq, EQ_Q, gain_db, sr);
            let measured = 20.0 * band.magnitude_at(freq, sr).log10();
            assert!((measured - gain_db).abs() < 0.05, "{freq} Hz: {measured}");
        }
    }

    #[test]
    fn test_highpass_cuts_rumble() {
        let sr = DEFAULT_SAMPLE_RATE as f32;
        let hp = Biquad::highpass(HIGHPASS_HZ, HIGHPASS_Q, sr);
        assert!(hp.magnitude_at(5.0, sr) < 0.05);
        assert!((hp.magnitude_at(1000.0, sr) - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_compressor_curve() {
        let comp = Compressor::new(COMPRESSOR, DEFAULT_SAMPLE_RATE as f32);
        assert_eq!(comp.curve(-60.0), -60.0);
        assert!((comp.curve(0.0) - (-24.0 + 24.0 / 4.0)).abs() < 1e-4);
        let lim = Compressor::new(LIMITER, DEFAULT_SAMPLE_RATE as f32);
        assert_eq!(lim.curve(-3.0), -3.0);
        assert!((lim.curve(19.0) - 0.0).abs() < 1e-4);
    }

    #[test]
    fn test_panner_follows_inverse_look() {
        let mut graph = AudioGraph::new(DEFAULT_SAMPLE_RATE, DEFAULT_WIDTH_CAP);
        // Looking along -Z puts the source straight ahead (+Z is behind).
        graph.set_listener_look([0.0, 0.0, 1.0]);
        assert_eq!(graph.panner().position(), [0.0, 0.0, -1.0]);
        assert!(graph.panner().azimuth().abs() < 1e-4);

        // Looking left (-X) puts the source to the right.
        graph.set_listener_look([-1.0, 0.0, 0.0]);
        assert!((graph.panner().azimuth() - 90.0).abs() < 1e-4);
        let (l, r) = graph.panner().gains();
        assert!(l.abs() < 1e-6 && (r - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_azimuth_of_cardinal_directions() {
        assert!((azimuth_of([0.0, 0.0, -1.0])).abs() < 1e-4);
        assert!((azimuth_of([1.0, 0.0, 0.0]) - 90.0).abs() < 1e-4);
        assert!((azimuth_of([-1.0, 0.0, 0.0]) + 90.0).abs() < 1e-4);
        assert!((azimuth_of([0.0, 0.0, 1.0]).abs() - 180.0).abs() < 1e-4);
        assert_eq!(azimuth_of([0.0, 1.0, 0.0]), 0.0);
    }
}
