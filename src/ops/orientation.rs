//! Camera orientation from pointer drags, touches and the wheel.
//!
//! Angles are in degrees. `lon`/`lat` chase `target_lon`/`target_lat` by a
//! fixed fraction per frame, which gives the drag its inertia.

pub const DRAG_SENSITIVITY: f32 = 0.2;
pub const EASING: f32 = 0.1;
pub const MAX_LATITUDE: f32 = 85.0;

pub const DEFAULT_FOV: f32 = 90.0;
pub const MIN_FOV: f32 = 30.0;
pub const MAX_FOV: f32 = 120.0;
/// Upper bound when zooming with ctrl held.
pub const MAX_FOV_EXTENDED: f32 = 150.0;
pub const WHEEL_FOV_FACTOR: f32 = 0.05;

pub const WHEEL_SEEK_SECONDS: f64 = 5.0;
pub const WHEEL_VOLUME_STEP: f64 = 0.05;

/// What a wheel notch turned into. The controller only applies zoom itself.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WheelAction {
    Zoom(f32),
    Seek(f64),
    Volume(f64),
    Ignored,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WheelModifiers {
    pub ctrl: bool,
    pub shift: bool,
}

#[derive(Debug, Clone)]
pub struct OrientationController {
    lon: f32,
    lat: f32,
    target_lon: f32,
    target_lat: f32,
    fov: f32,
    dragging: bool,
    last_pointer: (f32, f32),
    locked: bool,
}

impl Default for OrientationController {
    fn default() -> Self {
        Self {
            lon: 0.0,
            lat: 0.0,
            target_lon: 0.0,
            target_lat: 0.0,
            fov: DEFAULT_FOV,
            dragging: false,
            last_pointer: (0.0, 0.0),
            locked: false,
        }
    }
}

impl OrientationController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lon(&self) -> f32 {
        self.lon
    }

    pub fn lat(&self) -> f32 {
        self.lat
    }

    pub fn target(&self) -> (f32, f32) {
        (self.target_lon, self.target_lat)
    }

    pub fn fov(&self) -> f32 {
        self.fov
    }

    pub fn is_dragging(&self) -> bool {
        self.dragging
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Flat mode locks the camera; input is ignored until unlocked.
    pub fn set_locked(&mut self, locked: bool) {
        self.locked = locked;
        if locked {
            self.dragging = false;
        }
    }

    pub fn pointer_down(&mut self, x: f32, y: f32) {
        if self.locked {
            return;
        }
        self.dragging = true;
        self.last_pointer = (x, y);
    }

    pub fn pointer_move(&mut self, x: f32, y: f32) {
        if self.locked || !self.dragging {
            return;
        }
        let (dx, dy) = (x - self.last_pointer.0, y - self.last_pointer.1);
        self.last_pointer = (x, y);
        self.target_lon += dx * DRAG_SENSITIVITY;
        self.target_lat -= dy * DRAG_SENSITIVITY;
    }

    pub fn pointer_up(&mut self) {
        self.dragging = false;
    }

    /// Only single-finger touches rotate the view.
    pub fn touch_start(&mut self, touches: &[(f32, f32)]) {
        if let [(x, y)] = touches {
            self.pointer_down(*x, *y);
        }
    }

    pub fn touch_move(&mut self, touches: &[(f32, f32)]) {
        if let [(x, y)] = touches {
            self.pointer_move(*x, *y);
        }
    }

    pub fn touch_end(&mut self) {
        self.pointer_up();
    }

    /// `dy` follows the browser convention: positive scrolls down / zooms out.
    pub fn wheel(&mut self, dy: f32, modifiers: WheelModifiers, flat: bool) -> WheelAction {
        if flat {
            let step = if dy > 0.0 { -WHEEL_VOLUME_STEP } else { WHEEL_VOLUME_STEP };
            return WheelAction::Volume(step);
        }
        if self.locked || dy == 0.0 {
            return WheelAction::Ignored;
        }
        if modifiers.ctrl {
            self.fov = (self.fov + dy * WHEEL_FOV_FACTOR).clamp(MIN_FOV, MAX_FOV_EXTENDED);
            WheelAction::Zoom(self.fov)
        } else if modifiers.shift {
            let delta = if dy > 0.0 { WHEEL_SEEK_SECONDS } else { -WHEEL_SEEK_SECONDS };
            WheelAction::Seek(delta)
        } else {
            self.fov = (self.fov + dy * WHEEL_FOV_FACTOR).clamp(MIN_FOV, MAX_FOV);
            WheelAction::Zoom(self.fov)
        }
    }

    /// One frame of easing. Frame-rate dependent on purpose: the step is a
    /// fixed fraction per rendered frame.
    pub fn ease(&mut self) {
        self.lon += (self.target_lon - self.lon) * EASING;
        self.lat += (self.target_lat - self.lat) * EASING;
        if !self.locked {
            self.lat = self.lat.clamp(-MAX_LATITUDE, MAX_LATITUDE);
        }
    }

    /// Sets current and target longitude together so no easing sweep follows.
    pub fn set_longitude(&mut self, lon: f32) {
        self.lon = lon;
        self.target_lon = lon;
    }

    pub fn reset(&mut self) {
        self.lon = 0.0;
        self.lat = 0.0;
        self.target_lon = 0.0;
        self.target_lat = 0.0;
    }

    /// Polar angle from the zenith, radians.
    pub fn phi(&self) -> f32 {
        (90.0 - self.lat).to_radians()
    }

    pub fn theta(&self) -> f32 {
        self.lon.to_radians()
    }

    /// Unit vector the camera looks along.
    pub fn look_vector(&self) -> [f32; 3] {
        let (phi, theta) = (self.phi(), self.theta());
        [phi.sin() * theta.cos(), phi.cos(), phi.sin() * theta.sin()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drag(c: &mut OrientationController, from: (f32, f32), to: (f32, f32)) {
        c.pointer_down(from.0, from.1);
        c.pointer_move(to.0, to.1);
        c.pointer_up();
    }

    #[test]
    fn test_drag_moves_target_not_current() {
        let mut c = OrientationController::new();
        drag(&mut c, (100.0, 100.0), (150.0, 80.0));
        assert_eq!(c.target(), (10.0, 4.0));
        assert_eq!((c.lon(), c.lat()), (0.0, 0.0));
        c.ease();
        assert!((c.lon() - 1.0).abs() < 1e-6);
        assert!((c.lat() - 0.4).abs() < 1e-6);
    }

    #[test]
    fn test_move_without_press_is_ignored() {
        let mut c = OrientationController::new();
        c.pointer_move(500.0, 500.0);
        assert_eq!(c.target(), (0.0, 0.0));
        assert!(!c.is_dragging());
    }

    #[test]
    fn test_latitude_stays_clamped_for_any_drag() {
        let mut c = OrientationController::new();
        drag(&mut c, (0.0, 0.0), (0.0, -10_000.0));
        for _ in 0..200 {
            c.ease();
            assert!(c.lat() <= MAX_LATITUDE);
        }
        assert_eq!(c.lat(), MAX_LATITUDE);

        drag(&mut c, (0.0, 0.0), (0.0, 50_000.0));
        for _ in 0..200 {
            c.ease();
            assert!(c.lat() >= -MAX_LATITUDE);
        }
    }

    #[test]
    fn test_multi_touch_is_ignored() {
        let mut c = OrientationController::new();
        c.touch_start(&[(0.0, 0.0), (10.0, 10.0)]);
        c.touch_move(&[(50.0, 0.0), (60.0, 10.0)]);
        assert_eq!(c.target(), (0.0, 0.0));

        c.touch_start(&[(0.0, 0.0)]);
        c.touch_move(&[(50.0, 0.0)]);
        c.touch_end();
        assert_eq!(c.target(), (10.0, 0.0));
    }

    #[test]
    fn test_wheel_zoom_clamps() {
        let mut c = OrientationController::new();
        let plain = WheelModifiers::default();
        for _ in 0..100 {
            c.wheel(100.0, plain, false);
        }
        assert_eq!(c.fov(), MAX_FOV);

        let ctrl = WheelModifiers { ctrl: true, shift: false };
        for _ in 0..100 {
            c.wheel(100.0, ctrl, false);
        }
        assert_eq!(c.fov(), MAX_FOV_EXTENDED);

        for _ in 0..100 {
            c.wheel(-100.0, plain, false);
        }
        assert_eq!(c.fov(), MIN_FOV);
    }

    #[test]
    fn test_shift_wheel_seeks_without_zoom() {
        let mut c = OrientationController::new();
        let shift = WheelModifiers { ctrl: false, shift: true };
        assert_eq!(c.wheel(3.0, shift, false), WheelAction::Seek(5.0));
        assert_eq!(c.wheel(-3.0, shift, false), WheelAction::Seek(-5.0));
        assert_eq!(c.fov(), DEFAULT_FOV);
    }

    #[test]
    fn test_flat_mode_locks_camera_and_wheel_drives_volume() {
        let mut c = OrientationController::new();
        c.set_locked(true);
        drag(&mut c, (0.0, 0.0), (100.0, 100.0));
        assert_eq!(c.target(), (0.0, 0.0));
        assert_eq!(
            c.wheel(1.0, WheelModifiers::default(), true),
            WheelAction::Volume(-WHEEL_VOLUME_STEP)
        );
        assert_eq!(
            c.wheel(-1.0, WheelModifiers::default(), true),
            WheelAction::Volume(WHEEL_VOLUME_STEP)
        );
        assert_eq!(c.fov(), DEFAULT_FOV);
    }

    #[test]
    fn test_look_vector() {
        let mut c = OrientationController::new();
        let v = c.look_vector();
        assert!((v[0] - 1.0).abs() < 1e-6 && v[1].abs() < 1e-6 && v[2].abs() < 1e-6);

        c.set_longitude(90.0);
        let v = c.look_vector();
        assert!((v[2] - 1.0).abs() < 1e-6);
        assert_eq!(c.target().0, 90.0);

        c.reset();
        assert_eq!((c.lon(), c.lat(), c.target()), (0.0, 0.0, (0.0, 0.0)));
    }
}
