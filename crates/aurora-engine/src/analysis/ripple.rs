//! Fixed-capacity pool of decaying ripple events.
//!
//! Beat onsets request ripples; a sliding-window rate limiter with a cooldown
//! keeps dense transient passages from flooding the visuals. The pool holds at
//! most [`MAX_RIPPLES`] live events, evicting the oldest when full.

use std::collections::VecDeque;

use super::bands::BandKind;
use super::beat::RippleRequest;

/// Pool capacity; the snapshot's padded ripple array has this length.
pub const MAX_RIPPLES: usize = 12;

/// Sliding window length for the creation rate limiter.
const RATE_WINDOW_SECS: f64 = 0.5;

/// Creations allowed inside one window before the cooldown trips.
const RATE_LIMIT: usize = 9;

/// Enforced quiet period once the rate limit is hit.
const COOLDOWN_SECS: f64 = 0.3;

/// Fade-out allowance added to every ripple lifetime.
const FADE_BUFFER_SECS: f32 = 0.1;

/// One live ripple. Immutable after creation; identity is the pool slot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ripple {
    pub start_time: f64,
    pub center_x: f32,
    pub center_y: f32,
    /// Beat intensity at creation, 0.0-1.0.
    pub intensity: f32,
    pub width: f32,
    pub min_radius: f32,
    pub max_radius: f32,
    /// Band-specific brightness multiplier applied by the renderer.
    pub intensity_mult: f32,
    /// Seconds until removal; sized so the ring finishes traversing its
    /// radius range before fading.
    pub lifetime: f32,
}

impl Ripple {
    pub fn age(&self, now: f64) -> f32 {
        (now - self.start_time).max(0.0) as f32
    }

    pub fn expired(&self, now: f64) -> bool {
        self.age(now) > self.lifetime
    }
}

/// Band geometry: (center_y at zero intensity, center_y at full intensity,
/// ring width, base max radius, intensity multiplier).
fn band_geometry(band: BandKind) -> (f32, f32, f32, f32, f32) {
    match band {
        BandKind::Bass => (-0.15, -0.4, 0.15, 0.88, 0.65),
        BandKind::Mid => (0.0, 0.0, 0.05, 1.3, 0.8),
        BandKind::Treble => (0.25, 0.25, 0.07, 0.5, 0.55),
    }
}

/// Fixed-capacity ripple pool with creation rate limiting.
pub struct RippleTracker {
    ripples: Vec<Ripple>,
    /// Creation timestamps inside the rate window, oldest first.
    created: VecDeque<f64>,
    cooldown_until: f64,
    /// Outward ring propagation speed in radius units per second.
    speed: f32,
}

impl RippleTracker {
    pub fn new(speed: f32) -> Self {
        Self {
            ripples: Vec::with_capacity(MAX_RIPPLES),
            created: VecDeque::with_capacity(RATE_LIMIT + 1),
            cooldown_until: 0.0,
            speed,
        }
    }

    pub fn set_speed(&mut self, speed: f32) {
        self.speed = speed;
    }

    /// Spawn a ripple for a beat onset, subject to the rate limiter.
    /// A rejected spawn is a designed no-op, not an error.
    pub fn try_spawn(&mut self, req: &RippleRequest) -> bool {
        if !self.can_create(req.time) {
            return false;
        }

        self.prune(req.time);
        if self.ripples.len() == MAX_RIPPLES {
            self.ripples.remove(0);
        }
        self.ripples.push(self.build(req));
        self.created.push_back(req.time);
        true
    }

    /// Leaky-bucket limiter: reject during cooldown; otherwise trim the
    /// creation window and trip the cooldown once it fills.
    fn can_create(&mut self, now: f64) -> bool {
        if now < self.cooldown_until {
            return false;
        }
        while let Some(&t) = self.created.front() {
            if now - t > RATE_WINDOW_SECS {
                self.created.pop_front();
            } else {
                break;
            }
        }
        if self.created.len() >= RATE_LIMIT {
            self.cooldown_until = now + COOLDOWN_SECS;
            return false;
        }
        true
    }

    fn build(&self, req: &RippleRequest) -> Ripple {
        let intensity = req.intensity.clamp(0.0, 1.0);
        let (y_lo, y_hi, width, base_max, mult) = band_geometry(req.band);

        let min_radius = 0.0;
        let max_radius = base_max * (0.5 + intensity * 0.5);
        let lifetime = (max_radius - min_radius) / self.speed + FADE_BUFFER_SECS;

        Ripple {
            start_time: req.time,
            center_x: req.stereo.clamp(-1.0, 1.0) * 0.5,
            center_y: y_lo + (y_hi - y_lo) * intensity,
            intensity,
            width,
            min_radius,
            max_radius,
            intensity_mult: mult,
            lifetime,
        }
    }

    /// Drop expired ripples. Idempotent; safe to call at snapshot time.
    pub fn prune(&mut self, now: f64) {
        self.ripples.retain(|r| !r.expired(now));
    }

    /// Live ripples, oldest first.
    pub fn live(&self) -> &[Ripple] {
        &self.ripples
    }

    pub fn len(&self) -> usize {
        self.ripples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ripples.is_empty()
    }

    pub fn reset(&mut self) {
        self.ripples.clear();
        self.created.clear();
        self.cooldown_until = 0.0;
    }
}
