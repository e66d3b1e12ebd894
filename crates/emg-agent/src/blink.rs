use std::time::{Duration, Instant};

use emg_config::BlinkConfig;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Derives the `blinking` flag for bundles that ask for auto-blink.
///
/// Eyes open for a random `initial_open_ms` span, close for `closed_ms`,
/// then stay open for `open_ms`, repeating. While disabled the eyes are
/// held open and the cycle starts over on the next enable.
#[derive(Debug, Clone)]
pub struct BlinkController<R = StdRng> {
    timing: BlinkConfig,
    rng: R,
    closed: bool,
    /// Start of the current phase and how long it lasts.
    phase: Option<(Instant, Duration)>,
}

impl BlinkController {
    /// Controller with an entropy-seeded RNG.
    pub fn new(timing: BlinkConfig) -> Self {
        Self::with_rng(timing, StdRng::from_entropy())
    }
}

impl<R: Rng> BlinkController<R> {
    /// Controller with an explicit RNG.
    pub fn with_rng(timing: BlinkConfig, rng: R) -> Self {
        Self {
            timing,
            rng,
            closed: false,
            phase: None,
        }
    }

    /// Whether the eyes are closed right now.
    pub fn is_blinking(&self) -> bool {
        self.closed
    }

    /// When the current phase ends, if a cycle is in progress.
    pub fn next_change(&self) -> Option<Instant> {
        self.phase.map(|(since, hold)| since + hold)
    }

    /// Advance the blink cycle. Returns the new blink state when it changed.
    pub fn tick(&mut self, now: Instant, enabled: bool) -> Option<bool> {
        if !enabled {
            self.phase = None;
            if self.closed {
                self.closed = false;
                return Some(false);
            }
            return None;
        }

        let Some((since, hold)) = self.phase else {
            let hold = self.draw(self.timing.initial_open_ms);
            self.phase = Some((now, hold));
            return None;
        };
        if now.saturating_duration_since(since) < hold {
            return None;
        }

        self.closed = !self.closed;
        let range = if self.closed {
            self.timing.closed_ms
        } else {
            self.timing.open_ms
        };
        let hold = self.draw(range);
        self.phase = Some((now, hold));
        tracing::trace!(blinking = self.closed, hold_ms = hold.as_millis() as u64, "blink phase");
        Some(self.closed)
    }

    /// Open the eyes and forget the current cycle.
    pub fn reset(&mut self) {
        self.closed = false;
        self.phase = None;
    }

    fn draw(&mut self, [min, max]: [u64; 2]) -> Duration {
        let (low, high) = (min.min(max), min.max(max));
        Duration::from_millis(self.rng.gen_range(low..=high))
    }
}
