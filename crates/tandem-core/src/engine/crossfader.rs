//! Crossfader - one scalar blending the two decks' gains
//!
//! A single control value in [0, 1] with 0.5 as the neutral midpoint.
//! Moving it recomputes both deck gains with a linear law:
//!
//! ```text
//! gain_a = 1 - value        gain_b = value
//! ```
//!
//! so 0.0 is deck A solo, 1.0 is deck B solo. Exactly at the midpoint
//! neither gain is touched: the decks keep whatever their own volume
//! controls last set. The center dead zone falls out of strict-inequality
//! branching around the midpoint rather than an explicit product choice;
//! keep it as-is until that choice is made, likewise the linear law vs an
//! equal-power curve.
//!
//! Data flows one way: crossfader -> deck gains. The crossfader never
//! reads gains back.

/// Neutral midpoint of the crossfade range
pub const CROSSFADE_CENTER: f32 = 0.5;

/// Crossfade control state
pub struct Crossfader {
    value: f32,
}

impl Crossfader {
    /// Start at the center detent
    pub fn new() -> Self {
        Self {
            value: CROSSFADE_CENTER,
        }
    }

    /// Current control value in [0, 1]
    pub fn value(&self) -> f32 {
        self.value
    }

    /// Move the fader. Out-of-range values are rejected at the control
    /// surface; the clamp here is a backstop.
    pub fn set_value(&mut self, value: f32) {
        self.value = value.clamp(0.0, 1.0);
    }

    /// Gains implied by the current position, as (deck A, deck B)
    ///
    /// `None` exactly at the center: the dead zone where deck gains are
    /// left alone.
    pub fn gains(&self) -> Option<(f32, f32)> {
        gains_for(self.value)
    }
}

impl Default for Crossfader {
    fn default() -> Self {
        Self::new()
    }
}

/// The fade law as a pure function of the control value
pub fn gains_for(value: f32) -> Option<(f32, f32)> {
    if value == CROSSFADE_CENTER {
        return None;
    }
    Some((1.0 - value, value))
}
