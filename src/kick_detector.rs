#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Left,
    Right,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Left => "left",
            Direction::Right => "right",
        }
    }

    /// Index of the sound played for this direction.
    pub fn sound_index(&self) -> usize {
        match self {
            Direction::Left => 0,
            Direction::Right => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KickEvent {
    pub direction: Direction,
    pub magnitude: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct DetectorConfig {
    /// Base trigger level in m/s², applied symmetrically to both sides.
    pub threshold: f64,
    /// Fraction of the opposite side's last peak a new extremum has to clear.
    pub damping: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            threshold: 1.5,
            damping: 0.666,
        }
    }
}

/// Edge detector over the filtered acceleration trace.
///
/// Extrema are found by a sign change of the backward difference. Every
/// extremum beyond the base threshold is recorded as that side's peak, but a
/// kick is only reported when it also clears a threshold scaled by the
/// opposite side's last peak. This keeps the swing-back after a hard kick
/// from sounding as a kick in the other direction.
pub struct KickDetector {
    config: DetectorConfig,
    last_filtered: f64,
    last_derivative: Option<f64>,
    left_peak: f64,
    right_peak: f64,
}

impl KickDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self {
            config,
            last_filtered: 0.0,
            last_derivative: None,
            left_peak: 0.0,
            right_peak: 0.0,
        }
    }

    pub fn observe(&mut self, filtered: f64) -> Option<KickEvent> {
        let derivative = filtered - self.last_filtered;
        let last_derivative = *self.last_derivative.get_or_insert(derivative);
        let threshold = self.config.threshold;

        let mut event = None;

        if filtered < -threshold && last_derivative < 0.0 && derivative >= 0.0 {
            // local minimum
            self.left_peak = filtered;

            let trigger = (-threshold).min(-self.config.damping * self.right_peak);
            if filtered < trigger {
                event = Some(KickEvent {
                    direction: Direction::Left,
                    magnitude: filtered,
                });
            }
        } else if filtered >= threshold && last_derivative >= 0.0 && derivative < 0.0 {
            // local maximum
            self.right_peak = filtered;

            let trigger = threshold.max(-self.config.damping * self.left_peak);
            if filtered >= trigger {
                event = Some(KickEvent {
                    direction: Direction::Right,
                    magnitude: filtered,
                });
            }
        }

        self.last_filtered = filtered;
        self.last_derivative = Some(derivative);

        event
    }

    pub fn left_peak(&self) -> f64 {
        self.left_peak
    }

    pub fn right_peak(&self) -> f64 {
        self.right_peak
    }

    pub fn reset(&mut self) {
        self.last_filtered = 0.0;
        self.last_derivative = None;
        self.left_peak = 0.0;
        self.right_peak = 0.0;
    }
}
