use std::f64::consts::PI;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Coefficient {
    Uninitialized,
    Ready(f64),
}

#[derive(Debug, Clone, Copy)]
pub struct FilterConfig {
    /// Settling horizon in seconds.
    pub time_constant: f64,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self { time_constant: 2.0 }
    }
}

/// Exponential smoothing whose coefficient is calibrated from the sensor's
/// own delivery interval the first time a sample arrives.
pub struct AdaptiveLowPass {
    config: FilterConfig,
    coefficient: Coefficient,
    last_filtered: f64,
}

impl AdaptiveLowPass {
    pub fn new(config: FilterConfig) -> Self {
        Self {
            config,
            coefficient: Coefficient::Uninitialized,
            last_filtered: 0.0,
        }
    }

    pub fn filter(&mut self, raw: f64, interval: f64) -> f64 {
        let coefficient = match self.coefficient {
            Coefficient::Ready(coefficient) => coefficient,
            Coefficient::Uninitialized => {
                let coefficient = (-2.0 * PI * interval / self.config.time_constant).exp();
                self.coefficient = Coefficient::Ready(coefficient);
                coefficient
            }
        };

        let filtered = coefficient * self.last_filtered + (1.0 - coefficient) * raw;
        self.last_filtered = filtered;
        filtered
    }

    pub fn coefficient(&self) -> Coefficient {
        self.coefficient
    }

    pub fn last_filtered(&self) -> f64 {
        self.last_filtered
    }

    pub fn reset(&mut self) {
        self.coefficient = Coefficient::Uninitialized;
        self.last_filtered = 0.0;
    }
}
