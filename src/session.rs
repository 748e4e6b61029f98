use thiserror::Error;
use tracing::{debug, info};

use crate::kick_detector::{DetectorConfig, KickDetector, KickEvent};
use crate::lowpass::{AdaptiveLowPass, FilterConfig};
use crate::sensor_gate::{AxisScale, MotionSample};

#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum SampleError {
    #[error("non-finite acceleration {0}")]
    NonFiniteAcceleration(f64),

    #[error("invalid sample interval {0}")]
    InvalidInterval(f64),
}

/// Values shown on the display after every sample.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DisplayFrame {
    pub current: f64,
    pub left_peak: f64,
    pub right_peak: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleOutcome {
    pub frame: DisplayFrame,
    pub kick: Option<KickEvent>,
}

/// One run of the kick pipeline, from stream start until restart.
pub struct KickSession {
    filter: AdaptiveLowPass,
    detector: KickDetector,
    scale: AxisScale,
    samples_seen: u64,
}

impl KickSession {
    pub fn new(filter_config: FilterConfig, detector_config: DetectorConfig) -> Self {
        Self {
            filter: AdaptiveLowPass::new(filter_config),
            detector: KickDetector::new(detector_config),
            scale: AxisScale::Normal,
            samples_seen: 0,
        }
    }

    pub fn set_scale(&mut self, scale: AxisScale) {
        self.scale = scale;
    }

    pub fn validate(sample: &MotionSample) -> Result<(), SampleError> {
        if !sample.acceleration.is_finite() {
            return Err(SampleError::NonFiniteAcceleration(sample.acceleration));
        }
        if !sample.interval.is_finite() || sample.interval <= 0.0 {
            return Err(SampleError::InvalidInterval(sample.interval));
        }
        Ok(())
    }

    /// Run one sample through filter and detector. Malformed samples are
    /// rejected without touching any state.
    pub fn process(&mut self, sample: &MotionSample) -> Result<SampleOutcome, SampleError> {
        if let Err(error) = Self::validate(sample) {
            debug!(%error, "dropping motion sample");
            return Err(error);
        }

        let raw = self.scale.factor() * sample.acceleration;
        let filtered = self.filter.filter(raw, sample.interval);
        let kick = self.detector.observe(filtered);
        self.samples_seen += 1;

        if self.samples_seen == 1 {
            debug!(interval = sample.interval, coefficient = ?self.filter.coefficient(), "filter calibrated");
        }

        if let Some(kick) = &kick {
            info!(direction = kick.direction.as_str(), magnitude = kick.magnitude, "kick");
        }

        Ok(SampleOutcome {
            frame: self.frame(),
            kick,
        })
    }

    pub fn frame(&self) -> DisplayFrame {
        DisplayFrame {
            current: self.filter.last_filtered(),
            left_peak: self.detector.left_peak(),
            right_peak: self.detector.right_peak(),
        }
    }

    pub fn samples_seen(&self) -> u64 {
        self.samples_seen
    }

    /// Return both filter and detector to their initial state. The axis
    /// scale is kept; it belongs to the sensor, not the session.
    pub fn reset(&mut self) {
        self.filter.reset();
        self.detector.reset();
        self.samples_seen = 0;
    }
}
