use std::path::{Path, PathBuf};
use std::time::Duration;
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

use crate::kick_detector::DetectorConfig;
use crate::lowpass::FilterConfig;

lazy_static! {
    static ref SETTINGS_PATH: PathBuf = {
        std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(|dir| dir.join("settings.json")))
            .unwrap_or_else(|| PathBuf::from("settings.json"))
    };
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub threshold: f64,
    pub damping: f64,
    pub time_constant: f64,
    pub start_timeout_ms: u64,
    /// Seconds between sensor deliveries, used until the real spacing is measured.
    pub sample_interval: f64,
    pub osc_port: u16,
    pub osc_path: String,
    pub axis_index: usize,
    pub invert_axis: bool,
    pub sound_target: String,
    pub sound_names: [String; 2],
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            threshold: 1.5,
            damping: 0.666,
            time_constant: 2.0,
            start_timeout_ms: 1000,
            sample_interval: 1.0 / 60.0,
            osc_port: 9001,
            osc_path: "/accelerometer*".into(),
            axis_index: 0,
            invert_axis: false,
            sound_target: "127.0.0.1:9002".into(),
            sound_names: ["left".into(), "right".into()],
        }
    }
}

impl Settings {
    pub fn save(&self) -> anyhow::Result<()> {
        self.save_to(&SETTINGS_PATH)
    }

    pub fn load_or_default() -> anyhow::Result<Self> {
        Self::load_from(&SETTINGS_PATH)
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        let settings = serde_json::to_string_pretty(&self)?;
        std::fs::write(path, settings)?;
        Ok(())
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let settings = std::fs::read_to_string(path)?;
        let settings: Settings = serde_json::from_str(&settings)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if !(self.threshold > 0.0) {
            anyhow::bail!("threshold must be positive, got {}", self.threshold);
        }
        if !(self.damping > 0.0 && self.damping < 1.0) {
            anyhow::bail!("damping must be in (0, 1), got {}", self.damping);
        }
        if !(self.time_constant > 0.0) {
            anyhow::bail!("time_constant must be positive, got {}", self.time_constant);
        }
        if !(self.sample_interval > 0.0) {
            anyhow::bail!("sample_interval must be positive, got {}", self.sample_interval);
        }
        Ok(())
    }

    pub fn detector_config(&self) -> DetectorConfig {
        DetectorConfig {
            threshold: self.threshold,
            damping: self.damping,
        }
    }

    pub fn filter_config(&self) -> FilterConfig {
        FilterConfig {
            time_constant: self.time_constant,
        }
    }

    pub fn start_timeout(&self) -> Duration {
        Duration::from_millis(self.start_timeout_ms)
    }
}
