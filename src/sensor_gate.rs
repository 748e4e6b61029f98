use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

/// One lateral acceleration reading as delivered by the sensor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionSample {
    /// m/s² along the lateral axis.
    pub acceleration: f64,
    /// Seconds since the previous sample.
    pub interval: f64,
}

/// Sign applied to the raw axis before filtering. Some platforms report the
/// lateral axis inverted, which is only known once access has been granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AxisScale {
    #[default]
    Normal,
    Inverted,
}

impl AxisScale {
    pub fn from_inverted(inverted: bool) -> Self {
        if inverted { AxisScale::Inverted } else { AxisScale::Normal }
    }

    pub fn factor(&self) -> f64 {
        match self {
            AxisScale::Normal => 1.0,
            AxisScale::Inverted => -1.0,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StartError {
    #[error("device motion not available: {0}")]
    Unavailable(String),

    /// Only for sources gated behind a user grant; the OSC source has none.
    #[allow(dead_code)]
    #[error("no permission for device motion")]
    PermissionDenied,

    #[error("no device motion data stream")]
    NoDataStream,

    #[error("device motion stream closed")]
    StreamClosed,
}

pub trait MotionSource {
    /// Acquire access to the sensor. Decides the axis scale on success.
    ///
    /// Sources that cannot listen return `Unavailable`. `PermissionDenied` is
    /// for sources that ask the user first; `OscMotionSource` never does.
    async fn open(&mut self) -> Result<AxisScale, StartError>;

    /// Next sample in arrival order, `None` once the stream has ended.
    async fn next_sample(&mut self) -> Option<MotionSample>;
}

/// A sensor that has proven it is delivering data.
pub struct LiveStream<S: MotionSource> {
    pub source: S,
    pub scale: AxisScale,
    pub first_sample: MotionSample,
}

pub struct SensorGate;

impl SensorGate {
    /// Open `source` and wait for its first sample. Both steps share one
    /// deadline, so a stalled handshake fails like a silent sensor. A source
    /// that starts streaming after the deadline is simply dropped with the
    /// failed attempt.
    pub async fn start<S: MotionSource>(mut source: S, timeout: Duration) -> Result<LiveStream<S>, StartError> {
        let attempt = tokio::select! {
            result = open_and_wait(&mut source) => result,
            _ = tokio::time::sleep(timeout) => Err(StartError::NoDataStream),
        };

        match attempt {
            Ok((scale, first_sample)) => {
                info!(?scale, interval = first_sample.interval, "motion stream started");
                Ok(LiveStream {
                    source,
                    scale,
                    first_sample,
                })
            }
            Err(error) => {
                warn!(%error, timeout_ms = timeout.as_millis() as u64, "motion stream did not start");
                Err(error)
            }
        }
    }
}

async fn open_and_wait<S: MotionSource>(source: &mut S) -> Result<(AxisScale, MotionSample), StartError> {
    let scale = source.open().await?;
    let first_sample = source.next_sample().await.ok_or(StartError::StreamClosed)?;
    Ok((scale, first_sample))
}
