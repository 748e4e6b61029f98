use std::collections::{HashSet, VecDeque};
use std::net::SocketAddr;
use std::time::Instant;
use rosc::{OscMessage, OscPacket, OscTime, OscType};
use tokio::net::UdpSocket;
use tracing::{debug, info, warn};
use wildmatch::WildMatch;

use crate::sensor_gate::{AxisScale, MotionSample, MotionSource, StartError};

/// Spacings below this are read-out artifacts (packets drained from the
/// socket buffer in one go), not the sensor's rate.
const MIN_INTERVAL: f64 = 0.002;

/// When a value was sent and when it was read off the socket.
#[derive(Debug, Clone, Copy)]
struct Stamp {
    arrival: Instant,
    /// Bundle timetag in seconds, if the sender stamped it.
    sent: Option<f64>,
}

impl Stamp {
    fn seconds_since(&self, previous: &Stamp) -> Option<f64> {
        let elapsed = match (self.sent, previous.sent) {
            (Some(sent), Some(previous_sent)) => sent - previous_sent,
            _ => self.arrival.duration_since(previous.arrival).as_secs_f64(),
        };

        (elapsed >= MIN_INTERVAL).then_some(elapsed)
    }
}

fn timetag_seconds(time: &OscTime) -> Option<f64> {
    // (0, 1) means "immediately" and carries no clock.
    if time.seconds == 0 && time.fractional <= 1 {
        return None;
    }
    Some(time.seconds as f64 + time.fractional as f64 / 4_294_967_296.0)
}

/// Motion source fed by a phone streaming its accelerometer over OSC.
///
/// Each matching message is one sample; `axis_index` selects the lateral
/// component among its arguments. Intervals come from bundle timetags when
/// the sender provides them, otherwise from arrival spacing. Spacings too
/// small to be real fall back to the last measured interval, or to
/// `nominal_interval` before anything has been measured.
pub struct OscMotionSource {
    port: u16,
    pattern: WildMatch,
    axis_index: usize,
    scale: AxisScale,
    nominal_interval: f64,
    socket: Option<UdpSocket>,
    pending: VecDeque<(f64, Stamp)>,
    last_stamp: Option<Stamp>,
    interval: Option<f64>,
    found_addresses: HashSet<String>,
}

impl OscMotionSource {
    pub fn new(port: u16, pattern: &str, axis_index: usize, scale: AxisScale, nominal_interval: f64) -> Self {
        Self {
            port,
            pattern: WildMatch::new(pattern),
            axis_index,
            scale,
            nominal_interval,
            socket: None,
            pending: VecDeque::new(),
            last_stamp: None,
            interval: None,
            found_addresses: HashSet::new(),
        }
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.socket.as_ref().and_then(|socket| socket.local_addr().ok())
    }

    /// Pull the lateral values out of every message in `packet` whose
    /// address matches the pattern.
    fn collect_values(&mut self, packet: OscPacket, stamp: Stamp) {
        match packet {
            OscPacket::Message(OscMessage { addr, args }) => {
                if self.found_addresses.insert(addr.clone()) {
                    info!(address = %addr, args = args.len(), "new OSC address");
                }

                if !self.pattern.matches(&addr) {
                    return;
                }

                match args.get(self.axis_index).and_then(osc_to_f64) {
                    Some(value) => self.pending.push_back((value, stamp)),
                    None => debug!(address = %addr, axis = self.axis_index, "no numeric value on axis"),
                }
            }
            OscPacket::Bundle(bundle) => {
                let stamp = Stamp {
                    sent: timetag_seconds(&bundle.timetag).or(stamp.sent),
                    ..stamp
                };
                for packet in bundle.content {
                    self.collect_values(packet, stamp);
                }
            }
        }
    }

    /// Interval to report for a value stamped `stamp`. The very first value
    /// only starts the clock and yields `None`.
    fn advance_clock(&mut self, stamp: Stamp) -> Option<f64> {
        let previous = self.last_stamp.replace(stamp)?;

        if let Some(elapsed) = stamp.seconds_since(&previous) {
            self.interval = Some(elapsed);
        }

        Some(self.interval.unwrap_or(self.nominal_interval))
    }
}

fn osc_to_f64(arg: &OscType) -> Option<f64> {
    match arg {
        OscType::Float(value) => Some(*value as f64),
        OscType::Double(value) => Some(*value),
        OscType::Int(value) => Some(*value as f64),
        OscType::Long(value) => Some(*value as f64),
        _ => None,
    }
}

impl MotionSource for OscMotionSource {
    async fn open(&mut self) -> Result<AxisScale, StartError> {
        let socket = UdpSocket::bind(("0.0.0.0", self.port))
            .await
            .map_err(|error| StartError::Unavailable(format!("cannot listen on OSC port {}: {}", self.port, error)))?;

        self.socket.replace(socket);
        info!(addr = ?self.local_addr(), "listening for OSC motion data");
        self.pending.clear();
        self.last_stamp = None;
        self.interval = None;

        Ok(self.scale)
    }

    async fn next_sample(&mut self) -> Option<MotionSample> {
        let mut buffer = [0; rosc::decoder::MTU];

        loop {
            if let Some((acceleration, stamp)) = self.pending.pop_front() {
                match self.advance_clock(stamp) {
                    Some(interval) => return Some(MotionSample { acceleration, interval }),
                    None => {
                        debug!(acceleration, "first OSC value started the clock");
                        continue;
                    }
                }
            }

            let socket = self.socket.as_ref()?;
            let length = match socket.recv_from(&mut buffer).await {
                Ok((length, _)) => length,
                Err(error) => {
                    warn!(%error, "OSC socket closed");
                    self.socket = None;
                    return None;
                }
            };

            let stamp = Stamp {
                arrival: Instant::now(),
                sent: None,
            };
            match rosc::decoder::decode_udp(&buffer[..length]) {
                Ok((_, packet)) => self.collect_values(packet, stamp),
                Err(error) => debug!(?error, "ignoring malformed OSC packet"),
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::lowpass::{AdaptiveLowPass, Coefficient, FilterConfig};
    use rosc::OscBundle;
    use std::time::Duration;

    fn message(addr: &str, args: Vec<OscType>) -> OscPacket {
        OscPacket::Message(OscMessage {
            addr: addr.to_string(),
            args,
        })
    }

    async fn send(target: SocketAddr, packet: &OscPacket) {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let bytes = rosc::encoder::encode(packet).unwrap();
        socket.send_to(&bytes, target).await.unwrap();
    }

    const NOMINAL: f64 = 1.0 / 60.0;

    fn stamp(sent: Option<f64>) -> Stamp {
        Stamp {
            arrival: Instant::now(),
            sent,
        }
    }

    fn stamped_bundle(seconds: u32, fractional: u32, values: &[f32]) -> OscPacket {
        OscPacket::Bundle(OscBundle {
            timetag: OscTime { seconds, fractional },
            content: values
                .iter()
                .map(|value| message("/accelerometer", vec![OscType::Float(*value)]))
                .collect(),
        })
    }

    async fn opened(pattern: &str, axis: usize) -> (OscMotionSource, SocketAddr) {
        let mut source = OscMotionSource::new(0, pattern, axis, AxisScale::Normal, NOMINAL);
        source.open().await.unwrap();
        let port = source.local_addr().unwrap().port();
        (source, SocketAddr::from(([127, 0, 0, 1], port)))
    }

    #[test]
    fn numeric_arguments_are_accepted() {
        assert_eq!(osc_to_f64(&OscType::Float(1.5)), Some(1.5));
        assert_eq!(osc_to_f64(&OscType::Double(-2.25)), Some(-2.25));
        assert_eq!(osc_to_f64(&OscType::Int(3)), Some(3.0));
        assert_eq!(osc_to_f64(&OscType::String("x".into())), None);
    }

    #[test]
    fn bundles_are_flattened_and_filtered() {
        let mut source = OscMotionSource::new(0, "/accelerometer*", 1, AxisScale::Normal, NOMINAL);
        let bundle = OscPacket::Bundle(OscBundle {
            timetag: OscTime { seconds: 0, fractional: 1 },
            content: vec![
                message("/accelerometer", vec![OscType::Float(0.1), OscType::Float(2.0)]),
                message("/gyro", vec![OscType::Float(9.0), OscType::Float(9.0)]),
                message("/accelerometer/raw", vec![OscType::Float(0.3), OscType::Double(-4.0)]),
                message("/accelerometer", vec![OscType::Float(0.1)]),
            ],
        });

        source.collect_values(bundle, stamp(None));

        let values: Vec<f64> = source.pending.iter().map(|(value, _)| *value).collect();
        assert_eq!(values, vec![2.0, -4.0]);
        assert_eq!(source.found_addresses.len(), 3);
    }

    #[tokio::test]
    async fn first_packet_primes_the_clock() {
        let (mut source, target) = opened("/accelerometer", 0).await;

        send(target, &message("/accelerometer", vec![OscType::Float(0.5)])).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        send(target, &message("/accelerometer", vec![OscType::Float(-1.25)])).await;

        let sample = tokio::time::timeout(Duration::from_secs(2), source.next_sample())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(sample.acceleration, -1.25);
        assert!(sample.interval > 0.0);
    }

    #[tokio::test]
    async fn queued_packets_fall_back_to_nominal_interval() {
        let (mut source, target) = opened("/accelerometer", 0).await;

        send(target, &message("/accelerometer", vec![OscType::Float(0.5)])).await;
        send(target, &message("/accelerometer", vec![OscType::Float(2.0)])).await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        let sample = tokio::time::timeout(Duration::from_secs(2), source.next_sample())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(sample.acceleration, 2.0);
        assert_eq!(sample.interval, NOMINAL);

        let mut filter = AdaptiveLowPass::new(FilterConfig::default());
        filter.filter(sample.acceleration, sample.interval);
        match filter.coefficient() {
            Coefficient::Ready(c) => assert!(c < 0.99, "coefficient {} leaves the filter frozen", c),
            Coefficient::Uninitialized => panic!("coefficient not derived"),
        }
    }

    #[tokio::test]
    async fn bundle_timetags_give_the_interval() {
        let mut source = OscMotionSource::new(0, "/accelerometer", 0, AxisScale::Normal, NOMINAL);

        // Same arrival instant, a quarter second apart on the sender's clock.
        source.collect_values(stamped_bundle(100, 0, &[0.1]), stamp(None));
        source.collect_values(stamped_bundle(100, 1 << 30, &[0.2, 0.3]), stamp(None));

        let first = source.next_sample().await.unwrap();
        assert_eq!(first.acceleration, 0.2);
        assert_eq!(first.interval, 0.25);

        // Values sharing a bundle reuse the measured interval.
        let second = source.next_sample().await.unwrap();
        assert_eq!(second.acceleration, 0.3);
        assert_eq!(second.interval, 0.25);
    }

    #[test]
    fn clock_primes_on_first_value_only() {
        let mut source = OscMotionSource::new(0, "*", 0, AxisScale::Normal, NOMINAL);
        let shared = stamp(None);

        assert_eq!(source.advance_clock(shared), None);
        assert_eq!(source.advance_clock(shared), Some(NOMINAL));
    }

    #[test]
    fn immediate_timetag_carries_no_clock() {
        assert_eq!(timetag_seconds(&OscTime { seconds: 0, fractional: 1 }), None);
        assert_eq!(timetag_seconds(&OscTime { seconds: 3, fractional: 1 << 31 }), Some(3.5));
    }

    #[tokio::test]
    async fn unmatched_addresses_are_skipped() {
        let (mut source, target) = opened("/accelerometer", 0).await;

        send(target, &message("/accelerometer", vec![OscType::Float(0.0)])).await;
        send(target, &message("/compass", vec![OscType::Float(7.0)])).await;
        send(target, &message("/accelerometer", vec![OscType::Float(3.0)])).await;

        let sample = tokio::time::timeout(Duration::from_secs(2), source.next_sample())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(sample.acceleration, 3.0);
    }

    #[tokio::test]
    async fn next_sample_without_socket_ends_stream() {
        let mut source = OscMotionSource::new(0, "*", 0, AxisScale::Normal, NOMINAL);
        assert!(source.next_sample().await.is_none());
    }

    #[tokio::test]
    async fn open_fails_when_port_is_taken() {
        let (first, _) = opened("*", 0).await;
        let port = first.local_addr().unwrap().port();

        let mut second = OscMotionSource::new(port, "*", 0, AxisScale::Inverted, NOMINAL);
        let error = second.open().await.err().unwrap();
        assert!(matches!(error, StartError::Unavailable(_)));
    }
}
