use std::sync::mpsc::{channel, Receiver, Sender};
use tokio::sync::mpsc::{channel as tokio_channel, Receiver as TokioReceiver, Sender as TokioSender};
use tracing::{info, warn};

use crate::kick_detector::KickEvent;
use crate::osc_source::OscMotionSource;
use crate::sensor_gate::{AxisScale, LiveStream, MotionSample, MotionSource, SensorGate};
use crate::session::{DisplayFrame, KickSession};
use crate::settings::Settings;
use crate::sound_trigger::{OscSoundTrigger, TriggerSink};

/// Background service running the sensor gate and the kick session.
pub struct KickEngine {
    engine_rx: Receiver<EngineMessage>,
    engine_tx: TokioSender<EngineCommand>,
}

impl KickEngine {
    pub fn new(settings: Settings) -> Self {
        let (gui_tx, engine_rx) = channel::<EngineMessage>();
        let (engine_tx, gui_rx) = tokio_channel::<EngineCommand>(16);

        tokio::spawn(async move {
            engine_task(
                settings,
                |settings: &Settings| {
                    OscMotionSource::new(
                        settings.osc_port,
                        &settings.osc_path,
                        settings.axis_index,
                        AxisScale::from_inverted(settings.invert_axis),
                        settings.sample_interval,
                    )
                },
                |settings: &Settings| {
                    OscSoundTrigger::connect(&settings.sound_target, settings.sound_names.clone())
                        .inspect(|trigger| info!(sound_target = trigger.target(), "sound trigger ready"))
                },
                gui_tx,
                gui_rx,
            )
            .await
        });

        Self {
            engine_rx,
            engine_tx,
        }
    }

    /// Start a session, restarting the current one if it is running.
    pub fn start(&self) -> anyhow::Result<()> {
        self.engine_tx.try_send(EngineCommand::Start)?;
        Ok(())
    }

    pub fn stop(&self) -> anyhow::Result<()> {
        self.engine_tx.try_send(EngineCommand::Stop)?;
        Ok(())
    }

    pub fn fetch_message(&mut self) -> Option<EngineMessage> {
        self.engine_rx.try_recv().ok()
    }
}

#[derive(Debug)]
pub enum EngineCommand {
    Start,
    Stop,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineMessage {
    Starting,
    Started,
    StartFailed(String),
    Frame(DisplayFrame),
    Kick(KickEvent),
    Stopped,
}

enum Step {
    Sample(MotionSample),
    StreamEnded,
    Command(EngineCommand),
    Shutdown,
}

struct Running<S: MotionSource, K: TriggerSink> {
    stream: LiveStream<S>,
    sink: K,
}

async fn engine_task<S, K, F, G>(
    settings: Settings,
    mut open_source: F,
    mut open_sink: G,
    gui_tx: Sender<EngineMessage>,
    mut gui_rx: TokioReceiver<EngineCommand>,
) where
    S: MotionSource,
    K: TriggerSink,
    F: FnMut(&Settings) -> S,
    G: FnMut(&Settings) -> anyhow::Result<K>,
{
    let mut session = KickSession::new(settings.filter_config(), settings.detector_config());
    let mut running: Option<Running<S, K>> = None;

    loop {
        let step = match running.as_mut() {
            None => gui_rx.recv().await.map_or(Step::Shutdown, Step::Command),
            Some(active) => tokio::select! {
                biased;

                Some(command) = gui_rx.recv() => Step::Command(command),
                sample = active.stream.source.next_sample() => sample.map_or(Step::StreamEnded, Step::Sample),
            },
        };

        match step {
            Step::Sample(sample) => {
                if let Some(active) = running.as_mut() {
                    handle_sample(&mut session, &mut active.sink, &gui_tx, &sample);
                }
            }
            Step::StreamEnded => {
                info!(samples = session.samples_seen(), "motion stream ended");
                running = None;
                _ = gui_tx.send(EngineMessage::Stopped);
            }
            Step::Command(EngineCommand::Start) => {
                _ = gui_tx.send(EngineMessage::Starting);

                // Release the previous source before the new one binds.
                running = None;
                session.reset();

                let sink = open_sink(&settings);
                let stream = SensorGate::start(open_source(&settings), settings.start_timeout()).await;

                match (stream, sink) {
                    (Ok(stream), Ok(mut sink)) => {
                        session.set_scale(stream.scale);
                        _ = gui_tx.send(EngineMessage::Started);

                        let first_sample = stream.first_sample;
                        handle_sample(&mut session, &mut sink, &gui_tx, &first_sample);
                        running = Some(Running { stream, sink });
                    }
                    (Err(error), _) => {
                        _ = gui_tx.send(EngineMessage::StartFailed(error.to_string()));
                    }
                    (_, Err(error)) => {
                        warn!(%error, "sound output not available");
                        _ = gui_tx.send(EngineMessage::StartFailed(format!("sound output not available: {}", error)));
                    }
                }
            }
            Step::Command(EngineCommand::Stop) => {
                running = None;
                session.reset();
                _ = gui_tx.send(EngineMessage::Stopped);
            }
            Step::Shutdown => break,
        }
    }
}

fn handle_sample<K: TriggerSink>(session: &mut KickSession, sink: &mut K, gui_tx: &Sender<EngineMessage>, sample: &MotionSample) {
    let Ok(outcome) = session.process(sample) else {
        return;
    };

    if let Some(kick) = outcome.kick {
        if let Err(error) = sink.kick(&kick) {
            warn!(%error, "failed to trigger sound");
        }
        _ = gui_tx.send(EngineMessage::Kick(kick));
    }

    _ = gui_tx.send(EngineMessage::Frame(outcome.frame));
}
