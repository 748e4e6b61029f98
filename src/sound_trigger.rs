use std::net::UdpSocket;
use rosc::{OscMessage, OscPacket, OscType};

use crate::kick_detector::KickEvent;

/// Plays the sound for each kick. Display frames go to the GUI through the
/// engine channel instead.
pub trait TriggerSink {
    fn kick(&mut self, event: &KickEvent) -> anyhow::Result<()>;
}

/// Plays kicks on an external sampler by sending `/kick/<sound>` messages.
pub struct OscSoundTrigger {
    socket: UdpSocket,
    target: String,
    sound_names: [String; 2],
}

impl OscSoundTrigger {
    /// Binding the outgoing socket is the audio check done at start time.
    pub fn connect(target: &str, sound_names: [String; 2]) -> anyhow::Result<Self> {
        let socket = UdpSocket::bind("0.0.0.0:0")?;
        socket.connect(target)?;

        Ok(Self {
            socket,
            target: target.to_string(),
            sound_names,
        })
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    fn kick_packet(&self, event: &KickEvent) -> OscPacket {
        let index = event.direction.sound_index();
        OscPacket::Message(OscMessage {
            addr: format!("/kick/{}", self.sound_names[index]),
            args: vec![OscType::Int(index as i32), OscType::Float(event.magnitude as f32)],
        })
    }
}

impl TriggerSink for OscSoundTrigger {
    fn kick(&mut self, event: &KickEvent) -> anyhow::Result<()> {
        let bytes = rosc::encoder::encode(&self.kick_packet(event))?;
        self.socket.send(&bytes)?;
        Ok(())
    }
}
