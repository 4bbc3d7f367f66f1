use crate::infrastructure::events::EventBus;
use serde::Serialize;
use std::sync::{Arc, Mutex};

pub const SPEECH_RATE: f32 = 0.9;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SpeechRequest {
    pub text: String,
    pub locale: &'static str,
    pub rate: f32,
}

/// Single-slot spoken announcement resource. Issuing a new announcement must
/// cancel the previous one before speaking.
pub trait SpeechSynthesizer: Send + Sync {
    fn cancel(&self);
    fn speak(&self, request: &SpeechRequest);
}

/// Forwards announcements to the renderer, which owns the actual voice.
pub struct BusSpeechSynthesizer {
    bus: Arc<EventBus>,
}

impl BusSpeechSynthesizer {
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self { bus }
    }
}

impl SpeechSynthesizer for BusSpeechSynthesizer {
    fn cancel(&self) {
        self.bus.emit("speech://cancel", serde_json::Value::Null);
    }

    fn speak(&self, request: &SpeechRequest) {
        let payload = serde_json::to_value(request).unwrap_or(serde_json::Value::Null);
        self.bus.emit("speech://speak", payload);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SpeechCommand {
    Cancel,
    Speak(SpeechRequest),
}

#[derive(Default)]
pub struct RecordingSpeechSynthesizer {
    commands: Mutex<Vec<SpeechCommand>>,
}

impl RecordingSpeechSynthesizer {
    pub fn commands(&self) -> Vec<SpeechCommand> {
        self.commands
            .lock()
            .map(|commands| commands.clone())
            .unwrap_or_default()
    }
}

impl SpeechSynthesizer for RecordingSpeechSynthesizer {
    fn cancel(&self) {
        if let Ok(mut commands) = self.commands.lock() {
            commands.push(SpeechCommand::Cancel);
        }
    }

    fn speak(&self, request: &SpeechRequest) {
        if let Ok(mut commands) = self.commands.lock() {
            commands.push(SpeechCommand::Speak(request.clone()));
        }
    }
}
