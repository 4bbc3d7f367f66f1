use std::sync::{Arc, Mutex};

pub type EventSink = Arc<dyn Fn(&str, serde_json::Value) + Send + Sync>;

/// Single-slot bridge to the renderer. Events emitted before a sink is
/// connected are dropped; emission is always best-effort.
#[derive(Default)]
pub struct EventBus {
    sink: Mutex<Option<EventSink>>,
}

impl EventBus {
    pub fn connect(&self, sink: EventSink) {
        if let Ok(mut slot) = self.sink.lock() {
            *slot = Some(sink);
        }
    }

    pub fn emit(&self, event: &str, payload: serde_json::Value) {
        let Ok(slot) = self.sink.lock() else {
            return;
        };
        if let Some(sink) = slot.as_ref() {
            sink(event, payload);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emit_without_sink_is_a_no_op() {
        let bus = EventBus::default();
        bus.emit("timer://tick", serde_json::json!({"seconds": 1}));
    }

    #[test]
    fn connected_sink_receives_events() {
        let bus = EventBus::default();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink_seen = Arc::clone(&seen);
        bus.connect(Arc::new(move |event, payload| {
            sink_seen
                .lock()
                .expect("seen lock")
                .push((event.to_string(), payload));
        }));

        bus.emit("notify://toast", serde_json::json!({"text": "done"}));
        let seen = seen.lock().expect("seen lock");
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, "notify://toast");
    }
}
