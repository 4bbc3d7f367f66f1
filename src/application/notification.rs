use crate::domain::models::{Language, TimerMode};
use crate::infrastructure::events::EventBus;
use crate::infrastructure::speech::{SpeechRequest, SpeechSynthesizer, SPEECH_RATE};
use serde::Serialize;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;

pub const NOTICE_DISMISS_SECONDS: u64 = 8;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Notice {
    pub text: String,
    pub mode: TimerMode,
}

struct ActiveNotice {
    notice: Notice,
    dismiss: JoinHandle<()>,
}

/// Owns the session-completion side effects: the spoken announcement (a
/// single-slot resource, cancelled before every new utterance) and the
/// transient visible notice that auto-dismisses after eight seconds unless a
/// newer notice replaces it first.
pub struct NotificationDispatcher {
    speech: Arc<dyn SpeechSynthesizer>,
    events: Arc<EventBus>,
    current: Arc<Mutex<Option<ActiveNotice>>>,
    dismiss_after: Duration,
}

impl NotificationDispatcher {
    pub fn new(speech: Arc<dyn SpeechSynthesizer>, events: Arc<EventBus>) -> Self {
        Self {
            speech,
            events,
            current: Arc::new(Mutex::new(None)),
            dismiss_after: Duration::from_secs(NOTICE_DISMISS_SECONDS),
        }
    }

    #[cfg(test)]
    fn with_dismiss_after(mut self, dismiss_after: Duration) -> Self {
        self.dismiss_after = dismiss_after;
        self
    }

    pub fn notify(
        &self,
        finished: TimerMode,
        language: Language,
        assistant_name: &str,
        assistant_role: &str,
    ) -> Notice {
        let (speech_text, toast_text) = compose(finished, language, assistant_name, assistant_role);

        self.speech.cancel();
        self.speech.speak(&SpeechRequest {
            text: speech_text,
            locale: language.speech_locale(),
            rate: SPEECH_RATE,
        });

        let notice = Notice {
            text: toast_text,
            mode: finished,
        };

        let slot = Arc::clone(&self.current);
        let events = Arc::clone(&self.events);
        let expected = notice.clone();
        let dismiss_after = self.dismiss_after;
        let dismiss = tokio::spawn(async move {
            tokio::time::sleep(dismiss_after).await;
            let Ok(mut slot) = slot.lock() else {
                return;
            };
            if slot.as_ref().is_some_and(|active| active.notice == expected) {
                *slot = None;
                events.emit("notify://dismissed", serde_json::Value::Null);
            }
        });

        if let Ok(mut slot) = self.current.lock() {
            if let Some(previous) = slot.take() {
                previous.dismiss.abort();
            }
            *slot = Some(ActiveNotice {
                notice: notice.clone(),
                dismiss,
            });
        } else {
            dismiss.abort();
        }

        self.events.emit(
            "notify://toast",
            serde_json::to_value(&notice).unwrap_or(serde_json::Value::Null),
        );
        notice
    }

    pub fn current_notice(&self) -> Option<Notice> {
        self.current
            .lock()
            .ok()
            .and_then(|slot| slot.as_ref().map(|active| active.notice.clone()))
    }
}

fn compose(
    finished: TimerMode,
    language: Language,
    assistant_name: &str,
    assistant_role: &str,
) -> (String, String) {
    match language {
        Language::Zh => {
            let identity = format!("您个{assistant_role}{assistant_name}");
            match finished {
                TimerMode::Work => (
                    format!("主人，{identity}提醒您，专注结束啦，喝杯水休息一下吧。"),
                    "专注结束啦，休息一下吧".to_string(),
                ),
                TimerMode::ShortBreak => (
                    format!("主人，{identity}提醒您，短休结束啦，进入下一次专注吧。"),
                    "短休结束啦，开始专注吧".to_string(),
                ),
                TimerMode::LongBreak => (
                    format!("主人，{identity}提醒您，长休结束啦，辛苦啦。"),
                    "长休结束啦，精力充沛！".to_string(),
                ),
            }
        }
        Language::En => {
            let identity = format!("your {assistant_role} {assistant_name}");
            match finished {
                TimerMode::Work => (
                    format!(
                        "Master, {identity} reminds you that focus session is finished. Time for a break."
                    ),
                    "Focus session completed!".to_string(),
                ),
                TimerMode::ShortBreak => (
                    format!(
                        "Master, {identity} reminds you that short break is over. Let's get back to work."
                    ),
                    "Short break ended!".to_string(),
                ),
                TimerMode::LongBreak => (
                    format!(
                        "Master, {identity} reminds you that long break is over. You've done great."
                    ),
                    "Long break ended!".to_string(),
                ),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::speech::{RecordingSpeechSynthesizer, SpeechCommand};

    fn dispatcher(speech: Arc<RecordingSpeechSynthesizer>) -> Arc<NotificationDispatcher> {
        Arc::new(NotificationDispatcher::new(
            speech,
            Arc::new(EventBus::default()),
        ))
    }

    #[test]
    fn compose_references_the_assistant_identity() {
        let (speech, toast) = compose(TimerMode::Work, Language::Zh, "梦玉", "小宠物");
        assert_eq!(speech, "主人，您个小宠物梦玉提醒您，专注结束啦，喝杯水休息一下吧。");
        assert_eq!(toast, "专注结束啦，休息一下吧");

        let (speech, toast) = compose(TimerMode::LongBreak, Language::En, "Mori", "pet");
        assert_eq!(
            speech,
            "Master, your pet Mori reminds you that long break is over. You've done great."
        );
        assert_eq!(toast, "Long break ended!");
    }

    #[tokio::test]
    async fn notify_cancels_previous_speech_before_speaking() {
        let speech = Arc::new(RecordingSpeechSynthesizer::default());
        let dispatcher = dispatcher(Arc::clone(&speech));

        dispatcher.notify(TimerMode::Work, Language::En, "Mori", "pet");
        let commands = speech.commands();
        assert_eq!(commands.len(), 2);
        assert_eq!(commands[0], SpeechCommand::Cancel);
        match &commands[1] {
            SpeechCommand::Speak(request) => {
                assert_eq!(request.locale, "en-US");
                assert_eq!(request.rate, 0.9);
                assert!(request.text.contains("focus session is finished"));
            }
            other => panic!("expected speak command, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn newer_notice_replaces_the_visible_one() {
        let speech = Arc::new(RecordingSpeechSynthesizer::default());
        let dispatcher = dispatcher(speech);

        let first = dispatcher.notify(TimerMode::Work, Language::En, "Mori", "pet");
        let second = dispatcher.notify(TimerMode::ShortBreak, Language::En, "Mori", "pet");
        assert_ne!(first, second);
        assert_eq!(dispatcher.current_notice(), Some(second));
    }

    #[tokio::test]
    async fn notice_dismisses_after_the_configured_delay() {
        let speech = Arc::new(RecordingSpeechSynthesizer::default());
        let dispatcher = Arc::new(
            NotificationDispatcher::new(speech, Arc::new(EventBus::default()))
                .with_dismiss_after(Duration::from_millis(20)),
        );

        let notice = dispatcher.notify(TimerMode::Work, Language::Zh, "梦玉", "小宠物");
        assert_eq!(dispatcher.current_notice(), Some(notice));

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(dispatcher.current_notice(), None);
    }
}
