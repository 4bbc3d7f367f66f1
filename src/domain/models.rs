use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub const MIN_DURATION_MINUTES: u32 = 1;
pub const MAX_DURATION_MINUTES: u32 = 120;

pub const DEFAULT_WORK_MINUTES: u32 = 25;
pub const DEFAULT_SHORT_BREAK_MINUTES: u32 = 5;
pub const DEFAULT_LONG_BREAK_MINUTES: u32 = 15;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum TimerMode {
    #[serde(rename = "WORK")]
    Work,
    #[serde(rename = "SHORT_BREAK")]
    ShortBreak,
    #[serde(rename = "LONG_BREAK")]
    LongBreak,
}

impl TimerMode {
    pub const ALL: [TimerMode; 3] = [TimerMode::Work, TimerMode::ShortBreak, TimerMode::LongBreak];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Work => "WORK",
            Self::ShortBreak => "SHORT_BREAK",
            Self::LongBreak => "LONG_BREAK",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Language {
    #[serde(rename = "ZH")]
    Zh,
    #[serde(rename = "EN")]
    En,
}

impl Language {
    pub fn speech_locale(self) -> &'static str {
        match self {
            Self::Zh => "zh-CN",
            Self::En => "en-US",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Dark,
    Light,
}

/// Fixed-key mapping from timer mode to a value. All three modes are present
/// by construction, so lookups are total.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModeMap<T> {
    #[serde(rename = "WORK")]
    pub work: T,
    #[serde(rename = "SHORT_BREAK")]
    pub short_break: T,
    #[serde(rename = "LONG_BREAK")]
    pub long_break: T,
}

impl<T> ModeMap<T> {
    pub fn new(work: T, short_break: T, long_break: T) -> Self {
        Self {
            work,
            short_break,
            long_break,
        }
    }

    pub fn get(&self, mode: TimerMode) -> &T {
        match mode {
            TimerMode::Work => &self.work,
            TimerMode::ShortBreak => &self.short_break,
            TimerMode::LongBreak => &self.long_break,
        }
    }

    pub fn get_mut(&mut self, mode: TimerMode) -> &mut T {
        match mode {
            TimerMode::Work => &mut self.work,
            TimerMode::ShortBreak => &mut self.short_break,
            TimerMode::LongBreak => &mut self.long_break,
        }
    }
}

/// Per-mode session durations in minutes.
pub type DurationMinutes = ModeMap<u32>;

pub fn default_durations() -> DurationMinutes {
    ModeMap::new(
        DEFAULT_WORK_MINUTES,
        DEFAULT_SHORT_BREAK_MINUTES,
        DEFAULT_LONG_BREAK_MINUTES,
    )
}

pub fn validate_durations(durations: &DurationMinutes) -> Result<(), String> {
    for mode in TimerMode::ALL {
        let minutes = *durations.get(mode);
        if !(MIN_DURATION_MINUTES..=MAX_DURATION_MINUTES).contains(&minutes) {
            return Err(format!(
                "duration for {} must be {}..={} minutes",
                mode.as_str(),
                MIN_DURATION_MINUTES,
                MAX_DURATION_MINUTES
            ));
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    pub estimated_pomodoros: u32,
    pub completed_pomodoros: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<NaiveDate>,
}

impl Task {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.id, "task.id")?;
        validate_non_empty(&self.title, "task.title")?;
        if self.estimated_pomodoros == 0 {
            return Err("task.estimated_pomodoros must be > 0".to_string());
        }
        if self.completed != self.completed_at.is_some() {
            return Err("task.completed_at must be present iff task.completed".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuoteEntry {
    pub text: String,
    #[serde(rename = "isLiked")]
    pub is_liked: bool,
}

impl QuoteEntry {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_liked: false,
        }
    }
}

/// Per-mode quote pools, as persisted under `flow_pomodoro_quotes_cache`.
pub type QuotePools = ModeMap<Vec<QuoteEntry>>;

fn validate_non_empty(value: &str, field_name: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{field_name} must not be empty"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(value: &str) -> NaiveDate {
        NaiveDate::parse_from_str(value, "%Y-%m-%d").expect("valid date")
    }

    fn sample_task() -> Task {
        Task {
            id: "tsk-1".to_string(),
            title: "Write report".to_string(),
            completed: false,
            due_date: Some(date("2026-08-10")),
            estimated_pomodoros: 2,
            completed_pomodoros: 1,
            completed_at: None,
        }
    }

    #[test]
    fn task_validate_accepts_valid_task() {
        assert!(sample_task().validate().is_ok());
    }

    #[test]
    fn task_validate_rejects_empty_title() {
        let mut task = sample_task();
        task.title = "   ".to_string();
        assert!(task.validate().is_err());
    }

    #[test]
    fn task_validate_rejects_completed_at_mismatch() {
        let mut task = sample_task();
        task.completed = true;
        assert!(task.validate().is_err());

        task.completed = false;
        task.completed_at = Some(date("2026-08-07"));
        assert!(task.validate().is_err());
    }

    #[test]
    fn task_serializes_with_original_field_names() {
        let mut task = sample_task();
        task.completed = true;
        task.completed_at = Some(date("2026-08-07"));
        let value = serde_json::to_value(&task).expect("serialize task");

        assert_eq!(value["dueDate"], "2026-08-10");
        assert_eq!(value["estimatedPomodoros"], 2);
        assert_eq!(value["completedPomodoros"], 1);
        assert_eq!(value["completedAt"], "2026-08-07");
    }

    #[test]
    fn task_deserializes_without_optional_dates() {
        let task: Task = serde_json::from_str(
            r#"{"id":"tsk-2","title":"Read","completed":false,"estimatedPomodoros":1,"completedPomodoros":0}"#,
        )
        .expect("deserialize task");
        assert_eq!(task.due_date, None);
        assert_eq!(task.completed_at, None);
    }

    #[test]
    fn mode_map_serializes_under_mode_names() {
        let value = serde_json::to_value(default_durations()).expect("serialize durations");
        assert_eq!(value["WORK"], 25);
        assert_eq!(value["SHORT_BREAK"], 5);
        assert_eq!(value["LONG_BREAK"], 15);
    }

    #[test]
    fn quote_entry_uses_is_liked_wire_name() {
        let entry = QuoteEntry::new("宁静致远，淡泊明志。");
        let value = serde_json::to_value(&entry).expect("serialize entry");
        assert_eq!(value["isLiked"], false);
        assert!(value.get("is_liked").is_none());
    }

    #[test]
    fn validate_durations_enforces_bounds() {
        assert!(validate_durations(&default_durations()).is_ok());
        assert!(validate_durations(&ModeMap::new(0, 5, 15)).is_err());
        assert!(validate_durations(&ModeMap::new(25, 121, 15)).is_err());
        assert!(validate_durations(&ModeMap::new(120, 1, 60)).is_ok());
    }

    #[test]
    fn timer_mode_round_trips_through_wire_names() {
        for mode in TimerMode::ALL {
            let raw = serde_json::to_string(&mode).expect("serialize mode");
            assert_eq!(raw, format!("\"{}\"", mode.as_str()));
            let parsed: TimerMode = serde_json::from_str(&raw).expect("deserialize mode");
            assert_eq!(parsed, mode);
        }
    }
}
