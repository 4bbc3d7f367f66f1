use crate::domain::models::Task;
use crate::domain::ordering::sort_by_due_date;
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

pub const REVIEW_POLL_SECONDS: u64 = 30;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReviewWindow {
    Morning,
    Evening,
}

/// The evening window opens at 17:30 and runs to midnight; everything else
/// is the morning window.
pub fn classify(time: NaiveTime) -> ReviewWindow {
    let evening_start = NaiveTime::from_hms_opt(17, 30, 0).expect("valid fixed time");
    if time >= evening_start {
        ReviewWindow::Evening
    } else {
        ReviewWindow::Morning
    }
}

/// Per-window shown/skip markers. Each holds the date string of the day it
/// applies to, so stale markers expire by comparison against today.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReviewMarkers {
    pub morning_shown: Option<String>,
    pub evening_shown: Option<String>,
    pub skip_morning_date: Option<String>,
    pub skip_evening_date: Option<String>,
}

impl ReviewMarkers {
    fn shown(&self, window: ReviewWindow) -> &Option<String> {
        match window {
            ReviewWindow::Morning => &self.morning_shown,
            ReviewWindow::Evening => &self.evening_shown,
        }
    }

    fn skipped(&self, window: ReviewWindow) -> &Option<String> {
        match window {
            ReviewWindow::Morning => &self.skip_morning_date,
            ReviewWindow::Evening => &self.skip_evening_date,
        }
    }

    pub fn mark_shown(&mut self, window: ReviewWindow, today: &str) {
        match window {
            ReviewWindow::Morning => self.morning_shown = Some(today.to_string()),
            ReviewWindow::Evening => self.evening_shown = Some(today.to_string()),
        }
    }

    /// One-way skip for the rest of the day, independent per window.
    pub fn skip_today(&mut self, window: ReviewWindow, today: &str) {
        match window {
            ReviewWindow::Morning => self.skip_morning_date = Some(today.to_string()),
            ReviewWindow::Evening => self.skip_evening_date = Some(today.to_string()),
        }
    }

    pub fn clear_window(&mut self, window: ReviewWindow) {
        match window {
            ReviewWindow::Morning => {
                self.morning_shown = None;
                self.skip_morning_date = None;
            }
            ReviewWindow::Evening => {
                self.evening_shown = None;
                self.skip_evening_date = None;
            }
        }
    }
}

/// One poll step: decides whether the current window's summary should
/// surface now and records it as shown when it does. Each window triggers at
/// most once per day and a skipped window stays silent.
pub fn poll(markers: &mut ReviewMarkers, today: &str, time: NaiveTime) -> Option<ReviewWindow> {
    let window = classify(time);
    let already_shown = markers.shown(window).as_deref() == Some(today);
    let skipped = markers.skipped(window).as_deref() == Some(today);
    if already_shown || skipped {
        return None;
    }
    markers.mark_shown(window, today);
    Some(window)
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ReviewSummary {
    pub window: ReviewWindow,
    pub completed_today: Vec<Task>,
    pub uncompleted: Vec<Task>,
}

/// Morning: open tasks by due date. Evening: the same list plus what got
/// finished today, both sorted by due date with dateless tasks last.
pub fn build_summary(window: ReviewWindow, tasks: &[Task], today: NaiveDate) -> ReviewSummary {
    let mut uncompleted: Vec<Task> = tasks.iter().filter(|task| !task.completed).cloned().collect();
    sort_by_due_date(&mut uncompleted);

    let completed_today = match window {
        ReviewWindow::Morning => Vec::new(),
        ReviewWindow::Evening => {
            let mut completed: Vec<Task> = tasks
                .iter()
                .filter(|task| task.completed && task.completed_at == Some(today))
                .cloned()
                .collect();
            sort_by_due_date(&mut completed);
            completed
        }
    };

    ReviewSummary {
        window,
        completed_today,
        uncompleted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn time(hour: u32, minute: u32, second: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(hour, minute, second).expect("valid time")
    }

    fn date(value: &str) -> NaiveDate {
        NaiveDate::parse_from_str(value, "%Y-%m-%d").expect("valid date")
    }

    fn task(id: &str, completed_at: Option<&str>, due: Option<&str>) -> Task {
        Task {
            id: id.to_string(),
            title: format!("task {id}"),
            completed: completed_at.is_some(),
            due_date: due.map(date),
            estimated_pomodoros: 1,
            completed_pomodoros: 0,
            completed_at: completed_at.map(date),
        }
    }

    #[test]
    fn classify_splits_day_at_half_past_five() {
        assert_eq!(classify(time(0, 0, 0)), ReviewWindow::Morning);
        assert_eq!(classify(time(17, 29, 59)), ReviewWindow::Morning);
        assert_eq!(classify(time(17, 30, 0)), ReviewWindow::Evening);
        assert_eq!(classify(time(23, 59, 59)), ReviewWindow::Evening);
    }

    #[test]
    fn evening_poll_triggers_exactly_once_per_day() {
        let mut markers = ReviewMarkers::default();
        let first = poll(&mut markers, "2026-08-07", time(17, 31, 0));
        assert_eq!(first, Some(ReviewWindow::Evening));

        let second = poll(&mut markers, "2026-08-07", time(17, 31, 30));
        assert_eq!(second, None);

        // Markers are keyed by date, so the next day triggers again.
        let next_day = poll(&mut markers, "2026-08-08", time(17, 31, 0));
        assert_eq!(next_day, Some(ReviewWindow::Evening));
    }

    #[test]
    fn skip_marker_suppresses_only_its_own_window() {
        let mut markers = ReviewMarkers::default();
        markers.skip_today(ReviewWindow::Evening, "2026-08-07");

        assert_eq!(poll(&mut markers, "2026-08-07", time(18, 0, 0)), None);
        assert_eq!(
            poll(&mut markers, "2026-08-07", time(9, 0, 0)),
            Some(ReviewWindow::Morning)
        );
    }

    #[test]
    fn stale_skip_marker_expires_at_midnight() {
        let mut markers = ReviewMarkers::default();
        markers.skip_today(ReviewWindow::Morning, "2026-08-06");
        assert_eq!(
            poll(&mut markers, "2026-08-07", time(8, 0, 0)),
            Some(ReviewWindow::Morning)
        );
    }

    #[test]
    fn morning_summary_lists_open_tasks_by_due_date() {
        let tasks = vec![
            task("late", None, Some("2026-08-20")),
            task("done", Some("2026-08-07"), None),
            task("soon", None, Some("2026-08-08")),
            task("dateless", None, None),
        ];
        let summary = build_summary(ReviewWindow::Morning, &tasks, date("2026-08-07"));
        assert!(summary.completed_today.is_empty());
        assert_eq!(
            summary
                .uncompleted
                .iter()
                .map(|task| task.id.as_str())
                .collect::<Vec<_>>(),
            ["soon", "late", "dateless"]
        );
    }

    #[test]
    fn evening_summary_includes_only_tasks_finished_today() {
        let tasks = vec![
            task("done-today", Some("2026-08-07"), Some("2026-08-07")),
            task("done-yesterday", Some("2026-08-06"), None),
            task("open", None, None),
        ];
        let summary = build_summary(ReviewWindow::Evening, &tasks, date("2026-08-07"));
        assert_eq!(
            summary
                .completed_today
                .iter()
                .map(|task| task.id.as_str())
                .collect::<Vec<_>>(),
            ["done-today"]
        );
        assert_eq!(summary.uncompleted.len(), 1);
    }
}
