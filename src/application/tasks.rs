use crate::domain::models::Task;
use crate::domain::ordering::{rebucket_after_toggle, sort_board_by_due_date, SortDirection};
use chrono::{NaiveDate, Utc};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn next_id(prefix: &str) -> String {
    let sequence = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}-{}-{sequence}", Utc::now().timestamp_micros())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakdownBatch {
    pub goal: String,
    pub task_ids: Vec<String>,
}

/// Ordered task collection with the active-task reference and the memory of
/// the last AI-generated batch. Invalid input degrades to a no-op; the board
/// never panics and never throws past its boundary.
#[derive(Debug, Default)]
pub struct TaskBoard {
    tasks: Vec<Task>,
    active_task_id: Option<String>,
    last_breakdown: Option<BreakdownBatch>,
}

impl TaskBoard {
    pub fn from_parts(tasks: Vec<Task>, active_task_id: Option<String>) -> Self {
        let mut board = Self {
            tasks,
            active_task_id: None,
            last_breakdown: None,
        };
        board.set_active(active_task_id);
        board
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn active_task_id(&self) -> Option<&str> {
        self.active_task_id.as_deref()
    }

    pub fn last_breakdown_goal(&self) -> Option<&str> {
        self.last_breakdown.as_ref().map(|batch| batch.goal.as_str())
    }

    /// Prepends a new task. Empty or whitespace-only titles are rejected as
    /// a no-op. The new task becomes active when nothing is.
    pub fn add_task(
        &mut self,
        title: &str,
        due_date: Option<NaiveDate>,
        estimate: u32,
    ) -> Option<Task> {
        let title = title.trim();
        if title.is_empty() {
            return None;
        }

        let task = Task {
            id: next_id("tsk"),
            title: title.to_string(),
            completed: false,
            due_date,
            estimated_pomodoros: estimate.max(1),
            completed_pomodoros: 0,
            completed_at: None,
        };
        self.tasks.insert(0, task.clone());
        if self.active_task_id.is_none() {
            self.active_task_id = Some(task.id.clone());
        }
        Some(task)
    }

    /// Prepends a generated batch keeping its order, remembers the member
    /// ids for `remove_last_breakdown`, and activates the first created task
    /// when nothing is active.
    pub fn add_batch(
        &mut self,
        goal: &str,
        titles: &[String],
        due_date: Option<NaiveDate>,
    ) -> Vec<Task> {
        let mut created = Vec::new();
        for title in titles {
            let title = title.trim();
            if title.is_empty() {
                continue;
            }
            created.push(Task {
                id: next_id("tsk"),
                title: title.to_string(),
                completed: false,
                due_date,
                estimated_pomodoros: 1,
                completed_pomodoros: 0,
                completed_at: None,
            });
        }
        if created.is_empty() {
            return created;
        }

        for task in created.iter().rev() {
            self.tasks.insert(0, task.clone());
        }
        if self.active_task_id.is_none() {
            self.active_task_id = Some(created[0].id.clone());
        }
        self.last_breakdown = Some(BreakdownBatch {
            goal: goal.trim().to_string(),
            task_ids: created.iter().map(|task| task.id.clone()).collect(),
        });
        created
    }

    /// Deletes the last generated batch and returns its goal so the caller
    /// can request a fresh breakdown.
    pub fn remove_last_breakdown(&mut self) -> Option<String> {
        let batch = self.last_breakdown.take()?;
        let ids: HashSet<&str> = batch.task_ids.iter().map(String::as_str).collect();
        self.tasks.retain(|task| !ids.contains(task.id.as_str()));
        if self
            .active_task_id
            .as_deref()
            .is_some_and(|active| ids.contains(active))
        {
            self.active_task_id = None;
        }
        Some(batch.goal)
    }

    /// Flips completion, stamps or clears `completed_at`, and reorders the
    /// list: open tasks first in their existing order, completed tasks after
    /// them by completion recency. A completed task stops being active.
    pub fn toggle_complete(&mut self, id: &str, today: NaiveDate) -> Option<Task> {
        let task = self.tasks.iter_mut().find(|task| task.id == id)?;
        if task.completed {
            task.completed = false;
            task.completed_at = None;
        } else {
            task.completed = true;
            task.completed_at = Some(today);
        }
        let toggled = task.clone();

        self.tasks = rebucket_after_toggle(std::mem::take(&mut self.tasks), id);
        if toggled.completed && self.active_task_id.as_deref() == Some(id) {
            self.active_task_id = None;
        }
        Some(toggled)
    }

    pub fn increment_pomodoro(&mut self, id: &str) -> bool {
        let Some(task) = self.tasks.iter_mut().find(|task| task.id == id) else {
            return false;
        };
        task.completed_pomodoros += 1;
        true
    }

    /// Updates title, due date and estimate in place. Empty titles are
    /// rejected as a no-op; the position never changes.
    pub fn edit_task(
        &mut self,
        id: &str,
        title: &str,
        due_date: Option<NaiveDate>,
        estimate: u32,
    ) -> Option<Task> {
        let title = title.trim();
        if title.is_empty() {
            return None;
        }
        let task = self.tasks.iter_mut().find(|task| task.id == id)?;
        task.title = title.to_string();
        task.due_date = due_date;
        task.estimated_pomodoros = estimate.max(1);
        Some(task.clone())
    }

    pub fn set_due_date(&mut self, id: &str, due_date: Option<NaiveDate>) -> bool {
        let Some(task) = self.tasks.iter_mut().find(|task| task.id == id) else {
            return false;
        };
        task.due_date = due_date;
        true
    }

    pub fn set_estimate(&mut self, id: &str, estimate: u32) -> bool {
        let Some(task) = self.tasks.iter_mut().find(|task| task.id == id) else {
            return false;
        };
        task.estimated_pomodoros = estimate.max(1);
        true
    }

    /// Manual reorder: moves the task to the given index, clamped to the
    /// list bounds.
    pub fn move_task(&mut self, id: &str, to_index: usize) -> bool {
        let Some(from) = self.tasks.iter().position(|task| task.id == id) else {
            return false;
        };
        let task = self.tasks.remove(from);
        let to_index = to_index.min(self.tasks.len());
        self.tasks.insert(to_index, task);
        true
    }

    pub fn delete_task(&mut self, id: &str) -> bool {
        let before = self.tasks.len();
        self.tasks.retain(|task| task.id != id);
        let removed = self.tasks.len() != before;
        if removed && self.active_task_id.as_deref() == Some(id) {
            self.active_task_id = None;
        }
        removed
    }

    pub fn delete_many(&mut self, ids: &HashSet<String>) -> usize {
        let before = self.tasks.len();
        self.tasks.retain(|task| !ids.contains(&task.id));
        if self
            .active_task_id
            .as_ref()
            .is_some_and(|active| ids.contains(active))
        {
            self.active_task_id = None;
        }
        before - self.tasks.len()
    }

    /// Sets the active reference. Anything that does not name an existing,
    /// non-completed task clears it.
    pub fn set_active(&mut self, id: Option<String>) {
        self.active_task_id = id.filter(|id| {
            self.tasks
                .iter()
                .any(|task| &task.id == id && !task.completed)
        });
    }

    pub fn sort_by_due_date(&mut self, direction: SortDirection) {
        sort_board_by_due_date(&mut self.tasks, direction);
    }
}
