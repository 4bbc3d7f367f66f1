use crate::domain::models::Task;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn toggled(self) -> Self {
        match self {
            Self::Asc => Self::Desc,
            Self::Desc => Self::Asc,
        }
    }
}

/// Ascending due-date order with dateless tasks after all dated tasks.
/// Ties keep their relative order (the sort is stable, no secondary key).
pub fn sort_by_due_date(tasks: &mut [Task]) {
    tasks.sort_by(|left, right| compare_due_dates(left, right, SortDirection::Asc));
}

/// Board-wide due-date sort: non-completed tasks first in the requested
/// direction, completed tasks after them by completion recency regardless of
/// direction. Dateless tasks stay after dated ones either way.
pub fn sort_board_by_due_date(tasks: &mut [Task], direction: SortDirection) {
    tasks.sort_by(|left, right| {
        match (left.completed, right.completed) {
            (false, true) => return Ordering::Less,
            (true, false) => return Ordering::Greater,
            (true, true) => return right.completed_at.cmp(&left.completed_at),
            (false, false) => {}
        }
        compare_due_dates(left, right, direction)
    });
}

fn compare_due_dates(left: &Task, right: &Task, direction: SortDirection) -> Ordering {
    match (left.due_date, right.due_date) {
        (Some(a), Some(b)) => match direction {
            SortDirection::Asc => a.cmp(&b),
            SortDirection::Desc => b.cmp(&a),
        },
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Reorders the list after a completion toggle: non-completed tasks first in
/// their existing relative order, then the toggled task at its bucket
/// boundary, then the remaining completed tasks by `completed_at` descending.
pub fn rebucket_after_toggle(tasks: Vec<Task>, toggled_id: &str) -> Vec<Task> {
    let Some(toggled_index) = tasks.iter().position(|task| task.id == toggled_id) else {
        return tasks;
    };

    let mut uncompleted = Vec::new();
    let mut completed = Vec::new();
    let mut toggled = None;
    for (index, task) in tasks.into_iter().enumerate() {
        if index == toggled_index {
            toggled = Some(task);
        } else if task.completed {
            completed.push(task);
        } else {
            uncompleted.push(task);
        }
    }
    completed.sort_by(|left, right| right.completed_at.cmp(&left.completed_at));

    let mut reordered = uncompleted;
    if let Some(toggled) = toggled {
        reordered.push(toggled);
    }
    reordered.extend(completed);
    reordered
}
