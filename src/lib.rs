mod application;
mod domain;
mod infrastructure;

use application::commands::{
    breakdown_goal_impl, create_task_impl, current_quote_impl, delete_task_impl,
    delete_tasks_impl, edit_task_impl, force_evening_review_impl, get_review_summary_impl,
    get_settings_impl, get_timer_state_impl, list_tasks_impl, move_task_impl, pause_timer_impl,
    pick_quote_impl, poll_daily_review_impl, refresh_quotes_impl, regenerate_breakdown_impl,
    reset_timer_impl, save_settings_impl, set_active_task_impl, set_assistant_api_key_impl,
    set_task_due_date_impl, set_task_estimate_impl, set_theme_impl, skip_review_today_impl,
    sort_tasks_impl,
    start_review_poller, start_timer_impl, switch_mode_impl, tick_timer_impl,
    toggle_quote_like_impl, toggle_task_impl, AppState, BreakdownResponse, QuoteResponse,
    RefreshQuotesResponse, SaveSettingsResponse, SettingsResponse, StartTimerResponse,
    TickResponse, TimerStateResponse,
};
use application::review::{ReviewSummary, ReviewWindow};
use domain::models::{DurationMinutes, Language, Task, Theme, TimerMode};
use std::sync::Arc;
use tauri::{Emitter, Manager};

#[tauri::command]
fn ping() -> &'static str {
    "pong"
}

#[tauri::command]
fn get_timer_state(state: tauri::State<'_, AppState>) -> Result<TimerStateResponse, String> {
    get_timer_state_impl(state.inner())
        .map_err(|error| state.command_error("get_timer_state", &error))
}

#[tauri::command]
async fn start_timer(state: tauri::State<'_, AppState>) -> Result<StartTimerResponse, String> {
    start_timer_impl(state.inner())
        .await
        .map_err(|error| state.command_error("start_timer", &error))
}

#[tauri::command]
fn pause_timer(state: tauri::State<'_, AppState>) -> Result<TimerStateResponse, String> {
    pause_timer_impl(state.inner()).map_err(|error| state.command_error("pause_timer", &error))
}

#[tauri::command]
fn reset_timer(state: tauri::State<'_, AppState>) -> Result<TimerStateResponse, String> {
    reset_timer_impl(state.inner()).map_err(|error| state.command_error("reset_timer", &error))
}

#[tauri::command]
fn switch_mode(
    state: tauri::State<'_, AppState>,
    mode: TimerMode,
) -> Result<TimerStateResponse, String> {
    switch_mode_impl(state.inner(), mode)
        .map_err(|error| state.command_error("switch_mode", &error))
}

#[tauri::command]
async fn tick_timer(state: tauri::State<'_, AppState>) -> Result<TickResponse, String> {
    tick_timer_impl(state.inner()).map_err(|error| state.command_error("tick_timer", &error))
}

#[tauri::command]
fn create_task(
    state: tauri::State<'_, AppState>,
    title: String,
    due_date: Option<String>,
    estimate: Option<u32>,
) -> Result<Option<Task>, String> {
    create_task_impl(state.inner(), title, due_date, estimate)
        .map_err(|error| state.command_error("create_task", &error))
}

#[tauri::command]
async fn breakdown_goal(
    state: tauri::State<'_, AppState>,
    goal: String,
    due_date: Option<String>,
) -> Result<BreakdownResponse, String> {
    breakdown_goal_impl(state.inner(), goal, due_date)
        .await
        .map_err(|error| state.command_error("breakdown_goal", &error))
}

#[tauri::command]
async fn regenerate_breakdown(
    state: tauri::State<'_, AppState>,
) -> Result<BreakdownResponse, String> {
    regenerate_breakdown_impl(state.inner())
        .await
        .map_err(|error| state.command_error("regenerate_breakdown", &error))
}

#[tauri::command]
fn toggle_task(state: tauri::State<'_, AppState>, task_id: String) -> Result<Option<Task>, String> {
    toggle_task_impl(state.inner(), task_id)
        .map_err(|error| state.command_error("toggle_task", &error))
}

#[tauri::command]
fn edit_task(
    state: tauri::State<'_, AppState>,
    task_id: String,
    title: String,
    due_date: Option<String>,
    estimate: u32,
) -> Result<Option<Task>, String> {
    edit_task_impl(state.inner(), task_id, title, due_date, estimate)
        .map_err(|error| state.command_error("edit_task", &error))
}

#[tauri::command]
fn set_task_due_date(
    state: tauri::State<'_, AppState>,
    task_id: String,
    due_date: Option<String>,
) -> Result<bool, String> {
    set_task_due_date_impl(state.inner(), task_id, due_date)
        .map_err(|error| state.command_error("set_task_due_date", &error))
}

#[tauri::command]
fn set_task_estimate(
    state: tauri::State<'_, AppState>,
    task_id: String,
    estimate: u32,
) -> Result<bool, String> {
    set_task_estimate_impl(state.inner(), task_id, estimate)
        .map_err(|error| state.command_error("set_task_estimate", &error))
}

#[tauri::command]
fn move_task(
    state: tauri::State<'_, AppState>,
    task_id: String,
    to_index: usize,
) -> Result<bool, String> {
    move_task_impl(state.inner(), task_id, to_index)
        .map_err(|error| state.command_error("move_task", &error))
}

#[tauri::command]
fn delete_task(state: tauri::State<'_, AppState>, task_id: String) -> Result<bool, String> {
    delete_task_impl(state.inner(), task_id)
        .map_err(|error| state.command_error("delete_task", &error))
}

#[tauri::command]
fn delete_tasks(
    state: tauri::State<'_, AppState>,
    task_ids: Vec<String>,
) -> Result<usize, String> {
    delete_tasks_impl(state.inner(), task_ids)
        .map_err(|error| state.command_error("delete_tasks", &error))
}

#[tauri::command]
fn set_active_task(
    state: tauri::State<'_, AppState>,
    task_id: Option<String>,
) -> Result<Option<String>, String> {
    set_active_task_impl(state.inner(), task_id)
        .map_err(|error| state.command_error("set_active_task", &error))
}

#[tauri::command]
fn sort_tasks(state: tauri::State<'_, AppState>) -> Result<Vec<Task>, String> {
    sort_tasks_impl(state.inner()).map_err(|error| state.command_error("sort_tasks", &error))
}

#[tauri::command]
fn list_tasks(state: tauri::State<'_, AppState>) -> Result<Vec<Task>, String> {
    list_tasks_impl(state.inner()).map_err(|error| state.command_error("list_tasks", &error))
}

#[tauri::command]
fn current_quote(state: tauri::State<'_, AppState>) -> Result<QuoteResponse, String> {
    current_quote_impl(state.inner())
        .map_err(|error| state.command_error("current_quote", &error))
}

#[tauri::command]
fn pick_quote(state: tauri::State<'_, AppState>) -> Result<QuoteResponse, String> {
    pick_quote_impl(state.inner()).map_err(|error| state.command_error("pick_quote", &error))
}

#[tauri::command]
fn toggle_quote_like(
    state: tauri::State<'_, AppState>,
    index: Option<usize>,
) -> Result<QuoteResponse, String> {
    toggle_quote_like_impl(state.inner(), index)
        .map_err(|error| state.command_error("toggle_quote_like", &error))
}

#[tauri::command]
async fn refresh_quotes(
    state: tauri::State<'_, AppState>,
) -> Result<RefreshQuotesResponse, String> {
    refresh_quotes_impl(state.inner())
        .await
        .map_err(|error| state.command_error("refresh_quotes", &error))
}

#[tauri::command]
fn get_settings(state: tauri::State<'_, AppState>) -> Result<SettingsResponse, String> {
    get_settings_impl(state.inner()).map_err(|error| state.command_error("get_settings", &error))
}

#[tauri::command]
fn save_settings(
    state: tauri::State<'_, AppState>,
    durations: DurationMinutes,
    language: Language,
    assistant_name: String,
    assistant_role: String,
    timezone: Option<String>,
) -> Result<SaveSettingsResponse, String> {
    save_settings_impl(
        state.inner(),
        durations,
        language,
        assistant_name,
        assistant_role,
        timezone,
    )
    .map_err(|error| state.command_error("save_settings", &error))
}

#[tauri::command]
fn set_theme(state: tauri::State<'_, AppState>, theme: Theme) -> Result<Theme, String> {
    set_theme_impl(state.inner(), theme).map_err(|error| state.command_error("set_theme", &error))
}

#[tauri::command]
fn set_assistant_api_key(
    state: tauri::State<'_, AppState>,
    api_key: Option<String>,
) -> Result<bool, String> {
    set_assistant_api_key_impl(state.inner(), api_key)
        .map_err(|error| state.command_error("set_assistant_api_key", &error))
}

#[tauri::command]
fn poll_daily_review(
    state: tauri::State<'_, AppState>,
) -> Result<Option<ReviewSummary>, String> {
    poll_daily_review_impl(state.inner())
        .map_err(|error| state.command_error("poll_daily_review", &error))
}

#[tauri::command]
fn skip_review_today(
    state: tauri::State<'_, AppState>,
    window: ReviewWindow,
) -> Result<(), String> {
    skip_review_today_impl(state.inner(), window)
        .map_err(|error| state.command_error("skip_review_today", &error))
}

#[tauri::command]
fn get_review_summary(
    state: tauri::State<'_, AppState>,
    window: ReviewWindow,
) -> Result<ReviewSummary, String> {
    get_review_summary_impl(state.inner(), window)
        .map_err(|error| state.command_error("get_review_summary", &error))
}

#[tauri::command]
fn force_evening_review(state: tauri::State<'_, AppState>) -> Result<ReviewSummary, String> {
    force_evening_review_impl(state.inner())
        .map_err(|error| state.command_error("force_evening_review", &error))
}

pub fn run() {
    let workspace_root = std::env::current_dir().expect("failed to resolve current directory");
    let app_state = AppState::new(workspace_root).expect("failed to initialize app state");

    tauri::Builder::default()
        .manage(app_state)
        .setup(|app| {
            let state: tauri::State<'_, AppState> = app.state();
            let handle = app.handle().clone();
            state.connect_events(Arc::new(move |event, payload| {
                let _ = handle.emit(event, payload);
            }));

            let poller_state = state.inner().clone();
            tauri::async_runtime::spawn(async move {
                start_review_poller(&poller_state);
            });
            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            ping,
            get_timer_state,
            start_timer,
            pause_timer,
            reset_timer,
            switch_mode,
            tick_timer,
            create_task,
            breakdown_goal,
            regenerate_breakdown,
            toggle_task,
            edit_task,
            set_task_due_date,
            set_task_estimate,
            move_task,
            delete_task,
            delete_tasks,
            set_active_task,
            sort_tasks,
            list_tasks,
            current_quote,
            pick_quote,
            toggle_quote_like,
            refresh_quotes,
            get_settings,
            save_settings,
            set_theme,
            set_assistant_api_key,
            poll_daily_review,
            skip_review_today,
            get_review_summary,
            force_evening_review
        ])
        .run(tauri::generate_context!())
        .expect("failed to run tauri app");
}
