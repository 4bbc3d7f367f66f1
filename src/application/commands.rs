use crate::application::assistant::{AssistantService, GoalBreakdown, QuoteFetch};
use crate::application::bootstrap::bootstrap_workspace;
use crate::application::notification::{Notice, NotificationDispatcher};
use crate::application::quotes::QuoteBoard;
use crate::application::review::{
    self, build_summary, ReviewMarkers, ReviewSummary, ReviewWindow, REVIEW_POLL_SECONDS,
};
use crate::application::tasks::TaskBoard;
use crate::application::timer::{ChimeSpec, TimerEngine, TICK_SECONDS};
use crate::domain::models::{
    default_durations, validate_durations, DurationMinutes, Language, Task, Theme, TimerMode,
};
use crate::domain::ordering::SortDirection;
use crate::infrastructure::credential_store::{CredentialStore, KeyringCredentialStore};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::events::{EventBus, EventSink};
use crate::infrastructure::gemini_client::{AssistantClient, GeminiAssistantClient};
use crate::infrastructure::speech::BusSpeechSynthesizer;
use crate::infrastructure::storage::{load_or_default, save_json, SqliteStateStore, StateStore};
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use std::collections::HashSet;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;

const KEY_THEME: &str = "flow_pomodoro_theme";
const KEY_LANGUAGE: &str = "flow_pomodoro_lang";
const KEY_ASSISTANT_NAME: &str = "flow_pomodoro_assistant_name";
const KEY_ASSISTANT_ROLE: &str = "flow_pomodoro_assistant_role";
const KEY_QUOTES_CACHE: &str = "flow_pomodoro_quotes_cache";
const KEY_TASKS: &str = "flow_pomodoro_tasks";
const KEY_SETTINGS: &str = "zen_pomodoro_settings";
const KEY_MORNING_SHOWN: &str = "flow_pomodoro_morning_shown";
const KEY_EVENING_SHOWN: &str = "flow_pomodoro_evening_shown";
const KEY_SKIP_MORNING: &str = "flow_pomodoro_skip_morning_date";
const KEY_SKIP_EVENING: &str = "flow_pomodoro_skip_evening_date";
const KEY_TIMEZONE: &str = "timezone";

const DEFAULT_ASSISTANT_NAME: &str = "梦玉";

fn default_assistant_role(language: Language) -> &'static str {
    match language {
        Language::Zh => "小宠物",
        Language::En => "pet",
    }
}

pub type NowProvider = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// An owned, cancellable scheduled task; aborted when superseded or dropped.
pub struct ScheduledTask {
    handle: JoinHandle<()>,
}

impl ScheduledTask {
    fn new(handle: JoinHandle<()>) -> Self {
        Self { handle }
    }

    pub fn abort(&self) {
        self.handle.abort();
    }
}

impl Drop for ScheduledTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

struct RuntimeState {
    engine: TimerEngine,
    tasks: TaskBoard,
    quotes: QuoteBoard,
    theme: Theme,
    language: Language,
    assistant_name: String,
    assistant_role: String,
    review: ReviewMarkers,
    timezone: Tz,
    sort_direction: Option<SortDirection>,
}

#[derive(Clone)]
pub struct AppState {
    logs_dir: PathBuf,
    store: Arc<dyn StateStore>,
    credentials: Arc<dyn CredentialStore>,
    events: Arc<EventBus>,
    dispatcher: Arc<NotificationDispatcher>,
    assistant: Arc<AssistantService>,
    runtime: Arc<Mutex<RuntimeState>>,
    ticker: Arc<Mutex<Option<ScheduledTask>>>,
    review_poller: Arc<Mutex<Option<ScheduledTask>>>,
    log_guard: Arc<Mutex<()>>,
    now_provider: NowProvider,
}

impl AppState {
    pub fn new(workspace_root: PathBuf) -> Result<Self, InfraError> {
        let bootstrap = bootstrap_workspace(&workspace_root)?;
        let store: Arc<dyn StateStore> =
            Arc::new(SqliteStateStore::new(&bootstrap.database_path));
        let credentials: Arc<dyn CredentialStore> =
            Arc::new(KeyringCredentialStore::default());
        let events = Arc::new(EventBus::default());
        let dispatcher = Arc::new(NotificationDispatcher::new(
            Arc::new(BusSpeechSynthesizer::new(Arc::clone(&events))),
            Arc::clone(&events),
        ));
        let client = GeminiAssistantClient::new(Arc::clone(&credentials));
        let runtime = load_runtime(store.as_ref());

        Ok(Self {
            logs_dir: bootstrap.logs_dir,
            store,
            credentials,
            events,
            dispatcher,
            assistant: Arc::new(AssistantService::new(Arc::new(client))),
            runtime: Arc::new(Mutex::new(runtime)),
            ticker: Arc::new(Mutex::new(None)),
            review_poller: Arc::new(Mutex::new(None)),
            log_guard: Arc::new(Mutex::new(())),
            now_provider: Arc::new(Utc::now),
        })
    }

    pub fn with_now_provider(mut self, now_provider: NowProvider) -> Self {
        self.now_provider = now_provider;
        self
    }

    pub fn with_assistant_client(mut self, client: Arc<dyn AssistantClient>) -> Self {
        self.assistant = Arc::new(AssistantService::new(client));
        self
    }

    pub fn connect_events(&self, sink: EventSink) {
        self.events.connect(sink);
    }

    pub fn command_error(&self, command: &str, error: &InfraError) -> String {
        self.log_error(command, &error.to_string());
        error.to_string()
    }

    pub fn log_info(&self, command: &str, message: &str) {
        self.append_log("info", command, message);
    }

    pub fn log_error(&self, command: &str, message: &str) {
        self.append_log("error", command, message);
    }

    fn append_log(&self, level: &str, command: &str, message: &str) {
        let Ok(_guard) = self.log_guard.lock() else {
            return;
        };
        let path = self.logs_dir.join("commands.log");
        let payload = serde_json::json!({
            "timestamp": Utc::now().to_rfc3339(),
            "level": level,
            "command": command,
            "message": message,
        });

        if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
            let _ = writeln!(file, "{}", payload);
        }
    }

    fn local_now(&self, timezone: Tz) -> DateTime<Tz> {
        (self.now_provider)().with_timezone(&timezone)
    }
}

fn load_runtime(store: &dyn StateStore) -> RuntimeState {
    let durations = {
        let loaded: DurationMinutes = load_or_default(store, KEY_SETTINGS, default_durations);
        if validate_durations(&loaded).is_ok() {
            loaded
        } else {
            default_durations()
        }
    };
    let language: Language = load_or_default(store, KEY_LANGUAGE, || Language::Zh);
    let tasks: Vec<Task> = load_or_default(store, KEY_TASKS, Vec::new);
    let pools = load_or_default(store, KEY_QUOTES_CACHE, || QuoteBoard::seeded().pools().clone());
    let timezone: Tz = load_or_default::<String, _>(store, KEY_TIMEZONE, || "UTC".to_string())
        .parse()
        .unwrap_or(chrono_tz::UTC);

    RuntimeState {
        engine: TimerEngine::new(durations),
        tasks: TaskBoard::from_parts(tasks, None),
        quotes: QuoteBoard::from_pools(pools),
        theme: load_or_default(store, KEY_THEME, || Theme::Light),
        language,
        assistant_name: load_or_default(store, KEY_ASSISTANT_NAME, || {
            DEFAULT_ASSISTANT_NAME.to_string()
        }),
        assistant_role: load_or_default(store, KEY_ASSISTANT_ROLE, || {
            default_assistant_role(language).to_string()
        }),
        review: ReviewMarkers {
            morning_shown: load_or_default(store, KEY_MORNING_SHOWN, || None),
            evening_shown: load_or_default(store, KEY_EVENING_SHOWN, || None),
            skip_morning_date: load_or_default(store, KEY_SKIP_MORNING, || None),
            skip_evening_date: load_or_default(store, KEY_SKIP_EVENING, || None),
        },
        timezone,
        sort_direction: None,
    }
}

fn lock_runtime(state: &AppState) -> Result<MutexGuard<'_, RuntimeState>, InfraError> {
    state
        .runtime
        .lock()
        .map_err(|error| InfraError::InvalidConfig(format!("runtime lock poisoned: {error}")))
}

fn parse_date_input(value: Option<&str>) -> Option<NaiveDate> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .and_then(|value| NaiveDate::parse_from_str(value, "%Y-%m-%d").ok())
}

fn emit(state: &AppState, event: &str, payload: impl Serialize) {
    state.events.emit(
        event,
        serde_json::to_value(payload).unwrap_or(serde_json::Value::Null),
    );
}

// ---------------------------------------------------------------------------
// Timer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TimerStateResponse {
    pub mode: TimerMode,
    pub time_left_seconds: u32,
    pub is_running: bool,
    pub completed_work_sessions: u32,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StartTimerResponse {
    pub state: TimerStateResponse,
    pub chime: Option<ChimeSpec>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CompletionNotice {
    pub finished: TimerMode,
    pub notice: Notice,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TickResponse {
    pub state: TimerStateResponse,
    pub completion: Option<CompletionNotice>,
}

fn snapshot(engine: &TimerEngine) -> TimerStateResponse {
    TimerStateResponse {
        mode: engine.mode(),
        time_left_seconds: engine.time_left_seconds(),
        is_running: engine.is_running(),
        completed_work_sessions: engine.completed_work_sessions(),
    }
}

pub fn get_timer_state_impl(state: &AppState) -> Result<TimerStateResponse, InfraError> {
    let runtime = lock_runtime(state)?;
    Ok(snapshot(&runtime.engine))
}

pub async fn start_timer_impl(state: &AppState) -> Result<StartTimerResponse, InfraError> {
    let (response, started) = {
        let mut runtime = lock_runtime(state)?;
        let chime = runtime.engine.start();
        let started = chime.is_some();
        (
            StartTimerResponse {
                state: snapshot(&runtime.engine),
                chime,
            },
            started,
        )
    };

    if started {
        spawn_ticker(state);
        emit(state, "timer://chime", &response.chime);
        state.log_info("start_timer", "countdown started");
    }
    Ok(response)
}

pub fn pause_timer_impl(state: &AppState) -> Result<TimerStateResponse, InfraError> {
    let mut runtime = lock_runtime(state)?;
    runtime.engine.pause();
    stop_ticker(state);
    state.log_info("pause_timer", "countdown paused");
    Ok(snapshot(&runtime.engine))
}

pub fn reset_timer_impl(state: &AppState) -> Result<TimerStateResponse, InfraError> {
    let mut runtime = lock_runtime(state)?;
    runtime.engine.reset();
    stop_ticker(state);
    state.log_info("reset_timer", "countdown reset");
    Ok(snapshot(&runtime.engine))
}

pub fn switch_mode_impl(
    state: &AppState,
    mode: TimerMode,
) -> Result<TimerStateResponse, InfraError> {
    let mut runtime = lock_runtime(state)?;
    runtime.engine.switch_mode(mode);
    runtime.quotes.pick_random(mode, &mut rand::thread_rng());
    stop_ticker(state);
    state.log_info("switch_mode", &format!("switched to {}", mode.as_str()));
    Ok(snapshot(&runtime.engine))
}

/// One countdown step plus, on completion, the whole completion pipeline:
/// pomodoro credit for the active task, the localized notice, and the quote
/// selection for the next mode. Runs under the runtime lock so no later tick
/// can observe a half-applied transition.
pub fn tick_timer_impl(state: &AppState) -> Result<TickResponse, InfraError> {
    let mut runtime = lock_runtime(state)?;
    let completion = runtime.engine.tick();

    let mut completion_notice = None;
    if let Some(completion) = completion {
        if completion.finished == TimerMode::Work {
            if let Some(active_id) = runtime.tasks.active_task_id().map(ToOwned::to_owned) {
                runtime.tasks.increment_pomodoro(&active_id);
            }
            persist_tasks(state, &runtime)?;
        }
        runtime
            .quotes
            .pick_random(completion.next, &mut rand::thread_rng());

        let notice = state.dispatcher.notify(
            completion.finished,
            runtime.language,
            &runtime.assistant_name,
            &runtime.assistant_role,
        );
        state.log_info(
            "timer_complete",
            &format!(
                "finished {} session, next {}",
                completion.finished.as_str(),
                completion.next.as_str()
            ),
        );
        completion_notice = Some(CompletionNotice {
            finished: completion.finished,
            notice,
        });
    }

    let response = TickResponse {
        state: snapshot(&runtime.engine),
        completion: completion_notice,
    };
    drop(runtime);

    emit(state, "timer://tick", &response.state);
    if let Some(completion) = &response.completion {
        emit(state, "timer://completed", completion);
    }
    Ok(response)
}

fn spawn_ticker(state: &AppState) {
    let Ok(mut guard) = state.ticker.lock() else {
        return;
    };
    if let Some(previous) = guard.take() {
        previous.abort();
    }

    let ticker_state = state.clone();
    let handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(TICK_SECONDS));
        interval.tick().await;
        loop {
            interval.tick().await;
            match tick_timer_impl(&ticker_state) {
                Ok(response) if response.state.is_running => {}
                _ => break,
            }
        }
    });
    *guard = Some(ScheduledTask::new(handle));
}

fn stop_ticker(state: &AppState) {
    if let Ok(mut guard) = state.ticker.lock() {
        if let Some(task) = guard.take() {
            task.abort();
        }
    }
}

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BreakdownResponse {
    pub busy: bool,
    pub created: Vec<Task>,
}

pub fn create_task_impl(
    state: &AppState,
    title: String,
    due_date: Option<String>,
    estimate: Option<u32>,
) -> Result<Option<Task>, InfraError> {
    let due_date = parse_date_input(due_date.as_deref());
    let mut runtime = lock_runtime(state)?;
    let created = runtime
        .tasks
        .add_task(&title, due_date, estimate.unwrap_or(1));
    if let Some(task) = &created {
        persist_tasks(state, &runtime)?;
        state.log_info("create_task", &format!("created task_id={}", task.id));
    }
    Ok(created)
}

pub async fn breakdown_goal_impl(
    state: &AppState,
    goal: String,
    due_date: Option<String>,
) -> Result<BreakdownResponse, InfraError> {
    let language = {
        let runtime = lock_runtime(state)?;
        runtime.language
    };

    match state.assistant.break_down_goal(&goal, language).await {
        GoalBreakdown::Busy => {
            state.log_info("breakdown_goal", "breakdown already in flight, rejected");
            Ok(BreakdownResponse {
                busy: true,
                created: Vec::new(),
            })
        }
        GoalBreakdown::Tasks {
            titles,
            fallback_reason,
        } => {
            if let Some(reason) = fallback_reason {
                state.log_error(
                    "breakdown_goal",
                    &format!("remote breakdown failed, using local fallback: {reason}"),
                );
            }
            if titles.is_empty() {
                return Ok(BreakdownResponse {
                    busy: false,
                    created: Vec::new(),
                });
            }

            let due_date = parse_date_input(due_date.as_deref());
            let mut runtime = lock_runtime(state)?;
            let created = runtime.tasks.add_batch(&goal, &titles, due_date);
            persist_tasks(state, &runtime)?;
            state.log_info(
                "breakdown_goal",
                &format!("created {} tasks from goal", created.len()),
            );
            Ok(BreakdownResponse {
                busy: false,
                created,
            })
        }
    }
}

/// Delete-then-recreate for the last generated batch, reusing its goal.
pub async fn regenerate_breakdown_impl(
    state: &AppState,
) -> Result<BreakdownResponse, InfraError> {
    let (goal, language) = {
        let runtime = lock_runtime(state)?;
        (
            runtime.tasks.last_breakdown_goal().map(ToOwned::to_owned),
            runtime.language,
        )
    };
    let Some(goal) = goal else {
        return Ok(BreakdownResponse {
            busy: false,
            created: Vec::new(),
        });
    };

    match state.assistant.break_down_goal(&goal, language).await {
        GoalBreakdown::Busy => Ok(BreakdownResponse {
            busy: true,
            created: Vec::new(),
        }),
        GoalBreakdown::Tasks {
            titles,
            fallback_reason,
        } => {
            if let Some(reason) = fallback_reason {
                state.log_error(
                    "regenerate_breakdown",
                    &format!("remote breakdown failed, using local fallback: {reason}"),
                );
            }
            if titles.is_empty() {
                return Ok(BreakdownResponse {
                    busy: false,
                    created: Vec::new(),
                });
            }

            let mut runtime = lock_runtime(state)?;
            let _ = runtime.tasks.remove_last_breakdown();
            let created = runtime.tasks.add_batch(&goal, &titles, None);
            persist_tasks(state, &runtime)?;
            state.log_info(
                "regenerate_breakdown",
                &format!("recreated {} tasks from goal", created.len()),
            );
            Ok(BreakdownResponse {
                busy: false,
                created,
            })
        }
    }
}

pub fn toggle_task_impl(state: &AppState, task_id: String) -> Result<Option<Task>, InfraError> {
    let mut runtime = lock_runtime(state)?;
    let today = state.local_now(runtime.timezone).date_naive();
    let toggled = runtime.tasks.toggle_complete(&task_id, today);
    if toggled.is_some() {
        persist_tasks(state, &runtime)?;
        state.log_info("toggle_task", &format!("toggled task_id={task_id}"));
    }
    Ok(toggled)
}

pub fn edit_task_impl(
    state: &AppState,
    task_id: String,
    title: String,
    due_date: Option<String>,
    estimate: u32,
) -> Result<Option<Task>, InfraError> {
    let due_date = parse_date_input(due_date.as_deref());
    let mut runtime = lock_runtime(state)?;
    let edited = runtime.tasks.edit_task(&task_id, &title, due_date, estimate);
    if edited.is_some() {
        persist_tasks(state, &runtime)?;
        state.log_info("edit_task", &format!("edited task_id={task_id}"));
    }
    Ok(edited)
}

pub fn set_task_due_date_impl(
    state: &AppState,
    task_id: String,
    due_date: Option<String>,
) -> Result<bool, InfraError> {
    let due_date = parse_date_input(due_date.as_deref());
    let mut runtime = lock_runtime(state)?;
    let updated = runtime.tasks.set_due_date(&task_id, due_date);
    if updated {
        persist_tasks(state, &runtime)?;
    }
    Ok(updated)
}

pub fn set_task_estimate_impl(
    state: &AppState,
    task_id: String,
    estimate: u32,
) -> Result<bool, InfraError> {
    let mut runtime = lock_runtime(state)?;
    let updated = runtime.tasks.set_estimate(&task_id, estimate);
    if updated {
        persist_tasks(state, &runtime)?;
    }
    Ok(updated)
}

pub fn move_task_impl(
    state: &AppState,
    task_id: String,
    to_index: usize,
) -> Result<bool, InfraError> {
    let mut runtime = lock_runtime(state)?;
    let moved = runtime.tasks.move_task(&task_id, to_index);
    if moved {
        runtime.sort_direction = None;
        persist_tasks(state, &runtime)?;
    }
    Ok(moved)
}

pub fn delete_task_impl(state: &AppState, task_id: String) -> Result<bool, InfraError> {
    let mut runtime = lock_runtime(state)?;
    let removed = runtime.tasks.delete_task(&task_id);
    if removed {
        persist_tasks(state, &runtime)?;
        state.log_info("delete_task", &format!("deleted task_id={task_id}"));
    }
    Ok(removed)
}

pub fn delete_tasks_impl(state: &AppState, task_ids: Vec<String>) -> Result<usize, InfraError> {
    let ids: HashSet<String> = task_ids
        .into_iter()
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .collect();
    if ids.is_empty() {
        return Ok(0);
    }

    let mut runtime = lock_runtime(state)?;
    let removed = runtime.tasks.delete_many(&ids);
    if removed > 0 {
        persist_tasks(state, &runtime)?;
        state.log_info("delete_tasks", &format!("deleted {removed} tasks"));
    }
    Ok(removed)
}

pub fn set_active_task_impl(
    state: &AppState,
    task_id: Option<String>,
) -> Result<Option<String>, InfraError> {
    let mut runtime = lock_runtime(state)?;
    runtime.tasks.set_active(task_id);
    Ok(runtime.tasks.active_task_id().map(ToOwned::to_owned))
}

/// Toggles the due-date sort direction and reorders the board. Completed
/// tasks keep their recency order whichever direction is chosen.
pub fn sort_tasks_impl(state: &AppState) -> Result<Vec<Task>, InfraError> {
    let mut runtime = lock_runtime(state)?;
    let direction = runtime
        .sort_direction
        .map(SortDirection::toggled)
        .unwrap_or(SortDirection::Asc);
    runtime.sort_direction = Some(direction);
    runtime.tasks.sort_by_due_date(direction);
    persist_tasks(state, &runtime)?;
    Ok(runtime.tasks.tasks().to_vec())
}

pub fn list_tasks_impl(state: &AppState) -> Result<Vec<Task>, InfraError> {
    let runtime = lock_runtime(state)?;
    Ok(runtime.tasks.tasks().to_vec())
}

// ---------------------------------------------------------------------------
// Quotes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct QuoteResponse {
    pub text: String,
    pub is_liked: bool,
    pub index: usize,
    pub pool_size: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RefreshQuotesResponse {
    pub busy: bool,
    pub quote: QuoteResponse,
}

fn quote_response(runtime: &RuntimeState) -> QuoteResponse {
    let mode = runtime.engine.mode();
    let entry = runtime.quotes.current(mode);
    QuoteResponse {
        text: entry.text.clone(),
        is_liked: entry.is_liked,
        index: runtime.quotes.current_index(),
        pool_size: runtime.quotes.pool_len(mode),
    }
}

pub fn current_quote_impl(state: &AppState) -> Result<QuoteResponse, InfraError> {
    let runtime = lock_runtime(state)?;
    Ok(quote_response(&runtime))
}

pub fn pick_quote_impl(state: &AppState) -> Result<QuoteResponse, InfraError> {
    let mut runtime = lock_runtime(state)?;
    let mode = runtime.engine.mode();
    runtime.quotes.pick_random(mode, &mut rand::thread_rng());
    Ok(quote_response(&runtime))
}

pub fn toggle_quote_like_impl(
    state: &AppState,
    index: Option<usize>,
) -> Result<QuoteResponse, InfraError> {
    let mut runtime = lock_runtime(state)?;
    let mode = runtime.engine.mode();
    let index = index.unwrap_or_else(|| runtime.quotes.current_index());
    if runtime.quotes.toggle_like(mode, index) {
        persist_quotes(state, &runtime)?;
    }
    Ok(quote_response(&runtime))
}

pub async fn refresh_quotes_impl(state: &AppState) -> Result<RefreshQuotesResponse, InfraError> {
    let (mode, language) = {
        let runtime = lock_runtime(state)?;
        (runtime.engine.mode(), runtime.language)
    };

    match state.assistant.fetch_quote_batch(mode, language).await {
        QuoteFetch::Busy => {
            state.log_info("refresh_quotes", "refresh already in flight, rejected");
            let runtime = lock_runtime(state)?;
            Ok(RefreshQuotesResponse {
                busy: true,
                quote: quote_response(&runtime),
            })
        }
        QuoteFetch::Batch {
            quotes,
            fallback_reason,
        } => {
            if let Some(reason) = fallback_reason {
                state.log_error(
                    "refresh_quotes",
                    &format!("remote fetch failed, using fallback pool: {reason}"),
                );
            }
            let mut runtime = lock_runtime(state)?;
            runtime
                .quotes
                .merge_refresh(mode, quotes, &mut rand::thread_rng());
            persist_quotes(state, &runtime)?;
            state.log_info(
                "refresh_quotes",
                &format!(
                    "refreshed {} pool, size {}",
                    mode.as_str(),
                    runtime.quotes.pool_len(mode)
                ),
            );
            Ok(RefreshQuotesResponse {
                busy: false,
                quote: quote_response(&runtime),
            })
        }
    }
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SettingsResponse {
    pub durations: DurationMinutes,
    pub language: Language,
    pub theme: Theme,
    pub assistant_name: String,
    pub assistant_role: String,
    pub timezone: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SaveSettingsResponse {
    pub saved: bool,
    pub settings: SettingsResponse,
}

fn settings_response(runtime: &RuntimeState) -> SettingsResponse {
    SettingsResponse {
        durations: runtime.engine.durations().clone(),
        language: runtime.language,
        theme: runtime.theme,
        assistant_name: runtime.assistant_name.clone(),
        assistant_role: runtime.assistant_role.clone(),
        timezone: runtime.timezone.name().to_string(),
    }
}

pub fn get_settings_impl(state: &AppState) -> Result<SettingsResponse, InfraError> {
    let runtime = lock_runtime(state)?;
    Ok(settings_response(&runtime))
}

/// Applies and persists the settings bundle. Out-of-range durations reject
/// the whole save as a no-op; the paused countdown reloads for the current
/// mode while a running one keeps counting.
pub fn save_settings_impl(
    state: &AppState,
    durations: DurationMinutes,
    language: Language,
    assistant_name: String,
    assistant_role: String,
    timezone: Option<String>,
) -> Result<SaveSettingsResponse, InfraError> {
    let mut runtime = lock_runtime(state)?;
    if let Err(reason) = validate_durations(&durations) {
        state.log_error("save_settings", &format!("rejected settings: {reason}"));
        return Ok(SaveSettingsResponse {
            saved: false,
            settings: settings_response(&runtime),
        });
    }

    runtime.engine.apply_durations(durations);
    runtime.language = language;

    let assistant_name = assistant_name.trim();
    if !assistant_name.is_empty() {
        runtime.assistant_name = assistant_name.to_string();
    }
    let assistant_role = assistant_role.trim();
    if !assistant_role.is_empty() {
        runtime.assistant_role = assistant_role.to_string();
    }
    if let Some(parsed) = timezone.and_then(|raw| raw.trim().parse::<Tz>().ok()) {
        runtime.timezone = parsed;
    }

    persist_settings(state, &runtime)?;
    state.log_info("save_settings", "settings saved");
    Ok(SaveSettingsResponse {
        saved: true,
        settings: settings_response(&runtime),
    })
}

pub fn set_theme_impl(state: &AppState, theme: Theme) -> Result<Theme, InfraError> {
    let mut runtime = lock_runtime(state)?;
    runtime.theme = theme;
    save_json(state.store.as_ref(), KEY_THEME, &runtime.theme)?;
    Ok(runtime.theme)
}

/// Stores the assistant API key in the platform credential manager, or
/// removes it when the input is empty. Returns whether a key is configured
/// afterwards.
pub fn set_assistant_api_key_impl(
    state: &AppState,
    api_key: Option<String>,
) -> Result<bool, InfraError> {
    let api_key = api_key.map(|key| key.trim().to_string()).filter(|key| !key.is_empty());
    match api_key {
        Some(key) => {
            state.credentials.save_api_key(&key)?;
            state.log_info("set_assistant_api_key", "stored assistant api key");
            Ok(true)
        }
        None => {
            state.credentials.delete_api_key()?;
            state.log_info("set_assistant_api_key", "removed assistant api key");
            Ok(false)
        }
    }
}

// ---------------------------------------------------------------------------
// Daily review
// ---------------------------------------------------------------------------

pub fn poll_daily_review_impl(state: &AppState) -> Result<Option<ReviewSummary>, InfraError> {
    let mut runtime = lock_runtime(state)?;
    let local = state.local_now(runtime.timezone);
    let today = local.date_naive();
    let today_str = today.format("%Y-%m-%d").to_string();

    let Some(window) = review::poll(&mut runtime.review, &today_str, local.time()) else {
        return Ok(None);
    };
    persist_markers(state, &runtime)?;

    let summary = build_summary(window, runtime.tasks.tasks(), today);
    drop(runtime);

    emit(state, "review://summary", &summary);
    state.log_info(
        "poll_daily_review",
        &format!("triggered {:?} summary for {today_str}", window),
    );
    Ok(Some(summary))
}

pub fn skip_review_today_impl(
    state: &AppState,
    window: ReviewWindow,
) -> Result<(), InfraError> {
    let mut runtime = lock_runtime(state)?;
    let today = state
        .local_now(runtime.timezone)
        .date_naive()
        .format("%Y-%m-%d")
        .to_string();
    runtime.review.skip_today(window, &today);
    persist_markers(state, &runtime)?;
    state.log_info("skip_review_today", &format!("skipped {window:?} for {today}"));
    Ok(())
}

pub fn get_review_summary_impl(
    state: &AppState,
    window: ReviewWindow,
) -> Result<ReviewSummary, InfraError> {
    let runtime = lock_runtime(state)?;
    let today = state.local_now(runtime.timezone).date_naive();
    Ok(build_summary(window, runtime.tasks.tasks(), today))
}

/// Debug hook: clears the evening markers, records the summary as shown and
/// returns it immediately.
pub fn force_evening_review_impl(state: &AppState) -> Result<ReviewSummary, InfraError> {
    let mut runtime = lock_runtime(state)?;
    let today = state.local_now(runtime.timezone).date_naive();
    let today_str = today.format("%Y-%m-%d").to_string();
    runtime.review.clear_window(ReviewWindow::Evening);
    runtime.review.mark_shown(ReviewWindow::Evening, &today_str);
    persist_markers(state, &runtime)?;
    Ok(build_summary(ReviewWindow::Evening, runtime.tasks.tasks(), today))
}

pub fn start_review_poller(state: &AppState) {
    let Ok(mut guard) = state.review_poller.lock() else {
        return;
    };
    if let Some(previous) = guard.take() {
        previous.abort();
    }

    let poller_state = state.clone();
    let handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(REVIEW_POLL_SECONDS));
        loop {
            interval.tick().await;
            let _ = poll_daily_review_impl(&poller_state);
        }
    });
    *guard = Some(ScheduledTask::new(handle));
}

// ---------------------------------------------------------------------------
// Persistence subscribers
// ---------------------------------------------------------------------------

fn persist_tasks(state: &AppState, runtime: &RuntimeState) -> Result<(), InfraError> {
    save_json(state.store.as_ref(), KEY_TASKS, runtime.tasks.tasks())
}

fn persist_quotes(state: &AppState, runtime: &RuntimeState) -> Result<(), InfraError> {
    save_json(state.store.as_ref(), KEY_QUOTES_CACHE, runtime.quotes.pools())
}

fn persist_settings(state: &AppState, runtime: &RuntimeState) -> Result<(), InfraError> {
    let store = state.store.as_ref();
    save_json(store, KEY_SETTINGS, runtime.engine.durations())?;
    save_json(store, KEY_LANGUAGE, &runtime.language)?;
    save_json(store, KEY_ASSISTANT_NAME, &runtime.assistant_name)?;
    save_json(store, KEY_ASSISTANT_ROLE, &runtime.assistant_role)?;
    save_json(store, KEY_TIMEZONE, runtime.timezone.name())?;
    Ok(())
}

fn persist_markers(state: &AppState, runtime: &RuntimeState) -> Result<(), InfraError> {
    let store = state.store.as_ref();
    save_json(store, KEY_MORNING_SHOWN, &runtime.review.morning_shown)?;
    save_json(store, KEY_EVENING_SHOWN, &runtime.review.evening_shown)?;
    save_json(store, KEY_SKIP_MORNING, &runtime.review.skip_morning_date)?;
    save_json(store, KEY_SKIP_EVENING, &runtime.review.skip_evening_date)?;
    Ok(())
}
