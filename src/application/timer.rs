use crate::domain::models::{DurationMinutes, TimerMode};
use serde::Serialize;

pub const WORK_SESSIONS_PER_CYCLE: u32 = 4;
pub const TICK_SECONDS: u64 = 1;

const CHIME_BASE_HZ: f32 = 2637.0;

/// Confirmation chime played when the countdown starts: three sine partials
/// with staggered starts and exponential decay.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ChimePartial {
    pub frequency_hz: f32,
    pub volume: f32,
    pub decay_seconds: f32,
    pub offset_seconds: f32,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ChimeSpec {
    pub partials: [ChimePartial; 3],
}

impl ChimeSpec {
    pub fn start_chime() -> Self {
        Self {
            partials: [
                ChimePartial {
                    frequency_hz: CHIME_BASE_HZ,
                    volume: 0.12,
                    decay_seconds: 0.4,
                    offset_seconds: 0.0,
                },
                ChimePartial {
                    frequency_hz: CHIME_BASE_HZ * 1.5,
                    volume: 0.04,
                    decay_seconds: 0.3,
                    offset_seconds: 0.02,
                },
                ChimePartial {
                    frequency_hz: CHIME_BASE_HZ * 2.618,
                    volume: 0.02,
                    decay_seconds: 0.2,
                    offset_seconds: 0.04,
                },
            ],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionCompletion {
    pub finished: TimerMode,
    pub next: TimerMode,
    pub long_break_started: bool,
}

/// The session state machine: current mode, countdown, running flag and the
/// work-session counter driving automatic transitions.
#[derive(Debug, Clone)]
pub struct TimerEngine {
    mode: TimerMode,
    time_left_seconds: u32,
    is_running: bool,
    completed_work_sessions: u32,
    durations: DurationMinutes,
}

impl TimerEngine {
    pub fn new(durations: DurationMinutes) -> Self {
        let time_left_seconds = duration_seconds(&durations, TimerMode::Work);
        Self {
            mode: TimerMode::Work,
            time_left_seconds,
            is_running: false,
            completed_work_sessions: 0,
            durations,
        }
    }

    pub fn mode(&self) -> TimerMode {
        self.mode
    }

    pub fn time_left_seconds(&self) -> u32 {
        self.time_left_seconds
    }

    pub fn is_running(&self) -> bool {
        self.is_running
    }

    pub fn completed_work_sessions(&self) -> u32 {
        self.completed_work_sessions
    }

    pub fn durations(&self) -> &DurationMinutes {
        &self.durations
    }

    /// Starts the countdown and returns the confirmation chime, or `None`
    /// when the timer was already running.
    pub fn start(&mut self) -> Option<ChimeSpec> {
        if self.is_running {
            return None;
        }
        self.is_running = true;
        Some(ChimeSpec::start_chime())
    }

    pub fn pause(&mut self) {
        self.is_running = false;
    }

    pub fn reset(&mut self) {
        self.time_left_seconds = duration_seconds(&self.durations, self.mode);
        self.is_running = false;
    }

    /// Manual override: replaces the mode, reloads the countdown and stops
    /// the timer. The work-session counter is left alone.
    pub fn switch_mode(&mut self, new_mode: TimerMode) {
        self.mode = new_mode;
        self.time_left_seconds = duration_seconds(&self.durations, new_mode);
        self.is_running = false;
    }

    /// Applies new durations. A paused countdown is reloaded for the current
    /// mode; a running one keeps counting unchanged.
    pub fn apply_durations(&mut self, durations: DurationMinutes) {
        self.durations = durations;
        if !self.is_running {
            self.time_left_seconds = duration_seconds(&self.durations, self.mode);
        }
    }

    /// Advances the countdown by one second. Valid only while running; a
    /// paused engine ignores the tick. Completion fires exactly when the
    /// countdown reaches zero and applies the auto-transition rule.
    pub fn tick(&mut self) -> Option<SessionCompletion> {
        if !self.is_running {
            return None;
        }
        if self.time_left_seconds > 0 {
            self.time_left_seconds -= 1;
        }
        if self.time_left_seconds > 0 {
            return None;
        }
        Some(self.complete())
    }

    fn complete(&mut self) -> SessionCompletion {
        let finished = self.mode;
        self.is_running = false;

        let next = match finished {
            TimerMode::Work => {
                self.completed_work_sessions += 1;
                if self.completed_work_sessions >= WORK_SESSIONS_PER_CYCLE {
                    self.completed_work_sessions = 0;
                    TimerMode::LongBreak
                } else {
                    TimerMode::ShortBreak
                }
            }
            TimerMode::ShortBreak | TimerMode::LongBreak => TimerMode::Work,
        };

        self.mode = next;
        self.time_left_seconds = duration_seconds(&self.durations, next);

        SessionCompletion {
            finished,
            next,
            long_break_started: next == TimerMode::LongBreak,
        }
    }
}

fn duration_seconds(durations: &DurationMinutes, mode: TimerMode) -> u32 {
    durations.get(mode) * 60
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{default_durations, ModeMap};
    use proptest::prelude::*;

    fn engine() -> TimerEngine {
        TimerEngine::new(default_durations())
    }

    fn run_to_completion(engine: &mut TimerEngine) -> SessionCompletion {
        let _ = engine.start();
        loop {
            if let Some(completion) = engine.tick() {
                return completion;
            }
        }
    }

    #[test]
    fn initial_state_is_paused_work_session() {
        let engine = engine();
        assert_eq!(engine.mode(), TimerMode::Work);
        assert_eq!(engine.time_left_seconds(), 25 * 60);
        assert!(!engine.is_running());
        assert_eq!(engine.completed_work_sessions(), 0);
    }

    #[test]
    fn tick_is_ignored_while_paused() {
        let mut engine = engine();
        assert_eq!(engine.tick(), None);
        assert_eq!(engine.time_left_seconds(), 25 * 60);
    }

    #[test]
    fn start_returns_chime_once_and_pause_does_not() {
        let mut engine = engine();
        let chime = engine.start().expect("chime on start");
        assert_eq!(chime.partials[0].frequency_hz, 2637.0);
        assert_eq!(chime.partials[1].frequency_hz, 2637.0 * 1.5);
        assert_eq!(chime.partials[2].frequency_hz, 2637.0 * 2.618);
        assert!(engine.start().is_none());

        let _ = engine.tick();
        engine.pause();
        assert!(!engine.is_running());
        assert_eq!(engine.time_left_seconds(), 25 * 60 - 1);

        assert_eq!(engine.tick(), None);
        assert_eq!(engine.time_left_seconds(), 25 * 60 - 1);
    }

    #[test]
    fn work_completion_transitions_to_short_break() {
        let mut engine = TimerEngine::new(ModeMap::new(1, 5, 15));
        let completion = run_to_completion(&mut engine);

        assert_eq!(completion.finished, TimerMode::Work);
        assert_eq!(completion.next, TimerMode::ShortBreak);
        assert!(!completion.long_break_started);
        assert_eq!(engine.mode(), TimerMode::ShortBreak);
        assert_eq!(engine.time_left_seconds(), 5 * 60);
        assert!(!engine.is_running());
        assert_eq!(engine.completed_work_sessions(), 1);
    }

    #[test]
    fn fourth_work_completion_starts_long_break_and_resets_counter() {
        let mut engine = TimerEngine::new(ModeMap::new(1, 1, 2));

        for cycle in 1..=3 {
            let completion = run_to_completion(&mut engine);
            assert_eq!(completion.next, TimerMode::ShortBreak);
            assert_eq!(engine.completed_work_sessions(), cycle);
            let completion = run_to_completion(&mut engine);
            assert_eq!(completion.finished, TimerMode::ShortBreak);
            assert_eq!(completion.next, TimerMode::Work);
        }

        let completion = run_to_completion(&mut engine);
        assert_eq!(completion.finished, TimerMode::Work);
        assert_eq!(completion.next, TimerMode::LongBreak);
        assert!(completion.long_break_started);
        assert_eq!(engine.completed_work_sessions(), 0);
        assert_eq!(engine.time_left_seconds(), 2 * 60);
    }

    #[test]
    fn break_completion_returns_to_work_without_touching_counter() {
        let mut engine = TimerEngine::new(ModeMap::new(1, 1, 1));
        let _ = run_to_completion(&mut engine);
        assert_eq!(engine.completed_work_sessions(), 1);

        let completion = run_to_completion(&mut engine);
        assert_eq!(completion.finished, TimerMode::ShortBreak);
        assert_eq!(completion.next, TimerMode::Work);
        assert_eq!(engine.completed_work_sessions(), 1);

        engine.switch_mode(TimerMode::LongBreak);
        let completion = run_to_completion(&mut engine);
        assert_eq!(completion.finished, TimerMode::LongBreak);
        assert_eq!(completion.next, TimerMode::Work);
        assert_eq!(engine.completed_work_sessions(), 1);
    }

    #[test]
    fn manual_switch_reloads_duration_and_stops() {
        let mut engine = engine();
        let _ = engine.start();
        for _ in 0..(25 * 60 - 10) {
            let _ = engine.tick();
        }
        assert_eq!(engine.time_left_seconds(), 10);

        engine.switch_mode(TimerMode::ShortBreak);
        assert_eq!(engine.time_left_seconds(), 300);
        assert!(!engine.is_running());
    }

    #[test]
    fn reset_reloads_current_mode_duration() {
        let mut engine = engine();
        let _ = engine.start();
        let _ = engine.tick();
        let _ = engine.tick();
        engine.reset();
        assert_eq!(engine.time_left_seconds(), 25 * 60);
        assert!(!engine.is_running());
    }

    #[test]
    fn apply_durations_reloads_only_while_paused() {
        let mut engine = engine();
        engine.apply_durations(ModeMap::new(50, 10, 20));
        assert_eq!(engine.time_left_seconds(), 50 * 60);

        let _ = engine.start();
        let _ = engine.tick();
        engine.apply_durations(ModeMap::new(30, 10, 20));
        assert_eq!(engine.time_left_seconds(), 50 * 60 - 1);
    }

    // Countdown property: while running, the countdown decreases by exactly
    // one per tick, never goes negative, and completes exactly at zero.
    proptest! {
        #[test]
        fn countdown_decreases_by_one_until_zero(minutes in 1u32..=10u32) {
            let mut engine = TimerEngine::new(ModeMap::new(minutes, 5, 15));
            let _ = engine.start();
            let total = minutes * 60;

            for expected in (0..total).rev() {
                let completion = engine.tick();
                if expected == 0 {
                    prop_assert!(completion.is_some());
                    prop_assert!(!engine.is_running());
                } else {
                    prop_assert!(completion.is_none());
                    prop_assert_eq!(engine.time_left_seconds(), expected);
                }
            }
        }
    }
}
