use crate::application::quotes::builtin_pool;
use crate::domain::models::{Language, TimerMode};
use crate::infrastructure::gemini_client::{goal_delimiters, AssistantClient, MAX_BREAKDOWN_TASKS};
use rand::seq::SliceRandom;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, PartialEq, Eq)]
pub enum QuoteFetch {
    /// A refresh is already outstanding; the request is rejected, not queued.
    Busy,
    Batch {
        quotes: Vec<String>,
        fallback_reason: Option<String>,
    },
}

#[derive(Debug, PartialEq, Eq)]
pub enum GoalBreakdown {
    /// A breakdown is already outstanding; the request is rejected, not queued.
    Busy,
    Tasks {
        titles: Vec<String>,
        fallback_reason: Option<String>,
    },
}

/// Front door to the remote text generation service. Remote faults never
/// escape: every call resolves to usable content, possibly from the built-in
/// fallbacks, with the failure carried along for logging only.
pub struct AssistantService {
    client: Arc<dyn AssistantClient>,
    refresh_in_flight: AtomicBool,
    breakdown_in_flight: AtomicBool,
}

struct FlightGuard<'a>(&'a AtomicBool);

impl<'a> FlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl AssistantService {
    pub fn new(client: Arc<dyn AssistantClient>) -> Self {
        Self {
            client,
            refresh_in_flight: AtomicBool::new(false),
            breakdown_in_flight: AtomicBool::new(false),
        }
    }

    pub async fn fetch_quote_batch(&self, mode: TimerMode, language: Language) -> QuoteFetch {
        let Some(_guard) = FlightGuard::acquire(&self.refresh_in_flight) else {
            return QuoteFetch::Busy;
        };

        match self.client.fetch_quotes(mode, language).await {
            Ok(quotes) => QuoteFetch::Batch {
                quotes,
                fallback_reason: None,
            },
            Err(error) => QuoteFetch::Batch {
                quotes: shuffled_fallback_quotes(mode, language),
                fallback_reason: Some(error.to_string()),
            },
        }
    }

    pub async fn break_down_goal(&self, goal: &str, language: Language) -> GoalBreakdown {
        let goal = goal.trim();
        if goal.is_empty() {
            return GoalBreakdown::Tasks {
                titles: Vec::new(),
                fallback_reason: None,
            };
        }
        let Some(_guard) = FlightGuard::acquire(&self.breakdown_in_flight) else {
            return GoalBreakdown::Busy;
        };

        match self.client.break_down_goal(goal, language).await {
            Ok(titles) => GoalBreakdown::Tasks {
                titles,
                fallback_reason: None,
            },
            Err(error) => GoalBreakdown::Tasks {
                titles: fallback_breakdown(goal, language),
                fallback_reason: Some(error.to_string()),
            },
        }
    }
}

fn shuffled_fallback_quotes(mode: TimerMode, language: Language) -> Vec<String> {
    let mut quotes: Vec<String> = builtin_pool(mode, language)
        .iter()
        .map(|text| (*text).to_string())
        .collect();
    quotes.shuffle(&mut rand::thread_rng());
    quotes
}

/// Local breakdown: split the goal on language-appropriate punctuation when
/// that yields more than one usable segment, otherwise hand out the generic
/// step template.
pub fn fallback_breakdown(goal: &str, language: Language) -> Vec<String> {
    let segments: Vec<String> = goal
        .split(goal_delimiters(language))
        .map(str::trim)
        .filter(|segment| segment.chars().count() > 2)
        .map(ToOwned::to_owned)
        .take(MAX_BREAKDOWN_TASKS)
        .collect();
    if segments.len() > 1 {
        return segments;
    }
    template_steps(goal, language)
}

fn template_steps(goal: &str, language: Language) -> Vec<String> {
    let steps: &[&str] = match language {
        Language::Zh => &["明确需求", "拆分模块", "搭建环境", "实现核心流程", "测试与优化"],
        Language::En => &[
            "Clarify requirements",
            "Split modules",
            "Setup environment",
            "Implement core flow",
            "Test and refine",
        ],
    };
    let count = if goal.trim().is_empty() { 3 } else { 5 };
    steps.iter().take(count).map(|step| (*step).to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::error::InfraError;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::time::Duration;

    struct ScriptedClient {
        quotes: Result<Vec<String>, String>,
        breakdown: Result<Vec<String>, String>,
        delay: Option<Duration>,
    }

    impl ScriptedClient {
        fn ok(quotes: &[&str], breakdown: &[&str]) -> Self {
            Self {
                quotes: Ok(quotes.iter().map(|s| s.to_string()).collect()),
                breakdown: Ok(breakdown.iter().map(|s| s.to_string()).collect()),
                delay: None,
            }
        }

        fn failing(message: &str) -> Self {
            Self {
                quotes: Err(message.to_string()),
                breakdown: Err(message.to_string()),
                delay: None,
            }
        }
    }

    #[async_trait]
    impl AssistantClient for ScriptedClient {
        async fn fetch_quotes(
            &self,
            _mode: TimerMode,
            _language: Language,
        ) -> Result<Vec<String>, InfraError> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.quotes
                .clone()
                .map_err(InfraError::Assistant)
        }

        async fn break_down_goal(
            &self,
            _goal: &str,
            _language: Language,
        ) -> Result<Vec<String>, InfraError> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.breakdown
                .clone()
                .map_err(InfraError::Assistant)
        }
    }

    #[tokio::test]
    async fn successful_fetch_passes_quotes_through() {
        let service = AssistantService::new(Arc::new(ScriptedClient::ok(
            &["one", "two"],
            &["step"],
        )));
        match service.fetch_quote_batch(TimerMode::Work, Language::En).await {
            QuoteFetch::Batch {
                quotes,
                fallback_reason,
            } => {
                assert_eq!(quotes, ["one", "two"]);
                assert!(fallback_reason.is_none());
            }
            QuoteFetch::Busy => panic!("unexpected busy"),
        }
    }

    #[tokio::test]
    async fn failed_fetch_substitutes_shuffled_fallback_pool() {
        let service = AssistantService::new(Arc::new(ScriptedClient::failing("http 429")));
        match service.fetch_quote_batch(TimerMode::Work, Language::En).await {
            QuoteFetch::Batch {
                quotes,
                fallback_reason,
            } => {
                let expected: HashSet<String> = builtin_pool(TimerMode::Work, Language::En)
                    .iter()
                    .map(|text| text.to_string())
                    .collect();
                let actual: HashSet<String> = quotes.into_iter().collect();
                assert_eq!(actual, expected);
                assert!(fallback_reason.expect("reason carried").contains("429"));
            }
            QuoteFetch::Busy => panic!("unexpected busy"),
        }
    }

    #[tokio::test]
    async fn failed_breakdown_splits_goal_on_delimiters() {
        let service = AssistantService::new(Arc::new(ScriptedClient::failing("offline")));
        match service
            .break_down_goal("写提纲，查资料，改初稿", Language::Zh)
            .await
        {
            GoalBreakdown::Tasks { titles, .. } => {
                assert_eq!(titles, ["写提纲", "查资料", "改初稿"]);
            }
            GoalBreakdown::Busy => panic!("unexpected busy"),
        }
    }

    #[tokio::test]
    async fn failed_breakdown_without_delimiters_uses_template() {
        let service = AssistantService::new(Arc::new(ScriptedClient::failing("offline")));
        match service.break_down_goal("Ship the release", Language::En).await {
            GoalBreakdown::Tasks { titles, .. } => {
                assert_eq!(titles.len(), 5);
                assert_eq!(titles[0], "Clarify requirements");
            }
            GoalBreakdown::Busy => panic!("unexpected busy"),
        }
    }

    #[tokio::test]
    async fn empty_goal_is_a_no_op() {
        let service = AssistantService::new(Arc::new(ScriptedClient::ok(&[], &["step"])));
        match service.break_down_goal("   ", Language::En).await {
            GoalBreakdown::Tasks {
                titles,
                fallback_reason,
            } => {
                assert!(titles.is_empty());
                assert!(fallback_reason.is_none());
            }
            GoalBreakdown::Busy => panic!("unexpected busy"),
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_refresh_is_rejected_as_busy() {
        let mut client = ScriptedClient::ok(&["slow quote"], &["step"]);
        client.delay = Some(Duration::from_millis(300));
        let service = Arc::new(AssistantService::new(Arc::new(client)));

        let background = Arc::clone(&service);
        let first =
            tokio::spawn(async move { background.fetch_quote_batch(TimerMode::Work, Language::En).await });
        tokio::time::sleep(Duration::from_millis(50)).await;

        let second = service.fetch_quote_batch(TimerMode::Work, Language::En).await;
        assert_eq!(second, QuoteFetch::Busy);

        let first = first.await.expect("join first request");
        assert!(matches!(first, QuoteFetch::Batch { .. }));

        // The slot frees up once the outstanding request resolves.
        let third = service.fetch_quote_batch(TimerMode::Work, Language::En).await;
        assert!(matches!(third, QuoteFetch::Batch { .. }));
    }

    #[test]
    fn template_steps_shrink_for_empty_goals() {
        assert_eq!(template_steps("", Language::Zh).len(), 3);
        assert_eq!(template_steps("目标", Language::Zh).len(), 5);
    }
}
