use crate::domain::models::{Language, TimerMode};
use crate::infrastructure::credential_store::CredentialStore;
use crate::infrastructure::error::InfraError;
use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use url::Url;

const GENERATE_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models/";
const GENERATE_MODEL: &str = "gemini-3-flash-preview";
const API_KEY_ENV_VARS: [&str; 2] = ["GEMINI_API_KEY", "API_KEY"];

pub const MAX_BREAKDOWN_TASKS: usize = 8;

#[async_trait]
pub trait AssistantClient: Send + Sync {
    async fn fetch_quotes(
        &self,
        mode: TimerMode,
        language: Language,
    ) -> Result<Vec<String>, InfraError>;

    async fn break_down_goal(
        &self,
        goal: &str,
        language: Language,
    ) -> Result<Vec<String>, InfraError>;
}

pub struct GeminiAssistantClient {
    client: Client,
    credentials: Arc<dyn CredentialStore>,
}

impl GeminiAssistantClient {
    pub fn new(credentials: Arc<dyn CredentialStore>) -> Self {
        Self {
            client: Client::new(),
            credentials,
        }
    }

    fn api_key(&self) -> Result<String, InfraError> {
        if let Some(api_key) = self.credentials.load_api_key()? {
            let api_key = api_key.trim().to_string();
            if !api_key.is_empty() {
                return Ok(api_key);
            }
        }
        for name in API_KEY_ENV_VARS {
            if let Ok(value) = std::env::var(name) {
                let value = value.trim().to_string();
                if !value.is_empty() {
                    return Ok(value);
                }
            }
        }
        Err(InfraError::Assistant(
            "gemini api key is not configured".to_string(),
        ))
    }

    fn generate_endpoint(api_key: &str) -> Result<Url, InfraError> {
        let mut url = Url::parse(GENERATE_API_BASE)
            .map_err(|error| InfraError::Assistant(format!("invalid generate api base url: {error}")))?;
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                InfraError::Assistant("generate api base URL cannot be a base".to_string())
            })?;
            segments.push(&format!("{GENERATE_MODEL}:generateContent"));
        }
        url.query_pairs_mut().append_pair("key", api_key);
        Ok(url)
    }

    fn assistant_http_error(status: reqwest::StatusCode, body: &str) -> InfraError {
        let message = if body.trim().is_empty() {
            format!("gemini api error: http {}", status.as_u16())
        } else {
            format!("gemini api error: http {}; body={body}", status.as_u16())
        };
        InfraError::Assistant(message)
    }

    async fn generate(&self, prompt: &str) -> Result<String, InfraError> {
        let api_key = self.api_key()?;
        let endpoint = Self::generate_endpoint(&api_key)?;
        let request = GenerateContentRequest {
            contents: vec![ContentPart {
                parts: vec![TextPart { text: prompt }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
            },
        };

        let response = self
            .client
            .post(endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|error| {
                InfraError::Assistant(format!("network error while generating content: {error}"))
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|error| {
            InfraError::Assistant(format!("failed reading generate response: {error}"))
        })?;

        if !status.is_success() {
            return Err(Self::assistant_http_error(status, &body));
        }

        let parsed: GenerateContentResponse = serde_json::from_str(&body).map_err(|error| {
            InfraError::Assistant(format!("invalid generate payload: {error}; body={body}"))
        })?;

        parsed
            .candidates
            .unwrap_or_default()
            .into_iter()
            .filter_map(|candidate| candidate.content)
            .flat_map(|content| content.parts.unwrap_or_default())
            .filter_map(|part| part.text)
            .next()
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| {
                InfraError::Assistant("generate response did not include text".to_string())
            })
    }
}

#[derive(Debug, serde::Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<ContentPart<'a>>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, serde::Serialize)]
struct ContentPart<'a> {
    parts: Vec<TextPart<'a>>,
}

#[derive(Debug, serde::Serialize)]
struct TextPart<'a> {
    text: &'a str,
}

#[derive(Debug, serde::Serialize)]
struct GenerationConfig {
    #[serde(rename = "responseMimeType")]
    response_mime_type: &'static str,
}

#[derive(Debug, serde::Deserialize)]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Debug, serde::Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, serde::Deserialize)]
struct CandidateContent {
    parts: Option<Vec<CandidatePart>>,
}

#[derive(Debug, serde::Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[async_trait]
impl AssistantClient for GeminiAssistantClient {
    async fn fetch_quotes(
        &self,
        mode: TimerMode,
        language: Language,
    ) -> Result<Vec<String>, InfraError> {
        let prompt = format!(
            "{} 请以JSON数组格式返回，仅包含字符串。",
            quote_prompt(mode, language)
        );
        let text = self.generate(&prompt).await?;

        let parsed: Vec<String> = serde_json::from_str(text.trim()).map_err(|error| {
            InfraError::Assistant(format!("invalid quote batch payload: {error}"))
        })?;
        let quotes = parsed
            .iter()
            .map(|quote| strip_surrounding_quotes(quote).to_string())
            .filter(|quote| !quote.is_empty())
            .collect::<Vec<_>>();
        if quotes.is_empty() {
            return Err(InfraError::Assistant(
                "quote batch response was empty".to_string(),
            ));
        }
        Ok(quotes)
    }

    async fn break_down_goal(
        &self,
        goal: &str,
        language: Language,
    ) -> Result<Vec<String>, InfraError> {
        let audience = match language {
            Language::Zh => "Simplified Chinese",
            Language::En => "English",
        };
        let prompt = format!(
            "You are a productivity expert. Break down the following goal into 3 to 5 actionable \
             tasks for 25-minute Pomodoro sessions. Goal: \"{goal}\". Respond in {audience}. \
             Keep titles under 10 words. Output JSON only."
        );
        let text = self.generate(&prompt).await?;

        let tasks = extract_tasks(&text, language);
        if tasks.is_empty() {
            return Err(InfraError::Assistant(
                "breakdown response did not include tasks".to_string(),
            ));
        }
        Ok(tasks)
    }
}

pub fn quote_prompt(mode: TimerMode, language: Language) -> &'static str {
    match (mode, language) {
        (TimerMode::Work, Language::Zh) => {
            "挑选7句意境深远、关于专注、勤学、宁静致远的中国古诗词（如唐诗宋词）。要求：每句完整，不带作者名，文字优美，适合专注状态。"
        }
        (TimerMode::Work, Language::En) => {
            "Provide 7 deep, focus-oriented ancient Stoic or philosophical quotes. Requirements: Short, impactful, full sentences."
        }
        (TimerMode::ShortBreak, Language::Zh) => {
            "挑选7句意境悠闲、关于小憩、赏花、听雨、片刻宁静的中国古诗词。要求：每句完整，不带作者名，文字空灵，适合短休。"
        }
        (TimerMode::ShortBreak, Language::En) => {
            "Provide 7 peaceful, relaxing short quotes about taking a breath and finding calm."
        }
        (TimerMode::LongBreak, Language::Zh) => {
            "挑选7句意境旷达、关于放慢节奏、回归自然、心无挂碍的中国古诗词。要求：每句完整，不带作者名，文字舒展，适合长休恢复精力。"
        }
        (TimerMode::LongBreak, Language::En) => {
            "Provide 7 profound, expansive quotes about freedom, nature, and deep rejuvenation."
        }
    }
}

pub fn goal_delimiters(language: Language) -> &'static [char] {
    match language {
        Language::Zh => &['，', '。', ',', '；', ';'],
        Language::En => &[',', '.', ';'],
    }
}

fn is_quote_char(character: char) -> bool {
    matches!(character, '"' | '\'' | '“' | '”' | '‘' | '’')
}

pub fn strip_surrounding_quotes(value: &str) -> &str {
    value.trim_matches(|character: char| is_quote_char(character) || character.is_whitespace())
}

/// Normalizes one generated task title: drops code fences and `json` markers,
/// leading list numbering and bullets, surrounding quotes, and collapses
/// whitespace.
pub fn clean_title(value: &str) -> String {
    let without_fences = value.replace("```", " ");
    let collapsed = without_fences
        .split_whitespace()
        .filter(|token| !token.eq_ignore_ascii_case("json"))
        .collect::<Vec<_>>()
        .join(" ");

    let stripped = strip_surrounding_quotes(&collapsed);
    let stripped = strip_list_number(stripped);
    let stripped = strip_bullet(stripped);
    stripped.trim().to_string()
}

fn strip_list_number(value: &str) -> &str {
    let digits = value.chars().take_while(|character| character.is_ascii_digit()).count();
    if digits == 0 {
        return value;
    }
    let rest = value[digits..].trim_start();
    let Some(marker) = rest.chars().next() else {
        return value;
    };
    if matches!(marker, '.' | ')' | '-' | ':') {
        rest[marker.len_utf8()..].trim_start()
    } else {
        value
    }
}

fn strip_bullet(value: &str) -> &str {
    let Some(first) = value.chars().next() else {
        return value;
    };
    if matches!(first, '-' | '*' | '•') {
        value[first.len_utf8()..].trim_start()
    } else {
        value
    }
}

/// Pulls task titles out of a generated response: a JSON string array, a
/// `{tasks: [...]}` object, one title per line, or a delimiter-joined string,
/// in that order of preference.
pub fn extract_tasks(raw: &str, language: Language) -> Vec<String> {
    let text = raw.trim();
    if text.is_empty() {
        return Vec::new();
    }

    if let Ok(parsed) = serde_json::from_str::<serde_json::Value>(text) {
        let items = match &parsed {
            serde_json::Value::Array(items) => Some(items),
            serde_json::Value::Object(object) => {
                object.get("tasks").and_then(serde_json::Value::as_array)
            }
            _ => None,
        };
        if let Some(items) = items {
            let titles = items
                .iter()
                .filter_map(|item| item.as_str())
                .map(clean_title)
                .filter(|title| !title.is_empty())
                .take(MAX_BREAKDOWN_TASKS)
                .collect::<Vec<_>>();
            if !titles.is_empty() {
                return titles;
            }
        }
    }

    let by_line = text
        .lines()
        .map(clean_title)
        .filter(|title| title.chars().count() > 1)
        .collect::<Vec<_>>();
    if by_line.len() >= 3 {
        return by_line.into_iter().take(MAX_BREAKDOWN_TASKS).collect();
    }

    text.split(goal_delimiters(language))
        .map(clean_title)
        .filter(|title| title.chars().count() > 1)
        .take(MAX_BREAKDOWN_TASKS)
        .collect()
}
