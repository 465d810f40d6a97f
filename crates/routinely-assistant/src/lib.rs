//! routinely-assistant: natural-language task parsing and chat via a local
//! Ollama model.
//!
//! The AI path is best-effort: when the model is unreachable or returns
//! garbage, task parsing falls back to a regex extractor so `add "call mom
//! at 3pm tomorrow"` keeps working offline.

pub mod ollama;
pub mod parser;

use chrono::{Local, NaiveDate};
use tracing::warn;

use routinely_types::ParsedTask;

pub use ollama::OllamaClient;

#[derive(Debug, thiserror::Error)]
pub enum AssistantError {
    #[error("AI response timed out")]
    Timeout,
    #[error("failed to connect to local AI")]
    Connection,
    #[error("AI request failed: {0}")]
    Http(String),
    #[error("AI returned malformed output: {0}")]
    Malformed(String),
}

pub type Result<T> = std::result::Result<T, AssistantError>;

/// User context injected into chat prompts.
#[derive(Debug, Clone, Default)]
pub struct ChatContext {
    pub user_name: Option<String>,
    pub total_tasks: i64,
    pub active_tasks: i64,
}

/// The day-management assistant.
pub struct Assistant {
    ollama: OllamaClient,
}

impl Assistant {
    pub fn new(ollama: OllamaClient) -> Self {
        Self { ollama }
    }

    /// Extract structured task fields from a natural-language description.
    ///
    /// Tries the AI model first; any failure falls back to the regex parser,
    /// so this never errors.
    pub async fn parse_task(&self, text: &str) -> ParsedTask {
        let now = Local::now().naive_local();
        let prompt = parser::build_parse_prompt(text, now.date());

        match self.ollama.generate(&prompt).await {
            Ok(output) => match parser::extract_json(&output) {
                Some(json) => parser::validate_parsed(&json, text, now.date()),
                None => {
                    warn!("AI parse output contained no JSON, using fallback parser");
                    parser::fallback_parse(text, now)
                }
            },
            Err(e) => {
                warn!("AI parser unavailable ({e}), using fallback parser");
                parser::fallback_parse(text, now)
            }
        }
    }

    /// Hold one turn of conversational chat.
    pub async fn chat(&self, message: &str, context: &ChatContext) -> Result<String> {
        let prompt = chat_prompt(message, context);
        let response = self.ollama.generate(&prompt).await?;
        Ok(response.trim().to_string())
    }
}

fn chat_prompt(message: &str, context: &ChatContext) -> String {
    let name = context.user_name.as_deref().unwrap_or("there");
    format!(
        "You are a friendly day management assistant.\n\
         \n\
         User context:\n\
         - Name: {name}\n\
         - Total routines: {total}\n\
         - Active routines: {active}\n\
         \n\
         Reply naturally and concisely to help them manage their daily routines.\n\
         \n\
         User said: \"{message}\"",
        total = context.total_tasks,
        active = context.active_tasks,
    )
}

/// Parse a task description without any AI involvement.
///
/// Used by callers that want the offline path directly (e.g. the CLI when no
/// model is configured).
pub fn parse_task_offline(text: &str, today: NaiveDate) -> ParsedTask {
    let now = today.and_hms_opt(12, 0, 0).unwrap_or_else(|| Local::now().naive_local());
    parser::fallback_parse(text, now)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_prompt_includes_context() {
        let context = ChatContext {
            user_name: Some("Alice".into()),
            total_tasks: 5,
            active_tasks: 2,
        };
        let prompt = chat_prompt("plan my day", &context);
        assert!(prompt.contains("Name: Alice"));
        assert!(prompt.contains("Total routines: 5"));
        assert!(prompt.contains("Active routines: 2"));
        assert!(prompt.contains("plan my day"));
    }

    #[test]
    fn test_chat_prompt_anonymous() {
        let prompt = chat_prompt("hi", &ChatContext::default());
        assert!(prompt.contains("Name: there"));
    }

    #[test]
    fn test_parse_task_offline() {
        let today = NaiveDate::from_ymd_opt(2026, 3, 15).unwrap();
        let parsed = parse_task_offline("buy groceries at 5:30pm tomorrow", today);
        assert_eq!(parsed.title, "Buy groceries");
        assert_eq!(parsed.time, "17:30");
        assert_eq!(parsed.date, NaiveDate::from_ymd_opt(2026, 3, 16).unwrap());
    }
}
