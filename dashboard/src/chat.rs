use crate::errors::{Error, Result};
use crate::metrics::CHAT_FAILURES_TOTAL;
use crate::model::ChatMessage;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};

/// Answers are generated by a language model and can take a while.
pub const DEFAULT_CHAT_TIMEOUT: Duration = Duration::from_secs(60);

pub const GREETING: &str = "👋 **Hello!** I'm your IoT assistant.\n\n\
I can help you understand your **sensor data**, check **system status**, and give **smart insights**.\n\n\
💡 Try asking:\n\
- What's the current temperature?\n\
- Show system status\n\
- Analyze recent trends";

pub const NO_ANSWER: &str = "❌ Sorry, I couldn't generate an answer. Please try again.";
pub const CONNECTION_ISSUE: &str = "⚠️ Connection issue. Please try again later.";

pub const SUGGESTED_QUESTIONS: [&str; 5] = [
    "What's the project overview?",
    "Who are the developers?",
    "How to set up the system?",
    "Cost analysis of the project",
    "List all sensors used in the system",
];

#[derive(Debug, Serialize)]
struct QueryRequest<'a> {
    query: &'a str,
    n_results: u32,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    answer: Option<String>,
}

/// Client for the question-answering backend.
#[derive(Debug, Clone)]
pub struct ChatClient {
    client: reqwest::Client,
    url: String,
    n_results: u32,
    timeout: Duration,
}

impl ChatClient {
    pub fn new(client: reqwest::Client, url: impl Into<String>, n_results: u32) -> Self {
        Self {
            client,
            url: url.into(),
            n_results,
            timeout: DEFAULT_CHAT_TIMEOUT,
        }
    }

    /// Overrides the shared client's timeout for chat requests only.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Asks the backend. Never fails: errors become the fallback text shown
    /// to the user.
    pub async fn ask(&self, query: &str) -> String {
        match self.query(query).await {
            Ok(Some(answer)) if !answer.trim().is_empty() => answer,
            Ok(_) => NO_ANSWER.to_string(),
            Err(e) => {
                error!("Error fetching chat response: {}", e);
                CHAT_FAILURES_TOTAL.inc();
                CONNECTION_ISSUE.to_string()
            }
        }
    }

    async fn query(&self, query: &str) -> Result<Option<String>> {
        let response = self
            .client
            .post(&self.url)
            .timeout(self.timeout)
            .json(&QueryRequest {
                query,
                n_results: self.n_results,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Error::Status {
                status: response.status().as_u16(),
                url: self.url.clone(),
            });
        }

        let body: QueryResponse = response.json().await?;
        Ok(body.answer)
    }
}

/// In-memory conversation, oldest first. Messages are never removed.
#[derive(Debug, Clone)]
pub struct ChatLog {
    messages: Vec<ChatMessage>,
}

impl Default for ChatLog {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatLog {
    pub fn new() -> Self {
        Self {
            messages: vec![ChatMessage::assistant(GREETING)],
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    /// Appends the user's message, trimmed, unless it is blank. Returns the
    /// same text as the query to send, or `None` when there is nothing to ask.
    pub fn begin_turn(&mut self, text: &str) -> Option<String> {
        let query = text.trim();
        if query.is_empty() {
            debug!("Ignoring blank chat message");
            return None;
        }
        self.messages.push(ChatMessage::user(query));
        Some(query.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unreachable_client() -> ChatClient {
        // Port 9 (discard) on localhost is expected to refuse connections.
        ChatClient::new(reqwest::Client::new(), "http://127.0.0.1:9/api/query", 3)
    }

    #[test]
    fn test_log_starts_with_greeting() {
        let log = ChatLog::new();
        assert_eq!(log.messages().len(), 1);
        assert!(!log.messages()[0].is_user);
        assert_eq!(log.messages()[0].message, GREETING);
    }

    #[test]
    fn test_blank_message_is_ignored() {
        let mut log = ChatLog::new();

        assert!(log.begin_turn("   ").is_none());
        assert!(log.begin_turn("").is_none());
        assert_eq!(log.messages().len(), 1);
    }

    #[test]
    fn test_logged_text_matches_query() {
        let mut log = ChatLog::new();

        let query = log.begin_turn("  What's the temperature?\n").unwrap();
        assert_eq!(query, "What's the temperature?");
        assert!(log.messages()[1].is_user);
        assert_eq!(log.messages()[1].message, query);
    }

    #[test]
    fn test_connection_failure_falls_back() {
        let answer = tokio_test::block_on(unreachable_client().ask("What's the temperature?"));
        assert_eq!(answer, CONNECTION_ISSUE);
    }

    #[test]
    fn test_request_shape() {
        let body = serde_json::to_value(QueryRequest {
            query: "status",
            n_results: 3,
        })
        .unwrap();

        assert_eq!(body, serde_json::json!({ "query": "status", "n_results": 3 }));
    }
}
