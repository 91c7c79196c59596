//! Narrative insights delegated to the hosted LLM behind Supabase Edge Functions.
//!
//! Nothing here does language processing. Scores are rendered into a prompt, the
//! prompt is sent to `generate-insights`, and whatever comes back is shaped into an
//! [`Insight`].

use std::fmt::Write;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::PulseScore;

const MAX_QUOTES: usize = 5;

#[derive(Debug, Error)]
pub enum InsightError {
    #[error("edge function request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("edge function {function} returned {status}: {body}")]
    Status {
        function: String,
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("edge function {0} returned an unexpected payload")]
    Payload(String),
}

/// Anything that turns a prompt into free text.
#[async_trait]
pub trait InsightGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, InsightError>;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Insight {
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub opportunities: Vec<String>,
    #[serde(default, alias = "action_items")]
    pub action_items: Vec<String>,
}

pub fn build_insight_prompt(score: &PulseScore, quotes: &[String]) -> String {
    let mut prompt = String::new();

    let _ = writeln!(
        prompt,
        "You are PulseBot, an organizational culture analyst for PulsePlace.ai."
    );
    let _ = writeln!(
        prompt,
        "Summarize the survey results below and respond as JSON with the keys \
         summary, strengths, opportunities and actionItems."
    );
    let _ = writeln!(prompt);
    let _ = writeln!(
        prompt,
        "PulseScore: {:.1}/100 ({})",
        score.overall,
        score.tier.label()
    );
    let _ = writeln!(prompt, "Responses scored: {}", score.scored_responses);
    let _ = writeln!(prompt);
    let _ = writeln!(prompt, "Categories:");
    for category in &score.categories {
        let _ = writeln!(
            prompt,
            "- {} (weight {:.0}%): {:.1}",
            category.category.label(),
            category.weight * 100.0,
            category.score
        );
    }

    let _ = writeln!(prompt);
    let _ = writeln!(prompt, "Themes:");
    for theme in score.themes.iter().filter(|t| t.is_assessed()) {
        let _ = writeln!(prompt, "- {}: {:.1}", theme.theme.label(), theme.score);
    }

    let not_assessed: Vec<&str> = score
        .themes
        .iter()
        .filter(|t| !t.is_assessed())
        .map(|t| t.theme.label())
        .collect();
    if !not_assessed.is_empty() {
        let _ = writeln!(prompt, "Not assessed: {}", not_assessed.join(", "));
    }

    let quotes: Vec<&String> = quotes
        .iter()
        .filter(|q| !q.trim().is_empty())
        .take(MAX_QUOTES)
        .collect();
    if !quotes.is_empty() {
        let _ = writeln!(prompt);
        let _ = writeln!(prompt, "Sample employee comments:");
        for quote in quotes {
            let _ = writeln!(prompt, "- \"{}\"", quote.trim());
        }
    }

    prompt
}

/// Accepts an insight object, a `{"content": ...}` wrapper, or plain prose.
pub fn parse_insight(text: &str) -> Insight {
    let trimmed = text.trim();
    match serde_json::from_str::<serde_json::Value>(trimmed) {
        Ok(serde_json::Value::Object(map)) => {
            let wrapped = ["content", "text", "insight"]
                .iter()
                .find_map(|key| map.get(*key).and_then(|v| v.as_str()));
            if let Some(inner) = wrapped {
                return parse_insight(inner);
            }
            match serde_json::from_value::<Insight>(serde_json::Value::Object(map)) {
                Ok(insight) if insight != Insight::default() => insight,
                _ => Insight {
                    summary: trimmed.to_string(),
                    ..Insight::default()
                },
            }
        }
        _ => Insight {
            summary: trimmed.to_string(),
            ..Insight::default()
        },
    }
}

pub async fn generate_insight(
    generator: &dyn InsightGenerator,
    score: &PulseScore,
    quotes: &[String],
) -> Result<Insight, InsightError> {
    let prompt = build_insight_prompt(score, quotes);
    tracing::debug!(prompt_len = prompt.len(), "requesting insight");
    let text = generator.generate(&prompt).await?;
    Ok(parse_insight(&text))
}

/// Invokes Supabase Edge Functions by name.
pub struct FunctionsClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl FunctionsClient {
    pub fn new(supabase_url: &str, api_key: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: format!("{}/functions/v1", supabase_url.trim_end_matches('/')),
            api_key: api_key.to_string(),
        }
    }

    async fn invoke(
        &self,
        function: &str,
        body: &serde_json::Value,
    ) -> Result<String, InsightError> {
        let url = format!("{}/{}", self.base_url, function);
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .header("apikey", &self.api_key)
            .json(body)
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            return Err(InsightError::Status {
                function: function.to_string(),
                status,
                body: text,
            });
        }
        Ok(text)
    }

    /// Sends a chat message to `ask-pulsebot` and returns its reply.
    pub async fn ask(&self, message: &str) -> Result<String, InsightError> {
        #[derive(Deserialize)]
        struct Reply {
            reply: String,
        }

        let text = self
            .invoke("ask-pulsebot", &serde_json::json!({ "message": message }))
            .await?;
        serde_json::from_str::<Reply>(&text)
            .map(|r| r.reply)
            .map_err(|_| InsightError::Payload("ask-pulsebot".to_string()))
    }
}

#[async_trait]
impl InsightGenerator for FunctionsClient {
    async fn generate(&self, prompt: &str) -> Result<String, InsightError> {
        self.invoke("generate-insights", &serde_json::json!({ "prompt": prompt }))
            .await
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::models::{ResponseValue, SurveyResponse};
    use crate::scoring::{compute_pulse_score, UnassessedThemes};
    use crate::survey::default_questions;

    fn sample_score() -> PulseScore {
        let responses = vec![
            SurveyResponse {
                question_id: "psy-1".to_string(),
                value: ResponseValue::Number(4.0),
                respondent: None,
                submitted_at: Utc::now(),
            },
            SurveyResponse {
                question_id: "mot-1".to_string(),
                value: ResponseValue::Number(2.0),
                respondent: None,
                submitted_at: Utc::now(),
            },
        ];
        compute_pulse_score(
            &default_questions(),
            &responses,
            UnassessedThemes::Exclude,
            Utc::now(),
        )
    }

    struct Canned(&'static str);

    #[async_trait]
    impl InsightGenerator for Canned {
        async fn generate(&self, _prompt: &str) -> Result<String, InsightError> {
            Ok(self.0.to_string())
        }
    }

    #[test]
    fn prompt_embeds_scores_and_quotes() {
        let score = sample_score();
        let quotes = vec!["More transparency please".to_string(), "  ".to_string()];
        let prompt = build_insight_prompt(&score, &quotes);

        assert!(prompt.contains(&format!("PulseScore: {:.1}/100", score.overall)));
        assert!(prompt.contains("Psychological Safety: 75.0"));
        assert!(prompt.contains("Not assessed:"));
        assert!(prompt.contains("- \"More transparency please\""));
        assert_eq!(prompt.matches("- \"").count(), 1);
    }

    #[test]
    fn parses_structured_insight() {
        let insight = parse_insight(
            r#"{"summary":"Solid trust","strengths":["safety"],"opportunities":["growth"],"actionItems":["run 1:1s"]}"#,
        );
        assert_eq!(insight.summary, "Solid trust");
        assert_eq!(insight.strengths, vec!["safety"]);
        assert_eq!(insight.action_items, vec!["run 1:1s"]);
    }

    #[test]
    fn parses_wrapped_and_plain_insight() {
        let wrapped = parse_insight(r#"{"content":"{\"summary\":\"ok\",\"action_items\":[\"a\"]}"}"#);
        assert_eq!(wrapped.summary, "ok");
        assert_eq!(wrapped.action_items, vec!["a"]);

        let plain = parse_insight("Culture is improving.\n");
        assert_eq!(plain.summary, "Culture is improving.");
        assert!(plain.strengths.is_empty());
    }

    #[tokio::test]
    async fn generate_insight_uses_the_generator() {
        let insight = generate_insight(&Canned("Keep going."), &sample_score(), &[])
            .await
            .unwrap();
        assert_eq!(insight.summary, "Keep going.");
    }

    #[tokio::test]
    async fn functions_client_posts_prompt() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/functions/v1/generate-insights"))
            .and(header("apikey", "anon-key"))
            .and(body_partial_json(serde_json::json!({ "prompt": "hello" })))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"summary":"hi"}"#))
            .mount(&server)
            .await;

        let client = FunctionsClient::new(&format!("{}/", server.uri()), "anon-key");
        let text = client.generate("hello").await.unwrap();
        assert_eq!(parse_insight(&text).summary, "hi");
    }

    #[tokio::test]
    async fn functions_client_reports_failures() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/functions/v1/ask-pulsebot"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let client = FunctionsClient::new(&server.uri(), "anon-key");
        let err = client.ask("How is morale?").await.unwrap_err();
        match err {
            InsightError::Status { function, status, body } => {
                assert_eq!(function, "ask-pulsebot");
                assert_eq!(status.as_u16(), 500);
                assert_eq!(body, "boom");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn ask_returns_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/functions/v1/ask-pulsebot"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "reply": "Morale is steady." })),
            )
            .mount(&server)
            .await;

        let client = FunctionsClient::new(&server.uri(), "anon-key");
        assert_eq!(client.ask("How is morale?").await.unwrap(), "Morale is steady.");
    }
}
