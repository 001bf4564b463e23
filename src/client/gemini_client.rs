use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::{
    client::gemini_client_error::GenerationError,
    config::config::GeminiConfig,
    quiz::{
        models::{Quiz, QuizRequest},
        parser::parse_quiz,
        prompt::build_prompt,
    },
};

static API_KEY_HEADER: &str = "x-goog-api-key";

#[derive(Debug, Serialize)]
struct GenerateContentRequest<'a> {
    contents: [Content<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
pub struct Candidate {
    pub content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
pub struct CandidatePart {
    pub text: Option<String>,
}

impl GenerateContentResponse {
    /// Concatenated text of the first candidate, if it has any.
    pub fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let text: String = content
            .parts
            .iter()
            .filter_map(|part| part.text.as_deref())
            .collect();

        (!text.trim().is_empty()).then_some(text)
    }
}

#[derive(Debug, Clone)]
pub struct GeminiClient {
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl GeminiClient {
    pub fn new(config: &GeminiConfig) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
        }
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    pub async fn generate_quiz(
        &self,
        client: &Client,
        request: &QuizRequest,
    ) -> Result<Quiz, GenerationError> {
        let prompt = build_prompt(request);
        let text = self.generate_text(client, &prompt).await?;
        debug!("Raw model output: {}", text);

        let quiz = parse_quiz(&text, request)?;
        info!(
            "Generated {} questions about '{}'",
            quiz.len(),
            request.topic
        );

        Ok(quiz)
    }

    async fn generate_text(&self, client: &Client, prompt: &str) -> Result<String, GenerationError> {
        let Some(api_key) = &self.api_key else {
            return Err(GenerationError::MissingApiKey);
        };

        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );
        info!("GeminiClient sending request to model: {}", self.model);

        let body = GenerateContentRequest {
            contents: [Content {
                parts: [Part { text: prompt }],
            }],
        };

        let response = client
            .post(&url)
            .header(API_KEY_HEADER, api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or("No body".into());
            error!("GeminiClient request failed: {} - {}", status, body);
            return Err(GenerationError::ApiError(status, body));
        }

        let payload = response.json::<GenerateContentResponse>().await?;
        payload.text().ok_or(GenerationError::EmptyResponse)
    }
}

#[cfg(test)]
mod tests {
    use reqwest::StatusCode;

    use super::*;
    use crate::tests::{MockUpstream, gemini_config};

    #[test]
    fn response_text_joins_parts_of_first_candidate() {
        let payload: GenerateContentResponse = serde_json::from_value(serde_json::json!({
            "candidates": [
                { "content": { "parts": [{ "text": "[1," }, { "text": "2]" }] } },
                { "content": { "parts": [{ "text": "ignored" }] } }
            ]
        }))
        .unwrap();

        assert_eq!(payload.text().as_deref(), Some("[1,2]"));
    }

    #[test]
    fn response_without_candidates_has_no_text() {
        let payload: GenerateContentResponse = serde_json::from_str("{}").unwrap();
        assert!(payload.text().is_none());
    }

    #[tokio::test]
    async fn generate_quiz_parses_fenced_output() {
        let upstream = MockUpstream::text(
            "```json\n[{\"question\":\"Q\",\"options\":[\"A\",\"B\"],\"answer\":\"B\"}]\n```",
        )
        .await;
        let gemini = GeminiClient::new(&gemini_config(&upstream.base_url, Some("key")));
        let request = QuizRequest::new("Rome", 1).unwrap();

        let quiz = gemini.generate_quiz(&Client::new(), &request).await.unwrap();

        assert_eq!(quiz.len(), 1);
        assert_eq!(quiz[0].answer, "B");
        assert_eq!(upstream.hits(), 1);
        assert_eq!(upstream.last_api_key().as_deref(), Some("key"));
        assert!(upstream.last_prompt().unwrap().contains("about Rome"));
    }

    #[tokio::test]
    async fn generate_quiz_without_key_never_calls_upstream() {
        let upstream = MockUpstream::text("[]").await;
        let gemini = GeminiClient::new(&gemini_config(&upstream.base_url, None));
        let request = QuizRequest::new("Rome", 1).unwrap();

        let err = gemini
            .generate_quiz(&Client::new(), &request)
            .await
            .unwrap_err();

        assert!(matches!(err, GenerationError::MissingApiKey));
        assert_eq!(upstream.hits(), 0);
    }

    #[tokio::test]
    async fn generate_quiz_surfaces_upstream_status() {
        let upstream = MockUpstream::status(StatusCode::TOO_MANY_REQUESTS).await;
        let gemini = GeminiClient::new(&gemini_config(&upstream.base_url, Some("key")));
        let request = QuizRequest::new("Rome", 1).unwrap();

        let err = gemini
            .generate_quiz(&Client::new(), &request)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            GenerationError::ApiError(StatusCode::TOO_MANY_REQUESTS, _)
        ));
    }
}
