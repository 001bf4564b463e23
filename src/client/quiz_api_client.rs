use futures::{Stream, StreamExt, stream};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    common::server_error::ErrorBody,
    mw::auth_mw::GUEST_AUTHENTICATION,
    quiz::models::Quiz,
    saved::{
        handlers::{ERROR_EVENT, RECORDS_EVENT},
        models::SavedQuizRecord,
    },
};

#[derive(Debug, thiserror::Error)]
pub enum QuizApiError {
    #[error("Http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Api error: {0} - {1}")]
    ApiError(StatusCode, String),

    #[error("Failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Saved quiz feed failed: {0}")]
    Feed(String),
}

/// Talks to a running quizgen server on behalf of one guest id.
#[derive(Debug, Clone)]
pub struct QuizApiClient {
    client: Client,
    server: String,
    user_id: Uuid,
}

impl QuizApiClient {
    pub fn new(server: impl Into<String>, user_id: Uuid) -> Self {
        let server = server.into().trim_end_matches('/').to_string();

        Self {
            client: Client::new(),
            server,
            user_id,
        }
    }

    pub async fn generate(&self, topic: &str, num_questions: i64) -> Result<Quiz, QuizApiError> {
        let url = format!("{}/api/generate-quiz", self.server);
        info!("QuizApiClient sending request to: {}", url);

        let response = self
            .client
            .post(&url)
            .json(&json!({ "topic": topic, "numQuestions": num_questions }))
            .send()
            .await?;

        read_json(response).await
    }

    pub async fn save(&self, topic: &str, quiz: &Quiz) -> Result<SavedQuizRecord, QuizApiError> {
        let url = format!("{}/api/quizzes", self.server);
        let response = self
            .client
            .post(&url)
            .header(GUEST_AUTHENTICATION, self.user_id.to_string())
            .json(&json!({ "topic": topic, "quiz": quiz }))
            .send()
            .await?;

        read_json(response).await
    }

    pub async fn list(&self) -> Result<Vec<SavedQuizRecord>, QuizApiError> {
        let url = format!("{}/api/quizzes", self.server);
        let response = self
            .client
            .get(&url)
            .header(GUEST_AUTHENTICATION, self.user_id.to_string())
            .send()
            .await?;

        read_json(response).await
    }

    /// Live feed of the full saved set, one item per server-side change.
    pub async fn watch(
        &self,
    ) -> Result<impl Stream<Item = Result<Vec<SavedQuizRecord>, QuizApiError>>, QuizApiError> {
        let url = format!("{}/api/quizzes/subscribe", self.server);
        let response = self
            .client
            .get(&url)
            .header(GUEST_AUTHENTICATION, self.user_id.to_string())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(api_error(status, response).await);
        }

        let frames = response
            .bytes_stream()
            .scan(SseDecoder::default(), |decoder, chunk| {
                let frames: Vec<Result<SseFrame, QuizApiError>> = match chunk {
                    Ok(bytes) => decoder
                        .push(&bytes)
                        .into_iter()
                        .map(Ok)
                        .collect(),
                    Err(e) => vec![Err(QuizApiError::Http(e))],
                };
                futures::future::ready(Some(stream::iter(frames)))
            })
            .flatten();

        Ok(frames.filter_map(|frame| async move {
            match frame {
                Ok(frame) => feed_update(frame),
                Err(e) => Some(Err(e)),
            }
        }))
    }
}

/// Maps a feed frame to a record set or a feed error. Other events are skipped.
fn feed_update(frame: SseFrame) -> Option<Result<Vec<SavedQuizRecord>, QuizApiError>> {
    if frame.event == RECORDS_EVENT {
        Some(serde_json::from_str::<Vec<SavedQuizRecord>>(&frame.data).map_err(QuizApiError::from))
    } else if frame.event == ERROR_EVENT {
        Some(Err(QuizApiError::Feed(frame.data)))
    } else {
        None
    }
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, QuizApiError> {
    let status = response.status();
    if !status.is_success() {
        return Err(api_error(status, response).await);
    }

    let body = response.text().await?;
    Ok(serde_json::from_str(&body)?)
}

async fn api_error(status: StatusCode, response: Response) -> QuizApiError {
    let body = response.text().await.unwrap_or("No body".into());
    let message = serde_json::from_str::<ErrorBody>(&body)
        .map(|b| b.error)
        .unwrap_or(body);

    error!("QuizApiClient request failed: {} - {}", status, message);
    QuizApiError::ApiError(status, message)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    pub event: String,
    pub data: String,
}

/// Incremental `text/event-stream` parser. Bytes are buffered until a frame is
/// complete, so multi-byte characters may be split across chunks.
/// Comments and keep-alives are skipped.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.buffer
            .extend(chunk.iter().copied().filter(|b| *b != b'\r'));

        let mut frames = Vec::new();
        while let Some(end) = self.buffer.windows(2).position(|w| w == b"\n\n") {
            let block: Vec<u8> = self.buffer.drain(..end + 2).collect();
            match std::str::from_utf8(&block) {
                Ok(block) => frames.extend(Self::parse_block(block)),
                Err(e) => warn!("Skipping event that is not valid utf-8: {}", e),
            }
        }

        frames
    }

    fn parse_block(block: &str) -> Option<SseFrame> {
        let mut event = String::from("message");
        let mut data: Vec<&str> = Vec::new();

        for line in block.lines() {
            if line.is_empty() || line.starts_with(':') {
                continue;
            }

            let (field, value) = line.split_once(':').unwrap_or((line, ""));
            let value = value.strip_prefix(' ').unwrap_or(value);
            match field {
                "event" => event = value.to_string(),
                "data" => data.push(value),
                _ => {}
            }
        }

        (!data.is_empty()).then(|| SseFrame {
            event,
            data: data.join("\n"),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        saved::store::QuizStore,
        tests::{sample_quiz, spawn_app},
    };

    #[test]
    fn decoder_handles_split_chunks_and_keep_alives() {
        let mut decoder = SseDecoder::default();

        assert!(decoder.push(b":\n\nevent: records\ndata: [1,").is_empty());
        let frames = decoder.push(b"2]\n\n");

        assert_eq!(
            frames,
            vec![SseFrame {
                event: "records".into(),
                data: "[1,2]".into()
            }]
        );
    }

    #[test]
    fn decoder_joins_multiline_data() {
        let mut decoder = SseDecoder::default();
        let frames = decoder.push(b"data: a\r\ndata: b\r\n\r\n");

        assert_eq!(frames[0].event, "message");
        assert_eq!(frames[0].data, "a\nb");
    }

    #[test]
    fn decoder_keeps_characters_split_across_chunks() {
        let event = "event: records\ndata: [\"Café\"]\n\n".as_bytes();
        let split = event.iter().position(|b| *b == 0xC3).unwrap() + 1;

        let mut decoder = SseDecoder::default();
        assert!(decoder.push(&event[..split]).is_empty());
        let frames = decoder.push(&event[split..]);

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data, "[\"Café\"]");
    }

    #[test]
    fn error_event_becomes_feed_error() {
        let frame = SseFrame {
            event: ERROR_EVENT.into(),
            data: "Failed to load quizzes".into(),
        };
        match feed_update(frame) {
            Some(Err(QuizApiError::Feed(message))) => assert_eq!(message, "Failed to load quizzes"),
            other => panic!("unexpected update: {:?}", other.map(|r| r.is_ok())),
        }

        let ping = SseFrame {
            event: "message".into(),
            data: "x".into(),
        };
        assert!(feed_update(ping).is_none());
    }

    #[tokio::test]
    async fn save_list_and_watch_against_running_server() {
        let store = QuizStore::memory();
        let server = spawn_app(store).await;
        let api = QuizApiClient::new(&server, Uuid::new_v4());

        let mut feed = Box::pin(api.watch().await.unwrap());
        let initial = tokio::time::timeout(Duration::from_secs(2), feed.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert!(initial.is_empty());

        let saved = api.save("Rome", &sample_quiz(2)).await.unwrap();
        let updated = tokio::time::timeout(Duration::from_secs(2), feed.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(updated, vec![saved.clone()]);

        assert_eq!(api.list().await.unwrap(), vec![saved]);
    }

    #[tokio::test]
    async fn generate_surfaces_server_error_message() {
        let server = spawn_app(QuizStore::memory()).await;
        let api = QuizApiClient::new(&server, Uuid::new_v4());

        let err = api.generate("Rome", 20).await.unwrap_err();
        match err {
            QuizApiError::ApiError(status, message) => {
                assert_eq!(status, StatusCode::BAD_REQUEST);
                assert!(message.contains("between 1 and 10"));
            }
            other => panic!("unexpected error: {}", other),
        }
    }
}
