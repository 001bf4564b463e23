use std::{sync::Arc, time::Duration};

use reqwest::Client;
use sqlx::{Pool, Postgres};
use tracing::{info, warn};

use crate::{
    client::gemini_client::GeminiClient, common::server_error::ServerError,
    config::config::AppConfig, saved::store::QuizStore,
};

pub struct AppState {
    client: Client,
    gemini: GeminiClient,
    store: QuizStore,
}

impl AppState {
    pub async fn from_config(config: &AppConfig) -> Result<Arc<Self>, ServerError> {
        let store = match &config.database_url {
            Some(url) => {
                let pool = Pool::<Postgres>::connect(url).await?;
                sqlx::migrate!().run(&pool).await?;
                info!("Saved quizzes are stored in postgres");
                QuizStore::postgres(pool).await?
            }
            None => {
                warn!("No database url configured, saved quizzes live in memory only");
                QuizStore::memory()
            }
        };

        Self::new(config, store)
    }

    pub fn new(config: &AppConfig, store: QuizStore) -> Result<Arc<Self>, ServerError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.gemini.timeout_secs))
            .build()?;

        let gemini = GeminiClient::new(&config.gemini);
        if !gemini.has_api_key() {
            warn!("No Gemini api key configured, quiz generation will fail until one is set");
        }

        Ok(Arc::new(Self {
            client,
            gemini,
            store,
        }))
    }

    pub fn get_client(&self) -> &Client {
        &self.client
    }

    pub fn get_gemini(&self) -> &GeminiClient {
        &self.gemini
    }

    pub fn get_store(&self) -> &QuizStore {
        &self.store
    }
}
