use std::sync::Arc;

use axum::{Router, middleware::from_fn};
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use tower_http::cors::CorsLayer;
use tracing::{error, info, level_filters::LevelFilter, warn};
use tracing_subscriber::FmtSubscriber;
use uuid::Uuid;

use crate::{
    client::quiz_api_client::QuizApiClient,
    common::app_state::AppState,
    config::config::AppConfig,
    health::handlers::health_routes,
    mw::{auth_mw::auth_mw, request_mw::request_mw},
    quiz::handlers::quiz_routes,
    saved::handlers::saved_routes,
    session::play::{history, play},
};

mod auth;
mod client;
mod common;
mod config;
mod health;
mod mw;
mod quiz;
mod saved;
mod session;

#[cfg(test)]
mod tests;

static DEFAULT_SERVER: &str = "http://localhost:5000";

#[derive(Debug, Parser)]
#[command(name = "quizgen", about = "Generate and play multiple-choice quizzes")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the quiz api server (default)
    Serve,
    /// Generate a quiz on a running server and play it in the terminal
    Play {
        #[arg(short, long)]
        topic: String,
        #[arg(short = 'n', long, default_value_t = 5)]
        count: i64,
        #[arg(long, default_value = DEFAULT_SERVER)]
        server: String,
        /// Guest id to save under, a fresh local id is used when omitted
        #[arg(long)]
        user: Option<Uuid>,
        #[arg(long)]
        save: bool,
    },
    /// List saved quizzes for a guest id
    History {
        #[arg(long, default_value = DEFAULT_SERVER)]
        server: String,
        #[arg(long)]
        user: Uuid,
        /// Keep printing the full list whenever it changes
        #[arg(long)]
        follow: bool,
    },
}

#[tokio::main]
async fn main() {
    // Initialize .env
    dotenv().ok();
    let cli = Cli::parse();

    let result = match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve().await,
        Command::Play {
            topic,
            count,
            server,
            user,
            save,
        } => {
            init_logging(LevelFilter::WARN);
            let user = user.unwrap_or_else(|| {
                warn!("No guest id given, saved quizzes will only be visible to this run");
                Uuid::new_v4()
            });
            let api = QuizApiClient::new(server, user);
            play(&api, &topic, count, save).await.map_err(Into::into)
        }
        Command::History {
            server,
            user,
            follow,
        } => {
            init_logging(LevelFilter::WARN);
            let api = QuizApiClient::new(server, user);
            history(&api, follow).await.map_err(Into::into)
        }
    };

    if let Err(e) = result {
        error!("{}", e);
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

async fn serve() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    init_logging(config.log_level());

    // Initialize state
    let state = AppState::from_config(&config).await?;
    let app = app(state);

    // Initialize webserver
    let listener = tokio::net::TcpListener::bind(config.bind_address()).await?;
    info!("Server listening on address: {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}

fn init_logging(level: LevelFilter) {
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set global tracing: {}", e);
    }
}

pub fn app(state: Arc<AppState>) -> Router {
    let api_routes = Router::new()
        .merge(quiz_routes(state.clone()))
        .nest("/quizzes", saved_routes(state.clone()).layer(from_fn(auth_mw)));

    Router::new()
        .nest("/health", health_routes(state.clone()))
        .nest("/api", api_routes)
        .layer(from_fn(request_mw))
        .layer(CorsLayer::permissive())
}
