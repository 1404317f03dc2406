pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod services;

use std::sync::Arc;

use axum::{routing::get, Router};

use config::Config;
use db::Database;
use services::{
    docgen::{model::GeminiModel, repository::RepositoryFetcher, DocumentationClient},
    gatherers::{Gatherer, GitHubGatherer, StackOverflowGatherer},
    mailer::{LogMailer, Mailer},
    rate_limit::RateLimiter,
    tasks::TaskQueue,
    tokens::TokenService,
};

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Config,
    pub tokens: TokenService,
    pub docs: Arc<DocumentationClient>,
    pub gatherers: Arc<[Box<dyn Gatherer>]>,
    pub tasks: TaskQueue,
    pub limiter: RateLimiter,
    pub mailer: Arc<dyn Mailer>,
}

impl AppState {
    /// Assemble the state and start the task workers. Must be called inside a
    /// tokio runtime.
    pub fn new(
        db: Database,
        config: Config,
        docs: DocumentationClient,
        gatherers: Vec<Box<dyn Gatherer>>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        let tokens = TokenService::new(
            config.jwt_secret.clone(),
            chrono::Duration::minutes(config.access_token_minutes),
            chrono::Duration::days(config.refresh_token_days),
        );
        let docs = Arc::new(docs);
        let tasks = TaskQueue::start(db.clone(), Arc::clone(&docs), config.task_workers);
        let limiter = RateLimiter::new(config.trust_forwarded_for);

        Self {
            db,
            config,
            tokens,
            docs,
            gatherers: gatherers.into(),
            tasks,
            limiter,
            mailer,
        }
    }

    /// The production wiring: Gemini, the GitHub and StackOverflow gatherers
    /// and log-only mail.
    pub fn from_config(db: Database, config: Config) -> Self {
        let model = GeminiModel::new(
            config.gemini_api_base.clone(),
            config.gemini_model.clone(),
            config.gemini_api_key.clone(),
        );
        let docs = DocumentationClient::new(
            Arc::new(model),
            RepositoryFetcher::new(config.github_api_base.clone()),
        );
        let gatherers: Vec<Box<dyn Gatherer>> = vec![
            Box::new(GitHubGatherer::new(config.github_api_url.clone())),
            Box::new(StackOverflowGatherer::new(config.stackoverflow_api_url.clone())),
        ];

        Self::new(db, config, docs, gatherers, Arc::new(LogMailer))
    }
}

/// The full router without transport layers (tracing, CORS).
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", routes::router(&state))
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}
