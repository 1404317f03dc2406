use std::env;

#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub jwt_secret: String,
    pub access_token_minutes: i64,
    pub refresh_token_days: i64,
    /// Base URL used when building links sent to users (verification mail).
    pub public_url: String,
    pub cors_origin: Option<String>,
    /// Key rate limits on `X-Forwarded-For`. Only safe behind a proxy that
    /// overwrites the header.
    pub trust_forwarded_for: bool,
    pub github_api_url: String,
    pub stackoverflow_api_url: String,
    pub github_api_base: String,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub gemini_api_base: String,
    pub task_workers: usize,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3000),
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:./data/codebase.db?mode=rwc".to_string()),
            jwt_secret: env::var("JWT_SECRET")
                .unwrap_or_else(|_| "development-secret-change-in-production".to_string()),
            access_token_minutes: parse_or("ACCESS_TOKEN_MINUTES", 15),
            refresh_token_days: parse_or("REFRESH_TOKEN_DAYS", 30),
            public_url: env::var("PUBLIC_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            cors_origin: env::var("CORS_ORIGIN").ok(),
            trust_forwarded_for: parse_or("TRUST_FORWARDED_FOR", false),
            github_api_url: env::var("GITHUB_API_URL").unwrap_or_else(|_| {
                "https://api.github.com/search/repositories?q=stars:%3E1000&sort=stars&order=desc&per_page=10"
                    .to_string()
            }),
            stackoverflow_api_url: env::var("STACKOVERFLOW_API_URL").unwrap_or_else(|_| {
                "https://api.stackexchange.com/2.3/questions?order=desc&sort=votes&site=stackoverflow&filter=withbody&pagesize=10"
                    .to_string()
            }),
            github_api_base: env::var("GITHUB_API_BASE")
                .unwrap_or_else(|_| "https://api.github.com".to_string()),
            gemini_api_key: env::var("GEMINI_API_KEY").ok().filter(|k| !k.is_empty()),
            gemini_model: env::var("GEMINI_MODEL")
                .unwrap_or_else(|_| "gemini-1.5-flash".to_string()),
            gemini_api_base: env::var("GEMINI_API_BASE")
                .unwrap_or_else(|_| "https://generativelanguage.googleapis.com".to_string()),
            task_workers: parse_or("TASK_WORKERS", 2),
        }
    }
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
