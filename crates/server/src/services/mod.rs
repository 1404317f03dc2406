pub mod cleaning;
pub mod credentials;
pub mod docgen;
pub mod gatherers;
pub mod mailer;
pub mod rate_limit;
pub mod tasks;
pub mod tokens;
