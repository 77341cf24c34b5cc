//! Server configuration.
//!
//! Every option can come from a flag or from its `LOOTO_*` environment
//! variable; flags win.

use clap::Args;
use std::net::SocketAddr;

pub const DEFAULT_BIND: &str = "127.0.0.1:8080";
pub const DEFAULT_LOGIN_RATE_PER_MINUTE: u32 = 10;

#[derive(Debug, Clone, Args)]
pub struct ServeArgs {
    /// Address to listen on.
    #[arg(long, env = "LOOTO_BIND", default_value = DEFAULT_BIND)]
    pub bind: SocketAddr,

    /// Lifetime of an admin session in hours.
    #[arg(long, env = "LOOTO_SESSION_TTL_HOURS", default_value_t = looto_core::backoffice::DEFAULT_SESSION_TTL_HOURS)]
    pub session_ttl_hours: i64,

    /// Comma-separated browser origins allowed by CORS. `*` allows any.
    #[arg(long, env = "LOOTO_ALLOWED_ORIGINS", value_delimiter = ',')]
    pub allowed_origins: Vec<String>,

    /// Login attempts allowed per username per minute.
    #[arg(long, env = "LOOTO_LOGIN_RATE_PER_MINUTE", default_value_t = DEFAULT_LOGIN_RATE_PER_MINUTE)]
    pub login_rate_per_minute: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    pub session_ttl_hours: i64,
    pub allowed_origins: Vec<String>,
    pub login_rate_per_minute: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 8080)),
            session_ttl_hours: looto_core::backoffice::DEFAULT_SESSION_TTL_HOURS,
            allowed_origins: Vec::new(),
            login_rate_per_minute: DEFAULT_LOGIN_RATE_PER_MINUTE,
        }
    }
}

impl From<ServeArgs> for ServerConfig {
    fn from(args: ServeArgs) -> Self {
        let allowed_origins = args
            .allowed_origins
            .into_iter()
            .map(|o| o.trim().to_string())
            .filter(|o| !o.is_empty())
            .collect();
        Self {
            bind: args.bind,
            session_ttl_hours: args.session_ttl_hours.max(1),
            allowed_origins,
            login_rate_per_minute: args.login_rate_per_minute.max(1),
        }
    }
}

impl ServerConfig {
    #[must_use]
    pub fn allow_any_origin(&self) -> bool {
        self.allowed_origins.iter().any(|o| o == "*")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_are_normalized() {
        let args = ServeArgs {
            bind: SocketAddr::from(([0, 0, 0, 0], 9000)),
            session_ttl_hours: 0,
            allowed_origins: vec![" https://admin.example ".into(), String::new()],
            login_rate_per_minute: 0,
        };
        let config = ServerConfig::from(args);
        assert_eq!(config.session_ttl_hours, 1);
        assert_eq!(config.login_rate_per_minute, 1);
        assert_eq!(config.allowed_origins, vec!["https://admin.example".to_string()]);
        assert!(!config.allow_any_origin());
    }
}
