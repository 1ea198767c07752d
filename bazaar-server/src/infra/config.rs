use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;

/// Longest accepted session lifetime.
pub const MAX_SESSION_TTL: Duration = Duration::from_secs(365 * 24 * 60 * 60);
/// Longest accepted deadline for a remote image check.
pub const MAX_IMAGE_PROBE_TIMEOUT: Duration = Duration::from_secs(60);

/// Runtime configuration. Every flag can also come from the environment
/// (or a `.env` file loaded before parsing).
#[derive(Parser, Debug, Clone)]
#[command(name = "bazaar-server")]
#[command(about = "Classifieds marketplace backend")]
pub struct Config {
    #[arg(long, env = "SERVER_HOST", default_value = "0.0.0.0")]
    pub host: String,

    #[arg(short, long, env = "SERVER_PORT", default_value_t = 8080)]
    pub port: u16,

    /// PostgreSQL connection string
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,

    #[arg(long, env = "DATABASE_MAX_CONNECTIONS", default_value_t = 10)]
    pub database_max_connections: u32,

    /// Redis connection string for the session store. Sessions are kept in
    /// process memory when unset.
    #[arg(long, env = "REDIS_URL")]
    pub redis_url: Option<String>,

    /// Session lifetime, e.g. `24h` or `90m`
    #[arg(long, env = "SESSION_TTL", default_value = "24h", value_parser = humantime::parse_duration)]
    pub session_ttl: Duration,

    /// Deadline shared by both phases of a remote image check
    #[arg(long, env = "IMAGE_PROBE_TIMEOUT", default_value = "5s", value_parser = humantime::parse_duration)]
    pub image_probe_timeout: Duration,

    /// Comma-separated origins allowed to make credentialed requests
    #[arg(long, env = "CORS_ALLOWED_ORIGINS", value_delimiter = ',')]
    pub cors_allowed_origins: Vec<String>,

    /// Mark cookies `Secure`; enable behind TLS
    #[arg(long, env = "COOKIE_SECURE", default_value_t = false)]
    pub cookie_secure: bool,
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.session_ttl < Duration::from_secs(1) {
            bail!("SESSION_TTL must be at least one second");
        }
        if self.session_ttl > MAX_SESSION_TTL {
            bail!("SESSION_TTL must not exceed one year");
        }
        if self.image_probe_timeout.is_zero() {
            bail!("IMAGE_PROBE_TIMEOUT must be positive");
        }
        if self.image_probe_timeout > MAX_IMAGE_PROBE_TIMEOUT {
            bail!(
                "IMAGE_PROBE_TIMEOUT must not exceed {}s",
                MAX_IMAGE_PROBE_TIMEOUT.as_secs()
            );
        }
        if self.database_max_connections == 0 {
            bail!("DATABASE_MAX_CONNECTIONS must be positive");
        }
        self.socket_addr().map(|_| ())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| {
                format!("invalid listen address {}:{}", self.host, self.port)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Config {
        let mut argv = vec!["bazaar-server", "--database-url", "postgres://localhost/bazaar"];
        argv.extend_from_slice(args);
        Config::try_parse_from(argv).unwrap()
    }

    #[test]
    fn defaults() {
        let config = parse(&[]);
        assert_eq!(config.port, 8080);
        assert_eq!(config.session_ttl, Duration::from_secs(24 * 3600));
        assert_eq!(config.image_probe_timeout, Duration::from_secs(5));
        assert!(config.redis_url.is_none());
        config.validate().unwrap();
    }

    #[test]
    fn humantime_and_lists() {
        let config = parse(&[
            "--session-ttl",
            "90m",
            "--cors-allowed-origins",
            "https://a.example,https://b.example",
        ]);
        assert_eq!(config.session_ttl, Duration::from_secs(90 * 60));
        assert_eq!(config.cors_allowed_origins.len(), 2);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(parse(&["--session-ttl", "0s"]).validate().is_err());
        assert!(parse(&["--host", "not a host"]).validate().is_err());
    }

    #[test]
    fn durations_are_capped() {
        assert!(parse(&["--session-ttl", "365days"]).validate().is_ok());
        assert!(parse(&["--session-ttl", "366days"]).validate().is_err());
        assert!(
            parse(&["--session-ttl", "300000000000years"])
                .validate()
                .is_err()
        );
        assert!(parse(&["--image-probe-timeout", "2m"]).validate().is_err());
    }
}
