use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::view::DEFAULT_MAX_DEAD_ACTORS;

const MIN_POLL_TIMEOUT: Duration = Duration::from_millis(50);

#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: SocketAddr,
    pub log_level: String,
    pub max_actors_to_cache: usize,
    pub broker_url: String,
    pub poll_timeout: Duration,
    pub event_buffer: usize,
    pub enable_test_module: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary variable lookup.
    pub fn from_vars<F>(var: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let listen_addr = var("ACTORLENS_LISTEN_ADDR")
            .unwrap_or_else(|| "127.0.0.1:8265".to_string())
            .parse()
            .context("ACTORLENS_LISTEN_ADDR is not a socket address")?;

        let log_level = var("ACTORLENS_LOG_LEVEL").unwrap_or_else(|| "info".to_string());

        let max_actors_to_cache = match var("ACTORLENS_MAX_ACTORS_TO_CACHE") {
            Some(v) => v
                .trim()
                .parse::<usize>()
                .context("ACTORLENS_MAX_ACTORS_TO_CACHE must be a positive integer")?,
            None => DEFAULT_MAX_DEAD_ACTORS,
        };
        if max_actors_to_cache == 0 {
            bail!("ACTORLENS_MAX_ACTORS_TO_CACHE must be at least 1");
        }

        let broker_url =
            var("ACTORLENS_BROKER_URL").unwrap_or_else(|| "http://127.0.0.1:6380".to_string());

        let poll_timeout = match var("ACTORLENS_POLL_TIMEOUT_MS") {
            Some(v) => Duration::from_millis(
                v.trim()
                    .parse()
                    .context("ACTORLENS_POLL_TIMEOUT_MS must be an integer")?,
            ),
            None => Duration::from_millis(1000),
        }
        .max(MIN_POLL_TIMEOUT);

        let event_buffer = match var("ACTORLENS_EVENT_BUFFER") {
            Some(v) => v
                .trim()
                .parse::<usize>()
                .context("ACTORLENS_EVENT_BUFFER must be an integer")?
                .max(1),
            None => 1024,
        };

        let enable_test_module = var("ACTORLENS_ENABLE_TEST_MODULE")
            .map(|v| v == "1" || v.to_lowercase() == "true")
            .unwrap_or(false);

        Ok(Self {
            listen_addr,
            log_level,
            max_actors_to_cache,
            broker_url,
            poll_timeout,
            event_buffer,
            enable_test_module,
        })
    }
}
