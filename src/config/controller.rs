// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::net::SocketAddr;
use std::time::Duration;

use serde::Deserialize;

use super::error::ConfigError;

const DEFAULT_HTTP: &str = "0.0.0.0:8080";
const DEFAULT_SOCKET: &str = "0.0.0.0:9000";
const DEFAULT_SHUTDOWN_TIMEOUT_MS: u64 = 60_000;

/// The listeners that accept play requests. Either can be turned off by
/// setting it to null.
#[derive(Deserialize, Clone, Debug)]
pub struct Controller {
    /// Address of the HTTP API.
    #[serde(default = "default_http")]
    http: Option<String>,

    /// Address of the raw TCP listener that plays whatever it receives.
    #[serde(default = "default_socket")]
    socket: Option<String>,

    /// Largest request body the HTTP API accepts, in bytes. Unlimited if unset.
    #[serde(default)]
    max_body_size: Option<usize>,

    /// How long shutdown waits for in-flight requests before abandoning them.
    #[serde(default = "default_shutdown_timeout_ms")]
    shutdown_timeout_ms: u64,
}

fn default_shutdown_timeout_ms() -> u64 {
    DEFAULT_SHUTDOWN_TIMEOUT_MS
}

fn default_http() -> Option<String> {
    Some(DEFAULT_HTTP.to_string())
}

fn default_socket() -> Option<String> {
    Some(DEFAULT_SOCKET.to_string())
}

impl Default for Controller {
    fn default() -> Self {
        Controller {
            http: default_http(),
            socket: default_socket(),
            max_body_size: None,
            shutdown_timeout_ms: DEFAULT_SHUTDOWN_TIMEOUT_MS,
        }
    }
}

impl Controller {
    /// Creates a controller configuration with the given listeners.
    pub fn new(http: Option<&str>, socket: Option<&str>) -> Controller {
        Controller {
            http: http.map(str::to_string),
            socket: socket.map(str::to_string),
            max_body_size: None,
            shutdown_timeout_ms: DEFAULT_SHUTDOWN_TIMEOUT_MS,
        }
    }

    /// Limits the size of HTTP request bodies.
    pub fn with_max_body_size(mut self, max_body_size: usize) -> Controller {
        self.max_body_size = Some(max_body_size);
        self
    }

    /// Sets how long shutdown waits for in-flight requests.
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Controller {
        self.shutdown_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Returns the HTTP listen address, if enabled.
    pub fn http(&self) -> Result<Option<SocketAddr>, ConfigError> {
        parse("controller.http", self.http.as_deref())
    }

    /// Returns the socket listen address, if enabled.
    pub fn socket(&self) -> Result<Option<SocketAddr>, ConfigError> {
        parse("controller.socket", self.socket.as_deref())
    }

    pub fn max_body_size(&self) -> Option<usize> {
        self.max_body_size
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    pub(super) fn validate(&self) -> Result<(), ConfigError> {
        self.http()?;
        self.socket()?;
        if self.max_body_size == Some(0) {
            return Err(ConfigError::Invalid(
                "controller.max_body_size must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse(field: &'static str, value: Option<&str>) -> Result<Option<SocketAddr>, ConfigError> {
    match value {
        Some(value) if !value.is_empty() => value
            .parse()
            .map(Some)
            .map_err(|reason| ConfigError::Address {
                field,
                value: value.to_string(),
                reason,
            }),
        _ => Ok(None),
    }
}
