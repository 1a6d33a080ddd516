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
use std::error::Error;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{error, info, span, warn, Instrument, Level};

use crate::config;
use crate::engine::Engine;

pub mod http;
pub mod socket;

/// Accepts play requests over the network and hands them to the engine.
pub struct Controller {
    engine: Arc<Engine>,
    http: Option<SocketAddr>,
    socket: Option<SocketAddr>,
    max_body_size: Option<usize>,
    shutdown_timeout: Duration,
}

impl Controller {
    /// Creates a new controller for the listeners in the configuration.
    pub fn new(
        engine: Arc<Engine>,
        config: &config::Controller,
    ) -> Result<Controller, config::ConfigError> {
        Ok(Controller {
            engine,
            http: config.http()?,
            socket: config.socket()?,
            max_body_size: config.max_body_size(),
            shutdown_timeout: config.shutdown_timeout(),
        })
    }

    /// Binds the listeners and starts serving in the background.
    pub async fn start(self) -> Result<Server, Box<dyn Error>> {
        if self.http.is_none() && self.socket.is_none() {
            return Err("no listeners configured".into());
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut tasks: Vec<JoinHandle<io::Result<()>>> = Vec::new();

        let mut http_addr = None;
        if let Some(addr) = self.http {
            let (listener, local) = socket::bind(addr).await?;
            info!(addr = %local, "HTTP server started.");
            http_addr = Some(local);

            let router = http::router(self.engine.clone(), self.max_body_size);
            let mut shutdown_rx = shutdown_rx.clone();
            tasks.push(tokio::spawn(
                async move {
                    axum::serve(listener, router)
                        .with_graceful_shutdown(async move {
                            let _ = shutdown_rx.changed().await;
                        })
                        .await
                }
                .instrument(span!(Level::INFO, "http")),
            ));
        }

        let mut socket_addr = None;
        if let Some(addr) = self.socket {
            let (listener, local) = socket::bind(addr).await?;
            info!(addr = %local, "TCP server started.");
            socket_addr = Some(local);

            tasks.push(tokio::spawn(
                socket::serve(listener, self.engine.clone(), shutdown_rx)
                    .instrument(span!(Level::INFO, "socket")),
            ));
        }

        Ok(Server {
            http_addr,
            socket_addr,
            shutdown_tx,
            tasks,
            shutdown_timeout: self.shutdown_timeout,
        })
    }

    /// Serves until `shutdown` resolves, then shuts the listeners down.
    pub async fn run<F>(self, shutdown: F) -> Result<(), Box<dyn Error>>
    where
        F: Future<Output = ()>,
    {
        let server = self.start().await?;
        shutdown.await;
        server.shutdown().await;
        Ok(())
    }
}

/// Listeners started by [`Controller::start`].
pub struct Server {
    http_addr: Option<SocketAddr>,
    socket_addr: Option<SocketAddr>,
    shutdown_tx: watch::Sender<bool>,
    tasks: Vec<JoinHandle<io::Result<()>>>,
    shutdown_timeout: Duration,
}

impl Server {
    /// The address the HTTP API is bound to, if enabled.
    pub fn http_addr(&self) -> Option<SocketAddr> {
        self.http_addr
    }

    /// The address the TCP listener is bound to, if enabled.
    pub fn socket_addr(&self) -> Option<SocketAddr> {
        self.socket_addr
    }

    /// Stops accepting connections and waits for in-flight requests. Requests
    /// still running after the shutdown timeout are abandoned.
    pub async fn shutdown(self) {
        info!("Shutting down.");
        let Server {
            shutdown_tx,
            tasks,
            shutdown_timeout,
            ..
        } = self;
        let _ = shutdown_tx.send(true);

        let aborts: Vec<AbortHandle> = tasks.iter().map(JoinHandle::abort_handle).collect();
        let joined = tokio::time::timeout(shutdown_timeout, async move {
            for task in tasks {
                match task.await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => error!(err = %e, "Listener failed"),
                    Err(e) => error!(err = %e, "Listener task failed"),
                }
            }
        })
        .await;

        if joined.is_err() {
            let abandoned = aborts.iter().filter(|handle| !handle.is_finished()).count();
            warn!(
                timeout_ms = shutdown_timeout.as_millis() as u64,
                abandoned,
                "Listeners did not stop in time, abandoning in-flight requests"
            );
            for handle in aborts {
                handle.abort();
            }
        }
    }
}
