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
//! Raw TCP adapter. Every connection carries one audio file: the bytes are read
//! until the client closes its side, then played as a one-shot.

use std::error::Error;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tracing::{info, span, warn, Instrument, Level};

use crate::engine::Engine;

/// Accepts connections on `listener` until `shutdown` flips.
pub async fn serve(
    listener: TcpListener,
    engine: Arc<Engine>,
    mut shutdown: watch::Receiver<bool>,
) -> io::Result<()> {
    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                info!("TCP server stopped.");
                return Ok(());
            }
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        warn!(err = %e, "Unable to accept connection");
                        continue;
                    }
                };

                let engine = engine.clone();
                tokio::spawn(
                    async move {
                        if let Err(e) = handle(stream, engine).await {
                            warn!(err = %e, "Unable to play streamed audio");
                        }
                    }
                    .instrument(span!(Level::INFO, "connection", %peer)),
                );
            }
        }
    }
}

async fn handle(
    mut stream: TcpStream,
    engine: Arc<Engine>,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let mut data = Vec::new();
    stream.read_to_end(&mut data).await?;
    info!(bytes = data.len(), "Received audio");

    let playback = tokio::task::spawn_blocking(move || engine.play_data(data, None)).await??;
    playback.finished().await;
    Ok(())
}

/// Binds a listener, returning it together with the address it ended up on.
pub async fn bind(addr: SocketAddr) -> io::Result<(TcpListener, SocketAddr)> {
    let listener = TcpListener::bind(addr).await?;
    let local = listener.local_addr()?;
    Ok((listener, local))
}
