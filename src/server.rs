use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::BufReader;
use tokio::net::{TcpListener, TcpStream};

use crate::config::ServerConfig;
use crate::connection::{LINGER, Outbound};
use crate::error::ChatError;
use crate::registry::Registry;
use crate::session::Session;

/// The accept loop. Owns the listener and hands every connection a
/// clone of the shared registry.
pub struct Server {
    listener: TcpListener,
    registry: Arc<Registry>,
}

impl Server {
    pub async fn bind(config: &ServerConfig) -> Result<Self, ChatError> {
        let listener = TcpListener::bind(config.bind_addr()).await?;
        Ok(Self {
            listener,
            registry: Arc::new(Registry::new(config.max_clients)),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ChatError> {
        Ok(self.listener.local_addr()?)
    }

    pub fn registry(&self) -> Arc<Registry> {
        Arc::clone(&self.registry)
    }

    /// Accept connections until `shutdown` resolves. Each connection gets
    /// its own task; accept errors are logged and the loop carries on.
    pub async fn run<F>(self, shutdown: F) -> Result<(), ChatError>
    where
        F: Future<Output = ()>,
    {
        tracing::info!(addr = %self.local_addr()?, max_clients = self.registry.max_members(), "chat server listening");
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("server shutting down");
                    return Ok(());
                }
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        tokio::spawn(handle_client(Arc::clone(&self.registry), stream, peer));
                    }
                    Err(e) => tracing::error!(error = %e, "accept failed"),
                },
            }
        }
    }
}

/// Drive one client from accept to disconnect.
async fn handle_client(registry: Arc<Registry>, stream: TcpStream, peer: SocketAddr) {
    let (reader, write_half) = stream.into_split();
    let (outbound, writer) = Outbound::spawn(write_half);

    let session = match Session::admit(&registry, outbound) {
        Ok(session) => session,
        Err(ChatError::ServerFull { max }) => {
            tracing::debug!(%peer, max, "server full, closing connection");
            writer.close(LINGER).await;
            return;
        }
        Err(e) => {
            tracing::warn!(%peer, error = %e, "could not admit client");
            writer.close(LINGER).await;
            return;
        }
    };

    tracing::info!(user = %session.id(), %peer, "client connected");

    if let Err(e) = session.run(BufReader::new(reader)).await {
        tracing::warn!(%peer, error = %e, "session ended with error");
    }

    // The session is gone, so the writer drains and shuts the socket down,
    // unless the peer has stopped reading.
    if !writer.close(LINGER).await {
        tracing::debug!(%peer, "peer not reading, dropped pending output");
    }
}
