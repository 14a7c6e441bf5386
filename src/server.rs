//! ChatServer: shared state and accept loop
//!
//! Owns the registry, the broadcast bus and the shutdown token. Each accepted
//! connection gets a clone of `ServerContext` and runs in its own task.

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::broadcast::{self, Broadcaster, Fanout};
use crate::config::ServerConfig;
use crate::error::AppError;
use crate::handler::handle_connection;
use crate::registry::Registry;
use crate::router::Router;

/// Everything a connection task needs, cheap to clone
#[derive(Debug, Clone)]
pub struct ServerContext {
    pub config: Arc<ServerConfig>,
    pub registry: Arc<Registry>,
    pub broadcaster: Broadcaster,
    pub router: Router,
    pub shutdown: CancellationToken,
}

/// The relay server
pub struct ChatServer {
    ctx: ServerContext,
    fanout: Fanout,
}

impl ChatServer {
    pub fn new(config: ServerConfig) -> Self {
        let registry = Arc::new(Registry::new());
        let (broadcaster, fanout) = broadcast::channel(config.bus_capacity);
        let router = Router::new(Arc::clone(&registry), broadcaster.clone());

        Self {
            ctx: ServerContext {
                config: Arc::new(config),
                registry,
                broadcaster,
                router,
                shutdown: CancellationToken::new(),
            },
            fanout,
        }
    }

    /// Cancel this token to stop accepting and disconnect every session
    pub fn shutdown_token(&self) -> CancellationToken {
        self.ctx.shutdown.clone()
    }

    pub fn registry(&self) -> Arc<Registry> {
        Arc::clone(&self.ctx.registry)
    }

    /// Bind `config.bind_addr`; failure here is the only fatal error
    pub async fn bind(&self) -> Result<TcpListener, AppError> {
        let listener = TcpListener::bind(&self.ctx.config.bind_addr).await?;
        Ok(listener)
    }

    /// Accept connections until shutdown, then wait for sessions to finish
    pub async fn run(self, listener: TcpListener) -> Result<(), AppError> {
        let ChatServer { ctx, fanout } = self;

        if let Ok(addr) = listener.local_addr() {
            info!("Chat relay listening on {}", addr);
        }
        let fanout_task = tokio::spawn(fanout.run(Arc::clone(&ctx.registry)));
        let mut sessions = tokio::task::JoinSet::new();

        loop {
            tokio::select! {
                _ = ctx.shutdown.cancelled() => {
                    info!("Shutdown requested, closing listener");
                    break;
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, addr)) => {
                        info!("New connection from {}", addr);
                        let ctx = ctx.clone();
                        sessions.spawn(async move {
                            if let Err(e) = handle_connection(stream, ctx).await {
                                error!("Connection handler error: {}", e);
                            }
                        });
                    }
                    Err(e) => {
                        error!("Failed to accept connection: {}", e);
                    }
                },
                // Reap finished sessions so the set does not grow unbounded
                Some(_) = sessions.join_next(), if !sessions.is_empty() => {}
            }
        }

        drop(listener);
        while sessions.join_next().await.is_some() {}

        // Last publishers go away here, which ends the fan-out loop
        drop(ctx);
        let _ = fanout_task.await;

        info!("Chat relay stopped");
        Ok(())
    }
}
