//! TCP connection handler
//!
//! Drives one session from accept to teardown: registers it, runs the reader,
//! writer and idle monitor side by side, and whichever ends first triggers the
//! same cleanup.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, info, warn};

use crate::codec::{Inbound, LineCodec};
use crate::error::AppError;
use crate::idle::{self, Heartbeat, IdleOutcome};
use crate::mailbox::{self, MailboxReceiver};
use crate::router::Router;
use crate::server::ServerContext;
use crate::session::Session;

/// How long the writer gets to flush queued messages after close
const FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

/// Why a session ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// Peer closed the connection
    Eof,
    /// Read failed
    ReadError(String),
    /// Idle monitor evicted the session
    IdleTimeout,
    /// Writing to the socket failed
    WriteError,
    /// Writer stopped on its own after the mailbox was closed
    MailboxClosed,
    /// Server is shutting down
    Shutdown,
}

/// Handle a new TCP connection
pub async fn handle_connection(stream: TcpStream, ctx: ServerContext) -> Result<(), AppError> {
    let peer_addr = stream.peer_addr()?.to_string();
    let (read_half, write_half) = stream.into_split();

    let (mailbox, mailbox_rx) = mailbox::channel(ctx.config.mailbox_capacity);
    let session = Arc::new(Session::new(peer_addr, mailbox));
    let mut writer = tokio::spawn(write_loop(
        FramedWrite::new(write_half, LineCodec::new(ctx.config.max_line_length)),
        mailbox_rx,
        session.id.to_string(),
    ));

    if let Err(e) = ctx.registry.register(Arc::clone(&session)) {
        warn!("Refusing {}: {}", session.address, e);
        let _ = session.send(e.into());
        session.mailbox().close();
        finish_writer(writer).await;
        return Ok(());
    }
    info!("Session {} online from {}", session.id, session.address);
    let _ = ctx.broadcaster.publish(session.online_notice()).await;

    let (heartbeat, mut monitor) = idle::channel(ctx.config.idle_timeout());
    let lines = FramedRead::new(read_half, LineCodec::new(ctx.config.max_line_length));

    let mut writer_done = false;
    let reason = tokio::select! {
        reason = read_loop(lines, &session, &ctx.router, heartbeat) => reason,
        outcome = monitor.watch(&session) => match outcome {
            IdleOutcome::TimedOut => DisconnectReason::IdleTimeout,
            // Heartbeat lives in read_loop, so that branch wins first
            IdleOutcome::ReaderGone => DisconnectReason::Eof,
        },
        result = &mut writer => {
            writer_done = true;
            writer_exit_reason(&session, result)
        }
        _ = ctx.shutdown.cancelled() => DisconnectReason::Shutdown,
    };

    teardown(&session, &ctx, &reason).await;
    if !writer_done {
        finish_writer(writer).await;
    }

    Ok(())
}

/// Unregister, announce departure, close the mailbox
async fn teardown(session: &Session, ctx: &ServerContext, reason: &DisconnectReason) {
    if ctx.registry.unregister(session) {
        let _ = ctx.broadcaster.publish(session.offline_notice()).await;
    }
    session.mailbox().close();
    info!(
        "Session {} ({}) offline: {:?}",
        session.id,
        session.name(),
        reason
    );
}

/// Classify a writer that finished before the session was torn down
fn writer_exit_reason(
    session: &Session,
    result: Result<Result<(), AppError>, JoinError>,
) -> DisconnectReason {
    match result {
        Ok(Ok(())) => DisconnectReason::MailboxClosed,
        Ok(Err(e)) => {
            warn!("Write to {} failed: {}", session.id, e);
            DisconnectReason::WriteError
        }
        Err(e) => {
            warn!("Writer task for {} failed: {}", session.id, e);
            DisconnectReason::WriteError
        }
    }
}

/// Give the writer a bounded window to drain, then abort it
async fn finish_writer(mut writer: JoinHandle<Result<(), AppError>>) {
    if tokio::time::timeout(FLUSH_TIMEOUT, &mut writer).await.is_err() {
        warn!("Writer did not drain in time, aborting");
        writer.abort();
    }
}

/// Feed each inbound line to the router until the stream ends
async fn read_loop(
    mut lines: FramedRead<OwnedReadHalf, LineCodec>,
    session: &Arc<Session>,
    router: &Router,
    heartbeat: Heartbeat,
) -> DisconnectReason {
    while let Some(result) = lines.next().await {
        match result {
            Ok(Inbound::Line(line)) => {
                debug!("Line from {}: {:?}", session.id, line);
                router.dispatch(session, &line).await;
                heartbeat.beat();
            }
            Ok(Inbound::Oversized) => {
                warn!("Oversized line from {}, discarded", session.id);
            }
            Err(e) => {
                debug!("Read error for {}: {}", session.id, e);
                return DisconnectReason::ReadError(e.to_string());
            }
        }
    }
    DisconnectReason::Eof
}

/// Drain the mailbox into the socket; ends on close or on a write error
async fn write_loop(
    mut sink: FramedWrite<OwnedWriteHalf, LineCodec>,
    mut mailbox: MailboxReceiver,
    session_id: String,
) -> Result<(), AppError> {
    while let Some(msg) = mailbox.recv().await {
        sink.send(msg.to_string()).await?;
    }
    debug!("Write task ended for {}", session_id);

    // Shuts down the write side of the socket
    SinkExt::<String>::close(&mut sink).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    fn session() -> Session {
        let (tx, _rx) = mailbox::channel(8);
        Session::new("10.0.0.1:1111".to_string(), tx)
    }

    #[test]
    fn test_clean_writer_exit_is_not_a_write_error() {
        assert_eq!(
            writer_exit_reason(&session(), Ok(Ok(()))),
            DisconnectReason::MailboxClosed
        );
    }

    #[test]
    fn test_failed_write_is_a_write_error() {
        let err = AppError::Io(io::Error::new(io::ErrorKind::BrokenPipe, "reset"));
        assert_eq!(
            writer_exit_reason(&session(), Ok(Err(err))),
            DisconnectReason::WriteError
        );
    }

    #[tokio::test]
    async fn test_panicked_writer_is_a_write_error() {
        let join_err = tokio::spawn(async { panic!("writer crashed") })
            .await
            .unwrap_err();
        assert_eq!(
            writer_exit_reason(&session(), Err(join_err)),
            DisconnectReason::WriteError
        );
    }
}
