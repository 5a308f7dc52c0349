//! Tokio TCP bridge between a socket and a [`Session`].
//!
//! The session's `io_write` callback must not block, so writes are queued on
//! an unbounded channel and drained by a dedicated writer task. The reader
//! side reads fixed-size chunks and feeds them to [`Session::receive`] until
//! the session stops, the server hangs up, or the user hits Ctrl-C.

use crate::config::{ClientConfig, ConnectionConfig};
use crate::error::{constants, ProtocolError, Result};
use crate::session::{property, reason, PropertyValue, Session, SessionHandler, SessionState};
use crate::utils::metrics::MetricsSnapshot;
use bytes::Bytes;
use std::io;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::time::{self, Instant, Interval};
use tracing::{debug, info, instrument, warn};

/// Commands for the writer task.
#[derive(Debug)]
pub enum Outbound {
    Data(Bytes),
    Close,
}

/// How a client run ended.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub final_state: SessionState,
    pub last_error: Option<String>,
    pub metrics: MetricsSnapshot,
}

/// Open a TCP connection to the configured server.
#[instrument(skip(config), fields(host = %config.server_host, port = config.port))]
pub async fn connect(config: &ConnectionConfig) -> Result<TcpStream> {
    let target = (config.server_host.as_str(), config.port);
    let stream = time::timeout(config.connect_timeout, TcpStream::connect(target))
        .await
        .map_err(|_| {
            warn!("{}", constants::ERR_CONNECT_TIMEOUT);
            ProtocolError::Timeout
        })??;

    if let Err(e) = stream.set_nodelay(true) {
        debug!(error = %e, "Could not disable Nagle");
    }
    info!("Connected");
    Ok(stream)
}

/// Fill in `io_write` / `io_close` so they feed the writer task through `tx`.
pub fn bridge_handler(handler: SessionHandler, tx: UnboundedSender<Outbound>) -> SessionHandler {
    let close_tx = tx.clone();
    handler
        .on_io_write(move |bytes| {
            tx.send(Outbound::Data(Bytes::copy_from_slice(bytes)))
                .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, constants::ERR_WRITER_GONE))
        })
        .on_io_close(move || {
            // the writer may already be gone
            let _ = close_tx.send(Outbound::Close);
        })
}

/// Drain queued writes into the socket until closed or every sender is gone.
pub async fn write_loop(
    mut writer: OwnedWriteHalf,
    mut rx: UnboundedReceiver<Outbound>,
) -> io::Result<()> {
    while let Some(command) = rx.recv().await {
        match command {
            Outbound::Data(bytes) => writer.write_all(&bytes).await?,
            Outbound::Close => {
                writer.shutdown().await?;
                break;
            }
        }
    }
    Ok(())
}

/// Connect, log in as `user_id` and pump bytes until the session ends.
///
/// `handler` may carry any optional callbacks; the transport callbacks are
/// supplied here.
pub async fn run_client(
    config: &ClientConfig,
    user_id: &str,
    password: &str,
    handler: SessionHandler,
) -> Result<RunSummary> {
    let stream = connect(&config.connection).await?;
    run_over(stream, config, user_id, password, handler).await
}

/// Run a session over an already connected stream.
pub async fn run_over(
    stream: TcpStream,
    config: &ClientConfig,
    user_id: &str,
    password: &str,
    handler: SessionHandler,
) -> Result<RunSummary> {
    let (mut reader, writer) = stream.into_split();
    let (tx, rx) = mpsc::unbounded_channel();
    let writer_task = tokio::spawn(write_loop(writer, rx));

    let mut session = Session::with_config(bridge_handler(handler, tx), &config.session)?;
    session.set_property(property::AUTH_USER_ID, user_id.into())?;
    session.set_property(property::AUTH_PASSWORD, PropertyValue::secret(password))?;
    session.start()?;

    let mut buf = vec![0u8; config.connection.read_buffer_size.max(1)];
    let mut keepalive = keepalive_timer(&config.connection);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    while !session.state().is_stopping() {
        tokio::select! {
            read = reader.read(&mut buf) => match read {
                Ok(0) => {
                    info!("Server closed the connection");
                    session.stop(reason::CONNECTION_BROKEN)?;
                }
                Ok(n) => session.receive(&buf[..n])?,
                Err(e) => {
                    warn!(error = %e, "Read failed");
                    session.stop(reason::CONNECTION_BROKEN)?;
                }
            },
            _ = &mut ctrl_c => {
                info!("Interrupted, logging out");
                session.stop(reason::NORMAL)?;
            }
            _ = tick(&mut keepalive), if session.state() == SessionState::Started => {
                session.send_keepalive()?;
            }
        }
    }

    session.metrics().log_metrics();
    let summary = RunSummary {
        final_state: session.state(),
        last_error: session.last_error().map(ToString::to_string),
        metrics: session.metrics().snapshot(),
    };

    // dropping the session drops the last sender, which ends the writer task
    drop(session);
    match writer_task.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => debug!(error = %e, "Writer finished with error"),
        Err(e) => warn!(error = %e, "Writer task failed"),
    }

    Ok(summary)
}

fn keepalive_timer(config: &ConnectionConfig) -> Option<Interval> {
    if config.keepalive_interval.is_zero() {
        return None;
    }
    let period = config.keepalive_interval;
    Some(time::interval_at(Instant::now() + period, period))
}

async fn tick(timer: &mut Option<Interval>) {
    match timer {
        Some(timer) => {
            timer.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}
