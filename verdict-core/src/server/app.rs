use crate::engine::Dispatcher;
use crate::icap::{CodecLimits, IcapError, IcapResponse, read_request};
use async_trait::async_trait;
use pingora::apps::ServerApp;
use pingora::protocols::Stream;
use pingora::server::ShutdownWatch;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::time::timeout;
use tracing::{debug, warn};

/// ICAP listener logic plugged into a pingora listening service.
///
/// Every accepted connection gets its own read loop; the dispatcher behind it
/// is shared and read-only.
pub struct IcapApp {
    dispatcher: Arc<Dispatcher>,
    limits: CodecLimits,
    idle_timeout: Duration,
    max_connections: usize,
    active: AtomicUsize,
}

impl IcapApp {
    pub fn new(
        dispatcher: Arc<Dispatcher>,
        limits: CodecLimits,
        idle_timeout: Duration,
        max_connections: usize,
    ) -> Self {
        Self {
            dispatcher,
            limits,
            idle_timeout,
            max_connections,
            active: AtomicUsize::new(0),
        }
    }

    pub fn active_connections(&self) -> usize {
        self.active.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ServerApp for IcapApp {
    async fn process_new(
        self: &Arc<Self>,
        io: Stream,
        shutdown: &ShutdownWatch,
    ) -> Option<Stream> {
        let active = self.active.fetch_add(1, Ordering::Relaxed) + 1;
        if active > self.max_connections {
            // Advisory only: clients are told the limit through OPTIONS.
            warn!(
                active,
                max_connections = self.max_connections,
                "more ICAP connections than advertised"
            );
        }

        let mut shutdown = shutdown.clone();
        let served = tokio::select! {
            served = serve_connection(io, &self.dispatcher, &self.limits, self.idle_timeout) => served,
            _ = shutdown.changed() => {
                debug!("shutdown requested, dropping ICAP connection");
                0
            }
        };

        self.active.fetch_sub(1, Ordering::Relaxed);
        debug!(served, "ICAP connection closed");

        // Connections are never handed back for reuse.
        None
    }
}

/// Serve ICAP requests on one connection until the peer is done with it.
///
/// The loop ends on EOF, after a request carrying `Connection: close`, when
/// the first byte of the next request does not arrive within `idle_timeout`,
/// or after a malformed request has been answered with 400. Returns the
/// number of requests answered.
pub async fn serve_connection<S>(
    io: S,
    dispatcher: &Dispatcher,
    limits: &CodecLimits,
    idle_timeout: Duration,
) -> usize
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut stream = BufReader::new(io);
    let mut served = 0usize;

    loop {
        // Only the wait for the first byte of a request is bounded. A request
        // that has started is read to the end however slowly it arrives.
        match timeout(idle_timeout, stream.fill_buf()).await {
            Err(_) => {
                debug!(idle_timeout_secs = idle_timeout.as_secs(), "idle ICAP connection timed out");
                break;
            }
            Ok(Err(e)) => {
                debug!(error = %e, "ICAP connection read failed");
                break;
            }
            Ok(Ok(buf)) if buf.is_empty() => break,
            Ok(Ok(_)) => {}
        }

        let (response, keep_alive) = match read_request(&mut stream, limits).await {
            Ok(None) => break,
            Ok(Some(req)) => {
                let response = dispatcher.dispatch(&req).await;
                (response, !req.wants_close())
            }
            Err(IcapError::Io(e)) => {
                debug!(error = %e, "ICAP connection read failed");
                break;
            }
            Err(e) => {
                warn!(error = %e, "malformed ICAP request");
                (malformed(dispatcher), false)
            }
        };

        if let Err(e) = write_response(&mut stream, &response).await {
            debug!(error = %e, "failed to write ICAP response");
            break;
        }
        served += 1;

        if !keep_alive {
            break;
        }
    }

    let _ = stream.shutdown().await;
    served
}

fn malformed(dispatcher: &Dispatcher) -> IcapResponse {
    dispatcher.malformed().with_header("Connection", "close")
}

async fn write_response<W>(stream: &mut W, response: &IcapResponse) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    stream.write_all(&response.to_bytes()).await?;
    stream.flush().await
}
