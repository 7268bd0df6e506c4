use std::time::Duration;

use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::instrument;

use crate::codec::{RpcError, Result, read_frame, write_frame};
use crate::messages::{Request, Response};

/// A reusable connection to one peer, dialed lazily and kept for the
/// process lifetime. Calls are serialized through an internal mutex since
/// the wire protocol here is not pipelined: one request is outstanding per
/// connection at a time.
pub struct PeerStub {
    address: String,
    conn: Mutex<Option<TcpStream>>,
}

impl PeerStub {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            conn: Mutex::new(None),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Sends `request` and awaits a response, aborting if `deadline` elapses
    /// first. Connect failures, write failures, and read failures all map
    /// to `RpcError`; a dropped connection is re-dialed on the next call.
    #[instrument(skip(self, request), fields(peer = %self.address))]
    pub async fn call(&self, request: Request, deadline: Duration) -> Result<Response> {
        tokio::time::timeout(deadline, self.call_inner(request))
            .await
            .map_err(|_| RpcError::Timeout)?
    }

    async fn call_inner(&self, request: Request) -> Result<Response> {
        let mut guard = self.conn.lock().await;

        if guard.is_none() {
            *guard = Some(TcpStream::connect(&self.address).await?);
        }

        let stream = guard.as_mut().expect("just populated above");
        match Self::round_trip(stream, &request).await {
            Ok(response) => Ok(response),
            Err(e) => {
                // A broken stream is discarded so the next call re-dials;
                // stale half-open sockets should never be reused.
                *guard = None;
                Err(e)
            }
        }
    }

    async fn round_trip(stream: &mut TcpStream, request: &Request) -> Result<Response> {
        write_frame(stream, request).await?;
        read_frame(stream).await
    }
}
