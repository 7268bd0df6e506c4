use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use auditchain_rpc::{LedgerService, read_frame, write_frame};
use tokio::net::{TcpListener, TcpStream};
use tracing::{instrument, warn};

/// Accepts inbound RPC connections and dispatches each frame to a
/// [`LedgerService`]. One task per connection; a connection stays open and
/// serves frames sequentially until the peer disconnects or shutdown is
/// requested.
pub async fn serve(
    listener: TcpListener,
    ledger: Arc<dyn LedgerService>,
    running: Arc<AtomicBool>,
) {
    while running.load(Ordering::Relaxed) {
        let accepted = tokio::select! {
            result = listener.accept() => result,
            () = wait_for_shutdown(&running) => break,
        };

        let (socket, peer_addr) = match accepted {
            Ok(pair) => pair,
            Err(e) => {
                warn!(error = %e, "accept failed");
                continue;
            }
        };

        let ledger = ledger.clone();
        let running = running.clone();
        tokio::spawn(async move {
            serve_connection(socket, ledger, running).await;
            tracing::debug!(peer = %peer_addr, "connection closed");
        });
    }
}

async fn wait_for_shutdown(running: &AtomicBool) {
    while running.load(Ordering::Relaxed) {
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    }
}

#[instrument(skip(socket, ledger, running))]
async fn serve_connection(
    mut socket: TcpStream,
    ledger: Arc<dyn LedgerService>,
    running: Arc<AtomicBool>,
) {
    while running.load(Ordering::Relaxed) {
        let request = match read_frame(&mut socket).await {
            Ok(request) => request,
            Err(e) => {
                use auditchain_rpc::RpcError;
                if !matches!(e, RpcError::Io(ref io) if io.kind() == std::io::ErrorKind::UnexpectedEof)
                {
                    warn!(error = %e, "failed to read request frame");
                }
                return;
            }
        };

        let response = ledger.dispatch(request).await;

        if let Err(e) = write_frame(&mut socket, &response).await {
            warn!(error = %e, "failed to write response frame");
            return;
        }
    }
}
