use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;

use store_api::{StoreClient, StoreConnector, StoreError};

use crate::framing::{FrameBuf, LinesFraming};
use crate::protocol::{Request, Response};

/// Забиндить listener. Порт 0 = выбрать свободный.
pub async fn bind(host: &str, port: u16) -> Result<TcpListener, StoreError> {
    let addr = format!("{host}:{port}");
    TcpListener::bind(&addr)
        .await
        .map_err(|e| StoreError::io(format!("bind {addr}: {e}")))
}

/// Accept loop: one task per connection, each with its own client from
/// `connector`. Returns when `token` is cancelled.
pub async fn serve(
    listener: TcpListener,
    connector: Arc<dyn StoreConnector>,
    framing: LinesFraming,
    token: CancellationToken,
) -> Result<(), StoreError> {
    let local = listener.local_addr()?;
    tracing::info!(addr = %local, "store server listening");

    loop {
        tokio::select! {
            _ = token.cancelled() => {
                tracing::info!(addr = %local, "store server stopping");
                return Ok(());
            }
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(v) => v,
                    Err(e) => {
                        tracing::error!(error = %e, "accept error");
                        continue;
                    }
                };
                tracing::debug!(%peer, "client connected");
                let connector = connector.clone();
                let conn_token = token.clone();
                tokio::spawn(async move {
                    let client = match connector.connect().await {
                        Ok(c) => c,
                        Err(e) => {
                            tracing::error!(%peer, error = %e, "store connect failed, dropping client");
                            return;
                        }
                    };
                    if let Err(e) = handle_connection(stream, peer, &*client, framing, conn_token).await {
                        tracing::warn!(%peer, error = ?e, "connection error");
                    }
                    tracing::debug!(%peer, "client disconnected");
                });
            }
        }
    }
}

async fn handle_connection(
    mut stream: TcpStream,
    peer: SocketAddr,
    store: &dyn StoreClient,
    framing: LinesFraming,
    token: CancellationToken,
) -> Result<(), StoreError> {
    stream.set_nodelay(true)?;
    let (mut reader, mut writer) = stream.split();
    let mut read_buf = FrameBuf::new();
    let mut write_buf = Vec::with_capacity(8192);

    loop {
        let frame = tokio::select! {
            _ = token.cancelled() => return Ok(()),
            frame = framing.read_frame(&mut reader, &mut read_buf) => frame,
        };

        let (response, fatal) = match frame {
            Ok(None) => return Ok(()),
            Ok(Some(line)) => (dispatch(store, &line).await, false),
            // Oversized or truncated frame: the stream position is lost.
            Err(e) => (Response::error(e), true),
        };

        let payload = serde_json::to_vec(&response)?;
        write_buf.clear();
        framing.encode(&payload, &mut write_buf);
        writer.write_all(&write_buf).await?;

        if fatal {
            tracing::warn!(%peer, "closing connection after framing error");
            return Ok(());
        }
    }
}

async fn dispatch(store: &dyn StoreClient, line: &[u8]) -> Response {
    let request: Request = match serde_json::from_slice(line) {
        Ok(r) => r,
        Err(e) => return Response::error(StoreError::protocol(format!("bad request: {e}"))),
    };
    match request {
        Request::Get { table, key } => match store.get(&table, &key).await {
            Ok(record) => Response::record(record),
            Err(e) => Response::error(e),
        },
        Request::Put { table, key, record } => match store.put(&table, &key, record).await {
            Ok(()) => Response::done(),
            Err(e) => Response::error(e),
        },
    }
}
