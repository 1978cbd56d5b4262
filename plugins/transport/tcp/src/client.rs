use std::future::Future;
use std::pin::Pin;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::Mutex;

use store_api::{Record, StoreClient, StoreConnector, StoreError};

use crate::framing::{FrameBuf, LinesFraming};
use crate::protocol::{Request, Response};

struct Conn {
    stream: TcpStream,
    read_buf: FrameBuf,
    write_buf: Vec<u8>,
}

/// Соединение с `hotel-bench serve` (или совместимым сервером).
///
/// Requests on one client are strictly sequential: the mutex is held for
/// the whole request/response exchange.
pub struct TcpStoreClient {
    addr: String,
    framing: LinesFraming,
    conn: Mutex<Conn>,
}

impl TcpStoreClient {
    pub async fn connect(host: &str, port: u16) -> Result<Self, StoreError> {
        let addr = format!("{host}:{port}");
        let stream = TcpStream::connect(&addr)
            .await
            .map_err(|e| StoreError::io(format!("TCP connect to {addr}: {e}")))?;
        stream.set_nodelay(true)?;
        tracing::debug!(%addr, "store client connected");
        Ok(Self {
            addr,
            framing: LinesFraming::default(),
            conn: Mutex::new(Conn {
                stream,
                read_buf: FrameBuf::new(),
                write_buf: Vec::with_capacity(8192),
            }),
        })
    }

    async fn call(&self, request: &Request) -> Result<Option<Record>, StoreError> {
        let payload = serde_json::to_vec(request)?;
        let mut guard = self.conn.lock().await;
        let conn = &mut *guard;

        conn.write_buf.clear();
        self.framing.encode(&payload, &mut conn.write_buf);
        conn.stream.write_all(&conn.write_buf).await?;

        let frame = self
            .framing
            .read_frame(&mut conn.stream, &mut conn.read_buf)
            .await?
            .ok_or_else(|| StoreError::io(format!("{} closed the connection", self.addr)))?;
        let response: Response = serde_json::from_slice(&frame)?;
        response.into_result()
    }
}

impl StoreClient for TcpStoreClient {
    fn get<'a>(
        &'a self,
        table: &'a str,
        key: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Record, StoreError>> + Send + 'a>> {
        Box::pin(async move {
            let request = Request::Get { table: table.to_string(), key: key.to_string() };
            self.call(&request)
                .await?
                .ok_or_else(|| StoreError::protocol(format!("get {table}/{key}: response without record")))
        })
    }

    fn put<'a>(
        &'a self,
        table: &'a str,
        key: &'a str,
        record: Record,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + 'a>> {
        Box::pin(async move {
            let request = Request::Put { table: table.to_string(), key: key.to_string(), record };
            self.call(&request).await.map(|_| ())
        })
    }
}

// ═══════════════════════════════════════════════════════════════
//  TcpConnector
// ═══════════════════════════════════════════════════════════════

/// Открывает новое TCP-соединение на каждый `connect()`.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    host: String,
    port: u16,
}

impl TcpConnector {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self { host: host.into(), port }
    }
}

impl StoreConnector for TcpConnector {
    fn connect(&self) -> Pin<Box<dyn Future<Output = Result<Box<dyn StoreClient>, StoreError>> + Send + '_>> {
        Box::pin(async move {
            let client = TcpStoreClient::connect(&self.host, self.port).await?;
            Ok(Box::new(client) as Box<dyn StoreClient>)
        })
    }

    fn target(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
