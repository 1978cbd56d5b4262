//! Line-delimited JSON transport for the store: a client implementing
//! `StoreClient` and a server exposing any `StoreConnector` over TCP.

mod client;
mod framing;
mod protocol;
mod server;

pub use client::{TcpConnector, TcpStoreClient};
pub use framing::{DEFAULT_MAX_LINE, FrameBuf, LinesFraming};
pub use protocol::{Request, Response};
pub use server::{bind, serve};

/// Порт по умолчанию.
pub const DEFAULT_PORT: u16 = 1982;
