use std::future::Future;
use std::pin::Pin;

mod error;
mod record;
mod value;

pub use error::{ErrorKind, StoreError};
pub use record::Record;
pub use value::{BYTES_TAG, Value};

// ════════════════════════════════════════════════════════════════
//  Store traits
// ════════════════════════════════════════════════════════════════

/// Одно соединение с key-value хранилищем.
///
/// Реализации: TCP client (`store-tcp`), in-process memory store
/// (`store-memory`). Each benchmark worker owns its own instance, so
/// implementations may serialize requests internally.
pub trait StoreClient: Send + Sync {
    /// Прочитать запись `key` из `table`. `ErrorKind::NotFound` если нет.
    fn get<'a>(
        &'a self,
        table: &'a str,
        key: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Record, StoreError>> + Send + 'a>>;

    /// Записать (upsert) запись под `key`. Last write wins.
    fn put<'a>(
        &'a self,
        table: &'a str,
        key: &'a str,
        record: Record,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + 'a>>;
}

/// Фабрика соединений: одно новое соединение на каждый вызов.
pub trait StoreConnector: Send + Sync {
    fn connect(&self) -> Pin<Box<dyn Future<Output = Result<Box<dyn StoreClient>, StoreError>> + Send + '_>>;

    /// Описание цели (для логирования).
    fn target(&self) -> String {
        "unknown".into()
    }
}
