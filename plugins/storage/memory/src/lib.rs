use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::RwLock;

use store_api::{Record, StoreClient, StoreConnector, StoreError};

// ═══════════════════════════════════════════════════════════════
//  MemoryStoreConfig
// ═══════════════════════════════════════════════════════════════

/// Искусственные задержки и сбои. Всё по умолчанию выключено.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct MemoryStoreConfig {
    /// Задержка каждого get, мс.
    #[serde(default)]
    pub get_latency_ms: u64,
    /// Задержка каждого put, мс.
    #[serde(default)]
    pub put_latency_ms: u64,
    /// Все get завершаются ошибкой.
    #[serde(default)]
    pub fail_gets: bool,
    /// Каждый N-й put на соединении завершается ошибкой (0 = никогда).
    #[serde(default)]
    pub fail_put_every: u64,
}

// ═══════════════════════════════════════════════════════════════
//  MemoryStore
// ═══════════════════════════════════════════════════════════════

type Tables = HashMap<String, HashMap<String, Record>>;

/// In-memory хранилище: таблица → ключ → запись.
///
/// A `MemoryStore` is one "connection": data is shared between handles
/// created by [`MemoryStore::handle`], while call counters (and so the
/// `fail_put_every` schedule) are per handle.
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
    config: Arc<MemoryStoreConfig>,
    gets: AtomicU64,
    puts: AtomicU64,
}

impl MemoryStore {
    pub fn new(config: MemoryStoreConfig) -> Self {
        Self {
            tables: Arc::new(RwLock::new(HashMap::new())),
            config: Arc::new(config),
            gets: AtomicU64::new(0),
            puts: AtomicU64::new(0),
        }
    }

    /// Новый handle на те же данные со своими счётчиками.
    pub fn handle(&self) -> Self {
        Self {
            tables: self.tables.clone(),
            config: self.config.clone(),
            gets: AtomicU64::new(0),
            puts: AtomicU64::new(0),
        }
    }

    /// Прямая вставка, без задержек и сбоев. Для заполнения перед прогоном.
    pub async fn insert(&self, table: &str, key: impl Into<String>, record: Record) {
        let mut tables = self.tables.write().await;
        tables.entry(table.to_string()).or_default().insert(key.into(), record);
    }

    /// Прямое чтение, без задержек и сбоев.
    pub async fn peek(&self, table: &str, key: &str) -> Option<Record> {
        let tables = self.tables.read().await;
        tables.get(table).and_then(|t| t.get(key)).cloned()
    }

    pub async fn len(&self, table: &str) -> usize {
        let tables = self.tables.read().await;
        tables.get(table).map_or(0, HashMap::len)
    }

    pub async fn is_empty(&self, table: &str) -> bool {
        self.len(table).await == 0
    }

    /// Сколько get/put прошло через этот handle.
    pub fn calls(&self) -> (u64, u64) {
        (self.gets.load(Ordering::Relaxed), self.puts.load(Ordering::Relaxed))
    }
}

async fn delay(ms: u64) {
    if ms > 0 {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }
}

fn check_address(table: &str, key: &str) -> Result<(), StoreError> {
    if table.is_empty() || key.is_empty() {
        return Err(StoreError::config(format!("empty table or key in address {table:?}/{key:?}")));
    }
    Ok(())
}

impl StoreClient for MemoryStore {
    fn get<'a>(
        &'a self,
        table: &'a str,
        key: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Record, StoreError>> + Send + 'a>> {
        Box::pin(async move {
            check_address(table, key)?;
            self.gets.fetch_add(1, Ordering::Relaxed);
            delay(self.config.get_latency_ms).await;
            if self.config.fail_gets {
                return Err(StoreError::rejected(format!("injected get failure for {table}/{key}")));
            }
            let tables = self.tables.read().await;
            tables
                .get(table)
                .and_then(|t| t.get(key))
                .cloned()
                .ok_or_else(|| StoreError::not_found(table, key))
        })
    }

    fn put<'a>(
        &'a self,
        table: &'a str,
        key: &'a str,
        record: Record,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + 'a>> {
        Box::pin(async move {
            check_address(table, key)?;
            let n = self.puts.fetch_add(1, Ordering::Relaxed) + 1;
            delay(self.config.put_latency_ms).await;
            let every = self.config.fail_put_every;
            if every > 0 && n % every == 0 {
                return Err(StoreError::rejected(format!("injected put failure #{n} for {table}/{key}")));
            }
            let mut tables = self.tables.write().await;
            tables.entry(table.to_string()).or_default().insert(key.to_string(), record);
            Ok(())
        })
    }
}

// ═══════════════════════════════════════════════════════════════
//  MemoryConnector
// ═══════════════════════════════════════════════════════════════

/// Выдаёт handle'ы на общий `MemoryStore`.
pub struct MemoryConnector {
    store: MemoryStore,
}

impl MemoryConnector {
    pub fn new(store: MemoryStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &MemoryStore {
        &self.store
    }
}

impl StoreConnector for MemoryConnector {
    fn connect(&self) -> Pin<Box<dyn Future<Output = Result<Box<dyn StoreClient>, StoreError>> + Send + '_>> {
        Box::pin(async move {
            tracing::debug!("memory store handle opened");
            Ok(Box::new(self.store.handle()) as Box<dyn StoreClient>)
        })
    }

    fn target(&self) -> String {
        "memory".into()
    }
}
