use store_api::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum BenchError {
    #[error("config: {0}")]
    Config(String),

    /// Не удалось открыть соединение при старте пула. Фатально для прогона.
    #[error("worker {worker}: connect failed: {source}")]
    Connect { worker: usize, source: StoreError },

    /// Чтение записи упало. Фатально для воркера, но не для прогона.
    #[error("worker {worker}: fetch of key {key} failed: {source}")]
    Fetch { worker: usize, key: String, source: StoreError },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MutateError {
    #[error("field '{0}' missing from record")]
    MissingField(String),

    #[error("field '{field}' is {found}, expected string")]
    NotAString { field: String, found: &'static str },
}
