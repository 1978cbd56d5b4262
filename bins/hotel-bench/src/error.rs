use bench_core::BenchError;
use store_api::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("config ({context}): {detail}")]
    Config { context: &'static str, detail: String },

    #[error("{0}")]
    Bench(#[from] BenchError),

    #[error("store: {0}")]
    Store(#[from] StoreError),

    #[error("input {path}: {detail}")]
    Input { path: String, detail: String },

    #[error("signal: {0}")]
    Signal(#[from] std::io::Error),
}
