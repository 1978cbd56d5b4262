use std::sync::Arc;

use bench_core::{Coordinator, RunSummary, Rng};
use store_api::StoreConnector;
use store_memory::{MemoryConnector, MemoryStore};
use store_tcp::TcpConnector;

use crate::cmd::domain::synthetic_hotel;
use crate::config::{StoreKind, UpdateArgs, UpdateSettings};
use crate::error::AppError;

pub async fn run(config_path: &str, args: UpdateArgs) -> Result<(), AppError> {
    let settings = UpdateSettings::new(config_path, &args)?;
    execute(&settings).await?;
    Ok(())
}

/// STARTING → прогон → DONE + строка итога. Сбои воркеров не считаются ошибкой.
pub async fn execute(settings: &UpdateSettings) -> Result<RunSummary, AppError> {
    let connector = build_connector(settings).await;
    let coordinator = Coordinator::new(settings.bench.clone(), connector)?;

    println!("STARTING");
    let summary = coordinator.run().await?;
    println!("DONE");
    println!("{}", summary.summary_line());
    Ok(summary)
}

async fn build_connector(settings: &UpdateSettings) -> Arc<dyn StoreConnector> {
    let target = &settings.target;
    match target.kind {
        StoreKind::Tcp => Arc::new(TcpConnector::new(target.host.clone(), target.port)),
        StoreKind::Memory => {
            let store = MemoryStore::new(target.memory.clone());
            seed_hotels(&store, &settings.bench.table, settings.bench.key_space, settings.bench.seed).await;
            Arc::new(MemoryConnector::new(store))
        }
    }
}

/// Заполнить `table` ключами `0..count`.
pub async fn seed_hotels(store: &MemoryStore, table: &str, count: u64, seed: u64) {
    let mut rng = Rng::new(seed);
    for i in 0..count {
        store.insert(table, i.to_string(), synthetic_hotel(i, &mut rng)).await;
    }
    tracing::info!(table, count, "seeded synthetic hotels");
}
