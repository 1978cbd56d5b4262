use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use store_api::StoreConnector;
use store_memory::{MemoryConnector, MemoryStore};
use store_tcp::LinesFraming;

use crate::cmd::update::seed_hotels;
use crate::config::{ServeArgs, ServeSettings};
use crate::error::AppError;

pub async fn run(config_path: &str, args: ServeArgs) -> Result<(), AppError> {
    let settings = ServeSettings::new(config_path, &args)?;

    let store = MemoryStore::new(settings.memory.clone());
    if settings.seed_hotels > 0 {
        seed_hotels(&store, &settings.table, settings.seed_hotels, 0).await;
    }

    let listener = store_tcp::bind(&settings.host, settings.port).await?;
    let token = CancellationToken::new();
    // Каждое TCP-соединение получает свой handle и своё расписание сбоев.
    let connector: Arc<dyn StoreConnector> = Arc::new(MemoryConnector::new(store));
    let server = tokio::spawn(store_tcp::serve(listener, connector, LinesFraming::default(), token.clone()));

    tracing::info!(host = %settings.host, port = settings.port, "Press Ctrl+C to stop");
    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");
    token.cancel();

    server
        .await
        .map_err(|e| store_api::StoreError::io(format!("server task died: {e}")))??;
    Ok(())
}
