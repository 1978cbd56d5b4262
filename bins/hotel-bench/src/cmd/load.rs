use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::io::AsyncBufReadExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use store_api::{Record, StoreClient, StoreConnector, StoreError};
use store_tcp::TcpConnector;

use crate::cmd::domain::{parse_csv_line, parse_json_line};
use crate::config::{InputFormat, LoadArgs, LoadSettings, StoreKind};
use crate::error::AppError;

const CHANNEL_CAPACITY: usize = 1024;
const PROGRESS_EVERY: u64 = 500;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LoadReport {
    /// Непустых строк во входном файле.
    pub lines: u64,
    /// Строк, прошедших разбор и лимит на регион.
    pub accepted: u64,
    /// Битые строки.
    pub skipped: u64,
    /// Строки сверх лимита на регион.
    pub capped: u64,
    pub written: u64,
    pub failed: u64,
}

pub async fn run(config_path: &str, args: LoadArgs) -> Result<(), AppError> {
    let settings = LoadSettings::new(config_path, &args)?;
    if settings.target.kind != StoreKind::Tcp {
        return Err(AppError::Config { context: "load", detail: "load writes to a remote store, use --store tcp".into() });
    }
    let connector: Arc<dyn StoreConnector> =
        Arc::new(TcpConnector::new(settings.target.host.clone(), settings.target.port));
    load(&settings, connector).await?;
    Ok(())
}

struct Writer {
    tx: mpsc::Sender<(String, Record)>,
    join: JoinHandle<(u64, u64)>,
}

/// Раздаёт записи писателям по кругу.
struct Fanout {
    writers: Vec<Writer>,
    next: usize,
}

impl Fanout {
    async fn send(&mut self, item: (String, Record)) -> Result<(), StoreError> {
        let w = &self.writers[self.next % self.writers.len()];
        self.next += 1;
        w.tx.send(item).await.map_err(|_| StoreError::io("writer task stopped"))
    }

    /// Закрыть каналы и дождаться писателей: (written, failed).
    async fn finish(self) -> Result<(u64, u64), StoreError> {
        let mut totals = (0, 0);
        for w in self.writers {
            drop(w.tx);
            let (ok, failed) = w.join.await.map_err(|e| StoreError::io(format!("writer task died: {e}")))?;
            totals.0 += ok;
            totals.1 += failed;
        }
        Ok(totals)
    }
}

pub async fn load(settings: &LoadSettings, connector: Arc<dyn StoreConnector>) -> Result<LoadReport, AppError> {
    let file = tokio::fs::File::open(&settings.file)
        .await
        .map_err(|e| AppError::Input { path: settings.file.clone(), detail: e.to_string() })?;
    let mut lines = tokio::io::BufReader::new(file).lines();

    // --- Writers: one connection each ---
    let table: Arc<str> = Arc::from(settings.table.as_str());
    let written = Arc::new(AtomicU64::new(0));
    let mut writers = Vec::with_capacity(settings.connections);
    for _ in 0..settings.connections {
        let client = connector.connect().await?;
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let join = tokio::spawn(write_loop(client, table.clone(), rx, written.clone()));
        writers.push(Writer { tx, join });
    }
    tracing::info!(store = %connector.target(), connections = writers.len(), file = %settings.file, "loading");
    let mut fanout = Fanout { writers, next: 0 };

    let mut report = LoadReport::default();
    let mut per_region: HashMap<String, usize> = HashMap::new();
    let mut line_no = 0u64;
    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| AppError::Input { path: settings.file.clone(), detail: e.to_string() })?
    {
        line_no += 1;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        report.lines += 1;

        match settings.format {
            InputFormat::Csv => {
                let row = match parse_csv_line(line) {
                    Ok(r) => r,
                    Err(e) => {
                        tracing::warn!(line = line_no, error = %e, "skipping malformed row");
                        report.skipped += 1;
                        continue;
                    }
                };
                let seen = per_region.entry(row.region.clone()).or_insert(0);
                *seen += 1;
                if *seen > settings.per_region {
                    report.capped += 1;
                    continue;
                }
                let key = report.accepted.to_string();
                report.accepted += 1;
                let copies: Vec<_> = (0..settings.repeats).map(|j| row.repeat(j)).collect();
                fanout.send((key, row.record)).await?;
                for copy in copies {
                    fanout.send(copy).await?;
                }
            }
            InputFormat::Jsonl => match parse_json_line(line) {
                Ok(item) => {
                    report.accepted += 1;
                    fanout.send(item).await?;
                }
                Err(e) => {
                    tracing::warn!(line = line_no, error = %e, "skipping malformed row");
                    report.skipped += 1;
                }
            },
        }
    }

    let (ok, failed) = fanout.finish().await?;
    report.written = ok;
    report.failed = failed;
    if ok >= PROGRESS_EVERY {
        eprintln!();
    }

    tracing::info!(
        lines = report.lines,
        accepted = report.accepted,
        skipped = report.skipped,
        capped = report.capped,
        written = report.written,
        failed = report.failed,
        "load finished"
    );
    Ok(report)
}

async fn write_loop(
    client: Box<dyn StoreClient>,
    table: Arc<str>,
    mut rx: mpsc::Receiver<(String, Record)>,
    written: Arc<AtomicU64>,
) -> (u64, u64) {
    let mut ok = 0u64;
    let mut failed = 0u64;
    while let Some((key, record)) = rx.recv().await {
        match client.put(&table, &key, record).await {
            Ok(()) => {
                ok += 1;
                let n = written.fetch_add(1, Ordering::Relaxed) + 1;
                if n % PROGRESS_EVERY == 0 {
                    eprint!("\rloaded {n} records");
                    std::io::stderr().flush().ok();
                }
            }
            Err(e) => {
                failed += 1;
                tracing::warn!(key = %key, error = %e, "put failed");
            }
        }
    }
    (ok, failed)
}

#[cfg(test)]
mod tests {
    use store_api::Value;
    use store_memory::{MemoryConnector, MemoryStore, MemoryStoreConfig};

    use super::*;
    use crate::config::StoreTarget;

    fn write_input(name: &str, body: &str) -> String {
        let path = std::env::temp_dir().join(format!("hotel-bench-{name}-{}.dat", std::process::id()));
        std::fs::write(&path, body).unwrap();
        path.to_string_lossy().into_owned()
    }

    fn settings(file: String, format: InputFormat) -> LoadSettings {
        LoadSettings {
            target: StoreTarget {
                kind: StoreKind::Memory,
                host: String::new(),
                port: 0,
                memory: MemoryStoreConfig::default(),
            },
            table: "hotels".into(),
            file,
            format,
            per_region: 2,
            repeats: 0,
            connections: 3,
        }
    }

    fn csv_row(id: &str, region: &str) -> String {
        format!("{id},Inn {id},Hotels,50,90,3.5,open,3,(212) 555-0100,{region},Town,10001,-73.9,40.7,1 Main St\n")
    }

    async fn name_of(store: &MemoryStore, key: &str) -> Option<String> {
        let rec = store.peek("hotels", key).await?;
        rec.get("name").and_then(Value::as_str).map(String::from)
    }

    #[tokio::test]
    async fn csv_rows_are_capped_per_region_and_keyed_in_order() {
        let body = [
            csv_row("a", "21"),
            csv_row("b", "21"),
            csv_row("c", "21"),
            "garbage line\n".to_string(),
            "\n".to_string(),
            csv_row("d", "C3"),
        ]
        .concat();
        let path = write_input("capped", &body);
        let store = MemoryStore::new(MemoryStoreConfig::default());
        let connector = Arc::new(MemoryConnector::new(store.handle()));

        let report = load(&settings(path.clone(), InputFormat::Csv), connector).await.unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(
            report,
            LoadReport { lines: 5, accepted: 3, skipped: 1, capped: 1, written: 3, failed: 0 }
        );
        assert_eq!(store.len("hotels").await, 3);
        assert_eq!(name_of(&store, "0").await.as_deref(), Some("Inn a"));
        assert_eq!(name_of(&store, "1").await.as_deref(), Some("Inn b"));
        assert_eq!(name_of(&store, "2").await.as_deref(), Some("Inn d"));
    }

    #[tokio::test]
    async fn repeats_write_suffixed_copies() {
        let path = write_input("repeats", &csv_row("fid", "21"));
        let store = MemoryStore::new(MemoryStoreConfig::default());
        let connector = Arc::new(MemoryConnector::new(store.handle()));
        let cfg = LoadSettings { repeats: 2, ..settings(path.clone(), InputFormat::Csv) };

        let report = load(&cfg, connector).await.unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(report.accepted, 1);
        assert_eq!(report.written, 3);
        let copy = store.peek("hotels", "fid1").await.unwrap();
        assert_eq!(copy.get("region").and_then(Value::as_str), Some("211"));
        assert!(store.peek("hotels", "fid0").await.is_some());
        assert!(store.peek("hotels", "0").await.is_some());
    }

    #[tokio::test]
    async fn jsonl_uses_the_embedded_key_and_skips_bad_lines() {
        let body = "{\"key\": \"h1\", \"name\": \"One\", \"stars\": 4}\n[1,2]\n{\"key\": \"h2\", \"name\": \"Two\"}\n";
        let path = write_input("jsonl", body);
        let store = MemoryStore::new(MemoryStoreConfig::default());
        let connector = Arc::new(MemoryConnector::new(store.handle()));

        let report = load(&settings(path.clone(), InputFormat::Jsonl), connector).await.unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(report.accepted, 2);
        assert_eq!(report.skipped, 1);
        let one = store.peek("hotels", "h1").await.unwrap();
        assert_eq!(one.get("stars").and_then(Value::as_i64), Some(4));
        assert!(store.peek("hotels", "h2").await.is_some());
    }

    #[tokio::test]
    async fn failed_puts_are_counted_not_fatal() {
        let body = (0..6).map(|i| csv_row(&format!("x{i}"), &format!("r{i}"))).collect::<String>();
        let path = write_input("failing", &body);
        let store = MemoryStore::new(MemoryStoreConfig { fail_put_every: 2, ..Default::default() });
        let connector = Arc::new(MemoryConnector::new(store.handle()));
        let cfg = LoadSettings { connections: 1, ..settings(path.clone(), InputFormat::Csv) };

        let report = load(&cfg, connector).await.unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(report.accepted, 6);
        assert_eq!(report.written, 3);
        assert_eq!(report.failed, 3);
    }

    #[tokio::test]
    async fn missing_file_is_an_input_error() {
        let store = MemoryStore::new(MemoryStoreConfig::default());
        let connector = Arc::new(MemoryConnector::new(store));
        let cfg = settings("/nonexistent/hotels.dat".into(), InputFormat::Csv);
        assert!(matches!(load(&cfg, connector).await, Err(AppError::Input { .. })));
    }
}
