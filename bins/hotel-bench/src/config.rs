use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Deserialize;

use bench_core::{AbandonPolicy, BenchConfig};
use store_memory::MemoryStoreConfig;

use crate::error::AppError;

#[derive(Parser)]
#[command(name = "hotel-bench", about = "Бенчмарк read-modify-write для KV-хранилища")]
pub struct Cli {
    /// Путь к bench.toml (отсутствующий файл = значения по умолчанию)
    #[arg(long, global = true, default_value = "bench.toml", env = "HOTEL_BENCH_CONFIG")]
    pub config: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Запустить бенчмарк обновлений
    Update(UpdateArgs),
    /// Загрузить отели из файла в хранилище
    Load(LoadArgs),
    /// Поднять in-memory хранилище на TCP
    Serve(ServeArgs),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum StoreKind {
    /// Удалённое хранилище по TCP.
    #[default]
    Tcp,
    /// In-process хранилище с синтетическими отелями.
    Memory,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum InputFormat {
    #[default]
    Csv,
    Jsonl,
}

// ═══════════════════════════════════════════════════════════════
//  Config file (TOML)
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub store: Option<StoreKind>,
    pub threads: Option<usize>,
    /// Секунды.
    pub duration: Option<u64>,
    pub grace: Option<f64>,
    pub key_space: Option<u64>,
    pub table: Option<String>,
    pub shuffle_field: Option<String>,
    pub seed: Option<u64>,
    pub abandon: Option<AbandonPolicy>,
    #[serde(default)]
    pub memory: MemoryStoreConfig,
    #[serde(default)]
    pub load: LoadSection,
    #[serde(default)]
    pub serve: ServeSection,
}

#[derive(Debug, Default, Deserialize)]
pub struct LoadSection {
    pub file: Option<String>,
    pub format: Option<InputFormat>,
    pub per_region: Option<usize>,
    pub repeats: Option<usize>,
    pub connections: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ServeSection {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub seed_hotels: Option<u64>,
}

pub fn load_config(path: &str) -> Result<Config, AppError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| AppError::Config { context: "read", detail: format!("'{path}': {e}") })?;
    toml::from_str(&content).map_err(|e| AppError::Config { context: "parse", detail: format!("'{path}': {e}") })
}

/// Нет файла → дефолты; файл есть, но битый → ошибка.
pub fn load_or_default(path: &str) -> Result<Config, AppError> {
    match load_config(path) {
        Ok(c) => Ok(c),
        Err(e) => {
            if std::path::Path::new(path).exists() {
                return Err(e);
            }
            Ok(Config::default())
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  CLI args
// ═══════════════════════════════════════════════════════════════

#[derive(Args, Clone, Debug, Default)]
pub struct StoreArgs {
    /// Хост хранилища
    #[arg(long)]
    pub host: Option<String>,

    /// Порт хранилища
    #[arg(long)]
    pub port: Option<u16>,

    /// Куда ходить: tcp | memory
    #[arg(long, value_enum)]
    pub store: Option<StoreKind>,
}

#[derive(Args, Clone, Debug, Default)]
pub struct UpdateArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    /// Число воркеров
    #[arg(long)]
    pub threads: Option<usize>,

    /// Длительность прогона, секунды
    #[arg(long)]
    pub duration: Option<u64>,

    /// Множитель окна ожидания воркера (>= 1.0)
    #[arg(long)]
    pub grace: Option<f64>,

    /// Ключи берутся из [0, key_space)
    #[arg(long)]
    pub key_space: Option<u64>,

    #[arg(long)]
    pub table: Option<String>,

    /// Строковое поле, которое перемешивается при обновлении
    #[arg(long)]
    pub shuffle_field: Option<String>,

    /// Seed для PRNG (0 = текущее время)
    #[arg(long)]
    pub seed: Option<u64>,

    /// Что делать с опоздавшими воркерами: detach | cancel
    #[arg(long)]
    pub abandon: Option<AbandonPolicy>,
}

#[derive(Args, Clone, Debug, Default)]
pub struct LoadArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    /// Файл с отелями
    #[arg(long)]
    pub file: Option<String>,

    /// csv | jsonl
    #[arg(long, value_enum)]
    pub format: Option<InputFormat>,

    /// Не больше N отелей на регион (только csv)
    #[arg(long)]
    pub per_region: Option<usize>,

    /// Копий каждой принятой строки (только csv)
    #[arg(long)]
    pub repeats: Option<usize>,

    /// Параллельных соединений для записи
    #[arg(long)]
    pub connections: Option<usize>,

    #[arg(long)]
    pub table: Option<String>,
}

#[derive(Args, Clone, Debug, Default)]
pub struct ServeArgs {
    #[arg(long)]
    pub host: Option<String>,

    #[arg(long)]
    pub port: Option<u16>,

    /// Засеять N синтетических отелей с ключами 0..N
    #[arg(long)]
    pub seed_hotels: Option<u64>,

    #[arg(long)]
    pub table: Option<String>,
}

// ═══════════════════════════════════════════════════════════════
//  Effective: merged config
// ═══════════════════════════════════════════════════════════════

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_SERVE_HOST: &str = "0.0.0.0";

/// Куда подключаться.
#[derive(Debug, Clone)]
pub struct StoreTarget {
    pub kind: StoreKind,
    pub host: String,
    pub port: u16,
    pub memory: MemoryStoreConfig,
}

impl StoreTarget {
    fn merge(args: &StoreArgs, cfg: &Config) -> Self {
        Self {
            kind: args.store.or(cfg.store).unwrap_or_default(),
            host: args.host.clone().or_else(|| cfg.host.clone()).unwrap_or_else(|| DEFAULT_HOST.into()),
            port: args.port.or(cfg.port).unwrap_or(store_tcp::DEFAULT_PORT),
            memory: cfg.memory.clone(),
        }
    }
}

/// Итоговая конфигурация `update`: bench.toml < env/CLI
#[derive(Debug, Clone)]
pub struct UpdateSettings {
    pub target: StoreTarget,
    pub bench: BenchConfig,
}

impl UpdateSettings {
    pub fn new(config_path: &str, args: &UpdateArgs) -> Result<Self, AppError> {
        Self::merge(args, load_or_default(config_path)?)
    }

    pub fn merge(args: &UpdateArgs, cfg: Config) -> Result<Self, AppError> {
        let defaults = BenchConfig::default();
        let duration = match args.duration.or(cfg.duration) {
            Some(secs) => Duration::from_secs(secs),
            None => defaults.duration,
        };
        let bench = BenchConfig {
            threads: args.threads.or(cfg.threads).unwrap_or(defaults.threads),
            duration,
            grace: args.grace.or(cfg.grace).unwrap_or(defaults.grace),
            table: args.table.clone().or_else(|| cfg.table.clone()).unwrap_or(defaults.table),
            key_space: args.key_space.or(cfg.key_space).unwrap_or(defaults.key_space),
            shuffle_field: args
                .shuffle_field
                .clone()
                .or_else(|| cfg.shuffle_field.clone())
                .unwrap_or(defaults.shuffle_field),
            seed: args.seed.or(cfg.seed).unwrap_or(defaults.seed),
            abandon: args.abandon.or(cfg.abandon).unwrap_or(defaults.abandon),
        };
        bench.validate()?;
        Ok(Self { target: StoreTarget::merge(&args.store, &cfg), bench })
    }
}

pub const DEFAULT_PER_REGION: usize = 50;
pub const DEFAULT_CONNECTIONS: usize = 4;

#[derive(Debug, Clone)]
pub struct LoadSettings {
    pub target: StoreTarget,
    pub table: String,
    pub file: String,
    pub format: InputFormat,
    pub per_region: usize,
    pub repeats: usize,
    pub connections: usize,
}

impl LoadSettings {
    pub fn new(config_path: &str, args: &LoadArgs) -> Result<Self, AppError> {
        Self::merge(args, load_or_default(config_path)?)
    }

    pub fn merge(args: &LoadArgs, cfg: Config) -> Result<Self, AppError> {
        let file = args
            .file
            .clone()
            .or_else(|| cfg.load.file.clone())
            .ok_or_else(|| AppError::Config { context: "load", detail: "no input file (--file)".into() })?;
        let connections = args.connections.or(cfg.load.connections).unwrap_or(DEFAULT_CONNECTIONS);
        if connections == 0 {
            return Err(AppError::Config { context: "load", detail: "connections must be >= 1".into() });
        }
        let per_region = args.per_region.or(cfg.load.per_region).unwrap_or(DEFAULT_PER_REGION);
        if per_region == 0 {
            return Err(AppError::Config { context: "load", detail: "per_region must be >= 1".into() });
        }
        Ok(Self {
            target: StoreTarget::merge(&args.store, &cfg),
            table: args
                .table
                .clone()
                .or_else(|| cfg.table.clone())
                .unwrap_or_else(|| BenchConfig::default().table),
            file,
            format: args.format.or(cfg.load.format).unwrap_or_default(),
            per_region,
            repeats: args.repeats.or(cfg.load.repeats).unwrap_or(0),
            connections,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ServeSettings {
    pub host: String,
    pub port: u16,
    pub table: String,
    pub seed_hotels: u64,
    pub memory: MemoryStoreConfig,
}

impl ServeSettings {
    pub fn new(config_path: &str, args: &ServeArgs) -> Result<Self, AppError> {
        Self::merge(args, load_or_default(config_path)?)
    }

    pub fn merge(args: &ServeArgs, cfg: Config) -> Result<Self, AppError> {
        Ok(Self {
            host: args
                .host
                .clone()
                .or_else(|| cfg.serve.host.clone())
                .unwrap_or_else(|| DEFAULT_SERVE_HOST.into()),
            port: args.port.or(cfg.serve.port).unwrap_or(store_tcp::DEFAULT_PORT),
            table: args
                .table
                .clone()
                .or_else(|| cfg.table.clone())
                .unwrap_or_else(|| BenchConfig::default().table),
            seed_hotels: args.seed_hotels.or(cfg.serve.seed_hotels).unwrap_or(0),
            memory: cfg.memory,
        })
    }
}
