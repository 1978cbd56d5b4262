use std::time::Duration;

use serde::Deserialize;

use crate::error::BenchError;

/// Что делать с воркерами, которых координатор перестал ждать.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbandonPolicy {
    /// Оставить работать в фоне (fire-and-forget).
    #[default]
    Detach,
    /// Cancel the shared token and abort the stragglers' tasks.
    Cancel,
}

impl std::fmt::Display for AbandonPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AbandonPolicy::Detach => f.write_str("detach"),
            AbandonPolicy::Cancel => f.write_str("cancel"),
        }
    }
}

impl std::str::FromStr for AbandonPolicy {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "detach" => Ok(AbandonPolicy::Detach),
            "cancel" => Ok(AbandonPolicy::Cancel),
            other => Err(BenchError::Config(format!("unknown abandon policy '{other}' (detach|cancel)"))),
        }
    }
}

/// Параметры одного прогона бенчмарка.
#[derive(Debug, Clone)]
pub struct BenchConfig {
    /// Размер пула воркеров.
    pub threads: usize,
    /// Сколько работает каждый воркер.
    pub duration: Duration,
    /// Ожидание каждого воркера = duration × grace.
    pub grace: f64,
    pub table: String,
    /// Ключи берутся из `[0, key_space)`.
    pub key_space: u64,
    pub shuffle_field: String,
    /// 0 = от часов.
    pub seed: u64,
    pub abandon: AbandonPolicy,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            threads: 32,
            duration: Duration::from_secs(60),
            grace: 1.1,
            table: "hotels".into(),
            key_space: 2550,
            shuffle_field: "tel".into(),
            seed: 0,
            abandon: AbandonPolicy::Detach,
        }
    }
}

impl BenchConfig {
    pub fn validate(&self) -> Result<(), BenchError> {
        if self.threads == 0 {
            return Err(BenchError::Config("threads must be >= 1".into()));
        }
        if self.duration.is_zero() {
            return Err(BenchError::Config("duration must be > 0".into()));
        }
        if !self.grace.is_finite() || self.grace < 1.0 {
            return Err(BenchError::Config(format!("grace must be >= 1.0, got {}", self.grace)));
        }
        if Duration::try_from_secs_f64(self.duration.as_secs_f64() * self.grace).is_err() {
            return Err(BenchError::Config(format!(
                "join window {}s x {} does not fit a duration",
                self.duration.as_secs_f64(),
                self.grace
            )));
        }
        if self.key_space == 0 {
            return Err(BenchError::Config("key_space must be >= 1".into()));
        }
        if self.table.is_empty() {
            return Err(BenchError::Config("table must not be empty".into()));
        }
        if self.shuffle_field.is_empty() {
            return Err(BenchError::Config("shuffle_field must not be empty".into()));
        }
        Ok(())
    }

    /// Сколько координатор ждёт один воркер.
    /// Для конфигурации, прошедшей `validate()`, переполнения нет.
    pub fn join_window(&self) -> Duration {
        Duration::try_from_secs_f64(self.duration.as_secs_f64() * self.grace).unwrap_or(Duration::MAX)
    }
}
