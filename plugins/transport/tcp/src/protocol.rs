use serde::{Deserialize, Serialize};

use store_api::{Record, StoreError};

/// Запрос клиента. Одна JSON-строка на запрос.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    Get { table: String, key: String },
    Put { table: String, key: String, record: Record },
}

/// Ответ сервера на один запрос.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record: Option<Record>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<StoreError>,
}

impl Response {
    pub fn done() -> Self {
        Self { ok: true, record: None, error: None }
    }

    pub fn record(record: Record) -> Self {
        Self { ok: true, record: Some(record), error: None }
    }

    pub fn error(error: StoreError) -> Self {
        Self { ok: false, record: None, error: Some(error) }
    }

    /// Ответ → результат. `ok: false` без тела ошибки считается нарушением протокола.
    pub fn into_result(self) -> Result<Option<Record>, StoreError> {
        if self.ok {
            Ok(self.record)
        } else {
            Err(self
                .error
                .unwrap_or_else(|| StoreError::protocol("response has ok=false but no error")))
        }
    }
}
