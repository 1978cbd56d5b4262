use store_api::{Record, Value};

use crate::error::MutateError;
use crate::rng::Rng;

/// Builds the record written back on each update: every field copied
/// verbatim, the shuffle field replaced by a permutation of its characters.
#[derive(Debug, Clone)]
pub struct RecordMutator {
    shuffle_field: String,
}

impl RecordMutator {
    pub fn new(shuffle_field: impl Into<String>) -> Self {
        Self { shuffle_field: shuffle_field.into() }
    }

    pub fn mutate(&self, record: &Record, rng: &mut Rng) -> Result<Record, MutateError> {
        let original = match record.get(&self.shuffle_field) {
            Some(Value::String(s)) => s,
            Some(other) => {
                return Err(MutateError::NotAString {
                    field: self.shuffle_field.clone(),
                    found: other.type_name(),
                });
            }
            None => return Err(MutateError::MissingField(self.shuffle_field.clone())),
        };
        let shuffled = shuffle_str(original, rng);

        let mut out = record.clone();
        out.insert(self.shuffle_field.clone(), shuffled);
        Ok(out)
    }
}

/// Случайная перестановка символов (не байтов) строки.
pub fn shuffle_str(word: &str, rng: &mut Rng) -> String {
    let mut chars: Vec<char> = word.chars().collect();
    rng.shuffle(&mut chars);
    chars.into_iter().collect()
}
