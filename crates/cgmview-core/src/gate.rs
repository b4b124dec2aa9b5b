//! Shared-secret access gate.
//!
//! This is a display-layer gate compared against a plaintext allow-list. It
//! offers no confidentiality or integrity guarantee and is not rate limited.

use crate::error::GateError;

#[derive(Debug, Clone, Default)]
pub struct AccessGate {
    keys: Vec<String>,
}

impl AccessGate {
    pub fn new(keys: impl IntoIterator<Item = String>) -> Self {
        Self {
            keys: keys.into_iter().filter(|k| !k.is_empty()).collect(),
        }
    }

    /// An empty allow-list lets everything through.
    pub fn is_open(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn check(&self, key: Option<&str>) -> Result<(), GateError> {
        if self.is_open() {
            return Ok(());
        }
        let key = key.ok_or(GateError::MissingKey)?;
        if self.keys.iter().any(|k| k == key) {
            Ok(())
        } else {
            Err(GateError::Denied)
        }
    }
}
