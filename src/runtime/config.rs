//! Runtime options loaded from TOML or built in code.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::libs::Libs;
use crate::marshal::Walk;

/// Default bound on queued tickets before submitters block.
pub const DEFAULT_QUEUE_CAPACITY: usize = 32;

/// Options for opening a [`LuaRuntime`](super::LuaRuntime).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct RuntimeOptions {
    /// Standard library subsets opened in the interpreter.
    pub libs: Libs,
    /// Per-call deadline in milliseconds. Unset means queue mode.
    pub timeout_ms: Option<u64>,
    /// Tickets that may wait for the worker before submitters block.
    pub queue_capacity: usize,
    /// Chunk name used in diagnostics for source loaded from strings.
    pub chunk_name: String,
    /// Deepest host nesting accepted by the encoder.
    pub max_depth: usize,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            libs: Libs::ALL,
            timeout_ms: None,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            chunk_name: "=chunk".to_string(),
            max_depth: Walk::DEFAULT_MAX_DEPTH,
        }
    }
}

impl RuntimeOptions {
    pub fn with_libs(mut self, libs: Libs) -> Self {
        self.libs = libs;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = Some(timeout.as_millis().try_into().unwrap_or(u64::MAX));
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn with_chunk_name(mut self, name: impl Into<String>) -> Self {
        self.chunk_name = name.into();
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Deadline applied to each call, if any.
    pub fn call_timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        let options: Self = toml::from_str(text).map_err(|err| Error::Config(err.to_string()))?;
        options.validate()?;
        Ok(options)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|err| Error::Io {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if self.queue_capacity == 0 {
            return Err(Error::Config("queue_capacity must be at least 1".into()));
        }
        if self.max_depth == 0 {
            return Err(Error::Config("max_depth must be at least 1".into()));
        }
        if self.timeout_ms == Some(0) {
            return Err(Error::Config("timeout_ms must be positive when set".into()));
        }
        Ok(())
    }
}
