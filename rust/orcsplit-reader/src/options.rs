//! Reader configuration.

use orcsplit_common::{Result, verify_arg};
use orcsplit_format::DEFAULT_TAIL_CACHE_SIZE;
use serde::{Deserialize, Serialize};

/// Default number of rows per emitted batch.
pub const DEFAULT_BATCH_SIZE: usize = 8192;

/// Options shared by every reader of one [`OrcFormatFile`](crate::OrcFormatFile).
///
/// Missing fields take their default values when deserialized, so a partial
/// JSON document such as `{"batch_size": 1024}` is a valid configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderOptions {
    /// Maximum number of rows per batch.
    pub batch_size: usize,
    /// Match requested columns to file columns ignoring ASCII case.
    pub case_insensitive_column_matching: bool,
    /// Synthesize requested columns absent from the file as nulls. When `false`,
    /// a missing column fails the plan.
    pub allow_missing_columns: bool,
    /// Require the file column type to equal the requested type instead of
    /// merely being castable to it.
    pub strict_types: bool,
    /// Size of the file suffix read up front when parsing the tail.
    pub tail_cache_size: u64,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        ReaderOptions {
            batch_size: DEFAULT_BATCH_SIZE,
            case_insensitive_column_matching: false,
            allow_missing_columns: true,
            strict_types: false,
            tail_cache_size: DEFAULT_TAIL_CACHE_SIZE,
        }
    }
}

impl ReaderOptions {
    /// Sets the maximum batch size.
    ///
    /// # Panics
    /// Panics if `batch_size` is zero.
    pub fn with_batch_size(self, batch_size: usize) -> Self {
        assert_ne!(batch_size, 0);
        Self { batch_size, ..self }
    }

    pub fn with_case_insensitive_column_matching(self, enabled: bool) -> Self {
        Self {
            case_insensitive_column_matching: enabled,
            ..self
        }
    }

    pub fn with_allow_missing_columns(self, allow: bool) -> Self {
        Self {
            allow_missing_columns: allow,
            ..self
        }
    }

    pub fn with_strict_types(self, strict: bool) -> Self {
        Self {
            strict_types: strict,
            ..self
        }
    }

    pub fn with_tail_cache_size(self, tail_cache_size: u64) -> Self {
        Self {
            tail_cache_size,
            ..self
        }
    }

    /// Checks values that may have come from a deserialized configuration.
    pub fn validate(&self) -> Result<()> {
        verify_arg!(batch_size, self.batch_size > 0);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{DEFAULT_BATCH_SIZE, ReaderOptions};

    #[test]
    fn test_partial_json_config() {
        let options: ReaderOptions =
            serde_json::from_str(r#"{"batch_size": 100, "strict_types": true}"#).unwrap();
        assert_eq!(options.batch_size, 100);
        assert!(options.strict_types);
        assert!(options.allow_missing_columns);
        assert!(!options.case_insensitive_column_matching);
        options.validate().unwrap();

        let json = serde_json::to_string(&ReaderOptions::default()).unwrap();
        let back: ReaderOptions = serde_json::from_str(&json).unwrap();
        assert_eq!(back.batch_size, DEFAULT_BATCH_SIZE);
    }

    #[test]
    fn test_zero_batch_size_is_rejected() {
        let options: ReaderOptions = serde_json::from_str(r#"{"batch_size": 0}"#).unwrap();
        let err = options.validate().unwrap_err();
        assert!(err.to_string().contains("batch_size"));
    }
}
