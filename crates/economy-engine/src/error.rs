//! Error types for the economy engine binary.
//!
//! [`EngineError`] wraps every failure that can stop the engine during
//! startup.

/// Top-level error for the economy engine binary.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: economy_core::config::ConfigError,
    },

    /// The ledger could not be created or restored.
    #[error("ledger error: {source}")]
    Ledger {
        /// The underlying ledger error.
        #[from]
        source: economy_ledger::LedgerError,
    },

    /// The snapshot store could not be reached or read.
    #[error("snapshot store error: {source}")]
    Db {
        /// The underlying store error.
        #[from]
        source: economy_db::DbError,
    },

    /// Waiting for the shutdown signal failed.
    #[error("signal error: {source}")]
    Signal {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },
}
