/// Top-level Rewire error type.
///
/// All fallible operations in `rewire-core` return [`Result<T, RewireError>`](Result).
/// Each variant wraps a domain-specific error enum, allowing callers to
/// match on the error source without losing type information.
#[derive(thiserror::Error, Debug)]
pub enum RewireError {
    /// Error from the structural graph engine (tree-sitter parsing).
    #[error("Graph engine error: {0}")]
    Graph(#[from] rewire_graphs::GraphError),

    /// Error in the embedding index layer (indexing, persistence, lookup).
    #[error("Index error: {0}")]
    Index(#[from] IndexError),

    /// Error applying a source patch (wiring, alignment, porting).
    #[error("Patch error: {0}")]
    Patch(#[from] PatchError),

    /// Error in the fix-strategy layer (registry, memory persistence).
    #[error("Strategy error: {0}")]
    Strategy(#[from] StrategyError),

    /// Error invoking the external build tool.
    #[error("Build error: {0}")]
    Build(#[from] BuildError),

    /// Error communicating with the patch-generation service.
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    /// Error in configuration parsing or validation.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Errors from the embedding index and similarity lookup.
#[derive(thiserror::Error, Debug)]
pub enum IndexError {
    /// Filesystem I/O while reading sources or the persisted index.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization of the index failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The embedding service failed for one input.
    #[error("Embedding failed for {name}: {message}")]
    Embedding {
        /// Identity of the input being embedded.
        name: String,
        /// Description of the provider failure.
        message: String,
    },
}

/// Errors while applying textual rewrites to migrated source.
#[derive(thiserror::Error, Debug)]
pub enum PatchError {
    /// Reading or persisting a rewritten file failed. The file's current
    /// pass is aborted; the next orchestrator pass retries it.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The target file does not exist in the migrated tree.
    #[error("File not found: {0}")]
    MissingFile(String),

    /// A rewiring pattern in the catalogue failed to compile.
    #[error("Invalid reference pattern: {0}")]
    Pattern(String),
}

/// Errors from the fix-strategy registry and attempt memory.
#[derive(thiserror::Error, Debug)]
pub enum StrategyError {
    /// A plan referenced a strategy that was never registered.
    #[error("Unknown strategy: {0}")]
    Unknown(String),

    /// Persisting or loading attempt memory failed.
    #[error("Memory IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Attempt-memory JSON could not be parsed.
    #[error("Memory serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors invoking the external build tool.
#[derive(thiserror::Error, Debug)]
pub enum BuildError {
    /// The build tool could not be started or its output captured.
    #[error("Build invocation failed: {0}")]
    Invocation(String),
}

/// Errors from patch-generation service interactions.
#[derive(thiserror::Error, Debug)]
pub enum LlmError {
    /// Network-level failure connecting to the provider.
    #[error("Network error: {0}")]
    Network(String),

    /// Provider returned a non-success HTTP status.
    #[error("API error (HTTP {status}): {body}")]
    ApiError {
        /// HTTP status code from the provider.
        status: u16,
        /// Response body text.
        body: String,
    },

    /// Provider response could not be parsed into the expected format.
    #[error("Response parse error: {0}")]
    Parse(String),

    /// Provider configuration is missing or invalid (API key, model, etc.).
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Errors in Rewire configuration parsing and validation.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// The configuration file does not exist at the expected path.
    #[error("Config file not found: {0}")]
    NotFound(String),

    /// Configuration values are present but semantically invalid.
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// Configuration file syntax could not be parsed (TOML error).
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Convenience alias for `Result<T, RewireError>`.
pub type Result<T> = std::result::Result<T, RewireError>;
