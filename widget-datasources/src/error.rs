use thiserror::Error;

/// Problems found while registering an argument schema or a descriptor.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("argument `{0}` is declared more than once")]
    DuplicateArgument(String),
    #[error("argument `{argument}` depends on unknown argument `{dependency}`")]
    UnknownDependency {
        argument: String,
        dependency: String,
    },
    #[error(
        "argument `{argument}` depends on `{dependency}` which is not declared before it \
         (dependency cycle or forward reference)"
    )]
    ForwardDependency {
        argument: String,
        dependency: String,
    },
    #[error("argument `{0}` depends on itself")]
    SelfDependency(String),
}

/// The first argument that failed validation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("required argument `{0}` is missing or empty")]
    Missing(String),
    #[error("argument `{0}` was rejected by its validator")]
    Rejected(String),
    #[error("period argument `{argument}` is invalid: {source}")]
    Period {
        argument: String,
        #[source]
        source: PeriodError,
    },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PeriodError {
    #[error("duration must be positive, got {0}ms")]
    NonPositiveDuration(i64),
    #[error("unknown relative range `{0}`")]
    UnknownRange(String),
    #[error("period inherits the ambient window but none was supplied")]
    MissingAmbient,
    #[error("window is empty: start {start_ms} is not before end {end_ms}")]
    EmptyWindow { start_ms: i64, end_ms: i64 },
    #[error("timestamp {0}ms is outside the supported calendar range")]
    OutOfRange(i64),
    #[error("unsupported precision: {0}s")]
    UnsupportedPrecision(i64),
    #[error("period value has unexpected type")]
    InvalidType,
}

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("argument `{0}` is not declared in the schema")]
    UnknownArgument(String),
    #[error("argument `{0}` has no option provider")]
    NoProvider(String),
    #[error("option provider for `{argument}` failed: {source}")]
    Provider {
        argument: String,
        #[source]
        source: anyhow::Error,
    },
    /// The upstream selection changed while the provider was running;
    /// the result was dropped.
    #[error("options for `{0}` were superseded by a newer upstream selection")]
    Superseded(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error("descriptor `{name}` version {version} is already registered")]
    Duplicate { name: String, version: u32 },
    #[error("descriptor `{descriptor}` references undeclared argument `{argument}`")]
    UndeclaredArgument {
        descriptor: String,
        argument: String,
    },
    #[error("descriptor `{descriptor}` uses reserved key `{key}` as a field name")]
    ReservedKey { descriptor: String, key: String },
}
