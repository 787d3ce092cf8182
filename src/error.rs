use thiserror::Error;

/// Fatal errors raised before a run issues its first request.
///
/// Everything that can go wrong *during* a run (timeouts, refused connections,
/// non-2xx responses, missing extraction paths) is reported as a value inside the
/// results instead. If you get an `Error`, nothing was sent.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("concurrency must be >= 1, got {0}")]
    InvalidConcurrency(usize),
    #[error("total requests must be >= 1, got {0}")]
    InvalidTotalRequests(usize),
    #[error("execution context expects {context} requests but the config asks for {config}")]
    ContextMismatch { config: usize, context: usize },
    #[error("iterations must be >= 1, got {0}")]
    InvalidIterations(usize),
    #[error("url must not be blank")]
    BlankUrl,
    #[error("scenario name must not be blank")]
    BlankScenarioName,
    #[error("scenario must have at least one step")]
    EmptyScenario,
    #[error("step id must not be blank")]
    BlankStepId,
    #[error("step url must not be blank: {step}")]
    BlankStepUrl { step: String },
    #[error("log interval must be between 1 and 100, got {0}")]
    InvalidLogInterval(u32),
    #[error("invalid scenario definition: {0}")]
    InvalidDefinition(String),
    #[error("failed to build http client: {0}")]
    Client(String),
}

pub type Result<T> = std::result::Result<T, Error>;
