use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("{0} tier must have at least one core")]
    ZeroCores(&'static str),
    #[error("{tier} service time must be > 0 (got {value})")]
    InvalidServiceTime { tier: &'static str, value: f64 },
    #[error("{name} must be within [0, 1] (got {value})")]
    InvalidProbability { name: &'static str, value: f64 },
    #[error("{name} must be >= 0 (got {value})")]
    NegativeDuration { name: &'static str, value: f64 },
    #[error("retry_delay must be > 0 (got {0})")]
    InvalidRetryDelay(f64),
    #[error("timeout must be > 0 (got {0})")]
    InvalidTimeout(f64),
    #[error("horizon must be > 0 (got {0})")]
    InvalidHorizon(f64),
    #[error("{0}")]
    ConfigIo(String),
    #[error("{0}")]
    ConfigParse(String),
    #[error("unsupported config format '{0}'")]
    UnsupportedConfigFormat(String),
    #[error("{0}")]
    Output(String),
    #[error("{0}")]
    Cli(String),
}

pub type Result<T> = std::result::Result<T, Error>;
