//! Error kinds for ecg-core
//!
//! Most of these are recorded as non-fatal `Issue`s on a result rather than
//! propagated as `Err` — see the `Issue` type in `validator.rs` and the
//! `DegradationLevel` on `DigitizerResult`. Only a handful of these variants
//! ever surface through `Result`: an unusable pixel buffer, or a caller that
//! opted into strict mode.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache error: {0}")]
    Cache(String),

    #[error("image buffer unusable: {0}")]
    LoadingFailed(String),

    #[error("AI provider unavailable: {0}")]
    AiUnavailable(String),

    #[error("grid not detected, standard values assumed")]
    GridUndetected,

    #[error("panel '{0}' produced no usable trace")]
    NoTraces(String),

    #[error("lead '{0}' is flat (no signal variation)")]
    FlatLead(String),

    #[error("lead '{0}' is clipped")]
    Clipping(String),

    #[error("Einthoven's law violated: {0}")]
    EinthovenViolation(String),

    #[error("Goldberger relation violated: {0}")]
    GoldbergerViolation(String),

    #[error("extreme voltage detected in lead '{0}'")]
    ExtremeVoltage(String),

    #[error("heart rate outside physiologic range: {0} bpm")]
    AbnormalHr(f64),

    #[error("operation cancelled")]
    Cancelled,

    #[error("operation timed out")]
    Timeout,

    #[error("strict mode: {0}")]
    Strict(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Cache(e.to_string())
    }
}
