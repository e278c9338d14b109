//! Digitization and clinical-interpretation core for printed/scanned ECGs.
//!
//! This crate is synchronous and has no I/O beyond the file-backed response
//! cache: it takes an already-decoded pixel buffer and optional VLM
//! analysis results in, and returns a reconstructed signal and/or a
//! clinical interpretation out. Concurrency (parallel VLM provider
//! fan-out, the JSON-RPC service loop) lives in `ecg-server`.

pub mod age_table;
pub mod analyzer;
pub mod cache;
pub mod electrode_swap;
pub mod error;
pub mod finding;
pub mod grid;
pub mod image;
pub mod interpretation;
pub mod lead;
pub mod math;
pub mod measurements;
pub mod pacemaker;
pub mod panel;
pub mod reconstructor;
pub mod refinement;
pub mod rhythm;
pub mod signal;
pub mod tracer;
pub mod validator;

pub use error::{Error, Result};
pub use finding::{Finding, Interpretation, Severity, Summary};
pub use grid::{Calibration, GridInfo};
pub use image::{Image, Rgba};
pub use lead::LeadName;
pub use measurements::Measurements;
pub use panel::Panel;
pub use signal::EcgSignal;
pub use validator::ValidationReport;
