//! Error types for the PV grid netlist generator.
//!
//! This module provides a unified error type [`PvError`] that covers
//! all error conditions that can occur during parameter estimation,
//! topology editing, netlist rendering and result parsing.

use thiserror::Error;

/// Result type alias using [`PvError`].
pub type Result<T> = std::result::Result<T, PvError>;

/// Unified error type for all PVSpice operations.
#[derive(Error, Debug)]
pub enum PvError {
    // ============ Input Errors ============
    /// A datasheet rating is missing, non-finite or physically inconsistent
    #[error("Invalid datasheet value '{field}': {message}")]
    InvalidDatasheet { field: String, message: String },

    /// A datasheet field could not be read as a number
    #[error("Datasheet field '{field}' is not numeric: '{text}'")]
    NonNumericField { field: String, text: String },

    /// A manual parameter override is not usable
    #[error("Invalid circuit parameter '{param}': {message}")]
    InvalidParameter { param: String, message: String },

    /// The fixed-point iteration produced a non-finite iterate
    #[error("Parameter fit diverged at iteration {iteration} ({quantity} is not finite)")]
    FitDiverged { iteration: usize, quantity: &'static str },

    // ============ Topology Errors ============
    /// Invalid bypass diode placement
    #[error("Invalid bypass placement at cell {cell}: {message}")]
    InvalidBypass { cell: usize, message: String },

    /// A supplied list does not match the module's cell count
    #[error("Dimension mismatch: expected {expected} entries, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Addressed string/module/cell/bypass does not exist
    #[error("Position out of range: {what} {index} (limit {limit})")]
    OutOfRange {
        what: &'static str,
        index: usize,
        limit: usize,
    },

    /// Invalid grid topology
    #[error("Invalid grid topology: {message}")]
    InvalidTopology { message: String },

    // ============ Netlist Errors ============
    /// Invalid sweep or directive parameter
    #[error("Invalid simulation parameter: {message}")]
    InvalidSimulationParam { message: String },

    // ============ Result File Errors ============
    /// The raw file is not simulator output or is malformed
    #[error("Malformed result file at line {line}: {message}")]
    FormatError { line: usize, message: String },

    // ============ I/O Errors ============
    /// Error reading an input file
    #[error("Failed to read file '{path}': {source}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Error writing an output file
    #[error("Failed to write file '{path}': {source}")]
    FileWriteError {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl PvError {
    /// Create an invalid datasheet error
    pub fn datasheet(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidDatasheet {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create an invalid bypass placement error
    pub fn bypass(cell: usize, message: impl Into<String>) -> Self {
        Self::InvalidBypass {
            cell,
            message: message.into(),
        }
    }

    /// Create a result file format error
    pub fn format(line: usize, message: impl Into<String>) -> Self {
        Self::FormatError {
            line,
            message: message.into(),
        }
    }

    /// Create an out-of-range error
    pub fn out_of_range(what: &'static str, index: usize, limit: usize) -> Self {
        Self::OutOfRange { what, index, limit }
    }

    /// Create an invalid simulation parameter error
    pub fn simulation_param(message: impl Into<String>) -> Self {
        Self::InvalidSimulationParam {
            message: message.into(),
        }
    }

    /// True for errors raised by bad topology edits.
    pub fn is_topology(&self) -> bool {
        matches!(
            self,
            Self::InvalidBypass { .. }
                | Self::DimensionMismatch { .. }
                | Self::OutOfRange { .. }
                | Self::InvalidTopology { .. }
        )
    }
}
