//! # PVSpice Core
//!
//! Photovoltaic grid modelling for SPICE simulation.
//!
//! This library provides:
//! - Single-diode parameter estimation from module datasheet ratings
//! - A grid model of parallel strings, series modules, cells and bypass diodes
//! - Netlist generation for LTspice with per-cell thermal and irradiance state
//! - Parsing of LTspice raw output into grid, string and bypass current series
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`estimator`] - Gauss–Seidel fit and temperature extrapolation
//! - [`circuit`] - Grid topology, per-cell state and bypass placement
//! - [`netlist`] - Netlist text assembly
//! - [`results`] - Raw file parsing, CSV export and power analysis
//!
//! ## Usage
//!
//! ### Native CLI
//!
//! ```bash
//! pvspice netlist --datasheet "voc=43.5 isc=3.45 vmp=35 imp=3.15 kv=-0.152 ki=0.0014 ns=72" \
//!     --series 2 --parallel 1 --bypass 0:23 --bypass 24:47 --bypass 48:71 -o grid.cir
//! pvspice parse grid.raw --csv grid.csv
//! ```
//!
//! ### Library
//!
//! ```no_run
//! use pvspice_core::{DatasheetSpec, Grid, NetlistBuilder, NetlistOptions, SharedEstimator};
//!
//! let sheet = DatasheetSpec::new(43.5, 3.45, 35.0, 3.15, -0.152, 0.0014, 72)?;
//! let mut grid = Grid::new(1, 1, SharedEstimator::fit(sheet)?)?;
//! grid.set_temperature(45.0)?;
//! let netlist = NetlistBuilder::new(NetlistOptions::for_grid(&grid)).render(&grid)?;
//! println!("{}", netlist);
//! # Ok::<(), pvspice_core::PvError>(())
//! ```
//!
//! ## Simulation Method
//!
//! Each cell is written as a `cell_py` subcircuit carrying its own I0, Iph,
//! Rs, Rsh and A, already shifted to the cell temperature. The simulator
//! temperature is therefore fixed at 25 °C, and the only sweep is a DC bias
//! across the grid rails.

pub mod circuit;
pub mod error;
pub mod estimator;
pub mod netlist;
pub mod results;

// Re-export main types for convenience
pub use circuit::{BypassLayout, Grid};
pub use error::{PvError, Result};
pub use estimator::{DatasheetSpec, EquivalentCircuitParams, EstimatorConfig, ParameterEstimator, SharedEstimator};
pub use netlist::{NetlistBuilder, NetlistDocument, NetlistOptions};
pub use results::{parse_raw, ProbeSet};

// WASM bindings
#[cfg(feature = "wasm")]
mod wasm;

#[cfg(feature = "wasm")]
pub use wasm::WasmPvGrid;
