//! Grid topology: cells, modules, strings and bypass diodes.
//!
//! This module provides the physical hierarchy a netlist is generated from.
//! A [`Grid`] holds parallel strings of series [`Module`]s, each a chain of
//! [`Cell`]s. Node names are derived from positions, so adjacent elements
//! share terminals and every string runs from its probe node to the
//! positive rail.

mod bypass;
mod cell;
mod grid;
mod module;
mod types;
mod validate;

pub use bypass::{BypassLayout, BypassPlacement, CellMarker};
pub use cell::{hotspot_irradiance, Cell, HOTSPOT_DERATING};
pub use grid::Grid;
pub use module::{BypassDiode, Module};
pub use types::*;
pub use validate::validate_grid;
