//! Grid validation.

use crate::error::{PvError, Result};

use super::types::{junction_node, POSITIVE_RAIL};
use super::Grid;

/// Validate a grid before it is written out.
///
/// Checks:
/// - Every string is one unbroken chain from its entry node to the positive rail
/// - Each module has one temperature per bypass diode
/// - Fitted parameters at every cell temperature are finite
pub fn validate_grid(grid: &Grid) -> Result<()> {
    for (s, string) in grid.strings().enumerate() {
        let mut node = junction_node(s, 0);
        for cell in string.iter().flat_map(|m| m.cells()) {
            let terminals = cell.terminals();
            if terminals.entry != node {
                return Err(PvError::InvalidTopology {
                    message: format!(
                        "cell {} starts at '{}' but the chain is at '{}'",
                        cell.position(),
                        terminals.entry,
                        node
                    ),
                });
            }
            node.clone_from(&terminals.exit);
        }
        if node != POSITIVE_RAIL {
            return Err(PvError::InvalidTopology {
                message: format!("string {} ends at '{}' instead of '{}'", s, node, POSITIVE_RAIL),
            });
        }
    }

    for module in grid.modules() {
        if module.bypass_temperatures().len() != module.bypass_layout().len() {
            return Err(PvError::DimensionMismatch {
                expected: module.bypass_layout().len(),
                actual: module.bypass_temperatures().len(),
            });
        }
    }

    for cell in grid.cells() {
        let p = cell.parameters();
        let finite = [p.i0, p.iph, p.rs, p.rsh, p.a].iter().all(|v| v.is_finite());
        if !finite {
            return Err(PvError::InvalidParameter {
                param: cell.name(),
                message: format!("non-finite parameters at {} °C", cell.temperature()),
            });
        }
    }

    Ok(())
}
