//! Core types for grid positions and node naming.

use std::fmt;

/// Node every string returns to through its probe resistor.
pub const NEGATIVE_RAIL: &str = "0";

/// Node every string ends at; the bias source drives it.
pub const POSITIVE_RAIL: &str = "Vb";

/// Position of a cell inside a grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellPosition {
    /// Parallel string index
    pub string: usize,
    /// Module index within the string
    pub module: usize,
    /// Cell index within the module
    pub cell: usize,
}

impl CellPosition {
    /// Create a position.
    pub fn new(string: usize, module: usize, cell: usize) -> Self {
        Self {
            string,
            module,
            cell,
        }
    }

    /// Internal node at the entry of this cell.
    pub fn entry_node(&self) -> String {
        format!("S{}P{}N{}", self.string, self.module, self.cell)
    }

    /// Internal node at the exit of this cell (entry of the next one).
    pub fn exit_node(&self) -> String {
        format!("S{}P{}N{}", self.string, self.module, self.cell + 1)
    }
}

impl fmt::Display for CellPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S{}P{}N{}", self.string, self.module, self.cell)
    }
}

/// Node between module `index - 1` and module `index` of a string.
///
/// Index 0 is the string entry, joined to the negative rail by the probe
/// resistor.
pub fn junction_node(string: usize, index: usize) -> String {
    format!("Grid_{}_{}", string, index)
}

/// Pair of terminals a two-node element is connected between.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Terminals {
    /// Node current enters from
    pub entry: String,
    /// Node current leaves to
    pub exit: String,
}

impl Terminals {
    /// Create a terminal pair.
    pub fn new(entry: impl Into<String>, exit: impl Into<String>) -> Self {
        Self {
            entry: entry.into(),
            exit: exit.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_nodes_chain() {
        let a = CellPosition::new(1, 2, 3);
        let b = CellPosition::new(1, 2, 4);
        assert_eq!(a.entry_node(), "S1P2N3");
        assert_eq!(a.exit_node(), b.entry_node());
        assert_eq!(a.to_string(), "S1P2N3");
    }

    #[test]
    fn test_junction_naming() {
        assert_eq!(junction_node(0, 0), "Grid_0_0");
        assert_eq!(junction_node(3, 1), "Grid_3_1");
    }
}
