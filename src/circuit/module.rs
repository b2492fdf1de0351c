//! A PV module: a series chain of cells plus its bypass diodes.

use super::bypass::{BypassLayout, BypassPlacement};
use super::cell::{check_irradiance, check_temperature, Cell};
use super::types::{CellPosition, Terminals};
use crate::error::{PvError, Result};
use crate::estimator::{SharedEstimator, STC_IRRADIANCE, STC_TEMPERATURE};

/// A bypass diode resolved to circuit nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct BypassDiode {
    /// Index of the diode within its module
    pub index: usize,
    /// Cells bridged
    pub placement: BypassPlacement,
    /// Entry node of the anode cell and exit node of the cathode cell
    pub terminals: Terminals,
    /// Diode temperature (°C)
    pub temperature: f64,
}

/// Series chain of cells sharing one reference temperature and irradiance.
#[derive(Debug, Clone)]
pub struct Module {
    string: usize,
    index: usize,
    cells: Vec<Cell>,
    temperature: f64,
    irradiance: f64,
    bypass: BypassLayout,
    bypass_temperatures: Vec<f64>,
}

impl Module {
    /// Create a module of `ns` cells at STC between `terminals`.
    ///
    /// Inner cells are chained through `S{s}P{m}N{k}` nodes; the first cell
    /// starts at `terminals.entry` and the last ends at `terminals.exit`.
    pub(crate) fn new(string: usize, index: usize, ns: usize, terminals: Terminals, estimator: &SharedEstimator) -> Self {
        let cells = (0..ns)
            .map(|k| {
                let position = CellPosition::new(string, index, k);
                let entry = if k == 0 {
                    terminals.entry.clone()
                } else {
                    position.entry_node()
                };
                let exit = if k + 1 == ns {
                    terminals.exit.clone()
                } else {
                    position.exit_node()
                };
                Cell::new(position, Terminals::new(entry, exit), estimator.clone())
            })
            .collect();

        Self {
            string,
            index,
            cells,
            temperature: STC_TEMPERATURE,
            irradiance: STC_IRRADIANCE,
            bypass: BypassLayout::new(ns),
            bypass_temperatures: Vec::new(),
        }
    }

    /// String this module belongs to.
    pub fn string(&self) -> usize {
        self.string
    }

    /// Position within the string.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Cells in series order.
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// Look up a cell.
    pub fn cell(&self, cell: usize) -> Result<&Cell> {
        self.cells
            .get(cell)
            .ok_or_else(|| PvError::out_of_range("cell", cell, self.cells.len()))
    }

    /// Module terminals: entry of the first cell, exit of the last.
    pub fn terminals(&self) -> Terminals {
        let first = &self.cells[0].terminals().entry;
        let last = &self.cells[self.cells.len() - 1].terminals().exit;
        Terminals::new(first.clone(), last.clone())
    }

    /// Reference temperature (°C).
    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    /// Reference irradiance (W/m²).
    pub fn irradiance(&self) -> f64 {
        self.irradiance
    }

    /// Bypass layout currently applied.
    pub fn bypass_layout(&self) -> &BypassLayout {
        &self.bypass
    }

    /// Temperatures of the bypass diodes, in placement order.
    pub fn bypass_temperatures(&self) -> &[f64] {
        &self.bypass_temperatures
    }

    /// Bypass diodes resolved to nodes, in cell order.
    pub fn bypass_diodes(&self) -> Vec<BypassDiode> {
        self.bypass
            .placements()
            .iter()
            .zip(&self.bypass_temperatures)
            .enumerate()
            .map(|(index, (placement, &temperature))| BypassDiode {
                index,
                placement: *placement,
                terminals: Terminals::new(
                    self.cells[placement.anode].terminals().entry.clone(),
                    self.cells[placement.cathode].terminals().exit.clone(),
                ),
                temperature,
            })
            .collect()
    }

    /// Set the module temperature, its cells and its bypass diodes.
    pub(crate) fn set_temperature(&mut self, temperature: f64) -> Result<()> {
        check_temperature(temperature)?;
        self.temperature = temperature;
        for cell in &mut self.cells {
            cell.set_temperature(temperature)?;
        }
        self.bypass_temperatures.fill(temperature);
        Ok(())
    }

    /// Set the module irradiance and that of all its cells.
    pub(crate) fn set_irradiance(&mut self, irradiance: f64) -> Result<()> {
        check_irradiance(irradiance)?;
        self.irradiance = irradiance;
        for cell in &mut self.cells {
            cell.set_irradiance(irradiance)?;
        }
        Ok(())
    }

    /// Replace the bypass layout. Diode temperatures restart at the module's.
    pub(crate) fn set_bypass_layout(&mut self, layout: &BypassLayout) -> Result<()> {
        if layout.cell_count() != self.cells.len() {
            return Err(PvError::DimensionMismatch {
                expected: self.cells.len(),
                actual: layout.cell_count(),
            });
        }
        self.bypass = layout.settled();
        self.bypass_temperatures = vec![self.temperature; self.bypass.len()];
        Ok(())
    }

    /// Set the temperature of one bypass diode.
    pub(crate) fn set_bypass_temperature(&mut self, diode: usize, temperature: f64) -> Result<()> {
        check_temperature(temperature)?;
        let limit = self.bypass_temperatures.len();
        let slot = self
            .bypass_temperatures
            .get_mut(diode)
            .ok_or_else(|| PvError::out_of_range("bypass diode", diode, limit))?;
        *slot = temperature;
        Ok(())
    }

    pub(crate) fn cell_mut(&mut self, cell: usize) -> Result<&mut Cell> {
        let limit = self.cells.len();
        self.cells
            .get_mut(cell)
            .ok_or_else(|| PvError::out_of_range("cell", cell, limit))
    }

    /// Mark a cell as hotspot, deriving its irradiance from this module.
    pub(crate) fn set_cell_hotspot(&mut self, cell: usize, temperature: f64) -> Result<()> {
        let (t, g) = (self.temperature, self.irradiance);
        self.cell_mut(cell)?.set_hotspot(temperature, t, g)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimator::DatasheetSpec;

    fn module(ns: usize) -> Module {
        let sheet = DatasheetSpec::new(21.6, 5.0, 17.4, 4.6, -0.08, 0.003, 36).unwrap();
        let est = SharedEstimator::fit(sheet).unwrap();
        Module::new(0, 1, ns, Terminals::new("Grid_0_1", "Vb"), &est)
    }

    #[test]
    fn test_cells_form_a_chain() {
        let m = module(4);
        let nodes: Vec<_> = m.cells().iter().map(|c| c.terminals().clone()).collect();
        assert_eq!(nodes[0].entry, "Grid_0_1");
        for pair in nodes.windows(2) {
            assert_eq!(pair[0].exit, pair[1].entry);
        }
        assert_eq!(nodes[3].exit, "Vb");
        assert_eq!(nodes[1].entry, "S0P1N1");
        assert_eq!(m.terminals(), Terminals::new("Grid_0_1", "Vb"));
    }

    #[test]
    fn test_temperature_cascades_to_cells_and_diodes() {
        let mut m = module(6);
        m.set_bypass_layout(&BypassLayout::from_spans(6, &[(0, 2), (3, 5)]).unwrap())
            .unwrap();
        assert_eq!(m.bypass_temperatures(), &[25.0, 25.0]);

        m.set_temperature(55.0).unwrap();
        assert!(m.cells().iter().all(|c| c.temperature() == 55.0));
        assert_eq!(m.bypass_temperatures(), &[55.0, 55.0]);

        m.set_bypass_temperature(1, 70.0).unwrap();
        assert_eq!(m.bypass_temperatures(), &[55.0, 70.0]);
        assert!(m.set_bypass_temperature(2, 70.0).is_err());
    }

    #[test]
    fn test_bypass_diode_terminals() {
        let mut m = module(6);
        m.set_bypass_layout(&BypassLayout::from_spans(6, &[(0, 2), (3, 5)]).unwrap())
            .unwrap();
        let diodes = m.bypass_diodes();
        assert_eq!(diodes.len(), 2);
        assert_eq!(diodes[0].terminals, Terminals::new("Grid_0_1", "S0P1N3"));
        assert_eq!(diodes[1].terminals, Terminals::new("S0P1N3", "Vb"));
    }

    #[test]
    fn test_layout_length_must_match() {
        let mut m = module(6);
        let err = m.set_bypass_layout(&BypassLayout::new(5)).unwrap_err();
        assert!(matches!(err, PvError::DimensionMismatch { expected: 6, actual: 5 }));
        assert!(m.bypass_layout().is_empty());
    }

    #[test]
    fn test_irradiance_rejects_negative() {
        let mut m = module(3);
        assert!(m.set_irradiance(-5.0).is_err());
        assert_eq!(m.irradiance(), 1000.0);
    }
}
