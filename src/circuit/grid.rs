//! The PV grid: parallel strings of series modules.

use super::bypass::{BypassLayout, CellMarker};
use super::cell::{check_irradiance, check_temperature, Cell};
use super::module::Module;
use super::types::{junction_node, Terminals, NEGATIVE_RAIL, POSITIVE_RAIL};
use crate::error::{PvError, Result};
use crate::estimator::{SharedEstimator, STC_IRRADIANCE, STC_TEMPERATURE};

/// `nparallel` strings of `nserie` modules, all reading one estimator.
///
/// Dimensions are fixed at construction. Grid and module setters cascade
/// down; a later cell-level setter overrides the cascaded value.
#[derive(Debug, Clone)]
pub struct Grid {
    nserie: usize,
    nparallel: usize,
    strings: Vec<Vec<Module>>,
    estimator: SharedEstimator,
    temperature: f64,
    irradiance: f64,
    bypass: BypassLayout,
}

impl Grid {
    /// Build a grid with every cell at STC.
    pub fn new(nserie: usize, nparallel: usize, estimator: SharedEstimator) -> Result<Self> {
        if nserie == 0 || nparallel == 0 {
            return Err(PvError::InvalidTopology {
                message: format!("grid needs at least one module per string and one string (got {}x{})", nserie, nparallel),
            });
        }
        let ns = estimator.datasheet().ns();

        let strings = (0..nparallel)
            .map(|s| {
                (0..nserie)
                    .map(|m| {
                        let exit = if m + 1 == nserie {
                            POSITIVE_RAIL.to_string()
                        } else {
                            junction_node(s, m + 1)
                        };
                        Module::new(s, m, ns, Terminals::new(junction_node(s, m), exit), &estimator)
                    })
                    .collect()
            })
            .collect();

        Ok(Self {
            nserie,
            nparallel,
            strings,
            estimator,
            temperature: STC_TEMPERATURE,
            irradiance: STC_IRRADIANCE,
            bypass: BypassLayout::new(ns),
        })
    }

    /// Modules per string.
    pub fn nserie(&self) -> usize {
        self.nserie
    }

    /// Number of parallel strings.
    pub fn nparallel(&self) -> usize {
        self.nparallel
    }

    /// Cells per module.
    pub fn cells_per_module(&self) -> usize {
        self.bypass.cell_count()
    }

    /// Shared parameter source.
    pub fn estimator(&self) -> &SharedEstimator {
        &self.estimator
    }

    /// Grid reference temperature (°C).
    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    /// Grid reference irradiance (W/m²).
    pub fn irradiance(&self) -> f64 {
        self.irradiance
    }

    /// Bypass layout last applied to the whole grid.
    pub fn bypass_layout(&self) -> &BypassLayout {
        &self.bypass
    }

    /// Node every string starts from.
    pub fn negative_rail(&self) -> &'static str {
        NEGATIVE_RAIL
    }

    /// Node every string ends at.
    pub fn positive_rail(&self) -> &'static str {
        POSITIVE_RAIL
    }

    /// Entry node of string `s`, joined to the negative rail by its probe.
    pub fn string_entry(&self, s: usize) -> Result<String> {
        self.string(s)?;
        Ok(junction_node(s, 0))
    }

    /// Modules of one string in series order.
    pub fn string(&self, s: usize) -> Result<&[Module]> {
        self.strings
            .get(s)
            .map(Vec::as_slice)
            .ok_or_else(|| PvError::out_of_range("string", s, self.nparallel))
    }

    /// All strings.
    pub fn strings(&self) -> impl Iterator<Item = &[Module]> {
        self.strings.iter().map(Vec::as_slice)
    }

    /// Every module, string-major.
    pub fn modules(&self) -> impl Iterator<Item = &Module> {
        self.strings.iter().flatten()
    }

    /// Every cell, string-major then module-major then cell index.
    pub fn cells(&self) -> impl Iterator<Item = &Cell> {
        self.modules().flat_map(|m| m.cells().iter())
    }

    /// Look up a module.
    pub fn module(&self, s: usize, m: usize) -> Result<&Module> {
        self.string(s)?
            .get(m)
            .ok_or_else(|| PvError::out_of_range("module", m, self.nserie))
    }

    /// Look up a cell.
    pub fn cell(&self, s: usize, m: usize, c: usize) -> Result<&Cell> {
        self.module(s, m)?.cell(c)
    }

    fn module_mut(&mut self, s: usize, m: usize) -> Result<&mut Module> {
        let (nserie, nparallel) = (self.nserie, self.nparallel);
        self.strings
            .get_mut(s)
            .ok_or_else(|| PvError::out_of_range("string", s, nparallel))?
            .get_mut(m)
            .ok_or_else(|| PvError::out_of_range("module", m, nserie))
    }

    fn cell_mut(&mut self, s: usize, m: usize, c: usize) -> Result<&mut Cell> {
        self.module_mut(s, m)?.cell_mut(c)
    }

    // ============ Grid-level setters ============

    /// Set every module, cell and bypass diode to `temperature` (°C).
    pub fn set_temperature(&mut self, temperature: f64) -> Result<()> {
        check_temperature(temperature)?;
        self.temperature = temperature;
        for module in self.strings.iter_mut().flatten() {
            module.set_temperature(temperature)?;
        }
        Ok(())
    }

    /// Set every module and cell to `irradiance` (W/m²).
    pub fn set_irradiance(&mut self, irradiance: f64) -> Result<()> {
        check_irradiance(irradiance)?;
        self.irradiance = irradiance;
        for module in self.strings.iter_mut().flatten() {
            module.set_irradiance(irradiance)?;
        }
        Ok(())
    }

    /// Apply one bypass layout to every module.
    ///
    /// The layout must be sized for this grid's modules; a pending anode is
    /// ignored. Diode temperatures restart at each module's temperature.
    pub fn set_bypass_layout(&mut self, layout: &BypassLayout) -> Result<()> {
        let ns = self.cells_per_module();
        if layout.cell_count() != ns {
            return Err(PvError::DimensionMismatch {
                expected: ns,
                actual: layout.cell_count(),
            });
        }
        for module in self.strings.iter_mut().flatten() {
            module.set_bypass_layout(layout)?;
        }
        self.bypass = layout.settled();
        Ok(())
    }

    /// Apply a per-cell marker list to every module (empty clears).
    pub fn set_bypass_markers(&mut self, markers: &[CellMarker]) -> Result<()> {
        let layout = BypassLayout::from_markers(self.cells_per_module(), markers)?;
        self.set_bypass_layout(&layout)
    }

    // ============ Module-level setters ============

    /// Set one module (its cells and diodes) to `temperature` (°C).
    pub fn set_module_temperature(&mut self, s: usize, m: usize, temperature: f64) -> Result<()> {
        self.module_mut(s, m)?.set_temperature(temperature)
    }

    /// Set one module and its cells to `irradiance` (W/m²).
    pub fn set_module_irradiance(&mut self, s: usize, m: usize, irradiance: f64) -> Result<()> {
        self.module_mut(s, m)?.set_irradiance(irradiance)
    }

    /// Give one module its own bypass layout.
    pub fn set_module_bypass_layout(&mut self, s: usize, m: usize, layout: &BypassLayout) -> Result<()> {
        self.module_mut(s, m)?.set_bypass_layout(layout)
    }

    /// Set the temperature of bypass diode `diode` of a module.
    pub fn set_bypass_temperature(&mut self, s: usize, m: usize, diode: usize, temperature: f64) -> Result<()> {
        self.module_mut(s, m)?.set_bypass_temperature(diode, temperature)
    }

    // ============ Cell-level setters ============

    /// Override one cell's temperature (°C).
    pub fn set_cell_temperature(&mut self, s: usize, m: usize, c: usize, temperature: f64) -> Result<()> {
        self.cell_mut(s, m, c)?.set_temperature(temperature)
    }

    /// Override one cell's irradiance (W/m²).
    pub fn set_cell_irradiance(&mut self, s: usize, m: usize, c: usize, irradiance: f64) -> Result<()> {
        self.cell_mut(s, m, c)?.set_irradiance(irradiance)
    }

    /// Mark a cell as a hotspot at `temperature`.
    ///
    /// Irradiance is derived from the excess over the module temperature.
    pub fn set_cell_hotspot(&mut self, s: usize, m: usize, c: usize, temperature: f64) -> Result<()> {
        self.module_mut(s, m)?.set_cell_hotspot(c, temperature)
    }

    /// Clear the hotspot flag; temperature and irradiance stay as they are.
    pub fn clear_cell_hotspot(&mut self, s: usize, m: usize, c: usize) -> Result<()> {
        self.cell_mut(s, m, c)?.clear_hotspot();
        Ok(())
    }

    /// Set the PID defect flag of a cell.
    pub fn set_cell_pid_defect(&mut self, s: usize, m: usize, c: usize, defect: bool) -> Result<()> {
        self.cell_mut(s, m, c)?.set_pid_defect(defect);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimator::DatasheetSpec;
    use std::rc::Rc;

    fn grid(nserie: usize, nparallel: usize) -> Grid {
        let sheet = DatasheetSpec::new(21.6, 5.0, 17.4, 4.6, -0.08, 0.003, 36).unwrap();
        Grid::new(nserie, nparallel, SharedEstimator::fit(sheet).unwrap()).unwrap()
    }

    #[test]
    fn test_dimensions() {
        let g = grid(3, 2);
        assert_eq!(g.strings().count(), 2);
        assert_eq!(g.modules().count(), 6);
        assert_eq!(g.cells().count(), 6 * 36);
        assert!(g.module(2, 0).is_err());
        assert!(g.cell(0, 3, 0).is_err());
        assert!(Grid::new(0, 1, g.estimator().clone()).is_err());
    }

    #[test]
    fn test_strings_share_rails_and_junctions() {
        let g = grid(3, 2);
        for (s, string) in g.strings().enumerate() {
            assert_eq!(string[0].terminals().entry, format!("Grid_{}_0", s));
            for pair in string.windows(2) {
                assert_eq!(pair[0].terminals().exit, pair[1].terminals().entry);
            }
            assert_eq!(string[2].terminals().exit, "Vb");
        }
    }

    #[test]
    fn test_cells_share_estimator() {
        let g = grid(2, 2);
        let first = g.cell(0, 0, 0).unwrap();
        assert!(g.cells().all(|c| c.estimator().same_source(first.estimator())));

        g.estimator().set_manually(1e-7, 5.0, 0.2, 500.0, 1.3).unwrap();
        assert!(g.cells().all(|c| (c.parameters().rsh - 500.0).abs() < 1e-9));
    }

    #[test]
    fn test_cells_at_same_temperature_share_parameters() {
        let g = grid(1, 2);
        let a = g.cell(0, 0, 0).unwrap().parameters();
        let b = g.cell(1, 0, 35).unwrap().parameters();
        assert!(Rc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_cascade_then_override() {
        let mut g = grid(2, 2);
        g.set_temperature(45.0).unwrap();
        g.set_irradiance(800.0).unwrap();
        g.set_cell_irradiance(1, 1, 4, 200.0).unwrap();
        g.set_module_temperature(0, 1, 60.0).unwrap();

        assert_eq!(g.cell(1, 1, 4).unwrap().irradiance(), 200.0);
        assert_eq!(g.cell(1, 1, 5).unwrap().irradiance(), 800.0);
        assert_eq!(g.cell(0, 1, 0).unwrap().temperature(), 60.0);
        assert_eq!(g.cell(0, 0, 0).unwrap().temperature(), 45.0);

        // A new grid-level set wins again
        g.set_irradiance(900.0).unwrap();
        assert_eq!(g.cell(1, 1, 4).unwrap().irradiance(), 900.0);
    }

    #[test]
    fn test_bypass_layout_applies_everywhere() {
        let mut g = grid(2, 1);
        let layout = BypassLayout::from_spans(36, &[(0, 17), (18, 35)]).unwrap();
        g.set_bypass_layout(&layout).unwrap();
        assert!(g.modules().all(|m| m.bypass_diodes().len() == 2));

        let err = g.set_bypass_layout(&BypassLayout::new(10)).unwrap_err();
        assert!(err.is_topology());
        assert!(g.modules().all(|m| m.bypass_diodes().len() == 2));

        g.set_bypass_markers(&[]).unwrap();
        assert!(g.modules().all(|m| m.bypass_diodes().is_empty()));
    }

    #[test]
    fn test_hotspot_cell() {
        let mut g = grid(1, 1);
        g.set_cell_hotspot(0, 0, 3, 100.0).unwrap();
        let cell = g.cell(0, 0, 3).unwrap();
        assert!(cell.is_hotspot());
        assert_eq!(cell.temperature(), 100.0);
        // sqrt(75/300) / 5.0 = 0.1
        assert!((cell.irradiance() - 900.0).abs() < 1e-9);

        g.clear_cell_hotspot(0, 0, 3).unwrap();
        assert!(!g.cell(0, 0, 3).unwrap().is_hotspot());
    }

    #[test]
    fn test_string_entry_nodes() {
        let g = grid(2, 3);
        assert_eq!(g.string_entry(0).unwrap(), "Grid_0_0");
        assert_eq!(g.string_entry(2).unwrap(), "Grid_2_0");
        assert!(matches!(g.string_entry(3), Err(PvError::OutOfRange { .. })));
    }

    #[test]
    fn test_pid_flag_is_inert() {
        let mut g = grid(1, 1);
        let before = g.cell(0, 0, 0).unwrap().parameters();
        g.set_cell_pid_defect(0, 0, 0, true).unwrap();
        let cell = g.cell(0, 0, 0).unwrap();
        assert!(cell.has_pid_defect());
        assert_eq!(*cell.parameters(), *before);
    }
}
