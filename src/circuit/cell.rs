//! A single PV cell.

use std::rc::Rc;

use super::types::{CellPosition, Terminals};
use crate::error::{PvError, Result};
use crate::estimator::{EquivalentCircuitParams, SharedEstimator, STC_IRRADIANCE, STC_TEMPERATURE};

/// Divisor of the hotspot temperature excess (K) in the irradiance derating.
pub const HOTSPOT_DERATING: f64 = 300.0;

/// One cell of a module, modelled as a single-diode subcircuit.
#[derive(Debug, Clone)]
pub struct Cell {
    position: CellPosition,
    terminals: Terminals,
    estimator: SharedEstimator,
    temperature: f64,
    irradiance: f64,
    hotspot: bool,
    pid_defect: bool,
}

impl Cell {
    /// Create a cell at STC between two nodes.
    pub(crate) fn new(position: CellPosition, terminals: Terminals, estimator: SharedEstimator) -> Self {
        Self {
            position,
            terminals,
            estimator,
            temperature: STC_TEMPERATURE,
            irradiance: STC_IRRADIANCE,
            hotspot: false,
            pid_defect: false,
        }
    }

    /// Grid position.
    pub fn position(&self) -> CellPosition {
        self.position
    }

    /// Instance name used in the netlist.
    pub fn name(&self) -> String {
        self.position.to_string()
    }

    /// Entry and exit nodes.
    pub fn terminals(&self) -> &Terminals {
        &self.terminals
    }

    /// Cell temperature (°C).
    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    /// Irradiance on the cell (W/m²).
    pub fn irradiance(&self) -> f64 {
        self.irradiance
    }

    /// Whether the cell is marked as a hotspot.
    pub fn is_hotspot(&self) -> bool {
        self.hotspot
    }

    /// Potential-induced degradation flag. Carried only; no model uses it.
    pub fn has_pid_defect(&self) -> bool {
        self.pid_defect
    }

    /// Parameter source shared with the rest of the grid.
    pub fn estimator(&self) -> &SharedEstimator {
        &self.estimator
    }

    /// Module-level parameters at this cell's temperature.
    pub fn parameters(&self) -> Rc<EquivalentCircuitParams> {
        self.estimator.parameters_at(self.temperature)
    }

    pub(crate) fn set_temperature(&mut self, temperature: f64) -> Result<()> {
        check_temperature(temperature)?;
        self.temperature = temperature;
        Ok(())
    }

    pub(crate) fn set_irradiance(&mut self, irradiance: f64) -> Result<()> {
        check_irradiance(irradiance)?;
        self.irradiance = irradiance;
        Ok(())
    }

    /// Mark as hotspot at `temperature`, derating irradiance against the module.
    pub(crate) fn set_hotspot(&mut self, temperature: f64, module_temperature: f64, module_irradiance: f64) -> Result<()> {
        check_temperature(temperature)?;
        let isc = self.estimator.datasheet().isc();
        let irradiance = hotspot_irradiance(temperature, module_temperature, module_irradiance, isc)?;
        self.temperature = temperature;
        self.irradiance = irradiance;
        self.hotspot = true;
        Ok(())
    }

    pub(crate) fn clear_hotspot(&mut self) {
        self.hotspot = false;
    }

    pub(crate) fn set_pid_defect(&mut self, defect: bool) {
        self.pid_defect = defect;
    }
}

/// Effective irradiance of a hotspot cell.
///
/// `G = G_module * (1 - sqrt((T_hot - T_module) / 300) / Isc)`. A hotspot
/// cooler than its module gets the module irradiance, and the result never
/// drops below zero.
pub fn hotspot_irradiance(temperature: f64, module_temperature: f64, module_irradiance: f64, isc: f64) -> Result<f64> {
    if !(isc.is_finite() && isc > 0.0) {
        return Err(PvError::datasheet("isc", "hotspot derating needs a positive short-circuit current"));
    }
    let excess = (temperature - module_temperature).max(0.0);
    let derate = (excess / HOTSPOT_DERATING).sqrt() / isc;
    Ok((module_irradiance * (1.0 - derate)).max(0.0))
}

fn check_finite(what: &str, value: f64) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(PvError::InvalidParameter {
            param: what.to_string(),
            message: "value must be finite".to_string(),
        })
    }
}

pub(crate) fn check_irradiance(value: f64) -> Result<()> {
    check_finite("irradiance", value)?;
    if value < 0.0 {
        return Err(PvError::InvalidParameter {
            param: "irradiance".to_string(),
            message: "irradiance cannot be negative".to_string(),
        });
    }
    Ok(())
}

pub(crate) fn check_temperature(value: f64) -> Result<()> {
    check_finite("temperature", value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_hotspot_derates_irradiance() {
        // 75 K excess -> sqrt(0.25) = 0.5, divided by Isc 2.0 -> 25 % loss
        let g = hotspot_irradiance(100.0, 25.0, 1000.0, 2.0).unwrap();
        assert_relative_eq!(g, 750.0, epsilon = 1e-9);
    }

    #[test]
    fn test_cool_hotspot_keeps_module_irradiance() {
        let g = hotspot_irradiance(10.0, 25.0, 800.0, 3.45).unwrap();
        assert_relative_eq!(g, 800.0);
    }

    #[test]
    fn test_hotspot_never_negative() {
        let g = hotspot_irradiance(1000.0, 25.0, 1000.0, 0.5).unwrap();
        assert_eq!(g, 0.0);
    }

    #[test]
    fn test_hotspot_guards_zero_isc() {
        assert!(hotspot_irradiance(80.0, 25.0, 1000.0, 0.0).is_err());
    }
}
