//! Fitted parameter state, temperature extrapolation and the shared handle.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use tracing::trace;

use super::datasheet::DatasheetSpec;
use super::fit::{gauss_seidel, saturation_current, FitState};
use super::{celsius_to_kelvin, EstimatorConfig, BOLTZMANN, ELECTRON_CHARGE, STC_TEMPERATURE};
use crate::error::{PvError, Result};

/// Single-diode parameters valid at one temperature.
///
/// Handed out behind an `Rc`, so callers share one immutable value per
/// cached temperature.
#[derive(Debug, Clone, PartialEq)]
pub struct EquivalentCircuitParams {
    /// Saturation current (A)
    pub i0: f64,
    /// Photocurrent (A)
    pub iph: f64,
    /// Module series resistance (Ω)
    pub rs: f64,
    /// Module shunt resistance used for simulation (Ω)
    pub rsh: f64,
    /// Diode ideality factor
    pub a: f64,
    /// Absolute temperature these values were computed for (K)
    pub temperature: f64,
    /// Open-circuit voltage at this temperature (V)
    pub voc: f64,
    /// Short-circuit current at this temperature (A)
    pub isc: f64,
}

/// How the base parameters were obtained.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FitMode {
    /// Produced by the Gauss–Seidel routine.
    Fitted { iterations: usize, converged: bool },
    /// Entered by hand; no convergence history.
    Manual,
}

/// Summary of a fit, returned to the caller instead of a side channel.
#[derive(Debug, Clone)]
pub struct FitReport {
    /// Rounds the iteration ran
    pub iterations: usize,
    /// False when the ceiling was reached and the last iterate was accepted
    pub converged: bool,
    /// Shunt resistance from the iteration itself (diagnostic)
    pub rsh_iterated: f64,
    /// Parameters at 25 °C
    pub parameters: Rc<EquivalentCircuitParams>,
}

/// Base parameters at the reference temperature.
#[derive(Debug, Clone, Copy)]
struct BaseState {
    i0: f64,
    iph: f64,
    rs: f64,
    rsh: f64,
    rsh_mpp: f64,
    vt: f64,
}

impl From<&FitState> for BaseState {
    fn from(s: &FitState) -> Self {
        Self {
            i0: s.i0,
            iph: s.iph,
            rs: s.rs,
            rsh: s.rsh,
            rsh_mpp: s.rsh_mpp,
            vt: s.vt,
        }
    }
}

/// Estimator of single-diode parameters for one module type.
#[derive(Debug)]
pub struct ParameterEstimator {
    datasheet: DatasheetSpec,
    config: EstimatorConfig,
    base: BaseState,
    mode: FitMode,
    /// Memoized shifts keyed by rounded Kelvin
    cache: HashMap<i64, Rc<EquivalentCircuitParams>>,
}

impl ParameterEstimator {
    /// Fit the parameters of a datasheet with the default configuration.
    pub fn fit(datasheet: DatasheetSpec) -> Result<Self> {
        Self::fit_with_config(datasheet, EstimatorConfig::default())
    }

    /// Fit the parameters of a datasheet with a custom configuration.
    pub fn fit_with_config(datasheet: DatasheetSpec, config: EstimatorConfig) -> Result<Self> {
        let state = gauss_seidel(&datasheet, &config)?;
        Ok(Self {
            datasheet,
            config,
            base: BaseState::from(&state),
            mode: FitMode::Fitted {
                iterations: state.iterations,
                converged: state.converged,
            },
            cache: HashMap::new(),
        })
    }

    /// Re-run the fit from the stored datasheet, discarding manual values.
    ///
    /// On error the previous state is kept.
    pub fn refit(&mut self) -> Result<FitReport> {
        let state = gauss_seidel(&self.datasheet, &self.config)?;
        self.base = BaseState::from(&state);
        self.mode = FitMode::Fitted {
            iterations: state.iterations,
            converged: state.converged,
        };
        self.cache.clear();
        Ok(self.fitted_report(state.iterations, state.converged))
    }

    /// Replace the fitted parameters with hand-entered values.
    ///
    /// Clears the temperature cache; while manual values are active nothing
    /// is memoized.
    pub fn set_manually(&mut self, i0: f64, iph: f64, rs: f64, rsh: f64, a: f64) -> Result<()> {
        for (param, value) in [("i0", i0), ("iph", iph), ("rs", rs), ("rsh", rsh), ("a", a)] {
            if !value.is_finite() {
                return Err(PvError::InvalidParameter {
                    param: param.to_string(),
                    message: "value must be finite".to_string(),
                });
            }
        }
        if rs < 0.0 {
            return Err(PvError::InvalidParameter {
                param: "rs".to_string(),
                message: "series resistance cannot be negative".to_string(),
            });
        }
        for (param, value) in [("rsh", rsh), ("a", a), ("i0", i0)] {
            if value <= 0.0 {
                return Err(PvError::InvalidParameter {
                    param: param.to_string(),
                    message: "value must be positive".to_string(),
                });
            }
        }

        let tref = self.reference_temperature();
        self.base = BaseState {
            i0,
            iph,
            rs,
            rsh,
            rsh_mpp: rsh,
            vt: a * BOLTZMANN * tref / ELECTRON_CHARGE,
        };
        self.mode = FitMode::Manual;
        self.cache.clear();
        Ok(())
    }

    /// Parameters at a cell temperature in °C.
    ///
    /// Fitted parameters are memoized per rounded Kelvin: repeated queries
    /// return the same `Rc`. A non-finite temperature is computed but never
    /// cached.
    pub fn parameters_at(&mut self, temp_celsius: f64) -> Rc<EquivalentCircuitParams> {
        let temperature = celsius_to_kelvin(temp_celsius);
        if self.mode == FitMode::Manual || !temperature.is_finite() {
            return Rc::new(self.extrapolate(temperature));
        }

        let key = temperature.round() as i64;
        if let Some(hit) = self.cache.get(&key) {
            trace!(key, "parameter cache hit");
            return Rc::clone(hit);
        }

        trace!(key, "parameter cache miss");
        let params = Rc::new(self.extrapolate(temperature));
        self.cache.insert(key, Rc::clone(&params));
        params
    }

    /// Shift the base parameters to an absolute temperature.
    fn extrapolate(&self, temperature: f64) -> EquivalentCircuitParams {
        let sheet = &self.datasheet;
        let b = &self.base;
        let ns = sheet.ns() as f64;
        let tref = self.reference_temperature();
        let delta = temperature - tref;

        let vt = b.vt * temperature / tref;
        let iph = b.iph + sheet.ki() * delta;
        let voc = sheet.voc() + sheet.kv() * delta;
        let isc = sheet.isc() + sheet.ki() * delta;

        let i0 = match self.mode {
            FitMode::Fitted { .. } => saturation_current(voc, isc, b.rs, b.rsh, ns, vt),
            FitMode::Manual => {
                let at_t = saturation_current(voc, isc, b.rs, b.rsh, ns, vt);
                let at_ref = saturation_current(sheet.voc(), sheet.isc(), b.rs, b.rsh, ns, b.vt);
                let ratio = at_t / at_ref;
                if ratio.is_finite() && ratio > 0.0 {
                    b.i0 * ratio
                } else {
                    b.i0
                }
            }
        };

        EquivalentCircuitParams {
            i0,
            iph,
            rs: b.rs,
            rsh: b.rsh_mpp,
            a: vt * ELECTRON_CHARGE / (BOLTZMANN * tref),
            temperature,
            voc,
            isc,
        }
    }

    /// Fit summary, or `None` while manual values are active.
    pub fn report(&mut self) -> Option<FitReport> {
        match self.mode {
            FitMode::Fitted {
                iterations,
                converged,
            } => Some(self.fitted_report(iterations, converged)),
            FitMode::Manual => None,
        }
    }

    fn fitted_report(&mut self, iterations: usize, converged: bool) -> FitReport {
        FitReport {
            iterations,
            converged,
            rsh_iterated: self.base.rsh,
            parameters: self.parameters_at(STC_TEMPERATURE),
        }
    }

    /// The datasheet this estimator was built from.
    pub fn datasheet(&self) -> &DatasheetSpec {
        &self.datasheet
    }

    /// How the current parameters were obtained.
    pub fn mode(&self) -> FitMode {
        self.mode
    }

    /// Thermal voltage at the reference temperature (V).
    pub fn thermal_voltage(&self) -> f64 {
        self.base.vt
    }

    /// Number of memoized temperatures.
    pub fn cached_temperatures(&self) -> usize {
        self.cache.len()
    }

    fn reference_temperature(&self) -> f64 {
        celsius_to_kelvin(STC_TEMPERATURE)
    }
}

/// Reference-counted handle to one estimator shared by every cell of a grid.
///
/// A refit or manual override through any clone is visible to all holders.
#[derive(Debug, Clone)]
pub struct SharedEstimator(Rc<RefCell<ParameterEstimator>>);

impl SharedEstimator {
    /// Wrap an estimator for sharing.
    pub fn new(estimator: ParameterEstimator) -> Self {
        Self(Rc::new(RefCell::new(estimator)))
    }

    /// Fit a datasheet and wrap the result.
    pub fn fit(datasheet: DatasheetSpec) -> Result<Self> {
        ParameterEstimator::fit(datasheet).map(Self::new)
    }

    /// Parameters at a temperature in °C.
    pub fn parameters_at(&self, temp_celsius: f64) -> Rc<EquivalentCircuitParams> {
        self.0.borrow_mut().parameters_at(temp_celsius)
    }

    /// Override the parameters for every holder.
    pub fn set_manually(&self, i0: f64, iph: f64, rs: f64, rsh: f64, a: f64) -> Result<()> {
        self.0.borrow_mut().set_manually(i0, iph, rs, rsh, a)
    }

    /// Refit for every holder.
    pub fn refit(&self) -> Result<FitReport> {
        self.0.borrow_mut().refit()
    }

    /// Fit summary, `None` in manual mode.
    pub fn report(&self) -> Option<FitReport> {
        self.0.borrow_mut().report()
    }

    /// Copy of the datasheet.
    pub fn datasheet(&self) -> DatasheetSpec {
        *self.0.borrow().datasheet()
    }

    /// How the shared parameters were obtained.
    pub fn mode(&self) -> FitMode {
        self.0.borrow().mode()
    }

    /// Thermal voltage at the reference temperature (V).
    pub fn thermal_voltage(&self) -> f64 {
        self.0.borrow().thermal_voltage()
    }

    /// Number of memoized temperatures.
    pub fn cached_temperatures(&self) -> usize {
        self.0.borrow().cached_temperatures()
    }

    /// Whether two handles refer to the same estimator.
    pub fn same_source(&self, other: &SharedEstimator) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}
