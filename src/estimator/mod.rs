//! Single-diode parameter estimation from datasheet ratings.
//!
//! The estimator fits the five parameters of the one-diode equivalent circuit
//! (I0, Iph, Rs, Rsh, A) at standard test conditions and extrapolates them to
//! other cell temperatures on demand:
//!
//! ```text
//! I = Iph - I0 * [exp((V + Rs*I) / (Ns*Vt)) - 1] - (V + Rs*I) / Rsh
//!     Vt = A*k*T/q
//! ```
//!
//! Temperature queries are memoized per rounded Kelvin, and every cell of a
//! grid reads through one [`SharedEstimator`].

mod datasheet;
mod fit;
mod params;

pub use datasheet::{parse_rating, DatasheetSpec};
pub use fit::FitState;
pub use params::{EquivalentCircuitParams, FitMode, FitReport, ParameterEstimator, SharedEstimator};

/// Boltzmann constant (J/K).
pub const BOLTZMANN: f64 = 1.380_648_52e-23;

/// Elementary charge (C).
pub const ELECTRON_CHARGE: f64 = 1.602_176_62e-19;

/// Offset between Celsius and Kelvin.
pub const KELVIN_OFFSET: f64 = 273.15;

/// Reference cell temperature of the datasheet ratings (°C).
pub const STC_TEMPERATURE: f64 = 25.0;

/// Reference irradiance of the datasheet ratings (W/m²).
pub const STC_IRRADIANCE: f64 = 1000.0;

/// Default iteration ceiling for the fit.
pub const DEFAULT_MAX_ITERATIONS: usize = 100_000;

/// Default relative tolerance on Vt, Rs and Rsh between rounds.
pub const DEFAULT_TOLERANCE: f64 = 1e-6;

/// Thermal voltage substituted when its closed form is undefined.
pub const FALLBACK_THERMAL_VOLTAGE: f64 = 0.032;

/// Convert a temperature in °C to K.
pub fn celsius_to_kelvin(celsius: f64) -> f64 {
    celsius + KELVIN_OFFSET
}

/// Configuration for the parameter fit.
#[derive(Debug, Clone)]
pub struct EstimatorConfig {
    /// Maximum Gauss–Seidel rounds.
    pub max_iterations: usize,
    /// Relative change below which Vt, Rs and Rsh count as settled.
    pub tolerance: f64,
    /// Starting series resistance (Ω).
    pub initial_rs: f64,
    /// Starting shunt resistance (Ω).
    pub initial_rsh: f64,
    /// Thermal voltage used for a round whose closed form is undefined (V).
    pub fallback_vt: f64,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            tolerance: DEFAULT_TOLERANCE,
            initial_rs: 0.0,
            initial_rsh: 5000.0,
            fallback_vt: FALLBACK_THERMAL_VOLTAGE,
        }
    }
}

impl EstimatorConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the iteration ceiling.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Set the convergence tolerance.
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Set the starting resistances.
    pub fn with_initial_resistances(mut self, rs: f64, rsh: f64) -> Self {
        self.initial_rs = rs;
        self.initial_rsh = rsh;
        self
    }
}
