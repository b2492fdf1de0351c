//! Gauss–Seidel fixed-point fit of the single-diode model.
//!
//! The module equation is
//!   I = Iph - I0 * (exp((V + Rs*I) / (Ns*Vt)) - 1) - (V + Rs*I) / Rsh
//!
//! Evaluating it at open circuit, short circuit and the maximum power point
//! gives three equations that can each be solved in closed form for one of
//! Vt, Rs and Rsh. Sweeping them in a fixed order converges to the common
//! solution for well-conditioned datasheets (Shongwe & Hanif).

use tracing::{debug, info, warn};

use super::datasheet::DatasheetSpec;
use super::EstimatorConfig;
use crate::error::{PvError, Result};

/// Operating point the closed forms are evaluated at.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Ratings {
    pub voc: f64,
    pub isc: f64,
    pub vmp: f64,
    pub imp: f64,
    pub ns: f64,
}

impl From<&DatasheetSpec> for Ratings {
    fn from(sheet: &DatasheetSpec) -> Self {
        Self {
            voc: sheet.voc(),
            isc: sheet.isc(),
            vmp: sheet.vmp(),
            imp: sheet.imp(),
            ns: sheet.ns() as f64,
        }
    }
}

/// Thermal voltage from the max-power and open-circuit points.
///
/// Returns `None` when the logarithm argument is not positive.
pub(crate) fn thermal_voltage(r: &Ratings, rs: f64, rsh: f64) -> Option<f64> {
    let base = r.isc * rsh + r.isc * rs - r.voc;
    let arg = (base - r.vmp - r.imp * rs - r.imp * rsh) / base;
    if !(arg > 0.0) {
        return None;
    }
    let vt = (r.vmp + r.imp * rs - r.voc) / (r.ns * arg.ln());
    vt.is_finite().then_some(vt)
}

/// Series resistance from the max-power point.
pub(crate) fn series_resistance(r: &Ratings, rs: f64, rsh: f64, vt: f64) -> f64 {
    let nvt = r.ns * vt;
    let num = nvt * rsh * r.imp - nvt * r.vmp + nvt * r.imp * rs;
    let den = r.vmp * r.isc * rsh + r.vmp * r.isc * rs - r.vmp * r.voc + r.imp * rs * r.voc
        - r.imp * rs * r.isc * rs
        - r.imp * rs * rsh * r.isc;
    (r.voc - r.vmp + nvt * (num / den).ln()) / r.imp
}

/// Shunt resistance from the short-circuit point.
pub(crate) fn shunt_resistance(r: &Ratings, rs: f64, rsh: f64, vt: f64) -> f64 {
    let nvt = r.ns * vt;
    let e = ((r.isc * rs - r.voc) / nvt).exp();
    (nvt * rsh + (rs * r.isc * rsh + rs * r.isc * rs - rs * r.voc) * e + nvt * rs)
        / ((r.isc * rsh + r.isc * rs - r.voc) * e + nvt)
}

/// Diode saturation current.
pub(crate) fn saturation_current(voc: f64, isc: f64, rs: f64, rsh: f64, ns: f64, vt: f64) -> f64 {
    (isc * rsh + isc * rs - voc) / (rsh * (voc / (ns * vt)).exp())
}

/// Photocurrent from the open-circuit condition.
pub(crate) fn photocurrent(voc: f64, rsh: f64, ns: f64, vt: f64, i0: f64) -> f64 {
    i0 * ((voc / (ns * vt)).exp() - 1.0) + voc / rsh
}

/// Shunt resistance re-derived from the maximum power point.
pub(crate) fn shunt_from_max_power(r: &Ratings, rs: f64, vt: f64, i0: f64, iph: f64) -> f64 {
    let pmax = r.vmp * r.imp;
    let d = r.vmp * iph - r.vmp * i0 * ((r.vmp + r.imp * rs) / (r.ns * vt)).exp() + r.vmp * i0 - pmax;
    let n = r.vmp * (r.vmp + r.imp * rs);
    n / d
}

/// Outcome of the fixed-point iteration, at the reference temperature.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitState {
    /// Saturation current (A)
    pub i0: f64,
    /// Photocurrent (A)
    pub iph: f64,
    /// Series resistance (Ω)
    pub rs: f64,
    /// Shunt resistance from the iteration (Ω), kept for diagnostics
    pub rsh: f64,
    /// Shunt resistance re-derived at the max-power point (Ω), used for simulation
    pub rsh_mpp: f64,
    /// Thermal voltage per cell (V)
    pub vt: f64,
    /// Rounds executed
    pub iterations: usize,
    /// Whether the tolerance was met before the iteration budget ran out
    pub converged: bool,
}

fn relative_change(new: f64, old: f64) -> f64 {
    if new == 0.0 {
        (new - old).abs()
    } else {
        ((new - old) / new).abs()
    }
}

/// Run the Gauss–Seidel sweep Rsh → Rs → Vt until all three settle.
pub(crate) fn gauss_seidel(sheet: &DatasheetSpec, config: &EstimatorConfig) -> Result<FitState> {
    let _span = tracing::debug_span!("gauss_seidel_fit", ns = sheet.ns()).entered();
    let r = Ratings::from(sheet);

    let mut rs = config.initial_rs;
    let mut rsh = config.initial_rsh;
    let mut vt = thermal_voltage(&r, rs, rsh).unwrap_or(config.fallback_vt);

    let (mut rs_prev, mut rsh_prev, mut vt_prev) = (rs, rsh, vt);
    let mut converged = false;
    let mut iterations = 0;

    for iter in 0..config.max_iterations {
        iterations = iter + 1;

        rsh = shunt_resistance(&r, rs, rsh, vt);
        rs = series_resistance(&r, rs, rsh, vt);
        vt = match thermal_voltage(&r, rs, rsh) {
            Some(v) => v,
            None => {
                debug!(iteration = iterations, "thermal voltage undefined, using fallback");
                config.fallback_vt
            }
        };

        if !rsh.is_finite() {
            return Err(PvError::FitDiverged { iteration: iterations, quantity: "Rsh" });
        }
        if !rs.is_finite() {
            return Err(PvError::FitDiverged { iteration: iterations, quantity: "Rs" });
        }

        let settled = relative_change(vt, vt_prev) < config.tolerance
            && relative_change(rs, rs_prev) < config.tolerance
            && relative_change(rsh, rsh_prev) < config.tolerance;
        rs_prev = rs;
        rsh_prev = rsh;
        vt_prev = vt;

        if settled {
            converged = true;
            break;
        }
    }

    let i0 = saturation_current(r.voc, r.isc, rs, rsh, r.ns, vt);
    let iph = photocurrent(r.voc, rsh, r.ns, vt, i0);
    let rsh_mpp = shunt_from_max_power(&r, rs, vt, i0, iph);

    if converged {
        info!(iterations, rs, rsh, vt, "single-diode fit converged");
    } else {
        warn!(iterations, rs, rsh, vt, "single-diode fit hit the iteration ceiling, using last iterate");
    }

    Ok(FitState {
        i0,
        iph,
        rs,
        rsh,
        rsh_mpp,
        vt,
        iterations,
        converged,
    })
}
