//! Netlist generation for the external SPICE simulator.
//!
//! A rendered [`NetlistDocument`] is line-oriented and has three sections in
//! fixed order, followed by the end marker:
//!
//! ```text
//! * comment header
//! .include cell_component_py.lib
//!
//! rprobe_S0 0 Grid_0_0 0.000001            <- per string
//! .probe I(rprobe_S0)                      <- optional
//! xcellS0P0N0 Grid_0_0 S0P0N1 cell_py params: irrad=1000 i0=... ns=1.0
//! ...
//! dbypass_S0P0N0 Grid_0_0 S0P0N24 Dbypass temp=25
//! .probe I(dbypass_S0P0N0)                 <- optional
//! vbias Vb 0 0
//!
//! .temp 25
//! .model Dbypass D(...)
//! .probe I(Vbias)
//! .dc vbias 0 <upper> <step>
//! .end
//! ```
//!
//! Thermal effects are already folded into each cell's parameters, so the
//! simulator temperature is pinned to 25 °C. Bypass diodes carry their own
//! `temp=` instance parameter.

mod builder;

use std::fmt;
use std::path::Path;

pub use builder::NetlistBuilder;

use crate::circuit::Grid;
use crate::error::{PvError, Result};

/// Name of the generating tool written in the header.
pub const GENERATOR_NAME: &str = "PVPY";

/// Subcircuit library providing the `cell_py` model.
pub const DEFAULT_CELL_LIBRARY: &str = "cell_component_py.lib";

/// Subcircuit name of a PV cell.
pub const CELL_SUBCIRCUIT: &str = "cell_py";

/// Model name of the bypass diode.
pub const BYPASS_MODEL_NAME: &str = "Dbypass";

/// Schottky device parameters of the bypass diode model.
pub const BYPASS_MODEL_PARAMS: &str = "D(IS=3.47597e-05 RS=0.00960369 N=1.28962 EG=0.428428 XTI=5 BV=45 IBV=0.0002 CJO=1e-11 VJ=0.7 M=0.5 FC=0.5 TT=0 KF=0 AF=1)";

/// Series resistance inserted at each string entry for current probing (Ω).
pub const PROBE_RESISTANCE: &str = "0.000001";

/// Name of the bias voltage source.
pub const BIAS_SOURCE: &str = "vbias";

/// Simulator temperature directive value (°C).
pub const SIMULATION_TEMPERATURE: &str = "25";

/// Final line of every netlist.
pub const END_MARKER: &str = ".end";

/// Number of sweep points the default step gives.
pub const DEFAULT_SWEEP_POINTS: f64 = 100.0;

/// Sweep and probe settings for one render.
#[derive(Debug, Clone)]
pub struct NetlistOptions {
    /// Upper end of the bias voltage sweep (V)
    pub upper_bound: f64,
    /// Bias voltage step (V)
    pub step: f64,
    /// Emit a current probe per string
    pub probe_strings: bool,
    /// Emit a current probe per bypass diode
    pub probe_bypass: bool,
    /// File name recorded in the header
    pub title: String,
    /// Library that defines the cell subcircuit
    pub library: String,
}

impl NetlistOptions {
    /// Options with an explicit sweep and both probe kinds enabled.
    pub fn new(upper_bound: f64, step: f64) -> Self {
        Self {
            upper_bound,
            step,
            probe_strings: true,
            probe_bypass: true,
            title: "pvgrid".to_string(),
            library: DEFAULT_CELL_LIBRARY.to_string(),
        }
    }

    /// Sweep from 0 to `nserie * (Voc + 1)` in 100 steps.
    pub fn for_grid(grid: &Grid) -> Self {
        let upper = default_upper_bound(grid);
        Self::new(upper, upper / DEFAULT_SWEEP_POINTS)
    }

    /// Set the voltage step.
    pub fn with_step(mut self, step: f64) -> Self {
        self.step = step;
        self
    }

    /// Enable or disable string current probes.
    pub fn with_string_probes(mut self, enabled: bool) -> Self {
        self.probe_strings = enabled;
        self
    }

    /// Enable or disable bypass diode current probes.
    pub fn with_bypass_probes(mut self, enabled: bool) -> Self {
        self.probe_bypass = enabled;
        self
    }

    /// Set the file name recorded in the header.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Set the cell subcircuit library.
    pub fn with_library(mut self, library: impl Into<String>) -> Self {
        self.library = library.into();
        self
    }

    /// Check the sweep is usable.
    pub fn validate(&self) -> Result<()> {
        if !(self.upper_bound.is_finite() && self.upper_bound > 0.0) {
            return Err(PvError::simulation_param(format!(
                "sweep upper bound must be positive, got {}",
                self.upper_bound
            )));
        }
        if !(self.step.is_finite() && self.step > 0.0) {
            return Err(PvError::simulation_param(format!("sweep step must be positive, got {}", self.step)));
        }
        if self.step > self.upper_bound {
            return Err(PvError::simulation_param(format!(
                "sweep step {} exceeds upper bound {}",
                self.step, self.upper_bound
            )));
        }
        Ok(())
    }
}

/// Bias sweep upper bound that covers the open-circuit voltage of a string.
pub fn default_upper_bound(grid: &Grid) -> f64 {
    grid.nserie() as f64 * (grid.estimator().datasheet().voc() + 1.0)
}

/// Simulator input, split by section.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NetlistDocument {
    /// Comment lines and the library include
    pub header: Vec<String>,
    /// Element lines, with their inline probe directives
    pub components: Vec<String>,
    /// Analysis and model directives
    pub directives: Vec<String>,
}

impl NetlistDocument {
    /// All lines in output order, ending with the end marker.
    pub fn lines(&self) -> Vec<String> {
        let mut lines = Vec::with_capacity(self.header.len() + self.components.len() + self.directives.len() + 3);
        lines.extend(self.header.iter().cloned());
        lines.push(String::new());
        lines.extend(self.components.iter().cloned());
        lines.push(String::new());
        lines.extend(self.directives.iter().cloned());
        lines.push(END_MARKER.to_string());
        lines
    }

    /// Write the netlist to a `.cir` file.
    pub fn write_to(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_string()).map_err(|e| PvError::FileWriteError {
            path: path.display().to_string(),
            source: e,
        })
    }
}

impl fmt::Display for NetlistDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in self.lines() {
            writeln!(f, "{}", line)?;
        }
        Ok(())
    }
}

/// Render a grid with an explicit sweep and probe selection.
pub fn render(grid: &Grid, upper_bound: f64, step: f64, probe_strings: bool, probe_bypass: bool) -> Result<NetlistDocument> {
    let options = NetlistOptions::new(upper_bound, step)
        .with_string_probes(probe_strings)
        .with_bypass_probes(probe_bypass);
    NetlistBuilder::new(options).render(grid)
}
