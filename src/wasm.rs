//! WASM bindings for PVSpice Core.
//!
//! This module provides JavaScript-friendly bindings for building grids and
//! netlists in the browser and reading results back.
//!
//! ## Usage (JavaScript)
//!
//! ```javascript
//! import init, { WasmPvGrid, parse_raw_csv } from 'pvspice_core';
//!
//! await init();
//!
//! const grid = new WasmPvGrid(43.5, 3.45, 35.0, 3.15, -0.152, 0.0014, 72, 2, 1);
//! grid.set_temperature(45);
//! grid.add_bypass(0, 35);
//! grid.add_bypass(36, 71);
//! const netlist = grid.render_netlist(true, true);
//!
//! // After running LTspice on the netlist:
//! const csv = parse_raw_csv(rawText);
//! ```

use wasm_bindgen::prelude::*;

use crate::circuit::{BypassLayout, Grid};
use crate::estimator::{DatasheetSpec, SharedEstimator};
use crate::netlist::{NetlistBuilder, NetlistOptions};
use crate::results::parse_raw;

fn js_err(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}

/// Initialize panic hook for better error messages in browser console.
#[wasm_bindgen(start)]
pub fn init_panic_hook() {
    console_error_panic_hook::set_once();
}

/// WASM-compatible PV grid.
///
/// Wraps a [`Grid`] and the bypass layout shared by all of its modules.
#[wasm_bindgen]
pub struct WasmPvGrid {
    grid: Grid,
    layout: BypassLayout,
}

#[wasm_bindgen]
impl WasmPvGrid {
    /// Fit the datasheet and build an `nserie` x `nparallel` grid at STC.
    ///
    /// # Example
    /// ```javascript
    /// const grid = new WasmPvGrid(43.5, 3.45, 35.0, 3.15, -0.152, 0.0014, 72, 1, 1);
    /// ```
    #[wasm_bindgen(constructor)]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        voc: f64,
        isc: f64,
        vmp: f64,
        imp: f64,
        kv: f64,
        ki: f64,
        ns: usize,
        nserie: usize,
        nparallel: usize,
    ) -> Result<WasmPvGrid, JsValue> {
        let sheet = DatasheetSpec::new(voc, isc, vmp, imp, kv, ki, ns).map_err(js_err)?;
        let estimator = SharedEstimator::fit(sheet).map_err(js_err)?;
        let grid = Grid::new(nserie, nparallel, estimator).map_err(js_err)?;
        Ok(WasmPvGrid {
            grid,
            layout: BypassLayout::new(ns),
        })
    }

    /// Set the temperature of every cell and bypass diode (°C).
    #[wasm_bindgen]
    pub fn set_temperature(&mut self, temperature: f64) -> Result<(), JsValue> {
        self.grid.set_temperature(temperature).map_err(js_err)
    }

    /// Set the irradiance of every cell (W/m²).
    #[wasm_bindgen]
    pub fn set_irradiance(&mut self, irradiance: f64) -> Result<(), JsValue> {
        self.grid.set_irradiance(irradiance).map_err(js_err)
    }

    /// Set one module's temperature (°C).
    #[wasm_bindgen]
    pub fn set_module_temperature(&mut self, string: usize, module: usize, temperature: f64) -> Result<(), JsValue> {
        self.grid.set_module_temperature(string, module, temperature).map_err(js_err)
    }

    /// Set one module's irradiance (W/m²).
    #[wasm_bindgen]
    pub fn set_module_irradiance(&mut self, string: usize, module: usize, irradiance: f64) -> Result<(), JsValue> {
        self.grid.set_module_irradiance(string, module, irradiance).map_err(js_err)
    }

    /// Place a bypass diode over cells `anode..=cathode` of every module.
    ///
    /// An invalid span is rejected and the current layout is kept.
    #[wasm_bindgen]
    pub fn add_bypass(&mut self, anode: usize, cathode: usize) -> Result<(), JsValue> {
        let mut layout = self.layout.clone();
        layout.insert(anode, cathode).map_err(js_err)?;
        self.grid.set_bypass_layout(&layout).map_err(js_err)?;
        self.layout = layout;
        Ok(())
    }

    /// Remove the bypass diode covering `cell`, if any.
    #[wasm_bindgen]
    pub fn remove_bypass(&mut self, cell: usize) -> Result<bool, JsValue> {
        let mut layout = self.layout.clone();
        if layout.remove_covering(cell).is_none() {
            return Ok(false);
        }
        self.grid.set_bypass_layout(&layout).map_err(js_err)?;
        self.layout = layout;
        Ok(true)
    }

    /// Number of bypass diodes per module.
    #[wasm_bindgen(getter)]
    pub fn bypass_count(&self) -> usize {
        self.layout.len()
    }

    /// Render the netlist with the default sweep.
    #[wasm_bindgen]
    pub fn render_netlist(&self, probe_strings: bool, probe_bypass: bool) -> Result<String, JsValue> {
        let options = NetlistOptions::for_grid(&self.grid)
            .with_string_probes(probe_strings)
            .with_bypass_probes(probe_bypass);
        self.render_with(options)
    }

    /// Render the netlist with an explicit sweep.
    #[wasm_bindgen]
    pub fn render_netlist_sweep(
        &self,
        upper_bound: f64,
        step: f64,
        probe_strings: bool,
        probe_bypass: bool,
    ) -> Result<String, JsValue> {
        let options = NetlistOptions::new(upper_bound, step)
            .with_string_probes(probe_strings)
            .with_bypass_probes(probe_bypass);
        self.render_with(options)
    }
}

impl WasmPvGrid {
    fn render_with(&self, options: NetlistOptions) -> Result<String, JsValue> {
        let doc = NetlistBuilder::new(options).render(&self.grid).map_err(js_err)?;
        Ok(doc.to_string())
    }
}

/// Parse LTspice raw text and return every current series as CSV.
#[wasm_bindgen]
pub fn parse_raw_csv(raw_text: &str) -> Result<String, JsValue> {
    let set = parse_raw(raw_text).map_err(js_err)?;
    set.to_csv(&[]).map_err(js_err)
}

/// Get the library version.
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
