//! Netlist assembly from a grid.

use tracing::debug;

use super::{
    NetlistDocument, NetlistOptions, BIAS_SOURCE, BYPASS_MODEL_NAME, BYPASS_MODEL_PARAMS, CELL_SUBCIRCUIT,
    GENERATOR_NAME, PROBE_RESISTANCE, SIMULATION_TEMPERATURE,
};
use crate::circuit::{validate_grid, BypassDiode, Cell, Grid, Module};
use crate::error::Result;

/// Writes a [`Grid`] out as simulator input.
#[derive(Debug, Clone)]
pub struct NetlistBuilder {
    options: NetlistOptions,
}

impl NetlistBuilder {
    /// Create a builder for the given sweep and probe settings.
    pub fn new(options: NetlistOptions) -> Self {
        Self { options }
    }

    /// Options this builder renders with.
    pub fn options(&self) -> &NetlistOptions {
        &self.options
    }

    /// Render the grid.
    ///
    /// Output depends only on the grid state and the options; rendering the
    /// same grid twice gives identical text.
    pub fn render(&self, grid: &Grid) -> Result<NetlistDocument> {
        self.options.validate()?;
        validate_grid(grid)?;

        let doc = NetlistDocument {
            header: self.header(),
            components: self.components(grid),
            directives: self.directives(),
        };

        debug!(
            cells = grid.cells().count(),
            components = doc.components.len(),
            "netlist rendered"
        );
        Ok(doc)
    }

    fn header(&self) -> Vec<String> {
        vec![
            format!("* This file was generated by the simulation tool {}", GENERATOR_NAME),
            format!("* File name: {}", self.options.title),
            "*   The circuit temperature config from LTspice is always set to 25° since the temperature effects"
                .to_string(),
            "*  have already been taken into account during the parameters generation.".to_string(),
            String::new(),
            format!(".include {}", self.options.library),
        ]
    }

    fn components(&self, grid: &Grid) -> Vec<String> {
        let mut lines = Vec::new();

        for (s, string) in grid.strings().enumerate() {
            lines.push(format!(
                "rprobe_S{} {} {} {}",
                s,
                grid.negative_rail(),
                string[0].terminals().entry,
                PROBE_RESISTANCE
            ));
            if self.options.probe_strings {
                lines.push(format!(".probe I(rprobe_S{})", s));
            }
            for module in string {
                self.module_lines(module, &mut lines);
            }
            lines.push(String::new());
        }

        lines.push(format!("{} {} {} 0", BIAS_SOURCE, grid.positive_rail(), grid.negative_rail()));
        lines
    }

    fn module_lines(&self, module: &Module, lines: &mut Vec<String>) {
        let ns = module.cells().len() as f64;
        for cell in module.cells() {
            lines.push(cell_line(cell, ns));
        }
        for diode in module.bypass_diodes() {
            let name = bypass_name(module, &diode);
            lines.push(format!(
                "{} {} {} {} temp={}",
                name, diode.terminals.entry, diode.terminals.exit, BYPASS_MODEL_NAME, diode.temperature
            ));
            if self.options.probe_bypass {
                lines.push(format!(".probe I({})", name));
            }
        }
    }

    fn directives(&self) -> Vec<String> {
        vec![
            format!(".temp {}", SIMULATION_TEMPERATURE),
            format!(".model {} {}", BYPASS_MODEL_NAME, BYPASS_MODEL_PARAMS),
            ".probe I(Vbias)".to_string(),
            format!(".dc {} 0 {} {}", BIAS_SOURCE, self.options.upper_bound, self.options.step),
        ]
    }
}

/// Subcircuit instance of one cell; module resistances are split over `ns` cells.
fn cell_line(cell: &Cell, ns: f64) -> String {
    let p = cell.parameters();
    let t = cell.terminals();
    format!(
        "xcell{} {} {} {} params: irrad={} i0={} iph={} rs={} rsh={} a={} ktq=1.0 ns=1.0",
        cell.name(),
        t.entry,
        t.exit,
        CELL_SUBCIRCUIT,
        cell.irradiance(),
        p.i0,
        p.iph,
        p.rs / ns,
        p.rsh / ns,
        p.a
    )
}

fn bypass_name(module: &Module, diode: &BypassDiode) -> String {
    format!("dbypass_S{}P{}N{}", module.string(), module.index(), diode.index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::BypassLayout;
    use crate::estimator::{DatasheetSpec, FitMode, SharedEstimator};

    fn grid(nserie: usize, nparallel: usize) -> Grid {
        let sheet = DatasheetSpec::new(21.6, 5.0, 17.4, 4.6, -0.08, 0.003, 36).unwrap();
        Grid::new(nserie, nparallel, SharedEstimator::fit(sheet).unwrap()).unwrap()
    }

    #[test]
    fn test_render_is_deterministic() {
        let mut g = grid(2, 2);
        g.set_bypass_layout(&BypassLayout::from_spans(36, &[(0, 11), (12, 23), (24, 35)]).unwrap())
            .unwrap();
        g.set_module_temperature(1, 0, 48.0).unwrap();
        let builder = NetlistBuilder::new(NetlistOptions::for_grid(&g));

        let first = builder.render(&g).unwrap().to_string();
        let second = builder.render(&g).unwrap().to_string();
        assert_eq!(first, second);
    }

    #[test]
    fn test_section_order() {
        let g = grid(1, 1);
        let lines = NetlistBuilder::new(NetlistOptions::new(10.0, 0.1)).render(&g).unwrap().lines();
        assert!(lines[0].starts_with("* This file was generated"));
        assert_eq!(lines[5], ".include cell_component_py.lib");
        assert_eq!(lines[6], "");
        assert_eq!(lines[7], "rprobe_S0 0 Grid_0_0 0.000001");
        assert_eq!(lines[8], ".probe I(rprobe_S0)");
        assert!(lines[9].starts_with("xcellS0P0N0 Grid_0_0 S0P0N1 cell_py params: irrad=1000 "));

        let n = lines.len();
        assert_eq!(lines[n - 6], "");
        assert_eq!(lines[n - 5], ".temp 25");
        assert!(lines[n - 4].starts_with(".model Dbypass D(IS=3.47597e-05"));
        assert_eq!(lines[n - 3], ".probe I(Vbias)");
        assert_eq!(lines[n - 2], ".dc vbias 0 10 0.1");
        assert_eq!(lines[n - 1], ".end");
    }

    #[test]
    fn test_cell_line_uses_per_cell_resistances() {
        let g = grid(1, 1);
        let cell = g.cell(0, 0, 7).unwrap();
        let p = cell.parameters();
        let line = cell_line(cell, 36.0);
        assert!(line.contains(&format!(" rs={} ", p.rs / 36.0)));
        assert!(line.contains(&format!(" rsh={} ", p.rsh / 36.0)));
        assert!(line.starts_with("xcellS0P0N7 S0P0N7 S0P0N8 "));
    }

    #[test]
    fn test_bypass_lines_and_probes() {
        let mut g = grid(2, 1);
        g.set_bypass_layout(&BypassLayout::from_spans(36, &[(0, 17), (18, 35)]).unwrap())
            .unwrap();
        g.set_bypass_temperature(0, 1, 1, 70.0).unwrap();

        let doc = NetlistBuilder::new(NetlistOptions::new(50.0, 0.5)).render(&g).unwrap();
        let bypass: Vec<_> = doc.components.iter().filter(|l| l.starts_with("dbypass_")).collect();
        assert_eq!(bypass.len(), 4);
        assert_eq!(bypass[0], "dbypass_S0P0N0 Grid_0_0 S0P0N18 Dbypass temp=25");
        assert_eq!(bypass[3], "dbypass_S0P1N1 S0P1N18 Vb Dbypass temp=70");
        assert!(doc.components.contains(&".probe I(dbypass_S0P1N1)".to_string()));

        let quiet = NetlistBuilder::new(NetlistOptions::new(50.0, 0.5).with_bypass_probes(false))
            .render(&g)
            .unwrap();
        assert!(!quiet.components.iter().any(|l| l.starts_with(".probe I(dbypass")));
    }

    #[test]
    fn test_strings_join_rails() {
        let g = grid(1, 3);
        let doc = NetlistBuilder::new(NetlistOptions::new(25.0, 0.25).with_string_probes(false))
            .render(&g)
            .unwrap();
        for s in 0..3 {
            assert!(doc.components.contains(&format!("rprobe_S{} 0 Grid_{}_0 0.000001", s, s)));
        }
        assert!(!doc.components.iter().any(|l| l.starts_with(".probe I(rprobe")));
        assert_eq!(doc.components.last().unwrap(), "vbias Vb 0 0");
    }

    #[test]
    fn test_single_module_counts() {
        let sheet = DatasheetSpec::new(43.5, 3.45, 35.0, 3.15, -0.152, 0.0014, 72).unwrap();
        let g = Grid::new(1, 1, SharedEstimator::fit(sheet).unwrap()).unwrap();
        let lines = NetlistBuilder::new(NetlistOptions::for_grid(&g)).render(&g).unwrap().lines();

        let count = |prefix: &str| lines.iter().filter(|l| l.starts_with(prefix)).count();
        assert_eq!(count("vbias "), 1);
        assert_eq!(count("xcell"), 72);
        assert_eq!(count("rprobe_"), 1);
        assert_eq!(count("dbypass_"), 0);
        assert_eq!(lines.last().unwrap(), ".end");
        assert!(lines.iter().any(|l| l.starts_with("xcellS0P0N71 S0P0N71 Vb ")));
    }

    #[test]
    fn test_render_after_estimator_inspection() {
        let g = grid(1, 1);
        let estimator = g.estimator().clone();
        assert!(matches!(estimator.mode(), FitMode::Fitted { .. }));
        assert!(estimator.thermal_voltage() > 0.0);

        let doc = crate::netlist::render(&g, 22.6, 0.226, true, true).unwrap();
        assert_eq!(doc.components.iter().filter(|l| l.starts_with("xcell")).count(), 36);
        // Every cell sits at 25 °C, one cached entry
        assert_eq!(estimator.cached_temperatures(), 1);
    }

    #[test]
    fn test_rejects_bad_sweep() {
        let g = grid(1, 1);
        assert!(NetlistBuilder::new(NetlistOptions::new(0.0, 0.1)).render(&g).is_err());
        assert!(NetlistBuilder::new(NetlistOptions::new(10.0, -0.1)).render(&g).is_err());
        assert!(NetlistBuilder::new(NetlistOptions::new(10.0, 20.0)).render(&g).is_err());
    }
}
