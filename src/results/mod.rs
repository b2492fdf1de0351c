//! Simulator output: parsing and post-processing.
//!
//! [`parse_raw`] reads an LTspice ASCII raw file and sorts its variables
//! into the bias sweep, the grid current and the optional string and bypass
//! probes written by the netlist builder.

mod probes;
mod rawfile;

use std::path::Path;

use tracing::debug;

pub use probes::{ProbeKind, ProbeSeries, Unit, COLOR_CYCLE};
pub use rawfile::{parse_table, RawTable, RawVariable, SIMULATOR_MARKER};

use crate::error::{PvError, Result};

/// Classified series from one simulation run.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeSet {
    /// Swept bias voltage, the X axis of every other series
    pub bias_voltage: ProbeSeries,
    /// Current through the bias source ("Grid")
    pub bias_current: ProbeSeries,
    /// String currents in file order
    pub strings: Vec<ProbeSeries>,
    /// Bypass diode currents in file order
    pub bypasses: Vec<ProbeSeries>,
}

/// Operating point of maximum power on a swept series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaxPowerPoint {
    /// Sweep index
    pub index: usize,
    /// Bias voltage (V)
    pub voltage: f64,
    /// Current (A)
    pub current: f64,
    /// Power (W)
    pub power: f64,
}

impl ProbeSet {
    fn from_table(table: RawTable) -> Result<Self> {
        let mut bias_voltage = None;
        let mut bias_current = None;
        let mut strings = Vec::new();
        let mut bypasses = Vec::new();

        for var in table.variables {
            let Some(kind) = ProbeKind::classify(&var.name) else {
                debug!(name = %var.name, "ignoring unrecognized variable");
                continue;
            };
            let series = ProbeSeries::from_variable(kind, var);
            match kind {
                ProbeKind::GridCurrent => bias_current = Some(series),
                ProbeKind::BiasVoltage => bias_voltage = Some(series),
                ProbeKind::StringCurrent { .. } => strings.push(series),
                ProbeKind::BypassCurrent { .. } => bypasses.push(series),
            }
        }

        let mut set = Self {
            bias_voltage: bias_voltage.ok_or_else(|| PvError::format(0, "no bias voltage variable"))?,
            bias_current: bias_current.ok_or_else(|| PvError::format(0, "no bias current variable"))?,
            strings,
            bypasses,
        };
        set.assign_colors();
        Ok(set)
    }

    /// Give each current series the next color: grid, then strings, then bypasses.
    fn assign_colors(&mut self) {
        for (series, color) in self.currents_mut().zip(COLOR_CYCLE.iter().cycle()) {
            series.color = *color;
        }
    }

    fn currents_mut(&mut self) -> impl Iterator<Item = &mut ProbeSeries> {
        std::iter::once(&mut self.bias_current)
            .chain(self.strings.iter_mut())
            .chain(self.bypasses.iter_mut())
    }

    /// Current series in display order: grid, strings, bypasses.
    pub fn currents(&self) -> impl Iterator<Item = &ProbeSeries> {
        std::iter::once(&self.bias_current)
            .chain(self.strings.iter())
            .chain(self.bypasses.iter())
    }

    /// Find a current series by display name.
    pub fn find(&self, name: &str) -> Option<&ProbeSeries> {
        self.currents().find(|s| s.name == name)
    }

    /// Number of sweep points.
    pub fn points(&self) -> usize {
        self.bias_voltage.len()
    }

    /// Power drawn along the sweep for a current series.
    ///
    /// The bias source current flows into the grid, so its sign is flipped.
    pub fn power(&self, series: &ProbeSeries) -> Vec<f64> {
        let sign = if series.kind == ProbeKind::GridCurrent { -1.0 } else { 1.0 };
        self.bias_voltage
            .values
            .iter()
            .zip(&series.values)
            .map(|(v, i)| sign * v * i)
            .collect()
    }

    /// Sweep point with the highest power, or `None` for an empty sweep.
    pub fn max_power_point(&self, series: &ProbeSeries) -> Option<MaxPowerPoint> {
        let power = self.power(series);
        let (index, &p) = power
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))?;
        Some(MaxPowerPoint {
            index,
            voltage: self.bias_voltage.values[index],
            current: series.values[index],
            power: p,
        })
    }

    /// CSV table of the selected current series against the bias voltage.
    ///
    /// The header is `Bias Voltage, <name> Current, ...`; an empty selection
    /// exports every current series.
    pub fn to_csv(&self, selection: &[&str]) -> Result<String> {
        let columns: Vec<&ProbeSeries> = if selection.is_empty() {
            self.currents().collect()
        } else {
            selection
                .iter()
                .map(|name| {
                    self.find(name)
                        .ok_or_else(|| PvError::simulation_param(format!("no probe named '{}'", name)))
                })
                .collect::<Result<_>>()?
        };

        let mut out = String::from("Bias Voltage");
        for col in &columns {
            out.push_str(&format!(", {} Current", col.name));
        }
        out.push('\n');
        for (i, v) in self.bias_voltage.values.iter().enumerate() {
            out.push_str(&v.to_string());
            for col in &columns {
                out.push_str(&format!(", {}", col.values[i]));
            }
            out.push('\n');
        }
        Ok(out)
    }

    /// Write [`ProbeSet::to_csv`] output to a file.
    pub fn write_csv(&self, path: &Path, selection: &[&str]) -> Result<()> {
        let csv = self.to_csv(selection)?;
        std::fs::write(path, csv).map_err(|e| PvError::FileWriteError {
            path: path.display().to_string(),
            source: e,
        })
    }
}

/// Parse LTspice raw text into classified series.
///
/// Fails without returning partial data when the text is not LTspice
/// output, is malformed, or lacks the bias sweep or bias current.
pub fn parse_raw(text: &str) -> Result<ProbeSet> {
    let table = parse_table(text)?;
    let points = table.points;
    let set = ProbeSet::from_table(table)?;
    debug!(
        points,
        strings = set.strings.len(),
        bypasses = set.bypasses.len(),
        "raw file parsed"
    );
    Ok(set)
}

/// Read and parse a raw file.
pub fn parse_raw_file(path: &Path) -> Result<ProbeSet> {
    let text = std::fs::read_to_string(path).map_err(|e| PvError::FileReadError {
        path: path.display().to_string(),
        source: e,
    })?;
    parse_raw(&text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const HEADER: &str = "Title: * pvgrid\n\
        Date: Thu Jan 01 00:00:00 2026\n\
        Plotname: DC transfer characteristic\n\
        Flags: real forward\n";

    fn raw(vars: &[&str], values: &[&[f64]]) -> String {
        let mut text = format!(
            "{}No. Variables: {}\nNo. Points: {}\nOffset: 0.0000000000000000e+000\n\
             Command: Linear Technology Corporation LTspice XVII\nVariables:\n",
            HEADER,
            vars.len(),
            values.len()
        );
        for (i, v) in vars.iter().enumerate() {
            text.push_str(&format!("\t{}\t{}\n", i, v));
        }
        text.push_str("Values:\n");
        for (n, row) in values.iter().enumerate() {
            text.push_str(&format!("{}\t{:e}\n", n, row[0]));
            for v in &row[1..] {
                text.push_str(&format!("\t{:e}\n", v));
            }
        }
        text
    }

    #[test]
    fn test_two_variables_three_samples() {
        let text = raw(
            &["vbias voltage", "I(Vbias) device_current"],
            &[&[0.0, -3.45], &[20.0, -3.3], &[40.0, -1.0]],
        );
        let set = parse_raw(&text).unwrap();
        assert_eq!(set.bias_voltage.values, vec![0.0, 20.0, 40.0]);
        assert_eq!(set.bias_current.values, vec![-3.45, -3.3, -1.0]);
        assert_eq!(set.bias_current.name, "Grid");
        assert_eq!(set.bias_current.unit, Unit::Current);
        assert_eq!(set.bias_voltage.unit, Unit::Voltage);
        assert!(set.strings.is_empty());
        assert!(set.bypasses.is_empty());
    }

    fn full_set() -> ProbeSet {
        let text = raw(
            &[
                "vbias voltage",
                "V(vb) voltage",
                "I(Vbias) device_current",
                "I(Rprobe_S0) device_current",
                "I(Rprobe_S1) device_current",
                "I(Dbypass_S0P0N0) device_current",
                "I(Dbypass_S1P1N2) device_current",
            ],
            &[
                &[0.0, 0.0, -6.9, 3.45, 3.45, 0.0, 0.0],
                &[10.0, 10.0, -6.8, 3.4, 3.4, 0.0, 0.0],
                &[20.0, 20.0, -3.0, 2.0, 2.0, 0.0, 0.0],
            ],
        );
        parse_raw(&text).unwrap()
    }

    #[test]
    fn test_classifies_probes_and_drops_unknown() {
        let set = full_set();
        assert_eq!(set.points(), 3);
        let names: Vec<&str> = set.currents().map(|s| s.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["Grid", "String n°0", "String n°1", "Bypass N°0 from S.0,P.0", "Bypass N°2 from S.1,P.1"]
        );
        assert_eq!(set.strings[1].values, vec![3.45, 3.4, 2.0]);
    }

    #[test]
    fn test_color_cycle_order() {
        let set = full_set();
        let colors: Vec<char> = set.currents().map(|s| s.color).collect();
        assert_eq!(colors, vec!['r', 'b', 'y', 'g', 'm']);
    }

    #[test]
    fn test_max_power_point() {
        let set = full_set();
        let mpp = set.max_power_point(&set.bias_current).unwrap();
        assert_eq!(mpp.index, 1);
        assert_relative_eq!(mpp.power, 68.0, epsilon = 1e-9);
        assert_relative_eq!(mpp.voltage, 10.0);

        let string = set.find("String n°0").unwrap();
        let power = set.power(string);
        assert_relative_eq!(power[2], 40.0, epsilon = 1e-9);
    }

    #[test]
    fn test_csv_export() {
        let set = full_set();
        let csv = set.to_csv(&["Grid", "String n°1"]).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "Bias Voltage, Grid Current, String n°1 Current");
        assert_eq!(lines[1], "0, -6.9, 3.45");
        assert_eq!(lines.len(), 4);

        assert!(set.to_csv(&["String n°9"]).is_err());
        let all = set.to_csv(&[]).unwrap();
        assert!(all.starts_with("Bias Voltage, Grid Current, String n°0 Current"));
    }

    #[test]
    fn test_missing_bias_current_fails() {
        let text = raw(&["vbias voltage", "I(Rprobe_S0) device_current"], &[&[0.0, 1.0]]);
        assert!(matches!(parse_raw(&text), Err(PvError::FormatError { .. })));
    }
}
