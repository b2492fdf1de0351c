//! Reader for LTspice ASCII raw output.
//!
//! The file is a header block, a `Variables:` section and a `Values:`
//! section:
//!
//! ```text
//! Title: * pvgrid
//! Date: ...
//! Plotname: DC transfer characteristic
//! Flags: real forward
//! No. Variables: 3
//! No. Points: 90
//! Offset: 0.0000000000000000e+000
//! Command: Linear Technology Corporation LTspice XVII
//! Variables:
//!         0       vbias   voltage
//!         1       I(Vbias)        device_current
//!         2       I(Rprobe_S0)    device_current
//! Values:
//! 0       0.000000000000000e+000
//!         -3.450000000000000e+000
//!         3.450000000000000e+000
//! 1       5.000000000000000e-001
//! ...
//! ```
//!
//! A row with two tokens opens a new sample and carries the value of
//! variable 0; every following one-token row is the next variable.

use crate::error::{PvError, Result};

/// Text that identifies simulator output in the header.
pub const SIMULATOR_MARKER: &str = "LTspice";

/// A declared variable with the values read for it.
#[derive(Debug, Clone, PartialEq)]
pub struct RawVariable {
    /// Declared index
    pub index: usize,
    /// Lowercased name
    pub name: String,
    /// Lowercased kind, e.g. `voltage` or `device_current`
    pub kind: String,
    /// One value per sample
    pub values: Vec<f64>,
}

/// Parsed raw file, before probe classification.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawTable {
    /// Title line contents
    pub title: String,
    /// Analysis name
    pub plotname: String,
    /// Variables in declaration order
    pub variables: Vec<RawVariable>,
    /// Number of complete samples
    pub points: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Section {
    Header,
    Variables,
    Values,
}

/// Value after `Label:` on a header line.
fn header_field<'a>(line: &'a str, label: &str) -> Option<&'a str> {
    line.strip_prefix(label).map(str::trim)
}

fn parse_count(text: &str, line: usize, label: &str) -> Result<usize> {
    text.parse()
        .map_err(|_| PvError::format(line, format!("invalid {} count '{}'", label, text)))
}

fn parse_value(token: &str, line: usize) -> Result<f64> {
    token
        .parse()
        .map_err(|_| PvError::format(line, format!("'{}' is not a number", token)))
}

/// Parse raw file text into a table of variables.
///
/// The whole input is validated before anything is returned: a missing
/// marker, malformed rows or counts that disagree with the data all fail.
pub fn parse_table(text: &str) -> Result<RawTable> {
    let mut table = RawTable::default();
    let mut declared_vars: Option<usize> = None;
    let mut declared_points: Option<usize> = None;
    let mut marker = false;
    let mut section = Section::Header;

    // Variable the next one-token row belongs to; None until a sample opens.
    let mut cursor: Option<usize> = None;

    for (idx, raw_line) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }

        if line.starts_with("Variables:") {
            if !marker {
                return Err(PvError::format(line_no, "not LTspice output"));
            }
            section = Section::Variables;
            continue;
        }
        if line.starts_with("Values:") {
            if section != Section::Variables {
                return Err(PvError::format(line_no, "Values section before Variables section"));
            }
            section = Section::Values;
            continue;
        }
        if line.starts_with("Binary:") {
            return Err(PvError::format(line_no, "binary raw files are not supported"));
        }

        match section {
            Section::Header => {
                if line.contains(SIMULATOR_MARKER) {
                    marker = true;
                }
                if let Some(v) = header_field(line, "Title:") {
                    table.title = v.to_string();
                } else if let Some(v) = header_field(line, "Plotname:") {
                    table.plotname = v.to_string();
                } else if let Some(v) = header_field(line, "No. Variables:") {
                    declared_vars = Some(parse_count(v, line_no, "variable")?);
                } else if let Some(v) = header_field(line, "No. Points:") {
                    declared_points = Some(parse_count(v, line_no, "point")?);
                }
            }
            Section::Variables => {
                let parts: Vec<&str> = line.split_whitespace().collect();
                if parts.len() != 3 {
                    return Err(PvError::format(line_no, format!("expected 'index name kind', got '{}'", line)));
                }
                let index = parts[0]
                    .parse()
                    .map_err(|_| PvError::format(line_no, format!("invalid variable index '{}'", parts[0])))?;
                table.variables.push(RawVariable {
                    index,
                    name: parts[1].to_lowercase(),
                    kind: parts[2].to_lowercase(),
                    values: Vec::new(),
                });
            }
            Section::Values => {
                let parts: Vec<&str> = line.split_whitespace().collect();
                match parts.as_slice() {
                    [sample, value] => {
                        if let Some(expected) = cursor {
                            if expected != table.variables.len() {
                                return Err(PvError::format(
                                    line_no,
                                    format!("sample {} ended after {} values", table.points, expected),
                                ));
                            }
                            table.points += 1;
                        }
                        let sample: usize = parse_count(sample, line_no, "sample")?;
                        if sample != table.points {
                            return Err(PvError::format(
                                line_no,
                                format!("sample index {} out of sequence (expected {})", sample, table.points),
                            ));
                        }
                        let first = table
                            .variables
                            .first_mut()
                            .ok_or_else(|| PvError::format(line_no, "values present but no variables declared"))?;
                        first.values.push(parse_value(value, line_no)?);
                        cursor = Some(1);
                    }
                    [value] => {
                        let slot = cursor.ok_or_else(|| PvError::format(line_no, "value row before the first sample"))?;
                        let var = table.variables.get_mut(slot).ok_or_else(|| {
                            PvError::format(line_no, format!("row overflows the {} declared variables", slot))
                        })?;
                        var.values.push(parse_value(value, line_no)?);
                        cursor = Some(slot + 1);
                    }
                    _ => {
                        return Err(PvError::format(line_no, format!("unexpected value row '{}'", line)));
                    }
                }
            }
        }
    }

    if !marker {
        return Err(PvError::format(0, "not LTspice output"));
    }
    if section != Section::Values {
        return Err(PvError::format(0, "missing Values section"));
    }
    if let Some(filled) = cursor {
        if filled != table.variables.len() {
            return Err(PvError::format(
                0,
                format!("last sample has {} of {} values", filled, table.variables.len()),
            ));
        }
        table.points += 1;
    }

    let vars = declared_vars.ok_or_else(|| PvError::format(0, "missing 'No. Variables' header"))?;
    let points = declared_points.ok_or_else(|| PvError::format(0, "missing 'No. Points' header"))?;
    if vars != table.variables.len() {
        return Err(PvError::format(
            0,
            format!("header declares {} variables, found {}", vars, table.variables.len()),
        ));
    }
    if points != table.points {
        return Err(PvError::format(
            0,
            format!("header declares {} points, found {}", points, table.points),
        ));
    }

    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(vars: &[&str], points: usize, values: &str) -> String {
        let mut text = format!(
            "Title: * test\nDate: Thu Jan 01 00:00:00 2026\nPlotname: DC transfer characteristic\n\
             Flags: real forward\nNo. Variables: {}\nNo. Points: {}\nOffset: 0.0\n\
             Command: Linear Technology Corporation LTspice XVII\nVariables:\n",
            vars.len(),
            points
        );
        for (i, v) in vars.iter().enumerate() {
            text.push_str(&format!("\t{}\t{}\n", i, v));
        }
        text.push_str("Values:\n");
        text.push_str(values);
        text
    }

    #[test]
    fn test_values_follow_declaration_order() {
        let text = raw(
            &["vbias voltage", "I(Vbias) device_current"],
            3,
            "0\t0.0\n\t-3.4\n1\t0.5\n\t-3.3\n2\t1.0\n\t-3.2\n",
        );
        let table = parse_table(&text).unwrap();
        assert_eq!(table.points, 3);
        assert_eq!(table.plotname, "DC transfer characteristic");
        assert_eq!(table.variables[0].name, "vbias");
        assert_eq!(table.variables[0].values, vec![0.0, 0.5, 1.0]);
        assert_eq!(table.variables[1].name, "i(vbias)");
        assert_eq!(table.variables[1].kind, "device_current");
        assert_eq!(table.variables[1].values, vec![-3.4, -3.3, -3.2]);
    }

    #[test]
    fn test_rejects_missing_marker() {
        let text = raw(&["vbias voltage"], 1, "0\t0.0\n").replace("LTspice", "ngspice");
        assert!(matches!(parse_table(&text), Err(PvError::FormatError { .. })));
    }

    #[test]
    fn test_rejects_overflowing_row() {
        let text = raw(&["vbias voltage", "I(Vbias) device_current"], 1, "0\t0.0\n\t-3.4\n\t9.9\n");
        assert!(parse_table(&text).is_err());
    }

    #[test]
    fn test_rejects_short_sample() {
        let text = raw(&["vbias voltage", "I(Vbias) device_current"], 2, "0\t0.0\n1\t0.5\n\t-3.3\n");
        assert!(parse_table(&text).is_err());
    }

    #[test]
    fn test_rejects_non_numeric_value() {
        let text = raw(&["vbias voltage", "I(Vbias) device_current"], 1, "0\t0.0\n\tabc\n");
        let err = parse_table(&text).unwrap_err();
        assert!(matches!(err, PvError::FormatError { line: 14, .. }));
    }

    #[test]
    fn test_rejects_point_count_mismatch() {
        let text = raw(&["vbias voltage", "I(Vbias) device_current"], 5, "0\t0.0\n\t-3.4\n");
        assert!(parse_table(&text).is_err());
    }

    #[test]
    fn test_rejects_missing_values_section() {
        let text = raw(&["vbias voltage"], 0, "").replace("Values:\n", "");
        assert!(parse_table(&text).is_err());
    }
}
