//! Probe classification by variable name.

use std::fmt;

use super::rawfile::RawVariable;

/// Plot colors, assigned in display order and cycled.
pub const COLOR_CYCLE: [char; 7] = ['r', 'b', 'y', 'g', 'm', 'c', 'k'];

/// Physical unit of a series, from its declared kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    /// Amperes
    Current,
    /// Volts
    Voltage,
    /// Anything else the simulator declares
    Other,
}

impl Unit {
    /// Unit named by a variable kind such as `device_current`.
    pub fn from_kind(kind: &str) -> Self {
        let kind = kind.to_lowercase();
        if kind.contains("current") {
            Unit::Current
        } else if kind.contains("voltage") {
            Unit::Voltage
        } else {
            Unit::Other
        }
    }

    /// Unit symbol.
    pub fn symbol(&self) -> &'static str {
        match self {
            Unit::Current => "A",
            Unit::Voltage => "V",
            Unit::Other => "",
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// What a simulator variable measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeKind {
    /// Current through the bias source
    GridCurrent,
    /// The swept bias voltage
    BiasVoltage,
    /// Current through a string's probe resistor
    StringCurrent { string: usize },
    /// Current through a bypass diode
    BypassCurrent { string: usize, module: usize, diode: usize },
}

impl ProbeKind {
    /// Classify a lowercased variable name. Unknown names give `None`.
    ///
    /// The bias current check runs first because `i(vbias)` also contains
    /// the bias source name.
    pub fn classify(name: &str) -> Option<Self> {
        if name.contains("i(v") {
            Some(ProbeKind::GridCurrent)
        } else if name.contains("vbias") {
            Some(ProbeKind::BiasVoltage)
        } else if name.contains("rprobe") {
            decode_string(name).map(|string| ProbeKind::StringCurrent { string })
        } else if name.contains("i(d") {
            decode_bypass(name).map(|(string, module, diode)| ProbeKind::BypassCurrent { string, module, diode })
        } else {
            None
        }
    }

    /// Display name of the series.
    pub fn label(&self) -> String {
        match *self {
            ProbeKind::GridCurrent => "Grid".to_string(),
            ProbeKind::BiasVoltage => "Bias Voltage".to_string(),
            ProbeKind::StringCurrent { string } => format!("String n°{}", string),
            ProbeKind::BypassCurrent { string, module, diode } => {
                format!("Bypass N°{} from S.{},P.{}", diode, string, module)
            }
        }
    }
}

/// Leading decimal digits of `text` and the remainder.
fn take_number(text: &str) -> Option<(usize, &str)> {
    let end = text.find(|c: char| !c.is_ascii_digit()).unwrap_or(text.len());
    let n = text[..end].parse().ok()?;
    Some((n, &text[end..]))
}

/// `i(rprobe_s{s})` → `s`.
fn decode_string(name: &str) -> Option<usize> {
    let (_, tail) = name.split_once("rprobe_s")?;
    let (string, rest) = take_number(tail)?;
    rest.starts_with(')').then_some(string)
}

/// `i(dbypass_s{s}p{m}n{k})` → `(s, m, k)`.
fn decode_bypass(name: &str) -> Option<(usize, usize, usize)> {
    let tail = &name[name.rfind('s')? + 1..];
    let (string, rest) = take_number(tail)?;
    let (module, rest) = take_number(rest.strip_prefix('p')?)?;
    let (diode, rest) = take_number(rest.strip_prefix('n')?)?;
    rest.starts_with(')').then_some((string, module, diode))
}

/// One named series read from the result file.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeSeries {
    /// Display name
    pub name: String,
    /// What the series measures
    pub kind: ProbeKind,
    /// Physical unit
    pub unit: Unit,
    /// One value per sweep point
    pub values: Vec<f64>,
    /// Plot color from [`COLOR_CYCLE`]
    pub color: char,
}

impl ProbeSeries {
    pub(crate) fn from_variable(kind: ProbeKind, var: RawVariable) -> Self {
        Self {
            name: kind.label(),
            kind,
            unit: Unit::from_kind(&var.kind),
            values: var.values,
            color: COLOR_CYCLE[0],
        }
    }

    /// Number of sweep points.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True when the series has no points.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_names() {
        assert_eq!(ProbeKind::classify("i(vbias)"), Some(ProbeKind::GridCurrent));
        assert_eq!(ProbeKind::classify("vbias"), Some(ProbeKind::BiasVoltage));
        assert_eq!(
            ProbeKind::classify("i(rprobe_s3)"),
            Some(ProbeKind::StringCurrent { string: 3 })
        );
        assert_eq!(
            ProbeKind::classify("i(dbypass_s1p12n2)"),
            Some(ProbeKind::BypassCurrent {
                string: 1,
                module: 12,
                diode: 2
            })
        );
        assert_eq!(ProbeKind::classify("v(grid_0_1)"), None);
        assert_eq!(ProbeKind::classify("i(rprobe_sx)"), None);
    }

    #[test]
    fn test_labels() {
        assert_eq!(ProbeKind::GridCurrent.label(), "Grid");
        assert_eq!(ProbeKind::StringCurrent { string: 0 }.label(), "String n°0");
        assert_eq!(
            ProbeKind::BypassCurrent {
                string: 0,
                module: 1,
                diode: 2
            }
            .label(),
            "Bypass N°2 from S.0,P.1"
        );
    }

    #[test]
    fn test_unit_from_kind() {
        assert_eq!(Unit::from_kind("device_current"), Unit::Current);
        assert_eq!(Unit::from_kind("voltage"), Unit::Voltage);
        assert_eq!(Unit::from_kind("time"), Unit::Other);
        assert_eq!(Unit::Current.to_string(), "A");
    }
}
