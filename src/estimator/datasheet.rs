//! Datasheet ratings at standard test conditions.

use std::str::FromStr;

use crate::error::{PvError, Result};

/// Manufacturer ratings of a PV module at STC (25 °C, 1000 W/m²).
///
/// Immutable once built; construction validates every field so the estimator
/// never starts a fit from an inconsistent datasheet.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DatasheetSpec {
    voc: f64,
    isc: f64,
    vmp: f64,
    imp: f64,
    kv: f64,
    ki: f64,
    ns: usize,
}

impl DatasheetSpec {
    /// Create a datasheet from module ratings.
    ///
    /// # Arguments
    /// * `voc` - Open-circuit voltage (V)
    /// * `isc` - Short-circuit current (A)
    /// * `vmp` - Voltage at maximum power (V)
    /// * `imp` - Current at maximum power (A)
    /// * `kv` - Open-circuit voltage temperature coefficient (V/K)
    /// * `ki` - Short-circuit current temperature coefficient (A/K)
    /// * `ns` - Number of series cells per module
    pub fn new(voc: f64, isc: f64, vmp: f64, imp: f64, kv: f64, ki: f64, ns: usize) -> Result<Self> {
        for (field, value) in [
            ("voc", voc),
            ("isc", isc),
            ("vmp", vmp),
            ("imp", imp),
            ("kv", kv),
            ("ki", ki),
        ] {
            if !value.is_finite() {
                return Err(PvError::datasheet(field, "value must be finite"));
            }
        }
        for (field, value) in [("voc", voc), ("isc", isc), ("vmp", vmp), ("imp", imp)] {
            if value <= 0.0 {
                return Err(PvError::datasheet(field, "value must be positive"));
            }
        }
        if vmp >= voc {
            return Err(PvError::datasheet("vmp", "must be below the open-circuit voltage"));
        }
        if imp >= isc {
            return Err(PvError::datasheet("imp", "must be below the short-circuit current"));
        }
        if ns == 0 {
            return Err(PvError::datasheet("ns", "module needs at least one cell"));
        }

        Ok(Self {
            voc,
            isc,
            vmp,
            imp,
            kv,
            ki,
            ns,
        })
    }

    /// Open-circuit voltage (V).
    pub fn voc(&self) -> f64 {
        self.voc
    }

    /// Short-circuit current (A).
    pub fn isc(&self) -> f64 {
        self.isc
    }

    /// Voltage at the maximum power point (V).
    pub fn vmp(&self) -> f64 {
        self.vmp
    }

    /// Current at the maximum power point (A).
    pub fn imp(&self) -> f64 {
        self.imp
    }

    /// Voltage temperature coefficient (V/K).
    pub fn kv(&self) -> f64 {
        self.kv
    }

    /// Current temperature coefficient (A/K).
    pub fn ki(&self) -> f64 {
        self.ki
    }

    /// Series cells per module.
    pub fn ns(&self) -> usize {
        self.ns
    }

    /// Rated maximum power (W).
    pub fn pmax(&self) -> f64 {
        self.vmp * self.imp
    }
}

/// Read one numeric datasheet field.
pub fn parse_rating(field: &str, text: &str) -> Result<f64> {
    text.trim()
        .parse::<f64>()
        .map_err(|_| PvError::NonNumericField {
            field: field.to_string(),
            text: text.to_string(),
        })
}

impl FromStr for DatasheetSpec {
    type Err = PvError;

    /// Parse a whitespace separated `key=value` list, e.g.
    /// `voc=43.5 isc=3.45 vmp=35 imp=3.15 kv=-0.152 ki=0.0014 ns=72`.
    fn from_str(s: &str) -> Result<Self> {
        let mut fields: [Option<f64>; 7] = [None; 7];
        const KEYS: [&str; 7] = ["voc", "isc", "vmp", "imp", "kv", "ki", "ns"];

        for pair in s.split_whitespace() {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| PvError::datasheet(pair, "expected key=value"))?;
            let key = key.to_lowercase();
            let slot = KEYS
                .iter()
                .position(|k| *k == key)
                .ok_or_else(|| PvError::datasheet(key.as_str(), "unknown field"))?;
            fields[slot] = Some(parse_rating(KEYS[slot], value)?);
        }

        let get = |i: usize| fields[i].ok_or_else(|| PvError::datasheet(KEYS[i], "missing field"));
        let ns = get(6)?;
        if ns.fract() != 0.0 || ns < 1.0 {
            return Err(PvError::datasheet("ns", "must be a positive whole number"));
        }

        Self::new(get(0)?, get(1)?, get(2)?, get(3)?, get(4)?, get(5)?, ns as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_inconsistent_ratings() {
        assert!(DatasheetSpec::new(43.5, 3.45, 44.0, 3.15, -0.152, 0.0014, 72).is_err());
        assert!(DatasheetSpec::new(43.5, 3.45, 35.0, 3.5, -0.152, 0.0014, 72).is_err());
        assert!(DatasheetSpec::new(43.5, 3.45, 35.0, 3.15, -0.152, 0.0014, 0).is_err());
        assert!(DatasheetSpec::new(f64::NAN, 3.45, 35.0, 3.15, -0.152, 0.0014, 72).is_err());
    }

    #[test]
    fn test_parse_key_value_form() {
        let sheet: DatasheetSpec = "voc=43.5 isc=3.45 vmp=35 imp=3.15 kv=-0.152 ki=0.0014 ns=72"
            .parse()
            .unwrap();
        assert_eq!(sheet.ns(), 72);
        assert_eq!(sheet.vmp(), 35.0);
        assert!((sheet.pmax() - 110.25).abs() < 1e-9);
    }

    #[test]
    fn test_non_numeric_field() {
        let err = "voc=abc isc=3.45 vmp=35 imp=3.15 kv=-0.152 ki=0.0014 ns=72"
            .parse::<DatasheetSpec>()
            .unwrap_err();
        assert!(matches!(err, PvError::NonNumericField { ref field, .. } if field == "voc"));
    }

    #[test]
    fn test_missing_field() {
        let err = "voc=43.5 isc=3.45".parse::<DatasheetSpec>().unwrap_err();
        assert!(matches!(err, PvError::InvalidDatasheet { .. }));
    }
}
