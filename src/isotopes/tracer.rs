use std::fmt;
use std::str::FromStr;

use serde::{
    Deserialize,
    Serialize,
};

use crate::error::LabelingError;

/// Isotope used to label the samples, e.g. `13C` or `15N`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Tracer {
    pub mass_number: u32,
    pub element: String,
}

impl FromStr for Tracer {
    type Err = LabelingError;

    /// Accepts `13C` and `[13]C`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || LabelingError::InvalidTracer(s.to_string());
        let trimmed = s.trim();
        let (digits, symbol) = match trimmed.strip_prefix('[') {
            Some(rest) => rest.split_once(']').ok_or_else(invalid)?,
            None => {
                let split_at = trimmed
                    .find(|c: char| !c.is_ascii_digit())
                    .ok_or_else(invalid)?;
                trimmed.split_at(split_at)
            },
        };

        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }
        let mass_number: u32 = digits.parse().map_err(|_| invalid())?;
        if mass_number == 0 {
            return Err(invalid());
        }

        let mut chars = symbol.chars();
        let valid_symbol = match chars.next() {
            Some(first) if first.is_ascii_uppercase() => {
                let rest: Vec<char> = chars.collect();
                rest.len() <= 1 && rest.iter().all(|c| c.is_ascii_lowercase())
            },
            _ => false,
        };
        if !valid_symbol {
            return Err(invalid());
        }

        Ok(Tracer {
            mass_number,
            element: symbol.to_string(),
        })
    }
}

impl TryFrom<String> for Tracer {
    type Error = LabelingError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Tracer> for String {
    fn from(value: Tracer) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Tracer {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{}{}", self.mass_number, self.element)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tracers() {
        let c13: Tracer = "13C".parse().unwrap();
        assert_eq!(c13.mass_number, 13);
        assert_eq!(c13.element, "C");

        let n15: Tracer = " [15]N ".parse().unwrap();
        assert_eq!(n15, Tracer { mass_number: 15, element: "N".into() });

        let cl37: Tracer = "37Cl".parse().unwrap();
        assert_eq!(cl37.to_string(), "37Cl");
    }

    #[test]
    fn test_malformed_tracers() {
        for bad in ["", "C13", "13", "13c", "13CL", "[13C", "0C", "1x3C", "[]C"] {
            let out = bad.parse::<Tracer>();
            assert!(
                matches!(out, Err(LabelingError::InvalidTracer(_))),
                "'{}' should not parse",
                bad
            );
        }
    }
}
