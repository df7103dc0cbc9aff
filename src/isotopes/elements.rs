use std::collections::BTreeMap;
use std::path::Path;

use log::{
    debug,
    warn,
};
use serde::{
    Deserialize,
    Serialize,
};

use super::tracer::Tracer;
use crate::error::{
    LabelingError,
    Result,
};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IsotopeRecord {
    pub mass_number: u32,
    pub exact_mass: f64,
    pub abundance: f64,
}

// (element, mass number, exact mass, natural abundance)
// Masses and abundances from the IUPAC 2013 tables.
const BUILTIN_ISOTOPES: &[(&str, u32, f64, f64)] = &[
    ("H", 1, 1.00782503207, 0.999885),
    ("H", 2, 2.0141017778, 0.000115),
    ("C", 12, 12.0, 0.9893),
    ("C", 13, 13.0033548378, 0.0107),
    ("N", 14, 14.0030740048, 0.99636),
    ("N", 15, 15.0001088982, 0.00364),
    ("O", 16, 15.99491461956, 0.99757),
    ("O", 17, 16.99913170, 0.00038),
    ("O", 18, 17.9991610, 0.00205),
    ("Si", 28, 27.9769265325, 0.92223),
    ("Si", 29, 28.976494700, 0.04685),
    ("Si", 30, 29.97377017, 0.03092),
    ("P", 31, 30.97376163, 1.0),
    ("S", 32, 31.97207100, 0.9499),
    ("S", 33, 32.97145876, 0.0075),
    ("S", 34, 33.96786690, 0.0425),
    ("S", 36, 35.96708076, 0.0001),
    ("Cl", 35, 34.96885268, 0.7576),
    ("Cl", 37, 36.96590259, 0.2424),
    ("Br", 79, 78.9183371, 0.5069),
    ("Br", 81, 80.9162906, 0.4931),
];

#[derive(Debug, Deserialize)]
struct IsotopeCsvRecord {
    element: String,
    mass_number: u32,
    exact_mass: f64,
    abundance: f64,
}

/// Natural isotope abundances per element.
///
/// Lookups that miss the loaded data fall back to the built-in table.
#[derive(Debug, Clone, Default)]
pub struct IsotopeTable {
    elements: BTreeMap<String, Vec<IsotopeRecord>>,
}

fn insert_sorted(
    elements: &mut BTreeMap<String, Vec<IsotopeRecord>>,
    element: &str,
    record: IsotopeRecord,
) {
    let isotopes = elements.entry(element.to_string()).or_default();
    match isotopes.binary_search_by_key(&record.mass_number, |x| x.mass_number) {
        Ok(pos) => isotopes[pos] = record,
        Err(pos) => isotopes.insert(pos, record),
    }
}

impl IsotopeTable {
    pub fn builtin() -> Self {
        let mut elements = BTreeMap::new();
        for (element, mass_number, exact_mass, abundance) in BUILTIN_ISOTOPES {
            insert_sorted(
                &mut elements,
                element,
                IsotopeRecord {
                    mass_number: *mass_number,
                    exact_mass: *exact_mass,
                    abundance: *abundance,
                },
            );
        }
        IsotopeTable { elements }
    }

    /// Reads `element,mass_number,exact_mass,abundance` rows.
    pub fn from_csv(path: impl AsRef<Path>) -> Result<Self> {
        let mut rdr = csv::Reader::from_path(path.as_ref())?;
        let mut elements = BTreeMap::new();
        for row in rdr.deserialize() {
            let row: IsotopeCsvRecord = row?;
            if !(0.0..=1.0).contains(&row.abundance) || row.exact_mass <= 0.0 {
                return Err(LabelingError::InvalidParameter {
                    name: "isotope_table",
                    reason: format!(
                        "bad record for {}{}: mass {}, abundance {}",
                        row.mass_number, row.element, row.exact_mass, row.abundance
                    ),
                });
            }
            insert_sorted(
                &mut elements,
                row.element.trim(),
                IsotopeRecord {
                    mass_number: row.mass_number,
                    exact_mass: row.exact_mass,
                    abundance: row.abundance,
                },
            );
        }
        debug!(
            "Loaded isotope data for {} elements from {:?}",
            elements.len(),
            path.as_ref()
        );
        Ok(IsotopeTable { elements })
    }

    /// Isotopes of an element, sorted by mass number.
    pub fn isotopes(
        &self,
        element: &str,
    ) -> Option<&[IsotopeRecord]> {
        self.elements.get(element).map(|x| x.as_slice())
    }

    fn isotopes_or_builtin(
        &self,
        element: &str,
    ) -> Result<Vec<IsotopeRecord>> {
        if let Some(isotopes) = self.isotopes(element) {
            return Ok(isotopes.to_vec());
        }
        if !self.elements.is_empty() {
            warn!(
                "No isotope abundance data loaded for {}, using the built-in table",
                element
            );
        }
        Self::builtin()
            .isotopes(element)
            .map(|x| x.to_vec())
            .ok_or_else(|| LabelingError::UnknownElement(element.to_string()))
    }

    /// Mass difference between the tracer and the most abundant isotope
    /// of its element. One unit of mass shift is one tracer atom.
    pub fn mass_shift_unit(
        &self,
        tracer: &Tracer,
    ) -> Result<f64> {
        let isotopes = self.isotopes_or_builtin(&tracer.element)?;
        let heavy = isotopes
            .iter()
            .find(|x| x.mass_number == tracer.mass_number)
            .ok_or_else(|| LabelingError::UnknownElement(tracer.to_string()))?;
        let main = isotopes
            .iter()
            .max_by(|a, b| a.abundance.total_cmp(&b.abundance))
            .ok_or_else(|| LabelingError::UnknownElement(tracer.element.clone()))?;

        if main.mass_number == heavy.mass_number {
            return Err(LabelingError::InvalidTracer(format!(
                "{} is the most abundant isotope of {}",
                tracer, tracer.element
            )));
        }

        Ok(heavy.exact_mass - main.exact_mass)
    }
}
