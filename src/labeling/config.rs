use serde::{
    Deserialize,
    Serialize,
};

use crate::error::{
    LabelingError,
    Result,
};
use crate::features::IntensityMeasure;
use crate::isotopes::Tracer;

/// Absolute or relative m/z window, whichever is wider.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct MzTolerance {
    pub mz: f64,
    pub ppm: f64,
}

impl Default for MzTolerance {
    fn default() -> Self {
        MzTolerance { mz: 0.002, ppm: 5. }
    }
}

impl MzTolerance {
    pub fn tolerance_at(
        &self,
        mz: f64,
    ) -> f64 {
        self.mz.max(mz * self.ppm * 1e-6)
    }

    pub fn contains(
        &self,
        reference: f64,
        mz: f64,
    ) -> bool {
        (mz - reference).abs() <= self.tolerance_at(reference)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct LabelingConfig {
    pub tracer: Tracer,
    /// Minutes
    pub rt_tolerance: f32,
    pub max_isotopologues: u32,
    pub min_pattern_size: usize,
    pub max_recursion_depth: usize,
    pub allow_incomplete_patterns: bool,
    /// Fraction of M+0..M+max that has to be detected when incomplete
    /// patterns are not allowed.
    pub min_pattern_completeness: f64,
    /// Noise level: pair search skips weaker base rows and clusters must
    /// exceed it in at least half of the samples of each set.
    pub min_base_intensity: f64,
    pub intensity_measure: IntensityMeasure,
    /// Relative rise allowed from one unlabeled isotopologue to the next.
    pub monotonicity_tolerance: f64,
    pub enrichment_tolerance: f64,
    pub p_value_cutoff: f64,
    pub single_sample_mode: bool,
    /// Relative difference allowed between enrichment profiles of two
    /// clusters that get merged.
    pub merge_profile_tolerance: f64,
    pub mz_tolerance: MzTolerance,
}

impl Default for LabelingConfig {
    fn default() -> Self {
        LabelingConfig {
            tracer: Tracer {
                mass_number: 13,
                element: "C".into(),
            },
            rt_tolerance: 0.05,
            max_isotopologues: 10,
            min_pattern_size: 2,
            max_recursion_depth: 3,
            allow_incomplete_patterns: false,
            min_pattern_completeness: 0.5,
            min_base_intensity: 0.,
            intensity_measure: IntensityMeasure::Height,
            monotonicity_tolerance: 0.1,
            enrichment_tolerance: 0.1,
            p_value_cutoff: 0.05,
            single_sample_mode: false,
            merge_profile_tolerance: 0.25,
            mz_tolerance: MzTolerance::default(),
        }
    }
}

fn invalid(
    name: &'static str,
    reason: impl Into<String>,
) -> LabelingError {
    LabelingError::InvalidParameter {
        name,
        reason: reason.into(),
    }
}

fn check_non_negative(
    name: &'static str,
    value: f64,
) -> Result<()> {
    if !value.is_finite() || value < 0. {
        return Err(invalid(name, format!("must be a finite value >= 0, got {}", value)));
    }
    Ok(())
}

impl LabelingConfig {
    /// Checks every parameter before any data is touched.
    pub fn validate(&self) -> Result<()> {
        check_non_negative("mz_tolerance.mz", self.mz_tolerance.mz)?;
        check_non_negative("mz_tolerance.ppm", self.mz_tolerance.ppm)?;
        if self.mz_tolerance.mz == 0. && self.mz_tolerance.ppm == 0. {
            return Err(invalid("mz_tolerance", "either mz or ppm has to be > 0"));
        }
        if !self.rt_tolerance.is_finite() || self.rt_tolerance <= 0. {
            return Err(invalid(
                "rt_tolerance",
                format!("must be > 0, got {}", self.rt_tolerance),
            ));
        }
        if self.max_isotopologues == 0 {
            return Err(invalid("max_isotopologues", "must be at least 1"));
        }
        if self.min_pattern_size < 2 {
            return Err(invalid(
                "min_pattern_size",
                "a pattern needs the base peak and at least one isotopologue",
            ));
        }
        if self.min_pattern_size > self.max_isotopologues as usize + 1 {
            return Err(invalid(
                "min_pattern_size",
                format!(
                    "{} can never be reached with max_isotopologues = {}",
                    self.min_pattern_size, self.max_isotopologues
                ),
            ));
        }
        if self.max_recursion_depth == 0 {
            return Err(invalid("max_recursion_depth", "must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.min_pattern_completeness) {
            return Err(invalid("min_pattern_completeness", "must be within [0, 1]"));
        }
        check_non_negative("min_base_intensity", self.min_base_intensity)?;
        check_non_negative("monotonicity_tolerance", self.monotonicity_tolerance)?;
        check_non_negative("enrichment_tolerance", self.enrichment_tolerance)?;
        check_non_negative("merge_profile_tolerance", self.merge_profile_tolerance)?;
        if !(self.p_value_cutoff > 0. && self.p_value_cutoff <= 1.) {
            return Err(invalid("p_value_cutoff", "must be within (0, 1]"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        LabelingConfig::default().validate().unwrap();
    }

    #[test]
    fn test_mz_tolerance() {
        let tol = MzTolerance { mz: 0.001, ppm: 10. };
        // 10 ppm of 50 is below the absolute floor
        assert!((tol.tolerance_at(50.) - 0.001).abs() < 1e-12);
        assert!((tol.tolerance_at(1000.) - 0.01).abs() < 1e-12);
        assert!(tol.contains(1000., 1000.009));
        assert!(!tol.contains(1000., 1000.011));
    }

    #[test]
    fn test_invalid_parameters() {
        let bad = [
            LabelingConfig {
                rt_tolerance: 0.,
                ..Default::default()
            },
            LabelingConfig {
                min_pattern_size: 1,
                ..Default::default()
            },
            LabelingConfig {
                max_isotopologues: 2,
                min_pattern_size: 4,
                ..Default::default()
            },
            LabelingConfig {
                p_value_cutoff: 0.,
                ..Default::default()
            },
            LabelingConfig {
                mz_tolerance: MzTolerance { mz: 0., ppm: 0. },
                ..Default::default()
            },
            LabelingConfig {
                enrichment_tolerance: f64::NAN,
                ..Default::default()
            },
        ];
        for config in bad.iter() {
            assert!(matches!(
                config.validate(),
                Err(LabelingError::InvalidParameter { .. })
            ));
        }
    }

    #[test]
    fn test_toml_tracer_is_checked() {
        let parsed: std::result::Result<LabelingConfig, _> = toml::from_str("tracer = \"C13\"");
        assert!(parsed.is_err());
        let parsed: LabelingConfig =
            toml::from_str("tracer = \"15N\"\nrt_tolerance = 0.1").unwrap();
        assert_eq!(parsed.tracer.element, "N");
        assert_eq!(parsed.max_isotopologues, 10);
    }
}
