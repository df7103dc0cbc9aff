use std::time::{
    Duration,
    Instant,
};

use log::{
    log,
    Level,
};
use num_traits::Float;

/// Logs when a named phase starts and how long it took.
///
/// Sub-timers are namespaced with `::` so nested phases read like
/// `labeling::pairs`.
pub struct ContextTimer {
    start: Instant,
    name: String,
    level: Level,
    report_start: bool,
    pub cumtime: Duration,
}

impl ContextTimer {
    pub fn new(
        name: &str,
        report_start: bool,
        level: Level,
    ) -> ContextTimer {
        let out = ContextTimer {
            start: Instant::now(),
            name: name.to_string(),
            level,
            report_start,
            cumtime: Duration::new(0, 0),
        };
        if report_start {
            log!(out.level, "Started: '{}'", out.name);
        }
        out
    }

    pub fn stop(
        &mut self,
        report: bool,
    ) -> Duration {
        let duration = self.start.elapsed();
        self.cumtime += duration;
        if report {
            self.report();
        }
        duration
    }

    pub fn report(&self) {
        log!(
            self.level,
            "Time elapsed in '{}' is: {:.03}s",
            self.name,
            self.cumtime.as_secs_f64()
        );
    }

    pub fn start_sub_timer(
        &self,
        name: &str,
    ) -> ContextTimer {
        ContextTimer::new(
            &format!("{}::{}", self.name, name),
            self.report_start,
            self.level,
        )
    }
}

// Welford's online algorithm, with the pairwise merge from
// Chan et al. so partial calculators can be combined.
// https://en.wikipedia.org/wiki/Algorithms_for_calculating_variance

/// Running mean / variance without storing the values.
#[derive(Debug, Default, Clone, Copy)]
pub struct RollingSDCalculator<T> {
    n: u64,
    mean: T,
    m2: T,
}

impl<T: Float + Default> RollingSDCalculator<T> {
    pub fn add(
        &mut self,
        x: T,
    ) {
        self.merge(&Self {
            n: 1,
            mean: x,
            m2: T::zero(),
        });
    }

    pub fn merge(
        &mut self,
        other: &Self,
    ) {
        if other.n == 0 {
            return;
        }
        if self.n == 0 {
            *self = *other;
            return;
        }

        let n_a = T::from(self.n).unwrap_or_else(T::zero);
        let n_b = T::from(other.n).unwrap_or_else(T::zero);
        let n = n_a + n_b;
        let delta = other.mean - self.mean;

        self.mean = self.mean + delta * n_b / n;
        self.m2 = self.m2 + other.m2 + delta * delta * n_a * n_b / n;
        self.n += other.n;
    }

    pub fn len(&self) -> u64 {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    pub fn get_mean(&self) -> T {
        self.mean
    }

    /// Population variance, zero for fewer than one value.
    pub fn get_variance(&self) -> T {
        if self.n == 0 {
            return T::zero();
        }
        self.m2 / T::from(self.n).unwrap_or_else(T::one)
    }

    /// Sample variance (Bessel corrected), zero for fewer than two values.
    pub fn get_variance_bessel(&self) -> T {
        if self.n < 2 {
            return T::zero();
        }
        self.m2 / T::from(self.n - 1).unwrap_or_else(T::one)
    }

    pub fn get_sd(&self) -> T {
        self.get_variance_bessel().sqrt()
    }
}

/// Index range of the elements whose key lies in `[low, high]`.
///
/// The slice must be sorted by `key`.
///
/// ```rust
/// use labelmesh::utils::range_by_key;
/// let data = [1.0, 1.5, 1.5, 2.0, 2.5, 3.0, 3.5];
/// let (left, right) = range_by_key(&data, |x| *x, 1.5, 3.0);
/// assert_eq!(&data[left..right], &[1.5, 1.5, 2.0, 2.5, 3.0]);
/// let (left, right) = range_by_key(&data, |x| *x, 10., 11.);
/// assert_eq!(left, right);
/// ```
pub fn range_by_key<T, F>(
    slice: &[T],
    key: F,
    low: f64,
    high: f64,
) -> (usize, usize)
where
    F: Fn(&T) -> f64,
{
    let left = slice.partition_point(|x| key(x) < low);
    let right = left + slice[left..].partition_point(|x| key(x) <= high);
    (left, right)
}

#[cfg(test)]
mod test_rolling_sd {
    use super::*;

    // Population variance of 3.75 +- 0.01, mean of 7.5
    const ASCOMBES_Q1: [f64; 11] = [
        8.04, 6.95, 7.58, 8.81, 8.33, 9.96, 7.24, 4.26, 10.84, 4.82, 5.68,
    ];
    const ASCOMBES_Q2: [f64; 11] = [
        9.14, 8.14, 8.74, 8.77, 9.26, 8.10, 6.13, 3.10, 9.13, 7.26, 4.74,
    ];

    fn assert_close(
        a: f64,
        b: f64,
    ) {
        assert!((a - b).abs() < 1e-3, "{} != {}", a, b);
    }

    #[test]
    fn test_rolling_sd() {
        let mut sd_calc = RollingSDCalculator::<f64>::default();
        assert!(sd_calc.is_empty());
        assert_eq!(sd_calc.get_variance_bessel(), 0.);

        sd_calc.add(1.0);
        sd_calc.add(1.0);
        assert_eq!(sd_calc.get_mean(), 1.0);
        assert_eq!(sd_calc.get_variance(), 0.);
        assert_eq!(sd_calc.get_variance_bessel(), 0.);

        let mut sd_calc = RollingSDCalculator::<f64>::default();
        sd_calc.add(1.0);
        sd_calc.add(0.0);
        assert_eq!(sd_calc.get_mean(), 0.5);
        assert_close(sd_calc.get_variance_bessel(), 0.5);

        let mut sd_calc = RollingSDCalculator::<f64>::default();
        for x in ASCOMBES_Q1.iter() {
            sd_calc.add(*x);
        }
        assert_close(sd_calc.get_mean(), 7.50);
        assert_close(sd_calc.get_variance(), 3.752);
        assert_close(sd_calc.get_sd(), 2.0316);
    }

    #[test]
    fn test_merge_matches_sequential() {
        let mut all = RollingSDCalculator::<f64>::default();
        let mut left = RollingSDCalculator::<f64>::default();
        let mut right = RollingSDCalculator::<f64>::default();
        for x in ASCOMBES_Q1.iter() {
            all.add(*x);
            left.add(*x);
        }
        for x in ASCOMBES_Q2.iter() {
            all.add(*x);
            right.add(*x);
        }
        left.merge(&right);
        assert_eq!(left.len(), 22);
        assert_close(left.get_mean(), all.get_mean());
        assert_close(left.get_variance(), all.get_variance());
    }

    #[test]
    fn test_range_by_key_edges() {
        let empty: [f64; 0] = [];
        assert_eq!(range_by_key(&empty, |x| *x, 0., 1.), (0, 0));
        let data = [1.0, 2.0, 3.0];
        assert_eq!(range_by_key(&data, |x| *x, -5., 0.5), (0, 0));
        assert_eq!(range_by_key(&data, |x| *x, 0., 10.), (0, 3));
    }
}
