//! Sample statistics in no-data terms

use super::RasterElement;

/// Whether a sample carries no value: NaN, or equal to the band's no-data
/// value within the float tolerance of [`RasterElement::is_nodata`].
pub fn is_missing(value: f64, nodata: Option<f64>) -> bool {
    value.is_nodata(nodata)
}

/// Min, max and mean over the valid samples of a band or tile.
///
/// With no valid samples the extrema and the mean are NaN.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub valid: usize,
    pub missing: usize,
}

impl SampleStats {
    pub fn from_samples(samples: impl IntoIterator<Item = f64>, nodata: Option<f64>) -> Self {
        let (mut min, mut max, mut sum) = (f64::INFINITY, f64::NEG_INFINITY, 0.0);
        let (mut valid, mut missing) = (0, 0);
        for v in samples {
            if is_missing(v, nodata) {
                missing += 1;
                continue;
            }
            min = min.min(v);
            max = max.max(v);
            sum += v;
            valid += 1;
        }
        if valid == 0 {
            return Self {
                min: f64::NAN,
                max: f64::NAN,
                mean: f64::NAN,
                valid,
                missing,
            };
        }
        Self {
            min,
            max,
            mean: sum / valid as f64,
            valid,
            missing,
        }
    }

    pub fn total(&self) -> usize {
        self.valid + self.missing
    }

    /// Share of valid samples, 0 for an empty input
    pub fn valid_fraction(&self) -> f64 {
        match self.total() {
            0 => 0.0,
            n => self.valid as f64 / n as f64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nodata_match_is_tolerant() {
        assert!(is_missing(-9999.0, Some(-9999.0)));
        assert!(is_missing(0.1 + 0.2, Some(0.3)));
        assert!(is_missing(f64::NAN, None));
        assert!(!is_missing(0.0, None));
        assert!(!is_missing(-9998.0, Some(-9999.0)));
    }

    #[test]
    fn missing_samples_are_counted_apart() {
        let stats = SampleStats::from_samples([1.0, -1.0, f64::NAN, 5.0, -1.0], Some(-1.0));
        assert_eq!((stats.min, stats.max, stats.mean), (1.0, 5.0, 3.0));
        assert_eq!((stats.valid, stats.missing), (2, 3));
        assert!((stats.valid_fraction() - 0.4).abs() < 1e-12);
    }

    #[test]
    fn all_missing_gives_nan() {
        let stats = SampleStats::from_samples([f64::NAN; 3], None);
        assert!(stats.min.is_nan() && stats.mean.is_nan());
        assert_eq!(stats.valid, 0);
        assert_eq!(SampleStats::from_samples([], None).valid_fraction(), 0.0);
    }
}
