//! Utilization statistics utility
//!
//! Provides `UtilizationStats` for computing min/avg/max statistics from
//! a collection of per-bin utilization fractions.

/// Statistics for a collection of utilization measurements
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct UtilizationStats {
    /// Minimum utilization fraction
    pub min: f64,
    /// Maximum utilization fraction
    pub max: f64,
    /// Average utilization fraction
    pub avg: f64,
    /// Number of valid measurements
    pub count: usize,
}

impl UtilizationStats {
    /// Compute statistics from a slice of utilization fractions.
    ///
    /// Filters out non-finite values (NaN, infinity) before computing.
    ///
    /// # Example
    /// ```
    /// use nodefit_common::stats::UtilizationStats;
    ///
    /// let utilizations = vec![0.2, 0.4, 0.6];
    /// let stats = UtilizationStats::from_utilizations(&utilizations);
    /// assert_eq!(stats.min, 0.2);
    /// assert_eq!(stats.max, 0.6);
    /// assert_eq!(stats.count, 3);
    /// ```
    pub fn from_utilizations(utilizations: &[f64]) -> Self {
        let valid: Vec<f64> = utilizations
            .iter()
            .copied()
            .filter(|x| x.is_finite())
            .collect();

        if valid.is_empty() {
            return Self::default();
        }

        let count = valid.len();
        let sum: f64 = valid.iter().sum();
        let min = valid
            .iter()
            .copied()
            .min_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
            .unwrap_or(0.0);
        let max = valid
            .iter()
            .copied()
            .max_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
            .unwrap_or(0.0);

        Self {
            min,
            max,
            avg: sum / count as f64,
            count,
        }
    }

    /// Check if no valid utilizations were provided
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_utilizations() {
        let stats = UtilizationStats::from_utilizations(&[0.5, 0.7, 0.9]);
        assert_eq!(stats.min, 0.5);
        assert_eq!(stats.max, 0.9);
        assert!((stats.avg - 0.7).abs() < 1e-12);
        assert_eq!(stats.count, 3);
    }

    #[test]
    fn test_filters_non_finite() {
        let stats = UtilizationStats::from_utilizations(&[0.5, f64::NAN, f64::INFINITY]);
        assert_eq!(stats.count, 1);
        assert_eq!(stats.min, 0.5);
        assert_eq!(stats.max, 0.5);
    }

    #[test]
    fn test_empty() {
        let stats = UtilizationStats::from_utilizations(&[]);
        assert!(stats.is_empty());
        assert_eq!(stats, UtilizationStats::default());
    }
}
