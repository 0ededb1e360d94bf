use ordered_float::OrderedFloat;
use serde_derive::{Deserialize, Serialize};

use crate::error::Sem3dError;

/// Tolerance used to accept a distribution as normalized.
pub const NORMALIZATION_TOLERANCE: f32 = 1e-4;

/// A probability distribution over the semantic classes of a voxel.
///
/// The values are non-negative and always sum to one (within
/// [`NORMALIZATION_TOLERANCE`]). The only way to build one is through
/// constructors that check this.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f32>", into = "Vec<f32>")]
pub struct SemanticDistribution(Vec<f32>);

/// Returned by [`SemanticDistribution::fuse`] when no class has mass in both
/// distributions. Overlapping masses too small for an `f32` product still fuse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisjointSupport;

impl SemanticDistribution {
    /// Validates and wraps a vector of class probabilities.
    ///
    /// # Arguments
    ///
    /// * `values` - One value per class, non-negative, summing to one.
    pub fn new(values: Vec<f32>) -> Result<Self, Sem3dError> {
        if values.is_empty() {
            return Err(Sem3dError::invalid_parameter(
                "A semantic distribution needs at least one class",
            ));
        }

        if values.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return Err(Sem3dError::invalid_parameter(format!(
                "Class probabilities must be finite and non-negative, got {values:?}"
            )));
        }

        let sum: f32 = values.iter().sum();
        if (sum - 1.0).abs() > NORMALIZATION_TOLERANCE {
            return Err(Sem3dError::invalid_parameter(format!(
                "Class probabilities must sum to 1, got {sum}"
            )));
        }

        Ok(Self(values))
    }

    /// All the mass on `class`.
    ///
    /// # Arguments
    ///
    /// * `num_classes` - Length of the distribution.
    /// * `class` - The class index that receives probability one.
    pub fn one_hot(num_classes: usize, class: usize) -> Result<Self, Sem3dError> {
        if class >= num_classes {
            return Err(Sem3dError::invalid_parameter(format!(
                "Class {class} out of range for {num_classes} classes"
            )));
        }
        let mut values = vec![0.0; num_classes];
        values[class] = 1.0;
        Ok(Self(values))
    }

    pub fn num_classes(&self) -> usize {
        self.0.len()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn get(&self, class: usize) -> Option<f32> {
        self.0.get(class).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = f32> + '_ {
        self.0.iter().copied()
    }

    /// Index and value of the most probable class. Ties go to the lowest index.
    pub fn argmax(&self) -> (usize, f32) {
        self.0
            .iter()
            .copied()
            .enumerate()
            .rev()
            .max_by_key(|(_, p)| OrderedFloat(*p))
            .unwrap_or((0, 0.0))
    }

    /// Folds one more observation into a running mean, where `self` is the mean of
    /// `count` previous observations.
    ///
    /// Every observation weights the same. A convex combination of two normalized
    /// distributions is normalized, so no renormalization is needed.
    ///
    /// # Arguments
    ///
    /// * `observation` - The new observation, with the same number of classes.
    /// * `count` - How many observations are already averaged in `self`, at least one.
    pub fn accumulate_mean(&mut self, observation: &SemanticDistribution, count: u32) {
        debug_assert_eq!(self.num_classes(), observation.num_classes());
        let n = (count + 1) as f32;
        for (mean, obs) in self.0.iter_mut().zip(observation.0.iter()) {
            *mean += (obs - *mean) / n;
        }
    }

    /// Fuses two independent class estimates: elementwise product followed by
    /// renormalization.
    ///
    /// The product is taken in `f64`, where the product of any two positive `f32`
    /// values is positive, so only a true lack of common support fails.
    ///
    /// # Returns
    ///
    /// The fused distribution, or [`DisjointSupport`] when no class has mass in both.
    pub fn fuse(&self, other: &SemanticDistribution) -> Result<Self, DisjointSupport> {
        debug_assert_eq!(self.num_classes(), other.num_classes());
        let product: Vec<f64> = self
            .0
            .iter()
            .zip(other.0.iter())
            .map(|(a, b)| *a as f64 * *b as f64)
            .collect();

        let factor: f64 = product.iter().sum();
        if factor <= 0.0 || !factor.is_finite() {
            return Err(DisjointSupport);
        }

        Ok(Self(
            product.into_iter().map(|v| (v / factor) as f32).collect(),
        ))
    }
}

impl TryFrom<Vec<f32>> for SemanticDistribution {
    type Error = Sem3dError;

    fn try_from(values: Vec<f32>) -> Result<Self, Self::Error> {
        Self::new(values)
    }
}

impl From<SemanticDistribution> for Vec<f32> {
    fn from(distribution: SemanticDistribution) -> Self {
        distribution.0
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use rstest::rstest;

    use super::*;

    fn dist(values: &[f32]) -> SemanticDistribution {
        SemanticDistribution::new(values.to_vec()).unwrap()
    }

    #[rstest]
    #[case(vec![])]
    #[case(vec![0.5, 0.4])]
    #[case(vec![1.5, -0.5])]
    #[case(vec![f32::NAN, 1.0])]
    fn test_rejects_invalid_distributions(#[case] values: Vec<f32>) {
        assert!(SemanticDistribution::new(values).is_err());
    }

    #[test]
    fn test_one_hot() {
        let d = SemanticDistribution::one_hot(5, 3).unwrap();
        assert_eq!(d.as_slice(), &[0.0, 0.0, 0.0, 1.0, 0.0]);
        assert!(SemanticDistribution::one_hot(5, 5).is_err());
    }

    #[test]
    fn test_running_mean_weights_each_point_equally() {
        let a = SemanticDistribution::one_hot(3, 0).unwrap();
        let b = SemanticDistribution::one_hot(3, 1).unwrap();

        let mut mean = a.clone();
        mean.accumulate_mean(&a, 1);
        mean.accumulate_mean(&b, 2);

        assert_abs_diff_eq!(mean.as_slice()[0], 2.0 / 3.0, epsilon = 1e-6);
        assert_abs_diff_eq!(mean.as_slice()[1], 1.0 / 3.0, epsilon = 1e-6);
        assert_abs_diff_eq!(mean.iter().sum::<f32>(), 1.0, epsilon = 1e-6);
    }

    #[rstest]
    #[case(&[0.2, 0.3, 0.5], &[0.6, 0.3, 0.1])]
    #[case(&[0.1, 0.1, 0.6, 0.1, 0.1], &[0.5, 0.5, 0.0, 0.0, 0.0])]
    #[case(&[1.0, 0.0], &[0.3, 0.7])]
    fn test_fused_distribution_is_normalized(#[case] a: &[f32], #[case] b: &[f32]) {
        let fused = dist(a).fuse(&dist(b)).unwrap();
        assert_abs_diff_eq!(fused.iter().sum::<f32>(), 1.0, epsilon = 1e-5);
        assert!(fused.iter().all(|v| v.is_finite() && v >= 0.0));
    }

    #[test]
    fn test_fuse_is_product_of_likelihoods() {
        let fused = dist(&[0.2, 0.8]).fuse(&dist(&[0.5, 0.5])).unwrap();
        assert_abs_diff_eq!(fused.as_slice()[0], 0.2, epsilon = 1e-6);
        assert_abs_diff_eq!(fused.as_slice()[1], 0.8, epsilon = 1e-6);

        let fused = dist(&[0.2, 0.8]).fuse(&dist(&[0.8, 0.2])).unwrap();
        assert_abs_diff_eq!(fused.as_slice()[0], 0.5, epsilon = 1e-6);
    }

    #[test]
    fn test_disjoint_one_hots_do_not_fuse() {
        let a = SemanticDistribution::one_hot(5, 0).unwrap();
        let b = SemanticDistribution::one_hot(5, 1).unwrap();
        assert_eq!(a.fuse(&b), Err(DisjointSupport));
    }

    #[test]
    fn test_tiny_common_mass_is_not_disjoint() {
        let a = dist(&[1e-30, 1.0, 0.0]);
        let b = dist(&[1e-30, 0.0, 1.0]);
        let fused = a.fuse(&b).unwrap();
        assert_eq!(fused.as_slice(), &[1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_fuse_is_commutative_and_associative() {
        let a = dist(&[0.2, 0.3, 0.5]);
        let b = dist(&[0.6, 0.3, 0.1]);
        let c = dist(&[0.1, 0.8, 0.1]);

        let abc = a.fuse(&b).unwrap().fuse(&c).unwrap();
        let cba = c.fuse(&b).unwrap().fuse(&a).unwrap();
        for (x, y) in abc.iter().zip(cba.iter()) {
            assert_abs_diff_eq!(x, y, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_argmax_prefers_lowest_index_on_ties() {
        assert_eq!(dist(&[0.1, 0.1, 0.6, 0.1, 0.1]).argmax().0, 2);
        assert_eq!(dist(&[0.4, 0.4, 0.2]).argmax().0, 0);
    }

    #[test]
    fn test_serde_validates() {
        let d: SemanticDistribution = serde_json::from_str("[0.25, 0.75]").unwrap();
        assert_eq!(d.as_slice(), &[0.25, 0.75]);
        assert!(serde_json::from_str::<SemanticDistribution>("[0.25, 0.25]").is_err());
    }
}
