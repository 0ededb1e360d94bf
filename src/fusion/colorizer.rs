use serde_derive::{Deserialize, Serialize};

use crate::color::Rgb;
use crate::error::Sem3dError;
use crate::semantics::SemanticDistribution;
use crate::voxel::VoxelIndex;

pub const DEFAULT_COLOR_THRESHOLD: f32 = 0.3;

/// How a color is picked when more than one class clears the threshold.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorRule {
    /// Classes are visited in index order and each one above the threshold overwrites the
    /// color, so the highest index above the threshold wins even if it is not the most
    /// probable class.
    #[default]
    LastAboveThreshold,
    /// The most probable class, if it clears the threshold.
    ArgmaxAboveThreshold,
}

/// Paints the voxels of a fused map with the color of their dominant class.
#[derive(Debug, Clone)]
pub struct Colorizer {
    class_colors: Vec<Rgb>,
    threshold: f32,
    rule: ColorRule,
}

impl Colorizer {
    /// A colorizer with the default threshold and rule.
    ///
    /// # Arguments
    ///
    /// * `class_colors` - Color of each class, by class index.
    pub fn new(class_colors: Vec<Rgb>) -> Self {
        Self {
            class_colors,
            threshold: DEFAULT_COLOR_THRESHOLD,
            rule: ColorRule::default(),
        }
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_rule(mut self, rule: ColorRule) -> Self {
        self.rule = rule;
        self
    }

    /// Color for a class distribution, `None` when no class is above the threshold.
    pub fn color_of(&self, semantics: &SemanticDistribution) -> Option<Rgb> {
        match self.rule {
            ColorRule::LastAboveThreshold => semantics
                .iter()
                .enumerate()
                .filter(|(_, p)| *p > self.threshold)
                .last()
                .and_then(|(class, _)| self.class_colors.get(class).copied()),
            ColorRule::ArgmaxAboveThreshold => {
                let (class, p) = semantics.argmax();
                if p > self.threshold {
                    self.class_colors.get(class).copied()
                } else {
                    None
                }
            }
        }
    }

    /// Sets the color of every voxel that has semantics. The color only depends on
    /// the semantics, running it again gives the same colors.
    ///
    /// # Returns
    ///
    /// The number of colored voxels.
    pub fn colorize<I: VoxelIndex>(&self, map: &mut I) -> Result<usize, Sem3dError> {
        let num_classes = map
            .leaves()
            .filter_map(|(_, state)| state.semantics.as_ref())
            .map(SemanticDistribution::num_classes)
            .max()
            .unwrap_or(0);
        if num_classes > self.class_colors.len() {
            return Err(Sem3dError::invalid_parameter(format!(
                "The map has {num_classes} classes but only {} class colors were given",
                self.class_colors.len()
            )));
        }

        let mut num_colored = 0;
        for (_, state) in map.leaves_mut() {
            if let Some(semantics) = &state.semantics {
                state.color = self.color_of(semantics);
                if state.color.is_some() {
                    num_colored += 1;
                }
            }
        }

        Ok(num_colored)
    }
}
