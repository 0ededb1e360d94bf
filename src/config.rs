use std::path::Path;

use serde_derive::{Deserialize, Serialize};

use crate::color::{default_palette, Rgb};
use crate::error::Sem3dError;
use crate::fusion::{ColorRule, IncompatibleEvidencePolicy, DEFAULT_COLOR_THRESHOLD};
use crate::voxel::OccupancyParams;

/// Settings of a mapping run. Missing fields in a JSON file take their default.
///
/// ```json
/// {
///     "resolution": 0.05,
///     "occupancy": { "prob_hit": 0.7, "prob_miss": 0.4, "max_range": 20.0 },
///     "incompatible_evidence": "keep_prior",
///     "color_threshold": 0.3,
///     "color_rule": "last_above_threshold",
///     "palette": ["#ff0000", "#00ff00"]
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    /// Voxel edge length in meters.
    pub resolution: f32,
    pub occupancy: OccupancyParams,
    pub incompatible_evidence: IncompatibleEvidencePolicy,
    pub color_threshold: f32,
    pub color_rule: ColorRule,
    /// Colors by class index, [`default_palette`] when absent.
    #[serde(with = "palette_serde")]
    pub palette: Option<Vec<Rgb>>,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            resolution: 0.05,
            occupancy: OccupancyParams::default(),
            incompatible_evidence: IncompatibleEvidencePolicy::default(),
            color_threshold: DEFAULT_COLOR_THRESHOLD,
            color_rule: ColorRule::default(),
            palette: None,
        }
    }
}

impl FusionConfig {
    /// Reads a JSON configuration file.
    pub fn load<P: AsRef<Path>>(filepath: P) -> Result<Self, Sem3dError> {
        let buffer = std::io::BufReader::new(std::fs::File::open(filepath)?);
        let config: Self = serde_json::from_reader(buffer)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), Sem3dError> {
        if !(self.resolution.is_finite() && self.resolution > 0.0) {
            return Err(Sem3dError::invalid_parameter(format!(
                "Resolution must be positive, got {}",
                self.resolution
            )));
        }
        if !(0.0..1.0).contains(&self.color_threshold) {
            return Err(Sem3dError::invalid_parameter(format!(
                "Color threshold must be in [0, 1), got {}",
                self.color_threshold
            )));
        }
        self.occupancy.validate()
    }

    pub fn with_resolution(mut self, resolution: f32) -> Self {
        self.resolution = resolution;
        self
    }

    pub fn with_occupancy(mut self, occupancy: OccupancyParams) -> Self {
        self.occupancy = occupancy;
        self
    }

    pub fn with_incompatible_evidence(mut self, policy: IncompatibleEvidencePolicy) -> Self {
        self.incompatible_evidence = policy;
        self
    }

    pub fn with_color_threshold(mut self, threshold: f32) -> Self {
        self.color_threshold = threshold;
        self
    }

    pub fn with_color_rule(mut self, rule: ColorRule) -> Self {
        self.color_rule = rule;
        self
    }

    pub fn with_palette(mut self, palette: Option<Vec<Rgb>>) -> Self {
        self.palette = palette;
        self
    }

    /// The configured palette or a default one with `num_classes` colors.
    pub fn class_colors(&self, num_classes: usize) -> Vec<Rgb> {
        self.palette
            .clone()
            .unwrap_or_else(|| default_palette(num_classes))
    }
}

/// Palettes are written as `#rrggbb` strings.
mod palette_serde {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::color::Rgb;

    pub fn serialize<S: Serializer>(
        palette: &Option<Vec<Rgb>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match palette {
            Some(palette) => serializer.collect_seq(palette.iter().map(|c| c.to_string())),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Vec<Rgb>>, D::Error> {
        Option::<Vec<String>>::deserialize(deserializer)?
            .map(|colors| {
                colors
                    .iter()
                    .map(|c| c.parse::<Rgb>().map_err(D::Error::custom))
                    .collect()
            })
            .transpose()
    }
}
