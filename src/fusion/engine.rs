use itertools::Itertools;
use serde_derive::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::Sem3dError;
use crate::semantics::{DisjointSupport, SemanticDistribution};
use crate::voxel::{VoxelIndex, VoxelKey};

/// What to do with a voxel whose local and global class distributions have disjoint
/// support, so that their product is zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncompatibleEvidencePolicy {
    /// Keep the global semantics of the voxel, still fuse its occupancy, and go on.
    #[default]
    KeepPrior,
    /// Abort the fusion of the scan, leaving the global map untouched.
    Fail,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FusionSummary {
    /// Voxels seen for the first time, copied from the local map.
    pub num_added: usize,
    /// Voxels already in the global map, fused with the local evidence.
    pub num_fused: usize,
    /// Fused voxels whose semantics were left as they were because of disjoint support.
    pub num_incompatible: usize,
}

impl std::ops::AddAssign for FusionSummary {
    fn add_assign(&mut self, rhs: Self) {
        self.num_added += rhs.num_added;
        self.num_fused += rhs.num_fused;
        self.num_incompatible += rhs.num_incompatible;
    }
}

/// Fuses two independent occupancy estimates given as log-odds.
///
/// Equivalent to [`fuse_occupancy_probability`] on the corresponding probabilities,
/// but stable near 0 and 1.
pub fn fuse_occupancy(local_logodds: f32, global_logodds: f32) -> f32 {
    local_logodds + global_logodds
}

/// Independent opinion pool of two occupancy probabilities:
/// `pl·pg / (pl·pg + (1 − pl)·(1 − pg))`.
pub fn fuse_occupancy_probability(local: f64, global: f64) -> f64 {
    let occupied = local * global;
    occupied / (occupied + (1.0 - local) * (1.0 - global))
}

/// Merges finished local maps into the global map.
#[derive(Debug, Clone, Default)]
pub struct FusionEngine {
    policy: IncompatibleEvidencePolicy,
}

impl FusionEngine {
    pub fn new(policy: IncompatibleEvidencePolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> IncompatibleEvidencePolicy {
        self.policy
    }

    /// Folds `local` into `global`. Voxels unseen by `global` are copied, the others get
    /// their log-odds added and their class distributions multiplied and renormalized.
    ///
    /// The whole local map is checked before `global` is modified, so an error leaves
    /// `global` as it was. Voxels are visited in key order, the error of the smallest
    /// offending key is returned.
    ///
    /// # Arguments
    ///
    /// * `local` - The local map of one scan, consumed.
    /// * `global` - The persistent map, same resolution as `local`.
    pub fn fuse<L, G>(&self, local: L, global: &mut G) -> Result<FusionSummary, Sem3dError>
    where
        L: VoxelIndex,
        G: VoxelIndex,
    {
        if (local.resolution() - global.resolution()).abs() > f32::EPSILON {
            return Err(Sem3dError::invalid_parameter(format!(
                "Local map resolution {} differs from global map resolution {}",
                local.resolution(),
                global.resolution()
            )));
        }

        let mut summary = FusionSummary::default();
        let mut add_list = Vec::new();
        let mut update_list = Vec::new();

        for (key, local_state) in local.into_leaves().sorted_by_key(|(key, _)| *key) {
            let Some(global_state) = global.lookup(&key) else {
                add_list.push((key, local_state));
                continue;
            };

            let occupancy_logodds = fuse_occupancy(
                local_state.occupancy_logodds,
                global_state.occupancy_logodds,
            );
            let semantics = match self.fuse_semantics(
                key,
                local_state.semantics,
                global_state.semantics.as_ref(),
            )? {
                SemanticUpdate::Store(semantics) => Some(semantics),
                SemanticUpdate::Keep => None,
                SemanticUpdate::Incompatible => {
                    warn!(%key, "incompatible semantic evidence, keeping prior semantics");
                    summary.num_incompatible += 1;
                    None
                }
            };
            update_list.push((key, occupancy_logodds, semantics));
        }

        summary.num_added = add_list.len();
        summary.num_fused = update_list.len();

        for (key, state) in add_list {
            let created = global.create_or_update(key, state.occupancy_logodds);
            created.semantics = state.semantics;
            created.num_points = state.num_points;
            created.color = state.color;
        }

        for (key, occupancy_logodds, semantics) in update_list {
            if let Some(state) = global.lookup_mut(&key) {
                state.occupancy_logodds = occupancy_logodds;
                if semantics.is_some() {
                    state.semantics = semantics;
                }
            }
        }

        info!(
            added = summary.num_added,
            fused = summary.num_fused,
            incompatible = summary.num_incompatible,
            "fused local map"
        );
        Ok(summary)
    }

    /// Combines the class distributions of one voxel.
    fn fuse_semantics(
        &self,
        key: VoxelKey,
        local: Option<SemanticDistribution>,
        global: Option<&SemanticDistribution>,
    ) -> Result<SemanticUpdate, Sem3dError> {
        match (local, global) {
            (Some(local), Some(global)) => {
                if local.num_classes() != global.num_classes() {
                    return Err(Sem3dError::invalid_parameter(format!(
                        "Voxel {key}: local semantics have {} classes, global {}",
                        local.num_classes(),
                        global.num_classes()
                    )));
                }
                match (local.fuse(global), self.policy) {
                    (Ok(fused), _) => Ok(SemanticUpdate::Store(fused)),
                    (Err(DisjointSupport), IncompatibleEvidencePolicy::KeepPrior) => {
                        Ok(SemanticUpdate::Incompatible)
                    }
                    (Err(DisjointSupport), IncompatibleEvidencePolicy::Fail) => {
                        Err(Sem3dError::IncompatibleEvidence { key })
                    }
                }
            }
            (Some(local), None) => Ok(SemanticUpdate::Store(local)),
            (None, _) => Ok(SemanticUpdate::Keep),
        }
    }
}

enum SemanticUpdate {
    Store(SemanticDistribution),
    Keep,
    Incompatible,
}
