//! Drives the mapping of a sequence of labeled scans: each scan is built into its
//! local map, folded into the global map, and the global map is colored once at the end.

use std::path::Path;

use tracing::{debug, info};

use crate::config::FusionConfig;
use crate::error::Sem3dError;
use crate::fusion::{Colorizer, FusionEngine, FusionSummary, LocalSubmapBuilder};
use crate::io::{read_point_cloud, LoadError};
use crate::pointcloud::PointCloud;
use crate::semantics::SemanticDistribution;
use crate::transform::Transform;
use crate::voxel::{VoxelIndex, VoxelMap};

/// A point cloud with the pose of the sensor that captured it.
#[derive(Debug, Clone)]
pub struct Scan {
    /// Used in error messages, usually the file path.
    pub name: String,
    pub cloud: PointCloud,
    pub origin: Transform,
}

impl Scan {
    pub fn new<S: ToString>(name: S, cloud: PointCloud, origin: Transform) -> Self {
        Self {
            name: name.to_string(),
            cloud,
            origin,
        }
    }

    /// Reads a scan file, see [`read_point_cloud`].
    ///
    /// # Arguments
    ///
    /// * `filepath` - Text or PLY scan.
    /// * `origin` - Sensor to world pose of the scan.
    pub fn load<P: AsRef<Path>>(filepath: P, origin: Transform) -> Result<Self, Sem3dError> {
        let name = filepath.as_ref().display().to_string();
        let geometry = read_point_cloud(&filepath).map_err(|err| match err {
            LoadError::ParseError(reason) => Sem3dError::malformed_scan(&name, reason),
            LoadError::IO(err) => Sem3dError::Io(err),
        })?;
        debug!(
            scan = %name,
            points = geometry.len_vertices(),
            extra_columns = geometry.extra_columns(),
            "scan loaded"
        );
        Ok(Self::new(name, PointCloud::from_geometry(geometry), origin))
    }
}

/// Owns the global map and folds scans into it one at a time.
pub struct SemanticMapper {
    config: FusionConfig,
    global: VoxelMap,
    builder: LocalSubmapBuilder,
    engine: FusionEngine,
    num_scans: usize,
}

impl SemanticMapper {
    /// # Arguments
    ///
    /// * `config` - Validated on creation.
    /// * `num_classes` - Length of every scan label, one class per input scan in the
    ///   usual setup.
    pub fn new(config: FusionConfig, num_classes: usize) -> Result<Self, Sem3dError> {
        config.validate()?;
        let global = VoxelMap::new(config.resolution, config.occupancy.clone())?;
        let builder =
            LocalSubmapBuilder::new(num_classes, config.resolution, config.occupancy.clone())?;
        let engine = FusionEngine::new(config.incompatible_evidence);
        Ok(Self {
            config,
            global,
            builder,
            engine,
            num_scans: 0,
        })
    }

    pub fn config(&self) -> &FusionConfig {
        &self.config
    }

    pub fn num_classes(&self) -> usize {
        self.builder.num_classes()
    }

    /// Number of scans fused so far.
    pub fn num_scans(&self) -> usize {
        self.num_scans
    }

    /// Integrates a scan whose points all belong to `class`.
    pub fn integrate(&mut self, scan: &Scan, class: usize) -> Result<FusionSummary, Sem3dError> {
        let label = SemanticDistribution::one_hot(self.num_classes(), class)?;
        self.integrate_labeled(scan, &label)
    }

    /// Integrates a scan with an arbitrary class distribution applied to all its points.
    pub fn integrate_labeled(
        &mut self,
        scan: &Scan,
        label: &SemanticDistribution,
    ) -> Result<FusionSummary, Sem3dError> {
        let local = self
            .builder
            .build(&scan.cloud, label, &scan.origin)
            .map_err(|err| err.in_scan(&scan.name))?;
        debug!(scan = %scan.name, voxels = local.len(), "local map built");
        self.integrate_local(local)
    }

    /// Fuses a local map built elsewhere, e.g. by [`SemanticMapper::build_local_maps`].
    pub fn integrate_local(&mut self, local: VoxelMap) -> Result<FusionSummary, Sem3dError> {
        let summary = self.engine.fuse(local, &mut self.global)?;
        self.num_scans += 1;
        Ok(summary)
    }

    /// Builds the local maps of `scans` in parallel, scan `i` labeled with class `i`.
    /// Fusing them in order with [`SemanticMapper::integrate_local`] gives the same
    /// map as integrating the scans one by one.
    pub fn build_local_maps(&self, scans: &[Scan]) -> Result<Vec<VoxelMap>, Sem3dError> {
        let labels = (0..scans.len())
            .map(|class| SemanticDistribution::one_hot(self.num_classes(), class))
            .collect::<Result<Vec<_>, _>>()?;
        let inputs = scans
            .iter()
            .zip(labels.iter())
            .map(|(scan, label)| (&scan.cloud, label, &scan.origin))
            .collect::<Vec<_>>();

        self.builder
            .build_many(&inputs)
            .into_iter()
            .zip(scans)
            .map(|(local, scan)| local.map_err(|err| err.in_scan(&scan.name)))
            .collect()
    }

    /// Colors the global map with the configured palette, threshold and rule.
    ///
    /// # Returns
    ///
    /// The number of colored voxels.
    pub fn colorize(&mut self) -> Result<usize, Sem3dError> {
        let colorizer = Colorizer::new(self.config.class_colors(self.num_classes()))
            .with_threshold(self.config.color_threshold)
            .with_rule(self.config.color_rule);
        let colored = colorizer.colorize(&mut self.global)?;
        info!(
            voxels = self.global.len(),
            colored,
            scans = self.num_scans,
            "map colored"
        );
        Ok(colored)
    }

    pub fn global(&self) -> &VoxelMap {
        &self.global
    }

    pub fn into_map(self) -> VoxelMap {
        self.global
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use ndarray::array;
    use rstest::{fixture, rstest};

    use super::*;
    use crate::color::CLASS_COLORS;
    use crate::fusion::IncompatibleEvidencePolicy;
    use crate::io::export;
    use crate::unit_test::{line_of_points, write_scan_file};
    use crate::voxel::VoxelKey;

    #[fixture]
    fn config() -> FusionConfig {
        FusionConfig::default().with_resolution(0.1)
    }

    fn scan(cloud: PointCloud) -> Scan {
        Scan::new("scan", cloud, Transform::eye())
    }

    #[rstest]
    fn test_disjoint_scans_keep_prior(config: FusionConfig, line_of_points: PointCloud) {
        let mut mapper = SemanticMapper::new(config, 5).unwrap();
        let first = mapper.integrate(&scan(line_of_points.clone()), 0).unwrap();
        let second = mapper.integrate(&scan(line_of_points), 1).unwrap();

        assert_eq!(first.num_fused, 0);
        assert_eq!(second.num_incompatible, 3);
        assert_eq!(mapper.num_scans(), 2);

        let end = mapper.global().lookup(&VoxelKey::new(0, 0, 5)).unwrap();
        assert_eq!(
            end.semantics.as_ref().unwrap().as_slice(),
            &[1.0, 0.0, 0.0, 0.0, 0.0]
        );
    }

    #[rstest]
    fn test_disjoint_scans_fail_when_strict(config: FusionConfig, line_of_points: PointCloud) {
        let config = config.with_incompatible_evidence(IncompatibleEvidencePolicy::Fail);
        let mut mapper = SemanticMapper::new(config, 5).unwrap();
        mapper.integrate(&scan(line_of_points.clone()), 0).unwrap();

        let result = mapper.integrate(&scan(line_of_points), 1);
        assert!(matches!(
            result,
            Err(Sem3dError::IncompatibleEvidence { key }) if key == VoxelKey::new(0, 0, 1)
        ));
        assert_eq!(mapper.num_scans(), 1);
    }

    #[rstest]
    fn test_colorize_uses_class_palette(config: FusionConfig, line_of_points: PointCloud) {
        let mut mapper = SemanticMapper::new(config, 5).unwrap();
        mapper.integrate(&scan(line_of_points), 2).unwrap();

        assert_eq!(mapper.colorize().unwrap(), 3);
        let map = mapper.into_map();
        let end = map.lookup(&VoxelKey::new(0, 0, 3)).unwrap();
        assert_eq!(end.color, Some(CLASS_COLORS[2]));
        let free = map.lookup(&VoxelKey::new(0, 0, 0)).unwrap();
        assert_eq!(free.color, None);
    }

    #[rstest]
    fn test_parallel_build_matches_sequential(config: FusionConfig) {
        let scans = vec![
            scan(PointCloud::from_points(array![[0.05, 0.05, 0.55], [0.25, 0.05, 0.05]])),
            scan(PointCloud::from_points(array![[0.05, 0.35, 0.05]])),
            scan(PointCloud::from_points(array![[0.45, 0.45, 0.45]])),
        ];

        let mut sequential = SemanticMapper::new(config.clone(), 3).unwrap();
        for (class, scan) in scans.iter().enumerate() {
            sequential.integrate(scan, class).unwrap();
        }

        let mut parallel = SemanticMapper::new(config, 3).unwrap();
        for local in parallel.build_local_maps(&scans).unwrap() {
            parallel.integrate_local(local).unwrap();
        }

        assert_eq!(export(sequential.global()), export(parallel.global()));
    }

    #[rstest]
    fn test_more_scans_than_classes(config: FusionConfig, line_of_points: PointCloud) {
        let mapper = SemanticMapper::new(config, 1).unwrap();
        let scans = vec![scan(line_of_points.clone()), scan(line_of_points)];
        assert!(matches!(
            mapper.build_local_maps(&scans),
            Err(Sem3dError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_unaddressable_point_names_scan() {
        let mut mapper = SemanticMapper::new(FusionConfig::default(), 2).unwrap();
        let bad = Scan::new(
            "bad.xyz",
            PointCloud::from_points(array![[0.0, f32::INFINITY, 0.0]]),
            Transform::eye(),
        );
        match mapper.integrate(&bad, 0) {
            Err(Sem3dError::MalformedScanInput { scan, .. }) => assert_eq!(scan, "bad.xyz"),
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn test_load_scan_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.xyz");
        write_scan_file(&path, &array![[0.1, 0.2, 0.3], [1.0, 2.0, 3.0]]);

        let scan = Scan::load(&path, Transform::eye()).unwrap();
        assert_eq!(scan.cloud.len(), 2);
        assert!(scan.name.ends_with("scan.xyz"));
    }

    #[test]
    fn test_load_keeps_extra_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("labeled.xyz");
        std::fs::write(&path, "0.1 0.2 0.3 4\n1.0 2.0 3.0 2\n").unwrap();

        let scan = Scan::load(&path, Transform::eye()).unwrap();
        assert_eq!(scan.cloud.len(), 2);
        assert_eq!(scan.cloud.extra, Some(array![[4.0], [2.0]]));
    }

    #[test]
    fn test_load_malformed_scan() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.xyz");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "0.1 0.2 0.3\n0.1 oops 0.3").unwrap();

        match Scan::load(&path, Transform::eye()) {
            Err(Sem3dError::MalformedScanInput { scan, reason }) => {
                assert!(scan.ends_with("broken.xyz"));
                assert!(reason.contains(":2:"), "{reason}");
            }
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn test_load_missing_file() {
        assert!(matches!(
            Scan::load("/definitely/not/here.xyz", Transform::eye()),
            Err(Sem3dError::Io(_))
        ));
    }
}
