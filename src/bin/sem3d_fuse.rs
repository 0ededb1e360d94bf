use std::path::PathBuf;
use std::process::ExitCode;

use clap::{CommandFactory, Parser};
use kdam::tqdm;
use sem3d::{
    config::FusionConfig,
    error::Sem3dError,
    fusion::{ColorRule, FusionSummary, IncompatibleEvidencePolicy},
    io::{export, write_map_json, write_voxel_ply},
    pipeline::{Scan, SemanticMapper},
    transform::Transform,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Fuses labeled scans into one semantic occupancy map. The i-th scan labels all its
/// points with class i.
#[derive(Parser)]
#[command(name = "sem3d-fuse")]
struct Args {
    /// Scan files, whitespace separated `x y z ...` text or PLY
    scans: Vec<PathBuf>,
    /// Where to write the fused map as JSON
    #[arg(long, short, default_value = "semantic_color_scan.json")]
    output: PathBuf,
    /// Also writes the occupied voxels as a colored PLY point cloud
    #[arg(long)]
    ply: Option<PathBuf>,
    /// JSON configuration file, the other options override it
    #[arg(long, short)]
    config: Option<PathBuf>,
    /// Voxel size in meters
    #[arg(long, short)]
    resolution: Option<f32>,
    /// Minimum class probability for a voxel to take the class color
    #[arg(long, short)]
    threshold: Option<f32>,
    /// Colors by the most probable class instead of the last one above the threshold
    #[arg(long, action)]
    argmax: bool,
    /// Stops at the first voxel with incompatible class evidence
    #[arg(long, action)]
    strict: bool,
    /// Builds the local maps of all scans in parallel before fusing them
    #[arg(long, short, action)]
    parallel: bool,
    /// Sensor pose shared by all scans as x,y,z,roll,pitch,yaw
    #[arg(long, value_parser = Transform::parse_pose6d, allow_hyphen_values = true)]
    origin: Option<Transform>,
    /// Logs every scan insertion
    #[arg(long, short, action)]
    verbose: bool,
}

impl Args {
    fn fusion_config(&self) -> Result<FusionConfig, Sem3dError> {
        let mut config = match &self.config {
            Some(path) => FusionConfig::load(path)?,
            None => FusionConfig::default(),
        };
        if let Some(resolution) = self.resolution {
            config = config.with_resolution(resolution);
        }
        if let Some(threshold) = self.threshold {
            config = config.with_color_threshold(threshold);
        }
        if self.argmax {
            config = config.with_color_rule(ColorRule::ArgmaxAboveThreshold);
        }
        if self.strict {
            config = config.with_incompatible_evidence(IncompatibleEvidencePolicy::Fail);
        }
        config.validate()?;
        Ok(config)
    }
}

fn run(args: &Args) -> Result<(), Sem3dError> {
    let config = args.fusion_config()?;
    let origin = args.origin.clone().unwrap_or_default();
    let mut mapper = SemanticMapper::new(config, args.scans.len())?;
    let mut total = FusionSummary::default();

    if args.parallel {
        let scans = args
            .scans
            .iter()
            .map(|path| Scan::load(path, origin.clone()))
            .collect::<Result<Vec<_>, _>>()?;
        let locals = mapper.build_local_maps(&scans)?;
        for local in tqdm!(locals.into_iter(), total = scans.len(), desc = "Fusing scans") {
            total += mapper.integrate_local(local)?;
        }
    } else {
        for (class, path) in tqdm!(
            args.scans.iter().enumerate(),
            total = args.scans.len(),
            desc = "Fusing scans"
        ) {
            let scan = Scan::load(path, origin.clone())?;
            total += mapper.integrate(&scan, class)?;
        }
    }
    eprintln!();

    mapper.colorize()?;
    info!(
        added = total.num_added,
        fused = total.num_fused,
        incompatible = total.num_incompatible,
        "all scans fused"
    );

    write_map_json(&args.output, &export(mapper.global()))?;
    info!(path = %args.output.display(), "map written");
    if let Some(ply) = &args.ply {
        let count = write_voxel_ply(ply, mapper.global(), 0.5)?;
        info!(path = %ply.display(), voxels = count, "occupied voxels written");
    }

    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();

    let filter = if args.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if args.scans.is_empty() {
        eprintln!("{}", Args::command().render_usage());
        return ExitCode::from(1);
    }

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            ExitCode::from(1)
        }
    }
}
