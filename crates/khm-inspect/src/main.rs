//! khm-inspect - decode KHM models and log what they contain

use std::{
    fs,
    path::{Path, PathBuf},
    process::ExitCode,
};

use bytes::Bytes;
use clap::Parser;
use khm_asset::{
    animation::StartTimePolicy,
    storage::{RecordArray, Storage},
    DecodeError, LoadParams, ModelDefinition, ModelLoader,
};
use log::{error, info};

#[derive(Parser)]
#[command(name = "khm-inspect")]
#[command(about = "Decode KHM model files and print a summary")]
#[command(version)]
struct Cli {
    /// KHM files to decode
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Keep animations with a nonzero start time, shifted to start at 0
    #[arg(long, conflicts_with = "strict_start_time")]
    shift_start_time: bool,

    /// Fail on animations with a nonzero start time
    #[arg(long)]
    strict_start_time: bool,

    /// Keep the second texture coordinate channel
    #[arg(long = "keep-uv1")]
    keep_uv1: bool,

    /// Let the model own the file buffer
    #[arg(long, conflicts_with = "owned")]
    shared: bool,

    /// Copy every array out of the file buffer
    #[arg(long)]
    owned: bool,
}

impl Cli {
    fn start_time_policy(&self) -> StartTimePolicy {
        if self.shift_start_time {
            StartTimePolicy::Shift
        } else if self.strict_start_time {
            StartTimePolicy::Reject
        } else {
            StartTimePolicy::Discard
        }
    }

    fn load_params(&self, path: &Path) -> LoadParams {
        LoadParams {
            source_name: Some(path.display().to_string()),
            start_time_policy: self.start_time_policy(),
            retain_secondary_tex_coords: self.keep_uv1,
        }
    }
}

fn summarize<S: Storage>(model: &ModelDefinition<S>) {
    let source = model.source.as_deref().unwrap_or("<memory>");
    info!(
        "{}: {:?} model, {} bones, {} helpers",
        source,
        model.ownership(),
        model.bones.len(),
        model.helpers.len()
    );
    for bone in model.bones.iter() {
        info!("  bone {} {:?} parent {:?}", bone.id, bone.name(), bone.parent());
    }
    for helper in model.helpers.iter() {
        info!(
            "  helper {} {:?} parent {:?}",
            helper.id,
            helper.name(),
            helper.parent()
        );
    }

    match &model.mesh {
        Some(mesh) => {
            info!(
                "  mesh {:?}: {} vertices, {} triangles, skinned: {}, colors: {}",
                mesh.object.name(),
                mesh.vertex_count(),
                mesh.triangle_count(),
                mesh.has_skin(),
                mesh.colors.is_some()
            );
            info!(
                "  bounds {} .. {}, volume {}",
                mesh.bounds_min, mesh.bounds_max, mesh.volume
            );
            for shape in &mesh.collisions {
                info!(
                    "  collision {:?}, volume {:?}",
                    shape.shape_type(),
                    shape.volume()
                );
            }
        }
        None => info!("  no mesh"),
    }

    match &model.animation {
        Some(animation) => info!(
            "  animation: {} nodes, {} frames, {:.3}ms per frame, {:.3}ms total",
            animation.node_count,
            animation.frame_count,
            animation.frame_duration_ms,
            animation.duration_ms()
        ),
        None => info!("  no animation"),
    }

    if let Some(mask) = &model.animation_mask {
        for entry in mask.entries.iter() {
            info!(
                "  mask {:?}: {}",
                entry.object_name(),
                if entry.enabled() { "animated" } else { "masked" }
            );
        }
    }
}

fn inspect(cli: &Cli, path: &Path, data: Vec<u8>) -> Result<(), DecodeError> {
    let loader = ModelLoader::new(cli.load_params(path));
    if cli.shared {
        summarize(&loader.load_shared(Bytes::from(data))?);
    } else if cli.owned {
        summarize(&loader.load_owned(&data)?);
    } else {
        summarize(&loader.load(&data)?);
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let mut failed = false;
    for path in &cli.files {
        let data = match fs::read(path) {
            Ok(data) => data,
            Err(err) => {
                error!("Failed to read {}: {}", path.display(), err);
                failed = true;
                continue;
            }
        };
        if let Err(err) = inspect(&cli, path, data) {
            error!("Failed to decode {}: {}", path.display(), err);
            failed = true;
        }
    }

    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
