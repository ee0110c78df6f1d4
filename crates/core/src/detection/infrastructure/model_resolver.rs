use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::shared::constants::{
    APP_DIR_NAME, FINALIZE_MODEL_NAME, LOCAL_MODEL_DIR, PROPOSAL_MODEL_NAME, REFINE_MODEL_NAME,
};

#[derive(Error, Debug)]
pub enum ModelResolveError {
    #[error("model {name} not found; searched {}", join_paths(.searched))]
    NotFound {
        name: &'static str,
        searched: Vec<PathBuf>,
    },
    #[error("could not determine the platform data directory")]
    NoDataDir,
}

/// Locations of the three cascade models.
#[derive(Clone, Debug, PartialEq)]
pub struct ModelPaths {
    pub proposal: PathBuf,
    pub refine: PathBuf,
    pub finalize: PathBuf,
}

/// Find all three models.
///
/// Resolution order:
/// 1. `explicit_dir`, when given
/// 2. `./infer_models`
/// 3. The platform data directory
///
/// Each model is looked up independently, so a user directory may override
/// just one of them.
pub fn resolve_models(explicit_dir: Option<&Path>) -> Result<ModelPaths, ModelResolveError> {
    let dirs = search_dirs(explicit_dir);
    Ok(ModelPaths {
        proposal: resolve_in(PROPOSAL_MODEL_NAME, &dirs)?,
        refine: resolve_in(REFINE_MODEL_NAME, &dirs)?,
        finalize: resolve_in(FINALIZE_MODEL_NAME, &dirs)?,
    })
}

/// Directories searched for models, most specific first.
pub fn search_dirs(explicit_dir: Option<&Path>) -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    if let Some(dir) = explicit_dir {
        dirs.push(dir.to_path_buf());
    }
    dirs.push(PathBuf::from(LOCAL_MODEL_DIR));
    match model_data_dir() {
        Ok(dir) => dirs.push(dir),
        Err(e) => log::warn!("Skipping data directory lookup: {e}"),
    }
    dirs
}

/// First existing `dir/name` among `dirs`.
pub fn resolve_in(name: &'static str, dirs: &[PathBuf]) -> Result<PathBuf, ModelResolveError> {
    dirs.iter()
        .map(|dir| dir.join(name))
        .find(|path| path.is_file())
        .ok_or_else(|| ModelResolveError::NotFound {
            name,
            searched: dirs.to_vec(),
        })
}

/// Platform-specific model directory.
///
/// - macOS: `~/Library/Application Support/facecascade/models/`
/// - Linux: `$XDG_DATA_HOME/facecascade/models/` or `~/.local/share/facecascade/models/`
/// - Windows: `%APPDATA%/facecascade/models/`
pub fn model_data_dir() -> Result<PathBuf, ModelResolveError> {
    dirs::data_dir()
        .map(|d| d.join(APP_DIR_NAME).join("models"))
        .ok_or(ModelResolveError::NoDataDir)
}

fn join_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
