use std::path::PathBuf;

use ve_core::VeError;

use crate::map_cli_source_path;

pub(crate) fn resolve_dir(raw: &str, flag: &str) -> Result<PathBuf, VeError> {
    let path = PathBuf::from(raw);
    let absolute = if path.is_absolute() {
        path
    } else {
        std::env::current_dir()
            .map_err(map_cli_source_path)?
            .join(path)
    };

    if !absolute.exists() {
        return Err(VeError::new(
            "CLI_SOURCE_NOT_FOUND",
            format!("{} does not exist: {}", flag, absolute.display()),
        ));
    }

    if !absolute.is_dir() {
        return Err(VeError::new(
            "CLI_SOURCE_NOT_DIR",
            format!("{} is not a directory: {}", flag, absolute.display()),
        ));
    }

    Ok(absolute)
}
