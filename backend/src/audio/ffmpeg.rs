use std::path::{Path, PathBuf};

use log::{info, warn};

/// Resolve the executable for an external audio tool.
///
/// An explicit override always wins. Otherwise the tool is looked up on
/// `PATH`; when that fails the bare program name is returned so the failure
/// surfaces at spawn time instead of at startup.
pub fn resolve_tool(override_path: Option<&Path>, program: &str) -> PathBuf {
    if let Some(path) = override_path {
        info!("Using configured {} at: {}", program, path.display());
        return path.to_path_buf();
    }

    match which::which(program) {
        Ok(path) => {
            info!("Using {} at: {}", program, path.display());
            path
        }
        Err(e) => {
            warn!("{} not found on PATH ({}); audio processing will fail until it is installed", program, e);
            PathBuf::from(program)
        }
    }
}

/// Build a tokio command for an external tool with stdin closed.
pub(crate) fn tool_command(program: &Path) -> tokio::process::Command {
    let mut command = tokio::process::Command::new(program);
    command.stdin(std::process::Stdio::null());

    // Hide console window on Windows
    #[cfg(target_os = "windows")]
    {
        const CREATE_NO_WINDOW: u32 = 0x08000000;
        command.creation_flags(CREATE_NO_WINDOW);
    }

    command
}
