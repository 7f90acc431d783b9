use std::path::{Path, PathBuf};

use async_trait::async_trait;
use log::{debug, warn};

use super::ffmpeg::tool_command;

/// Best-effort duration lookup. `None` means unknown, never an error.
#[async_trait]
pub trait DurationProbe: Send + Sync {
    async fn probe_seconds(&self, path: &Path) -> Option<f64>;
}

pub struct FfprobeDurationProbe {
    ffprobe: PathBuf,
}

impl FfprobeDurationProbe {
    pub fn new(ffprobe: PathBuf) -> Self {
        Self { ffprobe }
    }
}

#[async_trait]
impl DurationProbe for FfprobeDurationProbe {
    async fn probe_seconds(&self, path: &Path) -> Option<f64> {
        let output = tool_command(&self.ffprobe)
            .args([
                "-i",
                &path.display().to_string(),
                "-show_entries",
                "format=duration",
                "-v",
                "quiet",
                "-of",
                "csv=p=0",
            ])
            .output()
            .await;

        let output = match output {
            Ok(output) => output,
            Err(e) => {
                warn!("ffprobe unavailable, continuing without duration: {}", e);
                return None;
            }
        };

        if !output.status.success() {
            debug!("ffprobe exited with {} for {}", output.status, path.display());
            return None;
        }

        let duration = parse_duration_output(&String::from_utf8_lossy(&output.stdout));
        if duration.is_none() {
            debug!("ffprobe returned no usable duration for {}", path.display());
        }
        duration
    }
}

pub(crate) fn parse_duration_output(stdout: &str) -> Option<f64> {
    let seconds = stdout.trim().parse::<f64>().ok()?;
    if !seconds.is_finite() || seconds < 0.0 {
        return None;
    }
    Some(seconds)
}
