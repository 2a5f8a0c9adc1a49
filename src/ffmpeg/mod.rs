use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, error, info};

use crate::error::TrimError;
use crate::settings::TrimRange;

/// FFmpeg wrapper that cuts a time range out of a video without re-encoding.
///
/// Stream copy is fast and lossless but cuts land on keyframes, so the
/// result can start slightly before the requested offset.
#[derive(Debug, Clone)]
pub struct Trimmer {
    program: PathBuf,
}

impl Trimmer {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Argument vector passed to the media tool
    pub fn args(input: &Path, range: &TrimRange, output: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "-i".into(),
            input.into(),
            "-ss".into(),
            range.start.as_str().into(),
            "-c:v".into(),
            "copy".into(),
            "-c:a".into(),
            "copy".into(),
        ];
        if let Some(end) = &range.end {
            args.push("-to".into());
            args.push(end.as_str().into());
        }
        args.push(output.into());
        args
    }

    fn build_command(&self, input: &Path, range: &TrimRange, output: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(Self::args(input, range, output));
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        // Dropping the pending future (cancellation, timeout) stops the tool
        cmd.kill_on_drop(true);
        cmd
    }

    /// Run the media tool. A non-zero exit yields [`TrimError::Failed`]
    /// carrying the tool's standard error.
    pub async fn trim(
        &self,
        input: &Path,
        range: &TrimRange,
        output: &Path,
    ) -> Result<(), TrimError> {
        let mut cmd = self.build_command(input, range, output);
        debug!("Executing media tool: {:?}", cmd);

        let output_result = cmd.output().await.map_err(TrimError::Spawn)?;

        if !output_result.status.success() {
            let stderr = String::from_utf8_lossy(&output_result.stderr)
                .trim()
                .to_string();
            error!("Trim failed: {}", stderr);
            return Err(TrimError::Failed {
                code: output_result.status.code(),
                stderr,
            });
        }

        info!("✂️ Trimmed {:?} -> {:?}", input, output);
        Ok(())
    }
}
