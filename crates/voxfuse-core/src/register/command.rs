use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::debug;

use crate::io::{read_volume, write_volume};
use crate::resample::resample_like;
use crate::volume::Volume;

use super::{Registration, RegistrationFailure, TransformArtifact, ViewRegistrar};

/// Argument list in the style of `crlRigidRegistration -t 2 fixed moving out tfm`.
pub fn default_command_args() -> Vec<String> {
    ["-t", "2", "{fixed}", "{moving}", "{output}", "{transform}"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Delegates alignment to an external rigid-registration program.
///
/// Both volumes are written to `scratch_dir`, the program is run with
/// `args` after placeholder substitution, and the aligned volume is read
/// back and put on the fixed grid.
pub struct CommandRegistrar {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub scratch_dir: PathBuf,
    /// Volume file extension handed to the program, e.g. `.nii.gz`.
    pub extension: String,
    counter: AtomicUsize,
}

impl CommandRegistrar {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>, scratch_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args,
            scratch_dir: scratch_dir.into(),
            extension: ".nii.gz".into(),
            counter: AtomicUsize::new(0),
        }
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    fn expand_args(&self, fixed: &Path, moving: &Path, output: &Path, transform: &Path) -> Vec<String> {
        self.args
            .iter()
            .map(|arg| {
                arg.replace("{fixed}", &fixed.to_string_lossy())
                    .replace("{moving}", &moving.to_string_lossy())
                    .replace("{output}", &output.to_string_lossy())
                    .replace("{transform}", &transform.to_string_lossy())
            })
            .collect()
    }
}

impl ViewRegistrar for CommandRegistrar {
    fn name(&self) -> &str {
        "command"
    }

    fn register(
        &self,
        fixed: &Volume,
        moving: &Volume,
    ) -> Result<Registration, RegistrationFailure> {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        let ext = &self.extension;
        let fixed_path = self.scratch_dir.join(format!("rigid_fixed_{n}{ext}"));
        let moving_path = self.scratch_dir.join(format!("rigid_moving_{n}{ext}"));
        let output_path = self.scratch_dir.join(format!("rigid_out_{n}{ext}"));
        let transform_path = self.scratch_dir.join(format!("rigid_{n}.tfm"));

        write_volume(&fixed_path, fixed)
            .map_err(|e| RegistrationFailure::new(format!("writing fixed volume: {e}")))?;
        write_volume(&moving_path, moving)
            .map_err(|e| RegistrationFailure::new(format!("writing moving volume: {e}")))?;

        let args = self.expand_args(&fixed_path, &moving_path, &output_path, &transform_path);
        debug!(program = %self.program.display(), ?args, "Running external registration");

        let output = Command::new(&self.program)
            .args(&args)
            .output()
            .map_err(|e| {
                RegistrationFailure::new(format!("failed to start {}: {e}", self.program.display()))
            })?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RegistrationFailure::new(format!(
                "{} exited with {}: {}",
                self.program.display(),
                output.status,
                stderr.trim()
            )));
        }
        if !output_path.exists() {
            return Err(RegistrationFailure::new(format!(
                "{} produced no output at {}",
                self.program.display(),
                output_path.display()
            )));
        }

        let aligned = read_volume(&output_path)
            .map_err(|e| RegistrationFailure::new(format!("reading aligned volume: {e}")))?;
        let volume = if aligned.geometry.same_grid(&fixed.geometry) {
            aligned
        } else {
            resample_like(&aligned, &fixed.geometry)
                .map_err(|e| RegistrationFailure::new(e.to_string()))?
        };

        Ok(Registration {
            volume,
            transform: TransformArtifact::External {
                path: transform_path,
            },
        })
    }
}
