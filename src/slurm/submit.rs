use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};
use std::process::Command;

use log::{info, warn};
use tempfile::TempDir;

#[derive(Debug, thiserror::Error)]
pub enum SubmissionError {
    #[error("can't run `{command}`: {source}")]
    Spawn { command: String, source: io::Error },
    #[error("`{command}` exited with code {code}: {stderr}")]
    Failed { command: String, code: i32, stderr: String },
    #[error("`{command}` was terminated by a signal: {stderr}")]
    Terminated { command: String, stderr: String },
}

impl SubmissionError {
    /// The submission command's own exit code, if it got far enough to have one
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            SubmissionError::Failed { code, .. } => Some(*code),
            _ => None,
        }
    }
}

/// Where a batch script lives until it's been submitted
///
/// A temporary location owns its directory: dropping it deletes the script, on success or
/// failure. A persistent location is left alone.
#[derive(Debug)]
pub enum ScriptLocation {
    Persistent(PathBuf),
    Temporary { _dir: TempDir, path: PathBuf },
}

impl ScriptLocation {
    /// Use `requested` if set, otherwise `<job name>.sbatch` in a fresh temporary directory
    pub fn new(requested: Option<&Path>, job_name: &str) -> io::Result<ScriptLocation> {
        match requested {
            Some(path) => Ok(ScriptLocation::Persistent(path.to_path_buf())),
            None => {
                if !Path::new(job_name).components().all(|part| matches!(part, Component::Normal(_))) {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidInput,
                        format!("job name `{job_name}` would place the script outside its temporary directory"),
                    ));
                }
                let dir = tempfile::Builder::new().prefix("slurm-run-python").tempdir()?;
                let path = dir.path().join(format!("{job_name}.sbatch"));
                // job names with slashes nest inside the temporary directory
                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent)?;
                }
                Ok(ScriptLocation::Temporary { _dir: dir, path })
            }
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            ScriptLocation::Persistent(path) => path.as_path(),
            ScriptLocation::Temporary { path, .. } => path.as_path(),
        }
    }

    pub fn write(&self, script: &str) -> io::Result<()> {
        info!("Writing batch script to {}", self.path().display());
        let mut file = File::create(self.path())?;
        file.write_all(script.as_bytes())?;
        Ok(())
    }
}

/// The outcome of a successful submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub script_path: PathBuf,
    pub stdout: String,
    /// Parsed from sbatch's `Submitted batch job <id>` line
    pub job_id: Option<u32>,
}

/// Run `<command> <script>` and wait for it to finish
pub fn run_sbatch(command: &str, script: &Path) -> Result<Submission, SubmissionError> {
    let mut sbatch = Command::new(command);
    let cmd = sbatch.arg(script);
    info!("Running {:?}", &cmd);

    let output = cmd.output().map_err(|source| SubmissionError::Spawn {
        command: command.to_string(),
        source,
    })?;
    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

    if !output.status.success() {
        warn!("{command} failed: {stderr}");
        return Err(match output.status.code() {
            Some(code) => SubmissionError::Failed { command: command.to_string(), code, stderr },
            None => SubmissionError::Terminated { command: command.to_string(), stderr },
        });
    }

    let job_id = parse_job_id(&stdout);
    match job_id {
        Some(id) => info!("SLURM job id: {id}"),
        None => info!("{command} didn't report a job id"),
    }

    Ok(Submission { script_path: script.to_path_buf(), stdout, job_id })
}

fn parse_job_id(stdout: &str) -> Option<u32> {
    stdout
        .lines()
        .find_map(|line| line.trim().strip_prefix("Submitted batch job "))
        .and_then(|id| id.trim().parse().ok())
}
