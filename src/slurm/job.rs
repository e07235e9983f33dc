use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use log::info;
use serde::Serialize;

use crate::environment::conda::CondaConfiguration;
use crate::environment::spack::SpackConfiguration;
use crate::environment::ConfigurationError;
use crate::params::Parameters;
use crate::slurm::job_request::JobRequest;
use crate::slurm::submit::{self, ScriptLocation, Submission};
use crate::template;

/// Partitions anyone can use, at the risk of being pre-empted at any time
pub const PREEMPTIBLE_PARTITIONS: [&str; 2] = ["ephemeral", "scavenge"];

/// Default command used to submit batch scripts
pub const SBATCH: &str = "sbatch";

/// Project partitions are billed to an account; preemptible ones select a quality of service
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulingDirective {
    QualityOfService(String),
    Account(String),
}

impl SchedulingDirective {
    pub fn for_partition(partition: &str) -> SchedulingDirective {
        if PREEMPTIBLE_PARTITIONS.contains(&partition) {
            SchedulingDirective::QualityOfService(partition.to_string())
        } else {
            SchedulingDirective::Account(partition.to_string())
        }
    }
}

impl fmt::Display for SchedulingDirective {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SchedulingDirective::QualityOfService(partition) => write!(f, "#SBATCH --qos={partition}"),
            SchedulingDirective::Account(partition) => write!(f, "#SBATCH --account={partition}"),
        }
    }
}

/// Gets the directory to write a job's log to.
///
/// This is `log_base_directory` unless the job name contains `/`s. If so, every `/`-separated
/// component except the last becomes a directory level under `log_base_directory`; the last one
/// names the log file itself.
///
/// For example, job name `foo/bar/baz` with base `/home/fred/logs` gives `/home/fred/logs/foo/bar`.
pub fn job_log_directory(log_base_directory: &Path, job_name: &str) -> PathBuf {
    let mut parts: Vec<&str> = job_name.split('/').collect();
    parts.pop();
    parts
        .into_iter()
        .fold(log_base_directory.to_path_buf(), |directory, part| directory.join(part))
}

/// `<log directory>/<last job name component>.log`
pub fn job_log_path(log_base_directory: &Path, job_name: &str) -> PathBuf {
    let file_stem = job_name.rsplit('/').next().unwrap_or(job_name);
    job_log_directory(log_base_directory, job_name).join(format!("{file_stem}.log"))
}

/// Renders batch scripts for Python entry points and submits them
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlurmPythonRunner {
    log_base_directory: PathBuf,
    conda: Option<CondaConfiguration>,
    spack: Option<SpackConfiguration>,
    node_list: Option<String>,
    submission_command: String,
}

/// Rendering context for the batch script
#[derive(Serialize)]
struct SbatchContext {
    time_now: String,
    scheduling_directive: String,
    partition: String,
    job_name: String,
    stdout_log_path: String,
    node_list: Option<String>,
    memory: String,
    num_gpus: u32,
    num_cpus: u32,
    conda_lines: String,
    spack_lines: String,
    working_directory: String,
    entry_point: String,
    param_file: String,
}

impl SlurmPythonRunner {
    pub fn new(
        log_base_directory: PathBuf,
        conda: Option<CondaConfiguration>,
        spack: Option<SpackConfiguration>,
    ) -> SlurmPythonRunner {
        SlurmPythonRunner {
            log_base_directory,
            conda,
            spack,
            node_list: None,
            submission_command: SBATCH.to_string(),
        }
    }

    pub fn with_node_list(mut self, node_list: Option<String>) -> SlurmPythonRunner {
        self.node_list = node_list;
        self
    }

    pub fn with_submission_command(mut self, command: impl Into<String>) -> SlurmPythonRunner {
        self.submission_command = command.into();
        self
    }

    pub fn from_parameters(params: &Parameters) -> Result<SlurmPythonRunner, ConfigurationError> {
        let log_base_directory = params.creatable_directory("log_directory")?;
        let conda = CondaConfiguration::from_parameters(params)?;
        let spack = SpackConfiguration::from_parameters(params)?;
        let submission_command = params
            .optional_string("submission_command")?
            .unwrap_or_else(|| SBATCH.to_string());

        Ok(SlurmPythonRunner::new(log_base_directory, conda, spack)
            .with_node_list(params.optional_string("node_list")?)
            .with_submission_command(submission_command))
    }

    pub fn log_base_directory(&self) -> &Path {
        &self.log_base_directory
    }

    /// Render the complete batch script for `request`
    pub fn render(&self, request: &JobRequest) -> Result<String> {
        /// included batch script template
        static SBATCH_TEMPLATE: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/data/templates/sbatch.txt"));

        let conda_lines = match &self.conda {
            Some(conda) => conda.sbatch_lines().context("Can't render conda activation")?,
            None => String::new(),
        };
        let spack_lines = match &self.spack {
            Some(spack) => spack.sbatch_lines().context("Can't render spack setup")?,
            None => String::new(),
        };

        let context = SbatchContext {
            time_now: Utc::now().to_string(),
            scheduling_directive: SchedulingDirective::for_partition(&request.partition).to_string(),
            partition: request.partition.clone(),
            job_name: request.job_name.clone(),
            stdout_log_path: job_log_path(&self.log_base_directory, &request.job_name).display().to_string(),
            node_list: self.node_list.clone(),
            memory: request.memory.to_slurm_string(),
            num_gpus: request.num_gpus,
            num_cpus: request.num_cpus,
            conda_lines,
            spack_lines,
            working_directory: request.working_directory.display().to_string(),
            entry_point: request.entry_point.clone(),
            param_file: request.param_file.display().to_string(),
        };

        info!("Rendering batch script for job {}", request.job_name);
        template::render("sbatch", SBATCH_TEMPLATE, &context).context("Can't render batch script")
    }

    /// Render the script, write it out, and hand it to the submission command.
    ///
    /// Without a `slurm_script_path` the script goes in a temporary directory that's deleted
    /// before this returns, whether or not submission succeeded.
    pub fn run_entry_point(&self, request: &JobRequest) -> Result<Submission> {
        self.run_entry_point_echoing_to(request, &mut io::stdout())
    }

    /// Like [`SlurmPythonRunner::run_entry_point`], echoing the script to `echo` when requested
    pub fn run_entry_point_echoing_to<W: Write>(&self, request: &JobRequest, echo: &mut W) -> Result<Submission> {
        let script = self.render(request)?;

        let log_directory = job_log_directory(&self.log_base_directory, &request.job_name);
        fs::create_dir_all(&log_directory)
            .with_context(|| format!("Can't create log directory {}", log_directory.display()))?;

        let location = ScriptLocation::new(request.slurm_script_path.as_deref(), &request.job_name)
            .context("Can't create a location for the batch script")?;
        location
            .write(&script)
            .with_context(|| format!("Can't write batch script to {}", location.path().display()))?;

        if request.echo_template {
            writeln!(echo, "{script}").context("Can't echo batch script")?;
        }

        let submission = submit::run_sbatch(&self.submission_command, location.path())?;
        Ok(submission)
    }
}
