use std::env;
use std::path::{self, Path, PathBuf};

use anyhow::{Context, Result};
use log::info;

use crate::params::{ParameterError, Parameters};
use crate::slurm::memory::MemoryAmount;

/// Everything needed to render and submit one Python job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRequest {
    /// Python module run with `python -m`
    pub entry_point: String,
    /// Passed to the entry point as its only argument
    pub param_file: PathBuf,
    pub partition: String,
    pub working_directory: PathBuf,
    pub num_gpus: u32,
    pub num_cpus: u32,
    /// May contain `/`s, which become log subdirectories
    pub job_name: String,
    pub memory: MemoryAmount,
    /// Keep the rendered script here instead of in a temporary directory
    pub slurm_script_path: Option<PathBuf>,
    pub echo_template: bool,
}

impl JobRequest {
    /// Read a job request from parameters, with job-level keys already merged over cluster-level ones
    pub fn from_parameters(params: &Parameters, param_file: &Path) -> Result<JobRequest> {
        let entry_point = params.string("entry_point")?;
        let memory: MemoryAmount = params.string("memory")?.parse()?;
        let working_directory = match params.optional_creatable_directory("working_directory")? {
            Some(directory) => directory,
            None => env::current_dir().context("Can't read the current directory")?,
        };
        let num_gpus = params.integer("num_gpus", Some(0), 0..=i64::from(u32::MAX))?;
        let num_cpus = params.integer("num_cpus", Some(1), 1..=i64::from(u32::MAX))?;
        let job_name = params
            .optional_string("job_name")?
            .unwrap_or_else(|| entry_point.clone());
        validate_job_name(&job_name)?;
        let param_file = path::absolute(param_file)
            .with_context(|| format!("Can't resolve parameter file {}", param_file.display()))?;

        let request = JobRequest {
            entry_point,
            param_file,
            partition: params.string("partition")?,
            working_directory,
            num_gpus: u32::try_from(num_gpus)?,
            num_cpus: u32::try_from(num_cpus)?,
            job_name,
            memory,
            slurm_script_path: params.optional_creatable_file("slurm_script_path")?,
            echo_template: params.boolean("echo_template", false)?,
        };
        info!("Job {} requests {} CPU(s), {} GPU(s) and {} on partition {}",
            request.job_name, request.num_cpus, request.num_gpus, request.memory, request.partition);

        Ok(request)
    }
}

/// Job names become log subdirectories and script file names, so they must stay relative and
/// can't step outside the directory they're joined onto
pub fn validate_job_name(job_name: &str) -> Result<(), ParameterError> {
    let invalid = |reason| ParameterError::InvalidJobName { name: job_name.to_string(), reason };
    if job_name.starts_with('/') {
        return Err(invalid("must not start with `/`"));
    }
    for part in job_name.split('/') {
        match part {
            "" => return Err(invalid("must not contain empty components")),
            "." | ".." => return Err(invalid("must not contain `.` or `..` components")),
            _ => {}
        }
    }
    Ok(())
}
