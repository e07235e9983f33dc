//! Generate SLURM batch scripts for Python entry points and submit them
//!
//! Two YAML parameter files drive everything: one describing the cluster (partition, log
//! directory, conda and Spack installs) and one describing the job (entry point, memory, CPUs,
//! GPUs). Job-level keys override cluster-level ones.

use std::path::Path;

use anyhow::{Context, Result};
use log::info;

use crate::params::Parameters;
use crate::slurm::job::SlurmPythonRunner;
use crate::slurm::job_request::JobRequest;
use crate::slurm::submit::Submission;

/// conda and Spack activation snippets
pub mod environment;
/// YAML parameter loading and validation
pub mod params;
pub mod slurm;
mod template;

/// Load both parameter files, render the job's batch script and submit it
pub fn run(cluster_param_file: &Path, job_param_file: &Path) -> Result<Submission> {
    let cluster_params = Parameters::load(cluster_param_file)?;
    let job_params = Parameters::load(job_param_file)?;
    let params = cluster_params.with_overrides(&job_params);

    let runner = SlurmPythonRunner::from_parameters(&params).context("Invalid cluster configuration")?;
    let request = JobRequest::from_parameters(&params, job_param_file).context("Invalid job configuration")?;
    let submission = runner.run_entry_point(&request)?;
    info!("Submitted {}", request.job_name);

    Ok(submission)
}
