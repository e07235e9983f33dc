use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::{error, info};

use slurm_run_python::slurm::submit::SubmissionError;

/// Run a Python module as a SLURM batch job
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// YAML file describing the cluster: partition, log_directory, conda and spack setup
    cluster_params: PathBuf,
    /// YAML file describing the job: entry_point, memory, num_cpus, num_gpus, job_name
    job_params: PathBuf,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    info!("Submitting {} with cluster parameters {}", args.job_params.display(), args.cluster_params.display());

    match slurm_run_python::run(&args.cluster_params, &args.job_params) {
        Ok(submission) => {
            print!("{}", submission.stdout);
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("{err:#}");
            ExitCode::from(exit_status(&err))
        }
    }
}

/// Mirror the submission command's exit code when it failed, otherwise exit with 1
fn exit_status(err: &anyhow::Error) -> u8 {
    err.downcast_ref::<SubmissionError>()
        .and_then(SubmissionError::exit_code)
        .and_then(|code| u8::try_from(code).ok())
        .filter(|code| *code != 0)
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use anyhow::Context;
    use slurm_run_python::params::ParameterError;

    use super::*;

    #[test]
    fn submission_failures_keep_their_exit_code() {
        let failed = SubmissionError::Failed { command: "sbatch".to_string(), code: 3, stderr: String::new() };
        assert_eq!(exit_status(&anyhow::Error::new(failed)), 3);

        let wrapped: anyhow::Result<()> = Err(SubmissionError::Failed {
            command: "sbatch".to_string(),
            code: 7,
            stderr: String::new(),
        })
        .context("Can't submit job");
        assert_eq!(exit_status(&wrapped.unwrap_err()), 7);
    }

    #[test]
    fn other_failures_exit_with_one() {
        let missing = ParameterError::Missing("memory".to_string());
        assert_eq!(exit_status(&anyhow::Error::new(missing)), 1);

        let killed = SubmissionError::Terminated { command: "sbatch".to_string(), stderr: String::new() };
        assert_eq!(exit_status(&anyhow::Error::new(killed)), 1);

        let out_of_range = SubmissionError::Failed { command: "sbatch".to_string(), code: 256, stderr: String::new() };
        assert_eq!(exit_status(&anyhow::Error::new(out_of_range)), 1);
    }
}
