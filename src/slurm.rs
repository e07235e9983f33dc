//! Render batch scripts from job requests and submit them to SLURM

/// Memory requests and their `--mem` spelling
pub mod memory;

/// Job parameters are read into a JobRequest defined here
pub mod job_request;

/// Render the batch script template and run the submission
pub mod job;

/// Write batch scripts to disk and run sbatch on them
pub mod submit;
