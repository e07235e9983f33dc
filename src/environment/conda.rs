use std::path::{Path, PathBuf};

use log::info;
use serde::Serialize;

use crate::params::{ParameterError, Parameters};
use crate::template::{self, TemplateError};

pub const CONDA_ENVIRONMENT_PARAM: &str = "conda_environment";
pub const CONDA_BASE_PATH_PARAM: &str = "conda_base_path";

/// A conda install plus the environment to activate inside it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CondaConfiguration {
    conda_base_path: PathBuf,
    conda_environment: String,
}

/// Rendering context for the conda snippet
#[derive(Serialize)]
struct CondaContext {
    conda_base_path: String,
    conda_environment: String,
}

impl CondaConfiguration {
    pub fn new(conda_base_path: PathBuf, conda_environment: String) -> CondaConfiguration {
        CondaConfiguration { conda_base_path, conda_environment }
    }

    /// Conda is only configured when an environment is named; the base path is then required
    pub fn from_parameters(params: &Parameters) -> Result<Option<CondaConfiguration>, ParameterError> {
        if !params.contains(CONDA_ENVIRONMENT_PARAM) {
            return Ok(None);
        }

        let conda_base_path = params.existing_directory(CONDA_BASE_PATH_PARAM)?;
        let conda_environment = params.string(CONDA_ENVIRONMENT_PARAM)?;
        info!("Using conda environment {} from {}", conda_environment, conda_base_path.display());

        Ok(Some(CondaConfiguration::new(conda_base_path, conda_environment)))
    }

    pub fn base_path(&self) -> &Path {
        &self.conda_base_path
    }

    pub fn environment(&self) -> &str {
        &self.conda_environment
    }

    pub fn sbatch_lines(&self) -> Result<String, TemplateError> {
        /// included conda activation template
        static CONDA: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/data/templates/conda.txt"));
        let context = CondaContext {
            conda_base_path: self.conda_base_path.display().to_string(),
            conda_environment: self.conda_environment.clone(),
        };
        template::render("conda", CONDA, &context)
    }
}
