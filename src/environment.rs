//! Environment activation snippets spliced into the batch script
//!
//! Both resolvers return `None` when their tool isn't configured, so a job can use conda, Spack,
//! both, or neither.

use crate::params::ParameterError;

/// conda: source the install's profile script and activate a named environment
pub mod conda;

/// Spack: source the setup script, then activate an environment or load packages
pub mod spack;

#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    #[error("`{0}` and `{1}` are mutually exclusive")]
    MutuallyExclusive(&'static str, &'static str),
    #[error("a Spack configuration requires either an environment or a non-empty list of packages, but not both")]
    MissingSpackActivation,
    #[error("expected a package specifier of the form package@version but got `{0}`")]
    InvalidPackageSpecifier(String),
    #[error(transparent)]
    Parameter(#[from] ParameterError),
}
