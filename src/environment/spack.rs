use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use log::info;
use nonempty::NonEmpty;
use serde::Serialize;

use crate::environment::ConfigurationError;
use crate::params::{self, Parameters};
use crate::template::{self, TemplateError};

pub const SPACK_ROOT_PARAM: &str = "spack_root";
pub const SPACK_ENVIRONMENT_PARAM: &str = "spack_environment";
pub const SPACK_PACKAGES_PARAM: &str = "spack_packages";

/// A single `package@version` spack specifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpackPackage {
    pub package_name: String,
    pub version: String,
}

impl FromStr for SpackPackage {
    type Err = ConfigurationError;

    fn from_str(specifier: &str) -> Result<Self, Self::Err> {
        match specifier.split('@').collect::<Vec<_>>().as_slice() {
            [name, version] if !name.is_empty() && !version.is_empty() => Ok(SpackPackage {
                package_name: name.to_string(),
                version: version.to_string(),
            }),
            _ => Err(ConfigurationError::InvalidPackageSpecifier(specifier.to_string())),
        }
    }
}

impl fmt::Display for SpackPackage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}@{}", self.package_name, self.version)
    }
}

/// How the job's spack dependencies get activated
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpackActivation {
    /// `spack env activate <name>`
    Environment(String),
    /// one `spack load` per package, in order
    Packages(NonEmpty<SpackPackage>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpackConfiguration {
    spack_root: PathBuf,
    activation: SpackActivation,
}

/// Rendering context for the spack snippet
#[derive(Serialize)]
struct SpackContext {
    spack_root: String,
    spack_environment: Option<String>,
    spack_packages: Vec<String>,
}

impl SpackConfiguration {
    /// Build a configuration from exactly one of an environment name or a list of packages
    pub fn new(
        spack_root: PathBuf,
        spack_environment: Option<String>,
        spack_packages: Vec<SpackPackage>,
    ) -> Result<SpackConfiguration, ConfigurationError> {
        let spack_environment = spack_environment.filter(|name| !name.is_empty());
        let activation = match (spack_environment, NonEmpty::from_vec(spack_packages)) {
            (Some(environment), None) => SpackActivation::Environment(environment),
            (None, Some(packages)) => SpackActivation::Packages(packages),
            _ => return Err(ConfigurationError::MissingSpackActivation),
        };
        Ok(SpackConfiguration { spack_root, activation })
    }

    pub fn from_parameters(params: &Parameters) -> Result<Option<SpackConfiguration>, ConfigurationError> {
        let has_environment = params.contains(SPACK_ENVIRONMENT_PARAM);
        let has_packages = params.contains(SPACK_PACKAGES_PARAM);

        if has_environment && has_packages {
            return Err(ConfigurationError::MutuallyExclusive(SPACK_ENVIRONMENT_PARAM, SPACK_PACKAGES_PARAM));
        }
        if !has_environment && !has_packages {
            return Ok(None);
        }

        let spack_root = params.existing_directory(SPACK_ROOT_PARAM)?;
        let configuration = if has_environment {
            let environment = params.string(SPACK_ENVIRONMENT_PARAM)?;
            info!("Using spack environment {} from {}", environment, spack_root.display());
            SpackConfiguration::new(spack_root, Some(environment), Vec::new())?
        } else {
            let packages = parse_packages(params)?;
            info!("Loading {} spack package(s) from {}", packages.len(), spack_root.display());
            SpackConfiguration::new(spack_root, None, packages)?
        };

        Ok(Some(configuration))
    }

    pub fn root(&self) -> &Path {
        &self.spack_root
    }

    pub fn activation(&self) -> &SpackActivation {
        &self.activation
    }

    pub fn sbatch_lines(&self) -> Result<String, TemplateError> {
        /// included spack setup template
        static SPACK: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/data/templates/spack.txt"));
        let (spack_environment, spack_packages) = match &self.activation {
            SpackActivation::Environment(name) => (Some(name.clone()), Vec::new()),
            SpackActivation::Packages(packages) => (None, packages.iter().map(ToString::to_string).collect()),
        };
        let context = SpackContext {
            spack_root: self.spack_root.display().to_string(),
            spack_environment,
            spack_packages,
        };
        template::render("spack", SPACK, &context)
    }
}

fn parse_packages(params: &Parameters) -> Result<Vec<SpackPackage>, ConfigurationError> {
    params
        .arbitrary_list(SPACK_PACKAGES_PARAM)?
        .iter()
        .map(|value| -> Result<SpackPackage, ConfigurationError> {
            let specifier = value
                .as_str()
                .ok_or_else(|| params::wrong_type(SPACK_PACKAGES_PARAM, "a list of package@version strings", value))?;
            specifier.parse()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::ParameterError;

    fn package(name: &str, version: &str) -> SpackPackage {
        SpackPackage { package_name: name.to_string(), version: version.to_string() }
    }

    #[test]
    fn parses_package_specifiers() {
        assert_eq!("cuda@9.0.176".parse::<SpackPackage>().unwrap(), package("cuda", "9.0.176"));
        assert_eq!(package("cudnn", "7.6.5.32-9.0-linux-x64").to_string(), "cudnn@7.6.5.32-9.0-linux-x64");

        for bad in ["cuda", "cuda@9@1", "@9.0", "cuda@", ""] {
            assert!(
                matches!(bad.parse::<SpackPackage>(), Err(ConfigurationError::InvalidPackageSpecifier(s)) if s == bad),
                "{bad} should not parse"
            );
        }
    }

    #[test]
    fn construction_requires_exactly_one_activation() {
        let root = PathBuf::from("/opt/spack");
        let both = SpackConfiguration::new(root.clone(), Some("env".to_string()), vec![package("cuda", "9.0")]);
        assert!(matches!(both, Err(ConfigurationError::MissingSpackActivation)));

        let neither = SpackConfiguration::new(root.clone(), None, Vec::new());
        assert!(matches!(neither, Err(ConfigurationError::MissingSpackActivation)));

        let empty_name = SpackConfiguration::new(root.clone(), Some(String::new()), Vec::new());
        assert!(matches!(empty_name, Err(ConfigurationError::MissingSpackActivation)));

        let environment = SpackConfiguration::new(root, Some("env".to_string()), Vec::new()).unwrap();
        assert_eq!(environment.activation(), &SpackActivation::Environment("env".to_string()));
    }

    #[test]
    fn absent_without_environment_or_packages() {
        let params = Parameters::from_yaml("spack_root: /opt/spack").unwrap();
        assert_eq!(SpackConfiguration::from_parameters(&params).unwrap(), None);
    }

    #[test]
    fn environment_and_packages_are_mutually_exclusive() {
        let params = Parameters::from_yaml(
            "spack_root: /opt/spack\nspack_environment: env\nspack_packages: [cuda@9.0]",
        )
        .unwrap();
        let err = SpackConfiguration::from_parameters(&params).unwrap_err();
        assert!(matches!(
            err,
            ConfigurationError::MutuallyExclusive(SPACK_ENVIRONMENT_PARAM, SPACK_PACKAGES_PARAM)
        ));
        assert_eq!(err.to_string(), "`spack_environment` and `spack_packages` are mutually exclusive");
    }

    #[test]
    fn resolves_packages_in_order() {
        let root = tempfile::tempdir().unwrap();
        let yaml = format!(
            "spack_root: {}\nspack_packages:\n  - cuda@9.0.176\n  - cudnn@7.6.5.32-9.0-linux-x64",
            root.path().display()
        );
        let params = Parameters::from_yaml(&yaml).unwrap();

        let spack = SpackConfiguration::from_parameters(&params).unwrap().unwrap();
        assert_eq!(spack.root(), root.path());
        match spack.activation() {
            SpackActivation::Packages(packages) => {
                assert_eq!(packages.first(), &package("cuda", "9.0.176"));
                assert_eq!(packages.len(), 2);
            }
            other => panic!("expected packages, got {other:?}"),
        }
    }

    #[test]
    fn rejects_bad_package_lists() {
        let root = tempfile::tempdir().unwrap();
        let bad_specifier = format!("spack_root: {}\nspack_packages: [cuda]", root.path().display());
        assert!(matches!(
            SpackConfiguration::from_parameters(&Parameters::from_yaml(&bad_specifier).unwrap()),
            Err(ConfigurationError::InvalidPackageSpecifier(_))
        ));

        let not_strings = format!("spack_root: {}\nspack_packages: [1, 2]", root.path().display());
        assert!(matches!(
            SpackConfiguration::from_parameters(&Parameters::from_yaml(&not_strings).unwrap()),
            Err(ConfigurationError::Parameter(ParameterError::WrongType { .. }))
        ));

        let empty = format!("spack_root: {}\nspack_packages: []", root.path().display());
        assert!(matches!(
            SpackConfiguration::from_parameters(&Parameters::from_yaml(&empty).unwrap()),
            Err(ConfigurationError::MissingSpackActivation)
        ));
    }

    #[test]
    fn spack_root_must_exist() {
        let params = Parameters::from_yaml("spack_root: /no/such/spack\nspack_environment: env").unwrap();
        assert!(matches!(
            SpackConfiguration::from_parameters(&params),
            Err(ConfigurationError::Parameter(ParameterError::NotADirectory { .. }))
        ));
    }

    #[test]
    fn renders_environment_activation() {
        let spack = SpackConfiguration::new(PathBuf::from("/opt/spack"), Some("ml".to_string()), Vec::new()).unwrap();
        assert_eq!(
            spack.sbatch_lines().unwrap(),
            ". \"/opt/spack\"/share/spack/setup-env.sh\nspack env activate ml\n\n"
        );
    }

    #[test]
    fn renders_one_load_per_package() {
        let packages = vec![package("cuda", "9.0.176"), package("cudnn", "7.6.5")];
        let spack = SpackConfiguration::new(PathBuf::from("/opt/spack"), None, packages).unwrap();
        assert_eq!(
            spack.sbatch_lines().unwrap(),
            ". \"/opt/spack\"/share/spack/setup-env.sh\nspack load cuda@9.0.176\nspack load cudnn@7.6.5\n\n"
        );
    }
}
