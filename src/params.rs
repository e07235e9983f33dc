//! Read YAML parameter files and look up typed values in them
//!
//! A cluster parameter file and a job parameter file are each loaded into a [`Parameters`]
//! mapping. Every accessor validates the value it returns, so a malformed configuration fails
//! before any script is rendered.

use std::fmt::Debug;
use std::fs;
use std::ops::RangeBounds;
use std::path::{self, Path, PathBuf};

use log::info;
use serde_yaml::{Mapping, Value};

#[derive(Debug, thiserror::Error)]
pub enum ParameterError {
    #[error("can't read parameter file {}: {source}", .path.display())]
    Read { path: PathBuf, source: std::io::Error },
    #[error("can't parse parameter file {}: {source}", .path.display())]
    Parse { path: PathBuf, source: serde_yaml::Error },
    #[error("parameter file {} must contain a YAML mapping at the top level", .0.display())]
    NotAMapping(PathBuf),
    #[error("missing required parameter `{0}`")]
    Missing(String),
    #[error("parameter `{key}` should be {expected} but is {found}")]
    WrongType { key: String, expected: &'static str, found: &'static str },
    #[error("parameter `{key}` is {value}, outside the valid range {range}")]
    OutOfRange { key: String, value: i64, range: String },
    #[error("parameter `{key}` points to {}, which is not an existing directory", .path.display())]
    NotADirectory { key: String, path: PathBuf },
    #[error("job name `{name}` {reason}")]
    InvalidJobName { name: String, reason: &'static str },
    #[error("can't create {} for parameter `{key}`: {source}", .path.display())]
    Create { key: String, path: PathBuf, source: std::io::Error },
}

/// A validated key/value view over a single YAML document
#[derive(Debug, Clone, Default)]
pub struct Parameters {
    values: Mapping,
}

impl Parameters {
    pub fn load(path: &Path) -> Result<Parameters, ParameterError> {
        info!("Reading parameters from {}", path.display());
        let content = fs::read_to_string(path).map_err(|source| ParameterError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Parameters::parse(&content, path)
    }

    /// Parse parameters from YAML text that did not come from a file
    pub fn from_yaml(yaml: &str) -> Result<Parameters, ParameterError> {
        Parameters::parse(yaml, Path::new("<string>"))
    }

    fn parse(yaml: &str, origin: &Path) -> Result<Parameters, ParameterError> {
        let document: Value = serde_yaml::from_str(yaml).map_err(|source| ParameterError::Parse {
            path: origin.to_path_buf(),
            source,
        })?;

        match document {
            Value::Mapping(values) => Ok(Parameters { values }),
            // an empty document parses as null
            Value::Null => Ok(Parameters::default()),
            _ => Err(ParameterError::NotAMapping(origin.to_path_buf())),
        }
    }

    /// Returns a copy of these parameters where every key set in `overrides` replaces ours
    pub fn with_overrides(&self, overrides: &Parameters) -> Parameters {
        let mut values = self.values.clone();
        for (key, value) in &overrides.values {
            values.insert(key.clone(), value.clone());
        }
        Parameters { values }
    }

    /// A key explicitly set to `null` counts as absent
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn string(&self, key: &str) -> Result<String, ParameterError> {
        self.optional_string(key)?
            .ok_or_else(|| ParameterError::Missing(key.to_string()))
    }

    /// Scalars are accepted as strings, so `job_name: 42` reads as "42"
    pub fn optional_string(&self, key: &str) -> Result<Option<String>, ParameterError> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(Value::Number(n)) => Ok(Some(n.to_string())),
            Some(Value::Bool(b)) => Ok(Some(b.to_string())),
            Some(other) => Err(wrong_type(key, "a string", other)),
        }
    }

    pub fn existing_directory(&self, key: &str) -> Result<PathBuf, ParameterError> {
        let path = self.path(key)?;
        if path.is_dir() {
            Ok(path)
        } else {
            Err(ParameterError::NotADirectory { key: key.to_string(), path })
        }
    }

    /// Resolve a directory path, creating it (and any parents) if it doesn't exist yet
    pub fn creatable_directory(&self, key: &str) -> Result<PathBuf, ParameterError> {
        let path = self.path(key)?;
        fs::create_dir_all(&path).map_err(|source| ParameterError::Create {
            key: key.to_string(),
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }

    pub fn optional_creatable_directory(&self, key: &str) -> Result<Option<PathBuf>, ParameterError> {
        if self.contains(key) {
            self.creatable_directory(key).map(Some)
        } else {
            Ok(None)
        }
    }

    /// Resolve a file path that may not exist yet, creating its parent directories
    pub fn optional_creatable_file(&self, key: &str) -> Result<Option<PathBuf>, ParameterError> {
        if !self.contains(key) {
            return Ok(None);
        }
        let path = self.path(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| ParameterError::Create {
                key: key.to_string(),
                path: parent.to_path_buf(),
                source,
            })?;
        }
        Ok(Some(path))
    }

    /// Read an integer, falling back to `default` when the key is absent.
    ///
    /// The default is not checked against `valid_range`.
    pub fn integer<R>(&self, key: &str, default: Option<i64>, valid_range: R) -> Result<i64, ParameterError>
    where
        R: RangeBounds<i64> + Debug,
    {
        let value = match self.get(key) {
            None => return default.ok_or_else(|| ParameterError::Missing(key.to_string())),
            Some(Value::Number(n)) => n
                .as_i64()
                .ok_or_else(|| wrong_type(key, "an integer", &Value::Number(n.clone())))?,
            Some(other) => return Err(wrong_type(key, "an integer", other)),
        };

        if valid_range.contains(&value) {
            Ok(value)
        } else {
            Err(ParameterError::OutOfRange {
                key: key.to_string(),
                value,
                range: format!("{valid_range:?}"),
            })
        }
    }

    pub fn boolean(&self, key: &str, default: bool) -> Result<bool, ParameterError> {
        match self.get(key) {
            None => Ok(default),
            Some(Value::Bool(b)) => Ok(*b),
            Some(other) => Err(wrong_type(key, "a boolean", other)),
        }
    }

    pub fn arbitrary_list(&self, key: &str) -> Result<Vec<Value>, ParameterError> {
        match self.get(key) {
            None => Err(ParameterError::Missing(key.to_string())),
            Some(Value::Sequence(items)) => Ok(items.clone()),
            Some(other) => Err(wrong_type(key, "a list", other)),
        }
    }

    fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key).filter(|value| !value.is_null())
    }

    /// Relative paths are resolved against the current working directory
    fn path(&self, key: &str) -> Result<PathBuf, ParameterError> {
        let raw = PathBuf::from(self.string(key)?);
        path::absolute(&raw).map_err(|source| ParameterError::Create {
            key: key.to_string(),
            path: raw,
            source,
        })
    }
}

/// Build a type error for a value found under `key`
pub fn wrong_type(key: &str, expected: &'static str, found: &Value) -> ParameterError {
    ParameterError::WrongType {
        key: key.to_string(),
        expected,
        found: describe(found),
    }
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a list",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}
