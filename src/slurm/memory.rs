use std::fmt;
use std::num::IntErrorKind;
use std::str::FromStr;

/// Units the SLURM `--mem` flag understands
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MemoryUnit {
    Kilobytes,
    Megabytes,
    Gigabytes,
    Terabytes,
}

impl MemoryUnit {
    /// The single-letter suffix sbatch expects after the amount
    pub fn slurm_suffix(&self) -> char {
        match self {
            MemoryUnit::Kilobytes => 'K',
            MemoryUnit::Megabytes => 'M',
            MemoryUnit::Gigabytes => 'G',
            MemoryUnit::Terabytes => 'T',
        }
    }
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum MemoryParseError {
    #[error("memory request `{0}` doesn't start with an amount")]
    MissingAmount(String),
    #[error("memory request `{0}` is too large")]
    AmountTooLarge(String),
    #[error("memory request `{0}` has no unit, expected one of K, M, G or T")]
    MissingUnit(String),
    #[error("memory request `{input}` has unknown unit `{unit}`, expected one of K, M, G or T")]
    UnknownUnit { input: String, unit: String },
}

/// A memory request such as `4G`
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MemoryAmount {
    pub amount: u64,
    pub unit: MemoryUnit,
}

impl MemoryAmount {
    pub fn new(amount: u64, unit: MemoryUnit) -> MemoryAmount {
        MemoryAmount { amount, unit }
    }

    /// Format for `#SBATCH --mem`, e.g. `4G`
    pub fn to_slurm_string(&self) -> String {
        format!("{}{}", self.amount, self.unit.slurm_suffix())
    }
}

impl fmt::Display for MemoryAmount {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.to_slurm_string())
    }
}

/// Accepts an integer amount followed by a unit: `4G`, `4GB`, `4 gb` and `512k` all parse
impl FromStr for MemoryAmount {
    type Err = MemoryParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let split = trimmed
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(trimmed.len());
        let (digits, unit) = trimmed.split_at(split);

        let amount: u64 = digits
            .parse()
            .map_err(|err: std::num::ParseIntError| match err.kind() {
                IntErrorKind::PosOverflow => MemoryParseError::AmountTooLarge(s.to_string()),
                _ => MemoryParseError::MissingAmount(s.to_string()),
            })?;

        let unit = unit.trim().to_ascii_uppercase();
        let unit = match unit.as_str() {
            "" => return Err(MemoryParseError::MissingUnit(s.to_string())),
            "K" | "KB" => MemoryUnit::Kilobytes,
            "M" | "MB" => MemoryUnit::Megabytes,
            "G" | "GB" => MemoryUnit::Gigabytes,
            "T" | "TB" => MemoryUnit::Terabytes,
            _ => {
                return Err(MemoryParseError::UnknownUnit {
                    input: s.to_string(),
                    unit,
                })
            }
        };

        Ok(MemoryAmount { amount, unit })
    }
}
