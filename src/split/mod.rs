//! Per-class TRAIN/VALIDATE/TEST assignment.
//!
//! The allocator is a greedy streaming bin filler. For each qualifying
//! detection it fills the class's TEST quota first, then its VALIDATE quota,
//! and sends everything after that to TRAIN. Quotas are fractions of the
//! *global* sample count, not of the class's own detection count, so a rare
//! class may never reach TRAIN and a dominant one mostly lands there.
//!
//! Assignment is deterministic given arrival order: there is no shuffling.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use tracing::warn;

use crate::error::LabelshipError;

/// The partition a manifest row belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Split {
    Train,
    Validate,
    Test,
}

impl Split {
    /// The literal written into the manifest's first column.
    pub fn as_str(&self) -> &'static str {
        match self {
            Split::Train => "TRAIN",
            Split::Validate => "VALIDATE",
            Split::Test => "TEST",
        }
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Target train/validate/test fractions.
///
/// Only `validate` and `test` drive the allocator; `train` is whatever is left
/// over and is kept for reporting.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SplitFractions {
    pub train: f64,
    pub validate: f64,
    pub test: f64,
}

impl SplitFractions {
    pub fn new(train: f64, validate: f64, test: f64) -> Self {
        Self {
            train,
            validate,
            test,
        }
    }

    /// Rejects negative or non-finite fractions.
    ///
    /// A sum other than 1.0 is allowed and only logged.
    pub fn check(&self) -> Result<(), LabelshipError> {
        for (name, value) in [
            ("train", self.train),
            ("validate", self.validate),
            ("test", self.test),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(LabelshipError::InvalidConfig {
                    message: format!("{name} fraction must be a non-negative number, got {value}"),
                });
            }
        }

        let sum = self.train + self.validate + self.test;
        if (sum - 1.0).abs() > 1e-6 {
            warn!(sum, "split fractions do not sum to 1.0");
        }
        Ok(())
    }
}

impl Default for SplitFractions {
    fn default() -> Self {
        Self::new(0.7, 0.2, 0.1)
    }
}

/// Parses `"train,validate,test"`, e.g. `"0.7,0.2,0.1"`.
impl FromStr for SplitFractions {
    type Err = LabelshipError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        if parts.len() != 3 {
            return Err(LabelshipError::InvalidConfig {
                message: format!(
                    "split distribution needs exactly 3 values (train,validate,test), got '{s}'"
                ),
            });
        }

        let mut values = [0.0f64; 3];
        for (slot, part) in values.iter_mut().zip(&parts) {
            *slot = part.parse().map_err(|_| LabelshipError::InvalidConfig {
                message: format!("'{part}' is not a number in split distribution '{s}'"),
            })?;
        }

        Ok(Self::new(values[0], values[1], values[2]))
    }
}

/// Running counts for one class.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SplitCounts {
    pub train: usize,
    pub validate: usize,
    pub test: usize,
}

impl SplitCounts {
    pub fn get(&self, split: Split) -> usize {
        match split {
            Split::Train => self.train,
            Split::Validate => self.validate,
            Split::Test => self.test,
        }
    }

    pub fn total(&self) -> usize {
        self.train + self.validate + self.test
    }

    fn bump(&mut self, split: Split) {
        match split {
            Split::Train => self.train += 1,
            Split::Validate => self.validate += 1,
            Split::Test => self.test += 1,
        }
    }
}

/// Owns the per-class counters and the allowed class set.
///
/// A class is allowed exactly when it has a counter entry; entries are created
/// at construction and never added later.
#[derive(Clone, Debug)]
pub struct SplitAllocator {
    fractions: SplitFractions,
    total_samples: usize,
    counters: BTreeMap<String, SplitCounts>,
}

impl SplitAllocator {
    /// Creates an allocator with zeroed counters for every class in `classes`.
    pub fn new<I, S>(classes: I, fractions: SplitFractions, total_samples: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let counters = classes
            .into_iter()
            .map(|c| (c.into(), SplitCounts::default()))
            .collect();

        Self {
            fractions,
            total_samples,
            counters,
        }
    }

    /// Returns true if `label` is one of the configured classes.
    pub fn is_allowed(&self, label: &str) -> bool {
        self.counters.contains_key(label)
    }

    /// Assigns one detection of `label` to a split.
    ///
    /// Returns `None`, leaving every counter untouched, when `label` is not a
    /// configured class.
    pub fn assign(&mut self, label: &str) -> Option<Split> {
        let test_quota = self.quota(Split::Test);
        let validate_quota = self.quota(Split::Validate);
        let counts = self.counters.get_mut(label)?;

        // NaN quotas compare false and fall through to TRAIN.
        let split = if (counts.test as f64) < test_quota {
            Split::Test
        } else if (counts.validate as f64) < validate_quota {
            Split::Validate
        } else {
            Split::Train
        };

        counts.bump(split);
        Some(split)
    }

    /// The fractional per-class quota for `split`: `fraction * total_samples`.
    ///
    /// TRAIN has no quota and reports infinity.
    pub fn quota(&self, split: Split) -> f64 {
        let fraction = match split {
            Split::Train => return f64::INFINITY,
            Split::Validate => self.fractions.validate,
            Split::Test => self.fractions.test,
        };
        fraction * self.total_samples as f64
    }

    pub fn counts(&self, label: &str) -> Option<SplitCounts> {
        self.counters.get(label).copied()
    }

    /// All counters, ordered by class name.
    pub fn counters(&self) -> &BTreeMap<String, SplitCounts> {
        &self.counters
    }

    pub fn total_samples(&self) -> usize {
        self.total_samples
    }

    pub fn fractions(&self) -> SplitFractions {
        self.fractions
    }

    /// Consumes the allocator, returning its final counts.
    pub fn into_counters(self) -> BTreeMap<String, SplitCounts> {
        self.counters
    }
}
