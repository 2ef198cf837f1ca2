//! Summaries of finished exports and offline plans.

use std::collections::BTreeMap;
use std::fmt;

use crate::manifest::Manifest;
use crate::split::SplitCounts;

/// What a successful export did.
#[derive(Clone, Debug)]
pub struct ExportReport {
    pub dataset: String,
    /// Samples consumed from the input stream.
    pub samples: usize,
    /// Rows in the published manifest.
    pub rows: usize,
    /// Images transferred by this run.
    pub uploaded: usize,
    /// Images that were already in the bucket.
    pub already_present: usize,
    pub manifest_uri: String,
    /// Sample count the split quotas were computed against.
    pub total_samples: usize,
    /// Final split counts per class, ordered by class name.
    pub counters: BTreeMap<String, SplitCounts>,
}

/// The manifest an export would publish, computed without storage.
#[derive(Clone, Debug)]
pub struct Plan {
    pub dataset: String,
    pub samples: usize,
    pub total_samples: usize,
    pub counters: BTreeMap<String, SplitCounts>,
    pub manifest: Manifest,
}

impl fmt::Display for ExportReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Export of '{}' complete", self.dataset)?;
        writeln!(f, "  Samples:         {}", self.samples)?;
        writeln!(f, "  Manifest rows:   {}", self.rows)?;
        writeln!(f, "  Uploaded:        {}", self.uploaded)?;
        writeln!(f, "  Already present: {}", self.already_present)?;
        writeln!(f, "  Manifest:        {}", self.manifest_uri)?;
        writeln!(f)?;
        write_split_table(f, self.total_samples, &self.counters)
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Plan for '{}'", self.dataset)?;
        writeln!(f, "  Samples:       {}", self.samples)?;
        writeln!(f, "  Manifest rows: {}", self.manifest.len())?;
        writeln!(f)?;
        write_split_table(f, self.total_samples, &self.counters)
    }
}

fn write_split_table(
    f: &mut fmt::Formatter<'_>,
    total_samples: usize,
    counters: &BTreeMap<String, SplitCounts>,
) -> fmt::Result {
    let width = counters
        .keys()
        .map(|k| k.chars().count())
        .max()
        .unwrap_or(0)
        .max("class".len());

    writeln!(f, "Split counts (quotas against {} samples):", total_samples)?;
    writeln!(
        f,
        "  {:<width$}  {:>8}  {:>8}  {:>8}",
        "class", "TRAIN", "VALIDATE", "TEST"
    )?;
    for (class, counts) in counters {
        writeln!(
            f,
            "  {:<width$}  {:>8}  {:>8}  {:>8}",
            class, counts.train, counts.validate, counts.test
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_lists_every_class() {
        let mut counters = BTreeMap::new();
        counters.insert(
            "car".to_string(),
            SplitCounts {
                train: 7,
                validate: 2,
                test: 1,
            },
        );
        counters.insert("traffic light".to_string(), SplitCounts::default());

        let report = ExportReport {
            dataset: "coco".to_string(),
            samples: 10,
            rows: 10,
            uploaded: 9,
            already_present: 1,
            manifest_uri: "gs://b/coco/labels.csv".to_string(),
            total_samples: 10,
            counters,
        };

        let text = report.to_string();
        assert!(text.contains("Export of 'coco' complete"));
        assert!(text.contains("gs://b/coco/labels.csv"));
        assert!(text.contains("traffic light"));
        let car_line = text.lines().find(|l| l.trim_start().starts_with("car")).unwrap();
        let numbers: Vec<&str> = car_line.split_whitespace().skip(1).collect();
        assert_eq!(numbers, ["7", "2", "1"]);
    }
}
