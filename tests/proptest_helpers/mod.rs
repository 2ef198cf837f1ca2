#![allow(dead_code)]

use labelship::split::SplitFractions;
use proptest::prelude::*;
use proptest::test_runner::{Config as ProptestConfig, FileFailurePersistence};

pub const CLASSES: [&str; 3] = ["car", "bus", "person"];

pub fn proptest_config() -> ProptestConfig {
    let cases = std::env::var("PROPTEST_CASES")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(64);

    let mut config = ProptestConfig::with_failure_persistence(FileFailurePersistence::WithSource(
        "proptest-regressions",
    ));
    config.cases = cases;
    config.max_shrink_iters = 1024;
    config
}

/// Fractions in [0, 1] that need not sum to 1.
pub fn arb_fractions() -> impl Strategy<Value = SplitFractions> {
    (0.0f64..=1.0, 0.0f64..=1.0, 0.0f64..=1.0)
        .prop_map(|(train, validate, test)| SplitFractions::new(train, validate, test))
}

/// Labels drawn mostly from [`CLASSES`], with some unknown ones mixed in.
pub fn arb_label() -> impl Strategy<Value = String> {
    prop_oneof![
        4 => proptest::sample::select(CLASSES.to_vec()).prop_map(str::to_string),
        1 => "[a-z]{1,6}".prop_map(|s| format!("unknown_{s}")),
    ]
}

pub fn arb_labels(max_len: usize) -> impl Strategy<Value = Vec<String>> {
    proptest::collection::vec(arb_label(), 0..=max_len)
}

/// Upper bound on a split's count: `ceil(fraction * total)`.
pub fn quota_ceiling(fraction: f64, total: usize) -> usize {
    (fraction * total as f64).ceil() as usize
}
