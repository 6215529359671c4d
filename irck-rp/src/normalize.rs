//! Pulse normalization
//!
//! A code is typically built from two or three distinct mark lengths and
//! space lengths, but transmission and reception smear each one into a
//! band of nearby samples. Normalization collapses those bands onto single
//! canonical values, which in turn lets waveform synthesis reuse one
//! hardware segment per distinct duration.
//!
//! Marks and spaces are always clustered separately: carrier bursts and
//! silences come from different generation mechanisms and must not be
//! cross-matched.
//!
//! Two passes exist:
//!
//! - [`normalize_code`] runs on one freshly captured code, averaging
//!   samples that agree within the tolerance band.
//! - [`normalize_library`] runs over a whole library before it is
//!   persisted, converging values that drifted slightly between key
//!   presses onto shared count-weighted means.

use std::collections::BTreeMap;
use std::collections::HashMap;

use irck_common::{Code, Library, PulseKind};

/// Normalize one captured code in place.
///
/// For each pulse kind, scan positions left to right; each unprocessed
/// position becomes the pivot of a cluster collecting every later
/// unprocessed position whose value `v` satisfies
/// `v * (1 - tolerance) < pivot < v * (1 + tolerance)`. Pivot and members
/// all take the cluster's plain mean, rounded to two decimals.
///
/// The pivot choice is deliberately scan-order greedy rather than a
/// globally optimal clustering: libraries written by earlier tooling used
/// exactly this rule, and re-running it on its own output is a no-op.
pub fn normalize_code(code: &mut Code, tolerance: f64) {
    let toler_min = 1.0 - tolerance;
    let toler_max = 1.0 + tolerance;

    for kind in [PulseKind::Mark, PulseKind::Space] {
        let mut values = code.durations(kind);
        cluster_greedy(&mut values, toler_min, toler_max);
        code.set_durations(kind, &values);
    }
}

fn cluster_greedy(values: &mut [f64], toler_min: f64, toler_max: f64) {
    let n = values.len();
    let mut processed = vec![false; n];

    for i in 0..n {
        if processed[i] {
            continue;
        }
        let pivot = values[i];
        let mut total = pivot;
        let mut members = 1.0;
        let mut matched: Vec<usize> = Vec::new();

        for (j, &v) in values.iter().enumerate().skip(i + 1) {
            if processed[j] {
                continue;
            }
            if v * toler_min < pivot && pivot < v * toler_max {
                total += v;
                members += 1.0;
                matched.push(j);
            }
        }

        let mean = round2(total / members);
        values[i] = mean;
        processed[i] = true;
        for j in matched {
            values[j] = mean;
            processed[j] = true;
        }
    }
}

/// Normalize a whole library in place.
///
/// For each pulse kind, counts every distinct duration across all codes,
/// then sweeps the distinct values in ascending order folding each value
/// that lies under `first * (1 + tolerance)` into the running cluster,
/// where `first` is the value that opened the cluster. Each cluster closes
/// to the count-weighted mean rounded to a whole microsecond, and every
/// code is rewritten through the resulting table.
///
/// The ascending fold never re-anchors on later members; a run of values
/// each slightly above the last still splits once it leaves the first
/// member's band.
pub fn normalize_library(library: &mut Library, tolerance: f64) {
    let toler_max = 1.0 + tolerance;
    for kind in [PulseKind::Mark, PulseKind::Space] {
        tidy_kind(library, kind, toler_max);
    }
}

fn tidy_kind(library: &mut Library, kind: PulseKind, toler_max: f64) {
    // Occurrence counts per distinct duration, ascending. Durations carry
    // two decimals at most, so centi-microsecond keys are exact.
    let mut counts: BTreeMap<u64, u64> = BTreeMap::new();
    for (_, code) in library.iter() {
        for v in code.durations(kind) {
            *counts.entry(centi(v)).or_insert(0) += 1;
        }
    }
    if counts.is_empty() {
        return;
    }

    let mut remap: HashMap<u64, f64> = HashMap::new();
    let mut cluster: Vec<u64> = Vec::new();
    let mut first = 0.0;
    let mut total = 0.0;
    let mut members = 0u64;

    for (&key, &count) in &counts {
        let value = key as f64 / 100.0;
        if members == 0 {
            cluster.push(key);
            first = value;
            total = value * count as f64;
            members = count;
        } else if value < first * toler_max {
            cluster.push(key);
            total += value * count as f64;
            members += count;
        } else {
            close_cluster(&mut remap, &mut cluster, total, members);
            cluster.push(key);
            first = value;
            total = value * count as f64;
            members = count;
        }
    }
    close_cluster(&mut remap, &mut cluster, total, members);

    for (_, code) in library.iter_mut() {
        let rewritten: Vec<f64> = code
            .durations(kind)
            .iter()
            .map(|v| remap[&centi(*v)])
            .collect();
        code.set_durations(kind, &rewritten);
    }
}

fn close_cluster(remap: &mut HashMap<u64, f64>, cluster: &mut Vec<u64>, total: f64, members: u64) {
    let mean = (total / members as f64).round();
    for key in cluster.drain(..) {
        remap.insert(key, mean);
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn centi(v: f64) -> u64 {
    (v * 100.0).round() as u64
}
