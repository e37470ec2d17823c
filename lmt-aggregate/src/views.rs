use crate::bucket::{Granularity, TimeBucket};
use crate::dataset::{ColumnError, Dataset, Record};
use crate::ratio::Ratio;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ConnectivityRow {
    pub bucket: TimeBucket,
    pub total_endpoints: u64,
    pub disconnected_endpoints: u64,
    pub disconnected_ratio: Ratio,
    pub connected_ratio: Ratio,
}

impl ConnectivityRow {
    pub fn connected_endpoints(&self) -> u64 {
        self.total_endpoints - self.disconnected_endpoints
    }
}

/// Endpoint connectivity per bucket.
///
/// Ratios are taken from the bucket's sums rather than averaged per record,
/// so buckets holding fewer records aren't over-weighted.  A bucket with no
/// endpoints has undefined ratios.
pub fn connectivity_over_time(dataset: &Dataset, granularity: Granularity) -> Vec<ConnectivityRow> {
    bucketize(dataset, granularity, |acc: &mut (u64, u64), r| {
        acc.0 += r.endpoints_all;
        acc.1 += r.endpoints_disconnected;
    })
    .into_iter()
    .map(|(bucket, (total, disconnected))| {
        let disconnected_ratio = Ratio::new(disconnected as f64, total as f64);
        ConnectivityRow {
            bucket,
            total_endpoints: total,
            disconnected_endpoints: disconnected,
            disconnected_ratio,
            connected_ratio: disconnected_ratio.complement(),
        }
    })
    .collect()
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DatabaseTypeRow {
    pub bucket: TimeBucket,
    /// Every type seen anywhere in the dataset, zero-filled
    pub counts: BTreeMap<String, u64>,
}

impl DatabaseTypeRow {
    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    /// Each type's share of the bucket.  Shares sum to 1.
    pub fn shares(&self) -> BTreeMap<String, Ratio> {
        let total = self.total() as f64;
        self.counts
            .iter()
            .map(|(ty, &n)| (ty.clone(), Ratio::new(n as f64, total)))
            .collect()
    }
}

/// The database types present in the dataset, by name
pub fn database_types(dataset: &Dataset) -> BTreeSet<String> {
    dataset
        .records()
        .iter()
        .filter(|r| !r.database_type.is_empty())
        .map(|r| r.database_type.clone())
        .collect()
}

/// Number of records reporting each database type, per bucket.  Records
/// without a type are left out.
pub fn database_type_distribution(dataset: &Dataset, granularity: Granularity) -> Vec<DatabaseTypeRow> {
    let zeroes: BTreeMap<String, u64> = database_types(dataset).into_iter().map(|ty| (ty, 0)).collect();
    let mut buckets = BTreeMap::<TimeBucket, BTreeMap<String, u64>>::new();
    for r in dataset.records().iter().filter(|r| !r.database_type.is_empty()) {
        let counts = buckets
            .entry(granularity.bucket(r.time))
            .or_insert_with(|| zeroes.clone());
        *counts.entry(r.database_type.clone()).or_default() += 1;
    }
    buckets
        .into_iter()
        .map(|(bucket, counts)| DatabaseTypeRow { bucket, counts })
        .collect()
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub bucket: TimeBucket,
    pub value: f64,
}

/// The per-bucket sum of any numeric column
pub fn time_series(
    dataset: &Dataset,
    column: &str,
    granularity: Granularity,
) -> Result<Vec<SeriesPoint>, ColumnError> {
    let values = dataset.numeric_column(column)?;
    let mut buckets = BTreeMap::<TimeBucket, f64>::new();
    for (r, x) in dataset.records().iter().zip(values) {
        *buckets.entry(granularity.bucket(r.time)).or_default() += x;
    }
    Ok(buckets
        .into_iter()
        .map(|(bucket, value)| SeriesPoint { bucket, value })
        .collect())
}

/// `sum(instances_all) / sum(endpoints_all)`
pub fn avg_instances_per_endpoint(dataset: &Dataset) -> Ratio {
    let (instances, endpoints) = dataset
        .records()
        .iter()
        .fold((0u64, 0u64), |(i, e), r| (i + r.instances_all, e + r.endpoints_all));
    Ratio::new(instances as f64, endpoints as f64)
}

/// `sum(endpoints_all) / number of records`
pub fn avg_endpoints_per_record(dataset: &Dataset) -> Ratio {
    let endpoints: u64 = dataset.records().iter().map(|r| r.endpoints_all).sum();
    Ratio::new(endpoints as f64, dataset.len() as f64)
}

/// The scalar figures shown on the dashboard's cards
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Summary {
    pub instances_per_endpoint: Ratio,
    pub endpoints_per_record: Ratio,
}

pub fn summary(dataset: &Dataset) -> Summary {
    Summary {
        instances_per_endpoint: avg_instances_per_endpoint(dataset),
        endpoints_per_record: avg_endpoints_per_record(dataset),
    }
}

// Only non-empty buckets are produced, in chronological order
fn bucketize<T: Default>(
    dataset: &Dataset,
    granularity: Granularity,
    mut fold: impl FnMut(&mut T, &Record),
) -> Vec<(TimeBucket, T)> {
    let mut buckets = BTreeMap::<TimeBucket, T>::new();
    for r in dataset.records() {
        fold(buckets.entry(granularity.bucket(r.time)).or_default(), r);
    }
    buckets.into_iter().collect()
}
