use crate::dataset::{Dataset, OS_PREFIX};
use crate::ratio::Ratio;
use serde::Serialize;
use std::cmp::Ordering;

/// Whole-word corrections applied after capitalisation
const ACRONYMS: &[(&str, &str)] = &[("Ibm", "IBM"), ("Hpux", "HP-UX"), ("sparc", "Sparc")];

/// One bar of an OS breakdown chart
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OsBreakdownEntry<V> {
    pub label: String,
    pub column: String,
    pub value: V,
}

/// The display label for an `endpoints_os_*` column.
///
/// `endpoints_os_ibm_aix` becomes "IBM aix": the prefix is stripped,
/// underscores become spaces, the first letter is upper-cased and the rest
/// lower-cased, and finally a few known words are corrected.
pub fn os_label(column: &str) -> String {
    let name = column.strip_prefix(OS_PREFIX).unwrap_or(column).replace('_', " ");
    let mut chars = name.chars();
    let capitalized: String = match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    };
    capitalized
        .split(' ')
        .map(|word| {
            ACRONYMS
                .iter()
                .find(|(from, _)| *from == word)
                .map_or(word, |&(_, to)| to)
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Total endpoints per OS across the whole dataset, largest first.  Ties keep
/// the file's column order.
pub fn os_breakdown(dataset: &Dataset) -> Vec<OsBreakdownEntry<u64>> {
    let totals = column_totals(dataset).collect();
    let mut entries = entries(dataset, totals);
    entries.sort_by(|a, b| b.value.cmp(&a.value));
    entries
}

/// Mean endpoints per OS per record, rounded to 3 decimal places, largest
/// first.  On an empty dataset every mean is undefined.
pub fn os_breakdown_average(dataset: &Dataset) -> Vec<OsBreakdownEntry<Ratio>> {
    let n = dataset.len() as f64;
    let means = column_totals(dataset)
        .map(|total| Ratio::new(total as f64, n).round(3))
        .collect();
    let mut entries = entries(dataset, means);
    // undefined compares lowest, so it ends up last
    entries.sort_by(|a, b| b.value.partial_cmp(&a.value).unwrap_or(Ordering::Equal));
    entries
}

fn column_totals(dataset: &Dataset) -> impl Iterator<Item = u64> + '_ {
    let n_os = dataset.schema().os_columns().count();
    (0..n_os).map(move |i| {
        dataset
            .records()
            .iter()
            .map(|r| r.os_endpoints[i])
            .sum::<u64>()
    })
}

fn entries<V>(dataset: &Dataset, values: Vec<V>) -> Vec<OsBreakdownEntry<V>> {
    dataset
        .schema()
        .os_columns()
        .zip(values)
        .map(|(column, value)| OsBreakdownEntry {
            label: os_label(column),
            column: column.to_string(),
            value,
        })
        .collect()
}
