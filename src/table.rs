use crate::store::{store_config, Store, StoreConfig};
use anyhow::Result;
use bpaf::Bpaf;
use lmt_aggregate::{ColumnError, Dataset};
use std::cmp::Ordering;
use std::io::Write;
use std::path::PathBuf;

/// Prints the raw data, optionally sorted
#[derive(Bpaf)]
pub struct Options {
    #[bpaf(external(store_config))]
    store: StoreConfig,
    /// Sort rows by this column
    #[bpaf(long, argument("COLUMN"))]
    sort: Option<String>,
    /// Sort largest first
    descending: bool,
    /// Print at most N rows
    #[bpaf(long, argument("N"))]
    limit: Option<usize>,
    #[bpaf(positional("FILE"))]
    file: PathBuf,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SortBy {
    pub column: Option<String>,
    pub descending: bool,
    pub limit: Option<usize>,
}

// Numbers sort before text, and numerically among themselves
fn compare_cells(a: &str, b: &str) -> Ordering {
    match (a.trim().parse::<f64>(), b.trim().parse::<f64>()) {
        (Ok(x), Ok(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

/// The dataset's rows in the requested order.  Rows which compare equal keep
/// their file order.
pub fn sorted_rows<'a>(dataset: &'a Dataset, by: &SortBy) -> Result<Vec<Vec<&'a str>>, ColumnError> {
    let mut rows = dataset
        .records()
        .iter()
        .map(|r| r.fields().collect::<Vec<_>>())
        .collect::<Vec<_>>();
    if let Some(column) = &by.column {
        let idx = dataset
            .schema()
            .position(column)
            .ok_or_else(|| ColumnError::Unknown(column.clone()))?;
        rows.sort_by(|a, b| {
            let ord = compare_cells(a[idx], b[idx]);
            if by.descending {
                ord.reverse()
            } else {
                ord
            }
        });
    }
    if let Some(n) = by.limit {
        rows.truncate(n);
    }
    Ok(rows)
}

pub fn table(opts: Options) -> Result<()> {
    let store = Store::open(opts.file, opts.store)?;
    let snapshot = store.current();
    let by = SortBy {
        column: opts.sort,
        descending: opts.descending,
        limit: opts.limit,
    };
    let rows = sorted_rows(&snapshot.dataset, &by)?;
    let stdout = std::io::stdout();
    let mut out = tabwriter::TabWriter::new(stdout.lock());
    writeln!(out, "{}", snapshot.dataset.schema().columns().join("\t"))?;
    for row in rows {
        writeln!(out, "{}", row.join("\t"))?;
    }
    out.flush()?;
    Ok(())
}
