use chrono::{DateTime, NaiveDate, NaiveDateTime};
use csv::StringRecord;
use std::io;
use std::path::Path;

pub const TIME_COLUMN: &str = "data_collection_time";
pub const ENDPOINTS_ALL: &str = "endpoints_all";
pub const ENDPOINTS_DISCONNECTED: &str = "endpoints_disconnected";
pub const INSTANCES_ALL: &str = "instances_all";
pub const DATABASE_TYPE: &str = "lmt_database_type";
/// Every column starting with this prefix counts endpoints running one OS
pub const OS_PREFIX: &str = "endpoints_os_";
/// The largest count a single cell may hold.  Sums over any dataset that
/// fits in memory stay within `u64`.
pub const MAX_COUNTER: u64 = u32::MAX as u64;

#[derive(Debug, thiserror::Error)]
pub enum DataFormatError {
    #[error("missing required column \"{0}\"")]
    MissingColumn(&'static str),
    #[error("line {line}: can't parse timestamp {value:?}")]
    Timestamp { line: u64, value: String },
    #[error("line {line}: {column} is not a count between 0 and 4294967295: {value:?}")]
    Counter {
        line: u64,
        column: String,
        value: String,
    },
    #[error("line {line}: {disconnected} disconnected endpoints out of {total}")]
    DisconnectedExceedsTotal {
        line: u64,
        disconnected: u64,
        total: u64,
    },
    #[error(transparent)]
    Csv(#[from] csv::Error),
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ColumnError {
    #[error("no column named \"{0}\"")]
    Unknown(String),
    #[error("column \"{column}\" is not numeric (line {line}: {value:?})")]
    NotNumeric {
        column: String,
        line: u64,
        value: String,
    },
}

/// The column layout of a dataset, resolved once when the header is read.
#[derive(Clone, Debug, PartialEq)]
pub struct Schema {
    columns: Vec<String>,
    time: usize,
    endpoints_all: usize,
    endpoints_disconnected: usize,
    instances_all: usize,
    database_type: usize,
    /// Indices into `columns`, in file order
    os: Vec<usize>,
}

impl Schema {
    pub fn from_headers(headers: &StringRecord) -> Result<Schema, DataFormatError> {
        let columns: Vec<String> = headers.iter().map(|x| x.trim().to_string()).collect();
        let find = |name: &'static str| {
            columns
                .iter()
                .position(|x| x == name)
                .ok_or(DataFormatError::MissingColumn(name))
        };
        let os = columns
            .iter()
            .enumerate()
            .filter(|(_, x)| x.starts_with(OS_PREFIX))
            .map(|(i, _)| i)
            .collect();
        Ok(Schema {
            time: find(TIME_COLUMN)?,
            endpoints_all: find(ENDPOINTS_ALL)?,
            endpoints_disconnected: find(ENDPOINTS_DISCONNECTED)?,
            instances_all: find(INSTANCES_ALL)?,
            database_type: find(DATABASE_TYPE)?,
            os,
            columns,
        })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|x| x == name)
    }

    /// The `endpoints_os_*` columns, in file order
    pub fn os_columns(&self) -> impl Iterator<Item = &str> + '_ {
        self.os.iter().map(move |&i| self.columns[i].as_str())
    }

    pub fn is_os_column(&self, name: &str) -> bool {
        self.os_columns().any(|x| x == name)
    }
}

/// One monitoring snapshot
#[derive(Clone, Debug, PartialEq)]
pub struct Record {
    pub time: NaiveDateTime,
    pub endpoints_all: u64,
    pub endpoints_disconnected: u64,
    pub instances_all: u64,
    pub database_type: String,
    /// Aligned with `Schema::os_columns`
    pub os_endpoints: Vec<u64>,
    line: u64,
    raw: StringRecord,
}

impl Record {
    /// The raw cell at column index `idx`, as read from the file
    pub fn get(&self, idx: usize) -> Option<&str> {
        self.raw.get(idx)
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.raw.iter()
    }

    /// The line of the source file this record came from
    pub fn line(&self) -> u64 {
        self.line
    }
}

/// An immutable table of snapshots.  A dataset is never edited in place:
/// replacing the data means building a new `Dataset`.
#[derive(Clone, Debug, PartialEq)]
pub struct Dataset {
    schema: Schema,
    records: Vec<Record>,
}

impl Dataset {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Dataset, DataFormatError> {
        Dataset::from_csv(csv::Reader::from_path(path)?)
    }

    pub fn from_reader<R: io::Read>(rdr: R) -> Result<Dataset, DataFormatError> {
        Dataset::from_csv(csv::Reader::from_reader(rdr))
    }

    fn from_csv<R: io::Read>(mut rdr: csv::Reader<R>) -> Result<Dataset, DataFormatError> {
        let schema = Schema::from_headers(rdr.headers()?)?;
        let records = rdr
            .into_records()
            .enumerate()
            .map(|(idx, row)| parse_record(&schema, row?, idx as u64 + 2))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Dataset { schema, records })
    }

    /// Writes the header and every record back out, cells untouched and in
    /// the original column order
    pub fn write_csv<W: io::Write>(&self, out: W) -> Result<(), csv::Error> {
        let mut wtr = csv::Writer::from_writer(out);
        wtr.write_record(&self.schema.columns)?;
        for record in &self.records {
            wtr.write_record(&record.raw)?;
        }
        wtr.flush()?;
        Ok(())
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The values of a numeric column, one per record.  Empty cells read as
    /// zero.
    pub fn numeric_column(&self, name: &str) -> Result<Vec<f64>, ColumnError> {
        let idx = self
            .schema
            .position(name)
            .ok_or_else(|| ColumnError::Unknown(name.to_string()))?;
        self.records
            .iter()
            .map(|r| {
                let cell = r.get(idx).unwrap_or("").trim();
                if cell.is_empty() {
                    return Ok(0.);
                }
                cell.parse::<f64>()
                    .ok()
                    .filter(|x| x.is_finite())
                    .ok_or_else(|| ColumnError::NotNumeric {
                        column: name.to_string(),
                        line: r.line,
                        value: cell.to_string(),
                    })
            })
            .collect()
    }
}

fn parse_record(schema: &Schema, row: StringRecord, line: u64) -> Result<Record, DataFormatError> {
    let line = row.position().map_or(line, |p| p.line());
    let cell = |idx: usize| row.get(idx).unwrap_or("");
    let counter = |idx: usize| {
        parse_counter(cell(idx)).ok_or_else(|| DataFormatError::Counter {
            line,
            column: schema.columns[idx].clone(),
            value: cell(idx).to_string(),
        })
    };

    let time = parse_timestamp(cell(schema.time)).ok_or_else(|| DataFormatError::Timestamp {
        line,
        value: cell(schema.time).to_string(),
    })?;
    let endpoints_all = counter(schema.endpoints_all)?;
    let endpoints_disconnected = counter(schema.endpoints_disconnected)?;
    if endpoints_disconnected > endpoints_all {
        return Err(DataFormatError::DisconnectedExceedsTotal {
            line,
            disconnected: endpoints_disconnected,
            total: endpoints_all,
        });
    }
    let instances_all = counter(schema.instances_all)?;
    let os_endpoints = schema
        .os
        .iter()
        .map(|&idx| counter(idx))
        .collect::<Result<Vec<_>, _>>()?;
    let database_type = cell(schema.database_type).trim().to_string();
    Ok(Record {
        time,
        endpoints_all,
        endpoints_disconnected,
        instances_all,
        database_type,
        os_endpoints,
        line,
        raw: row,
    })
}

/// Accepts RFC 3339 and the usual `YYYY-MM-DD[ T]HH:MM[:SS[.f]]` variants.
/// Offsets are dropped, keeping the recorded wall-clock time.
pub fn parse_timestamp(x: &str) -> Option<NaiveDateTime> {
    const NAIVE: &[&str] = &[
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
        "%Y/%m/%d %H:%M:%S%.f",
    ];
    const OFFSET: &[&str] = &["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f%z"];

    let x = x.trim();
    if let Ok(t) = DateTime::parse_from_rfc3339(x) {
        return Some(t.naive_local());
    }
    for fmt in NAIVE {
        if let Ok(t) = NaiveDateTime::parse_from_str(x, fmt) {
            return Some(t);
        }
    }
    for fmt in OFFSET {
        if let Ok(t) = DateTime::parse_from_str(x, fmt) {
            return Some(t.naive_local());
        }
    }
    NaiveDate::parse_from_str(x, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

// Empty cells are missing values, which sums skip
fn parse_counter(x: &str) -> Option<u64> {
    let x = x.trim();
    if x.is_empty() {
        return Some(0);
    }
    let n = match x.parse::<u64>() {
        Ok(n) => n,
        Err(_) => {
            let f = x.parse::<f64>().ok()?;
            if !(f >= 0. && f.fract() == 0. && f <= MAX_COUNTER as f64) {
                return None;
            }
            f as u64
        }
    };
    (n <= MAX_COUNTER).then_some(n)
}
