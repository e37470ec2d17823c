use crate::policy::View;
use bpaf::Bpaf;
use lmt_aggregate::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Whether time charts show raw counts or shares of the bucket total
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Value,
    Percentage,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Mode::Value => f.write_str("value"),
            Mode::Percentage => f.write_str("percentage"),
        }
    }
}

impl FromStr for Mode {
    type Err = String;
    fn from_str(x: &str) -> Result<Mode, String> {
        match x.to_ascii_lowercase().as_str() {
            "value" | "values" | "count" => Ok(Mode::Value),
            "percentage" | "percent" | "%" => Ok(Mode::Percentage),
            _ => Err(format!("{:?} is not a mode (value, percentage)", x)),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ResolveError {
    #[error("\"{0}\" is not an OS column")]
    UnknownOs(String),
    #[error(transparent)]
    Column(#[from] ColumnError),
}

const DEFAULT_COMPARE: [&str; 2] = [ENDPOINTS_ALL, INSTANCES_ALL];

/// Everything the user can select on the dashboard
#[derive(Clone, Debug, PartialEq)]
pub struct ViewParams {
    pub granularity: Granularity,
    pub mode: Mode,
    /// `None` shows every OS column
    pub os_subset: Option<Vec<String>>,
    /// The columns plotted by the two comparison charts
    pub compare: [String; 2],
}

impl Default for ViewParams {
    fn default() -> ViewParams {
        ViewParams {
            granularity: Granularity::Monthly,
            mode: Mode::Value,
            os_subset: None,
            compare: DEFAULT_COMPARE.map(String::from),
        }
    }
}

impl ViewParams {
    /// Checks that the OS subset only names OS columns of `schema`
    pub fn validate_os_subset(&self, schema: &Schema) -> Result<(), ResolveError> {
        match self.os_subset.iter().flatten().find(|x| !schema.is_os_column(x)) {
            Some(os) => Err(ResolveError::UnknownOs(os.clone())),
            None => Ok(()),
        }
    }

    /// Checks every selection against `dataset`: OS columns must exist and
    /// comparison columns must be numeric
    pub fn validate(&self, dataset: &Dataset) -> Result<(), ResolveError> {
        self.validate_os_subset(dataset.schema())?;
        for column in &self.compare {
            dataset.numeric_column(column)?;
        }
        Ok(())
    }

    /// Drops selections which `dataset` can't satisfy.  Comparison columns
    /// which are missing or no longer numeric fall back to their defaults.
    pub fn reconcile(&mut self, dataset: &Dataset) {
        let schema = dataset.schema();
        if let Some(subset) = &mut self.os_subset {
            subset.retain(|x| schema.is_os_column(x));
        }
        for (column, default) in self.compare.iter_mut().zip(DEFAULT_COMPARE) {
            if dataset.numeric_column(column).is_err() {
                *column = default.to_string();
            }
        }
    }
}

#[derive(Bpaf, Clone, Debug)]
pub struct ViewOptions {
    /// Bucket size for time charts: monthly or quarterly
    #[bpaf(long, short, argument("GRANULARITY"), fallback(Granularity::Monthly), display_fallback)]
    granularity: Granularity,
    /// Show counts ("value") or shares ("percentage")
    #[bpaf(long, short, argument("MODE"), fallback(Mode::Value), display_fallback)]
    mode: Mode,
    /// Only chart these OS columns
    #[bpaf(long("os"), argument("COLUMN"))]
    os: Vec<String>,
    /// Columns for the two comparison charts
    #[bpaf(long, argument::<String>("COLUMN"), many, guard(at_most_two, "at most two comparison columns"))]
    compare: Vec<String>,
}

#[allow(clippy::ptr_arg)]
fn at_most_two(x: &Vec<String>) -> bool {
    x.len() <= 2
}

impl ViewOptions {
    pub fn into_params(self) -> ViewParams {
        let mut params = ViewParams {
            granularity: self.granularity,
            mode: self.mode,
            os_subset: (!self.os.is_empty()).then_some(self.os),
            ..ViewParams::default()
        };
        for (slot, column) in params.compare.iter_mut().zip(self.compare) {
            *slot = column;
        }
        params
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Tick {
    pub value: f64,
    pub label: String,
}

/// Eleven ticks, 0% to 100%
pub fn percentage_ticks() -> Vec<Tick> {
    (0..=10)
        .map(|i| Tick {
            value: i as f64 / 10.,
            label: format!("{}%", i * 10),
        })
        .collect()
}

/// Two ticks, at the bottom and the top of the range
pub fn value_ticks(min: f64, max: f64) -> Vec<Tick> {
    let (min, max) = if min > max { (max, min) } else { (min, max) };
    vec![
        Tick {
            value: min,
            label: format_thousands(min),
        },
        Tick {
            value: max,
            label: format_thousands(max),
        },
    ]
}

/// Ticks at the smallest positive value and at the largest value.  If
/// nothing is positive there are no ticks.
fn range_ticks(values: impl IntoIterator<Item = f64>) -> Vec<Tick> {
    let (min, max) = values
        .into_iter()
        .filter(|x| x.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(min, max), x| {
            (if x > 0. { min.min(x) } else { min }, max.max(x))
        });
    if min.is_finite() {
        value_ticks(min, max)
    } else {
        vec![]
    }
}

/// Like `range_ticks`, but the top tick sits at the tallest stack
fn stacked_ticks(series: &[Series]) -> Vec<Tick> {
    let n = series.first().map_or(0, |s| s.values.len());
    let min = series
        .iter()
        .flat_map(|s| s.values.iter().flatten().copied())
        .filter(|x| *x > 0.)
        .fold(f64::INFINITY, f64::min);
    let max = (0..n)
        .map(|i| series.iter().filter_map(|s| s.values[i]).sum::<f64>())
        .fold(f64::NEG_INFINITY, f64::max);
    if min.is_finite() {
        value_ticks(min, max)
    } else {
        vec![]
    }
}

/// `1234567.5` becomes "1,234,567.5"
pub fn format_thousands(x: f64) -> String {
    let plain = if x.fract() == 0. && x.abs() < 1e15 {
        format!("{}", x as i64)
    } else {
        format!("{}", x)
    };
    let (sign, digits) = match plain.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", plain.as_str()),
    };
    let (int, frac) = match digits.split_once('.') {
        Some((int, frac)) => (int, Some(frac)),
        None => (digits, None),
    };
    let mut out = String::from(sign);
    for (i, c) in int.chars().enumerate() {
        if i > 0 && (int.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    if let Some(frac) = frac {
        out.push('.');
        out.push_str(frac);
    }
    out
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Series {
    pub name: String,
    /// One per bucket; `None` where the value is undefined
    pub values: Vec<Option<f64>>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Bar {
    pub label: String,
    pub column: String,
    pub value: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Card {
    pub label: String,
    pub value: Ratio,
    pub text: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ViewData {
    TimeSeries {
        buckets: Vec<TimeBucket>,
        series: Vec<Series>,
    },
    Breakdown {
        bars: Vec<Bar>,
    },
    Cards {
        cards: Vec<Card>,
    },
    Grid {
        columns: Vec<String>,
        rows: Vec<Vec<String>>,
    },
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Axis {
    pub x_title: String,
    pub y_title: String,
    pub ticks: Vec<Tick>,
    pub percentage: bool,
    pub log_scale: bool,
}

/// A derived view plus everything needed to draw it
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RenderedView {
    pub view: View,
    pub title: String,
    pub data: ViewData,
    pub axis: Axis,
}

pub fn resolve(view: View, params: &ViewParams, dataset: &Dataset) -> Result<RenderedView, ResolveError> {
    match view {
        View::Connectivity => Ok(connectivity(params, dataset)),
        View::DatabaseTypes => Ok(database_types_view(params, dataset)),
        View::OsTotals => {
            let entries = os_breakdown(dataset)
                .into_iter()
                .map(|e| (e.label, e.column, Some(e.value as f64)));
            os_view(view, "Breakdown of OS Endpoints", entries, params, dataset)
        }
        View::OsAverages => {
            let entries = os_breakdown_average(dataset)
                .into_iter()
                .map(|e| (e.label, e.column, e.value.value()));
            os_view(view, "Average number of endpoints per OS", entries, params, dataset)
        }
        View::CompareLeft => comparison(view, &params.compare[0], params, dataset),
        View::CompareRight => comparison(view, &params.compare[1], params, dataset),
        View::Summary => Ok(summary_cards(dataset)),
        View::RawTable => Ok(grid(dataset)),
    }
}

fn time_axis(y_title: &str, mode: Mode, series: &[Series]) -> Axis {
    match mode {
        Mode::Value => Axis {
            x_title: "Date".into(),
            y_title: y_title.into(),
            ticks: stacked_ticks(series),
            ..Axis::default()
        },
        Mode::Percentage => Axis {
            x_title: "Date".into(),
            y_title: format!("{} percentage", y_title),
            ticks: percentage_ticks(),
            percentage: true,
            log_scale: false,
        },
    }
}

fn connectivity(params: &ViewParams, dataset: &Dataset) -> RenderedView {
    let rows = connectivity_over_time(dataset, params.granularity);
    let series = match params.mode {
        Mode::Value => vec![
            Series {
                name: "connected_endpoints".into(),
                values: rows.iter().map(|r| Some(r.connected_endpoints() as f64)).collect(),
            },
            Series {
                name: "disconnected_endpoints".into(),
                values: rows.iter().map(|r| Some(r.disconnected_endpoints as f64)).collect(),
            },
        ],
        Mode::Percentage => vec![
            Series {
                name: "connected_percent".into(),
                values: rows.iter().map(|r| r.connected_ratio.value()).collect(),
            },
            Series {
                name: "disconnected_percent".into(),
                values: rows.iter().map(|r| r.disconnected_ratio.value()).collect(),
            },
        ],
    };
    RenderedView {
        view: View::Connectivity,
        title: "Disconnected Endpoints Over Time".into(),
        axis: time_axis("Endpoints", params.mode, &series),
        data: ViewData::TimeSeries {
            buckets: rows.iter().map(|r| r.bucket).collect(),
            series,
        },
    }
}

fn database_types_view(params: &ViewParams, dataset: &Dataset) -> RenderedView {
    let rows = database_type_distribution(dataset, params.granularity);
    let series = database_types(dataset)
        .into_iter()
        .map(|ty| {
            let values = rows
                .iter()
                .map(|r| match params.mode {
                    Mode::Value => r.counts.get(&ty).map(|&n| n as f64),
                    Mode::Percentage => r.shares().get(&ty).and_then(|x| x.value()),
                })
                .collect();
            Series { name: ty, values }
        })
        .collect::<Vec<_>>();
    RenderedView {
        view: View::DatabaseTypes,
        title: "Database Types Over Time".into(),
        axis: time_axis("Types", params.mode, &series),
        data: ViewData::TimeSeries {
            buckets: rows.iter().map(|r| r.bucket).collect(),
            series,
        },
    }
}

fn os_view(
    view: View,
    title: &str,
    entries: impl Iterator<Item = (String, String, Option<f64>)>,
    params: &ViewParams,
    dataset: &Dataset,
) -> Result<RenderedView, ResolveError> {
    params.validate_os_subset(dataset.schema())?;
    let bars = entries
        .filter(|(_, column, _)| {
            params
                .os_subset
                .as_ref()
                .map_or(true, |subset| subset.contains(column))
        })
        .map(|(label, column, value)| Bar {
            label,
            column,
            value,
        })
        .collect::<Vec<_>>();
    Ok(RenderedView {
        view,
        title: title.into(),
        axis: Axis {
            x_title: "OS".into(),
            y_title: "Endpoints".into(),
            ticks: range_ticks(bars.iter().filter_map(|b| b.value)),
            percentage: false,
            log_scale: true,
        },
        data: ViewData::Breakdown { bars },
    })
}

fn comparison(
    view: View,
    column: &str,
    params: &ViewParams,
    dataset: &Dataset,
) -> Result<RenderedView, ResolveError> {
    let points = time_series(dataset, column, params.granularity)?;
    let values = points.iter().map(|p| Some(p.value)).collect::<Vec<_>>();
    Ok(RenderedView {
        view,
        title: format!("{} over time", column),
        axis: Axis {
            x_title: "Date".into(),
            y_title: column.into(),
            ticks: range_ticks(values.iter().flatten().copied()),
            percentage: false,
            log_scale: false,
        },
        data: ViewData::TimeSeries {
            buckets: points.iter().map(|p| p.bucket).collect(),
            series: vec![Series {
                name: column.into(),
                values,
            }],
        },
    })
}

fn summary_cards(dataset: &Dataset) -> RenderedView {
    let s = summary(dataset);
    let card = |label: &str, value: Ratio| Card {
        label: label.into(),
        value,
        text: format!("{:.3}", value),
    };
    RenderedView {
        view: View::Summary,
        title: "Summary".into(),
        data: ViewData::Cards {
            cards: vec![
                card(
                    "Average number of software instances per endpoint",
                    s.instances_per_endpoint,
                ),
                card(
                    "Average number of endpoints per customer",
                    s.endpoints_per_record,
                ),
            ],
        },
        axis: Axis::default(),
    }
}

fn grid(dataset: &Dataset) -> RenderedView {
    RenderedView {
        view: View::RawTable,
        title: "Data".into(),
        data: ViewData::Grid {
            columns: dataset.schema().columns().to_vec(),
            rows: dataset
                .records()
                .iter()
                .map(|r| r.fields().map(String::from).collect())
                .collect(),
        },
        axis: Axis::default(),
    }
}
