use crate::policy::View;
use crate::resolve::*;
use crate::session::Presenter;
use crate::store::{store_config, Store, StoreConfig};
use anyhow::Result;
use bpaf::Bpaf;
use log::*;
use serde_json::json;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::PathBuf;

const TITLE: &str = "LMT Statistics — Dashboard";

#[derive(Bpaf, Clone, Debug)]
pub struct Theme {
    /// Font size for chart titles and labels
    #[bpaf(long, argument("PX"), fallback(24), display_fallback)]
    pub font_size: u32,
    /// Font used throughout the dashboard
    #[bpaf(long, argument("FONT"), fallback("IBM Plex Sans".to_string()), display_fallback)]
    pub font_family: String,
    /// Leave the data out of the spec
    pub omit_data: bool,
}

impl Default for Theme {
    fn default() -> Theme {
        Theme {
            font_size: 24,
            font_family: "IBM Plex Sans".to_string(),
            omit_data: false,
        }
    }
}

/// Produces a vega-lite plot specification of the whole dashboard
#[derive(Bpaf)]
pub struct Options {
    #[bpaf(external(view_options))]
    view: ViewOptions,
    #[bpaf(external(store_config))]
    store: StoreConfig,
    #[bpaf(external(theme))]
    theme: Theme,
    #[bpaf(positional("FILE"))]
    file: PathBuf,
}

fn y_axis(axis: &Axis) -> serde_json::Value {
    let mut y = json!({ "title": axis.y_title });
    if !axis.ticks.is_empty() {
        let values = axis.ticks.iter().map(|t| t.value).collect::<Vec<_>>();
        // vega-lite can't take labels directly, so look them up by value
        let lookup = axis
            .ticks
            .iter()
            .map(|t| format!("datum.value == {} ? {:?}", t.value, t.label))
            .collect::<Vec<_>>()
            .join(" : ");
        y["values"] = json!(values);
        y["labelExpr"] = json!(format!("{} : datum.label", lookup));
    }
    y
}

fn y_scale(axis: &Axis) -> serde_json::Value {
    if axis.log_scale {
        json!({ "type": "log" })
    } else if axis.percentage {
        json!({ "domain": [0, 1] })
    } else {
        json!({})
    }
}

fn records(data: &ViewData) -> Vec<serde_json::Value> {
    match data {
        ViewData::TimeSeries { buckets, series } => series
            .iter()
            .flat_map(|s| {
                buckets.iter().zip(&s.values).map(move |(bucket, value)| {
                    json!({ "bucket": bucket, "series": s.name, "value": value })
                })
            })
            .collect(),
        ViewData::Breakdown { bars } => bars
            .iter()
            .map(|b| json!({ "label": b.label, "column": b.column, "value": b.value }))
            .collect(),
        ViewData::Cards { cards } => cards
            .iter()
            .map(|c| json!({ "label": c.label, "value": c.value, "text": c.text }))
            .collect(),
        ViewData::Grid { .. } => vec![],
    }
}

/// Builds the chart for one view.  The raw table has no chart.
pub fn mk_chart(view: &RenderedView, omit_data: bool) -> Option<serde_json::Value> {
    let mut chart = match &view.data {
        ViewData::TimeSeries { .. } => json!({
            "title": view.title,
            "width": 640,
            "height": 600,
            "mark": "bar",
            "encoding": {
                "x": { "field": "bucket", "type": "ordinal", "title": view.axis.x_title },
                "y": {
                    "field": "value",
                    "type": "quantitative",
                    "axis": y_axis(&view.axis),
                    "scale": y_scale(&view.axis),
                },
                "color": { "field": "series", "type": "nominal", "title": "" },
            },
        }),
        ViewData::Breakdown { .. } => json!({
            "title": view.title,
            "width": 640,
            "height": 600,
            "mark": "bar",
            "encoding": {
                "x": { "field": "label", "type": "nominal", "sort": null, "title": view.axis.x_title },
                "y": {
                    "field": "value",
                    "type": "quantitative",
                    "axis": y_axis(&view.axis),
                    "scale": y_scale(&view.axis),
                },
            },
        }),
        ViewData::Cards { .. } => json!({
            "title": view.title,
            "mark": { "type": "text", "align": "left" },
            "encoding": {
                "text": { "field": "line", "type": "nominal" },
                "y": { "field": "label", "type": "nominal", "axis": null },
            },
            "transform": [
                { "calculate": "datum.label + ': ' + datum.text", "as": "line" },
            ],
        }),
        ViewData::Grid { .. } => return None,
    };
    if !omit_data {
        chart["data"] = json!({ "values": records(&view.data) });
    }
    Some(chart)
}

pub fn mk_dashboard<'a>(views: impl IntoIterator<Item = &'a RenderedView>, theme: &Theme) -> serde_json::Value {
    let charts = views
        .into_iter()
        .filter_map(|v| mk_chart(v, theme.omit_data))
        .collect::<Vec<_>>();
    json!({
        "$schema": "https://vega.github.io/schema/vega-lite/v4.json",
        "title": { "text": TITLE, "fontSize": theme.font_size, "font": theme.font_family },
        "config": {
            "font": theme.font_family,
            "title": { "fontSize": theme.font_size },
            "legend": { "orient": "top", "direction": "horizontal" },
        },
        "vconcat": charts,
    })
}

/// Keeps the latest version of every view and prints the whole dashboard
/// each time something changes
pub struct VegaLite<W> {
    out: W,
    theme: Theme,
    latest: BTreeMap<View, RenderedView>,
}

impl<W: Write> VegaLite<W> {
    pub fn new(out: W, theme: Theme) -> VegaLite<W> {
        VegaLite {
            out,
            theme,
            latest: BTreeMap::new(),
        }
    }
}

impl<W: Write> Presenter for VegaLite<W> {
    fn present(&mut self, views: &[RenderedView]) -> Result<()> {
        for v in views {
            self.latest.insert(v.view, v.clone());
        }
        let spec = mk_dashboard(self.latest.values(), &self.theme);
        serde_json::to_writer(&mut self.out, &spec)?;
        writeln!(self.out)?;
        self.out.flush()?;
        Ok(())
    }

    fn reject(&mut self, error: &anyhow::Error) -> Result<()> {
        serde_json::to_writer(&mut self.out, &json!({ "rejected": format!("{:#}", error) }))?;
        writeln!(self.out)?;
        self.out.flush()?;
        Ok(())
    }
}

pub fn plot(opts: Options) -> Result<()> {
    let store = Store::open(opts.file, opts.store)?;
    let params = opts.view.into_params();
    let snapshot = store.current();
    params.validate(&snapshot.dataset)?;
    let views = View::ALL
        .iter()
        .map(|&v| resolve(v, &params, &snapshot.dataset))
        .collect::<Result<Vec<_>, _>>()?;
    info!("Plotting {} views", views.len());
    println!("{}", mk_dashboard(&views, &opts.theme));
    Ok(())
}
