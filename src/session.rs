use crate::plot::{theme, Theme, VegaLite};
use crate::policy::{Input, Policy};
use crate::pretty::Pretty;
use crate::resolve::*;
use crate::store::{store_config, Store, StoreConfig};
use anyhow::{Context, Result};
use bpaf::Bpaf;
use lmt_aggregate::Granularity;
use log::*;
use serde::Deserialize;
use serde_json::json;
use std::io::{BufRead, Write};
use std::path::PathBuf;

/// Something that shows derived views to a user
pub trait Presenter {
    /// Called with the views which changed, in display order
    fn present(&mut self, views: &[RenderedView]) -> Result<()>;
    /// Called when an event couldn't be applied
    fn reject(&mut self, error: &anyhow::Error) -> Result<()>;
}

/// A user interaction
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Event {
    Granularity(Granularity),
    Mode(Mode),
    /// `null` selects every OS column
    OsSubset(Option<Vec<String>>),
    CompareLeft(String),
    CompareRight(String),
    Upload {
        path: PathBuf,
        /// Defaults to the last component of `path`
        #[serde(default)]
        filename: Option<String>,
    },
    Persist,
}

/// Applies events to the parameters and the store, and keeps the presenter
/// up to date with as little recomputation as possible.
pub struct Session<P> {
    store: Store,
    params: ViewParams,
    policy: Policy,
    presenter: P,
}

impl<P: Presenter> Session<P> {
    pub fn new(store: Store, params: ViewParams, presenter: P) -> Result<Session<P>> {
        params
            .validate(&store.current().dataset)
            .context("Invalid view options")?;
        Ok(Session {
            store,
            params,
            policy: Policy::new(),
            presenter,
        })
    }

    pub fn params(&self) -> &ViewParams {
        &self.params
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn presenter(&self) -> &P {
        &self.presenter
    }

    /// Applies an event, then refreshes.  Events which can't be applied are
    /// handed to the presenter and change nothing.
    pub fn handle(&mut self, event: Event) -> Result<()> {
        debug!("Event: {:?}", event);
        if let Err(e) = self.apply(event) {
            warn!("{:#}", e);
            self.presenter.reject(&e)?;
        }
        self.refresh()
    }

    /// Updates the parameters or the store.  Only changes which alter a value
    /// mark views as stale.
    pub fn apply(&mut self, event: Event) -> Result<()> {
        let snapshot = self.store.current();
        match event {
            Event::Granularity(x) => {
                if self.params.granularity != x {
                    self.params.granularity = x;
                    self.policy.invalidate(Input::Granularity);
                }
            }
            Event::Mode(x) => {
                if self.params.mode != x {
                    self.params.mode = x;
                    self.policy.invalidate(Input::Mode);
                }
            }
            Event::OsSubset(x) => {
                let candidate = ViewParams {
                    os_subset: x.clone(),
                    ..self.params.clone()
                };
                candidate.validate_os_subset(snapshot.dataset.schema())?;
                if self.params.os_subset != x {
                    self.params.os_subset = x;
                    self.policy.invalidate(Input::OsSubset);
                }
            }
            Event::CompareLeft(x) => {
                snapshot.dataset.numeric_column(&x).map_err(ResolveError::from)?;
                if self.params.compare[0] != x {
                    self.params.compare[0] = x;
                    self.policy.invalidate(Input::CompareLeft);
                }
            }
            Event::CompareRight(x) => {
                snapshot.dataset.numeric_column(&x).map_err(ResolveError::from)?;
                if self.params.compare[1] != x {
                    self.params.compare[1] = x;
                    self.policy.invalidate(Input::CompareRight);
                }
            }
            Event::Upload { path, filename } => {
                let bytes =
                    std::fs::read(&path).with_context(|| format!("Couldn't read {}", path.display()))?;
                let filename = filename.unwrap_or_else(|| {
                    path.file_name()
                        .map(|x| x.to_string_lossy().into_owned())
                        .unwrap_or_default()
                });
                let replaced = self.store.replace(&bytes, &filename)?;
                self.params.reconcile(&replaced.dataset);
                self.policy.invalidate(Input::Dataset);
            }
            Event::Persist => self.store.persist()?,
        }
        Ok(())
    }

    /// Recomputes the stale views against one snapshot and presents them.  A
    /// view which can't be computed is reported and isn't retried until its
    /// inputs change again.
    pub fn refresh(&mut self) -> Result<()> {
        let pending = self.policy.pending();
        if pending.is_empty() {
            return Ok(());
        }
        debug!("Recomputing {:?}", pending);
        let snapshot = self.store.current();
        let mut views = Vec::with_capacity(pending.len());
        for &view in &pending {
            match resolve(view, &self.params, &snapshot.dataset) {
                Ok(x) => views.push(x),
                Err(e) => {
                    let e = anyhow::Error::new(e).context(format!("Couldn't compute {:?}", view));
                    warn!("{:#}", e);
                    self.presenter.reject(&e)?;
                }
            }
        }
        if !views.is_empty() {
            self.presenter.present(&views)?;
        }
        self.policy.complete(pending);
        Ok(())
    }
}

/// Writes each refresh as one line of JSON
pub struct JsonLines<W> {
    out: W,
}

impl<W: Write> JsonLines<W> {
    pub fn new(out: W) -> JsonLines<W> {
        JsonLines { out }
    }
}

impl<W: Write> Presenter for JsonLines<W> {
    fn present(&mut self, views: &[RenderedView]) -> Result<()> {
        serde_json::to_writer(&mut self.out, &json!({ "views": views }))?;
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

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Format {
    Json,
    Vega,
    Text,
}

impl std::str::FromStr for Format {
    type Err = String;
    fn from_str(x: &str) -> Result<Format, String> {
        match x {
            "json" => Ok(Format::Json),
            "vega" => Ok(Format::Vega),
            "text" => Ok(Format::Text),
            _ => Err(format!("{:?} is not an output format (json, vega, text)", x)),
        }
    }
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Format::Json => f.write_str("json"),
            Format::Vega => f.write_str("vega"),
            Format::Text => f.write_str("text"),
        }
    }
}

/// Reads events from stdin, one JSON value per line, and prints the views
/// each one changes
#[derive(Bpaf)]
pub struct Options {
    #[bpaf(external(view_options))]
    view: ViewOptions,
    #[bpaf(external(store_config))]
    store: StoreConfig,
    #[bpaf(external(theme))]
    theme: Theme,
    /// Output format: json, vega or text
    #[bpaf(long, argument("FORMAT"), fallback(Format::Json), display_fallback)]
    format: Format,
    /// With text output, show at most N rows of the raw data
    #[bpaf(long, argument("N"), fallback(20), display_fallback)]
    rows: usize,
    /// The dataset to start from
    #[bpaf(positional("FILE"))]
    file: PathBuf,
}

pub fn session(opts: Options) -> Result<()> {
    let store = Store::open(opts.file.clone(), opts.store)?;
    let params = opts.view.into_params();
    let stdout = std::io::stdout().lock();
    match opts.format {
        Format::Json => event_loop(Session::new(store, params, JsonLines::new(stdout))?),
        Format::Vega => event_loop(Session::new(store, params, VegaLite::new(stdout, opts.theme))?),
        Format::Text => event_loop(Session::new(store, params, Pretty::new(stdout, opts.rows))?),
    }
}

fn event_loop<P: Presenter>(mut session: Session<P>) -> Result<()> {
    session.refresh()?;
    for line in std::io::stdin().lock().lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<Event>(&line) {
            Ok(event) => session.handle(event)?,
            Err(e) => {
                let e = anyhow::Error::new(e).context(format!("Couldn't parse event {:?}", line));
                warn!("{:#}", e);
                session.presenter.reject(&e)?;
            }
        }
    }
    Ok(())
}
