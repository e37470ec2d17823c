use crate::policy::View;
use crate::resolve::*;
use crate::session::Presenter;
use crate::store::{store_config, Store, StoreConfig};
use ansi_term::{Color, Style};
use anyhow::Result;
use bpaf::Bpaf;
use std::fmt;
use std::io::Write;
use std::path::PathBuf;

/// Prints every view of the dashboard as a table
#[derive(Bpaf)]
pub struct Options {
    #[bpaf(external(view_options))]
    view: ViewOptions,
    #[bpaf(external(store_config))]
    store: StoreConfig,
    /// Show at most N rows of the raw data
    #[bpaf(long, argument("N"), fallback(20), display_fallback)]
    rows: usize,
    #[bpaf(positional("FILE"))]
    file: PathBuf,
}

/// Renders views as aligned text
pub struct Pretty<W> {
    out: W,
    max_rows: usize,
}

impl<W: Write> Pretty<W> {
    pub fn new(out: W, max_rows: usize) -> Pretty<W> {
        Pretty { out, max_rows }
    }

    fn print(&mut self, view: &RenderedView) -> Result<()> {
        writeln!(self.out, "\n{}", Style::new().bold().paint(view.title.as_str()))?;
        let mut out = tabwriter::TabWriter::new(&mut self.out);
        match &view.data {
            ViewData::TimeSeries { buckets, series } => {
                write!(out, "\t{}", view.axis.x_title)?;
                for s in series {
                    write!(out, "\t{}", s.name)?;
                }
                writeln!(out)?;
                for (i, bucket) in buckets.iter().enumerate() {
                    write!(out, "\t{}", bucket)?;
                    for s in series {
                        write!(out, "\t{}", Cell(s.values[i], view.axis.percentage))?;
                    }
                    writeln!(out)?;
                }
            }
            ViewData::Breakdown { bars } => {
                for bar in bars {
                    writeln!(out, "\t{}:\t{}", bar.label, Cell(bar.value, false))?;
                }
            }
            ViewData::Cards { cards } => {
                for card in cards {
                    let text = if card.value.is_defined() {
                        card.text.clone()
                    } else {
                        Style::new().dimmed().paint(card.text.as_str()).to_string()
                    };
                    writeln!(out, "\t{}:\t{}", card.label, text)?;
                }
            }
            ViewData::Grid { columns, rows } => {
                writeln!(out, "{}", columns.join("\t"))?;
                for row in rows.iter().take(self.max_rows) {
                    writeln!(out, "{}", row.join("\t"))?;
                }
                if rows.len() > self.max_rows {
                    writeln!(
                        out,
                        "{}",
                        Color::Yellow.paint(format!("({} more rows)", rows.len() - self.max_rows))
                    )?;
                }
            }
        }
        out.flush()?;
        Ok(())
    }
}

impl<W: Write> Presenter for Pretty<W> {
    fn present(&mut self, views: &[RenderedView]) -> Result<()> {
        for view in views {
            self.print(view)?;
        }
        Ok(())
    }

    fn reject(&mut self, error: &anyhow::Error) -> Result<()> {
        writeln!(self.out, "{} {:#}", Color::Red.paint("rejected:"), error)?;
        Ok(())
    }
}

/// A number, a percentage, or a dimmed "undefined"
struct Cell(Option<f64>, bool);

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Cell(Some(x), true) => write!(f, "{:.1}%", x * 100.),
            Cell(Some(x), false) => f.write_str(&format_thousands(x)),
            Cell(None, _) => write!(f, "{}", Style::new().dimmed().paint("undefined")),
        }
    }
}

pub fn report(opts: Options) -> Result<()> {
    let store = Store::open(opts.file, opts.store)?;
    let params = opts.view.into_params();
    let snapshot = store.current();
    params.validate(&snapshot.dataset)?;
    let mut pretty = Pretty::new(std::io::stdout().lock(), opts.rows);
    for &view in View::ALL.iter() {
        pretty.print(&resolve(view, &params, &snapshot.dataset)?)?;
    }
    Ok(())
}
