#[cfg(test)]
mod fixtures;
mod plot;
mod policy;
mod pretty;
mod resolve;
mod session;
mod store;
mod table;

use bpaf::Bpaf;

/// Statistics for LMT infrastructure-monitoring snapshots
#[derive(Bpaf)]
#[bpaf(options, version)]
enum Subcommand {
    /// Print every view of the dashboard as text
    #[bpaf(command)]
    Report {
        #[bpaf(external(pretty::options))]
        opts: pretty::Options,
    },
    /// Print a vega-lite spec of the dashboard
    #[bpaf(command)]
    Plot {
        #[bpaf(external(plot::options))]
        opts: plot::Options,
    },
    /// Print the raw data, optionally sorted
    #[bpaf(command)]
    Table {
        #[bpaf(external(table::options))]
        opts: table::Options,
    },
    /// Validate a replacement dataset
    #[bpaf(command)]
    Upload {
        #[bpaf(external(store::options))]
        opts: store::Options,
    },
    /// Apply events from stdin and print the views they change
    #[bpaf(command)]
    Session {
        #[bpaf(external(session::options))]
        opts: session::Options,
    },
}

fn main() {
    env_logger::init();
    let result = match subcommand().run() {
        Subcommand::Report { opts } => pretty::report(opts),
        Subcommand::Plot { opts } => plot::plot(opts),
        Subcommand::Table { opts } => table::table(opts),
        Subcommand::Upload { opts } => store::upload(opts),
        Subcommand::Session { opts } => session::session(opts),
    };
    match result {
        Ok(()) => (),
        Err(e) => {
            // Ignore EPIPE
            if let Some(e) = e.downcast_ref::<std::io::Error>() {
                if e.kind() == std::io::ErrorKind::BrokenPipe {
                    return;
                }
            }
            eprintln!("Error: {:#}", e);
            std::process::exit(1)
        }
    }
}
