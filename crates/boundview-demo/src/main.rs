#![forbid(unsafe_code)]

use std::path::PathBuf;
use std::process::ExitCode;

use boundview_demo::{Options, run};
use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

/// Render the travel widget headlessly, optionally click a country and type
/// a city, then print the widget markup and the final state.
#[derive(Debug, Parser)]
#[command(name = "boundview-demo", version, about)]
struct Cli {
    /// Directory holding `widgets/widget1.html`.
    #[arg(long, default_value = concat!(env!("CARGO_MANIFEST_DIR"), "/templates"))]
    templates: PathBuf,

    /// Click the button of this country after the first render.
    #[arg(long, value_name = "COUNTRY")]
    select: Option<String>,

    /// Type this city into the bound city input.
    #[arg(long, value_name = "NAME")]
    city: Option<String>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let options = Options {
        templates: cli.templates,
        select: cli.select,
        city: cli.city,
    };
    match run(&options) {
        Ok(report) => {
            println!("{}", report.markup.trim());
            match serde_json::to_string_pretty(&report.state) {
                Ok(state) => println!("{state}"),
                Err(err) => error!(error = %err, "state not printable"),
            }
            println!("renders: {}", report.renders);
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(error = %err, "demo failed");
            ExitCode::FAILURE
        }
    }
}
