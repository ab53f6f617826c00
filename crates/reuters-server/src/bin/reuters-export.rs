use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;
use reuters_sgml::{CorpusSummary, LoadOptions, MalformedPolicy, load_batch};
use reuters_server::init_tracing;
use tracing::info;

#[derive(Parser)]
#[command(name = "reuters-export")]
#[command(about = "Export Reuters corpus files as JSON Lines or as corpus aggregates")]
struct Cli {
    /// Corpus files to read; they are processed in sorted order.
    #[arg(required = true)]
    paths: Vec<PathBuf>,
    /// Write to this file instead of stdout.
    #[arg(long, short)]
    output: Option<PathBuf>,
    /// Skip documents with bad identifiers or dates instead of failing the file.
    #[arg(long, default_value_t = false)]
    skip_malformed: bool,
    /// Write one object with the six aggregate lists instead of the records.
    #[arg(long, default_value_t = false)]
    aggregates: bool,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let options = LoadOptions {
        on_malformed: if cli.skip_malformed {
            MalformedPolicy::Skip
        } else {
            MalformedPolicy::Abort
        },
    };
    let report = load_batch(cli.paths.iter().cloned(), &options);
    let failed = report.failures.len();
    if report.loaded.is_empty() {
        bail!("none of the {failed} corpus files could be loaded");
    }

    let sink: Box<dyn Write> = match &cli.output {
        Some(path) => Box::new(
            File::create(path).with_context(|| format!("creating {}", path.display()))?,
        ),
        None => Box::new(io::stdout().lock()),
    };
    let mut out = BufWriter::new(sink);

    let records = report.into_records();
    if cli.aggregates {
        serde_json::to_writer_pretty(&mut out, &CorpusSummary::from_records(&records))?;
        writeln!(out)?;
    } else {
        for record in &records {
            serde_json::to_writer(&mut out, record)?;
            writeln!(out)?;
        }
    }
    out.flush()?;

    info!("exported {} records, {} file(s) failed", records.len(), failed);
    Ok(())
}
