use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};
use reuters_sgml::{CorpusIndex, CorpusSummary, LoadOptions};

fn main() -> Result<()> {
    let path = env::args()
        .nth(1)
        .map(PathBuf::from)
        .context("usage: cargo run -p reuters-sgml --example stats -- <path-to-file.sgm>")?;

    let index = CorpusIndex::new(&path).with_options(LoadOptions::skipping_malformed());
    let docs = index
        .documents()
        .with_context(|| format!("loading corpus from {}", path.display()))?;
    let summary = CorpusSummary::from_records(&docs);

    let with_body = docs.iter().filter(|d| d.text.body.is_some()).count();
    let with_author = docs.iter().filter(|d| d.text.author.is_some()).count();
    let untagged = docs.iter().filter(|d| d.topics.is_empty()).count();

    println!("Corpus file : {}", path.display());
    println!("Documents   : {}", summary.documents);
    println!("With body   : {}", with_body);
    println!("With author : {}", with_author);
    println!("No topics   : {}", untagged);
    println!("Authors     : {}", summary.authors.len());
    println!("Exchanges   : {}", summary.exchanges.len());
    println!("Orgs        : {}", summary.orgs.len());
    println!("People      : {}", summary.people.len());
    println!("Places      : {}", summary.places.len());
    println!("Topics      : {}", summary.topics.len());

    if let (Some(first), Some(last)) = (docs.first(), docs.last()) {
        println!(
            "Id range    : {} .. {} ({} .. {})",
            first.reuters_id, last.reuters_id, first.timestamp, last.timestamp
        );
    }

    Ok(())
}
