use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use reuters_types::{DocumentRecord, Facet};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::error::{CorpusError, LoadError};
use crate::extract::extract_document;
use crate::markup::{MarkupLoader, MarkupTree};

/// What to do with a fragment whose identifiers or date cannot be extracted.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum MalformedPolicy {
    /// Fail the whole file.
    #[default]
    Abort,
    /// Log the fragment and keep going.
    Skip,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub on_malformed: MalformedPolicy,
}

impl LoadOptions {
    pub fn skipping_malformed() -> Self {
        Self {
            on_malformed: MalformedPolicy::Skip,
        }
    }
}

/// Decode raw file bytes and extract every fragment in source order.
pub fn decode_documents(
    bytes: &[u8],
    options: &LoadOptions,
) -> Result<Vec<DocumentRecord>, LoadError> {
    let tree = MarkupLoader::new().load(bytes)?;
    extract_all(&tree, options)
}

/// Extract every fragment of already decoded content in source order.
pub fn parse_documents(
    content: &str,
    options: &LoadOptions,
) -> Result<Vec<DocumentRecord>, LoadError> {
    let tree = MarkupLoader::new().parse(content);
    extract_all(&tree, options)
}

fn extract_all(tree: &MarkupTree, options: &LoadOptions) -> Result<Vec<DocumentRecord>, LoadError> {
    let mut records = Vec::new();
    let mut skipped = 0usize;
    for (position, fragment) in tree.fragments().enumerate() {
        match extract_document(&fragment) {
            Ok(record) => records.push(record),
            Err(source) => match options.on_malformed {
                MalformedPolicy::Abort => return Err(LoadError::Document { position, source }),
                MalformedPolicy::Skip => {
                    warn!(position, error = %source, "skipping malformed fragment");
                    skipped += 1;
                }
            },
        }
    }
    debug!(records = records.len(), skipped, "extracted fragments");
    Ok(records)
}

/// Distinct non-empty values of `facet` across `records`, sorted ascending.
pub fn aggregate<'a, I>(records: I, facet: Facet) -> Vec<String>
where
    I: IntoIterator<Item = &'a DocumentRecord>,
{
    let distinct: BTreeSet<&str> = records
        .into_iter()
        .flat_map(|record| record.facet_values(facet))
        .map(String::as_str)
        .filter(|value| !value.is_empty())
        .collect();
    distinct.into_iter().map(str::to_string).collect()
}

/// Every aggregate of a record set, computed in one pass over the facets.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct CorpusSummary {
    pub documents: usize,
    pub authors: Vec<String>,
    pub exchanges: Vec<String>,
    pub orgs: Vec<String>,
    pub people: Vec<String>,
    pub places: Vec<String>,
    pub topics: Vec<String>,
}

impl CorpusSummary {
    pub fn from_records(records: &[DocumentRecord]) -> Self {
        Self {
            documents: records.len(),
            authors: aggregate(records, Facet::Authors),
            exchanges: aggregate(records, Facet::Exchanges),
            orgs: aggregate(records, Facet::Orgs),
            people: aggregate(records, Facet::People),
            places: aggregate(records, Facet::Places),
            topics: aggregate(records, Facet::Topics),
        }
    }

    pub fn facet(&self, facet: Facet) -> &[String] {
        match facet {
            Facet::Authors => &self.authors,
            Facet::Exchanges => &self.exchanges,
            Facet::Orgs => &self.orgs,
            Facet::People => &self.people,
            Facet::Places => &self.places,
            Facet::Topics => &self.topics,
        }
    }
}

/// Reads one corpus file on demand. Nothing is cached between calls.
#[derive(Clone, Debug)]
pub struct CorpusIndex {
    path: PathBuf,
    options: LoadOptions,
}

impl CorpusIndex {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            options: LoadOptions::default(),
        }
    }

    pub fn with_options(mut self, options: LoadOptions) -> Self {
        self.options = options;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load every document of the file in source order.
    pub fn documents(&self) -> Result<Vec<DocumentRecord>, CorpusError> {
        let bytes = fs::read(&self.path).map_err(|source| CorpusError::Io {
            path: self.path.clone(),
            source,
        })?;
        let records =
            decode_documents(&bytes, &self.options).map_err(|source| CorpusError::Load {
                path: self.path.clone(),
                source,
            })?;
        debug!(
            path = %self.path.display(),
            documents = records.len(),
            "loaded corpus file"
        );
        Ok(records)
    }

    /// Load the file and aggregate one facet.
    pub fn facet(&self, facet: Facet) -> Result<Vec<String>, CorpusError> {
        Ok(aggregate(&self.documents()?, facet))
    }

    pub fn authors(&self) -> Result<Vec<String>, CorpusError> {
        self.facet(Facet::Authors)
    }

    pub fn exchanges(&self) -> Result<Vec<String>, CorpusError> {
        self.facet(Facet::Exchanges)
    }

    pub fn orgs(&self) -> Result<Vec<String>, CorpusError> {
        self.facet(Facet::Orgs)
    }

    pub fn people(&self) -> Result<Vec<String>, CorpusError> {
        self.facet(Facet::People)
    }

    pub fn places(&self) -> Result<Vec<String>, CorpusError> {
        self.facet(Facet::Places)
    }

    pub fn topics(&self) -> Result<Vec<String>, CorpusError> {
        self.facet(Facet::Topics)
    }

    /// Load once and compute every aggregate.
    pub fn summary(&self) -> Result<CorpusSummary, CorpusError> {
        Ok(CorpusSummary::from_records(&self.documents()?))
    }
}

/// Records of one successfully loaded file.
#[derive(Clone, Debug)]
pub struct LoadedFile {
    pub path: PathBuf,
    pub records: Vec<DocumentRecord>,
}

/// Outcome of loading several corpus files.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub loaded: Vec<LoadedFile>,
    pub failures: Vec<CorpusError>,
}

impl BatchReport {
    pub fn record_count(&self) -> usize {
        self.loaded.iter().map(|file| file.records.len()).sum()
    }

    /// All records, file by file in load order.
    pub fn records(&self) -> impl Iterator<Item = &DocumentRecord> + '_ {
        self.loaded.iter().flat_map(|file| file.records.iter())
    }

    pub fn into_records(self) -> Vec<DocumentRecord> {
        self.loaded
            .into_iter()
            .flat_map(|file| file.records)
            .collect()
    }
}

/// Load every path in sorted order; a failing file is logged and skipped.
pub fn load_batch<I, P>(paths: I, options: &LoadOptions) -> BatchReport
where
    I: IntoIterator<Item = P>,
    P: Into<PathBuf>,
{
    let mut paths: Vec<PathBuf> = paths.into_iter().map(Into::into).collect();
    paths.sort();

    let mut report = BatchReport::default();
    for path in paths {
        info!("importing data from {}", path.display());
        let index = CorpusIndex::new(path.clone()).with_options(options.clone());
        match index.documents() {
            Ok(records) => report.loaded.push(LoadedFile { path, records }),
            Err(err) => {
                error!("{err}");
                report.failures.push(err);
            }
        }
    }
    info!(
        files = report.loaded.len(),
        failed = report.failures.len(),
        documents = report.record_count(),
        "batch load finished"
    );
    report
}
