use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::path::PathBuf;
use std::sync::Arc;

use bitvec::prelude::*;
use reuters_sgml::{BatchReport, CorpusSummary, LoadOptions, load_batch};
use reuters_types::{DocumentRecord, Facet};
use thiserror::Error;
use tracing::{info, warn};

const FACETS: usize = Facet::ALL.len();

type BitSet = BitVec<usize, Lsb0>;

/// Every loaded document, held in memory with per-facet postings.
#[derive(Debug, Clone)]
pub struct DocumentStore {
    documents: Vec<DocumentRecord>,
    by_id: HashMap<i64, usize>,
    postings: [HashMap<String, BitSet>; FACETS],
    search_text: Vec<String>,
    summary: CorpusSummary,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no corpus files given")]
    NoInput,
    #[error("none of the {0} corpus files could be loaded")]
    AllFailed(usize),
}

#[derive(Debug)]
pub struct QueryParams<'a> {
    /// Exact-match facet filters, combined with AND.
    pub filters: &'a [(Facet, &'a str)],
    /// Case-insensitive substring over title and body.
    pub text: Option<&'a str>,
    pub page: usize,
    pub page_size: usize,
}

#[derive(Debug, Clone)]
pub struct QueryResult<'a> {
    pub total: usize,
    pub items: Vec<&'a DocumentRecord>,
    pub has_more: bool,
}

impl QueryResult<'_> {
    fn empty() -> Self {
        Self {
            total: 0,
            items: Vec::new(),
            has_more: false,
        }
    }
}

impl DocumentStore {
    /// Load `paths` in sorted order, skipping files that fail.
    pub fn load<I, P>(paths: I, options: &LoadOptions) -> Result<Arc<Self>, StoreError>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self::from_report(load_batch(paths, options))
    }

    pub fn from_report(report: BatchReport) -> Result<Arc<Self>, StoreError> {
        if report.loaded.is_empty() {
            return Err(match report.failures.len() {
                0 => StoreError::NoInput,
                failed => StoreError::AllFailed(failed),
            });
        }
        Ok(Self::build(report.into_records()))
    }

    pub fn build(documents: Vec<DocumentRecord>) -> Arc<Self> {
        let n = documents.len();
        let mut by_id = HashMap::with_capacity(n);
        let mut postings: [HashMap<String, BitSet>; FACETS] =
            array_init::array_init(|_| HashMap::new());
        let mut search_text = Vec::with_capacity(n);

        for (idx, doc) in documents.iter().enumerate() {
            match by_id.entry(doc.reuters_id) {
                Entry::Vacant(entry) => {
                    entry.insert(idx);
                }
                Entry::Occupied(_) => {
                    warn!("duplicate reuters_id {}, keeping the first", doc.reuters_id);
                }
            }
            for facet in Facet::ALL {
                for value in doc.facet_values(facet) {
                    postings[slot(facet)]
                        .entry(value.clone())
                        .or_insert_with(|| bitvec![usize, Lsb0; 0; n])
                        .set(idx, true);
                }
            }
            search_text.push(searchable(doc));
        }

        let summary = CorpusSummary::from_records(&documents);
        info!(
            "indexed {n} documents ({} topics, {} places, {} authors)",
            summary.topics.len(),
            summary.places.len(),
            summary.authors.len()
        );
        Arc::new(Self {
            documents,
            by_id,
            postings,
            search_text,
            summary,
        })
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn get(&self, reuters_id: i64) -> Option<&DocumentRecord> {
        self.by_id.get(&reuters_id).map(|&idx| &self.documents[idx])
    }

    pub fn summary(&self) -> &CorpusSummary {
        &self.summary
    }

    /// Distinct sorted values of one facet across the store.
    pub fn facet_values(&self, facet: Facet) -> &[String] {
        self.summary.facet(facet)
    }

    pub fn query(&self, params: QueryParams<'_>) -> QueryResult<'_> {
        let mut candidates: BitSet = bitvec![usize, Lsb0; 1; self.documents.len()];
        for (facet, value) in params.filters {
            let Some(posting) = self.postings[slot(*facet)].get(*value) else {
                return QueryResult::empty();
            };
            candidates &= posting;
            if candidates.not_any() {
                return QueryResult::empty();
            }
        }

        let needle = params
            .text
            .map(str::to_lowercase)
            .filter(|needle| !needle.is_empty());
        let offset = params
            .page
            .saturating_sub(1)
            .saturating_mul(params.page_size);
        let mut total = 0usize;
        let mut items = Vec::with_capacity(params.page_size.min(self.documents.len()));

        for idx in candidates.iter_ones() {
            if let Some(needle) = &needle
                && !self.search_text[idx].contains(needle.as_str())
            {
                continue;
            }
            total += 1;
            if total > offset && items.len() < params.page_size {
                items.push(&self.documents[idx]);
            }
        }

        let has_more = offset + items.len() < total;
        QueryResult {
            total,
            items,
            has_more,
        }
    }
}

fn slot(facet: Facet) -> usize {
    facet as usize
}

fn searchable(doc: &DocumentRecord) -> String {
    let title = doc.text.title.as_deref().unwrap_or_default();
    let body = doc.text.body.as_deref().unwrap_or_default();
    format!("{title}\n{body}").to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use reuters_sgml::parse_documents;

    const CORPUS: &str = r#"
<REUTERS NEWID="10" OLDID="1"><DATE>1-JAN-1987 00:00:00</DATE>
<TOPICS><D>gold</D></TOPICS><PLACES><D>usa</D></PLACES>
<TEXT><TITLE>GOLD PRICES RISE</TITLE><BODY>Bullion firmed in New York.</BODY></TEXT></REUTERS>
<REUTERS NEWID="11" OLDID="2"><DATE>2-JAN-1987 00:00:00</DATE>
<TOPICS><D>gold</D><D>silver</D></TOPICS><PLACES><D>canada</D></PLACES>
<TEXT><AUTHOR>By Sue Baker, Reuters</AUTHOR><TITLE>METALS STEADY</TITLE></TEXT></REUTERS>
<REUTERS NEWID="12" OLDID="3"><DATE>3-JAN-1987 00:00:00</DATE>
<TOPICS><D>acq</D></TOPICS><PLACES><D>usa</D></PLACES>
<TEXT><BODY>Gold Fields agreed to buy a stake.</BODY></TEXT></REUTERS>
<REUTERS NEWID="11" OLDID="4"><DATE>4-JAN-1987 00:00:00</DATE><TEXT/></REUTERS>
"#;

    fn make_store() -> Arc<DocumentStore> {
        let records = parse_documents(CORPUS, &LoadOptions::default()).expect("parse corpus");
        DocumentStore::build(records)
    }

    fn ids(result: &QueryResult<'_>) -> Vec<i64> {
        result.items.iter().map(|doc| doc.reuters_id).collect()
    }

    fn query<'a>(
        store: &'a DocumentStore,
        filters: &[(Facet, &str)],
        text: Option<&str>,
        page: usize,
        page_size: usize,
    ) -> QueryResult<'a> {
        store.query(QueryParams {
            filters,
            text,
            page,
            page_size,
        })
    }

    #[test]
    fn looks_up_by_id_keeping_first_duplicate() {
        let store = make_store();
        assert_eq!(store.len(), 4);
        assert_eq!(store.get(11).map(|d| d.reuters_old_id), Some(2));
        assert!(store.get(99).is_none());
    }

    #[test]
    fn filters_combine_with_and() {
        let store = make_store();
        let result = query(&store, &[(Facet::Topics, "gold")], None, 1, 10);
        assert_eq!(ids(&result), vec![10, 11]);

        let result = query(
            &store,
            &[(Facet::Topics, "gold"), (Facet::Places, "usa")],
            None,
            1,
            10,
        );
        assert_eq!(ids(&result), vec![10]);

        let result = query(&store, &[(Facet::Authors, "Sue Baker")], None, 1, 10);
        assert_eq!(ids(&result), vec![11]);

        let result = query(&store, &[(Facet::Topics, "wheat")], None, 1, 10);
        assert_eq!(result.total, 0);
        assert!(!result.has_more);
    }

    #[test]
    fn text_search_is_case_insensitive_over_title_and_body() {
        let store = make_store();
        let result = query(&store, &[], Some("GOLD"), 1, 10);
        assert_eq!(ids(&result), vec![10, 12]);

        let result = query(&store, &[(Facet::Places, "usa")], Some("stake"), 1, 10);
        assert_eq!(ids(&result), vec![12]);

        let result = query(&store, &[], Some(""), 1, 10);
        assert_eq!(result.total, 4);
    }

    #[test]
    fn paginates_in_store_order() {
        let store = make_store();
        let first = query(&store, &[], None, 1, 3);
        let second = query(&store, &[], None, 2, 3);
        let beyond = query(&store, &[], None, 5, 3);
        assert_eq!(first.total, 4);
        assert!(first.has_more);
        assert_eq!(ids(&first), vec![10, 11, 12]);
        assert_eq!(ids(&second), vec![11]);
        assert!(!second.has_more);
        assert!(beyond.items.is_empty());
        assert_eq!(beyond.total, 4);
    }

    #[test]
    fn summary_reflects_all_documents() {
        let store = make_store();
        assert_eq!(store.summary().documents, 4);
        assert_eq!(
            store.facet_values(Facet::Topics),
            &["acq", "gold", "silver"]
        );
        assert_eq!(store.facet_values(Facet::Authors), &["Sue Baker"]);
    }

    #[test]
    fn report_without_files_is_an_error() {
        let err = DocumentStore::from_report(BatchReport::default()).unwrap_err();
        assert!(matches!(err, StoreError::NoInput));
    }
}
