//! Load Reuters-21578 style SGML corpus files into typed records.
//!
//! Corpus files are not well-formed XML: they hold many sibling `<REUTERS>`
//! fragments with no root, bare ampersands, control characters and the
//! occasional unbalanced tag. This crate reads them tolerantly and turns each
//! fragment into a [`DocumentRecord`](reuters_types::DocumentRecord).
//!
//! # Layers
//! - [`MarkupLoader`] decodes bytes as UTF-8 and builds a [`MarkupTree`] under a
//!   synthetic root, repairing markup errors instead of failing.
//! - [`extract_document`] maps one fragment (anything implementing
//!   [`ElementView`]) to a record: identifiers, timestamp, the five marker
//!   lists and the free-text block.
//! - [`CorpusIndex`] ties both to a file path and adds the corpus-wide
//!   aggregates (authors, exchanges, orgs, people, places, topics).
//! - [`load_batch`] loads a set of files, logging and skipping the ones that
//!   fail.
//!
//! Every call re-reads the file; nothing is cached.
//!
//! # Example
//! ```no_run
//! use reuters_sgml::{CorpusIndex, LoadOptions};
//!
//! # fn main() -> anyhow::Result<()> {
//! let index = CorpusIndex::new("/path/to/reut2-000.sgm")
//!     .with_options(LoadOptions::skipping_malformed());
//! for doc in index.documents()?.iter().take(3) {
//!     println!("{} {:?}", doc.reuters_id, doc.text.title);
//! }
//! println!("topics: {:?}", index.topics()?);
//! # Ok(()) }
//! ```
//!
//! For a runnable demo, see `cargo run -p reuters-sgml --example stats -- <file.sgm>`.

mod corpus;
mod error;
mod extract;
mod markup;

pub use corpus::{
    BatchReport, CorpusIndex, CorpusSummary, LoadOptions, LoadedFile, MalformedPolicy, aggregate,
    decode_documents, load_batch, parse_documents,
};
pub use error::{CorpusError, DecodeError, ExtractError, LoadError};
pub use extract::{extract_document, extract_text_fields, normalize_author, parse_timestamp};
pub use markup::{Element, ElementView, FRAGMENT_TAG, MarkupLoader, MarkupTree, ROOT_TAG};
