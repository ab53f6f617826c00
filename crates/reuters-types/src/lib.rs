//! Shared record types for the Reuters news corpus.
//!
//! The goal is to expose exactly the fields downstream consumers rely on:
//! identifiers, the story timestamp, the five category lists and the free-text
//! block. Records serialize to the flat mapping used by storage and API layers
//! (`reuters_id`, `reuters_old_id`, `datetime`, `topics`, ..., `text`).
//!
//! Use [`month_number`] to resolve the corpus' three-letter month codes,
//! [`Facet`] to address one of the aggregate categories, and
//! [`DocumentRecord::facet_values`] to read a facet off a record.
//!
//! ```rust
//! use reuters_types::{Facet, month_number};
//!
//! assert_eq!(month_number("MAR"), Some(3));
//! assert_eq!(Facet::from_name("topics"), Some(Facet::Topics));
//! assert_eq!(Facet::Topics.container_tag(), Some("TOPICS"));
//! ```

use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Document type used when a `TEXT` element carries no `TYPE` attribute.
pub const DEFAULT_TEXT_KIND: &str = "NORM";

const MONTHS: [(&str, u32); 12] = [
    ("JAN", 1),
    ("FEB", 2),
    ("MAR", 3),
    ("APR", 4),
    ("MAY", 5),
    ("JUN", 6),
    ("JUL", 7),
    ("AUG", 8),
    ("SEP", 9),
    ("OCT", 10),
    ("NOV", 11),
    ("DEC", 12),
];

/// Resolve an upper-case month code (`JAN` .. `DEC`) to its month number.
///
/// Lookup is case-sensitive; the corpus only ever writes upper-case codes.
pub fn month_number(code: &str) -> Option<u32> {
    MONTHS
        .iter()
        .find(|(name, _)| *name == code)
        .map(|(_, number)| *number)
}

/// One of the corpus-wide aggregate categories.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Facet {
    Authors,
    Exchanges,
    Orgs,
    People,
    Places,
    Topics,
}

impl Facet {
    /// Every facet, in alphabetical order.
    pub const ALL: [Facet; 6] = [
        Facet::Authors,
        Facet::Exchanges,
        Facet::Orgs,
        Facet::People,
        Facet::Places,
        Facet::Topics,
    ];

    /// The five facets stored as marker lists on each document.
    pub const LISTS: [Facet; 5] = [
        Facet::Topics,
        Facet::Places,
        Facet::People,
        Facet::Orgs,
        Facet::Exchanges,
    ];

    /// Lower-case name used in the record mapping and in URLs.
    pub fn name(self) -> &'static str {
        match self {
            Facet::Authors => "authors",
            Facet::Exchanges => "exchanges",
            Facet::Orgs => "orgs",
            Facet::People => "people",
            Facet::Places => "places",
            Facet::Topics => "topics",
        }
    }

    /// Parse a facet from its lower-case name.
    pub fn from_name(name: &str) -> Option<Self> {
        Facet::ALL.into_iter().find(|facet| facet.name() == name)
    }

    /// Container element holding the facet's `D` markers, if it is a list facet.
    pub fn container_tag(self) -> Option<&'static str> {
        match self {
            Facet::Authors => None,
            Facet::Exchanges => Some("EXCHANGES"),
            Facet::Orgs => Some("ORGS"),
            Facet::People => Some("PEOPLE"),
            Facet::Places => Some("PLACES"),
            Facet::Topics => Some("TOPICS"),
        }
    }
}

impl fmt::Display for Facet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Free-text portion of a story (`TEXT` element).
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct TextFields {
    /// `TYPE` attribute, `NORM` when absent or empty.
    #[serde(rename = "type")]
    pub kind: String,
    pub author: Option<String>,
    pub dateline: Option<String>,
    pub title: Option<String>,
    pub body: Option<String>,
}

impl Default for TextFields {
    fn default() -> Self {
        Self {
            kind: DEFAULT_TEXT_KIND.to_string(),
            author: None,
            dateline: None,
            title: None,
            body: None,
        }
    }
}

/// One story extracted from a corpus file.
///
/// Every list is sorted ascending and may contain repeats; none is ever null.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub reuters_id: i64,
    pub reuters_old_id: i64,
    #[serde(rename = "datetime")]
    pub timestamp: NaiveDateTime,
    pub topics: Vec<String>,
    pub places: Vec<String>,
    pub people: Vec<String>,
    pub orgs: Vec<String>,
    pub exchanges: Vec<String>,
    pub text: TextFields,
}

impl DocumentRecord {
    /// Values of `facet` on this record: the author (if any) or the marker list.
    pub fn facet_values(&self, facet: Facet) -> &[String] {
        match facet {
            Facet::Authors => self.text.author.as_slice(),
            Facet::Exchanges => &self.exchanges,
            Facet::Orgs => &self.orgs,
            Facet::People => &self.people,
            Facet::Places => &self.places,
            Facet::Topics => &self.topics,
        }
    }

    /// Mutable access to a list facet; `None` for [`Facet::Authors`].
    pub fn facet_list_mut(&mut self, facet: Facet) -> Option<&mut Vec<String>> {
        match facet {
            Facet::Authors => None,
            Facet::Exchanges => Some(&mut self.exchanges),
            Facet::Orgs => Some(&mut self.orgs),
            Facet::People => Some(&mut self.people),
            Facet::Places => Some(&mut self.places),
            Facet::Topics => Some(&mut self.topics),
        }
    }
}
