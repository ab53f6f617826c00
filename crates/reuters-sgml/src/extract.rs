use chrono::{NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use reuters_types::{DEFAULT_TEXT_KIND, DocumentRecord, Facet, TextFields, month_number};

use crate::error::ExtractError;
use crate::markup::ElementView;

const NEW_ID_ATTR: &str = "NEWID";
const OLD_ID_ATTR: &str = "OLDID";
const TYPE_ATTR: &str = "TYPE";
const DATE_TAG: &str = "DATE";
const TEXT_TAG: &str = "TEXT";
const MARKER_TAG: &str = "D";

const AUTHOR_PREFIX: &str = "by ";
const AUTHOR_SUFFIX: &str = ", reuters";

// day-MON-year hh:mm:ss, anything after the seconds is ignored
static DATE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([0-9]{1,2})-(\w{3})-([0-9]{4})\s+([0-9]{2}):([0-9]{2}):([0-9]{2})")
        .expect("date pattern compiles")
});

/// Build a [`DocumentRecord`] from one `REUTERS` fragment.
pub fn extract_document<E: ElementView>(node: &E) -> Result<DocumentRecord, ExtractError> {
    let raw_id = node.attribute(NEW_ID_ATTR);
    let with_id = |err: ExtractError| err.with_reuters_id(raw_id);

    let reuters_id = parse_identifier(raw_id, NEW_ID_ATTR).map_err(with_id)?;
    let reuters_old_id =
        parse_identifier(node.attribute(OLD_ID_ATTR), OLD_ID_ATTR).map_err(with_id)?;

    let date = node
        .child(DATE_TAG)
        .ok_or_else(|| ExtractError::malformed(DATE_TAG, "missing element"))
        .map_err(with_id)?;
    let timestamp = parse_timestamp(date.text().unwrap_or_default()).map_err(with_id)?;

    let mut record = DocumentRecord {
        reuters_id,
        reuters_old_id,
        timestamp,
        topics: Vec::new(),
        places: Vec::new(),
        people: Vec::new(),
        orgs: Vec::new(),
        exchanges: Vec::new(),
        text: extract_text_fields(node.child(TEXT_TAG).as_ref()),
    };
    for facet in Facet::LISTS {
        if let Some(container) = facet.container_tag()
            && let Some(list) = record.facet_list_mut(facet)
        {
            *list = marker_values(node, container);
        }
    }
    Ok(record)
}

/// Build the free-text block from a `TEXT` element, or its absence.
pub fn extract_text_fields<E: ElementView>(node: Option<&E>) -> TextFields {
    let Some(node) = node else {
        return TextFields::default();
    };
    let kind = node
        .attribute(TYPE_ATTR)
        .filter(|kind| !kind.is_empty())
        .unwrap_or(DEFAULT_TEXT_KIND)
        .to_string();

    TextFields {
        kind,
        author: child_text(node, "AUTHOR").as_deref().and_then(normalize_author),
        dateline: child_text(node, "DATELINE").and_then(trimmed),
        title: child_text(node, "TITLE").and_then(trimmed),
        body: child_text(node, "BODY").and_then(trimmed),
    }
}

/// Strip a leading `by ` and a trailing `, reuters` (both case-insensitive).
///
/// The suffix match is exact: the singular `, Reuter` is left in place.
/// Returns `None` when nothing remains.
pub fn normalize_author(raw: &str) -> Option<String> {
    let mut author = raw.trim();
    let lowered = author.to_lowercase();
    if lowered.starts_with(AUTHOR_PREFIX) {
        author = skip_chars(author, AUTHOR_PREFIX.chars().count());
    }
    if lowered.ends_with(AUTHOR_SUFFIX) {
        author = drop_last_chars(author, AUTHOR_SUFFIX.chars().count());
    }
    (!author.is_empty()).then(|| author.to_string())
}

/// Parse a corpus `DATE` value such as `26-FEB-1987 15:01:01.79`.
pub fn parse_timestamp(raw: &str) -> Result<NaiveDateTime, ExtractError> {
    let raw = raw.trim();
    let caps = DATE_PATTERN
        .captures(raw)
        .ok_or_else(|| ExtractError::malformed(DATE_TAG, format!("unrecognised date {raw:?}")))?;

    let code = &caps[2];
    let month = month_number(code).ok_or_else(|| ExtractError::UnknownMonth {
        reuters_id: None,
        code: code.to_string(),
    })?;
    let number = |idx: usize| -> Result<u32, ExtractError> {
        caps[idx]
            .parse()
            .map_err(|_| ExtractError::malformed(DATE_TAG, format!("bad number in {raw:?}")))
    };
    let (day, year) = (number(1)?, number(3)?);
    let (hour, minute, second) = (number(4)?, number(5)?, number(6)?);

    NaiveDate::from_ymd_opt(year as i32, month, day)
        .and_then(|date| date.and_hms_opt(hour, minute, second))
        .ok_or_else(|| ExtractError::malformed(DATE_TAG, format!("out of range date {raw:?}")))
}

fn parse_identifier(raw: Option<&str>, attr: &'static str) -> Result<i64, ExtractError> {
    let raw = raw.ok_or_else(|| ExtractError::malformed(attr, "missing attribute"))?;
    raw.trim()
        .parse()
        .map_err(|_| ExtractError::malformed(attr, format!("not an integer: {raw:?}")))
}

fn marker_values<E: ElementView>(node: &E, container: &str) -> Vec<String> {
    let mut values: Vec<String> = node
        .children_at(&format!("{container}/{MARKER_TAG}"))
        .iter()
        .filter_map(|marker| marker.text().map(str::to_string))
        .collect();
    values.sort();
    values
}

fn child_text<E: ElementView>(node: &E, tag: &str) -> Option<String> {
    let child = node.child(tag)?;
    Some(child.text().unwrap_or_default().to_string())
}

fn trimmed(text: String) -> Option<String> {
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

fn skip_chars(s: &str, n: usize) -> &str {
    s.char_indices().nth(n).map_or("", |(idx, _)| &s[idx..])
}

fn drop_last_chars(s: &str, n: usize) -> &str {
    if n == 0 {
        return s;
    }
    s.char_indices()
        .rev()
        .nth(n - 1)
        .map_or("", |(idx, _)| &s[..idx])
}
