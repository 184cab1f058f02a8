use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::net::HttpClient;
use crate::persist::AtomicFileWriter;
use crate::types::{EngineError, NetError, Reporter};

/// XML namespace used in EP3 XML output.
pub const EPRINTS_XMLNS: &str = "http://eprints.org/ep2/data/2.0";

/// Relation type marking documents derived from another document, such as
/// thumbnails and the generated indexcodes.txt. These must never be
/// downloaded.
const VOLATILE_RELATION: &str = "http://eprints.org/relation/isVolatileVersionOf";

/// One entry from a record's document manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentRef {
    pub url: String,
    /// True for derived artifacts excluded from preservation downloads.
    pub volatile: bool,
}

/// Parsed representation of one EP3 XML record.
///
/// The raw server bytes are kept alongside the extracted fields because the
/// metadata file written into the record directory must be byte-faithful.
#[derive(Debug, Clone)]
pub struct EprintRecord {
    /// The record's own id attribute; empty string when the server omits it.
    pub id: String,
    pub lastmod: Option<DateTime<Utc>>,
    /// Status label such as "archive" or "deletion"; empty when absent.
    pub status: String,
    /// The official external URL. Both an absent element and an empty
    /// element resolve to the empty string; do not conflate this with null.
    pub official_url: String,
    document_refs: Vec<DocumentRef>,
    raw: String,
}

impl EprintRecord {
    /// Parses the body of a `/eprint/{id}.xml` response.
    pub fn parse(raw: &str) -> Result<Self, EngineError> {
        let doc = roxmltree::Document::parse(raw)
            .map_err(|err| EngineError::Parse(err.to_string()))?;

        let eprint = doc
            .descendants()
            .find(|node| is_eprints_element(node, "eprint"))
            .ok_or_else(|| EngineError::Parse("no <eprint> element in record".to_string()))?;
        let id = eprint.attribute("id").unwrap_or("").to_string();

        let lastmod = find_text(&doc, "lastmod").and_then(|text| parse_lastmod(&text));
        let status = find_text(&doc, "eprint_status").unwrap_or_default();
        let official_url = find_text(&doc, "official_url").unwrap_or_default();

        let mut document_refs = Vec::new();
        for document in doc
            .descendants()
            .filter(|node| is_eprints_element(node, "document"))
        {
            let url = document
                .descendants()
                .find(|node| is_eprints_element(node, "url"))
                .and_then(|node| node.text());
            let Some(url) = url else {
                log::debug!(
                    "ignoring document with no file: {}",
                    document.attribute("id").unwrap_or("<no id>")
                );
                continue;
            };
            document_refs.push(DocumentRef {
                url: url.to_string(),
                volatile: is_derived_document(&document),
            });
        }

        Ok(Self {
            id,
            lastmod,
            status,
            official_url,
            document_refs,
            raw: raw.to_string(),
        })
    }

    /// URLs of the documents to download, in manifest order.
    ///
    /// Derived/volatile entries are filtered out here and are never
    /// surfaced to the downloader.
    pub fn documents(&self) -> Vec<&str> {
        self.document_refs
            .iter()
            .filter(|doc| {
                if doc.volatile {
                    log::debug!("ignoring derived file {}", doc.url);
                }
                !doc.volatile
            })
            .map(|doc| doc.url.as_str())
            .collect()
    }

    /// All manifest entries, including volatile ones.
    pub fn document_refs(&self) -> &[DocumentRef] {
        &self.document_refs
    }

    /// Writes the raw record XML as `{prefix}{number}.xml` inside `dir`.
    pub fn write_into(&self, dir: &Path, prefix: &str, number: &str) -> Result<PathBuf, EngineError> {
        let filename = format!("{prefix}{number}.xml");
        let writer = AtomicFileWriter::new(dir.to_path_buf());
        let mut content = self.raw.trim_end().to_string();
        content.push('\n');
        let path = writer.write(&filename, content.as_bytes())?;
        Ok(path)
    }
}

fn is_eprints_element(node: &roxmltree::Node, name: &str) -> bool {
    node.is_element()
        && node.tag_name().name() == name
        && node.tag_name().namespace() == Some(EPRINTS_XMLNS)
}

fn find_text(doc: &roxmltree::Document, name: &str) -> Option<String> {
    doc.descendants()
        .find(|node| is_eprints_element(node, name))
        .map(|node| node.text().unwrap_or("").to_string())
}

/// EPrints writes lastmod as e.g. "2018-12-14 21:57:06", in UTC.
fn parse_lastmod(text: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(text.trim(), "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

fn is_derived_document(document: &roxmltree::Node) -> bool {
    document
        .descendants()
        .filter(|node| is_eprints_element(node, "relation"))
        .flat_map(|rel| rel.descendants())
        .filter(|node| is_eprints_element(node, "type"))
        .any(|node| node.text() == Some(VOLATILE_RELATION))
}

/// Outcome of fetching one record, making the missing-ok branching explicit
/// at the call site.
#[derive(Debug)]
pub enum RecordFetch {
    Record(Box<EprintRecord>),
    Missing,
}

/// Fetches record metadata and listings from one EPrints REST endpoint.
pub struct RecordSource {
    client: HttpClient,
    base_url: String,
}

impl RecordSource {
    pub fn new(client: HttpClient, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn client(&self) -> &HttpClient {
        &self.client
    }

    fn record_url(&self, number: &str) -> String {
        format!("{}/eprint/{}.xml", self.base_url, number)
    }

    fn listing_url(&self) -> String {
        format!("{}/eprint", self.base_url)
    }

    /// Retrieves and parses one record.
    ///
    /// With `missing_ok`, absent records and per-record authentication or
    /// service failures come back as `RecordFetch::Missing`; anything else
    /// propagates and is fatal for the whole run.
    pub async fn fetch_record(
        &self,
        number: &str,
        missing_ok: bool,
        reporter: &dyn Reporter,
    ) -> Result<RecordFetch, EngineError> {
        let url = self.record_url(number);
        let response = match self.client.get(&url, false).await {
            Ok(response) => response,
            Err(NetError::NoContent(_)) if missing_ok => {
                reporter.warn(&format!("Server has no content for record {number}"));
                return Ok(RecordFetch::Missing);
            }
            Err(err) if missing_ok && err.tolerable_when_missing_ok() => {
                // Some servers deny access to individual records; when
                // ignoring missing entries, flag them and move on.
                reporter.alert(&format!("{err} (record {number})"));
                return Ok(RecordFetch::Missing);
            }
            Err(err) => return Err(err.into()),
        };
        let body = response
            .text()
            .await
            .map_err(|err| NetError::Network(err.to_string()))?;
        let record = EprintRecord::parse(&body)?;
        Ok(RecordFetch::Record(Box::new(record)))
    }

    /// Retrieves the server's record listing page.
    pub async fn fetch_listing(&self) -> Result<String, EngineError> {
        let url = self.listing_url();
        let response = self.client.get(&url, false).await?;
        let body = response
            .text()
            .await
            .map_err(|err| NetError::Network(err.to_string()))?;
        Ok(body)
    }

    /// Extracts record identifiers from a raw listing page.
    ///
    /// The listing is XHTML whose anchors come in pairs like `4/` and
    /// `4.xml`; the identifiers are taken from the `.xml` ones.
    pub fn listing_ids(raw_listing: &str) -> Result<Vec<String>, EngineError> {
        let doc = roxmltree::Document::parse(raw_listing)
            .map_err(|_| EngineError::Internal("cannot parse server listing".to_string()))?;
        let mut ids = Vec::new();
        for node in doc.descendants().filter(|node| {
            node.is_element() && node.tag_name().name() == "a"
        }) {
            if let Some(href) = node.attribute("href") {
                if let Some(id) = href.strip_suffix(".xml") {
                    ids.push(id.to_string());
                }
            }
        }
        if ids.is_empty() {
            return Err(EngineError::Internal(
                "server listing contained no records".to_string(),
            ));
        }
        Ok(ids)
    }
}
