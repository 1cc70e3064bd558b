//! Feed file rendering
//!
//! Turns one batch of [`PushItem`]s into a `gsafeed` XML document. All text
//! and attribute values go through quick-xml's escaping, which covers the
//! five XML special characters, so escaped output never contains `<<`.
//! Whitespace a parser would normalise is written as character references.

use adaptor_core::{Acl, DocIdCodec, FeedConfig, PushItem, ReadPermissions, Record};
use quick_xml::escape::escape;
use quick_xml::events::attributes::Attribute;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::name::QName;
use quick_xml::Writer;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use crate::{FeedError, Result};

const DOCTYPE: &str = r#"gsafeed PUBLIC "-//Google//DTD GSA Feeds//EN" """#;
const LAST_MODIFIED_FORMAT: &str = "%a, %d %b %Y %H:%M:%S %z";
// Required by the feed DTD, ignored for metadata-and-url feeds
const RECORD_MIME_TYPE: &str = "text/plain";

/// Feed type announced in the header and the multipart form
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeedType {
    #[default]
    #[serde(rename = "metadata-and-url")]
    MetadataAndUrl,
    #[serde(rename = "incremental")]
    Incremental,
}

impl FeedType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedType::MetadataAndUrl => "metadata-and-url",
            FeedType::Incremental => "incremental",
        }
    }
}

impl fmt::Display for FeedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeedType {
    type Err = FeedError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "metadata-and-url" => Ok(FeedType::MetadataAndUrl),
            "incremental" => Ok(FeedType::Incremental),
            other => Err(FeedError::InvalidFeedType(other.to_string())),
        }
    }
}

/// A rendered feed, ready to transmit or resend verbatim
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedFile {
    pub datasource: String,
    pub feed_type: FeedType,
    pub xml: String,
    pub item_count: usize,
}

/// Rendering switches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedSettings {
    pub feed_type: FeedType,
    /// Emit `crawl-immediately` for records that ask for it
    pub crawl_immediately_enabled: bool,
    /// Emit `crawl-once` for records that ask for it
    pub no_recrawl_enabled: bool,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            feed_type: FeedType::MetadataAndUrl,
            crawl_immediately_enabled: true,
            no_recrawl_enabled: true,
        }
    }
}

impl FeedSettings {
    pub fn from_config(config: &FeedConfig) -> Result<Self> {
        Ok(Self {
            feed_type: config.feed_type.parse()?,
            crawl_immediately_enabled: config.crawl_immediately_enabled,
            no_recrawl_enabled: config.no_recrawl_enabled,
        })
    }
}

/// Check a datasource name against `[a-zA-Z_][a-zA-Z0-9_-]*`
pub fn validate_datasource(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        }
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(FeedError::InvalidDatasource(name.to_string()))
    }
}

/// Renders batches of push items into feed XML
#[derive(Debug, Clone)]
pub struct FeedFileMaker {
    codec: DocIdCodec,
    datasource: String,
    settings: FeedSettings,
}

impl FeedFileMaker {
    pub fn new(codec: DocIdCodec, datasource: impl Into<String>, settings: FeedSettings) -> Result<Self> {
        let datasource = datasource.into();
        validate_datasource(&datasource)?;
        Ok(Self {
            codec,
            datasource,
            settings,
        })
    }

    pub fn datasource(&self) -> &str {
        &self.datasource
    }

    pub fn feed_type(&self) -> FeedType {
        self.settings.feed_type
    }

    pub fn codec(&self) -> &DocIdCodec {
        &self.codec
    }

    pub fn make_feed(&self, items: &[PushItem]) -> Result<FeedFile> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 0);

        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("no"))))?;
        writer.write_event(Event::DocType(BytesText::from_escaped(DOCTYPE)))?;
        writer.write_event(Event::Start(BytesStart::new("gsafeed")))?;
        writer.write_event(Event::Comment(BytesText::from_escaped(concat!(
            "adaptor-feed ",
            env!("CARGO_PKG_VERSION")
        ))))?;

        writer.write_event(Event::Start(BytesStart::new("header")))?;
        write_text_element(&mut writer, "datasource", &self.datasource)?;
        write_text_element(&mut writer, "feedtype", self.settings.feed_type.as_str())?;
        writer.write_event(Event::End(BytesEnd::new("header")))?;

        writer.write_event(Event::Start(BytesStart::new("group")))?;
        for item in items {
            match item {
                PushItem::Record(record) => self.write_record(&mut writer, record)?,
                PushItem::NamedResource {
                    doc_id,
                    fragment,
                    acl,
                } => {
                    let url = match fragment {
                        Some(fragment) => self.codec.encode_with_fragment(doc_id, fragment),
                        None => self.codec.encode(doc_id),
                    }
                    .map_err(|source| FeedError::InvalidItem {
                        doc_id: doc_id.unique_id().to_string(),
                        source,
                    })?;
                    self.write_acl(&mut writer, Some(&url), acl)?;
                }
            }
        }
        writer.write_event(Event::End(BytesEnd::new("group")))?;
        writer.write_event(Event::End(BytesEnd::new("gsafeed")))?;

        let xml = String::from_utf8(writer.into_inner())
            .map_err(|e| FeedError::Encoding(e.to_string()))?;

        Ok(FeedFile {
            datasource: self.datasource.clone(),
            feed_type: self.settings.feed_type,
            xml,
            item_count: items.len(),
        })
    }

    fn write_record(&self, writer: &mut Writer<Vec<u8>>, record: &Record) -> Result<()> {
        let doc_id = record.doc_id();
        let url = self
            .codec
            .encode(doc_id)
            .map_err(|source| FeedError::InvalidItem {
                doc_id: doc_id.unique_id().to_string(),
                source,
            })?;

        let mut start = BytesStart::new("record");
        push_attr(&mut start, "url", url.as_str());
        if let Some(link) = record.result_link() {
            push_attr(&mut start, "displayurl", link);
        }
        push_attr(&mut start, "action", record.action().as_str());
        push_attr(&mut start, "mimetype", RECORD_MIME_TYPE);
        if let Some(last_modified) = record.last_modified() {
            let formatted = last_modified.format(LAST_MODIFIED_FORMAT).to_string();
            push_attr(&mut start, "last-modified", formatted.as_str());
        }
        if record.lock() {
            push_attr(&mut start, "lock", "true");
        }
        match doc_id.read_permissions() {
            ReadPermissions::Public => {}
            ReadPermissions::HeadRequest => push_attr(&mut start, "authmethod", "httpbasic"),
            ReadPermissions::Custom(method) => push_attr(&mut start, "authmethod", method.as_str()),
        }
        if record.crawl_immediately() && self.settings.crawl_immediately_enabled {
            push_attr(&mut start, "crawl-immediately", "true");
        }
        if record.crawl_once() && self.settings.no_recrawl_enabled {
            push_attr(&mut start, "crawl-once", "true");
        }

        let metadata = record.metadata().filter(|m| !m.is_empty());
        if metadata.is_none() && record.acl().is_none() {
            writer.write_event(Event::Empty(start))?;
            return Ok(());
        }

        writer.write_event(Event::Start(start))?;
        if let Some(metadata) = metadata {
            writer.write_event(Event::Start(BytesStart::new("metadata")))?;
            for (name, content) in metadata.iter() {
                let mut meta = BytesStart::new("meta");
                push_attr(&mut meta, "name", name);
                push_attr(&mut meta, "content", content);
                writer.write_event(Event::Empty(meta))?;
            }
            writer.write_event(Event::End(BytesEnd::new("metadata")))?;
        }
        if let Some(acl) = record.acl() {
            self.write_acl(writer, None, acl)?;
        }
        writer.write_event(Event::End(BytesEnd::new("record")))?;
        Ok(())
    }

    fn write_acl(&self, writer: &mut Writer<Vec<u8>>, url: Option<&str>, acl: &Acl) -> Result<()> {
        let mut start = BytesStart::new("acl");
        if let Some(url) = url {
            push_attr(&mut start, "url", url);
        }
        push_attr(&mut start, "inheritance-type", acl.inheritance_type().as_str());
        if let Some(parent) = acl.inherit_from() {
            let parent_url = match &parent.fragment {
                Some(fragment) => self.codec.encode_with_fragment(&parent.doc_id, fragment),
                None => self.codec.encode(&parent.doc_id),
            }
            .map_err(|source| FeedError::InvalidItem {
                doc_id: parent.doc_id.unique_id().to_string(),
                source,
            })?;
            push_attr(&mut start, "inherit-from", parent_url.as_str());
        }

        if acl.permits().is_empty() && acl.denies().is_empty() {
            writer.write_event(Event::Empty(start))?;
            return Ok(());
        }

        writer.write_event(Event::Start(start))?;
        let principals = acl
            .permits()
            .iter()
            .map(|p| (p, "permit"))
            .chain(acl.denies().iter().map(|p| (p, "deny")));
        for (principal, access) in principals {
            let case = if acl.is_case_sensitive_for(principal) {
                "everything-case-sensitive"
            } else {
                "everything-case-insensitive"
            };
            let mut element = BytesStart::new("principal");
            push_attr(&mut element, "scope", principal.kind.as_str());
            push_attr(&mut element, "access", access);
            push_attr(&mut element, "namespace", principal.namespace.as_str());
            push_attr(&mut element, "case-sensitivity-type", case);
            writer.write_event(Event::Start(element))?;
            writer.write_event(text_event(&principal.qualified_name()))?;
            writer.write_event(Event::End(BytesEnd::new("principal")))?;
        }
        writer.write_event(Event::End(BytesEnd::new("acl")))?;
        Ok(())
    }
}

/// Escape an attribute value so a conforming parser reads it back unchanged.
/// Attribute-value normalisation would otherwise fold tab, LF and CR into spaces.
fn escape_attr(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in escape(value).chars() {
        match c {
            '\t' => escaped.push_str("&#9;"),
            '\n' => escaped.push_str("&#10;"),
            '\r' => escaped.push_str("&#13;"),
            c => escaped.push(c),
        }
    }
    escaped
}

fn push_attr(start: &mut BytesStart<'_>, name: &str, value: &str) {
    start.push_attribute(Attribute {
        key: QName(name.as_bytes()),
        value: Cow::Owned(escape_attr(value).into_bytes()),
    });
}

// Line-end normalisation turns a bare CR in text into LF
fn text_event(text: &str) -> Event<'static> {
    Event::Text(BytesText::from_escaped(escape(text).replace('\r', "&#13;")))
}

fn write_text_element(writer: &mut Writer<Vec<u8>>, name: &str, text: &str) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new(name)))?;
    writer.write_event(text_event(text))?;
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}
