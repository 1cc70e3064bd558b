//! multipart/form-data encoding of a feed
//!
//! The boundary is the fixed token `<<`. Escaped feed XML cannot contain it
//! because every literal `<` in text or attribute values becomes `&lt;`, and
//! markup never places two tags' opening brackets back to back.

use crate::maker::FeedFile;

pub const BOUNDARY: &str = "<<";
const CRLF: &str = "\r\n";

/// Value of the request `Content-Type` header
pub fn content_type() -> String {
    format!("multipart/form-data; boundary={}", BOUNDARY)
}

/// Body with the `datasource`, `feedtype` and `data` parts
pub fn encode(feed: &FeedFile) -> Vec<u8> {
    let mut body = String::with_capacity(feed.xml.len() + 512);
    push_part(&mut body, "datasource", "text/plain", &feed.datasource);
    push_part(&mut body, "feedtype", "text/plain", feed.feed_type.as_str());
    push_part(&mut body, "data", "text/xml", &feed.xml);
    body.push_str("--");
    body.push_str(BOUNDARY);
    body.push_str("--");
    body.push_str(CRLF);
    body.into_bytes()
}

fn push_part(body: &mut String, name: &str, content_type: &str, value: &str) {
    body.push_str("--");
    body.push_str(BOUNDARY);
    body.push_str(CRLF);
    body.push_str("Content-Disposition: form-data; name=\"");
    body.push_str(name);
    body.push('"');
    body.push_str(CRLF);
    body.push_str("Content-Type: ");
    body.push_str(content_type);
    body.push_str(CRLF);
    body.push_str(CRLF);
    body.push_str(value);
    body.push_str(CRLF);
}
