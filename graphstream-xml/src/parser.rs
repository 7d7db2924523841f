//! Streaming [`DocumentParser`] for XML on top of quick-xml.

use std::borrow::Cow;
use std::collections::VecDeque;
use std::fmt;
use std::io::Cursor;

use graphstream::{DocumentEvent, DocumentParser};
use quick_xml::NsReader;
use quick_xml::escape::resolve_xml_entity;
use quick_xml::events::{BytesStart, Event};

use crate::tracing_macros::trace;

/// XML parsing error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlError {
    /// Error from quick-xml, including malformed markup and mismatched tags.
    Parse(String),
    /// Input ended with elements still open.
    UnexpectedEof,
    /// Invalid UTF-8.
    InvalidUtf8(core::str::Utf8Error),
}

impl fmt::Display for XmlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            XmlError::Parse(msg) => write!(f, "XML parse error: {msg}"),
            XmlError::UnexpectedEof => write!(f, "Unexpected end of XML"),
            XmlError::InvalidUtf8(e) => write!(f, "Invalid UTF-8 in XML: {e}"),
        }
    }
}

impl std::error::Error for XmlError {}

/// Turns XML text into [`DocumentEvent`]s.
///
/// Namespace prefixes are dropped from element and attribute names and
/// `xmlns` declarations are skipped. Adjacent text, entity references and
/// CDATA sections are merged into one `Text` event. Comments, processing
/// instructions, the declaration and the doctype produce nothing.
pub struct XmlParser<'de> {
    reader: NsReader<Cursor<&'de [u8]>>,
    /// Buffer for quick-xml events
    buf: Vec<u8>,
    /// Character data not yet emitted
    text: String,
    /// Events ready to hand out
    pending: VecDeque<DocumentEvent<'de>>,
    depth: usize,
    done: bool,
}

impl<'de> XmlParser<'de> {
    /// Create a new streaming XML parser.
    pub fn new(input: &'de [u8]) -> Self {
        trace!(input_len = input.len(), "creating XML parser");

        let reader = NsReader::from_reader(Cursor::new(input));
        Self {
            reader,
            buf: Vec::new(),
            text: String::new(),
            pending: VecDeque::new(),
            depth: 0,
            done: false,
        }
    }

    /// Reads one quick-xml event, queueing whatever it completes.
    fn pump(&mut self) -> Result<(), XmlError> {
        self.buf.clear();
        let event = self
            .reader
            .read_event_into(&mut self.buf)
            .map_err(|e| XmlError::Parse(e.to_string()))?;

        match event {
            Event::Start(ref e) | Event::Empty(ref e) => {
                flush_text(&mut self.text, &mut self.pending, self.depth);
                let name = local_name(e)?;
                let attributes = attributes(e)?;
                if matches!(event, Event::Empty(_)) {
                    self.pending.push_back(DocumentEvent::ElementStart {
                        name: Cow::Owned(name.clone()),
                        attributes,
                    });
                    self.pending.push_back(DocumentEvent::ElementEnd {
                        name: Cow::Owned(name),
                    });
                } else {
                    self.depth += 1;
                    self.pending.push_back(DocumentEvent::ElementStart {
                        name: Cow::Owned(name),
                        attributes,
                    });
                }
            }
            Event::End(ref e) => {
                flush_text(&mut self.text, &mut self.pending, self.depth);
                let local = e.local_name();
                let name = core::str::from_utf8(local.as_ref()).map_err(XmlError::InvalidUtf8)?;
                self.depth = self.depth.saturating_sub(1);
                self.pending.push_back(DocumentEvent::ElementEnd {
                    name: Cow::Owned(name.to_string()),
                });
            }
            Event::Text(ref e) => {
                let text = e.decode().map_err(|e| XmlError::Parse(e.to_string()))?;
                self.text.push_str(&text);
            }
            Event::GeneralRef(ref e) => {
                let raw = e.decode().map_err(|e| XmlError::Parse(e.to_string()))?;
                self.text.push_str(&resolve_entity(&raw)?);
            }
            Event::CData(ref e) => {
                let text = core::str::from_utf8(e.as_ref()).map_err(XmlError::InvalidUtf8)?;
                self.text.push_str(text);
            }
            Event::Comment(_) | Event::PI(_) | Event::Decl(_) | Event::DocType(_) => {}
            Event::Eof => {
                if self.depth > 0 {
                    return Err(XmlError::UnexpectedEof);
                }
                flush_text(&mut self.text, &mut self.pending, self.depth);
                self.done = true;
            }
        }
        Ok(())
    }
}

impl<'de> DocumentParser<'de> for XmlParser<'de> {
    type Error = XmlError;

    fn next_event(&mut self) -> Result<Option<DocumentEvent<'de>>, Self::Error> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Ok(Some(event));
            }
            if self.done {
                return Ok(None);
            }
            self.pump()?;
        }
    }
}

/// Emits buffered text. Text between top-level elements is dropped.
fn flush_text(text: &mut String, pending: &mut VecDeque<DocumentEvent<'_>>, depth: usize) {
    if text.is_empty() {
        return;
    }
    let text = std::mem::take(text);
    if depth > 0 {
        pending.push_back(DocumentEvent::Text(Cow::Owned(text)));
    }
}

fn local_name(e: &BytesStart<'_>) -> Result<String, XmlError> {
    let local = e.local_name();
    let name = core::str::from_utf8(local.as_ref()).map_err(XmlError::InvalidUtf8)?;
    Ok(name.to_string())
}

fn attributes<'de>(e: &BytesStart<'_>) -> Result<Vec<(Cow<'de, str>, Cow<'de, str>)>, XmlError> {
    let mut out = Vec::new();
    for attr in e.attributes() {
        let attr = attr.map_err(|e| XmlError::Parse(e.to_string()))?;

        // Skip xmlns declarations
        let key = attr.key;
        if key.as_ref() == b"xmlns" {
            continue;
        }
        if let Some(prefix) = key.prefix()
            && prefix.as_ref() == b"xmlns"
        {
            continue;
        }

        let local = key.local_name();
        let name = core::str::from_utf8(local.as_ref()).map_err(XmlError::InvalidUtf8)?;
        let value = attr
            .unescape_value()
            .map_err(|e| XmlError::Parse(e.to_string()))?;
        out.push((Cow::Owned(name.to_string()), Cow::Owned(value.into_owned())));
    }
    Ok(out)
}

/// Resolve a general entity reference.
fn resolve_entity(raw: &str) -> Result<String, XmlError> {
    if let Some(resolved) = resolve_xml_entity(raw) {
        return Ok(resolved.into());
    }

    if let Some(rest) = raw.strip_prefix('#') {
        let code = if let Some(hex) = rest.strip_prefix('x').or_else(|| rest.strip_prefix('X')) {
            u32::from_str_radix(hex, 16)
                .map_err(|_| XmlError::Parse(format!("Invalid hex entity: #{rest}")))?
        } else {
            rest.parse::<u32>()
                .map_err(|_| XmlError::Parse(format!("Invalid decimal entity: #{rest}")))?
        };

        let ch = char::from_u32(code)
            .ok_or_else(|| XmlError::Parse(format!("Invalid Unicode: {code}")))?;
        return Ok(ch.to_string());
    }

    Err(XmlError::Parse(format!("Unknown entity: &{raw};")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn events(xml: &str) -> Vec<DocumentEvent<'static>> {
        let mut parser = XmlParser::new(xml.as_bytes());
        let mut out = Vec::new();
        while let Some(event) = parser.next_event().unwrap() {
            out.push(event.into_owned());
        }
        out
    }

    fn start(name: &str, attributes: &[(&str, &str)]) -> DocumentEvent<'static> {
        DocumentEvent::ElementStart {
            name: Cow::Owned(name.to_string()),
            attributes: attributes
                .iter()
                .map(|(k, v)| (Cow::Owned(k.to_string()), Cow::Owned(v.to_string())))
                .collect(),
        }
    }

    fn end(name: &str) -> DocumentEvent<'static> {
        DocumentEvent::ElementEnd {
            name: Cow::Owned(name.to_string()),
        }
    }

    fn text(t: &str) -> DocumentEvent<'static> {
        DocumentEvent::Text(Cow::Owned(t.to_string()))
    }

    #[test]
    fn empty_element_expands_to_start_and_end() {
        assert_eq!(
            events(r#"<?xml version="1.0"?><a x="1"/>"#),
            vec![start("a", &[("x", "1")]), end("a")]
        );
    }

    #[test]
    fn text_entities_and_cdata_merge() {
        assert_eq!(
            events("<a>x &amp; y<![CDATA[ <z> ]]>&#65;</a>"),
            vec![start("a", &[]), text("x & y <z> A"), end("a")]
        );
    }

    #[test]
    fn comments_split_nothing() {
        assert_eq!(
            events("<a>one<!-- note -->two</a>"),
            vec![start("a", &[]), text("onetwo"), end("a")]
        );
    }

    #[test]
    fn namespaces_are_stripped() {
        assert_eq!(
            events(r#"<p:a xmlns:p="urn:x" p:id="3"><p:b/></p:a>"#),
            vec![start("a", &[("id", "3")]), start("b", &[]), end("b"), end("a")]
        );
    }

    #[test]
    fn whitespace_inside_elements_is_kept() {
        assert_eq!(
            events("<a>\n  <b>v</b>\n</a>\n"),
            vec![
                start("a", &[]),
                text("\n  "),
                start("b", &[]),
                text("v"),
                end("b"),
                text("\n"),
                end("a"),
            ]
        );
    }

    #[test]
    fn truncated_input_fails() {
        let mut parser = XmlParser::new(b"<a><b>");
        let mut result = Ok(None);
        for _ in 0..8 {
            result = parser.next_event();
            if !matches!(result, Ok(Some(_))) {
                break;
            }
        }
        assert!(result.is_err());
    }

    #[test]
    fn mismatched_tags_fail() {
        let mut parser = XmlParser::new(b"<a></b>");
        let first = parser.next_event();
        assert!(matches!(first, Ok(Some(DocumentEvent::ElementStart { .. }))));
        assert!(parser.next_event().is_err());
    }
}
