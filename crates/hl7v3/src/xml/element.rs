//! Captured XML subtrees.

use std::fmt;
use std::str::FromStr;

use quick_xml::Reader;
use quick_xml::events::Event;

use crate::error::{FormatError, Hl7Error, Result};
use crate::xml::utils;

/// A self-contained XML element captured verbatim from a document.
///
/// The captured text is well formed on its own: when it is read out of an
/// envelope, every namespace prefix it uses is declared on its root (see
/// [`XmlEventReader::capture_element`](crate::xml::XmlEventReader::capture_element)).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlElement {
    name: String,
    xml: String,
}

impl XmlElement {
    /// Parses a standalone element, checking that it has exactly one root.
    pub fn parse(xml: impl Into<String>) -> Result<Self> {
        let xml = xml.into();
        let name = root_name(&xml)?;
        Ok(Self { name, xml })
    }

    /// Builds an element from text already known to be well formed.
    pub(crate) fn from_parts(name: String, xml: String) -> Self {
        Self { name, xml }
    }

    /// The qualified name of the root element, including any prefix.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The local name of the root element.
    pub fn local_name(&self) -> &str {
        utils::local_name(&self.name)
    }

    /// The namespace prefix of the root element, if any.
    pub fn prefix(&self) -> Option<&str> {
        utils::split_qname(&self.name).0
    }

    /// The element's XML text.
    pub fn as_str(&self) -> &str {
        &self.xml
    }

    /// Consumes the element and returns its XML text.
    pub fn into_string(self) -> String {
        self.xml
    }
}

impl fmt::Display for XmlElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.xml)
    }
}

impl FromStr for XmlElement {
    type Err = Hl7Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Finds the single root element name of a fragment.
fn root_name(xml: &str) -> Result<String> {
    let mut reader = Reader::from_str(xml);
    let mut name: Option<String> = None;
    let mut depth = 0usize;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                if depth == 0 {
                    if name.is_some() {
                        return Err(
                            FormatError::malformed("fragment has more than one root").into()
                        );
                    }
                    name = Some(decode_name(e.name().as_ref())?);
                }
                depth += 1;
            }
            Event::Empty(e) => {
                if depth == 0 {
                    if name.is_some() {
                        return Err(
                            FormatError::malformed("fragment has more than one root").into()
                        );
                    }
                    name = Some(decode_name(e.name().as_ref())?);
                }
            }
            Event::End(_) => depth = depth.saturating_sub(1),
            Event::Text(text) if depth == 0 => {
                if !utils::is_whitespace(&text) {
                    return Err(FormatError::malformed("text outside of the root element").into());
                }
            }
            Event::CData(_) | Event::GeneralRef(_) if depth == 0 => {
                return Err(FormatError::malformed("content outside of the root element").into());
            }
            Event::Eof => break,
            _ => {}
        }
    }

    name.ok_or_else(|| FormatError::malformed("fragment has no root element").into())
}

pub(crate) fn decode_name(bytes: &[u8]) -> Result<String> {
    std::str::from_utf8(bytes)
        .map(str::to_string)
        .map_err(|e| Hl7Error::Encoding {
            message: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_records_root_name() {
        let element =
            XmlElement::parse("<hl7:patient xmlns:hl7=\"urn:hl7-org:v3\"><id/></hl7:patient>")
                .unwrap();
        assert_eq!(element.name(), "hl7:patient");
        assert_eq!(element.local_name(), "patient");
        assert_eq!(element.prefix(), Some("hl7"));
    }

    #[test]
    fn test_parse_accepts_declaration_and_whitespace() {
        let element = XmlElement::parse("<?xml version=\"1.0\"?>\n<value>42</value>\n").unwrap();
        assert_eq!(element.name(), "value");
        assert_eq!(element.prefix(), None);
    }

    #[test]
    fn test_parse_rejects_two_roots() {
        let err = XmlElement::parse("<a/><b/>").unwrap_err();
        assert!(err.is_format());
    }

    #[test]
    fn test_parse_rejects_bare_text() {
        assert!(XmlElement::parse("just text").is_err());
        assert!(XmlElement::parse("").is_err());
    }

    #[test]
    fn test_display_is_verbatim() {
        let xml = "<note lang=\"lv\">Sveiki &amp; labdien</note>";
        let element: XmlElement = xml.parse().unwrap();
        assert_eq!(element.to_string(), xml);
    }
}
