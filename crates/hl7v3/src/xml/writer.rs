//! Event writer used by the envelope codec.

use std::io::Write;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::error::{FormatError, Result};
use crate::xml::element::XmlElement;

/// Thin wrapper over `quick_xml::Writer` with element-level helpers.
pub struct XmlEventWriter<W: Write> {
    writer: Writer<W>,
}

impl<W: Write> XmlEventWriter<W> {
    /// Creates a compact writer.
    pub fn new(inner: W) -> Self {
        Self {
            writer: Writer::new(inner),
        }
    }

    /// Creates a writer that indents nested elements by two spaces.
    pub fn with_indent(inner: W) -> Self {
        Self {
            writer: Writer::new_with_indent(inner, b' ', 2),
        }
    }

    /// Writes the `<?xml version="1.0" encoding="UTF-8"?>` declaration.
    pub fn declaration(&mut self) -> Result<()> {
        self.writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        Ok(())
    }

    /// Writes a start tag.
    pub fn start(&mut self, name: &str, attributes: &[(&str, &str)]) -> Result<()> {
        let mut element = BytesStart::new(name);
        for attribute in attributes {
            element.push_attribute(*attribute);
        }
        self.writer.write_event(Event::Start(element))?;
        Ok(())
    }

    /// Writes a self-closing tag.
    pub fn empty(&mut self, name: &str, attributes: &[(&str, &str)]) -> Result<()> {
        let mut element = BytesStart::new(name);
        for attribute in attributes {
            element.push_attribute(*attribute);
        }
        self.writer.write_event(Event::Empty(element))?;
        Ok(())
    }

    /// Writes an end tag.
    pub fn end(&mut self, name: &str) -> Result<()> {
        self.writer.write_event(Event::End(BytesEnd::new(name)))?;
        Ok(())
    }

    /// Writes `<name>text</name>`, escaping the text.
    pub fn text_element(&mut self, name: &str, text: &str) -> Result<()> {
        self.start(name, &[])?;
        self.writer.write_event(Event::Text(BytesText::new(text)))?;
        self.end(name)
    }

    /// Writes a captured element verbatim.
    pub fn element(&mut self, element: &XmlElement) -> Result<()> {
        self.fragment(element.as_str())
    }

    /// Copies a well-formed XML fragment into the output, dropping any
    /// declaration it carries.
    ///
    /// The fragment is checked and re-emitted without indentation, then
    /// written as raw bytes so its text content is carried unchanged.
    pub fn fragment(&mut self, xml: &str) -> Result<()> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(false);
        let mut verbatim = Writer::new(Vec::with_capacity(xml.len()));

        loop {
            match reader.read_event() {
                Ok(Event::Eof) => break,
                Ok(Event::Decl(_)) => {}
                Ok(event) => {
                    verbatim.write_event(event)?;
                }
                Err(e) => {
                    return Err(FormatError::malformed(format!(
                        "failed to replay embedded XML: {}",
                        e
                    ))
                    .into());
                }
            }
        }
        self.writer.get_mut().write_all(&verbatim.into_inner())?;
        Ok(())
    }

    /// Returns the underlying sink.
    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn written(f: impl FnOnce(&mut XmlEventWriter<Vec<u8>>) -> Result<()>) -> String {
        let mut writer = XmlEventWriter::new(Vec::new());
        f(&mut writer).unwrap();
        String::from_utf8(writer.into_inner()).unwrap()
    }

    #[test]
    fn test_start_empty_end() {
        let xml = written(|w| {
            w.start("controlActProcess", &[("classCode", "CACT")])?;
            w.empty("code", &[("code", "A"), ("codeSystem", "1.2.3")])?;
            w.end("controlActProcess")
        });
        assert_eq!(
            xml,
            "<controlActProcess classCode=\"CACT\"><code code=\"A\" codeSystem=\"1.2.3\"/></controlActProcess>"
        );
    }

    #[test]
    fn test_text_element_escapes() {
        let xml = written(|w| w.text_element("text", "a < b & c"));
        assert_eq!(xml, "<text>a &lt; b &amp; c</text>");
    }

    #[test]
    fn test_attribute_values_are_escaped() {
        let xml = written(|w| w.empty("value", &[("value", "\"quoted\"")]));
        assert_eq!(xml, "<value value=\"&quot;quoted&quot;\"/>");
    }

    #[test]
    fn test_fragment_drops_declaration() {
        let xml = written(|w| w.fragment("<?xml version=\"1.0\"?><i32>42</i32>"));
        assert_eq!(xml, "<i32>42</i32>");
    }

    #[test]
    fn test_indented_fragment_keeps_text_verbatim() {
        let mut writer = XmlEventWriter::with_indent(Vec::new());
        writer.start("subject", &[("typeCode", "SUBJ")]).unwrap();
        writer.fragment("<note><t>x &lt;y&gt;</t><u>a &amp;</u></note>").unwrap();
        writer.end("subject").unwrap();
        let xml = String::from_utf8(writer.into_inner()).unwrap();
        assert!(xml.contains("<note><t>x &lt;y&gt;</t><u>a &amp;</u></note>"));
        assert!(xml.ends_with("</subject>"));
    }

    #[test]
    fn test_fragment_rejects_malformed_input() {
        let mut writer = XmlEventWriter::new(Vec::new());
        assert!(writer.fragment("<a><b></a>").is_err());
    }
}
