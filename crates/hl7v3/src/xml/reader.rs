//! Pull reader over quick-xml events.
//!
//! [`XmlEventReader`] adds three things on top of `quick_xml::Reader`:
//!
//! - one event of lookahead, so callers can decide what to do with the next
//!   element before consuming it;
//! - a stack of in-scope namespace declarations, used to repair prefixes when a
//!   payload subtree is captured out of its document;
//! - element-level helpers (`open_element`, `close_element`, `read_text`,
//!   `capture_element`) that the envelope codec is written against.

use std::collections::BTreeSet;
use std::io::BufRead;

use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::events::{BytesStart, Event};
use tracing::debug;

use crate::error::{FormatError, Hl7Error, Result};
use crate::xml::element::{XmlElement, decode_name};
use crate::xml::utils::{self, HL7_NAMESPACE};

/// A decoded start tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementStart {
    name: String,
    attributes: Vec<(String, String)>,
    is_empty: bool,
}

impl ElementStart {
    /// Qualified element name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Local element name, without prefix.
    pub fn local_name(&self) -> &str {
        utils::local_name(&self.name)
    }

    /// Element prefix, if any.
    pub fn prefix(&self) -> Option<&str> {
        utils::split_qname(&self.name).0
    }

    /// `true` for a self-closing tag.
    pub fn is_empty(&self) -> bool {
        self.is_empty
    }

    /// Looks up an attribute by its exact (possibly prefixed) key.
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Looks up an attribute that the protocol requires.
    pub fn required_attribute(&self, key: &'static str) -> Result<&str> {
        self.attribute(key).ok_or_else(|| {
            FormatError::MissingAttribute {
                attribute: key,
                element: self.name.clone(),
            }
            .into()
        })
    }

    /// All attributes in document order, namespace declarations included.
    pub fn attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Streaming reader used by the envelope codec.
pub struct XmlEventReader<R: BufRead> {
    reader: Reader<R>,
    buf: Vec<u8>,
    peeked: Option<Event<'static>>,
    /// In-scope namespace declarations, one frame per open element.
    scopes: Vec<Vec<(String, String)>>,
}

impl<'a> XmlEventReader<&'a [u8]> {
    /// Creates a reader over an in-memory document.
    pub fn from_xml_str(xml: &'a str) -> Self {
        Self::new(xml.as_bytes())
    }
}

impl<R: BufRead> XmlEventReader<R> {
    /// Creates a reader over a buffered stream.
    pub fn new(inner: R) -> Self {
        let mut reader = Reader::from_reader(inner);
        // Whitespace is kept so captured payloads stay byte-faithful; the
        // structural helpers skip it themselves.
        reader.config_mut().trim_text(false);
        Self {
            reader,
            buf: Vec::new(),
            peeked: None,
            scopes: Vec::new(),
        }
    }

    fn read_raw(&mut self) -> Result<Event<'static>> {
        self.buf.clear();
        let event = self.reader.read_event_into(&mut self.buf)?;
        Ok(event.into_owned())
    }

    /// Peeks at the next event without consuming it.
    fn peek_event(&mut self) -> Result<&Event<'static>> {
        let event = match self.peeked.take() {
            Some(event) => event,
            None => self.read_raw()?,
        };
        Ok(self.peeked.insert(event))
    }

    /// Consumes the next event, tracking namespace scopes.
    fn next_event(&mut self) -> Result<Event<'static>> {
        let event = match self.peeked.take() {
            Some(event) => event,
            None => self.read_raw()?,
        };
        match &event {
            Event::Start(e) => {
                let frame = namespace_frame(e)?;
                self.scopes.push(frame);
            }
            Event::End(_) => {
                self.scopes.pop();
            }
            _ => {}
        }
        Ok(event)
    }

    /// Resolves a prefix against the declarations currently in scope.
    ///
    /// The empty prefix resolves the default namespace.
    pub fn lookup_namespace(&self, prefix: &str) -> Option<&str> {
        self.scopes
            .iter()
            .rev()
            .flat_map(|frame| frame.iter())
            .find(|(p, _)| p == prefix)
            .map(|(_, uri)| uri.as_str())
    }

    /// Skips whitespace, comments, processing instructions and prologue events.
    pub fn skip_insignificant(&mut self) -> Result<()> {
        loop {
            let skip = match self.peek_event()? {
                Event::Text(text) => utils::is_whitespace(text),
                Event::Comment(_) | Event::PI(_) | Event::Decl(_) | Event::DocType(_) => true,
                _ => false,
            };
            if !skip {
                return Ok(());
            }
            self.next_event()?;
        }
    }

    /// Returns the next start tag without consuming it.
    ///
    /// Returns `None` when the current element ends or the document is exhausted.
    pub fn peek_element(&mut self) -> Result<Option<ElementStart>> {
        self.skip_insignificant()?;
        match self.peek_event()? {
            Event::Start(e) => Ok(Some(decode_start(e, false)?)),
            Event::Empty(e) => Ok(Some(decode_start(e, true)?)),
            Event::End(_) | Event::Eof => Ok(None),
            Event::Text(_) | Event::CData(_) | Event::GeneralRef(_) => {
                Err(FormatError::malformed("unexpected character data between elements").into())
            }
            _ => Err(FormatError::malformed("unexpected markup between elements").into()),
        }
    }

    /// Consumes the next start tag.
    pub fn open_element(&mut self) -> Result<ElementStart> {
        let start = self
            .peek_element()?
            .ok_or_else(|| FormatError::malformed("expected an element"))?;
        self.next_event()?;
        Ok(start)
    }

    /// Consumes the next start tag, which must have the given local name.
    pub fn expect_element(&mut self, local_name: &str) -> Result<ElementStart> {
        let start = self.open_element()?;
        if start.local_name() != local_name {
            return Err(FormatError::UnexpectedElement {
                expected: local_name.to_string(),
                found: start.name().to_string(),
            }
            .into());
        }
        Ok(start)
    }

    /// Finishes an element opened with [`open_element`](Self::open_element).
    ///
    /// Child elements that the caller did not read are skipped.
    pub fn close_element(&mut self, start: &ElementStart) -> Result<()> {
        if start.is_empty() {
            return Ok(());
        }
        loop {
            self.skip_insignificant()?;
            match self.peek_event()? {
                Event::End(_) => {
                    self.next_event()?;
                    return Ok(());
                }
                Event::Start(_) | Event::Empty(_) => {
                    let child = self.open_element()?;
                    debug!(
                        element = child.name(),
                        parent = start.name(),
                        "Skipping unread element"
                    );
                    self.skip_element(&child)?;
                }
                Event::Eof => {
                    return Err(FormatError::malformed(format!(
                        "unexpected end of document inside <{}>",
                        start.name()
                    ))
                    .into());
                }
                _ => {
                    self.next_event()?;
                }
            }
        }
    }

    /// Skips the remainder of an element whose start tag was consumed.
    pub fn skip_element(&mut self, start: &ElementStart) -> Result<()> {
        if start.is_empty() {
            return Ok(());
        }
        let mut depth = 1usize;
        loop {
            match self.next_event()? {
                Event::Start(_) => depth += 1,
                Event::End(_) => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(());
                    }
                }
                Event::Eof => {
                    return Err(FormatError::malformed(format!(
                        "unexpected end of document inside <{}>",
                        start.name()
                    ))
                    .into());
                }
                _ => {}
            }
        }
    }

    /// Reads the text content of an element whose start tag was consumed,
    /// including its end tag.
    pub fn read_text(&mut self, start: &ElementStart) -> Result<String> {
        let mut text = String::new();
        if start.is_empty() {
            return Ok(text);
        }
        loop {
            match self.next_event()? {
                Event::Text(t) => {
                    let raw = decode_str(&t)?;
                    text.push_str(&quick_xml::escape::unescape(raw)?);
                }
                Event::CData(c) => text.push_str(decode_str(&c)?),
                Event::GeneralRef(r) => {
                    let reference = format!("&{};", decode_str(&r)?);
                    text.push_str(&quick_xml::escape::unescape(&reference)?);
                }
                Event::End(_) => return Ok(text),
                Event::Start(e) | Event::Empty(e) => {
                    return Err(FormatError::UnexpectedElement {
                        expected: format!("text content of {}", start.name()),
                        found: decode_name(e.name().as_ref())?,
                    }
                    .into());
                }
                Event::Eof => {
                    return Err(FormatError::malformed(format!(
                        "unexpected end of document inside <{}>",
                        start.name()
                    ))
                    .into());
                }
                _ => {}
            }
        }
    }

    /// Captures the next element and its whole subtree as standalone XML.
    ///
    /// Prefixes used inside the subtree but declared on an ancestor are
    /// re-declared on the captured root with the ancestor's binding. Prefixes
    /// with no binding at all are bound to the HL7 namespace.
    pub fn capture_element(&mut self) -> Result<XmlElement> {
        self.skip_insignificant()?;

        let (mut root, is_empty) = match self.peek_event()? {
            Event::Start(e) => (e.clone(), false),
            Event::Empty(e) => (e.clone(), true),
            _ => return Err(FormatError::malformed("expected an element to capture").into()),
        };
        let name = decode_name(root.name().as_ref())?;

        let mut used = BTreeSet::new();
        let mut declared = BTreeSet::new();
        collect_prefixes(&root, &mut used, &mut declared)?;

        let mut inner: Vec<Event<'static>> = Vec::new();
        if !is_empty {
            let mut depth = 0usize;
            loop {
                let event = self.next_event()?;
                match &event {
                    Event::Start(e) => {
                        if depth > 0 {
                            collect_prefixes(e, &mut used, &mut declared)?;
                        }
                        depth += 1;
                    }
                    Event::Empty(e) => collect_prefixes(e, &mut used, &mut declared)?,
                    Event::End(_) => depth -= 1,
                    Event::Eof => {
                        return Err(FormatError::malformed(format!(
                            "unexpected end of document inside <{}>",
                            name
                        ))
                        .into());
                    }
                    _ => {}
                }
                let done = depth == 0;
                inner.push(event);
                if done {
                    break;
                }
            }
            // The first captured event is the root start tag itself.
            inner.remove(0);
        } else {
            self.next_event()?;
        }

        // The root's frame has been popped again, so lookups see ancestors only.
        let missing: Vec<(String, String)> = used
            .difference(&declared)
            .filter(|prefix| !utils::is_reserved_prefix(prefix))
            .map(|prefix| {
                let uri = self.lookup_namespace(prefix).unwrap_or(HL7_NAMESPACE);
                (prefix.clone(), uri.to_string())
            })
            .collect();
        for (prefix, uri) in &missing {
            debug!(
                element = %name,
                prefix = %prefix,
                namespace = %uri,
                "Declaring namespace prefix on captured payload"
            );
            let key = format!("xmlns:{}", prefix);
            root.push_attribute((key.as_str(), uri.as_str()));
        }

        let mut writer = Writer::new(Vec::new());
        if is_empty {
            writer.write_event(Event::Empty(root))?;
        } else {
            writer.write_event(Event::Start(root))?;
            for event in inner {
                writer.write_event(event)?;
            }
        }
        let xml = String::from_utf8(writer.into_inner())?;
        Ok(XmlElement::from_parts(name, xml))
    }
}

fn decode_str(bytes: &[u8]) -> Result<&str> {
    std::str::from_utf8(bytes).map_err(|e| Hl7Error::Encoding {
        message: e.to_string(),
    })
}

fn decode_start(e: &BytesStart<'_>, is_empty: bool) -> Result<ElementStart> {
    let name = decode_name(e.name().as_ref())?;
    let mut attributes = Vec::new();
    for attr in e.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        let key = decode_name(attr.key.as_ref())?;
        let raw = decode_str(&attr.value)?;
        let value = quick_xml::escape::unescape(raw)?.into_owned();
        attributes.push((key, value));
    }
    Ok(ElementStart {
        name,
        attributes,
        is_empty,
    })
}

fn namespace_frame(e: &BytesStart<'_>) -> Result<Vec<(String, String)>> {
    let mut frame = Vec::new();
    for attr in e.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        let key = decode_name(attr.key.as_ref())?;
        if let Some(prefix) = utils::namespace_declaration(&key) {
            let uri = quick_xml::escape::unescape(decode_str(&attr.value)?)?.into_owned();
            frame.push((prefix.to_string(), uri));
        }
    }
    Ok(frame)
}

fn collect_prefixes(
    e: &BytesStart<'_>,
    used: &mut BTreeSet<String>,
    declared: &mut BTreeSet<String>,
) -> Result<()> {
    let name = decode_name(e.name().as_ref())?;
    if let (Some(prefix), _) = utils::split_qname(&name) {
        used.insert(prefix.to_string());
    }
    for attr in e.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        let key = decode_name(attr.key.as_ref())?;
        match utils::namespace_declaration(&key) {
            Some("") => {}
            Some(prefix) => {
                declared.insert(prefix.to_string());
            }
            None => {
                if let (Some(prefix), _) = utils::split_qname(&key) {
                    used.insert(prefix.to_string());
                }
            }
        }
    }
    Ok(())
}
