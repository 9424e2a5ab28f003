//! Payload containers: the opaque bodies embedded in a control act.
//!
//! A [`Payload`] holds either an in-memory body together with the serializer
//! that writes it (outbound), or an XML subtree captured from a document
//! (inbound). The three container kinds differ only in how they sit in the
//! control act:
//!
//! | Alias | Element | Layout |
//! |-------|---------|--------|
//! | [`Subject`] | `subject` | `<subject typeCode="SUBJ">` wrapping the body |
//! | [`QueryByParameterPayload`] | `queryByParameter` | the body is the element |
//! | [`QueryContinuation`] | `queryContinuation` | the body is the element |
//!
//! Typed extraction is lazy: [`Payload::body`] deserializes on demand, using
//! the captured root element name to pick the serializer.

mod cache;
mod serializer;

use std::borrow::Cow;
use std::fmt;
use std::io::{BufRead, Write};
use std::marker::PhantomData;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{FormatError, Result};
use crate::xml::{XmlElement, XmlEventReader, XmlEventWriter};

pub use cache::{SerializerCache, SerializerKey};
pub use serializer::{BodySerializer, RawXmlSerializer, RootName, SerializerKind, XmlBodySerializer};

/// Static description of where a payload sits in the control act.
pub trait PayloadKind: Send + Sync + 'static {
    /// Protocol name used in error messages.
    const NAME: &'static str;
    /// Element name in the control act.
    const ELEMENT: &'static str;
    /// `typeCode` of the wrapper element, or `None` when the body itself is
    /// the element.
    const WRAPPER_TYPE_CODE: Option<&'static str>;

    /// Root name used when a body is supplied without an explicit serializer.
    fn default_root<T: ?Sized>() -> RootName {
        match Self::WRAPPER_TYPE_CODE {
            Some(_) => RootName::for_type::<T>(),
            None => RootName::new(Self::ELEMENT),
        }
    }
}

/// Marker for [`Subject`].
#[derive(Debug, Clone, Copy)]
pub struct SubjectKind;

impl PayloadKind for SubjectKind {
    const NAME: &'static str = "Subject";
    const ELEMENT: &'static str = "subject";
    const WRAPPER_TYPE_CODE: Option<&'static str> = Some("SUBJ");
}

/// Marker for [`QueryByParameterPayload`].
#[derive(Debug, Clone, Copy)]
pub struct QueryByParameterKind;

impl PayloadKind for QueryByParameterKind {
    const NAME: &'static str = "QueryByParameterPayload";
    const ELEMENT: &'static str = "queryByParameter";
    const WRAPPER_TYPE_CODE: Option<&'static str> = None;
}

/// Marker for [`QueryContinuation`].
#[derive(Debug, Clone, Copy)]
pub struct QueryContinuationKind;

impl PayloadKind for QueryContinuationKind {
    const NAME: &'static str = "QueryContinuation";
    const ELEMENT: &'static str = "queryContinuation";
    const WRAPPER_TYPE_CODE: Option<&'static str> = None;
}

/// The business content of a message.
pub type Subject = Payload<SubjectKind>;

/// Query parameters of a query request.
pub type QueryByParameterPayload = Payload<QueryByParameterKind>;

/// Paging continuation of an earlier query.
pub type QueryContinuation = Payload<QueryContinuationKind>;

/// An in-memory body with its serializer, type-erased.
trait HeldBody: Send + Sync {
    fn to_xml(&self) -> Result<String>;
    fn root_name(&self) -> &RootName;
    fn type_name(&self) -> &'static str;
}

struct Held<T> {
    body: T,
    serializer: Arc<dyn BodySerializer<T>>,
}

impl<T: Send + Sync + 'static> HeldBody for Held<T> {
    fn to_xml(&self) -> Result<String> {
        self.serializer.serialize(&self.body)
    }

    fn root_name(&self) -> &RootName {
        self.serializer.root_name()
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

#[derive(Clone)]
enum PayloadContent {
    Body(Arc<dyn HeldBody>),
    Element {
        element: XmlElement,
        namespace: Option<String>,
    },
}

/// An embedded body of kind `K`.
pub struct Payload<K: PayloadKind> {
    content: PayloadContent,
    _kind: PhantomData<K>,
}

impl<K: PayloadKind> Payload<K> {
    fn from_content(content: PayloadContent) -> Self {
        Self {
            content,
            _kind: PhantomData,
        }
    }

    /// Wraps a body, using the cached serde serializer for its type.
    pub fn new<T>(body: T) -> Self
    where
        T: Serialize + DeserializeOwned + Send + Sync + 'static,
    {
        let serializer = SerializerCache::global().xml::<T>(&K::default_root::<T>());
        Self::with_serializer(body, serializer)
    }

    /// Wraps a body with an explicit serializer.
    pub fn with_serializer<T>(body: T, serializer: Arc<dyn BodySerializer<T>>) -> Self
    where
        T: Send + Sync + 'static,
    {
        Self::from_content(PayloadContent::Body(Arc::new(Held { body, serializer })))
    }

    /// Wraps raw XML that is written verbatim.
    pub fn from_element(element: XmlElement) -> Self {
        Self::from_content(PayloadContent::Element {
            element,
            namespace: None,
        })
    }

    /// Reads a payload from a document.
    ///
    /// The reader may be positioned on the wrapper element (for wrapped
    /// kinds) or directly on the body. The body subtree is captured verbatim.
    pub fn read<R: BufRead>(reader: &mut XmlEventReader<R>) -> Result<Self> {
        let start = reader.peek_element()?.ok_or(FormatError::MissingElement {
            element: K::ELEMENT,
            parent: "controlActProcess".to_string(),
        })?;

        let wrapper = match K::WRAPPER_TYPE_CODE {
            Some(_) if start.local_name() == K::ELEMENT => {
                let wrapper = reader.open_element()?;
                if reader.peek_element()?.is_none() {
                    return Err(FormatError::MissingElement {
                        element: "payload body",
                        parent: wrapper.name().to_string(),
                    }
                    .into());
                }
                Some(wrapper)
            }
            _ => None,
        };

        let body = reader
            .peek_element()?
            .ok_or_else(|| FormatError::malformed("expected a payload body"))?;
        let namespace = match body.prefix() {
            Some(prefix) => body
                .attribute(&format!("xmlns:{}", prefix))
                .or_else(|| reader.lookup_namespace(prefix)),
            None => body.attribute("xmlns").or_else(|| reader.lookup_namespace("")),
        }
        .map(str::to_string);

        let element = reader.capture_element()?;
        debug!(payload = K::NAME, element = element.name(), "Captured payload body");

        if let Some(wrapper) = wrapper {
            reader.close_element(&wrapper)?;
        }
        Ok(Self::from_content(PayloadContent::Element { element, namespace }))
    }

    /// Root element name and namespace of the body.
    ///
    /// For a captured body this is the element that was read and serves as
    /// the root name hint for typed extraction.
    pub fn root_name(&self) -> RootName {
        match &self.content {
            PayloadContent::Body(held) => held.root_name().clone(),
            PayloadContent::Element { element, namespace } => match namespace {
                Some(ns) => RootName::with_namespace(element.local_name(), ns.clone()),
                None => RootName::new(element.local_name()),
            },
        }
    }

    /// Local name of the body's root element.
    pub fn element_name(&self) -> String {
        self.root_name().local_name().to_string()
    }

    /// The captured XML, when the payload was read from a document.
    pub fn captured(&self) -> Option<&XmlElement> {
        match &self.content {
            PayloadContent::Element { element, .. } => Some(element),
            PayloadContent::Body(_) => None,
        }
    }

    fn xml(&self) -> Result<Cow<'_, str>> {
        match &self.content {
            PayloadContent::Body(held) => Ok(Cow::Owned(held.to_xml()?)),
            PayloadContent::Element { element, .. } => Ok(Cow::Borrowed(element.as_str())),
        }
    }

    /// Extracts the body as `T` with the cached serde serializer.
    ///
    /// An in-memory body is serialized and parsed back, so `T` need not be
    /// the type it was created with.
    pub fn body<T>(&self) -> Result<T>
    where
        T: Serialize + DeserializeOwned + Send + Sync + 'static,
    {
        let serializer = SerializerCache::global().xml::<T>(&self.root_name());
        self.body_with(serializer.as_ref())
    }

    /// Extracts the body with an explicit serializer.
    pub fn body_with<T>(&self, serializer: &dyn BodySerializer<T>) -> Result<T> {
        serializer.deserialize(&self.xml()?)
    }

    /// The body as a standalone XML element.
    pub fn to_element(&self) -> Result<XmlElement> {
        match &self.content {
            PayloadContent::Element { element, .. } => Ok(element.clone()),
            PayloadContent::Body(_) => {
                let serializer = SerializerCache::global().raw(&self.root_name());
                self.body_with(serializer.as_ref())
            }
        }
    }

    /// Writes the payload at its place in the control act.
    pub fn write<W: Write>(&self, writer: &mut XmlEventWriter<W>) -> Result<()> {
        if let Some(type_code) = K::WRAPPER_TYPE_CODE {
            writer.start(K::ELEMENT, &[("typeCode", type_code)])?;
        }
        match &self.content {
            PayloadContent::Body(held) => writer.fragment(&held.to_xml()?)?,
            PayloadContent::Element { element, .. } => writer.element(element)?,
        }
        if K::WRAPPER_TYPE_CODE.is_some() {
            writer.end(K::ELEMENT)?;
        }
        Ok(())
    }
}

impl<K: PayloadKind> Clone for Payload<K> {
    fn clone(&self) -> Self {
        Self::from_content(self.content.clone())
    }
}

impl<K: PayloadKind> fmt::Debug for Payload<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct(K::NAME);
        match &self.content {
            PayloadContent::Body(held) => debug
                .field("type", &held.type_name())
                .field("root", held.root_name()),
            PayloadContent::Element { element, .. } => debug.field("element", &element.name()),
        };
        debug.finish()
    }
}
