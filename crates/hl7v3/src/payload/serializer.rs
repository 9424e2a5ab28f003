//! Body serializers used by the payload containers.

use std::fmt;
use std::marker::PhantomData;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{FormatError, Result};
use crate::xml::XmlElement;

/// Which serializer family produced a body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SerializerKind {
    /// serde over quick-xml.
    Xml,
    /// Raw XML carried as an [`XmlElement`].
    Raw,
}

/// Name and namespace of a body's root element.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RootName {
    local_name: String,
    namespace: Option<String>,
}

impl RootName {
    /// A root name without namespace.
    pub fn new(local_name: impl Into<String>) -> Self {
        Self {
            local_name: local_name.into(),
            namespace: None,
        }
    }

    /// A root name bound to a namespace.
    pub fn with_namespace(local_name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            local_name: local_name.into(),
            namespace: Some(namespace.into()),
        }
    }

    /// The default root name for a Rust type: its unqualified name without
    /// generic arguments (`i32`, `Patient`, `Vec`).
    pub fn for_type<T: ?Sized>() -> Self {
        let full = std::any::type_name::<T>();
        let base = full.split('<').next().unwrap_or(full);
        let short = base.rsplit("::").next().unwrap_or(base);
        Self::new(short)
    }

    pub fn local_name(&self) -> &str {
        &self.local_name
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Checks that an XML document's root carries this local name.
    fn check(&self, element: &XmlElement) -> Result<()> {
        if element.local_name() != self.local_name {
            return Err(FormatError::UnexpectedElement {
                expected: self.local_name.clone(),
                found: element.name().to_string(),
            }
            .into());
        }
        Ok(())
    }
}

impl fmt::Display for RootName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{{{}}}{}", ns, self.local_name),
            None => f.write_str(&self.local_name),
        }
    }
}

/// Turns a body of type `T` into a standalone XML element and back.
pub trait BodySerializer<T>: Send + Sync {
    /// The serializer family, part of the cache key.
    fn kind(&self) -> SerializerKind;

    /// Root element this serializer writes and expects.
    fn root_name(&self) -> &RootName;

    /// Serializes `body` as a single root element.
    fn serialize(&self, body: &T) -> Result<String>;

    /// Deserializes a single root element.
    fn deserialize(&self, xml: &str) -> Result<T>;
}

/// serde-based serializer over quick-xml.
///
/// The root element is named by the serializer rather than by the type, so
/// the same type can be carried under different element names.
pub struct XmlBodySerializer<T> {
    root: RootName,
    _marker: PhantomData<fn() -> T>,
}

impl<T> XmlBodySerializer<T> {
    pub fn new(root: RootName) -> Self {
        Self {
            root,
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for XmlBodySerializer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("XmlBodySerializer")
            .field("type", &std::any::type_name::<T>())
            .field("root", &self.root)
            .finish()
    }
}

impl<T> BodySerializer<T> for XmlBodySerializer<T>
where
    T: Serialize + DeserializeOwned,
{
    fn kind(&self) -> SerializerKind {
        SerializerKind::Xml
    }

    fn root_name(&self) -> &RootName {
        &self.root
    }

    fn serialize(&self, body: &T) -> Result<String> {
        let xml = quick_xml::se::to_string_with_root(&self.root.local_name, body)?;
        match &self.root.namespace {
            Some(namespace) => Ok(declare_default_namespace(xml, &self.root.local_name, namespace)),
            None => Ok(xml),
        }
    }

    fn deserialize(&self, xml: &str) -> Result<T> {
        let element = XmlElement::parse(xml)?;
        self.root.check(&element)?;
        Ok(quick_xml::de::from_str(xml)?)
    }
}

/// Carries raw XML elements unchanged.
#[derive(Debug, Clone)]
pub struct RawXmlSerializer {
    root: RootName,
}

impl RawXmlSerializer {
    pub fn new(root: RootName) -> Self {
        Self { root }
    }
}

impl BodySerializer<XmlElement> for RawXmlSerializer {
    fn kind(&self) -> SerializerKind {
        SerializerKind::Raw
    }

    fn root_name(&self) -> &RootName {
        &self.root
    }

    fn serialize(&self, body: &XmlElement) -> Result<String> {
        self.root.check(body)?;
        Ok(body.as_str().to_string())
    }

    fn deserialize(&self, xml: &str) -> Result<XmlElement> {
        let element = XmlElement::parse(xml)?;
        self.root.check(&element)?;
        Ok(element)
    }
}

/// Adds `xmlns="..."` to the root start tag that quick-xml wrote.
fn declare_default_namespace(xml: String, root: &str, namespace: &str) -> String {
    let open = format!("<{}", root);
    if !xml.starts_with(&open) {
        return xml;
    }
    let declaration = format!(" xmlns=\"{}\"", quick_xml::escape::escape(namespace));
    let mut out = String::with_capacity(xml.len() + declaration.len());
    out.push_str(&open);
    out.push_str(&declaration);
    out.push_str(&xml[open.len()..]);
    out
}
