//! XML reading and writing for HL7 v3 envelopes.
//!
//! The envelope codec is written directly against quick-xml events rather than
//! through serde, because the transmission wrapper mixes a fixed, ordered
//! schema with opaque payload subtrees that must be carried verbatim.
//!
//! - [`XmlEventReader`] pulls events with one element of lookahead, tracks
//!   namespace declarations in scope and can capture a whole subtree as an
//!   [`XmlElement`].
//! - [`XmlEventWriter`] writes start/end/empty tags and replays captured
//!   subtrees into the output.
//!
//! ## Namespace Handling
//!
//! - The HL7 namespace (`urn:hl7-org:v3`) is the default namespace of the
//!   envelope root; elements are matched by local name so prefixed documents
//!   (`<hl7:id .../>`) read the same as unprefixed ones.
//! - A captured payload that uses a prefix declared on an ancestor gets an
//!   explicit `xmlns:<prefix>` declaration so it stays well formed on its own.

mod element;
mod order;
mod reader;
pub(crate) mod utils;
mod writer;

pub use element::XmlElement;
pub(crate) use order::ChildOrder;
pub use reader::{ElementStart, XmlEventReader};
pub use utils::{HL7_NAMESPACE, ITS_VERSION, XSI_NAMESPACE};
pub use writer::XmlEventWriter;
