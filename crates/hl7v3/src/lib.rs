//! # Helios HL7 v3 Transmission Wrapper
//!
//! This crate models the HL7 Version 3 transmission wrapper: the envelope
//! (message id, creation time, interaction, sender/receiver devices,
//! processing flags) that surrounds every HL7 v3 interaction, together with
//! the control act and payload it carries.
//!
//! ## Features
//!
//! - **Validated variants**: a parsed [`TransmissionWrapper`] is narrowed to a
//!   [`Request`] or one of four response variants; construction fails with a
//!   [`FormatError`] naming the broken rule.
//! - **Streaming XML**: envelopes are read and written with quick-xml events.
//!   Payload bodies are captured verbatim and deserialized lazily.
//! - **Pluggable bodies**: any serde type can be a payload body; serializers
//!   are cached per body type and root element name.
//! - **Formatter facade**: [`MessageFormatter`] applies the request/reply
//!   policy a messaging binding needs, including negative acknowledgements.
//!
//! ## Envelope Variants
//!
//! | Variant | Acknowledgement | Control act |
//! |---------|-----------------|-------------|
//! | [`Request`] | absent | message or query |
//! | [`AcknowledgementResponse`] | present | none |
//! | [`ApplicationResponse`] | present | message |
//! | [`QueryApplicationResponse`] | present | query with subject |
//! | [`QueryAcknowledgementResponse`] | present | query without subject |
//!
//! ## Example
//!
//! ```rust
//! use helios_hl7v3::{Message, MessageKind};
//!
//! let xml = r#"<MCCI_IN000002UV01 xmlns="urn:hl7-org:v3" ITSVersion="XML_1.0">
//!   <id root="2.16.840.1.113883.19.1" extension="reply-1"/>
//!   <creationTime value="20240101120000"/>
//!   <versionCode code="V3-2011N"/>
//!   <interactionId root="2.16.840.1.113883.1.6" extension="MCCI_IN000002UV01"/>
//!   <processingCode code="P"/>
//!   <processingModeCode code="T"/>
//!   <acceptAckCode code="NE"/>
//!   <receiver typeCode="RCV"><device classCode="DEV" determinerCode="INSTANCE"><id root="2.16.840.1.113883.19.2" extension="A"/></device></receiver>
//!   <sender typeCode="SND"><device classCode="DEV" determinerCode="INSTANCE"><id root="2.16.840.1.113883.19.2" extension="B"/></device></sender>
//!   <acknowledgement typeCode="CA"><targetMessage><id root="2.16.840.1.113883.19.1" extension="req-1"/></targetMessage></acknowledgement>
//! </MCCI_IN000002UV01>"#;
//!
//! let message = Message::from_xml_str(xml)?;
//! assert_eq!(message.kind(), MessageKind::AcknowledgementResponse);
//! # Ok::<(), helios_hl7v3::Hl7Error>(())
//! ```

pub mod acknowledgement;
pub mod codes;
pub mod control_act;
pub mod datatypes;
pub mod device;
mod error;
pub mod formatter;
pub mod message;
pub mod payload;
pub mod wrapper;
pub mod xml;

pub use error::{FormatError, Hl7Error, Result};

pub use acknowledgement::{Acknowledgement, AcknowledgementDetail, QueryAcknowledgement};
pub use codes::{
    AcceptAcknowledgementCode, AcknowledgementDetailType, AcknowledgementType, CodedValue,
    ProcessingCode, ProcessingModeCode, QueryResponseCode, QueryStatusCode,
};
pub use control_act::{ControlAct, ControlActCore, MessageControlAct, QueryControlAcknowledgement};
pub use datatypes::{
    ClassificatorId, Hl7Timestamp, Hl7Version, IdentificationId, InteractionId, LanguageCode,
    PriorityCode, TemplateId,
};
pub use device::{Device, DeviceRole};
pub use formatter::{
    FaultKind, FormatterConfig, MessageFormatter, OperationContext, ProtocolFault,
    RequestParameters, ResponseKind,
};
pub use message::{
    AcknowledgementResponse, ApplicationResponse, Message, MessageKind,
    QueryAcknowledgementResponse, QueryApplicationResponse, Request, RequestType,
};
pub use payload::{Payload, QueryByParameterPayload, QueryContinuation, Subject};
pub use wrapper::{AttentionLine, TransmissionWrapper};
pub use xml::XmlElement;
