//! The transmission wrapper: the outer envelope shared by every message kind.
//!
//! [`TransmissionWrapper`] is the generic, unvalidated envelope. It is what
//! the reader produces; the typed variants in [`crate::message`] are built by
//! narrowing a wrapper once its shape is known.
//!
//! # Wire Layout
//!
//! ```xml
//! <RCMR_IN000002UV01 xmlns="urn:hl7-org:v3" ITSVersion="XML_1.0">
//!   <templateId root="urn:hl7-org:v3:RCMR_IN000002UV01:V3-2011N"/>
//!   <id root="..." extension="..."/>
//!   <creationTime value="20110315093000"/>
//!   <versionCode code="V3-2011N"/>
//!   <interactionId root="2.16.840.1.113883.1.6" extension="RCMR_IN000002UV01"/>
//!   <processingCode code="P"/>
//!   <processingModeCode code="T"/>
//!   <acceptAckCode code="AL"/>
//!   <receiver typeCode="RCV">...</receiver>
//!   <sender typeCode="SND">...</sender>
//!   <controlActProcess classCode="CACT" moodCode="EVN">...</controlActProcess>
//! </RCMR_IN000002UV01>
//! ```

use std::io::{BufRead, Write};

use tracing::debug;

use crate::acknowledgement::Acknowledgement;
use crate::codes::{
    AcceptAcknowledgementCode, CodedValue, ProcessingCode, ProcessingModeCode, read_code,
};
use crate::control_act::ControlAct;
use crate::datatypes::{Hl7Timestamp, Hl7Version, IdentificationId, InteractionId, TemplateId};
use crate::device::Device;
use crate::error::{FormatError, Hl7Error, Result};
use crate::xml::{
    ChildOrder, ElementStart, HL7_NAMESPACE, ITS_VERSION, XSI_NAMESPACE, XmlEventReader,
    XmlEventWriter,
};

const CHILD_SEQUENCE: &[&str] = &[
    "templateId",
    "id",
    "creationTime",
    "versionCode",
    "interactionId",
    "processingCode",
    "processingModeCode",
    "acceptAckCode",
    "sequenceNumber",
    "receiver",
    "sender",
    "attentionLine",
    "acknowledgement",
    "controlActProcess",
];

/// A keyword/value routing hint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttentionLine {
    key_word_text: String,
    value: String,
}

impl AttentionLine {
    pub fn new(key_word_text: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key_word_text: key_word_text.into(),
            value: value.into(),
        }
    }

    pub fn key_word_text(&self) -> &str {
        &self.key_word_text
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    fn write<W: Write>(&self, writer: &mut XmlEventWriter<W>) -> Result<()> {
        writer.start("attentionLine", &[])?;
        writer.text_element("keyWordText", &self.key_word_text)?;
        writer.text_element("value", &self.value)?;
        writer.end("attentionLine")
    }

    fn read<R: BufRead>(reader: &mut XmlEventReader<R>, start: &ElementStart) -> Result<Self> {
        let mut key_word_text = None;
        let mut value = None;
        if !start.is_empty() {
            while reader.peek_element()?.is_some() {
                let child = reader.open_element()?;
                match child.local_name() {
                    "keyWordText" => key_word_text = Some(reader.read_text(&child)?),
                    "value" => value = Some(reader.read_text(&child)?),
                    _ => reader.skip_element(&child)?,
                }
            }
        }
        reader.close_element(start)?;
        Ok(Self {
            key_word_text: key_word_text.ok_or_else(|| FormatError::MissingElement {
                element: "keyWordText",
                parent: start.name().to_string(),
            })?,
            value: value.unwrap_or_default(),
        })
    }
}

/// The generic HL7 v3 envelope.
#[derive(Debug, Clone)]
pub struct TransmissionWrapper {
    template_id: TemplateId,
    id: IdentificationId,
    creation_time: Hl7Timestamp,
    version: Hl7Version,
    interaction_id: InteractionId,
    processing_code: ProcessingCode,
    processing_mode_code: ProcessingModeCode,
    accept_ack_code: AcceptAcknowledgementCode,
    sequence_number: Option<i64>,
    receiver: Device,
    sender: Device,
    attention_lines: Vec<AttentionLine>,
    acknowledgement: Option<Acknowledgement>,
    control_act: Option<ControlAct>,
}

impl TransmissionWrapper {
    /// Creates an outbound envelope stamped with the current time.
    ///
    /// The template id is derived from the interaction and version; the
    /// processing codes take their defaults (`P`, `T`, `AL`).
    pub fn new(
        interaction: impl Into<String>,
        version: Hl7Version,
        id: IdentificationId,
        sender: Device,
        receiver: Device,
    ) -> Self {
        let interaction_id = InteractionId::new(interaction);
        Self {
            template_id: TemplateId::for_interaction(interaction_id.as_str(), version),
            id,
            creation_time: Hl7Timestamp::now(),
            version,
            interaction_id,
            processing_code: ProcessingCode::default(),
            processing_mode_code: ProcessingModeCode::default(),
            accept_ack_code: AcceptAcknowledgementCode::default(),
            sequence_number: None,
            receiver,
            sender,
            attention_lines: Vec::new(),
            acknowledgement: None,
            control_act: None,
        }
    }

    pub fn with_creation_time(mut self, creation_time: Hl7Timestamp) -> Self {
        self.creation_time = creation_time;
        self
    }

    pub fn with_processing_code(mut self, processing_code: ProcessingCode) -> Self {
        self.processing_code = processing_code;
        self
    }

    pub fn with_processing_mode_code(mut self, processing_mode_code: ProcessingModeCode) -> Self {
        self.processing_mode_code = processing_mode_code;
        self
    }

    pub fn with_accept_ack_code(mut self, accept_ack_code: AcceptAcknowledgementCode) -> Self {
        self.accept_ack_code = accept_ack_code;
        self
    }

    pub fn with_sequence_number(mut self, sequence_number: i64) -> Self {
        self.sequence_number = Some(sequence_number);
        self
    }

    pub fn with_attention_line(mut self, line: AttentionLine) -> Self {
        self.attention_lines.push(line);
        self
    }

    pub fn with_attention_lines(mut self, lines: impl IntoIterator<Item = AttentionLine>) -> Self {
        self.attention_lines.extend(lines);
        self
    }

    pub fn with_acknowledgement(mut self, acknowledgement: Acknowledgement) -> Self {
        self.acknowledgement = Some(acknowledgement);
        self
    }

    pub fn with_control_act(mut self, control_act: impl Into<ControlAct>) -> Self {
        self.control_act = Some(control_act.into());
        self
    }

    pub fn template_id(&self) -> &TemplateId {
        &self.template_id
    }

    /// The message identifier.
    pub fn id(&self) -> &IdentificationId {
        &self.id
    }

    pub fn creation_time(&self) -> &Hl7Timestamp {
        &self.creation_time
    }

    pub fn version(&self) -> Hl7Version {
        self.version
    }

    /// The `versionCode` written on the wire.
    pub fn version_code(&self) -> &'static str {
        self.version.version_code()
    }

    pub fn interaction_id(&self) -> &InteractionId {
        &self.interaction_id
    }

    pub fn processing_code(&self) -> ProcessingCode {
        self.processing_code
    }

    pub fn processing_mode_code(&self) -> ProcessingModeCode {
        self.processing_mode_code
    }

    pub fn accept_ack_code(&self) -> AcceptAcknowledgementCode {
        self.accept_ack_code
    }

    pub fn sequence_number(&self) -> Option<i64> {
        self.sequence_number
    }

    pub fn receiver(&self) -> &Device {
        &self.receiver
    }

    pub fn sender(&self) -> &Device {
        &self.sender
    }

    pub fn attention_lines(&self) -> &[AttentionLine] {
        &self.attention_lines
    }

    pub fn acknowledgement(&self) -> Option<&Acknowledgement> {
        self.acknowledgement.as_ref()
    }

    pub fn control_act(&self) -> Option<&ControlAct> {
        self.control_act.as_ref()
    }

    /// Detaches the control act, e.g. to move it into another envelope.
    pub fn take_control_act(&mut self) -> Option<ControlAct> {
        self.control_act.take()
    }

    /// Writes the envelope element (no XML declaration).
    pub fn write<W: Write>(&self, writer: &mut XmlEventWriter<W>) -> Result<()> {
        let root = self.interaction_id.as_str();
        writer.start(
            root,
            &[
                ("xmlns", HL7_NAMESPACE),
                ("xmlns:xsi", XSI_NAMESPACE),
                ("ITSVersion", ITS_VERSION),
            ],
        )?;
        writer.empty("templateId", &[("root", self.template_id.as_str())])?;
        self.id.write(writer, "id")?;
        self.creation_time.write(writer, "creationTime")?;
        writer.empty("versionCode", &[("code", self.version.version_code())])?;
        self.interaction_id.write(writer)?;
        writer.empty("processingCode", &[("code", self.processing_code.code())])?;
        writer.empty(
            "processingModeCode",
            &[("code", self.processing_mode_code.code())],
        )?;
        writer.empty("acceptAckCode", &[("code", self.accept_ack_code.code())])?;
        if let Some(sequence_number) = self.sequence_number {
            writer.empty("sequenceNumber", &[("value", sequence_number.to_string().as_str())])?;
        }
        self.receiver.write(writer)?;
        self.sender.write(writer)?;
        for line in &self.attention_lines {
            line.write(writer)?;
        }
        if let Some(acknowledgement) = &self.acknowledgement {
            acknowledgement.write(writer)?;
        }
        if let Some(control_act) = &self.control_act {
            control_act.write(writer)?;
        }
        writer.end(root)
    }

    /// Writes a complete document, with XML declaration, to `out`.
    pub fn write_document<W: Write>(&self, out: W, indent: bool) -> Result<W> {
        let mut writer = if indent {
            XmlEventWriter::with_indent(out)
        } else {
            XmlEventWriter::new(out)
        };
        writer.declaration()?;
        self.write(&mut writer)?;
        Ok(writer.into_inner())
    }

    /// Serializes the envelope as a complete document.
    pub fn to_xml_string(&self, indent: bool) -> Result<String> {
        let bytes = self.write_document(Vec::new(), indent)?;
        Ok(String::from_utf8(bytes)?)
    }

    /// Parses an envelope from a string.
    pub fn from_xml_str(xml: &str) -> Result<Self> {
        Self::read(&mut XmlEventReader::from_xml_str(xml))
    }

    /// Parses an envelope from a buffered stream.
    pub fn from_reader<R: BufRead>(input: R) -> Result<Self> {
        Self::read(&mut XmlEventReader::new(input))
    }

    /// Reads an envelope, with the reader positioned at or before its root.
    ///
    /// Children must appear in schema order; unknown children are skipped.
    pub fn read<R: BufRead>(reader: &mut XmlEventReader<R>) -> Result<Self> {
        let root = reader.open_element()?;
        let mut order = ChildOrder::new(root.name(), CHILD_SEQUENCE, &["attentionLine"]);

        let mut template_id = None;
        let mut id = None;
        let mut creation_time = None;
        let mut version = None;
        let mut interaction_id = None;
        let mut processing_code = None;
        let mut processing_mode_code = None;
        let mut accept_ack_code = None;
        let mut sequence_number = None;
        let mut receiver = None;
        let mut sender = None;
        let mut attention_lines = Vec::new();
        let mut acknowledgement = None;
        let mut control_act = None;

        if !root.is_empty() {
            while reader.peek_element()?.is_some() {
                let child = reader.open_element()?;
                if !order.advance(child.local_name())? {
                    debug!(element = child.name(), "Skipping unknown envelope element");
                    reader.skip_element(&child)?;
                    continue;
                }
                match child.local_name() {
                    "receiver" => receiver = Some(Device::read(reader, &child)?),
                    "sender" => sender = Some(Device::read(reader, &child)?),
                    "attentionLine" => attention_lines.push(AttentionLine::read(reader, &child)?),
                    "acknowledgement" => {
                        acknowledgement = Some(Acknowledgement::read(reader, &child)?)
                    }
                    "controlActProcess" => control_act = Some(ControlAct::read(reader, &child)?),
                    name => {
                        match name {
                            "templateId" => {
                                let root = child.required_attribute("root")?;
                                template_id = Some(TemplateId::new(root))
                            }
                            "id" => id = Some(IdentificationId::from_element(&child)?),
                            "creationTime" => {
                                creation_time = Some(Hl7Timestamp::from_element(&child)?)
                            }
                            "versionCode" => {
                                let code = child.required_attribute("code")?;
                                version = Some(
                                    Hl7Version::from_version_code(code).ok_or_else(|| {
                                        FormatError::invalid_value(
                                            "versionCode",
                                            code,
                                            "unsupported version",
                                        )
                                    })?,
                                );
                            }
                            "interactionId" => {
                                interaction_id = Some(InteractionId::from_element(&child)?)
                            }
                            "processingCode" => processing_code = Some(read_code(&child)?),
                            "processingModeCode" => processing_mode_code = Some(read_code(&child)?),
                            "acceptAckCode" => accept_ack_code = Some(read_code(&child)?),
                            _ => sequence_number = Some(read_sequence_number(&child)?),
                        }
                        reader.close_element(&child)?;
                    }
                }
            }
        }
        reader.close_element(&root)?;

        let missing = |element: &'static str| -> Hl7Error {
            FormatError::MissingElement {
                element,
                parent: root.name().to_string(),
            }
            .into()
        };

        let interaction_id: InteractionId = interaction_id.ok_or_else(|| missing("interactionId"))?;
        if interaction_id.as_str() != root.local_name() {
            return Err(FormatError::InteractionMismatch {
                expected: root.local_name().to_string(),
                found: interaction_id.as_str().to_string(),
            }
            .into());
        }
        let version = version.ok_or_else(|| missing("versionCode"))?;

        Ok(Self {
            template_id: template_id
                .unwrap_or_else(|| TemplateId::for_interaction(interaction_id.as_str(), version)),
            id: id.ok_or_else(|| missing("id"))?,
            creation_time: creation_time.ok_or_else(|| missing("creationTime"))?,
            version,
            interaction_id,
            processing_code: processing_code.ok_or_else(|| missing("processingCode"))?,
            processing_mode_code: processing_mode_code.unwrap_or_default(),
            accept_ack_code: accept_ack_code.ok_or_else(|| missing("acceptAckCode"))?,
            sequence_number,
            receiver: receiver.ok_or_else(|| missing("receiver"))?,
            sender: sender.ok_or_else(|| missing("sender"))?,
            attention_lines,
            acknowledgement,
            control_act,
        })
    }
}

fn read_sequence_number(start: &ElementStart) -> Result<i64> {
    let value = start.required_attribute("value")?;
    value.parse().map_err(|e: std::num::ParseIntError| {
        FormatError::invalid_value("sequenceNumber", value, e.to_string()).into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codes::AcknowledgementType;
    use crate::control_act::MessageControlAct;

    fn sample() -> TransmissionWrapper {
        TransmissionWrapper::new(
            "RCMR_IN000002UV01",
            Hl7Version::V2011,
            IdentificationId::new("1.2.3", "msg-1"),
            Device::sender("Sender"),
            Device::receiver("Receiver"),
        )
        .with_creation_time(Hl7Timestamp::parse("20110315093000").unwrap())
    }

    #[test]
    fn test_new_derives_template_and_defaults() {
        let wrapper = sample();
        assert_eq!(
            wrapper.template_id().as_str(),
            "urn:hl7-org:v3:RCMR_IN000002UV01:V3-2011N"
        );
        assert_eq!(wrapper.version_code(), "V3-2011N");
        assert_eq!(wrapper.interaction_id().as_str(), "RCMR_IN000002UV01");
        assert_eq!(wrapper.processing_code(), ProcessingCode::Production);
        assert!(wrapper.control_act().is_none());
    }

    #[test]
    fn test_written_layout() {
        let xml = sample().to_xml_string(false).unwrap();
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?><RCMR_IN000002UV01"));
        assert!(xml.contains("<RCMR_IN000002UV01 xmlns=\"urn:hl7-org:v3\""));
        let interaction = "root=\"2.16.840.1.113883.1.6\" extension=\"RCMR_IN000002UV01\"";
        assert!(xml.contains(&format!("<interactionId {}/>", interaction)));
        assert!(xml.contains("<creationTime value=\"20110315093000\"/>"));
        let receiver_at = xml.find("<receiver").unwrap();
        let sender_at = xml.find("<sender").unwrap();
        assert!(receiver_at < sender_at);
        assert!(xml.ends_with("</RCMR_IN000002UV01>"));
    }

    #[test]
    fn test_round_trip_keeps_fields() {
        let wrapper = sample()
            .with_processing_code(ProcessingCode::Debugging)
            .with_accept_ack_code(AcceptAcknowledgementCode::Error)
            .with_attention_line(AttentionLine::new("patient", "12345"))
            .with_acknowledgement(Acknowledgement::new(
                AcknowledgementType::AcceptAcknowledgementCommitAccept,
                IdentificationId::new("1.2.3", "msg-0"),
            ))
            .with_control_act(MessageControlAct::from_action("A", "B"));
        let xml = wrapper.to_xml_string(true).unwrap();
        let read = TransmissionWrapper::from_xml_str(&xml).unwrap();
        assert_eq!(read.id(), wrapper.id());
        assert_eq!(read.template_id(), wrapper.template_id());
        assert_eq!(read.creation_time(), wrapper.creation_time());
        assert_eq!(read.processing_code(), ProcessingCode::Debugging);
        assert_eq!(read.accept_ack_code(), AcceptAcknowledgementCode::Error);
        assert_eq!(read.sender(), wrapper.sender());
        assert_eq!(read.receiver(), wrapper.receiver());
        assert_eq!(read.attention_lines(), wrapper.attention_lines());
        assert_eq!(read.acknowledgement(), wrapper.acknowledgement());
        assert_eq!(read.control_act().unwrap().core().reason_codes().len(), 2);
    }

    #[test]
    fn test_interaction_must_match_root() {
        let xml = sample()
            .to_xml_string(false)
            .unwrap()
            .replace("extension=\"RCMR_IN000002UV01\"", "extension=\"OTHER_IN000001UV01\"");
        let err = TransmissionWrapper::from_xml_str(&xml).unwrap_err();
        assert!(matches!(err, Hl7Error::Format(FormatError::InteractionMismatch { .. })));
    }

    #[test]
    fn test_unknown_elements_are_skipped() {
        let xml = sample()
            .to_xml_string(false)
            .unwrap()
            .replace("<processingCode", "<custom><nested/></custom><processingCode");
        assert!(TransmissionWrapper::from_xml_str(&xml).is_ok());
    }

    #[test]
    fn test_out_of_order_element_is_rejected() {
        let xml = sample().to_xml_string(false).unwrap();
        let creation = "<creationTime value=\"20110315093000\"/>";
        let xml = xml
            .replace(creation, "")
            .replace("<processingCode", &format!("{}<processingCode", creation));
        let err = TransmissionWrapper::from_xml_str(&xml).unwrap_err();
        assert!(matches!(err, Hl7Error::Format(FormatError::OutOfOrder { .. })));
    }

    #[test]
    fn test_missing_sender_is_rejected() {
        let xml = "<MCCI_IN000002UV01 xmlns=\"urn:hl7-org:v3\"><id root=\"1\"/><creationTime value=\"20110101\"/><versionCode code=\"V3-2006N\"/><interactionId root=\"2.16.840.1.113883.1.6\" extension=\"MCCI_IN000002UV01\"/><processingCode code=\"P\"/><acceptAckCode code=\"NE\"/></MCCI_IN000002UV01>";
        let err = TransmissionWrapper::from_xml_str(xml).unwrap_err();
        assert!(err.to_string().contains("receiver"));
    }
}
