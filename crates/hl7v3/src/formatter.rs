//! Message formatter: the protocol policy a messaging binding calls into.
//!
//! A [`MessageFormatter`] is bound to one interaction and one local device.
//! On the request path it builds, writes and reads [`Request`]s; on the reply
//! path it picks the response variant for an operation result, writes
//! replies and turns failures into negative acknowledgements.
//!
//! # Example
//!
//! ```rust
//! use helios_hl7v3::{FormatterConfig, MessageControlAct, MessageFormatter, RequestParameters, Subject};
//!
//! let formatter = MessageFormatter::new("RCMR_IN000002UV01", FormatterConfig::default())?;
//! let control_act = MessageControlAct::from_action("CREATE", "NEW")
//!     .with_subject(Subject::new(42i32));
//! let request = formatter.build_request(RequestParameters::new(control_act))?;
//! let xml = formatter.serialize_request(&request)?;
//! let read = formatter.read_request(xml.as_slice())?;
//! assert_eq!(read.id(), request.id());
//! # Ok::<(), helios_hl7v3::Hl7Error>(())
//! ```

use std::fmt;
use std::io::{BufRead, Write};

use thiserror::Error;
use tracing::{info, warn};

use crate::acknowledgement::{Acknowledgement, AcknowledgementDetail};
use crate::codes::{
    AcceptAcknowledgementCode, AcknowledgementType, ProcessingCode, ProcessingModeCode,
};
use crate::control_act::ControlAct;
use crate::datatypes::{DEFAULT_MESSAGE_ID_ROOT, Hl7Version, IdentificationId};
use crate::device::{Device, DeviceRole};
use crate::error::{FormatError, Hl7Error, Result};
use crate::message::{
    AcknowledgementResponse, ApplicationResponse, Message, MessageKind, QueryApplicationResponse,
    Request,
};
use crate::wrapper::{AttentionLine, TransmissionWrapper};

/// Settings shared by every envelope a formatter produces.
#[derive(Debug, Clone)]
pub struct FormatterConfig {
    pub version: Hl7Version,
    /// The local device, written as sender.
    pub sender: Device,
    /// Receiver used when a request names none and a reply has no known peer.
    pub default_receiver: Device,
    /// Root OID of generated message ids.
    pub message_id_root: String,
    pub processing_code: ProcessingCode,
    pub processing_mode_code: ProcessingModeCode,
    pub accept_ack_code: AcceptAcknowledgementCode,
    /// Indent written documents.
    pub indent: bool,
}

impl Default for FormatterConfig {
    fn default() -> Self {
        Self {
            version: Hl7Version::V2011,
            sender: Device::sender("Sender"),
            default_receiver: Device::receiver("Receiver"),
            message_id_root: DEFAULT_MESSAGE_ID_ROOT.to_string(),
            processing_code: ProcessingCode::default(),
            processing_mode_code: ProcessingModeCode::default(),
            accept_ack_code: AcceptAcknowledgementCode::default(),
            indent: false,
        }
    }
}

impl FormatterConfig {
    /// Validates the configuration and returns errors if any.
    pub fn validate(&self) -> std::result::Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if !self.sender.id().has_extension() {
            errors.push("Sender device id extension cannot be empty".to_string());
        }

        if !self.default_receiver.id().has_extension() {
            errors.push("Default receiver device id extension cannot be empty".to_string());
        }

        if self.sender.role() != DeviceRole::Sender {
            errors.push("Sender device must have the sender role".to_string());
        }

        if self.default_receiver.role() != DeviceRole::Receiver {
            errors.push("Default receiver device must have the receiver role".to_string());
        }

        if self.message_id_root.trim().is_empty() {
            errors.push("Message id root cannot be empty".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Call parameters of an outbound request.
#[derive(Debug, Clone)]
pub struct RequestParameters {
    pub control_act: ControlAct,
    /// Overrides the configured receiver's id extension.
    pub receiver_extension: Option<String>,
    pub attention_lines: Vec<AttentionLine>,
}

impl RequestParameters {
    pub fn new(control_act: impl Into<ControlAct>) -> Self {
        Self {
            control_act: control_act.into(),
            receiver_extension: None,
            attention_lines: Vec::new(),
        }
    }

    pub fn with_receiver(mut self, extension: impl Into<String>) -> Self {
        self.receiver_extension = Some(extension.into());
        self
    }

    pub fn with_attention_line(mut self, line: AttentionLine) -> Self {
        self.attention_lines.push(line);
        self
    }
}

/// What the binding knows about the request being answered.
#[derive(Debug, Clone)]
pub struct OperationContext {
    /// Id of the request; becomes the acknowledgement's target message.
    pub request_id: IdentificationId,
    /// Sender of the request; becomes the reply's receiver.
    pub request_sender: Option<Device>,
    /// Answer with a bare acknowledgement regardless of the result.
    pub acknowledgement_only: bool,
    /// Overrides the default `CA` (acknowledgement only) or `AA` type.
    pub acknowledgement_type: Option<AcknowledgementType>,
    pub acknowledgement_details: Vec<AcknowledgementDetail>,
}

impl OperationContext {
    pub fn new(request_id: IdentificationId) -> Self {
        Self {
            request_id,
            request_sender: None,
            acknowledgement_only: false,
            acknowledgement_type: None,
            acknowledgement_details: Vec::new(),
        }
    }

    /// Context for answering a parsed envelope.
    pub fn for_request(request: &TransmissionWrapper) -> Self {
        Self {
            request_sender: Some(request.sender().clone()),
            ..Self::new(request.id().clone())
        }
    }

    pub fn acknowledgement_only(mut self) -> Self {
        self.acknowledgement_only = true;
        self
    }

    pub fn with_acknowledgement_type(mut self, acknowledgement_type: AcknowledgementType) -> Self {
        self.acknowledgement_type = Some(acknowledgement_type);
        self
    }

    pub fn with_detail(mut self, detail: AcknowledgementDetail) -> Self {
        self.acknowledgement_details.push(detail);
        self
    }
}

/// The response variant an operation result is answered with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    Acknowledgement,
    Application,
    QueryApplication,
}

/// Broad class of a failure reported back to the peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    Argument,
    Format,
    InvalidOperation,
    Codec,
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FaultKind::Argument => "argument",
            FaultKind::Format => "format",
            FaultKind::InvalidOperation => "invalid operation",
            FaultKind::Codec => "codec",
        };
        f.write_str(name)
    }
}

/// A failure rendered for the peer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind} fault: {reason}")]
pub struct ProtocolFault {
    pub kind: FaultKind,
    pub reason: String,
}

impl ProtocolFault {
    /// Rejections of the message itself are accept-level (`CR`); anything
    /// else is an application error (`AE`).
    pub fn acknowledgement_type(&self) -> AcknowledgementType {
        match self.kind {
            FaultKind::Format | FaultKind::Codec => {
                AcknowledgementType::AcceptAcknowledgementCommitReject
            }
            FaultKind::Argument | FaultKind::InvalidOperation => {
                AcknowledgementType::ApplicationAcknowledgementError
            }
        }
    }

    /// The acknowledgement detail describing this fault.
    pub fn to_detail(&self) -> AcknowledgementDetail {
        let code = match self.kind {
            FaultKind::Argument => "SYN105",
            FaultKind::Format | FaultKind::Codec => "SYN",
            FaultKind::InvalidOperation => "INTERR",
        };
        AcknowledgementDetail::error(code, self.reason.clone())
    }
}

impl From<&Hl7Error> for ProtocolFault {
    fn from(err: &Hl7Error) -> Self {
        let kind = match err {
            Hl7Error::NullArgument { .. } => FaultKind::Argument,
            Hl7Error::Format(_) => FaultKind::Format,
            Hl7Error::InvalidOperation { .. } => FaultKind::InvalidOperation,
            Hl7Error::Xml(_)
            | Hl7Error::Io(_)
            | Hl7Error::Encoding { .. }
            | Hl7Error::BodySerialization(_)
            | Hl7Error::BodyDeserialization(_) => FaultKind::Codec,
        };
        Self {
            kind,
            reason: err.to_string(),
        }
    }
}

/// Builds, writes and reads envelopes for one interaction.
#[derive(Debug, Clone)]
pub struct MessageFormatter {
    interaction_id: String,
    config: FormatterConfig,
}

impl MessageFormatter {
    pub fn new(interaction_id: impl Into<String>, config: FormatterConfig) -> Result<Self> {
        let interaction_id = interaction_id.into();
        if interaction_id.trim().is_empty() {
            return Err(Hl7Error::NullArgument {
                name: "interaction_id",
            });
        }
        Ok(Self {
            interaction_id,
            config,
        })
    }

    pub fn interaction_id(&self) -> &str {
        &self.interaction_id
    }

    pub fn config(&self) -> &FormatterConfig {
        &self.config
    }

    fn envelope(&self, receiver: Device) -> TransmissionWrapper {
        TransmissionWrapper::new(
            self.interaction_id.clone(),
            self.config.version,
            IdentificationId::generate(self.config.message_id_root.clone()),
            self.config.sender.clone(),
            receiver,
        )
        .with_processing_code(self.config.processing_code)
        .with_processing_mode_code(self.config.processing_mode_code)
        .with_accept_ack_code(self.config.accept_ack_code)
    }

    /// Builds and validates a request.
    pub fn build_request(&self, params: RequestParameters) -> Result<Request> {
        let receiver = match params.receiver_extension {
            Some(extension) if extension.is_empty() => {
                return Err(Hl7Error::NullArgument {
                    name: "receiver_extension",
                });
            }
            Some(extension) => Device::new(
                DeviceRole::Receiver,
                IdentificationId::new(
                    self.config.default_receiver.id().root().to_string(),
                    extension,
                ),
            ),
            None => self.config.default_receiver.clone(),
        };
        let wrapper = self
            .envelope(receiver)
            .with_attention_lines(params.attention_lines);
        let request = Request::build(wrapper, params.control_act)?;
        info!(
            interaction = %self.interaction_id,
            message_id = %request.id(),
            request_type = ?request.request_type(),
            "Built request"
        );
        Ok(request)
    }

    /// Writes a request document to `out`.
    pub fn write_request<W: Write>(&self, request: &Request, out: W) -> Result<W> {
        request.write_document(out, self.config.indent)
    }

    /// Writes a request document to a buffer.
    pub fn serialize_request(&self, request: &Request) -> Result<Vec<u8>> {
        self.write_request(request, Vec::new())
    }

    /// Reads a request addressed to this formatter's interaction.
    pub fn read_request<R: BufRead>(&self, input: R) -> Result<Request> {
        let wrapper = TransmissionWrapper::from_reader(input)?;
        if wrapper.interaction_id().as_str() != self.interaction_id {
            return Err(FormatError::InteractionMismatch {
                expected: self.interaction_id.clone(),
                found: wrapper.interaction_id().as_str().to_string(),
            }
            .into());
        }
        let request = Request::try_from(wrapper)?;
        info!(
            interaction = %self.interaction_id,
            message_id = %request.id(),
            sender = ?request.sender().extension(),
            "Read request"
        );
        Ok(request)
    }

    /// Picks the response variant for an operation result.
    ///
    /// Acknowledgement-only operations and operations without a control act
    /// get a bare acknowledgement; otherwise the control act's shape decides.
    pub fn select_response(
        acknowledgement_only: bool,
        control_act: Option<&ControlAct>,
    ) -> ResponseKind {
        match control_act {
            _ if acknowledgement_only => ResponseKind::Acknowledgement,
            None => ResponseKind::Acknowledgement,
            Some(ControlAct::Query(_)) => ResponseKind::QueryApplication,
            Some(ControlAct::Message(_)) => ResponseKind::Application,
        }
    }

    /// Builds the reply to an operation.
    pub fn build_reply(
        &self,
        control_act: Option<ControlAct>,
        context: &OperationContext,
    ) -> Result<Message> {
        let kind = Self::select_response(context.acknowledgement_only, control_act.as_ref());
        let acknowledgement_type = context.acknowledgement_type.unwrap_or(match kind {
            ResponseKind::Acknowledgement => AcknowledgementType::AcceptAcknowledgementCommitAccept,
            _ => AcknowledgementType::ApplicationAcknowledgementAccept,
        });
        let acknowledgement = Acknowledgement::new(acknowledgement_type, context.request_id.clone())
            .with_details(context.acknowledgement_details.iter().cloned());
        let wrapper = self.envelope(self.reply_receiver(context));

        let reply: Message = match (kind, control_act) {
            (ResponseKind::Acknowledgement, _) => {
                AcknowledgementResponse::build(wrapper, acknowledgement)?.into()
            }
            (ResponseKind::Application, Some(ControlAct::Message(act))) => {
                ApplicationResponse::build(wrapper, acknowledgement, act)?.into()
            }
            (ResponseKind::QueryApplication, Some(ControlAct::Query(act))) => {
                QueryApplicationResponse::build(wrapper, acknowledgement, act)?.into()
            }
            (kind, _) => {
                return Err(Hl7Error::invalid_operation(format!(
                    "cannot construct {:?} response",
                    kind
                )));
            }
        };
        info!(
            interaction = %self.interaction_id,
            message_id = %reply.wrapper().id(),
            kind = %reply.kind(),
            "Built reply"
        );
        Ok(reply)
    }

    fn reply_receiver(&self, context: &OperationContext) -> Device {
        match &context.request_sender {
            Some(sender) => sender.with_role(DeviceRole::Receiver),
            None => self.config.default_receiver.clone(),
        }
    }

    /// Writes a reply document to `out`.
    ///
    /// Requests are refused, and so is an acknowledgement that does not name
    /// the message it answers; nothing is written in either case.
    pub fn write_reply<W: Write>(&self, reply: &Message, out: W) -> Result<W> {
        if reply.kind() == MessageKind::Request {
            return Err(Hl7Error::invalid_operation(
                "a request cannot be written as a reply",
            ));
        }
        let acknowledgement = reply
            .wrapper()
            .acknowledgement()
            .ok_or(Hl7Error::NullArgument {
                name: "acknowledgement",
            })?;
        if !acknowledgement.target_message().has_extension() {
            return Err(Hl7Error::NullArgument {
                name: "acknowledgement.target_message.extension",
            });
        }
        reply.wrapper().write_document(out, self.config.indent)
    }

    /// Reads and classifies a reply.
    pub fn read_reply<R: BufRead>(&self, input: R) -> Result<Message> {
        let message = Message::classify(TransmissionWrapper::from_reader(input)?)?;
        if !message.is_response() {
            return Err(FormatError::MustBeSet {
                field: "Acknowledgement",
            }
            .into());
        }
        info!(
            interaction = %message.wrapper().interaction_id(),
            message_id = %message.wrapper().id(),
            kind = %message.kind(),
            "Read reply"
        );
        Ok(message)
    }

    /// Reports a failure as a negative acknowledgement.
    pub fn fault_reply(
        &self,
        context: &OperationContext,
        err: &Hl7Error,
    ) -> Result<AcknowledgementResponse> {
        let fault = ProtocolFault::from(err);
        warn!(
            interaction = %self.interaction_id,
            target = %context.request_id,
            fault = %fault,
            "Replying with negative acknowledgement"
        );
        let acknowledgement =
            Acknowledgement::new(fault.acknowledgement_type(), context.request_id.clone())
                .with_details(context.acknowledgement_details.iter().cloned())
            .with_detail(fault.to_detail());
        AcknowledgementResponse::build(self.envelope(self.reply_receiver(context)), acknowledgement)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control_act::{MessageControlAct, QueryControlAcknowledgement};

    #[test]
    fn test_empty_interaction_is_rejected() {
        let err = MessageFormatter::new("", FormatterConfig::default()).unwrap_err();
        assert!(matches!(err, Hl7Error::NullArgument { name: "interaction_id" }));
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(FormatterConfig::default().validate().is_ok());

        let config = FormatterConfig {
            sender: Device::sender(""),
            message_id_root: " ".to_string(),
            ..Default::default()
        };
        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_select_response() {
        let message: ControlAct = MessageControlAct::new().into();
        let query: ControlAct = QueryControlAcknowledgement::new().into();
        assert_eq!(
            MessageFormatter::select_response(true, Some(&message)),
            ResponseKind::Acknowledgement
        );
        assert_eq!(MessageFormatter::select_response(false, None), ResponseKind::Acknowledgement);
        assert_eq!(
            MessageFormatter::select_response(false, Some(&message)),
            ResponseKind::Application
        );
        assert_eq!(
            MessageFormatter::select_response(false, Some(&query)),
            ResponseKind::QueryApplication
        );
    }

    #[test]
    fn test_fault_mapping() {
        let format: Hl7Error = FormatError::MustBeSet { field: "Subject" }.into();
        let fault = ProtocolFault::from(&format);
        assert_eq!(fault.kind, FaultKind::Format);
        assert_eq!(
            fault.acknowledgement_type(),
            AcknowledgementType::AcceptAcknowledgementCommitReject
        );
        assert_eq!(fault.to_detail().code().unwrap().code(), "SYN");

        let invalid = Hl7Error::invalid_operation("cannot construct response");
        let fault = ProtocolFault::from(&invalid);
        assert_eq!(
            fault.acknowledgement_type(),
            AcknowledgementType::ApplicationAcknowledgementError
        );
        assert_eq!(fault.to_detail().code().unwrap().code(), "INTERR");
        assert!(fault.to_string().starts_with("invalid operation fault"));
    }

    #[test]
    fn test_empty_receiver_extension_is_rejected() {
        let formatter =
            MessageFormatter::new("RCMR_IN000002UV01", FormatterConfig::default()).unwrap();
        let params =
            RequestParameters::new(MessageControlAct::from_action("A", "B")).with_receiver("");
        let err = formatter.build_request(params).unwrap_err();
        assert!(matches!(err, Hl7Error::NullArgument { name: "receiver_extension" }));
    }
}
