//! Typed envelope variants.
//!
//! Each variant embeds a [`TransmissionWrapper`] and is built by narrowing:
//! `TryFrom<TransmissionWrapper>` runs the variant's structural rules and
//! fails with a [`FormatError`](crate::FormatError) naming the rule. The
//! variant is picked from the envelope's shape:
//!
//! | Acknowledgement | Control act | Variant |
//! |-----------------|-------------|---------|
//! | absent | any | [`Request`] |
//! | present | absent | [`AcknowledgementResponse`] |
//! | present | message | [`ApplicationResponse`] |
//! | present | query with subject | [`QueryApplicationResponse`] |
//! | present | query without subject | [`QueryAcknowledgementResponse`] |

mod request;
mod response;

use std::io::{BufRead, Write};

use tracing::debug;

use crate::control_act::ControlAct;
use crate::error::Result;
use crate::wrapper::TransmissionWrapper;
use crate::xml::{XmlEventReader, XmlEventWriter};

pub use request::{Request, RequestType};
pub use response::{
    AcknowledgementResponse, ApplicationResponse, QueryAcknowledgementResponse,
    QueryApplicationResponse,
};

/// Discriminant of [`Message`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Request,
    AcknowledgementResponse,
    ApplicationResponse,
    QueryApplicationResponse,
    QueryAcknowledgementResponse,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Request => "Request",
            MessageKind::AcknowledgementResponse => "AcknowledgementResponse",
            MessageKind::ApplicationResponse => "ApplicationResponse",
            MessageKind::QueryApplicationResponse => "QueryApplicationResponse",
            MessageKind::QueryAcknowledgementResponse => "QueryAcknowledgementResponse",
        }
    }

    /// Picks the variant an envelope's shape calls for.
    pub fn of(wrapper: &TransmissionWrapper) -> Self {
        if wrapper.acknowledgement().is_none() {
            return MessageKind::Request;
        }
        match wrapper.control_act() {
            None => MessageKind::AcknowledgementResponse,
            Some(ControlAct::Message(_)) => MessageKind::ApplicationResponse,
            Some(ControlAct::Query(query)) if query.subject().is_some() => {
                MessageKind::QueryApplicationResponse
            }
            Some(ControlAct::Query(_)) => MessageKind::QueryAcknowledgementResponse,
        }
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Any validated envelope.
#[derive(Debug, Clone)]
pub enum Message {
    Request(Request),
    AcknowledgementResponse(AcknowledgementResponse),
    ApplicationResponse(ApplicationResponse),
    QueryApplicationResponse(QueryApplicationResponse),
    QueryAcknowledgementResponse(QueryAcknowledgementResponse),
}

impl Message {
    /// Narrows a parsed envelope to the variant its shape calls for.
    pub fn classify(wrapper: TransmissionWrapper) -> Result<Self> {
        let kind = MessageKind::of(&wrapper);
        debug!(kind = %kind, interaction = %wrapper.interaction_id(), "Classified envelope");
        Ok(match kind {
            MessageKind::Request => Message::Request(wrapper.try_into()?),
            MessageKind::AcknowledgementResponse => {
                Message::AcknowledgementResponse(wrapper.try_into()?)
            }
            MessageKind::ApplicationResponse => Message::ApplicationResponse(wrapper.try_into()?),
            MessageKind::QueryApplicationResponse => {
                Message::QueryApplicationResponse(wrapper.try_into()?)
            }
            MessageKind::QueryAcknowledgementResponse => {
                Message::QueryAcknowledgementResponse(wrapper.try_into()?)
            }
        })
    }

    /// Parses and classifies a document.
    pub fn from_xml_str(xml: &str) -> Result<Self> {
        Self::classify(TransmissionWrapper::from_xml_str(xml)?)
    }

    /// Reads and classifies an envelope.
    pub fn read<R: BufRead>(reader: &mut XmlEventReader<R>) -> Result<Self> {
        Self::classify(TransmissionWrapper::read(reader)?)
    }

    pub fn kind(&self) -> MessageKind {
        match self {
            Message::Request(_) => MessageKind::Request,
            Message::AcknowledgementResponse(_) => MessageKind::AcknowledgementResponse,
            Message::ApplicationResponse(_) => MessageKind::ApplicationResponse,
            Message::QueryApplicationResponse(_) => MessageKind::QueryApplicationResponse,
            Message::QueryAcknowledgementResponse(_) => MessageKind::QueryAcknowledgementResponse,
        }
    }

    /// The underlying envelope.
    pub fn wrapper(&self) -> &TransmissionWrapper {
        match self {
            Message::Request(m) => m.wrapper(),
            Message::AcknowledgementResponse(m) => m.wrapper(),
            Message::ApplicationResponse(m) => m.wrapper(),
            Message::QueryApplicationResponse(m) => m.wrapper(),
            Message::QueryAcknowledgementResponse(m) => m.wrapper(),
        }
    }

    pub fn into_wrapper(self) -> TransmissionWrapper {
        match self {
            Message::Request(m) => m.into_wrapper(),
            Message::AcknowledgementResponse(m) => m.into_wrapper(),
            Message::ApplicationResponse(m) => m.into_wrapper(),
            Message::QueryApplicationResponse(m) => m.into_wrapper(),
            Message::QueryAcknowledgementResponse(m) => m.into_wrapper(),
        }
    }

    pub fn is_response(&self) -> bool {
        !matches!(self, Message::Request(_))
    }

    pub fn write<W: Write>(&self, writer: &mut XmlEventWriter<W>) -> Result<()> {
        self.wrapper().write(writer)
    }
}

impl From<Request> for Message {
    fn from(m: Request) -> Self {
        Message::Request(m)
    }
}

impl From<AcknowledgementResponse> for Message {
    fn from(m: AcknowledgementResponse) -> Self {
        Message::AcknowledgementResponse(m)
    }
}

impl From<ApplicationResponse> for Message {
    fn from(m: ApplicationResponse) -> Self {
        Message::ApplicationResponse(m)
    }
}

impl From<QueryApplicationResponse> for Message {
    fn from(m: QueryApplicationResponse) -> Self {
        Message::QueryApplicationResponse(m)
    }
}

impl From<QueryAcknowledgementResponse> for Message {
    fn from(m: QueryAcknowledgementResponse) -> Self {
        Message::QueryAcknowledgementResponse(m)
    }
}
