//! Subcommand implementations.

use std::fmt;
use std::fs::File;
use std::io::{BufReader, Write};
use std::path::Path;

use anyhow::Context;
use clap::ValueEnum;
use helios_hl7v3::{
    ControlAct, Hl7Error, Message, MessageFormatter, OperationContext, ProtocolFault, Request,
    TransmissionWrapper,
};
use serde::Serialize;
use tracing::{info, warn};

use crate::config::ToolConfig;

/// Interaction of the acknowledgements written by `ack`.
pub const DEFAULT_ACK_INTERACTION: &str = "MCCI_IN000002UV01";

/// Which side of the exchange a document is expected to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Expectation {
    Request,
    Reply,
}

fn read_envelope(path: &Path) -> anyhow::Result<TransmissionWrapper> {
    let file = File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
    TransmissionWrapper::from_reader(BufReader::new(file))
        .with_context(|| format!("cannot parse {}", path.display()))
}

#[derive(Debug, Serialize)]
pub struct AcknowledgementSummary {
    pub type_code: String,
    pub target_message: String,
    pub details: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ControlActSummary {
    pub kind: &'static str,
    pub code: Option<String>,
    pub reason_codes: Vec<String>,
    pub subject: Option<String>,
    pub query_response_code: Option<String>,
}

/// What `inspect` reports about an envelope.
#[derive(Debug, Serialize)]
pub struct EnvelopeSummary {
    pub interaction: String,
    pub message_id: String,
    pub version: String,
    pub creation_time: String,
    pub sender: String,
    pub receiver: String,
    /// Variant name, or `None` when the envelope fails narrowing.
    pub kind: Option<String>,
    pub fault: Option<String>,
    pub acknowledgement: Option<AcknowledgementSummary>,
    pub control_act: Option<ControlActSummary>,
}

impl EnvelopeSummary {
    pub fn new(wrapper: &TransmissionWrapper) -> Self {
        let acknowledgement = wrapper.acknowledgement().map(|ack| AcknowledgementSummary {
            type_code: ack.acknowledgement_type().to_string(),
            target_message: ack.target_message().to_string(),
            details: ack
                .details()
                .iter()
                .filter_map(|detail| detail.text().map(str::to_string))
                .collect(),
        });
        let control_act = wrapper.control_act().map(|act| {
            let core = act.core();
            ControlActSummary {
                kind: act.kind_name(),
                code: core.code().map(|code| code.code().to_string()),
                reason_codes: core
                    .reason_codes()
                    .iter()
                    .map(|code| code.code().to_string())
                    .collect(),
                subject: core.subject().map(|subject| subject.element_name()),
                query_response_code: match act {
                    ControlAct::Query(query) => query
                        .query_acknowledgement()
                        .map(|ack| ack.query_response_code().to_string()),
                    ControlAct::Message(_) => None,
                },
            }
        });

        Self {
            interaction: wrapper.interaction_id().as_str().to_string(),
            message_id: wrapper.id().to_string(),
            version: wrapper.version_code().to_string(),
            creation_time: wrapper.creation_time().format(),
            sender: wrapper.sender().id().to_string(),
            receiver: wrapper.receiver().id().to_string(),
            kind: None,
            fault: None,
            acknowledgement,
            control_act,
        }
    }
}

impl fmt::Display for EnvelopeSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Interaction:   {}", self.interaction)?;
        writeln!(f, "Message id:    {}", self.message_id)?;
        writeln!(f, "Version:       {}", self.version)?;
        writeln!(f, "Created:       {}", self.creation_time)?;
        writeln!(f, "Sender:        {}", self.sender)?;
        writeln!(f, "Receiver:      {}", self.receiver)?;
        match (&self.kind, &self.fault) {
            (Some(kind), _) => writeln!(f, "Kind:          {}", kind)?,
            (None, Some(fault)) => writeln!(f, "Kind:          invalid ({})", fault)?,
            (None, None) => {}
        }
        if let Some(ack) = &self.acknowledgement {
            writeln!(f, "Acknowledged:  {} -> {}", ack.type_code, ack.target_message)?;
            for detail in &ack.details {
                writeln!(f, "  detail:      {}", detail)?;
            }
        }
        if let Some(act) = &self.control_act {
            writeln!(f, "Control act:   {}", act.kind)?;
            if !act.reason_codes.is_empty() {
                writeln!(f, "  reasons:     {}", act.reason_codes.join(", "))?;
            }
            if let Some(subject) = &act.subject {
                writeln!(f, "  subject:     <{}>", subject)?;
            }
            if let Some(code) = &act.query_response_code {
                writeln!(f, "  query ack:   {}", code)?;
            }
        }
        Ok(())
    }
}

/// Parses and classifies an envelope and prints its summary.
pub fn inspect(path: &Path, json: bool, out: &mut impl Write) -> anyhow::Result<()> {
    let wrapper = read_envelope(path)?;
    let mut summary = EnvelopeSummary::new(&wrapper);
    match Message::classify(wrapper) {
        Ok(message) => summary.kind = Some(message.kind().to_string()),
        Err(err) => summary.fault = Some(err.to_string()),
    }

    if json {
        serde_json::to_writer_pretty(&mut *out, &summary)?;
        writeln!(out)?;
    } else {
        write!(out, "{}", summary)?;
    }
    Ok(())
}

/// Narrows an envelope to the expected side of the exchange.
///
/// The outer error covers I/O and parsing; the inner one is the protocol
/// fault, if any.
pub fn validate(
    path: &Path,
    expect: Expectation,
) -> anyhow::Result<Result<Message, ProtocolFault>> {
    let wrapper = read_envelope(path)?;
    let result = match expect {
        Expectation::Request => Request::try_from(wrapper).map(Message::from),
        Expectation::Reply => Message::classify(wrapper).and_then(|message| {
            if message.is_response() {
                Ok(message)
            } else {
                Err(Hl7Error::invalid_operation(
                    "expected a reply but found a request",
                ))
            }
        }),
    };
    Ok(result.map_err(|err| ProtocolFault::from(&err)))
}

/// Acknowledges a request, or rejects it with a negative acknowledgement.
pub fn acknowledge(
    path: &Path,
    interaction: &str,
    config: &ToolConfig,
    out: impl Write,
) -> anyhow::Result<Message> {
    let formatter = MessageFormatter::new(interaction, config.formatter_config())?;
    let wrapper = read_envelope(path)?;
    let context = OperationContext::for_request(&wrapper).acknowledgement_only();

    let reply: Message = match Request::try_from(wrapper) {
        Ok(request) => {
            info!(
                message_id = %request.id(),
                request_type = ?request.request_type(),
                "Accepting request"
            );
            formatter.build_reply(None, &context)?
        }
        Err(err) => {
            warn!(error = %err, "Rejecting request");
            formatter.fault_reply(&context, &err)?.into()
        }
    };

    formatter
        .write_reply(&reply, out)
        .context("cannot write acknowledgement")?;
    Ok(reply)
}
