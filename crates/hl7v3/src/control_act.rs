//! The control act: the action-bearing part of an envelope.
//!
//! A control act is either a [`MessageControlAct`] (plain messages and their
//! application responses) or a [`QueryControlAcknowledgement`] (query
//! requests, continuations and query responses). Both share
//! [`ControlActCore`], reachable through `Deref`.

use std::io::{BufRead, Write};
use std::ops::{Deref, DerefMut};

use crate::acknowledgement::QueryAcknowledgement;
use crate::datatypes::{
    ACTION_CODE_SYSTEM, ClassificatorId, Hl7Timestamp, LanguageCode, PriorityCode,
    REASON_CODE_SYSTEM,
};
use crate::error::{FormatError, Result};
use crate::payload::{QueryByParameterPayload, QueryContinuation, Subject};
use crate::xml::{ChildOrder, ElementStart, XmlEventReader, XmlEventWriter};

/// Minimum number of reason codes requests and application responses carry.
pub const MIN_REASON_CODES: usize = 2;

const CHILD_SEQUENCE: &[&str] = &[
    "code",
    "text",
    "effectiveTime",
    "priorityCode",
    "reasonCode",
    "languageCode",
    "subject",
    "queryAck",
    "queryByParameter",
    "queryContinuation",
];

/// Fields shared by every control act.
#[derive(Debug, Clone, Default)]
pub struct ControlActCore {
    code: Option<ClassificatorId>,
    text: Option<String>,
    effective_time: Option<Hl7Timestamp>,
    priority_code: Option<PriorityCode>,
    reason_codes: Vec<ClassificatorId>,
    language_code: Option<LanguageCode>,
    subject: Option<Subject>,
}

impl ControlActCore {
    /// Core with the action and reason code pair.
    fn from_action(action: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            reason_codes: vec![
                ClassificatorId::new(action, ACTION_CODE_SYSTEM),
                ClassificatorId::new(reason, REASON_CODE_SYSTEM),
            ],
            ..Default::default()
        }
    }

    pub fn code(&self) -> Option<&ClassificatorId> {
        self.code.as_ref()
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn effective_time(&self) -> Option<&Hl7Timestamp> {
        self.effective_time.as_ref()
    }

    pub fn priority_code(&self) -> Option<&PriorityCode> {
        self.priority_code.as_ref()
    }

    /// Reason codes in insertion order.
    pub fn reason_codes(&self) -> &[ClassificatorId] {
        &self.reason_codes
    }

    pub fn language_code(&self) -> Option<&LanguageCode> {
        self.language_code.as_ref()
    }

    pub fn subject(&self) -> Option<&Subject> {
        self.subject.as_ref()
    }

    pub fn set_subject(&mut self, subject: Subject) {
        self.subject = Some(subject);
    }

    /// Removes and returns the subject.
    pub fn take_subject(&mut self) -> Option<Subject> {
        self.subject.take()
    }

    /// Sets or clears the language code.
    ///
    /// Fails when the value is not in the language code system; clearing
    /// always succeeds.
    pub fn set_language_code(&mut self, value: Option<ClassificatorId>) -> Result<()> {
        self.language_code = value.map(LanguageCode::try_from).transpose()?;
        Ok(())
    }

    /// Sets or clears the priority code.
    ///
    /// Fails when the value is not in the priority code system; clearing
    /// always succeeds.
    pub fn set_priority_code(&mut self, value: Option<ClassificatorId>) -> Result<()> {
        self.priority_code = value.map(PriorityCode::try_from).transpose()?;
        Ok(())
    }

    /// Appends reason codes, dropping `None` entries.
    pub fn extend_reason_codes(
        &mut self,
        codes: impl IntoIterator<Item = Option<ClassificatorId>>,
    ) {
        self.reason_codes.extend(codes.into_iter().flatten());
    }

    /// Checks the reason code cardinality required of requests and
    /// application responses.
    pub fn require_reason_codes(&self) -> Result<()> {
        if self.reason_codes.len() < MIN_REASON_CODES {
            return Err(FormatError::ReasonCodeCardinality {
                required: MIN_REASON_CODES,
                found: self.reason_codes.len(),
            }
            .into());
        }
        Ok(())
    }

    fn write_fields<W: Write>(&self, writer: &mut XmlEventWriter<W>) -> Result<()> {
        if let Some(code) = &self.code {
            code.write(writer, "code")?;
        }
        if let Some(text) = &self.text {
            writer.text_element("text", text)?;
        }
        if let Some(effective_time) = &self.effective_time {
            effective_time.write(writer, "effectiveTime")?;
        }
        if let Some(priority_code) = &self.priority_code {
            priority_code.as_classificator().write(writer, "priorityCode")?;
        }
        for reason_code in &self.reason_codes {
            reason_code.write(writer, "reasonCode")?;
        }
        if let Some(language_code) = &self.language_code {
            language_code.as_classificator().write(writer, "languageCode")?;
        }
        if let Some(subject) = &self.subject {
            subject.write(writer)?;
        }
        Ok(())
    }
}

macro_rules! control_act_builders {
    ($ty:ty) => {
        impl $ty {
            pub fn with_code(mut self, code: ClassificatorId) -> Self {
                self.core.code = Some(code);
                self
            }

            pub fn with_text(mut self, text: impl Into<String>) -> Self {
                self.core.text = Some(text.into());
                self
            }

            pub fn with_effective_time(mut self, effective_time: Hl7Timestamp) -> Self {
                self.core.effective_time = Some(effective_time);
                self
            }

            pub fn with_priority_code(mut self, priority_code: PriorityCode) -> Self {
                self.core.priority_code = Some(priority_code);
                self
            }

            pub fn with_language_code(mut self, language_code: LanguageCode) -> Self {
                self.core.language_code = Some(language_code);
                self
            }

            pub fn with_reason_code(mut self, reason_code: ClassificatorId) -> Self {
                self.core.reason_codes.push(reason_code);
                self
            }

            /// Appends reason codes, dropping `None` entries.
            pub fn with_reason_codes(
                mut self,
                codes: impl IntoIterator<Item = Option<ClassificatorId>>,
            ) -> Self {
                self.core.extend_reason_codes(codes);
                self
            }

            pub fn with_subject(mut self, subject: Subject) -> Self {
                self.core.subject = Some(subject);
                self
            }
        }

        impl Deref for $ty {
            type Target = ControlActCore;

            fn deref(&self) -> &ControlActCore {
                &self.core
            }
        }

        impl DerefMut for $ty {
            fn deref_mut(&mut self) -> &mut ControlActCore {
                &mut self.core
            }
        }
    };
}

/// Control act of a plain message or application response.
#[derive(Debug, Clone, Default)]
pub struct MessageControlAct {
    core: ControlActCore,
}

impl MessageControlAct {
    pub fn new() -> Self {
        Self::default()
    }

    /// Control act with exactly two reason codes: `action` in the action code
    /// system and `reason` in the reason code system.
    pub fn from_action(action: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            core: ControlActCore::from_action(action, reason),
        }
    }
}

control_act_builders!(MessageControlAct);

/// Control act of query requests and query responses.
#[derive(Debug, Clone, Default)]
pub struct QueryControlAcknowledgement {
    core: ControlActCore,
    query_by_parameter: Option<QueryByParameterPayload>,
    query_continuation: Option<QueryContinuation>,
    query_acknowledgement: Option<QueryAcknowledgement>,
}

impl QueryControlAcknowledgement {
    pub fn new() -> Self {
        Self::default()
    }

    /// Query control act with the action and reason code pair.
    pub fn from_action(action: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            core: ControlActCore::from_action(action, reason),
            ..Default::default()
        }
    }

    pub fn with_query_by_parameter(mut self, payload: QueryByParameterPayload) -> Self {
        self.query_by_parameter = Some(payload);
        self
    }

    pub fn with_query_continuation(mut self, continuation: QueryContinuation) -> Self {
        self.query_continuation = Some(continuation);
        self
    }

    pub fn with_query_acknowledgement(mut self, query_ack: QueryAcknowledgement) -> Self {
        self.query_acknowledgement = Some(query_ack);
        self
    }

    pub fn query_by_parameter(&self) -> Option<&QueryByParameterPayload> {
        self.query_by_parameter.as_ref()
    }

    pub fn query_continuation(&self) -> Option<&QueryContinuation> {
        self.query_continuation.as_ref()
    }

    pub fn query_acknowledgement(&self) -> Option<&QueryAcknowledgement> {
        self.query_acknowledgement.as_ref()
    }
}

control_act_builders!(QueryControlAcknowledgement);

/// A control act of either shape.
#[derive(Debug, Clone)]
pub enum ControlAct {
    Message(MessageControlAct),
    Query(QueryControlAcknowledgement),
}

impl ControlAct {
    /// Name of the shape, used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            ControlAct::Message(_) => "MessageControlAct",
            ControlAct::Query(_) => "QueryControlAcknowledgement",
        }
    }

    pub fn core(&self) -> &ControlActCore {
        match self {
            ControlAct::Message(act) => &act.core,
            ControlAct::Query(act) => &act.core,
        }
    }

    pub fn as_message(&self) -> Option<&MessageControlAct> {
        match self {
            ControlAct::Message(act) => Some(act),
            ControlAct::Query(_) => None,
        }
    }

    pub fn as_query(&self) -> Option<&QueryControlAcknowledgement> {
        match self {
            ControlAct::Query(act) => Some(act),
            ControlAct::Message(_) => None,
        }
    }

    pub(crate) fn write<W: Write>(&self, writer: &mut XmlEventWriter<W>) -> Result<()> {
        writer.start(
            "controlActProcess",
            &[("classCode", "CACT"), ("moodCode", "EVN")],
        )?;
        self.core().write_fields(writer)?;
        if let ControlAct::Query(query) = self {
            if let Some(query_ack) = &query.query_acknowledgement {
                query_ack.write(writer)?;
            }
            if let Some(payload) = &query.query_by_parameter {
                payload.write(writer)?;
            }
            if let Some(continuation) = &query.query_continuation {
                continuation.write(writer)?;
            }
        }
        writer.end("controlActProcess")
    }

    /// Reads a `controlActProcess` element whose start tag was consumed.
    ///
    /// The shape is decided by content: any of `queryAck`, `queryByParameter`
    /// or `queryContinuation` makes it a query control act.
    pub(crate) fn read<R: BufRead>(
        reader: &mut XmlEventReader<R>,
        start: &ElementStart,
    ) -> Result<Self> {
        let mut core = ControlActCore::default();
        let mut query_acknowledgement = None;
        let mut query_by_parameter = None;
        let mut query_continuation = None;

        let mut order = ChildOrder::new(start.name(), CHILD_SEQUENCE, &["reasonCode"]);
        if !start.is_empty() {
            while let Some(child) = reader.peek_element()? {
                if !order.advance(child.local_name())? {
                    let child = reader.open_element()?;
                    reader.skip_element(&child)?;
                    continue;
                }
                match child.local_name() {
                    "subject" => core.subject = Some(Subject::read(reader)?),
                    "queryByParameter" => {
                        query_by_parameter = Some(QueryByParameterPayload::read(reader)?)
                    }
                    "queryContinuation" => {
                        query_continuation = Some(QueryContinuation::read(reader)?)
                    }
                    _ => {
                        let child = reader.open_element()?;
                        match child.local_name() {
                            "code" => core.code = Some(ClassificatorId::from_element(&child)?),
                            "text" => core.text = Some(reader.read_text(&child)?),
                            "effectiveTime" => {
                                core.effective_time = Some(Hl7Timestamp::from_element(&child)?)
                            }
                            "priorityCode" => {
                                let code = ClassificatorId::from_element(&child)?;
                                core.priority_code = Some(PriorityCode::try_from(code)?)
                            }
                            "reasonCode" => {
                                core.reason_codes.push(ClassificatorId::from_element(&child)?)
                            }
                            "languageCode" => {
                                let code = ClassificatorId::from_element(&child)?;
                                core.language_code = Some(LanguageCode::try_from(code)?)
                            }
                            _ => {
                                query_acknowledgement =
                                    Some(QueryAcknowledgement::read(reader, &child)?);
                                continue;
                            }
                        }
                        // `text` consumed its end tag in read_text.
                        if child.local_name() != "text" {
                            reader.close_element(&child)?;
                        }
                    }
                }
            }
        }
        reader.close_element(start)?;

        if query_acknowledgement.is_some()
            || query_by_parameter.is_some()
            || query_continuation.is_some()
        {
            Ok(ControlAct::Query(QueryControlAcknowledgement {
                core,
                query_by_parameter,
                query_continuation,
                query_acknowledgement,
            }))
        } else {
            Ok(ControlAct::Message(MessageControlAct { core }))
        }
    }
}

impl From<MessageControlAct> for ControlAct {
    fn from(act: MessageControlAct) -> Self {
        ControlAct::Message(act)
    }
}

impl From<QueryControlAcknowledgement> for ControlAct {
    fn from(act: QueryControlAcknowledgement) -> Self {
        ControlAct::Query(act)
    }
}
