//! Requests.

use std::ops::Deref;

use crate::control_act::{ControlAct, QueryControlAcknowledgement};
use crate::error::{FormatError, Hl7Error, Result};
use crate::wrapper::TransmissionWrapper;

/// What a request asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestType {
    /// A plain message with a [`MessageControlAct`](crate::MessageControlAct).
    MessageRequest,
    /// A query carrying a `queryByParameter` payload.
    QueryRequest,
    /// A request for the next page of an earlier query.
    QueryContinuationRequest,
}

/// A validated request envelope.
///
/// Invariants: no acknowledgement, a control act with at least two reason
/// codes, and for query control acts exactly one of `queryByParameter` or
/// `queryContinuation`, with no subject, query acknowledgement or sequence
/// number.
#[derive(Debug, Clone)]
pub struct Request {
    wrapper: TransmissionWrapper,
    request_type: RequestType,
}

impl Request {
    /// Builds a request from an envelope and the control act it carries.
    pub fn build(wrapper: TransmissionWrapper, control_act: impl Into<ControlAct>) -> Result<Self> {
        Self::try_from(wrapper.with_control_act(control_act))
    }

    pub fn request_type(&self) -> RequestType {
        self.request_type
    }

    pub fn wrapper(&self) -> &TransmissionWrapper {
        &self.wrapper
    }

    pub fn into_wrapper(self) -> TransmissionWrapper {
        self.wrapper
    }

    fn validate(wrapper: &TransmissionWrapper) -> Result<RequestType> {
        if wrapper.acknowledgement().is_some() {
            return Err(FormatError::CannotBeSet {
                field: "Acknowledgement",
                context: "a request",
            }
            .into());
        }
        let control_act = wrapper
            .control_act()
            .ok_or(FormatError::MustBeSet { field: "ControlAct" })?;
        control_act.core().require_reason_codes()?;

        match control_act {
            ControlAct::Message(_) => Ok(RequestType::MessageRequest),
            ControlAct::Query(query) => Self::validate_query(wrapper, query),
        }
    }

    fn validate_query(
        wrapper: &TransmissionWrapper,
        query: &QueryControlAcknowledgement,
    ) -> Result<RequestType> {
        if query.subject().is_some() {
            return Err(FormatError::CannotBeSet {
                field: "Subject",
                context: "a query request",
            }
            .into());
        }
        if query.query_acknowledgement().is_some() {
            return Err(FormatError::CannotBeSet {
                field: "QueryAcknowledgement",
                context: "a query request",
            }
            .into());
        }
        if wrapper.sequence_number().is_some() {
            return Err(FormatError::CannotBeSet {
                field: "SequenceNumber",
                context: "a query request",
            }
            .into());
        }
        match (query.query_by_parameter(), query.query_continuation()) {
            (Some(_), None) => Ok(RequestType::QueryRequest),
            (None, Some(_)) => Ok(RequestType::QueryContinuationRequest),
            _ => Err(FormatError::ExactlyOneOf {
                first: "QueryByParameterPayload",
                second: "QueryContinuation",
            }
            .into()),
        }
    }
}

impl TryFrom<TransmissionWrapper> for Request {
    type Error = Hl7Error;

    fn try_from(wrapper: TransmissionWrapper) -> Result<Self> {
        let request_type = Self::validate(&wrapper)?;
        Ok(Self {
            wrapper,
            request_type,
        })
    }
}

impl Deref for Request {
    type Target = TransmissionWrapper;

    fn deref(&self) -> &TransmissionWrapper {
        &self.wrapper
    }
}
