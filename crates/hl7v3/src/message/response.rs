//! Response envelopes.
//!
//! | Variant | Control act | Extra rules |
//! |---------|-------------|-------------|
//! | [`AcknowledgementResponse`] | ignored | acknowledgement expected |
//! | [`ApplicationResponse`] | message | two or more reason codes |
//! | [`QueryApplicationResponse`] | query | subject and query ack set; no query payload or sequence number |
//! | [`QueryAcknowledgementResponse`] | query | query ack set; no query payload |

use std::ops::Deref;

use tracing::warn;

use crate::acknowledgement::Acknowledgement;
use crate::control_act::{ControlAct, MessageControlAct, QueryControlAcknowledgement};
use crate::error::{FormatError, Hl7Error, Result};
use crate::wrapper::TransmissionWrapper;

fn require_acknowledgement(wrapper: &TransmissionWrapper) -> Result<()> {
    if wrapper.acknowledgement().is_none() {
        return Err(FormatError::MustBeSet {
            field: "Acknowledgement",
        }
        .into());
    }
    Ok(())
}

fn require_control_act(wrapper: &TransmissionWrapper) -> Result<&ControlAct> {
    wrapper
        .control_act()
        .ok_or_else(|| FormatError::MustBeSet { field: "ControlAct" }.into())
}

fn require_query<'a>(
    wrapper: &'a TransmissionWrapper,
    variant: &'static str,
) -> Result<&'a QueryControlAcknowledgement> {
    match require_control_act(wrapper)? {
        ControlAct::Query(query) => Ok(query),
        other => Err(FormatError::ControlActMismatch {
            variant,
            expected: "QueryControlAcknowledgement",
            found: other.kind_name(),
        }
        .into()),
    }
}

fn forbid_query_by_parameter(query: &QueryControlAcknowledgement) -> Result<()> {
    if query.query_by_parameter().is_some() {
        return Err(FormatError::CannotBeSet {
            field: "QueryByParameterPayload",
            context: "a response",
        }
        .into());
    }
    Ok(())
}

fn require_query_acknowledgement(query: &QueryControlAcknowledgement) -> Result<()> {
    if query.query_acknowledgement().is_none() {
        return Err(FormatError::MustBeSet {
            field: "QueryAcknowledgement",
        }
        .into());
    }
    Ok(())
}

macro_rules! envelope_variant {
    ($ty:ident) => {
        impl $ty {
            pub fn wrapper(&self) -> &TransmissionWrapper {
                &self.wrapper
            }

            pub fn into_wrapper(self) -> TransmissionWrapper {
                self.wrapper
            }
        }

        impl TryFrom<TransmissionWrapper> for $ty {
            type Error = Hl7Error;

            fn try_from(wrapper: TransmissionWrapper) -> Result<Self> {
                Self::validate(&wrapper)?;
                Ok(Self { wrapper })
            }
        }

        impl Deref for $ty {
            type Target = TransmissionWrapper;

            fn deref(&self) -> &TransmissionWrapper {
                &self.wrapper
            }
        }
    };
}

/// A bare accept-level acknowledgement.
#[derive(Debug, Clone)]
pub struct AcknowledgementResponse {
    wrapper: TransmissionWrapper,
}

impl AcknowledgementResponse {
    pub fn build(wrapper: TransmissionWrapper, acknowledgement: Acknowledgement) -> Result<Self> {
        Self::try_from(wrapper.with_acknowledgement(acknowledgement))
    }

    /// The acknowledgement is soft-checked: its absence is logged, not rejected.
    fn validate(wrapper: &TransmissionWrapper) -> Result<()> {
        if wrapper.acknowledgement().is_none() {
            warn!(
                interaction = %wrapper.interaction_id(),
                message_id = %wrapper.id(),
                "Acknowledgement response without acknowledgement"
            );
        }
        Ok(())
    }
}

envelope_variant!(AcknowledgementResponse);

/// The application-level reply to a message request.
#[derive(Debug, Clone)]
pub struct ApplicationResponse {
    wrapper: TransmissionWrapper,
}

impl ApplicationResponse {
    pub fn build(
        wrapper: TransmissionWrapper,
        acknowledgement: Acknowledgement,
        control_act: MessageControlAct,
    ) -> Result<Self> {
        Self::try_from(
            wrapper
                .with_acknowledgement(acknowledgement)
                .with_control_act(control_act),
        )
    }

    fn validate(wrapper: &TransmissionWrapper) -> Result<()> {
        require_acknowledgement(wrapper)?;
        match require_control_act(wrapper)? {
            ControlAct::Message(act) => act.require_reason_codes(),
            other => Err(FormatError::ControlActMismatch {
                variant: "ApplicationResponse",
                expected: "MessageControlAct",
                found: other.kind_name(),
            }
            .into()),
        }
    }
}

envelope_variant!(ApplicationResponse);

/// The reply to a query, carrying results in its subject.
#[derive(Debug, Clone)]
pub struct QueryApplicationResponse {
    wrapper: TransmissionWrapper,
}

impl QueryApplicationResponse {
    pub fn build(
        wrapper: TransmissionWrapper,
        acknowledgement: Acknowledgement,
        control_act: QueryControlAcknowledgement,
    ) -> Result<Self> {
        Self::try_from(
            wrapper
                .with_acknowledgement(acknowledgement)
                .with_control_act(control_act),
        )
    }

    fn validate(wrapper: &TransmissionWrapper) -> Result<()> {
        require_acknowledgement(wrapper)?;
        let query = require_query(wrapper, "QueryApplicationResponse")?;
        forbid_query_by_parameter(query)?;
        if wrapper.sequence_number().is_some() {
            return Err(FormatError::CannotBeSet {
                field: "SequenceNumber",
                context: "a query response",
            }
            .into());
        }
        if query.subject().is_none() {
            return Err(FormatError::MustBeSet { field: "Subject" }.into());
        }
        require_query_acknowledgement(query)
    }
}

envelope_variant!(QueryApplicationResponse);

/// A query reply without results.
///
/// Superseded in the protocol by [`QueryApplicationResponse`]; still read
/// for compatibility with older peers.
#[derive(Debug, Clone)]
pub struct QueryAcknowledgementResponse {
    wrapper: TransmissionWrapper,
}

impl QueryAcknowledgementResponse {
    pub fn build(
        wrapper: TransmissionWrapper,
        acknowledgement: Acknowledgement,
        control_act: QueryControlAcknowledgement,
    ) -> Result<Self> {
        Self::try_from(
            wrapper
                .with_acknowledgement(acknowledgement)
                .with_control_act(control_act),
        )
    }

    fn validate(wrapper: &TransmissionWrapper) -> Result<()> {
        require_acknowledgement(wrapper)?;
        let query = require_query(wrapper, "QueryAcknowledgementResponse")?;
        forbid_query_by_parameter(query)?;
        require_query_acknowledgement(query)
    }
}

envelope_variant!(QueryAcknowledgementResponse);
