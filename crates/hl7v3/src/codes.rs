//! Coded attribute values of the transmission wrapper.
//!
//! Each enum maps to one HL7 code set and round-trips through its wire code
//! with [`CodedValue::code`] and [`CodedValue::from_code`].

use std::fmt;

use crate::error::{FormatError, Result};
use crate::xml::ElementStart;

/// An enum carried on the wire as a short code.
pub trait CodedValue: Sized + Copy {
    /// Protocol name of the field, used in error messages.
    const FIELD: &'static str;

    /// The wire code.
    fn code(&self) -> &'static str;

    /// Parses a wire code, returning `None` for unknown codes.
    fn from_code(code: &str) -> Option<Self>;

    /// Parses a wire code, failing with a format error for unknown codes.
    fn parse_code(code: &str) -> Result<Self> {
        Self::from_code(code).ok_or_else(|| {
            FormatError::invalid_value(Self::FIELD, code, "unknown code").into()
        })
    }
}

/// Whether a message is production, debugging or training traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ProcessingCode {
    /// `P`
    #[default]
    Production,
    /// `D`
    Debugging,
    /// `T`
    Training,
}

impl CodedValue for ProcessingCode {
    const FIELD: &'static str = "processingCode";

    fn code(&self) -> &'static str {
        match self {
            ProcessingCode::Production => "P",
            ProcessingCode::Debugging => "D",
            ProcessingCode::Training => "T",
        }
    }

    fn from_code(code: &str) -> Option<Self> {
        match code {
            "P" => Some(ProcessingCode::Production),
            "D" => Some(ProcessingCode::Debugging),
            "T" => Some(ProcessingCode::Training),
            _ => None,
        }
    }
}

/// How the receiver should treat the message relative to live data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ProcessingModeCode {
    /// `A`
    Archive,
    /// `I`
    InitialLoad,
    /// `R`
    Restore,
    /// `T`: current processing.
    #[default]
    OperationData,
}

impl CodedValue for ProcessingModeCode {
    const FIELD: &'static str = "processingModeCode";

    fn code(&self) -> &'static str {
        match self {
            ProcessingModeCode::Archive => "A",
            ProcessingModeCode::InitialLoad => "I",
            ProcessingModeCode::Restore => "R",
            ProcessingModeCode::OperationData => "T",
        }
    }

    fn from_code(code: &str) -> Option<Self> {
        match code {
            "A" => Some(ProcessingModeCode::Archive),
            "I" => Some(ProcessingModeCode::InitialLoad),
            "R" => Some(ProcessingModeCode::Restore),
            "T" => Some(ProcessingModeCode::OperationData),
            _ => None,
        }
    }
}

/// When the receiver must send an accept-level acknowledgement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AcceptAcknowledgementCode {
    /// `AL`
    #[default]
    Always,
    /// `ER`: only on error.
    Error,
    /// `NE`
    Never,
}

impl CodedValue for AcceptAcknowledgementCode {
    const FIELD: &'static str = "acceptAckCode";

    fn code(&self) -> &'static str {
        match self {
            AcceptAcknowledgementCode::Always => "AL",
            AcceptAcknowledgementCode::Error => "ER",
            AcceptAcknowledgementCode::Never => "NE",
        }
    }

    fn from_code(code: &str) -> Option<Self> {
        match code {
            "AL" => Some(AcceptAcknowledgementCode::Always),
            "ER" => Some(AcceptAcknowledgementCode::Error),
            "NE" => Some(AcceptAcknowledgementCode::Never),
            _ => None,
        }
    }
}

/// Acknowledgement type code (`acknowledgement/@typeCode`).
///
/// Accept-level codes (`C*`) acknowledge receipt by the messaging layer;
/// application-level codes (`A*`) acknowledge processing by the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AcknowledgementType {
    /// `CA`
    AcceptAcknowledgementCommitAccept,
    /// `CE`
    AcceptAcknowledgementCommitError,
    /// `CR`
    AcceptAcknowledgementCommitReject,
    /// `AA`
    ApplicationAcknowledgementAccept,
    /// `AE`
    ApplicationAcknowledgementError,
    /// `AR`
    ApplicationAcknowledgementReject,
}

impl AcknowledgementType {
    /// Returns `true` for the accepting codes (`CA`, `AA`).
    pub fn is_accept(&self) -> bool {
        matches!(
            self,
            AcknowledgementType::AcceptAcknowledgementCommitAccept
                | AcknowledgementType::ApplicationAcknowledgementAccept
        )
    }
}

impl CodedValue for AcknowledgementType {
    const FIELD: &'static str = "acknowledgement typeCode";

    fn code(&self) -> &'static str {
        match self {
            AcknowledgementType::AcceptAcknowledgementCommitAccept => "CA",
            AcknowledgementType::AcceptAcknowledgementCommitError => "CE",
            AcknowledgementType::AcceptAcknowledgementCommitReject => "CR",
            AcknowledgementType::ApplicationAcknowledgementAccept => "AA",
            AcknowledgementType::ApplicationAcknowledgementError => "AE",
            AcknowledgementType::ApplicationAcknowledgementReject => "AR",
        }
    }

    fn from_code(code: &str) -> Option<Self> {
        match code {
            "CA" => Some(AcknowledgementType::AcceptAcknowledgementCommitAccept),
            "CE" => Some(AcknowledgementType::AcceptAcknowledgementCommitError),
            "CR" => Some(AcknowledgementType::AcceptAcknowledgementCommitReject),
            "AA" => Some(AcknowledgementType::ApplicationAcknowledgementAccept),
            "AE" => Some(AcknowledgementType::ApplicationAcknowledgementError),
            "AR" => Some(AcknowledgementType::ApplicationAcknowledgementReject),
            _ => None,
        }
    }
}

/// Severity of an acknowledgement detail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AcknowledgementDetailType {
    /// `E`
    Error,
    /// `W`
    Warning,
    /// `I`
    Information,
}

impl CodedValue for AcknowledgementDetailType {
    const FIELD: &'static str = "acknowledgementDetail typeCode";

    fn code(&self) -> &'static str {
        match self {
            AcknowledgementDetailType::Error => "E",
            AcknowledgementDetailType::Warning => "W",
            AcknowledgementDetailType::Information => "I",
        }
    }

    fn from_code(code: &str) -> Option<Self> {
        match code {
            "E" => Some(AcknowledgementDetailType::Error),
            "W" => Some(AcknowledgementDetailType::Warning),
            "I" => Some(AcknowledgementDetailType::Information),
            _ => None,
        }
    }
}

/// Outcome of a query (`queryAck/queryResponseCode`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryResponseCode {
    /// `OK`: data found.
    Ok,
    /// `NF`: no data found.
    NoDataFound,
    /// `AE`: application error.
    ApplicationError,
    /// `QE`: query parameter error.
    QueryParameterError,
}

impl CodedValue for QueryResponseCode {
    const FIELD: &'static str = "queryResponseCode";

    fn code(&self) -> &'static str {
        match self {
            QueryResponseCode::Ok => "OK",
            QueryResponseCode::NoDataFound => "NF",
            QueryResponseCode::ApplicationError => "AE",
            QueryResponseCode::QueryParameterError => "QE",
        }
    }

    fn from_code(code: &str) -> Option<Self> {
        match code {
            "OK" => Some(QueryResponseCode::Ok),
            "NF" => Some(QueryResponseCode::NoDataFound),
            "AE" => Some(QueryResponseCode::ApplicationError),
            "QE" => Some(QueryResponseCode::QueryParameterError),
            _ => None,
        }
    }
}

/// State of a query (`queryAck/statusCode`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryStatusCode {
    New,
    WaitContinuedQueryResponse,
    DeliveredResponse,
    Aborted,
}

impl CodedValue for QueryStatusCode {
    const FIELD: &'static str = "queryAck statusCode";

    fn code(&self) -> &'static str {
        match self {
            QueryStatusCode::New => "new",
            QueryStatusCode::WaitContinuedQueryResponse => "waitContinuedQueryResponse",
            QueryStatusCode::DeliveredResponse => "deliveredResponse",
            QueryStatusCode::Aborted => "aborted",
        }
    }

    fn from_code(code: &str) -> Option<Self> {
        match code {
            "new" => Some(QueryStatusCode::New),
            "waitContinuedQueryResponse" => Some(QueryStatusCode::WaitContinuedQueryResponse),
            "deliveredResponse" => Some(QueryStatusCode::DeliveredResponse),
            "aborted" => Some(QueryStatusCode::Aborted),
            _ => None,
        }
    }
}

/// Reads the `code` attribute of a coded element such as `<processingCode code="P"/>`.
pub(crate) fn read_code<T: CodedValue>(start: &ElementStart) -> Result<T> {
    T::parse_code(start.required_attribute("code")?)
}

macro_rules! display_as_code {
    ($($ty:ty),* $(,)?) => {
        $(
            impl fmt::Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(self.code())
                }
            }
        )*
    };
}

display_as_code!(
    ProcessingCode,
    ProcessingModeCode,
    AcceptAcknowledgementCode,
    AcknowledgementType,
    AcknowledgementDetailType,
    QueryResponseCode,
    QueryStatusCode,
);
