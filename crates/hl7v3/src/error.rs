//! Error types for HL7 v3 envelope construction, validation and XML I/O.
//!
//! Errors fall into three families that callers treat differently:
//!
//! | Family | Variant | Meaning |
//! |--------|---------|---------|
//! | Argument | [`Hl7Error::NullArgument`] | A required input is missing or empty |
//! | Structural | [`Hl7Error::Format`] | The envelope violates a protocol invariant |
//! | Internal | [`Hl7Error::InvalidOperation`] | The caller asked for something inconsistent |
//!
//! Codec failures (malformed XML, I/O, body (de)serialization) are reported
//! through their own variants and are surfaced as structural faults by the
//! formatter.

// Error enum variant fields are self-documenting via their #[error(...)] messages
#![allow(missing_docs)]

use thiserror::Error;

/// The primary error type for all HL7 v3 operations.
#[derive(Error, Debug)]
pub enum Hl7Error {
    /// A required argument was not supplied.
    #[error("argument `{name}` is required")]
    NullArgument { name: &'static str },

    /// The envelope violates a structural rule of the protocol.
    #[error(transparent)]
    Format(#[from] FormatError),

    /// The requested operation cannot be performed on the given input.
    #[error("invalid operation: {message}")]
    InvalidOperation { message: String },

    /// The XML stream could not be parsed or written.
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// IO error while reading or writing a stream.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The document contained text that is not valid UTF-8 or a bad escape.
    #[error("encoding error: {message}")]
    Encoding { message: String },

    /// A payload body could not be serialized to XML.
    #[error("failed to serialize payload body: {0}")]
    BodySerialization(#[from] quick_xml::se::SeError),

    /// A payload body could not be deserialized from XML.
    #[error("failed to deserialize payload body: {0}")]
    BodyDeserialization(#[from] quick_xml::de::DeError),
}

impl Hl7Error {
    /// Shorthand for an [`Hl7Error::InvalidOperation`].
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Hl7Error::InvalidOperation {
            message: message.into(),
        }
    }

    /// Returns `true` if this error is a structural protocol violation.
    pub fn is_format(&self) -> bool {
        matches!(self, Hl7Error::Format(_))
    }
}

impl From<quick_xml::escape::EscapeError> for Hl7Error {
    fn from(err: quick_xml::escape::EscapeError) -> Self {
        Hl7Error::Encoding {
            message: err.to_string(),
        }
    }
}

impl From<std::string::FromUtf8Error> for Hl7Error {
    fn from(err: std::string::FromUtf8Error) -> Self {
        Hl7Error::Encoding {
            message: err.to_string(),
        }
    }
}

/// Structural violations of the transmission wrapper rules.
///
/// Field names in messages use the protocol's own names (`QueryByParameterPayload`,
/// `QueryAcknowledgement`, ...) so a fault can be traced back to the offending
/// part of the envelope.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    /// A field that the variant requires is absent.
    #[error("{field} must be set")]
    MustBeSet { field: &'static str },

    /// A field that the variant forbids is present.
    #[error("{field} cannot be set in {context}")]
    CannotBeSet {
        field: &'static str,
        context: &'static str,
    },

    /// Too few reason codes on a control act.
    #[error("ControlAct requires at least {required} reason codes, found {found}")]
    ReasonCodeCardinality { required: usize, found: usize },

    /// Exactly one of two alternative fields must be present.
    #[error("exactly one of {first} or {second} must be set")]
    ExactlyOneOf {
        first: &'static str,
        second: &'static str,
    },

    /// A coded value carries the wrong code system.
    #[error("{field} must use code system {expected}, found {actual}")]
    CodeSystemMismatch {
        field: &'static str,
        expected: &'static str,
        actual: String,
    },

    /// The control act has the wrong shape for the variant.
    #[error("{variant} requires a {expected} control act, found {found}")]
    ControlActMismatch {
        variant: &'static str,
        expected: &'static str,
        found: &'static str,
    },

    /// The document names a different interaction than expected.
    #[error("expected interaction {expected}, found {found}")]
    InteractionMismatch { expected: String, found: String },

    /// An element appeared where another was expected.
    #[error("unexpected element <{found}>, expected <{expected}>")]
    UnexpectedElement { expected: String, found: String },

    /// A required element is missing.
    #[error("missing required element <{element}> in <{parent}>")]
    MissingElement { element: &'static str, parent: String },

    /// A required attribute is missing.
    #[error("missing required attribute `{attribute}` on <{element}>")]
    MissingAttribute {
        attribute: &'static str,
        element: String,
    },

    /// An attribute or text value could not be interpreted.
    #[error("invalid value `{value}` for {field}: {message}")]
    InvalidValue {
        field: &'static str,
        value: String,
        message: String,
    },

    /// A known element appeared after an element that must follow it.
    #[error("element <{element}> is out of order in <{parent}>")]
    OutOfOrder { element: String, parent: String },

    /// The document ended or was otherwise not well formed.
    #[error("malformed document: {message}")]
    Malformed { message: String },
}

impl FormatError {
    /// Builds a [`FormatError::Malformed`] with the given message.
    pub fn malformed(message: impl Into<String>) -> Self {
        FormatError::Malformed {
            message: message.into(),
        }
    }

    /// Builds a [`FormatError::InvalidValue`].
    pub fn invalid_value(
        field: &'static str,
        value: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        FormatError::InvalidValue {
            field,
            value: value.into(),
            message: message.into(),
        }
    }
}

/// Result type alias for HL7 v3 operations.
pub type Result<T> = std::result::Result<T, Hl7Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_error_messages_name_the_field() {
        let err = FormatError::CannotBeSet {
            field: "QueryByParameterPayload",
            context: "a response",
        };
        assert_eq!(
            err.to_string(),
            "QueryByParameterPayload cannot be set in a response"
        );

        let err = FormatError::MustBeSet {
            field: "QueryAcknowledgement",
        };
        assert_eq!(err.to_string(), "QueryAcknowledgement must be set");
    }

    #[test]
    fn test_format_errors_convert_into_hl7_error() {
        let err: Hl7Error = FormatError::ReasonCodeCardinality {
            required: 2,
            found: 1,
        }
        .into();
        assert!(err.is_format());
        assert!(err.to_string().contains("at least 2"));
    }

    #[test]
    fn test_null_argument_message() {
        let err = Hl7Error::NullArgument { name: "serializer" };
        assert_eq!(err.to_string(), "argument `serializer` is required");
        assert!(!err.is_format());
    }
}
