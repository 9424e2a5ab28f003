//! Narrowing rules of each envelope variant.

use helios_hl7v3::{
    Acknowledgement, AcknowledgementResponse, AcknowledgementType, ApplicationResponse, Device,
    FormatError, Hl7Error, Hl7Version, IdentificationId, Message, MessageControlAct, MessageKind,
    QueryAcknowledgement, QueryAcknowledgementResponse, QueryApplicationResponse,
    QueryByParameterPayload, QueryContinuation, QueryControlAcknowledgement, QueryResponseCode,
    Request, RequestType, Subject, TransmissionWrapper, XmlElement,
};

fn wrapper() -> TransmissionWrapper {
    TransmissionWrapper::new(
        "QUPA_IN101101UV01",
        Hl7Version::V2011,
        IdentificationId::new("1.2.3", "m-1"),
        Device::sender("Sender"),
        Device::receiver("Receiver"),
    )
}

fn ack() -> Acknowledgement {
    Acknowledgement::new(
        AcknowledgementType::ApplicationAcknowledgementAccept,
        IdentificationId::new("1.2.3", "m-0"),
    )
}

fn element(xml: &str) -> XmlElement {
    XmlElement::parse(xml).unwrap()
}

fn parameters() -> QueryByParameterPayload {
    QueryByParameterPayload::from_element(element(
        "<queryByParameter><queryId root=\"1\"/></queryByParameter>",
    ))
}

fn continuation() -> QueryContinuation {
    QueryContinuation::from_element(element(
        "<queryContinuation><continuationQuantity value=\"10\"/></queryContinuation>",
    ))
}

fn subject() -> Subject {
    Subject::from_element(element("<observation><value>7</value></observation>"))
}

fn query_ack() -> QueryAcknowledgement {
    QueryAcknowledgement::new(QueryResponseCode::Ok)
}

fn format_error(err: Hl7Error) -> FormatError {
    match err {
        Hl7Error::Format(e) => e,
        other => panic!("expected a format error, got {other}"),
    }
}

#[test]
fn test_request_requires_control_act() {
    let err = format_error(Request::try_from(wrapper()).unwrap_err());
    assert_eq!(err, FormatError::MustBeSet { field: "ControlAct" });
}

#[test]
fn test_request_requires_two_reason_codes() {
    let err = format_error(Request::build(wrapper(), MessageControlAct::new()).unwrap_err());
    assert_eq!(
        err,
        FormatError::ReasonCodeCardinality {
            required: 2,
            found: 0
        }
    );
}

#[test]
fn test_query_request_types() {
    let by_parameter =
        QueryControlAcknowledgement::from_action("Q", "R").with_query_by_parameter(parameters());
    let request = Request::build(wrapper(), by_parameter).unwrap();
    assert_eq!(request.request_type(), RequestType::QueryRequest);

    let next_page =
        QueryControlAcknowledgement::from_action("Q", "R").with_query_continuation(continuation());
    let request = Request::build(wrapper(), next_page).unwrap();
    assert_eq!(request.request_type(), RequestType::QueryContinuationRequest);
}

#[test]
fn test_query_request_needs_exactly_one_query_payload() {
    let neither = QueryControlAcknowledgement::from_action("Q", "R");
    let err = format_error(Request::build(wrapper(), neither).unwrap_err());
    assert!(matches!(err, FormatError::ExactlyOneOf { .. }));

    let both = QueryControlAcknowledgement::from_action("Q", "R")
        .with_query_by_parameter(parameters())
        .with_query_continuation(continuation());
    let err = format_error(Request::build(wrapper(), both).unwrap_err());
    assert!(matches!(err, FormatError::ExactlyOneOf { .. }));
}

#[test]
fn test_query_request_forbids_response_fields() {
    let with_subject = QueryControlAcknowledgement::from_action("Q", "R")
        .with_query_by_parameter(parameters())
        .with_subject(subject());
    let err = format_error(Request::build(wrapper(), with_subject).unwrap_err());
    assert!(matches!(err, FormatError::CannotBeSet { field: "Subject", .. }));

    let with_ack = QueryControlAcknowledgement::from_action("Q", "R")
        .with_query_by_parameter(parameters())
        .with_query_acknowledgement(query_ack());
    let err = format_error(Request::build(wrapper(), with_ack).unwrap_err());
    assert!(matches!(err, FormatError::CannotBeSet { field: "QueryAcknowledgement", .. }));

    let query =
        QueryControlAcknowledgement::from_action("Q", "R").with_query_by_parameter(parameters());
    let err = format_error(Request::build(wrapper().with_sequence_number(3), query).unwrap_err());
    assert!(matches!(err, FormatError::CannotBeSet { field: "SequenceNumber", .. }));
}

#[test]
fn test_message_request_allows_sequence_number() {
    let request = Request::build(
        wrapper().with_sequence_number(3),
        MessageControlAct::from_action("A", "B"),
    )
    .unwrap();
    assert_eq!(request.sequence_number(), Some(3));
}

#[test]
fn test_acknowledgement_response_tolerates_missing_acknowledgement() {
    let response = AcknowledgementResponse::try_from(wrapper()).unwrap();
    assert!(response.acknowledgement().is_none());
}

#[test]
fn test_application_response_rules() {
    let control_act = MessageControlAct::from_action("A", "B");
    let response = ApplicationResponse::build(wrapper(), ack(), control_act).unwrap();
    assert!(response.control_act().unwrap().as_message().is_some());

    let unacknowledged = wrapper().with_control_act(MessageControlAct::from_action("A", "B"));
    let err = format_error(ApplicationResponse::try_from(unacknowledged).unwrap_err());
    assert_eq!(err, FormatError::MustBeSet { field: "Acknowledgement" });

    let query = QueryControlAcknowledgement::from_action("Q", "R");
    let err = format_error(
        ApplicationResponse::try_from(wrapper().with_acknowledgement(ack()).with_control_act(query))
            .unwrap_err(),
    );
    assert!(matches!(err, FormatError::ControlActMismatch { .. }));

    let err = format_error(
        ApplicationResponse::build(wrapper(), ack(), MessageControlAct::new()).unwrap_err(),
    );
    assert!(matches!(err, FormatError::ReasonCodeCardinality { .. }));
}

#[test]
fn test_query_application_response_rules() {
    let valid = || {
        QueryControlAcknowledgement::from_action("Q", "R")
            .with_subject(subject())
            .with_query_acknowledgement(query_ack())
    };
    assert!(QueryApplicationResponse::build(wrapper(), ack(), valid()).is_ok());

    let with_parameters = valid().with_query_by_parameter(parameters());
    let result = QueryApplicationResponse::build(wrapper(), ack(), with_parameters);
    let err = format_error(result.unwrap_err());
    assert!(matches!(err, FormatError::CannotBeSet { field: "QueryByParameterPayload", .. }));

    let sequenced = wrapper().with_sequence_number(1);
    let err = format_error(QueryApplicationResponse::build(sequenced, ack(), valid()).unwrap_err());
    assert!(matches!(err, FormatError::CannotBeSet { field: "SequenceNumber", .. }));

    let no_subject =
        QueryControlAcknowledgement::from_action("Q", "R").with_query_acknowledgement(query_ack());
    let err =
        format_error(QueryApplicationResponse::build(wrapper(), ack(), no_subject).unwrap_err());
    assert_eq!(err, FormatError::MustBeSet { field: "Subject" });

    let no_query_ack = QueryControlAcknowledgement::from_action("Q", "R").with_subject(subject());
    let err =
        format_error(QueryApplicationResponse::build(wrapper(), ack(), no_query_ack).unwrap_err());
    assert_eq!(err, FormatError::MustBeSet { field: "QueryAcknowledgement" });
}

#[test]
fn test_query_acknowledgement_response_rules() {
    let query = QueryControlAcknowledgement::new().with_query_acknowledgement(query_ack());
    assert!(QueryAcknowledgementResponse::build(wrapper(), ack(), query).is_ok());

    let empty = QueryControlAcknowledgement::new();
    let err =
        format_error(QueryAcknowledgementResponse::build(wrapper(), ack(), empty).unwrap_err());
    assert_eq!(err, FormatError::MustBeSet { field: "QueryAcknowledgement" });
}

#[test]
fn test_classification_table() {
    let cases = [
        (
            wrapper().with_control_act(MessageControlAct::from_action("A", "B")),
            MessageKind::Request,
        ),
        (wrapper().with_acknowledgement(ack()), MessageKind::AcknowledgementResponse),
        (
            wrapper()
                .with_acknowledgement(ack())
                .with_control_act(MessageControlAct::from_action("A", "B")),
            MessageKind::ApplicationResponse,
        ),
        (
            wrapper().with_acknowledgement(ack()).with_control_act(
                QueryControlAcknowledgement::new()
                    .with_subject(subject())
                    .with_query_acknowledgement(query_ack()),
            ),
            MessageKind::QueryApplicationResponse,
        ),
        (
            wrapper()
                .with_acknowledgement(ack())
                .with_control_act(
                    QueryControlAcknowledgement::new().with_query_acknowledgement(query_ack()),
                ),
            MessageKind::QueryAcknowledgementResponse,
        ),
    ];

    for (wrapper, expected) in cases {
        let message = Message::classify(wrapper).unwrap();
        assert_eq!(message.kind(), expected);
        assert_eq!(message.is_response(), expected != MessageKind::Request);
    }
}
