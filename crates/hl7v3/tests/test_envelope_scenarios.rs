//! End-to-end envelope scenarios: build, write, read back and classify.

use helios_hl7v3::{
    Acknowledgement, AcknowledgementType, ClassificatorId, ControlAct, Device, FormatError,
    Hl7Error, Hl7Timestamp, Hl7Version, IdentificationId, Message, MessageControlAct, MessageKind,
    QueryAcknowledgement, QueryByParameterPayload, QueryControlAcknowledgement, QueryResponseCode,
    Request, RequestType, Subject, TransmissionWrapper,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CareRecord {
    #[serde(rename = "@classCode")]
    class_code: String,
    patient_id: String,
    summary: String,
}

fn record() -> CareRecord {
    CareRecord {
        class_code: "DOCCLIN".to_string(),
        patient_id: "p-77".to_string(),
        summary: "Follow-up in two weeks & review <labs>".to_string(),
    }
}

fn envelope(interaction: &str) -> TransmissionWrapper {
    TransmissionWrapper::new(
        interaction,
        Hl7Version::V2011,
        IdentificationId::new("2.16.840.1.113883.19.1", "msg-100"),
        Device::sender("ClinicEHR"),
        Device::receiver("RegionalHub"),
    )
    .with_creation_time(Hl7Timestamp::parse("20240301101500").unwrap())
}

#[test]
fn test_message_request_round_trip() {
    let control_act = MessageControlAct::from_action("CREATE", "NEW")
        .with_code(ClassificatorId::new("RCMR_TE000002UV01", "2.16.840.1.113883.1.18"))
        .with_subject(Subject::new(record()));
    let request = Request::build(envelope("RCMR_IN000002UV01"), control_act).unwrap();
    assert_eq!(request.request_type(), RequestType::MessageRequest);

    let xml = request.to_xml_string(true).unwrap();
    assert!(xml.contains("<subject typeCode=\"SUBJ\">"));
    assert!(xml.contains("&amp;"));

    let message = Message::from_xml_str(&xml).unwrap();
    assert_eq!(message.kind(), MessageKind::Request);

    let wrapper = message.wrapper();
    assert_eq!(wrapper.id(), request.id());
    assert_eq!(wrapper.creation_time().format(), "20240301101500");
    assert_eq!(wrapper.sender().extension(), Some("ClinicEHR"));

    let core = wrapper.control_act().unwrap().core();
    assert_eq!(core.code().unwrap().code(), "RCMR_TE000002UV01");
    let subject = core.subject().unwrap();
    assert_eq!(subject.element_name(), "CareRecord");
    assert_eq!(subject.body::<CareRecord>().unwrap(), record());
}

#[test]
fn test_integer_subject_request_round_trip() -> Result<(), Hl7Error> {
    let wrapper = TransmissionWrapper::new(
        "RCMR_IN000002UV01",
        Hl7Version::V2011,
        IdentificationId::generate("2.16.840.1.113883.19.1"),
        Device::sender("Sender"),
        Device::receiver("Receiver"),
    );
    let control_act =
        MessageControlAct::from_action("CREATE", "NEW").with_subject(Subject::new(42i32));
    let request = Request::build(wrapper, control_act)?;
    assert_eq!(request.request_type(), RequestType::MessageRequest);

    let parsed = TransmissionWrapper::from_xml_str(&request.to_xml_string(true)?)?;
    let read = Request::try_from(parsed)?;
    assert_eq!(read.request_type(), RequestType::MessageRequest);
    assert_eq!(read.sender().extension(), Some("Sender"));
    assert_eq!(read.receiver().extension(), Some("Receiver"));

    let subject = read
        .control_act()
        .and_then(|act| act.core().subject())
        .ok_or(FormatError::MustBeSet { field: "Subject" })?;
    assert_eq!(subject.element_name(), "i32");
    assert_eq!(subject.body::<i32>()?, 42);
    Ok(())
}

#[test]
fn test_acknowledgement_only_reply() {
    let reply = envelope("MCCI_IN000006UV01").with_acknowledgement(Acknowledgement::new(
        AcknowledgementType::AcceptAcknowledgementCommitAccept,
        IdentificationId::new("2.16.840.1.113883.19.1", "msg-99"),
    ));
    let xml = reply.to_xml_string(false).unwrap();
    assert!(!xml.contains("controlActProcess"));

    let message = Message::from_xml_str(&xml).unwrap();
    assert_eq!(message.kind(), MessageKind::AcknowledgementResponse);
    let ack = message.wrapper().acknowledgement().unwrap();
    assert_eq!(ack.acknowledgement_type().to_string(), "CA");
    assert_eq!(ack.target_message().extension(), Some("msg-99"));
}

#[test]
fn test_query_request_and_response_round_trip() {
    let query = QueryControlAcknowledgement::from_action("QUERY", "FIND").with_query_by_parameter(
        QueryByParameterPayload::new(record()),
    );
    let request = Request::build(envelope("PRPA_IN201305UV02"), query).unwrap();
    assert_eq!(request.request_type(), RequestType::QueryRequest);

    let read = Message::from_xml_str(&request.to_xml_string(false).unwrap()).unwrap();
    match read.wrapper().control_act() {
        Some(ControlAct::Query(query)) => {
            let payload = query.query_by_parameter().unwrap();
            assert_eq!(payload.element_name(), "queryByParameter");
            assert_eq!(payload.body::<CareRecord>().unwrap(), record());
        }
        other => panic!("expected a query control act, got {:?}", other),
    }

    let results = QueryControlAcknowledgement::from_action("QUERY", "FOUND")
        .with_subject(Subject::new(record()))
        .with_query_acknowledgement(
            QueryAcknowledgement::new(QueryResponseCode::Ok).with_quantities(1, 1, 0),
        );
    let response = envelope("PRPA_IN201306UV02")
        .with_acknowledgement(Acknowledgement::new(
            AcknowledgementType::ApplicationAcknowledgementAccept,
            request.id().clone(),
        ))
        .with_control_act(results);
    let message = Message::from_xml_str(&response.to_xml_string(false).unwrap()).unwrap();
    assert_eq!(message.kind(), MessageKind::QueryApplicationResponse);
    let query = message.wrapper().control_act().unwrap().as_query().unwrap();
    assert_eq!(query.query_acknowledgement().unwrap().result_total_quantity(), Some(1));
}

#[test]
fn test_request_with_acknowledgement_is_rejected() {
    let xml = envelope("RCMR_IN000002UV01")
        .with_acknowledgement(Acknowledgement::new(
            AcknowledgementType::ApplicationAcknowledgementAccept,
            IdentificationId::new("1.2.3", "x"),
        ))
        .with_control_act(MessageControlAct::from_action("A", "B"))
        .to_xml_string(false)
        .unwrap();
    let wrapper = TransmissionWrapper::from_xml_str(&xml).unwrap();
    let err = Request::try_from(wrapper).unwrap_err();
    assert!(matches!(
        err,
        Hl7Error::Format(FormatError::CannotBeSet { field: "Acknowledgement", .. })
    ));
}

#[test]
fn test_prefixed_payload_gets_namespace_declaration() {
    let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<hl7:RCMR_IN000002UV01 xmlns:hl7="urn:hl7-org:v3" xmlns:ext="urn:example:ext" ITSVersion="XML_1.0">
  <hl7:id root="2.16.840.1.113883.19.1" extension="msg-5"/>
  <hl7:creationTime value="20240301101500"/>
  <hl7:versionCode code="V3-2006N"/>
  <hl7:interactionId root="2.16.840.1.113883.1.6" extension="RCMR_IN000002UV01"/>
  <hl7:processingCode code="T"/>
  <hl7:acceptAckCode code="AL"/>
  <hl7:receiver typeCode="RCV"><hl7:device classCode="DEV" determinerCode="INSTANCE"><hl7:id root="2.16.840.1.113883.19.2" extension="Hub"/></hl7:device></hl7:receiver>
  <hl7:sender typeCode="SND"><hl7:device classCode="DEV" determinerCode="INSTANCE"><hl7:id root="2.16.840.1.113883.19.2" extension="EHR"/></hl7:device></hl7:sender>
  <hl7:controlActProcess classCode="CACT" moodCode="EVN">
    <hl7:reasonCode code="CREATE" codeSystem="2.16.840.1.113883.5.4"/>
    <hl7:reasonCode code="NEW" codeSystem="2.16.840.1.113883.5.8"/>
    <hl7:subject typeCode="SUBJ">
      <ext:note><ext:text>hello</ext:text></ext:note>
    </hl7:subject>
  </hl7:controlActProcess>
</hl7:RCMR_IN000002UV01>"#;

    let message = Message::from_xml_str(xml).unwrap();
    assert_eq!(message.kind(), MessageKind::Request);
    assert_eq!(message.wrapper().version(), Hl7Version::V2006);

    let subject = message.wrapper().control_act().unwrap().core().subject().unwrap();
    let captured = subject.captured().unwrap();
    assert_eq!(captured.name(), "ext:note");
    assert!(captured.as_str().contains("xmlns:ext=\"urn:example:ext\""));
    assert_eq!(subject.root_name().namespace(), Some("urn:example:ext"));

    let rewritten = message.wrapper().to_xml_string(false).unwrap();
    let reread = Message::from_xml_str(&rewritten).unwrap();
    assert_eq!(reread.wrapper().id(), message.wrapper().id());
}
