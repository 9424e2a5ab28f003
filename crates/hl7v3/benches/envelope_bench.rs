//! Envelope write/read throughput.

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use helios_hl7v3::{
    Device, Hl7Version, IdentificationId, Message, MessageControlAct, Request, Subject,
    TransmissionWrapper, XmlElement,
};

fn request_with_entries(entries: usize) -> Request {
    let mut body = String::from("<batch>");
    for i in 0..entries {
        body.push_str(&format!("<entry id=\"{i}\"><value>{i}</value></entry>"));
    }
    body.push_str("</batch>");

    let wrapper = TransmissionWrapper::new(
        "RCMR_IN000002UV01",
        Hl7Version::V2011,
        IdentificationId::generate("2.16.840.1.113883.19.1"),
        Device::sender("Bench"),
        Device::receiver("Sink"),
    );
    let subject = Subject::from_element(XmlElement::parse(&body).unwrap());
    let control_act = MessageControlAct::from_action("CREATE", "NEW").with_subject(subject);
    Request::build(wrapper, control_act).unwrap()
}

fn bench_envelope(c: &mut Criterion) {
    let mut group = c.benchmark_group("envelope");

    for entries in [1usize, 100, 1000] {
        let request = request_with_entries(entries);
        let xml = request.to_xml_string(false).unwrap();
        group.throughput(Throughput::Bytes(xml.len() as u64));

        group.bench_with_input(BenchmarkId::new("write", entries), &request, |b, request| {
            b.iter(|| black_box(request.to_xml_string(false).unwrap()))
        });

        group.bench_with_input(BenchmarkId::new("read_classify", entries), &xml, |b, xml| {
            b.iter(|| black_box(Message::from_xml_str(xml).unwrap()))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_envelope);
criterion_main!(benches);
