//! Accept- and application-level acknowledgements and query acknowledgements.

use std::io::{BufRead, Write};

use crate::codes::{
    AcknowledgementDetailType, AcknowledgementType, CodedValue, QueryResponseCode,
    QueryStatusCode, read_code,
};
use crate::datatypes::{ClassificatorId, IdentificationId};
use crate::error::{FormatError, Result};
use crate::xml::{ChildOrder, ElementStart, XmlEventReader, XmlEventWriter};

/// Code system of acknowledgement detail codes.
pub const ACKNOWLEDGEMENT_DETAIL_CODE_SYSTEM: &str = "2.16.840.1.113883.5.1100";

/// Acknowledgement of a previously received message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Acknowledgement {
    acknowledgement_type: AcknowledgementType,
    target_message: IdentificationId,
    details: Vec<AcknowledgementDetail>,
}

impl Acknowledgement {
    pub fn new(
        acknowledgement_type: AcknowledgementType,
        target_message: IdentificationId,
    ) -> Self {
        Self {
            acknowledgement_type,
            target_message,
            details: Vec::new(),
        }
    }

    pub fn with_detail(mut self, detail: AcknowledgementDetail) -> Self {
        self.details.push(detail);
        self
    }

    pub fn with_details(
        mut self,
        details: impl IntoIterator<Item = AcknowledgementDetail>,
    ) -> Self {
        self.details.extend(details);
        self
    }

    pub fn acknowledgement_type(&self) -> AcknowledgementType {
        self.acknowledgement_type
    }

    /// Identifier of the message being acknowledged.
    pub fn target_message(&self) -> &IdentificationId {
        &self.target_message
    }

    pub fn details(&self) -> &[AcknowledgementDetail] {
        &self.details
    }

    pub(crate) fn write<W: Write>(&self, writer: &mut XmlEventWriter<W>) -> Result<()> {
        writer.start(
            "acknowledgement",
            &[("typeCode", self.acknowledgement_type.code())],
        )?;
        writer.start("targetMessage", &[])?;
        self.target_message.write(writer, "id")?;
        writer.end("targetMessage")?;
        for detail in &self.details {
            detail.write(writer)?;
        }
        writer.end("acknowledgement")
    }

    pub(crate) fn read<R: BufRead>(
        reader: &mut XmlEventReader<R>,
        start: &ElementStart,
    ) -> Result<Self> {
        let acknowledgement_type =
            AcknowledgementType::parse_code(start.required_attribute("typeCode")?)?;
        let mut order = ChildOrder::new(
            start.name(),
            &["targetMessage", "acknowledgementDetail"],
            &["acknowledgementDetail"],
        );

        let mut target_message = None;
        let mut details = Vec::new();
        if !start.is_empty() {
            while reader.peek_element()?.is_some() {
                let child = reader.open_element()?;
                if !order.advance(child.local_name())? {
                    reader.skip_element(&child)?;
                    continue;
                }
                match child.local_name() {
                    "targetMessage" => {
                        while reader.peek_element()?.is_some() {
                            let inner = reader.open_element()?;
                            if inner.local_name() == "id" && target_message.is_none() {
                                target_message = Some(IdentificationId::from_element(&inner)?);
                            }
                            reader.close_element(&inner)?;
                        }
                        reader.close_element(&child)?;
                    }
                    _ => details.push(AcknowledgementDetail::read(reader, &child)?),
                }
            }
        }
        reader.close_element(start)?;

        let target_message = target_message.ok_or_else(|| FormatError::MissingElement {
            element: "targetMessage/id",
            parent: start.name().to_string(),
        })?;
        Ok(Self {
            acknowledgement_type,
            target_message,
            details,
        })
    }
}

/// A single issue reported in an acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AcknowledgementDetail {
    type_code: Option<AcknowledgementDetailType>,
    code: Option<ClassificatorId>,
    text: Option<String>,
    locations: Vec<String>,
}

impl AcknowledgementDetail {
    pub fn new(type_code: AcknowledgementDetailType) -> Self {
        Self {
            type_code: Some(type_code),
            ..Default::default()
        }
    }

    /// An error detail with a code from [`ACKNOWLEDGEMENT_DETAIL_CODE_SYSTEM`].
    pub fn error(code: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(AcknowledgementDetailType::Error)
            .with_code(ClassificatorId::new(code, ACKNOWLEDGEMENT_DETAIL_CODE_SYSTEM))
            .with_text(text)
    }

    pub fn with_code(mut self, code: ClassificatorId) -> Self {
        self.code = Some(code);
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Adds a location, e.g. an XPath to the offending element.
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.locations.push(location.into());
        self
    }

    pub fn type_code(&self) -> Option<AcknowledgementDetailType> {
        self.type_code
    }

    pub fn code(&self) -> Option<&ClassificatorId> {
        self.code.as_ref()
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn locations(&self) -> &[String] {
        &self.locations
    }

    fn write<W: Write>(&self, writer: &mut XmlEventWriter<W>) -> Result<()> {
        match self.type_code {
            Some(type_code) => {
                writer.start("acknowledgementDetail", &[("typeCode", type_code.code())])?
            }
            None => writer.start("acknowledgementDetail", &[])?,
        }
        if let Some(code) = &self.code {
            code.write(writer, "code")?;
        }
        if let Some(text) = &self.text {
            writer.text_element("text", text)?;
        }
        for location in &self.locations {
            writer.text_element("location", location)?;
        }
        writer.end("acknowledgementDetail")
    }

    fn read<R: BufRead>(reader: &mut XmlEventReader<R>, start: &ElementStart) -> Result<Self> {
        let type_code = start
            .attribute("typeCode")
            .map(AcknowledgementDetailType::parse_code)
            .transpose()?;
        let mut detail = Self {
            type_code,
            ..Default::default()
        };
        if start.is_empty() {
            return Ok(detail);
        }

        let mut order = ChildOrder::new(start.name(), &["code", "text", "location"], &["location"]);
        while reader.peek_element()?.is_some() {
            let child = reader.open_element()?;
            if !order.advance(child.local_name())? {
                reader.skip_element(&child)?;
                continue;
            }
            match child.local_name() {
                "code" => {
                    detail.code = Some(ClassificatorId::from_element(&child)?);
                    reader.close_element(&child)?;
                }
                "text" => detail.text = Some(reader.read_text(&child)?),
                _ => detail.locations.push(reader.read_text(&child)?),
            }
        }
        reader.close_element(start)?;
        Ok(detail)
    }
}

/// Outcome of a query, carried in a query response's control act.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryAcknowledgement {
    query_id: Option<IdentificationId>,
    status_code: Option<QueryStatusCode>,
    query_response_code: QueryResponseCode,
    result_total_quantity: Option<u32>,
    result_current_quantity: Option<u32>,
    result_remaining_quantity: Option<u32>,
}

impl QueryAcknowledgement {
    pub fn new(query_response_code: QueryResponseCode) -> Self {
        Self {
            query_id: None,
            status_code: None,
            query_response_code,
            result_total_quantity: None,
            result_current_quantity: None,
            result_remaining_quantity: None,
        }
    }

    pub fn with_query_id(mut self, query_id: IdentificationId) -> Self {
        self.query_id = Some(query_id);
        self
    }

    pub fn with_status_code(mut self, status_code: QueryStatusCode) -> Self {
        self.status_code = Some(status_code);
        self
    }

    /// Sets the total, current and remaining result counts.
    pub fn with_quantities(mut self, total: u32, current: u32, remaining: u32) -> Self {
        self.result_total_quantity = Some(total);
        self.result_current_quantity = Some(current);
        self.result_remaining_quantity = Some(remaining);
        self
    }

    pub fn query_id(&self) -> Option<&IdentificationId> {
        self.query_id.as_ref()
    }

    pub fn status_code(&self) -> Option<QueryStatusCode> {
        self.status_code
    }

    pub fn query_response_code(&self) -> QueryResponseCode {
        self.query_response_code
    }

    pub fn result_total_quantity(&self) -> Option<u32> {
        self.result_total_quantity
    }

    pub fn result_current_quantity(&self) -> Option<u32> {
        self.result_current_quantity
    }

    pub fn result_remaining_quantity(&self) -> Option<u32> {
        self.result_remaining_quantity
    }

    pub(crate) fn write<W: Write>(&self, writer: &mut XmlEventWriter<W>) -> Result<()> {
        writer.start("queryAck", &[])?;
        if let Some(query_id) = &self.query_id {
            query_id.write(writer, "queryId")?;
        }
        if let Some(status_code) = self.status_code {
            writer.empty("statusCode", &[("code", status_code.code())])?;
        }
        writer.empty(
            "queryResponseCode",
            &[("code", self.query_response_code.code())],
        )?;
        for (name, quantity) in [
            ("resultTotalQuantity", self.result_total_quantity),
            ("resultCurrentQuantity", self.result_current_quantity),
            ("resultRemainingQuantity", self.result_remaining_quantity),
        ] {
            if let Some(quantity) = quantity {
                writer.empty(name, &[("value", quantity.to_string().as_str())])?;
            }
        }
        writer.end("queryAck")
    }

    pub(crate) fn read<R: BufRead>(
        reader: &mut XmlEventReader<R>,
        start: &ElementStart,
    ) -> Result<Self> {
        const SEQUENCE: &[&str] = &[
            "queryId",
            "statusCode",
            "queryResponseCode",
            "resultTotalQuantity",
            "resultCurrentQuantity",
            "resultRemainingQuantity",
        ];
        let mut order = ChildOrder::new(start.name(), SEQUENCE, &[]);

        let mut query_id = None;
        let mut status_code = None;
        let mut query_response_code = None;
        let mut quantities = [None; 3];
        if !start.is_empty() {
            while reader.peek_element()?.is_some() {
                let child = reader.open_element()?;
                if order.advance(child.local_name())? {
                    match child.local_name() {
                        "queryId" => query_id = Some(IdentificationId::from_element(&child)?),
                        "statusCode" => status_code = Some(read_code(&child)?),
                        "queryResponseCode" => query_response_code = Some(read_code(&child)?),
                        "resultTotalQuantity" => quantities[0] = Some(read_quantity(&child)?),
                        "resultCurrentQuantity" => quantities[1] = Some(read_quantity(&child)?),
                        _ => quantities[2] = Some(read_quantity(&child)?),
                    }
                }
                reader.close_element(&child)?;
            }
        }
        reader.close_element(start)?;

        let query_response_code = query_response_code.ok_or_else(|| FormatError::MissingElement {
            element: "queryResponseCode",
            parent: start.name().to_string(),
        })?;
        Ok(Self {
            query_id,
            status_code,
            query_response_code,
            result_total_quantity: quantities[0],
            result_current_quantity: quantities[1],
            result_remaining_quantity: quantities[2],
        })
    }
}

fn read_quantity(start: &ElementStart) -> Result<u32> {
    let value = start.required_attribute("value")?;
    value
        .parse()
        .map_err(|e: std::num::ParseIntError| {
            FormatError::invalid_value("result quantity", value, e.to_string()).into()
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn to_xml(f: impl FnOnce(&mut XmlEventWriter<Vec<u8>>) -> Result<()>) -> String {
        let mut writer = XmlEventWriter::new(Vec::new());
        f(&mut writer).unwrap();
        String::from_utf8(writer.into_inner()).unwrap()
    }

    #[test]
    fn test_acknowledgement_round_trip() {
        let ack = Acknowledgement::new(
            AcknowledgementType::ApplicationAcknowledgementError,
            IdentificationId::new("1.2.3", "msg-1"),
        )
        .with_detail(
            AcknowledgementDetail::error("SYN", "bad <element>")
                .with_location("/RCMR_IN000002UV01/controlActProcess"),
        );
        let xml = to_xml(|w| ack.write(w));
        let head = "<acknowledgement typeCode=\"AE\"><targetMessage>";
        assert!(xml.starts_with(head));
        assert!(xml.contains("<id root=\"1.2.3\" extension=\"msg-1\"/>"));

        let mut reader = XmlEventReader::from_xml_str(&xml);
        let start = reader.open_element().unwrap();
        let read = Acknowledgement::read(&mut reader, &start).unwrap();
        assert_eq!(read, ack);
        assert_eq!(read.details()[0].text(), Some("bad <element>"));
    }

    #[test]
    fn test_acknowledgement_requires_target_message() {
        let mut reader = XmlEventReader::from_xml_str("<acknowledgement typeCode=\"CA\"/>");
        let start = reader.open_element().unwrap();
        let err = Acknowledgement::read(&mut reader, &start).unwrap_err();
        assert!(err.to_string().contains("targetMessage"));
    }

    #[test]
    fn test_acknowledgement_rejects_unknown_type_code() {
        let mut reader = XmlEventReader::from_xml_str(
            "<acknowledgement typeCode=\"XX\"><targetMessage><id root=\"1\"/></targetMessage></acknowledgement>",
        );
        let start = reader.open_element().unwrap();
        assert!(Acknowledgement::read(&mut reader, &start).unwrap_err().is_format());
    }

    #[test]
    fn test_query_acknowledgement_round_trip() {
        let query_ack = QueryAcknowledgement::new(QueryResponseCode::Ok)
            .with_query_id(IdentificationId::new("1.2.3", "q-9"))
            .with_status_code(QueryStatusCode::DeliveredResponse)
            .with_quantities(25, 10, 15);
        let xml = to_xml(|w| query_ack.write(w));
        let mut reader = XmlEventReader::from_xml_str(&xml);
        let start = reader.open_element().unwrap();
        assert_eq!(QueryAcknowledgement::read(&mut reader, &start).unwrap(), query_ack);
    }

    #[test]
    fn test_query_acknowledgement_rejects_bad_quantity() {
        let mut reader = XmlEventReader::from_xml_str(
            "<queryAck><queryResponseCode code=\"OK\"/><resultTotalQuantity value=\"many\"/></queryAck>",
        );
        let start = reader.open_element().unwrap();
        assert!(QueryAcknowledgement::read(&mut reader, &start).unwrap_err().is_format());
    }
}
