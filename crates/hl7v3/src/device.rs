//! Sending and receiving device identities.

use std::fmt;
use std::io::{BufRead, Write};

use crate::datatypes::{DEFAULT_DEVICE_ID_ROOT, IdentificationId};
use crate::error::{FormatError, Result};
use crate::xml::{ElementStart, XmlEventReader, XmlEventWriter};

/// The role a device plays in an exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceRole {
    /// `<sender typeCode="SND">`
    Sender,
    /// `<receiver typeCode="RCV">`
    Receiver,
}

impl DeviceRole {
    /// Name of the envelope element carrying a device in this role.
    pub fn element_name(&self) -> &'static str {
        match self {
            DeviceRole::Sender => "sender",
            DeviceRole::Receiver => "receiver",
        }
    }

    /// The participation type code.
    pub fn type_code(&self) -> &'static str {
        match self {
            DeviceRole::Sender => "SND",
            DeviceRole::Receiver => "RCV",
        }
    }

    fn from_element_name(name: &str) -> Option<Self> {
        match name {
            "sender" => Some(DeviceRole::Sender),
            "receiver" => Some(DeviceRole::Receiver),
            _ => None,
        }
    }
}

impl fmt::Display for DeviceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.element_name())
    }
}

/// A sending or receiving system.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Device {
    role: DeviceRole,
    id: IdentificationId,
}

impl Device {
    /// Creates a device with an explicit identifier.
    pub fn new(role: DeviceRole, id: IdentificationId) -> Self {
        Self { role, id }
    }

    /// A sender identified by `extension` under the default device root.
    pub fn sender(extension: impl Into<String>) -> Self {
        Self::new(
            DeviceRole::Sender,
            IdentificationId::new(DEFAULT_DEVICE_ID_ROOT, extension),
        )
    }

    /// A receiver identified by `extension` under the default device root.
    pub fn receiver(extension: impl Into<String>) -> Self {
        Self::new(
            DeviceRole::Receiver,
            IdentificationId::new(DEFAULT_DEVICE_ID_ROOT, extension),
        )
    }

    /// The same system in another role, e.g. a request's sender as the
    /// receiver of the reply.
    pub fn with_role(&self, role: DeviceRole) -> Self {
        Self {
            role,
            id: self.id.clone(),
        }
    }

    pub fn role(&self) -> DeviceRole {
        self.role
    }

    pub fn id(&self) -> &IdentificationId {
        &self.id
    }

    /// The device id extension, which names the system.
    pub fn extension(&self) -> Option<&str> {
        self.id.extension()
    }

    pub(crate) fn write<W: Write>(&self, writer: &mut XmlEventWriter<W>) -> Result<()> {
        let element = self.role.element_name();
        writer.start(element, &[("typeCode", self.role.type_code())])?;
        writer.start(
            "device",
            &[("classCode", "DEV"), ("determinerCode", "INSTANCE")],
        )?;
        self.id.write(writer, "id")?;
        writer.end("device")?;
        writer.end(element)
    }

    /// Reads a `sender`/`receiver` element whose start tag was consumed.
    pub(crate) fn read<R: BufRead>(
        reader: &mut XmlEventReader<R>,
        start: &ElementStart,
    ) -> Result<Self> {
        let role = DeviceRole::from_element_name(start.local_name()).ok_or_else(|| {
            FormatError::UnexpectedElement {
                expected: "sender or receiver".to_string(),
                found: start.name().to_string(),
            }
        })?;

        let mut id = None;
        if !start.is_empty() {
            while reader.peek_element()?.is_some() {
                let child = reader.open_element()?;
                if child.local_name() == "device" {
                    while reader.peek_element()?.is_some() {
                        let inner = reader.open_element()?;
                        if inner.local_name() == "id" && id.is_none() {
                            id = Some(IdentificationId::from_element(&inner)?);
                        }
                        reader.close_element(&inner)?;
                    }
                }
                reader.close_element(&child)?;
            }
        }
        reader.close_element(start)?;

        let id = id.ok_or_else(|| FormatError::MissingElement {
            element: "device/id",
            parent: start.name().to_string(),
        })?;
        Ok(Self { role, id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(device: &Device) -> Device {
        let mut writer = XmlEventWriter::new(Vec::new());
        device.write(&mut writer).unwrap();
        let xml = String::from_utf8(writer.into_inner()).unwrap();
        let mut reader = XmlEventReader::from_xml_str(&xml);
        let start = reader.open_element().unwrap();
        Device::read(&mut reader, &start).unwrap()
    }

    #[test]
    fn test_sender_and_receiver_round_trip() {
        let sender = Device::sender("Sender");
        assert_eq!(round_trip(&sender), sender);
        let receiver = Device::receiver("Receiver");
        assert_eq!(round_trip(&receiver), receiver);
        assert_eq!(receiver.extension(), Some("Receiver"));
    }

    #[test]
    fn test_with_role_keeps_identity() {
        let sender = Device::sender("Clinic");
        let receiver = sender.with_role(DeviceRole::Receiver);
        assert_eq!(receiver.role(), DeviceRole::Receiver);
        assert_eq!(receiver.id(), sender.id());
    }

    #[test]
    fn test_missing_device_id_is_rejected() {
        let mut reader = XmlEventReader::from_xml_str(
            "<sender typeCode=\"SND\"><device classCode=\"DEV\"/></sender>",
        );
        let start = reader.open_element().unwrap();
        let err = Device::read(&mut reader, &start).unwrap_err();
        assert!(err.is_format());
    }
}
