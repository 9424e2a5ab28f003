//! Identifier and value types of the transmission wrapper.
//!
//! These are small value objects that are freely cloned between envelopes:
//! instance identifiers (`root` OID + `extension`), coded values bound to a
//! code system, timestamps in HL7 `TS` format and the protocol version.

use std::fmt;
use std::io::Write;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Timelike, Utc};
use uuid::Uuid;

use crate::error::{FormatError, Hl7Error, Result};
use crate::xml::{ElementStart, XmlEventWriter};

/// OID under which HL7 interaction identifiers are registered.
pub const HL7_INTERACTION_ROOT: &str = "2.16.840.1.113883.1.6";

/// Code system of the action code carried as the first reason code.
pub const ACTION_CODE_SYSTEM: &str = "2.16.840.1.113883.5.4";

/// Code system of the reason code carried as the second reason code.
pub const REASON_CODE_SYSTEM: &str = "2.16.840.1.113883.5.8";

/// Code system every control act `languageCode` must use.
pub const LANGUAGE_CODE_SYSTEM: &str = "2.16.840.1.113883.6.121";

/// Code system every control act `priorityCode` must use.
pub const PRIORITY_CODE_SYSTEM: &str = "2.16.840.1.113883.5.7";

/// Default root OID for generated message identifiers.
pub const DEFAULT_MESSAGE_ID_ROOT: &str = "2.16.840.1.113883.19.1";

/// Default root OID for device identifiers.
pub const DEFAULT_DEVICE_ID_ROOT: &str = "2.16.840.1.113883.19.2";

/// Protocol edition an envelope is written against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Hl7Version {
    /// Normative edition 2006.
    V2006,
    /// Normative edition 2011.
    #[default]
    V2011,
}

impl Hl7Version {
    /// The `versionCode` written on the envelope.
    pub fn version_code(&self) -> &'static str {
        match self {
            Hl7Version::V2006 => "V3-2006N",
            Hl7Version::V2011 => "V3-2011N",
        }
    }

    /// Maps a `versionCode` back to a version.
    pub fn from_version_code(code: &str) -> Option<Self> {
        match code {
            "V3-2006N" => Some(Hl7Version::V2006),
            "V3-2011N" => Some(Hl7Version::V2011),
            _ => None,
        }
    }
}

impl fmt::Display for Hl7Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Hl7Version::V2006 => write!(f, "2006"),
            Hl7Version::V2011 => write!(f, "2011"),
        }
    }
}

impl FromStr for Hl7Version {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "2006" => Ok(Hl7Version::V2006),
            "2011" => Ok(Hl7Version::V2011),
            other => Hl7Version::from_version_code(other)
                .ok_or_else(|| format!("unsupported HL7 v3 version: {}", other)),
        }
    }
}

/// Template identifier marking which interaction schema an envelope follows.
///
/// Built as `urn:hl7-org:v3:<interaction>:<versionCode>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TemplateId(String);

impl TemplateId {
    /// Wraps an existing template URN.
    pub fn new(urn: impl Into<String>) -> Self {
        Self(urn.into())
    }

    /// Builds the template URN for an interaction.
    pub fn for_interaction(interaction: &str, version: Hl7Version) -> Self {
        Self(format!(
            "urn:hl7-org:v3:{}:{}",
            interaction,
            version.version_code()
        ))
    }

    /// The URN text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TemplateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An HL7 instance identifier (`II`): a root OID plus an optional extension.
///
/// Used for message ids, acknowledged message references, device ids and
/// query ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdentificationId {
    root: String,
    extension: Option<String>,
}

impl IdentificationId {
    /// Creates an identifier from its parts.
    pub fn new(root: impl Into<String>, extension: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            extension: Some(extension.into()),
        }
    }

    /// Creates an identifier that consists of a root only.
    pub fn root_only(root: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            extension: None,
        }
    }

    /// Generates a fresh message identifier: a random UUID under `root`.
    pub fn generate(root: impl Into<String>) -> Self {
        Self::new(root, Uuid::new_v4().to_string())
    }

    /// The root OID.
    pub fn root(&self) -> &str {
        &self.root
    }

    /// The extension, if any.
    pub fn extension(&self) -> Option<&str> {
        self.extension.as_deref()
    }

    /// Returns `true` if a non-empty extension is present.
    pub fn has_extension(&self) -> bool {
        self.extension.as_deref().is_some_and(|e| !e.is_empty())
    }

    pub(crate) fn from_element(start: &ElementStart) -> Result<Self> {
        let root = start.required_attribute("root")?.to_string();
        Ok(Self {
            root,
            extension: start.attribute("extension").map(str::to_string),
        })
    }

    pub(crate) fn write<W: Write>(&self, writer: &mut XmlEventWriter<W>, name: &str) -> Result<()> {
        match &self.extension {
            Some(extension) => writer.empty(
                name,
                &[("root", self.root.as_str()), ("extension", extension.as_str())],
            ),
            None => writer.empty(name, &[("root", self.root.as_str())]),
        }
    }
}

impl fmt::Display for IdentificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.extension {
            Some(extension) => write!(f, "{}^{}", self.root, extension),
            None => f.write_str(&self.root),
        }
    }
}

/// Identifier of the interaction an envelope carries.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InteractionId {
    root: String,
    extension: String,
}

impl InteractionId {
    /// Creates an interaction id under the HL7 interaction root.
    pub fn new(extension: impl Into<String>) -> Self {
        Self {
            root: HL7_INTERACTION_ROOT.to_string(),
            extension: extension.into(),
        }
    }

    /// The interaction name, e.g. `RCMR_IN000002UV01`.
    pub fn as_str(&self) -> &str {
        &self.extension
    }

    /// The root OID.
    pub fn root(&self) -> &str {
        &self.root
    }

    pub(crate) fn from_element(start: &ElementStart) -> Result<Self> {
        Ok(Self {
            root: start.required_attribute("root")?.to_string(),
            extension: start.required_attribute("extension")?.to_string(),
        })
    }

    pub(crate) fn write<W: Write>(&self, writer: &mut XmlEventWriter<W>) -> Result<()> {
        writer.empty(
            "interactionId",
            &[("root", self.root.as_str()), ("extension", self.extension.as_str())],
        )
    }
}

impl fmt::Display for InteractionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.extension)
    }
}

/// A coded value bound to a code system (`CD`/`CE`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClassificatorId {
    code: String,
    code_system: String,
    display_name: Option<String>,
}

impl ClassificatorId {
    /// Creates a coded value.
    pub fn new(code: impl Into<String>, code_system: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            code_system: code_system.into(),
            display_name: None,
        }
    }

    /// Attaches a human readable display name.
    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    /// The code.
    pub fn code(&self) -> &str {
        &self.code
    }

    /// The code system OID.
    pub fn code_system(&self) -> &str {
        &self.code_system
    }

    /// The display name, if any.
    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    pub(crate) fn from_element(start: &ElementStart) -> Result<Self> {
        Ok(Self {
            code: start.required_attribute("code")?.to_string(),
            code_system: start.required_attribute("codeSystem")?.to_string(),
            display_name: start.attribute("displayName").map(str::to_string),
        })
    }

    pub(crate) fn write<W: Write>(&self, writer: &mut XmlEventWriter<W>, name: &str) -> Result<()> {
        let mut attributes = vec![
            ("code", self.code.as_str()),
            ("codeSystem", self.code_system.as_str()),
        ];
        if let Some(display_name) = &self.display_name {
            attributes.push(("displayName", display_name.as_str()));
        }
        writer.empty(name, &attributes)
    }
}

impl fmt::Display for ClassificatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.code, self.code_system)
    }
}

/// Checks that `value` uses `expected` as its code system.
fn check_code_system(
    field: &'static str,
    expected: &'static str,
    value: &ClassificatorId,
) -> Result<()> {
    if value.code_system != expected {
        return Err(FormatError::CodeSystemMismatch {
            field,
            expected,
            actual: value.code_system.clone(),
        }
        .into());
    }
    Ok(())
}

/// A control act language code, always in [`LANGUAGE_CODE_SYSTEM`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LanguageCode(ClassificatorId);

impl LanguageCode {
    /// Creates a language code in the fixed code system.
    pub fn new(code: impl Into<String>) -> Self {
        Self(ClassificatorId::new(code, LANGUAGE_CODE_SYSTEM))
    }

    /// The language code.
    pub fn code(&self) -> &str {
        self.0.code()
    }

    /// The underlying coded value.
    pub fn as_classificator(&self) -> &ClassificatorId {
        &self.0
    }
}

impl TryFrom<ClassificatorId> for LanguageCode {
    type Error = Hl7Error;

    fn try_from(value: ClassificatorId) -> Result<Self> {
        check_code_system("LanguageCode", LANGUAGE_CODE_SYSTEM, &value)?;
        Ok(Self(value))
    }
}

/// A control act priority code, always in [`PRIORITY_CODE_SYSTEM`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PriorityCode(ClassificatorId);

impl PriorityCode {
    /// Creates a priority code in the fixed code system.
    pub fn new(code: impl Into<String>) -> Self {
        Self(ClassificatorId::new(code, PRIORITY_CODE_SYSTEM))
    }

    /// The priority code.
    pub fn code(&self) -> &str {
        self.0.code()
    }

    /// The underlying coded value.
    pub fn as_classificator(&self) -> &ClassificatorId {
        &self.0
    }
}

impl TryFrom<ClassificatorId> for PriorityCode {
    type Error = Hl7Error;

    fn try_from(value: ClassificatorId) -> Result<Self> {
        check_code_system("PriorityCode", PRIORITY_CODE_SYSTEM, &value)?;
        Ok(Self(value))
    }
}

/// A point in time in HL7 `TS` format (`YYYYMMDDHHMMSS[.fff][+ZZZZ]`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Hl7Timestamp(DateTime<FixedOffset>);

impl Hl7Timestamp {
    /// The current time in UTC, truncated to whole seconds.
    pub fn now() -> Self {
        let now = Utc::now();
        let now = now.with_nanosecond(0).unwrap_or(now);
        Self(now.fixed_offset())
    }

    /// Wraps an existing date-time.
    pub fn from_datetime(value: DateTime<FixedOffset>) -> Self {
        Self(value)
    }

    /// The wrapped date-time.
    pub fn as_datetime(&self) -> &DateTime<FixedOffset> {
        &self.0
    }

    /// Parses an HL7 `TS` value.
    ///
    /// Accepts day, minute, second and fractional-second precision, with or
    /// without a `+ZZZZ`/`-ZZZZ` offset. Values without offset are taken as UTC.
    pub fn parse(value: &str) -> Result<Self> {
        let invalid = |message: &str| -> Hl7Error {
            FormatError::invalid_value("timestamp", value, message).into()
        };

        let offset_at = value
            .char_indices()
            .skip(8)
            .find(|(_, c)| *c == '+' || *c == '-')
            .map(|(idx, _)| idx);
        let (local, offset) = match offset_at {
            Some(idx) => (
                &value[..idx],
                parse_offset(&value[idx..]).ok_or_else(|| invalid("bad offset"))?,
            ),
            None => (value, FixedOffset::east_opt(0).ok_or_else(|| invalid("bad offset"))?),
        };

        let padded = match local.len() {
            8 => format!("{}000000", local),
            12 => format!("{}00", local),
            _ => local.to_string(),
        };
        let format = if padded.len() > 14 {
            "%Y%m%d%H%M%S%.f"
        } else {
            "%Y%m%d%H%M%S"
        };
        let naive = NaiveDateTime::parse_from_str(&padded, format)
            .map_err(|e| invalid(&e.to_string()))?;
        let value = offset
            .from_local_datetime(&naive)
            .single()
            .ok_or_else(|| invalid("ambiguous local time"))?;
        Ok(Self(value))
    }

    /// Formats as HL7 `TS`, omitting the offset for UTC.
    pub fn format(&self) -> String {
        let fraction = if self.0.nanosecond() == 0 { "" } else { "%.f" };
        if self.0.offset().local_minus_utc() == 0 {
            self.0.format(&format!("%Y%m%d%H%M%S{}", fraction)).to_string()
        } else {
            self.0.format(&format!("%Y%m%d%H%M%S{}%z", fraction)).to_string()
        }
    }

    pub(crate) fn from_element(start: &ElementStart) -> Result<Self> {
        Self::parse(start.required_attribute("value")?)
    }

    pub(crate) fn write<W: Write>(&self, writer: &mut XmlEventWriter<W>, name: &str) -> Result<()> {
        writer.empty(name, &[("value", self.format().as_str())])
    }
}

impl fmt::Display for Hl7Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format())
    }
}

fn parse_offset(text: &str) -> Option<FixedOffset> {
    let sign = match text.as_bytes().first()? {
        b'+' => 1,
        b'-' => -1,
        _ => return None,
    };
    let digits = &text[1..];
    if digits.len() != 4 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let hours: i32 = digits[..2].parse().ok()?;
    let minutes: i32 = digits[2..].parse().ok()?;
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_codes() {
        assert_eq!(Hl7Version::V2006.version_code(), "V3-2006N");
        assert_eq!(Hl7Version::V2011.version_code(), "V3-2011N");
        assert_eq!("2011".parse::<Hl7Version>().unwrap(), Hl7Version::V2011);
        assert_eq!("V3-2006N".parse::<Hl7Version>().unwrap(), Hl7Version::V2006);
        assert!("2010".parse::<Hl7Version>().is_err());
    }

    #[test]
    fn test_template_id_for_interaction() {
        let template = TemplateId::for_interaction("RCMR_IN000002UV01", Hl7Version::V2011);
        assert_eq!(template.as_str(), "urn:hl7-org:v3:RCMR_IN000002UV01:V3-2011N");
    }

    #[test]
    fn test_generated_identifiers_are_unique() {
        let a = IdentificationId::generate(DEFAULT_MESSAGE_ID_ROOT);
        let b = IdentificationId::generate(DEFAULT_MESSAGE_ID_ROOT);
        assert_ne!(a, b);
        assert_eq!(a.root(), DEFAULT_MESSAGE_ID_ROOT);
        assert!(a.has_extension());
        assert!(!IdentificationId::root_only("1.2.3").has_extension());
        assert!(!IdentificationId::new("1.2.3", "").has_extension());
    }

    #[test]
    fn test_language_code_rejects_foreign_code_system() {
        let err = LanguageCode::try_from(ClassificatorId::new("lv", "1.2.3")).unwrap_err();
        assert!(matches!(
            err,
            Hl7Error::Format(FormatError::CodeSystemMismatch { field: "LanguageCode", .. })
        ));
        let ok = LanguageCode::try_from(ClassificatorId::new("lv", LANGUAGE_CODE_SYSTEM)).unwrap();
        assert_eq!(ok, LanguageCode::new("lv"));
    }

    #[test]
    fn test_priority_code_rejects_foreign_code_system() {
        assert!(PriorityCode::try_from(ClassificatorId::new("R", LANGUAGE_CODE_SYSTEM)).is_err());
        assert_eq!(
            PriorityCode::try_from(ClassificatorId::new("R", PRIORITY_CODE_SYSTEM))
                .unwrap()
                .code(),
            "R"
        );
    }

    #[test]
    fn test_timestamp_parse_and_format() {
        let ts = Hl7Timestamp::parse("20110315093000").unwrap();
        assert_eq!(ts.format(), "20110315093000");

        let ts = Hl7Timestamp::parse("20110315093000+0200").unwrap();
        assert_eq!(ts.format(), "20110315093000+0200");
        assert_eq!(ts.as_datetime().offset().local_minus_utc(), 7200);

        let ts = Hl7Timestamp::parse("20110315").unwrap();
        assert_eq!(ts.format(), "20110315000000");

        let ts = Hl7Timestamp::parse("201103150930").unwrap();
        assert_eq!(ts.format(), "20110315093000");
    }

    #[test]
    fn test_timestamp_rejects_garbage() {
        assert!(Hl7Timestamp::parse("yesterday").is_err());
        assert!(Hl7Timestamp::parse("20111350").is_err());
        assert!(Hl7Timestamp::parse("20110315093000+2").is_err());
    }

    #[test]
    fn test_now_has_whole_seconds() {
        let now = Hl7Timestamp::now();
        assert_eq!(now.as_datetime().nanosecond(), 0);
        assert_eq!(Hl7Timestamp::parse(&now.format()).unwrap(), now);
    }
}
