//! Constants and small helpers shared by the XML reader and writer.

/// HL7 v3 namespace URI.
///
/// Declared as the default namespace on the envelope root, and injected for
/// prefixes that an embedded payload uses without a binding in scope.
pub const HL7_NAMESPACE: &str = "urn:hl7-org:v3";

/// XML Schema instance namespace, bound to `xsi` on the envelope root.
pub const XSI_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema-instance";

/// Value of the `ITSVersion` attribute on the envelope root.
pub const ITS_VERSION: &str = "XML_1.0";

/// Splits a qualified name into its optional prefix and local part.
pub fn split_qname(name: &str) -> (Option<&str>, &str) {
    match name.split_once(':') {
        Some((prefix, local)) => (Some(prefix), local),
        None => (None, name),
    }
}

/// Returns the local part of a qualified name.
pub fn local_name(name: &str) -> &str {
    split_qname(name).1
}

/// Classifies an attribute key as a namespace declaration.
///
/// Returns `Some("")` for the default namespace (`xmlns`) and `Some(prefix)`
/// for a prefixed declaration (`xmlns:prefix`).
pub fn namespace_declaration(key: &str) -> Option<&str> {
    if key == "xmlns" {
        Some("")
    } else {
        key.strip_prefix("xmlns:")
    }
}

/// Returns `true` for prefixes that are bound by XML itself.
pub fn is_reserved_prefix(prefix: &str) -> bool {
    prefix == "xml" || prefix == "xmlns"
}

/// Returns `true` if the bytes contain only XML whitespace.
pub fn is_whitespace(bytes: &[u8]) -> bool {
    bytes
        .iter()
        .all(|b| matches!(b, b' ' | b'\n' | b'\r' | b'\t'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_qname() {
        assert_eq!(split_qname("hl7:subject"), (Some("hl7"), "subject"));
        assert_eq!(split_qname("subject"), (None, "subject"));
        assert_eq!(local_name("xsi:type"), "type");
    }

    #[test]
    fn test_namespace_declaration() {
        assert_eq!(namespace_declaration("xmlns"), Some(""));
        assert_eq!(namespace_declaration("xmlns:hl7"), Some("hl7"));
        assert_eq!(namespace_declaration("xmlnsfoo"), None);
        assert_eq!(namespace_declaration("code"), None);
    }

    #[test]
    fn test_is_reserved_prefix() {
        assert!(is_reserved_prefix("xml"));
        assert!(is_reserved_prefix("xmlns"));
        assert!(!is_reserved_prefix("hl7"));
    }

    #[test]
    fn test_is_whitespace() {
        assert!(is_whitespace(b" \n\t\r"));
        assert!(is_whitespace(b""));
        assert!(!is_whitespace(b" x "));
    }
}
