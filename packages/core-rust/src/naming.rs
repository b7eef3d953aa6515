//! XML name identity used to key every description collection.
//!
//! A [`XmlName`] keeps both the text the caller supplied and its encoded form.
//! Characters that cannot appear in an XML `NCName` are written as `_xHHHH_`
//! (eight hex digits outside the Basic Multilingual Plane), and an underscore
//! that would otherwise read as the start of such an escape is itself escaped
//! as `_x005F_`. Equality and hashing always use the encoded form.

use std::fmt;
use std::hash::{Hash, Hasher};

use crate::error::DescriptionError;
use crate::uri;

/// Namespace assigned to contracts and services that do not name one.
pub const DEFAULT_NAMESPACE: &str = "http://tempuri.org/";

// ---------------------------------------------------------------------------
// Character classes
// ---------------------------------------------------------------------------

fn is_name_start_char(c: char) -> bool {
    matches!(c,
        'A'..='Z' | '_' | 'a'..='z'
        | '\u{C0}'..='\u{D6}'
        | '\u{D8}'..='\u{F6}'
        | '\u{F8}'..='\u{2FF}'
        | '\u{370}'..='\u{37D}'
        | '\u{37F}'..='\u{1FFF}'
        | '\u{200C}'..='\u{200D}'
        | '\u{2070}'..='\u{218F}'
        | '\u{2C00}'..='\u{2FEF}'
        | '\u{3001}'..='\u{D7FF}'
        | '\u{F900}'..='\u{FDCF}'
        | '\u{FDF0}'..='\u{FFFD}'
        | '\u{10000}'..='\u{EFFFF}')
}

fn is_name_char(c: char) -> bool {
    is_name_start_char(c)
        || matches!(c,
            '-' | '.' | '0'..='9' | '\u{B7}'
            | '\u{300}'..='\u{36F}'
            | '\u{203F}'..='\u{2040}')
}

/// Returns `true` when `value` is a non-empty `NCName` (an XML name without colons).
#[must_use]
pub fn is_ncname(value: &str) -> bool {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) if is_name_start_char(first) => chars.all(is_name_char),
        _ => false,
    }
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Returns `true` if `rest` (text following an underscore) starts with `x` and
/// four hex digits, i.e. could be read back as the body of an escape.
fn looks_like_escape(rest: &str) -> bool {
    let bytes = rest.as_bytes();
    bytes.len() >= 5 && bytes[0] == b'x' && bytes[1..5].iter().all(u8::is_ascii_hexdigit)
}

/// Encodes `name` so that the result is a valid `NCName`.
#[must_use]
pub fn encode_local_name(name: &str) -> String {
    let mut encoded = String::with_capacity(name.len());
    for (idx, c) in name.char_indices() {
        let valid = if idx == 0 {
            is_name_start_char(c)
        } else {
            is_name_char(c)
        };
        if c == '_' && looks_like_escape(&name[idx + 1..]) {
            encoded.push_str("_x005F_");
        } else if valid {
            encoded.push(c);
        } else if u32::from(c) > 0xFFFF {
            encoded.push_str(&format!("_x{:08X}_", u32::from(c)));
        } else {
            encoded.push_str(&format!("_x{:04X}_", u32::from(c)));
        }
    }
    encoded
}

/// Parses an escape body (`xHHHH_` or `xHHHHHHHH_`) at the start of `rest`.
/// Returns the decoded char and the number of bytes consumed after the underscore.
fn parse_escape(rest: &str) -> Option<(char, usize)> {
    if !rest.starts_with('x') {
        return None;
    }
    for digits in [4_usize, 8] {
        let end = 1 + digits;
        let Some(hex) = rest.get(1..end) else {
            continue;
        };
        if !hex.bytes().all(|b| b.is_ascii_hexdigit()) || rest.as_bytes().get(end) != Some(&b'_') {
            continue;
        }
        if let Some(c) = u32::from_str_radix(hex, 16).ok().and_then(char::from_u32) {
            return Some((c, end + 1));
        }
    }
    None
}

/// Reverses [`encode_local_name`]. Sequences that are not well-formed escapes
/// are kept verbatim.
#[must_use]
pub fn decode_local_name(encoded: &str) -> String {
    let mut decoded = String::with_capacity(encoded.len());
    let mut rest = encoded;
    while let Some(pos) = rest.find('_') {
        decoded.push_str(&rest[..pos]);
        match parse_escape(&rest[pos + 1..]) {
            Some((c, consumed)) => {
                decoded.push(c);
                rest = &rest[pos + 1 + consumed..];
            }
            None => {
                decoded.push('_');
                rest = &rest[pos + 1..];
            }
        }
    }
    decoded.push_str(rest);
    decoded
}

// ---------------------------------------------------------------------------
// XmlName
// ---------------------------------------------------------------------------

/// A mandatory XML local name with a stable encoded form.
#[derive(Debug, Clone)]
pub struct XmlName {
    decoded: String,
    encoded: String,
}

impl XmlName {
    /// Creates a name from caller text, encoding it as needed.
    ///
    /// # Errors
    ///
    /// Returns [`DescriptionError::EmptyName`] when `name` is empty.
    pub fn new(name: impl Into<String>) -> Result<Self, DescriptionError> {
        let decoded = name.into();
        if decoded.is_empty() {
            return Err(DescriptionError::EmptyName { field: "name" });
        }
        let encoded = encode_local_name(&decoded);
        Ok(Self { decoded, encoded })
    }

    /// Creates a name from text that is already encoded.
    ///
    /// # Errors
    ///
    /// Returns [`DescriptionError::EmptyName`] for empty input and
    /// [`DescriptionError::InvalidEncodedName`] when the text is not an `NCName`.
    pub fn from_encoded(encoded: impl Into<String>) -> Result<Self, DescriptionError> {
        let encoded = encoded.into();
        if encoded.is_empty() {
            return Err(DescriptionError::EmptyName { field: "name" });
        }
        if !is_ncname(&encoded) {
            return Err(DescriptionError::InvalidEncodedName { name: encoded });
        }
        Ok(Self {
            decoded: decode_local_name(&encoded),
            encoded,
        })
    }

    /// The name as originally supplied.
    #[must_use]
    pub fn decoded(&self) -> &str {
        &self.decoded
    }

    /// The `NCName`-safe form written on the wire.
    #[must_use]
    pub fn encoded(&self) -> &str {
        &self.encoded
    }
}

impl PartialEq for XmlName {
    fn eq(&self, other: &Self) -> bool {
        self.encoded == other.encoded
    }
}

impl Eq for XmlName {}

impl Hash for XmlName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.encoded.hash(state);
    }
}

impl fmt::Display for XmlName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encoded)
    }
}

// ---------------------------------------------------------------------------
// Namespaces and qualified names
// ---------------------------------------------------------------------------

/// Checks that `namespace` is empty or an absolute URI.
///
/// # Errors
///
/// Returns [`DescriptionError::InvalidNamespace`] otherwise.
pub fn validate_namespace(namespace: &str) -> Result<(), DescriptionError> {
    if namespace.is_empty() || uri::is_absolute_uri(namespace) {
        Ok(())
    } else {
        Err(DescriptionError::InvalidNamespace {
            namespace: namespace.to_string(),
        })
    }
}

/// A (local name, namespace) pair, the key of every keyed description collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QualifiedName {
    pub name: XmlName,
    pub namespace: String,
}

impl QualifiedName {
    /// # Errors
    ///
    /// Returns [`DescriptionError::InvalidNamespace`] for a malformed namespace.
    pub fn new(name: XmlName, namespace: impl Into<String>) -> Result<Self, DescriptionError> {
        let namespace = namespace.into();
        validate_namespace(&namespace)?;
        Ok(Self { name, namespace })
    }

    /// Key for items that carry no namespace (message properties).
    #[must_use]
    pub fn local(name: XmlName) -> Self {
        Self {
            name,
            namespace: String::new(),
        }
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{{{}}}{}", self.namespace, self.name)
        }
    }
}

// ---------------------------------------------------------------------------
// Default naming rules
// ---------------------------------------------------------------------------

fn contract_prefix(contract_namespace: &str, contract_name: &str) -> String {
    let separator = if contract_namespace.is_empty() || contract_namespace.ends_with('/') {
        ""
    } else {
        "/"
    };
    format!("{contract_namespace}{separator}{contract_name}")
}

/// Default action for an operation's request (or reply when `is_response`).
#[must_use]
pub fn default_action(
    contract_namespace: &str,
    contract_name: &str,
    operation_name: &str,
    is_response: bool,
) -> String {
    let suffix = if is_response { "Response" } else { "" };
    format!(
        "{}/{operation_name}{suffix}",
        contract_prefix(contract_namespace, contract_name)
    )
}

/// Default action for a declared fault.
#[must_use]
pub fn default_fault_action(
    contract_namespace: &str,
    contract_name: &str,
    operation_name: &str,
    fault_name: &str,
) -> String {
    format!(
        "{}/{operation_name}{fault_name}Fault",
        contract_prefix(contract_namespace, contract_name)
    )
}

/// Suggested proxy class name for a contract: `IOrderService` becomes
/// `OrderServiceClient`, `Service` becomes `ServiceClient`.
#[must_use]
pub fn get_client_class_name(contract_name: &str) -> String {
    let mut chars = contract_name.chars();
    let trimmed = match (chars.next(), chars.next()) {
        (Some('I'), Some(second)) if second.is_uppercase() => &contract_name[1..],
        _ => contract_name,
    };
    format!("{trimmed}Client")
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn plain_names_are_unchanged() {
        let name = XmlName::new("GetOrder").unwrap();
        assert_eq!(name.encoded(), "GetOrder");
        assert_eq!(name.decoded(), "GetOrder");
    }

    #[test]
    fn invalid_characters_are_escaped() {
        assert_eq!(encode_local_name("order id"), "order_x0020_id");
        assert_eq!(encode_local_name("1st"), "_x0031_st");
        assert_eq!(encode_local_name("a:b"), "a_x003A_b");
        assert_eq!(encode_local_name("\u{F0000}"), "_x000F0000_");
    }

    #[test]
    fn escape_lookalikes_are_protected() {
        assert_eq!(encode_local_name("_x0041_"), "_x005F_x0041_");
        assert_eq!(decode_local_name("_x005F_x0041_"), "_x0041_");
    }

    #[test]
    fn decode_keeps_malformed_escapes() {
        assert_eq!(decode_local_name("a_xZZZZ_b"), "a_xZZZZ_b");
        assert_eq!(decode_local_name("trailing_"), "trailing_");
    }

    #[test]
    fn empty_name_fails() {
        assert_eq!(
            XmlName::new(""),
            Err(DescriptionError::EmptyName { field: "name" })
        );
        assert!(XmlName::from_encoded("").is_err());
    }

    #[test]
    fn from_encoded_rejects_non_ncnames() {
        assert!(matches!(
            XmlName::from_encoded("has space"),
            Err(DescriptionError::InvalidEncodedName { .. })
        ));
        let name = XmlName::from_encoded("order_x0020_id").unwrap();
        assert_eq!(name.decoded(), "order id");
    }

    #[test]
    fn equality_uses_encoded_form() {
        let a = XmlName::new("order id").unwrap();
        let b = XmlName::from_encoded("order_x0020_id").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn namespace_validation() {
        assert!(validate_namespace("").is_ok());
        assert!(validate_namespace("http://tempuri.org/").is_ok());
        assert!(validate_namespace("urn:orders").is_ok());
        assert!(matches!(
            validate_namespace("not a namespace"),
            Err(DescriptionError::InvalidNamespace { .. })
        ));
    }

    #[test]
    fn qualified_name_display() {
        let q = QualifiedName::new(XmlName::new("Order").unwrap(), "urn:shop").unwrap();
        assert_eq!(q.to_string(), "{urn:shop}Order");
        assert_eq!(QualifiedName::local(XmlName::new("p").unwrap()).to_string(), "p");
    }

    #[test]
    fn default_actions() {
        assert_eq!(
            default_action("http://tempuri.org/", "IOrders", "Get", false),
            "http://tempuri.org/IOrders/Get"
        );
        assert_eq!(
            default_action("urn:shop", "IOrders", "Get", true),
            "urn:shop/IOrders/GetResponse"
        );
        assert_eq!(
            default_fault_action("urn:shop", "IOrders", "Get", "NotFound"),
            "urn:shop/IOrders/GetNotFoundFault"
        );
    }

    #[test]
    fn client_class_names() {
        assert_eq!(get_client_class_name("IOrderService"), "OrderServiceClient");
        assert_eq!(get_client_class_name("Service"), "ServiceClient");
        assert_eq!(get_client_class_name("Inventory"), "InventoryClient");
        assert_eq!(get_client_class_name("I"), "IClient");
    }

    proptest! {
        #[test]
        fn encoding_round_trips(text in "\\PC{1,24}") {
            let name = XmlName::new(text.clone()).unwrap();
            prop_assert!(is_ncname(name.encoded()));
            prop_assert_eq!(decode_local_name(name.encoded()), text);
        }

        #[test]
        fn qualified_identity_round_trips(
            local in "[A-Za-z_][A-Za-z0-9_.-]{0,16}",
            ns in "(urn:[a-z]{1,8}|http://[a-z]{1,8}\\.org/[a-z]{0,8})",
        ) {
            let name = XmlName::new(local.clone()).unwrap();
            let key = QualifiedName::new(name, ns.clone()).unwrap();
            let reread = XmlName::from_encoded(key.name.encoded().to_string()).unwrap();
            prop_assert_eq!(reread.decoded(), local.as_str());
            prop_assert_eq!(key.namespace, ns);
        }
    }
}
