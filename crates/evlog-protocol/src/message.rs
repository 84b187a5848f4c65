use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use evlog_types::ObjectPath;

pub const PROTOCOL_VERSION: u32 = 1;
pub const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// A typed argument, return value, or property value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Value {
    Str(String),
    Bytes(Vec<u8>),
    U16(u16),
    U32(u32),
    Bool(bool),
    Array(Vec<Value>),
    Dict(BTreeMap<String, Value>),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_u16(&self) -> Option<u16> {
        match self {
            Self::U16(v) => Some(*v),
            _ => None,
        }
    }

    /// D-Bus style type signature of this value.
    pub fn signature(&self) -> String {
        match self {
            Self::Str(_) => "s".into(),
            Self::Bytes(_) => "ay".into(),
            Self::U16(_) => "q".into(),
            Self::U32(_) => "u".into(),
            Self::Bool(_) => "b".into(),
            Self::Array(items) => match items.first() {
                Some(first) => format!("a{}", first.signature()),
                None => "av".into(),
            },
            Self::Dict(_) => "a{sv}".into(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => write!(f, "{s:?}"),
            Self::Bytes(b) => {
                write!(f, "[")?;
                for (i, byte) in b.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "0x{byte:02X}")?;
                }
                write!(f, "]")
            }
            Self::U16(v) => write!(f, "{v}"),
            Self::U32(v) => write!(f, "{v}"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Self::Dict(map) => {
                write!(f, "{{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Self::Bytes(b)
    }
}

impl From<u16> for Value {
    fn from(v: u16) -> Self {
        Self::U16(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Self::U32(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

/// Property name to value.
pub type PropertyMap = BTreeMap<String, Value>;

/// Interface name to its properties.
pub type InterfaceMap = BTreeMap<String, PropertyMap>;

/// A method invocation addressed to one interface of one object.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodCall {
    /// Well-known name the caller expects to own the object, if any.
    pub destination: Option<String>,
    pub path: ObjectPath,
    pub interface: String,
    pub member: String,
    pub args: Vec<Value>,
}

impl MethodCall {
    pub fn new(path: ObjectPath, interface: impl Into<String>, member: impl Into<String>) -> Self {
        Self {
            destination: None,
            path,
            interface: interface.into(),
            member: member.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args(mut self, args: Vec<Value>) -> Self {
        self.args = args;
        self
    }

    pub fn with_destination(mut self, destination: impl Into<String>) -> Self {
        self.destination = Some(destination.into());
        self
    }
}

/// Object lifecycle notifications broadcast to subscribers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Signal {
    /// An object appeared, exposing these interfaces and property values.
    InterfacesAdded {
        path: ObjectPath,
        interfaces: InterfaceMap,
    },
    /// These interfaces of an object went away.
    InterfacesRemoved {
        path: ObjectPath,
        interfaces: Vec<String>,
    },
}

impl Signal {
    pub fn path(&self) -> &ObjectPath {
        match self {
            Self::InterfacesAdded { path, .. } | Self::InterfacesRemoved { path, .. } => path,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::InterfacesAdded { .. } => "InterfacesAdded",
            Self::InterfacesRemoved { .. } => "InterfacesRemoved",
        }
    }
}

/// Error names carried in error replies.
pub mod error_names {
    pub const UNKNOWN_OBJECT: &str = "org.freedesktop.DBus.Error.UnknownObject";
    pub const UNKNOWN_INTERFACE: &str = "org.freedesktop.DBus.Error.UnknownInterface";
    pub const UNKNOWN_METHOD: &str = "org.freedesktop.DBus.Error.UnknownMethod";
    pub const UNKNOWN_PROPERTY: &str = "org.freedesktop.DBus.Error.UnknownProperty";
    pub const INVALID_ARGS: &str = "org.freedesktop.DBus.Error.InvalidArgs";
    pub const FILE_NOT_FOUND: &str = "org.freedesktop.DBus.Error.FileNotFound";
    pub const SERVICE_UNKNOWN: &str = "org.freedesktop.DBus.Error.ServiceUnknown";
    pub const FAILED: &str = "org.freedesktop.DBus.Error.Failed";
}

/// A named error returned in place of a method's return values.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodError {
    pub name: String,
    pub message: String,
}

impl MethodError {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
        }
    }

    pub fn unknown_object(path: &ObjectPath) -> Self {
        Self::new(error_names::UNKNOWN_OBJECT, format!("no object at {path}"))
    }

    pub fn unknown_interface(path: &ObjectPath, interface: &str) -> Self {
        Self::new(
            error_names::UNKNOWN_INTERFACE,
            format!("object {path} has no interface {interface}"),
        )
    }

    pub fn unknown_method(interface: &str, member: &str) -> Self {
        Self::new(
            error_names::UNKNOWN_METHOD,
            format!("interface {interface} has no method {member}"),
        )
    }

    pub fn invalid_args(message: impl Into<String>) -> Self {
        Self::new(error_names::INVALID_ARGS, message)
    }

    pub fn file_not_found(message: impl Into<String>) -> Self {
        Self::new(error_names::FILE_NOT_FOUND, message)
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self::new(error_names::FAILED, message)
    }

    /// Returns `true` for errors meaning "the addressed thing does not exist".
    pub fn is_not_found(&self) -> bool {
        matches!(
            self.name.as_str(),
            error_names::UNKNOWN_OBJECT | error_names::FILE_NOT_FOUND
        )
    }
}

impl fmt::Display for MethodError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.message)
    }
}

impl std::error::Error for MethodError {}

/// All message types exchanged over a bus connection.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BusMessage {
    Hello { version: u32 },
    HelloAck { version: u32, names: Vec<String> },
    Call { serial: u32, call: MethodCall },
    Return { serial: u32, values: Vec<Value> },
    Error { serial: u32, error: MethodError },
    Subscribe,
    Signal(Signal),
}

impl BusMessage {
    pub fn type_tag(&self) -> u8 {
        match self {
            Self::Hello { .. } => 1,
            Self::HelloAck { .. } => 2,
            Self::Call { .. } => 3,
            Self::Return { .. } => 4,
            Self::Error { .. } => 5,
            Self::Subscribe => 6,
            Self::Signal(_) => 7,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Hello { .. } => "Hello",
            Self::HelloAck { .. } => "HelloAck",
            Self::Call { .. } => "Call",
            Self::Return { .. } => "Return",
            Self::Error { .. } => "Error",
            Self::Subscribe => "Subscribe",
            Self::Signal(_) => "Signal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signatures() {
        assert_eq!(Value::from("x").signature(), "s");
        assert_eq!(Value::from(vec![1u8]).signature(), "ay");
        assert_eq!(Value::from(3u16).signature(), "q");
        assert_eq!(Value::Array(vec![Value::from("a")]).signature(), "as");
        assert_eq!(Value::Dict(BTreeMap::new()).signature(), "a{sv}");
    }

    #[test]
    fn accessors_match_variant() {
        assert_eq!(Value::from("x").as_str(), Some("x"));
        assert_eq!(Value::from("x").as_u16(), None);
        assert_eq!(Value::from(vec![0xAAu8]).as_bytes(), Some(&[0xAAu8][..]));
        assert_eq!(Value::from(9u16).as_u16(), Some(9));
    }

    #[test]
    fn display_bytes_as_hex() {
        assert_eq!(Value::from(vec![0x30u8, 0xFF]).to_string(), "[0x30 0xFF]");
    }

    #[test]
    fn not_found_classification() {
        let path = ObjectPath::new("/a").unwrap();
        assert!(MethodError::unknown_object(&path).is_not_found());
        assert!(MethodError::file_not_found("gone").is_not_found());
        assert!(!MethodError::invalid_args("bad").is_not_found());
    }

    #[test]
    fn signal_path() {
        let path = ObjectPath::new("/a/1").unwrap();
        let sig = Signal::InterfacesRemoved {
            path: path.clone(),
            interfaces: vec!["x".into()],
        };
        assert_eq!(sig.path(), &path);
        assert_eq!(sig.type_name(), "InterfacesRemoved");
    }

    #[test]
    fn type_tags_unique() {
        let path = ObjectPath::root();
        let msgs = vec![
            BusMessage::Hello { version: 1 },
            BusMessage::HelloAck { version: 1, names: vec![] },
            BusMessage::Call { serial: 1, call: MethodCall::new(path.clone(), "i", "m") },
            BusMessage::Return { serial: 1, values: vec![] },
            BusMessage::Error { serial: 1, error: MethodError::failed("x") },
            BusMessage::Subscribe,
            BusMessage::Signal(Signal::InterfacesRemoved { path, interfaces: vec![] }),
        ];
        let mut tags: Vec<u8> = msgs.iter().map(|m| m.type_tag()).collect();
        let len = tags.len();
        tags.sort();
        tags.dedup();
        assert_eq!(tags.len(), len, "type tags should be unique");
    }
}
