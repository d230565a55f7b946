//! BACnet object references.
//!
//! Objects are configured with a compact shorthand such as `AV:12` (analog
//! value, instance 12). A reference that fails to parse is kept around as an
//! unconfigured sentinel so the thermostat can skip that property entirely.

use std::fmt;
use std::str::FromStr;
use strum::{Display, EnumString, FromRepr};

/// BACnet object types that can be named in the shorthand notation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumString, FromRepr)]
#[repr(u16)]
pub enum ObjectType {
    #[strum(to_string = "AI")]
    AnalogInput = 0,
    #[strum(to_string = "AO")]
    AnalogOutput = 1,
    #[strum(to_string = "AV")]
    AnalogValue = 2,
    #[strum(to_string = "BI")]
    BinaryInput = 3,
    #[strum(to_string = "BO")]
    BinaryOutput = 4,
    #[strum(to_string = "BV")]
    BinaryValue = 5,
    #[strum(to_string = "MSV")]
    MultiStateValue = 19,
}

impl ObjectType {
    /// Numeric BACnet object type code.
    pub fn code(self) -> u16 {
        self as u16
    }
}

/// Reference to a single object on a remote device.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectRef {
    /// Type token as written in the configuration (e.g. `"BV"`)
    pub type_text: String,
    /// Resolved object type, `None` when the token is unknown
    pub object_type: Option<ObjectType>,
    /// Instance number, `None` when the instance token is not a number
    pub instance: Option<u32>,
}

impl ObjectRef {
    /// The "not configured" reference.
    pub fn unconfigured() -> Self {
        Self {
            type_text: String::new(),
            object_type: None,
            instance: Some(0),
        }
    }

    /// Parse a shorthand designation like `BV:16`.
    ///
    /// Never fails: empty or malformed input yields a reference for which
    /// [`ObjectRef::is_configured`] returns `false`.
    pub fn parse(designation: &str) -> Self {
        let designation = designation.trim();
        if designation.is_empty() {
            return Self::unconfigured();
        }

        let Some((type_text, instance_text)) = designation.split_once(':') else {
            return Self::unconfigured();
        };
        if instance_text.contains(':') {
            return Self::unconfigured();
        }

        Self {
            type_text: type_text.to_string(),
            object_type: ObjectType::from_str(type_text).ok(),
            instance: instance_text.trim().parse().ok(),
        }
    }

    /// Numeric type code, `None` stands for "unknown".
    pub fn type_code(&self) -> Option<u16> {
        self.object_type.map(ObjectType::code)
    }

    /// Whether this reference may be used for a remote read or write.
    pub fn is_configured(&self) -> bool {
        self.object_type.is_some() && self.instance.is_some()
    }
}

impl Default for ObjectRef {
    fn default() -> Self {
        Self::unconfigured()
    }
}

impl FromStr for ObjectRef {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.object_type, self.instance) {
            (Some(object_type), Some(instance)) => write!(f, "{}:{}", object_type, instance),
            _ if self.type_text.is_empty() => write!(f, "<unconfigured>"),
            _ => write!(f, "{}:<invalid>", self.type_text),
        }
    }
}
