//! Conversion between local values and BACnet application-tagged values.
//!
//! Remote values travel as a list of `{ "type": <tag>, "value": ... }`
//! entries. Writes always carry a single entry.

use crate::error::{BridgeError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, FromRepr};

/// BACnet application tag numbers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, FromRepr, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
#[repr(u8)]
pub enum ApplicationTag {
    Null = 0,
    Boolean = 1,
    UnsignedInteger = 2,
    SignedInteger = 3,
    Real = 4,
    Double = 5,
    OctetString = 6,
    CharacterString = 7,
    BitString = 8,
    Enumerated = 9,
}

impl From<ApplicationTag> for u8 {
    fn from(tag: ApplicationTag) -> Self {
        tag as u8
    }
}

impl TryFrom<u8> for ApplicationTag {
    type Error = String;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        ApplicationTag::from_repr(value).ok_or_else(|| format!("unknown application tag {}", value))
    }
}

/// A single tagged value as exchanged with the property store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaggedValue {
    #[serde(rename = "type")]
    pub tag: ApplicationTag,
    pub value: Value,
}

pub type ValueList = Vec<TaggedValue>;

/// Raw result of a property read.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ReadResponse {
    #[serde(default)]
    pub values: ValueList,
}

impl ReadResponse {
    /// Response carrying a single tagged value.
    pub fn single(tag: ApplicationTag, value: impl Into<Value>) -> Self {
        Self {
            values: vec![TaggedValue {
                tag,
                value: value.into(),
            }],
        }
    }
}

/// Encode a local value for a property write.
///
/// An explicit `tag` is used as given. Without one the tag follows the value's
/// kind: numbers become `Real`, booleans `Enumerated` (sent as 0/1) and strings
/// `CharacterString`.
pub fn encode(value: &Value, tag: Option<ApplicationTag>) -> Result<ValueList> {
    if let Some(tag) = tag {
        return Ok(vec![TaggedValue {
            tag,
            value: value.clone(),
        }]);
    }

    let tagged = match value {
        Value::Number(_) => TaggedValue {
            tag: ApplicationTag::Real,
            value: value.clone(),
        },
        // BACnet uses 0 and 1 instead of false and true
        Value::Bool(flag) => TaggedValue {
            tag: ApplicationTag::Enumerated,
            value: Value::from(u8::from(*flag)),
        },
        Value::String(_) => TaggedValue {
            tag: ApplicationTag::CharacterString,
            value: value.clone(),
        },
        Value::Null => return Err(BridgeError::UnsupportedValueKind("null")),
        Value::Array(_) => return Err(BridgeError::UnsupportedValueKind("array")),
        Value::Object(_) => return Err(BridgeError::UnsupportedValueKind("object")),
    };

    Ok(vec![tagged])
}

/// Extract the first value of a read response without interpreting it.
pub fn decode(response: &ReadResponse) -> Result<Value> {
    response
        .values
        .first()
        .map(|tagged| tagged.value.clone())
        .ok_or_else(|| BridgeError::MalformedResponse("response carries no values".to_string()))
}

/// Numeric view of a decoded value.
pub fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::Bool(flag) => Some(if *flag { 1.0 } else { 0.0 }),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        _ => None,
    }
}
