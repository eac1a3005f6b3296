use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A remote-reported flag that may be explicitly true, explicitly false,
/// or not reported at all.
///
/// The remote API encodes these as `"yes"`, `"no"` and `""` (or omits the
/// key). `Unset` is never collapsed into `false`. Serializes as a JSON bool,
/// `Unset` as `null`; pair with `skip_serializing_if = "TriState::is_unset"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TriState {
    #[default]
    Unset,
    True,
    False,
}

impl TriState {
    pub fn is_unset(&self) -> bool {
        matches!(self, TriState::Unset)
    }

    /// Returns the flag value, or `None` when not reported.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            TriState::Unset => None,
            TriState::True => Some(true),
            TriState::False => Some(false),
        }
    }
}

impl From<bool> for TriState {
    fn from(value: bool) -> Self {
        if value { TriState::True } else { TriState::False }
    }
}

impl From<Option<bool>> for TriState {
    fn from(value: Option<bool>) -> Self {
        value.map(TriState::from).unwrap_or(TriState::Unset)
    }
}

impl Serialize for TriState {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self.as_bool() {
            Some(value) => serializer.serialize_bool(value),
            None => serializer.serialize_none(),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawFlag {
    Bool(bool),
    Text(String),
}

impl<'de> Deserialize<'de> for TriState {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<RawFlag>::deserialize(deserializer)? {
            None => Ok(TriState::Unset),
            Some(RawFlag::Bool(value)) => Ok(value.into()),
            Some(RawFlag::Text(text)) => match text.as_str() {
                "" => Ok(TriState::Unset),
                "yes" | "true" => Ok(TriState::True),
                "no" | "false" => Ok(TriState::False),
                other => Err(serde::de::Error::custom(format!(
                    "invalid flag value '{}', expected yes, no or empty",
                    other
                ))),
            },
        }
    }
}
