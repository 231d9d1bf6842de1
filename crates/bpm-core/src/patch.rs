//! Presence-tagged fields for partial updates.
//!
//! A field missing from an update payload deserializes to [`Patch::Unset`];
//! any present value, including `0`, `false` and `""`, is [`Patch::Set`].
//! Nullable attributes use `Patch<Option<T>>`, where an explicit JSON `null`
//! is `Set(None)` and clears the attribute.
//!
//! Payload structs must mark these fields `#[serde(default)]`.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Patch<T> {
    #[default]
    Unset,
    Set(T),
}

impl<T> Patch<T> {
    pub fn is_set(&self) -> bool {
        matches!(self, Patch::Set(_))
    }

    pub fn as_set(&self) -> Option<&T> {
        match self {
            Patch::Set(value) => Some(value),
            Patch::Unset => None,
        }
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            Patch::Set(value) => Some(value),
            Patch::Unset => None,
        }
    }

    /// Overwrite `target` if set. Returns whether anything was written.
    pub fn apply_to(self, target: &mut T) -> bool {
        match self {
            Patch::Set(value) => {
                *target = value;
                true
            }
            Patch::Unset => false,
        }
    }
}

impl<T> From<Option<T>> for Patch<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => Patch::Set(v),
            None => Patch::Unset,
        }
    }
}

impl<'de, T> Deserialize<'de> for Patch<T>
where
    T: Deserialize<'de>,
{
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        T::deserialize(deserializer).map(Patch::Set)
    }
}

impl<T> Serialize for Patch<T>
where
    T: Serialize,
{
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Patch::Set(value) => value.serialize(serializer),
            Patch::Unset => serializer.serialize_none(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct Payload {
        #[serde(default)]
        name: Patch<String>,
        #[serde(default)]
        sort: Patch<i32>,
        #[serde(default)]
        required: Patch<bool>,
        #[serde(default)]
        description: Patch<Option<String>>,
    }

    #[test]
    fn test_missing_fields_are_unset() {
        let p: Payload = serde_json::from_str("{}").unwrap();
        assert_eq!(p.name, Patch::Unset);
        assert_eq!(p.sort, Patch::Unset);
        assert_eq!(p.required, Patch::Unset);
        assert_eq!(p.description, Patch::Unset);
    }

    #[test]
    fn test_zero_values_are_set() {
        let p: Payload =
            serde_json::from_str(r#"{"name": "", "sort": 0, "required": false}"#).unwrap();
        assert_eq!(p.name, Patch::Set(String::new()));
        assert_eq!(p.sort, Patch::Set(0));
        assert_eq!(p.required, Patch::Set(false));
    }

    #[test]
    fn test_null_clears_nullable_field() {
        let p: Payload = serde_json::from_str(r#"{"description": null}"#).unwrap();
        assert_eq!(p.description, Patch::Set(None));
    }

    #[test]
    fn test_null_rejected_for_non_nullable_field() {
        assert!(serde_json::from_str::<Payload>(r#"{"sort": null}"#).is_err());
    }

    #[test]
    fn test_apply_to() {
        let mut leader = "X".to_string();
        assert!(!Patch::Unset.apply_to(&mut leader));
        assert_eq!(leader, "X");
        assert!(Patch::Set("Y".to_string()).apply_to(&mut leader));
        assert_eq!(leader, "Y");
    }
}
