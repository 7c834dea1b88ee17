//! Explicit "optional field" wrapper for partial updates.
//!
//! A [`Patch`] is either [`Patch::Unchanged`] (the caller did not supply the
//! field) or [`Patch::Set`] (the caller wants this value). Nullable attributes
//! use `Patch<Option<T>>` so that "not supplied" and "explicitly cleared"
//! (`Set(None)`) stay distinguishable.
//!
//! Deserialization maps a present field to `Set`; combine with
//! `#[serde(default)]` so a missing field becomes `Unchanged`.

use serde::{Deserialize, Deserializer};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Patch<T> {
    Unchanged,
    Set(T),
}

impl<T> Default for Patch<T> {
    fn default() -> Self {
        Patch::Unchanged
    }
}

impl<T> From<T> for Patch<T> {
    fn from(value: T) -> Self {
        Patch::Set(value)
    }
}

impl<T> Patch<T> {
    pub fn is_unchanged(&self) -> bool {
        matches!(self, Patch::Unchanged)
    }

    pub fn as_set(&self) -> Option<&T> {
        match self {
            Patch::Set(value) => Some(value),
            Patch::Unchanged => None,
        }
    }

    /// The desired value, only if it was supplied and differs from `current`.
    pub fn changed_from(&self, current: &T) -> Option<&T>
    where
        T: PartialEq,
    {
        self.as_set().filter(|desired| *desired != current)
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Patch<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        T::deserialize(deserializer).map(Patch::Set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct Input {
        #[serde(default)]
        name: Patch<String>,
        #[serde(default)]
        nickname: Patch<Option<String>>,
    }

    #[test]
    fn missing_field_is_unchanged() {
        let input: Input = serde_json::from_str("{}").unwrap();
        assert!(input.name.is_unchanged());
        assert!(input.nickname.is_unchanged());
    }

    #[test]
    fn explicit_null_clears_nullable_field() {
        let input: Input = serde_json::from_str(r#"{"nickname": null}"#).unwrap();
        assert_eq!(input.nickname, Patch::Set(None));
    }

    #[test]
    fn present_value_is_set() {
        let input: Input = serde_json::from_str(r#"{"name": "prod"}"#).unwrap();
        assert_eq!(input.name, Patch::Set("prod".to_string()));
    }

    #[test]
    fn changed_from_ignores_equal_values() {
        let patch = Patch::Set(true);
        assert_eq!(patch.changed_from(&true), None);
        assert_eq!(patch.changed_from(&false), Some(&true));
        assert_eq!(Patch::<bool>::Unchanged.changed_from(&false), None);
    }
}
