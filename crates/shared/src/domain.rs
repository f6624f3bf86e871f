use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

id_newtype!(ElementId);

/// Logical field name → element identifier. Values are looked up on the
/// surface every time the binding is used.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldBinding(BTreeMap<String, ElementId>);

impl FieldBinding {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field(mut self, name: impl Into<String>, element: impl Into<ElementId>) -> Self {
        self.0.insert(name.into(), element.into());
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ElementId)> {
        self.0.iter().map(|(name, element)| (name.as_str(), element))
    }

    pub fn elements(&self) -> impl Iterator<Item = &ElementId> {
        self.0.values()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<N, E> FromIterator<(N, E)> for FieldBinding
where
    N: Into<String>,
    E: Into<ElementId>,
{
    fn from_iter<I: IntoIterator<Item = (N, E)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(name, element)| (name.into(), element.into()))
                .collect(),
        )
    }
}

/// Enabled/disabled state of a bound submit control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlState {
    /// Disabled, waiting for the first edit.
    #[default]
    Armed,
    /// Enabled after a watched field changed.
    Dirty,
}

impl ControlState {
    pub fn on_input(self) -> Self {
        Self::Dirty
    }

    pub fn after_submit(self, policy: RearmPolicy) -> Self {
        match policy {
            RearmPolicy::KeepEnabled => self,
            RearmPolicy::DisableAfterSubmit => Self::Armed,
        }
    }

    pub fn is_enabled(self) -> bool {
        matches!(self, Self::Dirty)
    }
}

/// What happens to a `Dirty` control once its submission succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RearmPolicy {
    #[default]
    KeepEnabled,
    DisableAfterSubmit,
}
