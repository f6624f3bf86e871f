use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::domain::{ElementId, FieldBinding};

/// Call name of the bind fragments older servers emit as script text.
pub const LEGACY_BIND_CALL: &str = "create_api_form";

/// Alert text used when a rejection carries no `status`.
pub const DEFAULT_REJECTION_STATUS: &str = "Request rejected";

/// Body of a form submission: logical field name → current field value.
pub type FormEnvelope = BTreeMap<String, String>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    #[serde(default, deserialize_with = "deserialize_truthy")]
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elem: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub code: Vec<Fragment>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ResponseEnvelope {
    pub fn rendered(elem: impl Into<String>) -> Self {
        Self {
            ok: true,
            elem: Some(elem.into()),
            ..Self::default()
        }
    }

    pub fn rejected(status: impl Into<String>) -> Self {
        Self {
            ok: false,
            status: Some(status.into()),
            ..Self::default()
        }
    }

    pub fn with_fragments(mut self, code: Vec<Fragment>) -> Self {
        self.code = code;
        self
    }

    /// Text shown to the user when `ok` is false.
    pub fn rejection_message(&self) -> &str {
        self.status.as_deref().unwrap_or(DEFAULT_REJECTION_STATUS)
    }

    /// Markup carried by a successful response; missing `elem` renders as empty.
    pub fn markup(&self) -> &str {
        self.elem.as_deref().unwrap_or_default()
    }
}

/// One entry of a response's `code` sequence.
///
/// Only [`Fragment::Instruction`] is ever applied. Script text and unknown
/// objects are kept so the dispatcher can report them and stop the sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Fragment {
    Instruction(DomInstruction),
    Script(String),
    Unrecognized(Value),
}

impl From<DomInstruction> for Fragment {
    fn from(value: DomInstruction) -> Self {
        Self::Instruction(value)
    }
}

/// Closed set of surface mutations a server may request after rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum DomInstruction {
    SetText {
        target: ElementId,
        text: String,
    },
    SetValue {
        target: ElementId,
        value: String,
    },
    SetAttribute {
        target: ElementId,
        name: String,
        value: String,
    },
    ToggleClass {
        target: ElementId,
        class: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        force: Option<bool>,
    },
    AppendChild {
        target: ElementId,
        markup: String,
    },
    Remove {
        target: ElementId,
    },
    SetDisabled {
        target: ElementId,
        disabled: bool,
    },
    /// Binds a form that arrived with the rendered markup: `args` maps field
    /// names to elements, `root` receives the next response.
    BindForm {
        location: String,
        args: FieldBinding,
        root: ElementId,
        control: ElementId,
    },
}

impl DomInstruction {
    pub fn target(&self) -> &ElementId {
        match self {
            Self::SetText { target, .. }
            | Self::SetValue { target, .. }
            | Self::SetAttribute { target, .. }
            | Self::ToggleClass { target, .. }
            | Self::AppendChild { target, .. }
            | Self::Remove { target }
            | Self::SetDisabled { target, .. } => target,
            Self::BindForm { control, .. } => control,
        }
    }

    pub fn op_name(&self) -> &'static str {
        match self {
            Self::SetText { .. } => "set_text",
            Self::SetValue { .. } => "set_value",
            Self::SetAttribute { .. } => "set_attribute",
            Self::ToggleClass { .. } => "toggle_class",
            Self::AppendChild { .. } => "append_child",
            Self::Remove { .. } => "remove",
            Self::SetDisabled { .. } => "set_disabled",
            Self::BindForm { .. } => "bind_form",
        }
    }

    /// Reads `create_api_form(location, args, root, control);` script text as
    /// a [`DomInstruction::BindForm`]. The four arguments must be JSON
    /// literals; any other text yields `None`.
    pub fn from_legacy_call(text: &str) -> Option<Self> {
        let call = text.trim().trim_end_matches(';').trim_end();
        let arguments = call
            .strip_prefix(LEGACY_BIND_CALL)?
            .trim_start()
            .strip_prefix('(')?
            .strip_suffix(')')?;
        let (location, args, root, control) =
            serde_json::from_str::<(String, FieldBinding, ElementId, ElementId)>(&format!(
                "[{arguments}]"
            ))
            .ok()?;
        Some(Self::BindForm {
            location,
            args,
            root,
            control,
        })
    }
}

// `ok` follows the page's truthiness rules: absent or null is false.
fn deserialize_truthy<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Null => false,
        Value::Bool(flag) => flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0 && !n.is_nan()),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    })
}
