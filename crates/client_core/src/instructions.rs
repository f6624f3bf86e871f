//! Fixed dispatcher for the follow-up fragments of a form response.
//!
//! Fragments are data, never code: only [`DomInstruction`] values are applied,
//! one at a time, in order. Script text is read only when it is the legacy
//! bind call ([`DomInstruction::from_legacy_call`]). The first fragment that
//! cannot be applied stops the sequence; everything applied before it stays
//! applied.

use serde_json::Value;
use shared::protocol::{DomInstruction, Fragment};
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::{
    form::FormRequest,
    registry::FormRegistry,
    surface::{Surface, SurfaceError},
};

#[derive(Debug, Error)]
pub enum InstructionError {
    #[error("fragment {index} is script text and is never executed")]
    Script { index: usize },
    #[error("fragment {index} is not a known instruction: {fragment}")]
    Unrecognized { index: usize, fragment: Value },
    #[error("fragment {index} ({op}) failed: {source}")]
    Surface {
        index: usize,
        op: &'static str,
        #[source]
        source: SurfaceError,
    },
}

impl InstructionError {
    /// Index of the fragment that stopped the sequence.
    pub fn index(&self) -> usize {
        match self {
            Self::Script { index } | Self::Unrecognized { index, .. } | Self::Surface { index, .. } => {
                *index
            }
        }
    }
}

/// `origin` is the location whose response carried the instruction; relative
/// bind locations are resolved against it.
pub fn apply_instruction(
    surface: &dyn Surface,
    forms: &FormRegistry,
    origin: &str,
    instruction: &DomInstruction,
) -> Result<(), SurfaceError> {
    match instruction {
        DomInstruction::SetText { target, text } => surface.set_text(target, text),
        DomInstruction::SetValue { target, value } => surface.set_value(target, value),
        DomInstruction::SetAttribute {
            target,
            name,
            value,
        } => surface.set_attribute(target, name, value),
        DomInstruction::ToggleClass {
            target,
            class,
            force,
        } => surface.toggle_class(target, class, *force).map(|_| ()),
        DomInstruction::AppendChild { target, markup } => surface.append_markup(target, markup),
        DomInstruction::Remove { target } => surface.remove(target),
        DomInstruction::SetDisabled { target, disabled } => {
            surface.set_disabled(target, *disabled)
        }
        DomInstruction::BindForm {
            location,
            args,
            root,
            control,
        } => forms.bind(
            surface,
            FormRequest::new(
                resolve_location(origin, location),
                args.clone(),
                root.clone(),
                control.clone(),
            ),
        ),
    }
}

/// Applies `fragments` in order and returns how many were applied.
pub fn apply_fragments(
    surface: &dyn Surface,
    forms: &FormRegistry,
    origin: &str,
    fragments: &[Fragment],
) -> Result<usize, InstructionError> {
    for (index, fragment) in fragments.iter().enumerate() {
        match fragment {
            Fragment::Instruction(instruction) => apply_at(surface, forms, origin, index, instruction)?,
            Fragment::Script(text) => {
                let instruction = DomInstruction::from_legacy_call(text)
                    .ok_or(InstructionError::Script { index })?;
                apply_at(surface, forms, origin, index, &instruction)?;
            }
            Fragment::Unrecognized(value) => {
                return Err(InstructionError::Unrecognized {
                    index,
                    fragment: value.clone(),
                })
            }
        }
    }
    Ok(fragments.len())
}

fn apply_at(
    surface: &dyn Surface,
    forms: &FormRegistry,
    origin: &str,
    index: usize,
    instruction: &DomInstruction,
) -> Result<(), InstructionError> {
    apply_instruction(surface, forms, origin, instruction).map_err(|source| {
        InstructionError::Surface {
            index,
            op: instruction.op_name(),
            source,
        }
    })?;
    debug!(index, op = instruction.op_name(), target = %instruction.target(), "applied fragment");
    Ok(())
}

fn resolve_location(origin: &str, location: &str) -> String {
    Url::parse(origin)
        .and_then(|base| base.join(location))
        .map(String::from)
        .unwrap_or_else(|_| location.to_string())
}
