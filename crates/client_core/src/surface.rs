//! Rendering surface: the capability every component receives instead of
//! looking elements up in an ambient document.

use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    sync::{
        atomic::{AtomicUsize, Ordering},
        PoisonError, RwLock,
    },
};

use shared::domain::ElementId;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SurfaceError {
    #[error("element '{0}' not found")]
    MissingElement(ElementId),
    #[error("element '{0}' is not attached to a parent")]
    Detached(ElementId),
}

/// Operations the binding layer needs from the host page.
///
/// Implementations look elements up on every call; callers never hold on to
/// anything but identifiers.
pub trait Surface: Send + Sync {
    fn value(&self, element: &ElementId) -> Result<String, SurfaceError>;
    fn set_value(&self, element: &ElementId, value: &str) -> Result<(), SurfaceError>;
    /// Replaces the element's full content with `markup`.
    fn replace_content(&self, element: &ElementId, markup: &str) -> Result<(), SurfaceError>;
    /// Inserts `markup` as the element's immediately preceding sibling.
    fn insert_before(&self, element: &ElementId, markup: &str) -> Result<(), SurfaceError>;
    fn append_markup(&self, element: &ElementId, markup: &str) -> Result<(), SurfaceError>;
    fn set_attribute(&self, element: &ElementId, name: &str, value: &str)
        -> Result<(), SurfaceError>;
    /// Returns whether the class is present afterwards.
    fn toggle_class(
        &self,
        element: &ElementId,
        class: &str,
        force: Option<bool>,
    ) -> Result<bool, SurfaceError>;
    fn remove(&self, element: &ElementId) -> Result<(), SurfaceError>;
    fn set_disabled(&self, element: &ElementId, disabled: bool) -> Result<(), SurfaceError>;
    fn is_disabled(&self, element: &ElementId) -> Result<bool, SurfaceError>;

    fn set_text(&self, element: &ElementId, text: &str) -> Result<(), SurfaceError> {
        self.replace_content(element, &escape_text(text))
    }
}

pub fn escape_text(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(ElementId),
    /// Markup spliced in verbatim. It is not parsed, so elements inside it are
    /// not addressable by identifier.
    Markup(String),
}

#[derive(Debug, Clone)]
struct ElementState {
    tag: String,
    parent: Option<ElementId>,
    value: String,
    disabled: bool,
    classes: BTreeSet<String>,
    attributes: BTreeMap<String, String>,
    children: Vec<Node>,
}

impl ElementState {
    fn new(tag: &str, parent: Option<ElementId>) -> Self {
        Self {
            tag: tag.to_string(),
            parent,
            value: String::new(),
            disabled: false,
            classes: BTreeSet::new(),
            attributes: BTreeMap::new(),
            children: Vec::new(),
        }
    }
}

/// In-memory surface used by tests and the command-line driver.
#[derive(Debug, Default)]
pub struct MemorySurface {
    elements: RwLock<HashMap<ElementId, ElementState>>,
    mutations: AtomicUsize,
}

impl MemorySurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an element, appended as the last child of `parent` when given.
    /// Re-adding an existing identifier replaces it.
    pub fn add_element(
        &self,
        element: impl Into<ElementId>,
        tag: &str,
        parent: Option<&ElementId>,
    ) -> Result<(), SurfaceError> {
        let element = element.into();
        let mut elements = self.write();
        if let Some(parent) = parent {
            let parent_state = elements
                .get_mut(parent)
                .ok_or_else(|| SurfaceError::MissingElement(parent.clone()))?;
            parent_state.children.push(Node::Element(element.clone()));
        }
        elements.insert(element, ElementState::new(tag, parent.cloned()));
        Ok(())
    }

    pub fn add_input(
        &self,
        element: impl Into<ElementId>,
        parent: Option<&ElementId>,
        value: &str,
    ) -> Result<(), SurfaceError> {
        let element = element.into();
        self.add_element(element.clone(), "input", parent)?;
        self.with_element(&element, |state| state.value = value.to_string())
    }

    pub fn contains(&self, element: &ElementId) -> bool {
        self.read().contains_key(element)
    }

    pub fn children(&self, element: &ElementId) -> Result<Vec<Node>, SurfaceError> {
        self.read()
            .get(element)
            .map(|state| state.children.clone())
            .ok_or_else(|| SurfaceError::MissingElement(element.clone()))
    }

    /// Serialized content of `element`. Child elements render as
    /// `<tag id="...">...</tag>`.
    pub fn content(&self, element: &ElementId) -> Result<String, SurfaceError> {
        let elements = self.read();
        let state = elements
            .get(element)
            .ok_or_else(|| SurfaceError::MissingElement(element.clone()))?;
        let mut out = String::new();
        render_children(&elements, state, &mut out);
        Ok(out)
    }

    pub fn attribute(&self, element: &ElementId, name: &str) -> Result<Option<String>, SurfaceError> {
        self.read()
            .get(element)
            .map(|state| state.attributes.get(name).cloned())
            .ok_or_else(|| SurfaceError::MissingElement(element.clone()))
    }

    pub fn has_class(&self, element: &ElementId, class: &str) -> Result<bool, SurfaceError> {
        self.read()
            .get(element)
            .map(|state| state.classes.contains(class))
            .ok_or_else(|| SurfaceError::MissingElement(element.clone()))
    }

    /// Number of writes applied since creation, excluding `add_*` setup calls.
    pub fn mutation_count(&self) -> usize {
        self.mutations.load(Ordering::SeqCst)
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<ElementId, ElementState>> {
        self.elements.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<ElementId, ElementState>> {
        self.elements.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn with_element<T>(
        &self,
        element: &ElementId,
        f: impl FnOnce(&mut ElementState) -> T,
    ) -> Result<T, SurfaceError> {
        let mut elements = self.write();
        let state = elements
            .get_mut(element)
            .ok_or_else(|| SurfaceError::MissingElement(element.clone()))?;
        Ok(f(state))
    }

    fn mutate<T>(
        &self,
        element: &ElementId,
        f: impl FnOnce(&mut ElementState) -> T,
    ) -> Result<T, SurfaceError> {
        let out = self.with_element(element, f)?;
        self.mutations.fetch_add(1, Ordering::SeqCst);
        Ok(out)
    }
}

fn render_children(
    elements: &HashMap<ElementId, ElementState>,
    state: &ElementState,
    out: &mut String,
) {
    for child in &state.children {
        match child {
            Node::Markup(markup) => out.push_str(markup),
            Node::Element(id) => {
                let Some(child_state) = elements.get(id) else {
                    continue;
                };
                out.push_str(&format!("<{} id=\"{}\">", child_state.tag, id));
                render_children(elements, child_state, out);
                out.push_str(&format!("</{}>", child_state.tag));
            }
        }
    }
}

fn drop_subtree(elements: &mut HashMap<ElementId, ElementState>, children: Vec<Node>) {
    for child in children {
        if let Node::Element(id) = child {
            if let Some(state) = elements.remove(&id) {
                drop_subtree(elements, state.children);
            }
        }
    }
}

impl Surface for MemorySurface {
    fn value(&self, element: &ElementId) -> Result<String, SurfaceError> {
        self.read()
            .get(element)
            .map(|state| state.value.clone())
            .ok_or_else(|| SurfaceError::MissingElement(element.clone()))
    }

    fn set_value(&self, element: &ElementId, value: &str) -> Result<(), SurfaceError> {
        self.mutate(element, |state| state.value = value.to_string())
    }

    fn replace_content(&self, element: &ElementId, markup: &str) -> Result<(), SurfaceError> {
        {
            let mut elements = self.write();
            let state = elements
                .get_mut(element)
                .ok_or_else(|| SurfaceError::MissingElement(element.clone()))?;
            let previous = std::mem::replace(&mut state.children, vec![Node::Markup(markup.to_string())]);
            drop_subtree(&mut elements, previous);
        }
        self.mutations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn insert_before(&self, element: &ElementId, markup: &str) -> Result<(), SurfaceError> {
        {
            let mut elements = self.write();
            let parent = elements
                .get(element)
                .ok_or_else(|| SurfaceError::MissingElement(element.clone()))?
                .parent
                .clone()
                .ok_or_else(|| SurfaceError::Detached(element.clone()))?;
            let parent_state = elements
                .get_mut(&parent)
                .ok_or_else(|| SurfaceError::MissingElement(parent.clone()))?;
            let position = parent_state
                .children
                .iter()
                .position(|child| matches!(child, Node::Element(id) if id == element))
                .ok_or_else(|| SurfaceError::Detached(element.clone()))?;
            parent_state
                .children
                .insert(position, Node::Markup(markup.to_string()));
        }
        self.mutations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn append_markup(&self, element: &ElementId, markup: &str) -> Result<(), SurfaceError> {
        self.mutate(element, |state| {
            state.children.push(Node::Markup(markup.to_string()))
        })
    }

    fn set_attribute(
        &self,
        element: &ElementId,
        name: &str,
        value: &str,
    ) -> Result<(), SurfaceError> {
        self.mutate(element, |state| {
            state
                .attributes
                .insert(name.to_string(), value.to_string());
        })
    }

    fn toggle_class(
        &self,
        element: &ElementId,
        class: &str,
        force: Option<bool>,
    ) -> Result<bool, SurfaceError> {
        self.mutate(element, |state| {
            let present = force.unwrap_or(!state.classes.contains(class));
            if present {
                state.classes.insert(class.to_string());
            } else {
                state.classes.remove(class);
            }
            present
        })
    }

    fn remove(&self, element: &ElementId) -> Result<(), SurfaceError> {
        {
            let mut elements = self.write();
            let state = elements
                .remove(element)
                .ok_or_else(|| SurfaceError::MissingElement(element.clone()))?;
            if let Some(parent) = state.parent.as_ref().and_then(|p| elements.get_mut(p)) {
                parent
                    .children
                    .retain(|child| !matches!(child, Node::Element(id) if id == element));
            }
            drop_subtree(&mut elements, state.children);
        }
        self.mutations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn set_disabled(&self, element: &ElementId, disabled: bool) -> Result<(), SurfaceError> {
        self.mutate(element, |state| state.disabled = disabled)
    }

    fn is_disabled(&self, element: &ElementId) -> Result<bool, SurfaceError> {
        self.read()
            .get(element)
            .map(|state| state.disabled)
            .ok_or_else(|| SurfaceError::MissingElement(element.clone()))
    }
}

#[cfg(test)]
#[path = "tests/surface_tests.rs"]
mod tests;
