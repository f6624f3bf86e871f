use std::sync::Arc;

use serde_json::{json, Value};
use shared::{domain::ElementId, error::FailureKind};
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use crate::{
    diagnostics::Diagnostics,
    dialogs::Dialogs,
    guard::InFlightGuard,
    surface::{Surface, SurfaceError},
    transport::{EnvelopeTransport, TransportError},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateRequest {
    pub base: String,
    pub kind: String,
    pub prefix: String,
    pub insertion_point: ElementId,
}

impl CreateRequest {
    pub fn new(
        base: impl Into<String>,
        kind: impl Into<String>,
        prefix: impl Into<String>,
        insertion_point: impl Into<ElementId>,
    ) -> Self {
        Self {
            base: base.into(),
            kind: kind.into(),
            prefix: prefix.into(),
            insertion_point: insertion_point.into(),
        }
    }

    pub fn prompt_message(&self) -> String {
        format!("New {} ID: {}", self.kind, self.prefix)
    }
}

#[derive(Debug, Error)]
pub enum CreateError {
    #[error("invalid base location '{base}': {source}")]
    Location {
        base: String,
        #[source]
        source: url::ParseError,
    },
    #[error("base location '{base}' cannot carry path segments")]
    OpaqueBase { base: String },
    #[error("'{segment}' cannot be used as a path segment")]
    DotSegment { segment: String },
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("failed to insert before '{anchor}': {source}")]
    Insert {
        anchor: ElementId,
        #[source]
        source: SurfaceError,
    },
}

impl CreateError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Location { .. } | Self::OpaqueBase { .. } | Self::DotSegment { .. } => {
                FailureKind::NetworkFailure
            }
            Self::Transport(err) => err.kind(),
            Self::Insert { .. } => FailureKind::Surface,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome {
    Inserted { location: String },
    Rejected { location: String },
    /// The user dismissed the prompt; nothing was sent.
    Cancelled,
    Busy,
}

/// Builds `<base>/<kind>/<identifier>`, pushing `kind` and `identifier` as
/// single path segments.
///
/// `.` and `..` are refused: URL path normalization would drop them, even
/// percent-encoded, and the request would reach another route.
pub fn resource_location(base: &str, kind: &str, identifier: &str) -> Result<String, CreateError> {
    if let Some(segment) = [kind, identifier]
        .into_iter()
        .find(|segment| matches!(*segment, "." | ".."))
    {
        return Err(CreateError::DotSegment {
            segment: segment.to_string(),
        });
    }
    let mut url = Url::parse(base).map_err(|source| CreateError::Location {
        base: base.to_string(),
        source,
    })?;
    url.path_segments_mut()
        .map_err(|()| CreateError::OpaqueBase {
            base: base.to_string(),
        })?
        .pop_if_empty()
        .push(kind)
        .push(identifier);
    Ok(url.into())
}

/// "Create a new named resource": prompt for an identifier, post an empty
/// envelope and insert the returned markup before the insertion point.
pub struct ResourceCreator {
    transport: Arc<dyn EnvelopeTransport>,
    surface: Arc<dyn Surface>,
    dialogs: Arc<dyn Dialogs>,
    guard: Arc<InFlightGuard>,
    diagnostics: Diagnostics,
}

impl ResourceCreator {
    pub fn new(
        transport: Arc<dyn EnvelopeTransport>,
        surface: Arc<dyn Surface>,
        dialogs: Arc<dyn Dialogs>,
        guard: Arc<InFlightGuard>,
        diagnostics: Diagnostics,
    ) -> Self {
        Self {
            transport,
            surface,
            dialogs,
            guard,
            diagnostics,
        }
    }

    pub async fn create_resource(&self, request: &CreateRequest) {
        match self.try_create_resource(request).await {
            Ok(outcome) => debug!(kind = %request.kind, ?outcome, "create finished"),
            Err(err) => {
                self.diagnostics
                    .report("create_resource", &request.base, err.kind(), err.to_string())
            }
        }
    }

    pub(crate) async fn try_create_resource(
        &self,
        request: &CreateRequest,
    ) -> Result<CreateOutcome, CreateError> {
        let anchor = &request.insertion_point;
        let Some(_ticket) = self.guard.try_acquire(anchor) else {
            info!(control = %anchor, "create already in flight");
            return Ok(CreateOutcome::Busy);
        };

        let Some(suffix) = self.dialogs.prompt(&request.prompt_message()) else {
            return Ok(CreateOutcome::Cancelled);
        };
        let identifier = format!("{}{}", request.prefix, suffix);
        let location = resource_location(&request.base, &request.kind, &identifier)?;

        let restore_disabled = self.surface.is_disabled(anchor).ok();
        if restore_disabled.is_some() {
            self.set_disabled(anchor, true);
        }
        let result = self.exchange(anchor, location).await;
        if let Some(disabled) = restore_disabled {
            self.set_disabled(anchor, disabled);
        }
        result
    }

    async fn exchange(
        &self,
        anchor: &ElementId,
        location: String,
    ) -> Result<CreateOutcome, CreateError> {
        let body: Value = json!({});
        let response = self.transport.post_envelope(&location, &body).await?;
        if !response.ok {
            return Ok(CreateOutcome::Rejected { location });
        }

        self.surface
            .insert_before(anchor, response.markup())
            .map_err(|source| CreateError::Insert {
                anchor: anchor.clone(),
                source,
            })?;
        info!(location = %location, "resource created");
        Ok(CreateOutcome::Inserted { location })
    }

    fn set_disabled(&self, element: &ElementId, disabled: bool) {
        if let Err(err) = self.surface.set_disabled(element, disabled) {
            warn!(control = %element, "failed to update control: {err}");
        }
    }
}

#[cfg(test)]
#[path = "tests/create_tests.rs"]
mod tests;
