use serde::Serialize;
use shared::protocol::ResponseEnvelope;

use crate::{
    diagnostics::Diagnostics,
    transport::{EnvelopeTransport, TransportError},
};

/// Fire-and-forget submission: every failure is logged and becomes `None`.
pub async fn submit_data<T>(
    transport: &dyn EnvelopeTransport,
    diagnostics: &Diagnostics,
    location: &str,
    data: &T,
) -> Option<ResponseEnvelope>
where
    T: Serialize + ?Sized,
{
    let result = async {
        let body = serde_json::to_value(data).map_err(TransportError::Encode)?;
        transport.post_envelope(location, &body).await
    }
    .await;

    match result {
        Ok(envelope) => Some(envelope),
        Err(err) => {
            diagnostics.report("submit_data", location, err.kind(), err.to_string());
            None
        }
    }
}
