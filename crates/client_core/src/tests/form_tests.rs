use std::time::Duration;

use axum::http::StatusCode;
use serde_json::json;
use shared::protocol::{DomInstruction, Fragment, ResponseEnvelope};

use super::*;
use crate::{
    surface::MemorySurface,
    test_support::{spawn_envelope_server, RecordingDialogs, StubTransport},
    transport::HttpEnvelopeTransport,
};

fn page() -> Arc<MemorySurface> {
    let surface = Arc::new(MemorySurface::new());
    surface.add_element("panel", "div", None).expect("panel");
    surface.add_element("log", "ul", None).expect("log");
    surface.add_input("field-name", None, "").expect("field");
    surface.add_element("go-button", "button", None).expect("button");
    surface
}

fn controller(transport: Arc<dyn EnvelopeTransport>, surface: Arc<MemorySurface>) -> FormController {
    FormController::new(transport, surface, InFlightGuard::new(), Diagnostics::new())
}

fn alice_request(location: &str) -> FormRequest {
    FormRequest::new(
        location,
        FieldBinding::new().with_field("name", "field-name"),
        "panel",
        "go-button",
    )
}

#[tokio::test]
async fn renders_markup_into_target_after_successful_submit() {
    let server = spawn_envelope_server(
        StatusCode::OK,
        json!({"ok": true, "elem": "<p>Hi Alice</p>", "code": []}),
    )
    .await;
    let surface = page();
    let dialogs = RecordingDialogs::new();
    let forms = controller(Arc::new(HttpEnvelopeTransport::new(dialogs.clone())), surface.clone());
    surface
        .set_value(&ElementId::new("field-name"), "Alice")
        .expect("type");

    let outcome = forms
        .try_submit_form(&alice_request(&format!("{}/api/greet", server.url)))
        .await
        .expect("submit");

    assert_eq!(outcome, SubmitOutcome::Rendered { fragments_applied: 0 });
    assert_eq!(
        surface.content(&ElementId::new("panel")).expect("panel"),
        "<p>Hi Alice</p>"
    );
    let requests = server.requests().await;
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].body, json!({"name": "Alice"}));
    assert!(dialogs.alerts().is_empty());
}

#[tokio::test]
async fn rejection_alerts_and_leaves_target_untouched() {
    let server = spawn_envelope_server(
        StatusCode::OK,
        json!({"ok": false, "status": "Name taken", "elem": "<p>ignored</p>"}),
    )
    .await;
    let surface = page();
    let panel = ElementId::new("panel");
    surface.replace_content(&panel, "<p>before</p>").expect("seed");
    let dialogs = RecordingDialogs::new();
    let forms = controller(Arc::new(HttpEnvelopeTransport::new(dialogs.clone())), surface.clone());

    let outcome = forms
        .try_submit_form(&alice_request(&server.url))
        .await
        .expect("submit");

    assert_eq!(outcome, SubmitOutcome::Rejected);
    assert_eq!(dialogs.alerts(), vec!["Name taken".to_string()]);
    assert_eq!(surface.content(&panel).expect("panel"), "<p>before</p>");
}

#[tokio::test]
async fn http_failure_leaves_target_untouched_and_is_reported() {
    let server = spawn_envelope_server(StatusCode::BAD_GATEWAY, json!({})).await;
    let surface = page();
    let panel = ElementId::new("panel");
    surface.replace_content(&panel, "<p>before</p>").expect("seed");
    let dialogs = RecordingDialogs::new();
    let diagnostics = Diagnostics::new();
    let mut failures = diagnostics.subscribe();
    let forms = FormController::new(
        Arc::new(HttpEnvelopeTransport::new(dialogs.clone())),
        surface.clone(),
        InFlightGuard::new(),
        diagnostics,
    );

    forms.submit_form(&alice_request(&server.url)).await;

    assert_eq!(surface.content(&panel).expect("panel"), "<p>before</p>");
    assert_eq!(dialogs.alerts(), vec!["Request failed".to_string()]);
    let failure = failures.try_recv().expect("failure reported");
    assert_eq!(failure.kind, FailureKind::TransportStatus);
}

#[tokio::test]
async fn fields_are_read_at_submit_time() {
    let stub = Arc::new(StubTransport::replying(ResponseEnvelope::rendered("<p>ok</p>")));
    let surface = page();
    let forms = controller(stub.clone(), surface.clone());
    let field = ElementId::new("field-name");
    let request = alice_request("http://forms.test/api/greet");

    surface.set_value(&field, "Al").expect("type");
    forms.try_submit_form(&request).await.expect("first");
    surface.set_value(&field, "Alice").expect("type");
    forms.try_submit_form(&request).await.expect("second");

    let calls = stub.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].1, json!({"name": "Al"}));
    assert_eq!(calls[1].1, json!({"name": "Alice"}));
}

#[tokio::test]
async fn replaces_whole_target_content_including_child_elements() {
    let stub = Arc::new(StubTransport::replying(ResponseEnvelope::rendered("<p>new</p>")));
    let surface = page();
    let panel = ElementId::new("panel");
    surface
        .add_element("old-row", "p", Some(&panel))
        .expect("child");
    let forms = controller(stub, surface.clone());

    forms
        .try_submit_form(&alice_request("http://forms.test/api"))
        .await
        .expect("submit");

    assert_eq!(surface.content(&panel).expect("panel"), "<p>new</p>");
    assert!(!surface.contains(&ElementId::new("old-row")));
}

#[tokio::test]
async fn fragments_apply_in_order_and_stop_at_first_failure() {
    let log = ElementId::new("log");
    let response = ResponseEnvelope::rendered("<p>saved</p>").with_fragments(vec![
        Fragment::from(DomInstruction::AppendChild {
            target: log.clone(),
            markup: "<li>1</li>".into(),
        }),
        Fragment::from(DomInstruction::AppendChild {
            target: log.clone(),
            markup: "<li>2</li>".into(),
        }),
        Fragment::Script("throw new Error('boom')".into()),
        Fragment::from(DomInstruction::AppendChild {
            target: log.clone(),
            markup: "<li>4</li>".into(),
        }),
    ]);
    let surface = page();
    let diagnostics = Diagnostics::new();
    let mut failures = diagnostics.subscribe();
    let forms = FormController::new(
        Arc::new(StubTransport::replying(response)),
        surface.clone(),
        InFlightGuard::new(),
        diagnostics,
    );
    let request = alice_request("http://forms.test/api");

    let err = forms
        .try_submit_form(&request)
        .await
        .expect_err("fragment must fail");
    assert!(matches!(err, FormError::Fragment(ref inner) if inner.index() == 2));
    assert_eq!(err.kind(), FailureKind::FragmentExecution);

    // markup from the render step stays in place
    assert_eq!(
        surface.content(&ElementId::new("panel")).expect("panel"),
        "<p>saved</p>"
    );
    assert_eq!(surface.content(&log).expect("log"), "<li>1</li><li>2</li>");

    forms.submit_form(&request).await;
    let failure = failures.try_recv().expect("failure reported");
    assert_eq!(failure.kind, FailureKind::FragmentExecution);
}

#[tokio::test]
async fn missing_field_aborts_before_any_request() {
    let stub = Arc::new(StubTransport::replying(ResponseEnvelope::rendered("<p>x</p>")));
    let surface = page();
    let forms = controller(stub.clone(), surface.clone());
    let request = FormRequest::new(
        "http://forms.test/api",
        FieldBinding::new().with_field("name", "no-such-field"),
        "panel",
        "go-button",
    );

    let err = forms.try_submit_form(&request).await.expect_err("must fail");

    assert!(matches!(err, FormError::Field { ref field, .. } if field == "name"));
    assert!(stub.calls().is_empty());
    assert!(!surface.is_disabled(&ElementId::new("go-button")).expect("button"));
}

#[tokio::test]
async fn second_activation_while_in_flight_is_refused() {
    let stub = Arc::new(
        StubTransport::replying(ResponseEnvelope::rendered("<p>once</p>"))
            .with_delay(Duration::from_millis(150)),
    );
    let surface = page();
    let forms = Arc::new(controller(stub.clone(), surface.clone()));
    let request = alice_request("http://forms.test/api");
    let button = ElementId::new("go-button");

    let first = {
        let forms = Arc::clone(&forms);
        let request = request.clone();
        tokio::spawn(async move { forms.try_submit_form(&request).await })
    };
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert!(forms.is_in_flight(&button));
    assert!(surface.is_disabled(&button).expect("button"));

    let second = forms.try_submit_form(&request).await.expect("second");
    assert_eq!(second, SubmitOutcome::Busy);

    let first = first.await.expect("join").expect("first");
    assert_eq!(first, SubmitOutcome::Rendered { fragments_applied: 0 });
    assert_eq!(stub.calls().len(), 1);
    assert!(!forms.is_in_flight(&button));
    assert!(!surface.is_disabled(&button).expect("button"));
}
