//! End-to-end behaviour over raw HTTP messages.

use aura_codec::wire::{url_decode, url_encode};
use aura_codec::{
    detect_response, is_aura_request, is_aura_response, ActionEdit, ActionsEditor,
    AuraConfig, AuraError, AuraRequestMessage, AuraResponseMessage, Codec, RawHttpAdapter,
    WireAdapter,
};
use serde_json::{json, Value};

const PAYLOAD: &str = r#"{"actions":[{"id":"87;a","descriptor":"serviceComponent://ui.force.components.controllers.recordGlobalValueProvider.RecordGvpController/ACTION$getRecord","callingDescriptor":"UNKNOWN","params":{"recordDescriptor":"001xx000003DGb2AAG.undefined.null.null.null.Id,Name.VIEW.true.null.null.null"}},{"id":"88;a","descriptor":"apex://CaseController/ACTION$getCases","callingDescriptor":"markup://c:caseList","params":{"status":"Open","limit":25,"owners":["me","team"]},"storable":true}]}"#;

fn aura_request(payload: &str) -> Vec<u8> {
    let body = format!(
        "message={}&aura.context=%7B%22mode%22%3A%22PROD%22%2C%22app%22%3A%22siteforce%3AcommunityApp%22%7D&aura.pageURI=%2Fs%2F&aura.token=undefined",
        url_encode(payload)
    );
    format!(
        "POST /s/sfsites/aura?r=12&other.Case.getCases=1 HTTP/1.1\r\nHost: acme.my.site.com\r\nContent-Type: application/x-www-form-urlencoded;charset=UTF-8\r\nContent-Length: {}\r\n\r\n{}",
        body.len(),
        body
    )
    .into_bytes()
}

fn payload_of(message: &[u8]) -> String {
    let param = RawHttpAdapter::new()
        .request_parameter(message, "message")
        .expect("message parameter");
    url_decode(&param.value)
}

#[test]
fn decode_then_encode_without_edits_is_equivalent() {
    let adapter = RawHttpAdapter::new();
    let codec = Codec::new(&adapter);
    let raw = url_encode(PAYLOAD);

    let value = codec.decode(&raw).unwrap();
    let round: Value = serde_json::from_str(&url_decode(&codec.encode(&value).unwrap())).unwrap();
    let original: Value = serde_json::from_str(PAYLOAD).unwrap();
    assert_eq!(round, original);

    let message = AuraRequestMessage::from_value(value).unwrap();
    assert_eq!(message.serialize().unwrap(), PAYLOAD);
}

#[test]
fn echoed_values_leave_message_unedited_and_identical() {
    let mut message = AuraRequestMessage::parse(PAYLOAD).unwrap();
    let before = message.serialize().unwrap();

    let params_text = message.action("88;a").unwrap().params_pretty();
    let report = message.apply_edits(vec![ActionEdit::new("88;a")
        .with_controller("CaseController")
        .with_method("getCases")
        .with_params(params_text)]);

    assert!(report.is_clean());
    assert!(report.changed.is_empty());
    assert!(!message.is_edited());
    assert_eq!(message.serialize().unwrap(), before);
}

#[test]
fn invalid_params_on_one_action_do_not_block_the_other() {
    let mut editor = ActionsEditor::new(RawHttpAdapter::new(), AuraConfig::default());
    editor.set_message(&aura_request(PAYLOAD), true);

    let report = editor.apply_edits(vec![
        ActionEdit::new("87;a").with_params("{\"recordDescriptor\": oops}"),
        ActionEdit::new("88;a").with_params(r#"{"status":"Closed","limit":25,"owners":["me","team"]}"#),
    ]);
    assert_eq!(report.failures.len(), 1);
    assert!(matches!(
        report.failures[0],
        AuraError::InvalidParamsJson { ref id, .. } if id == "87;a"
    ));

    let out = editor.get_message();
    let sent: Value = serde_json::from_str(&payload_of(&out.message)).unwrap();
    assert_eq!(sent["actions"][1]["params"]["status"], "Closed");
    assert_eq!(
        sent["actions"][0]["params"],
        json!({"recordDescriptor": "001xx000003DGb2AAG.undefined.null.null.null.Id,Name.VIEW.true.null.null.null"})
    );
}

#[test]
fn detection_boundaries() {
    let adapter = RawHttpAdapter::new();
    let msg = aura_request(PAYLOAD);
    let no_token = String::from_utf8(msg.clone())
        .unwrap()
        .replace("&aura.token=undefined", "")
        .into_bytes();

    assert!(!is_aura_request(&adapter, &[], None));
    assert!(!is_aura_request(&adapter, &no_token, None));
    assert!(!is_aura_request(&adapter, &msg, Some("/services/apexrest/cases")));
    assert!(is_aura_request(&adapter, &msg, None));
    assert!(is_aura_request(&adapter, &msg, Some("/s/sfsites/aura")));
}

#[test]
fn response_guard_check() {
    assert!(is_aura_response(b"while(1);{}", "JSON", b"while(1);{}"));
    assert!(!is_aura_response(b"while(1);{}", "script", b"while(1);{}"));
    assert!(!is_aura_response(b"while(1", "JSON", b"while(1"));

    let adapter = RawHttpAdapter::new();
    let response = b"HTTP/1.1 200 OK\r\nContent-Type: application/json;charset=UTF-8\r\n\r\nwhile(1);\n{\"actions\":[]}";
    assert!(detect_response(&adapter, response));
}

#[test]
fn function_literal_response_falls_back_to_exact_text() {
    let body = "while(1);\n{\"actions\":[{\"id\":\"88;a\",\"state\":\"SUCCESS\",\"returnValue\":[],\"error\":[]}],\"context\":{\"globalValueProviders\":[{\"type\":\"$Label\",\"values\":{\"render\":function(cmp, helper){ helper.go(cmp); }}}]}}";
    let parsed = AuraResponseMessage::parse(body);
    let raw = parsed.raw().expect("raw fallback");
    assert_eq!(raw.text, body);
    assert_eq!(raw.salvaged[0].id(), "88;a");
}

#[test]
fn ids_survive_re_decode() {
    let mut message = AuraRequestMessage::parse(PAYLOAD).unwrap();
    message
        .action_mut("87;a")
        .unwrap()
        .set_method("getRecordWithFields");

    let again = AuraRequestMessage::parse(&message.serialize().unwrap()).unwrap();
    assert_eq!(
        again.ids().collect::<Vec<_>>(),
        message.ids().collect::<Vec<_>>()
    );
    assert_eq!(again.action("87;a").unwrap().method(), "getRecordWithFields");
}

#[test]
fn untouched_parameters_keep_their_bytes() {
    let mut editor = ActionsEditor::new(RawHttpAdapter::new(), AuraConfig::default());
    let msg = aura_request(PAYLOAD);
    editor.set_message(&msg, true);
    editor
        .request_mut()
        .unwrap()
        .action_mut("88;a")
        .unwrap()
        .set_controller("CaseAdminController");

    let out = String::from_utf8(editor.get_message().message).unwrap();
    let original = String::from_utf8(msg).unwrap();
    let tail = "&aura.context=%7B%22mode%22%3A%22PROD%22%2C%22app%22%3A%22siteforce%3AcommunityApp%22%7D&aura.pageURI=%2Fs%2F&aura.token=undefined";
    assert!(out.ends_with(tail));
    assert!(out.starts_with("POST /s/sfsites/aura?r=12&other.Case.getCases=1 HTTP/1.1\r\n"));

    let body_len = out.len() - out.find("\r\n\r\n").unwrap() - 4;
    assert!(out.contains(&format!("Content-Length: {}\r\n", body_len)));
    assert_ne!(out, original);
}
