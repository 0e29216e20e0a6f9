use super::*;

#[test]
fn test_open_providers_wire_format() {
    let json = r#"{
        "type": "OPEN_AI_PROVIDERS",
        "urls": ["https://chatgpt.com/", "https://claude.ai/"],
        "prompt": "Explain recursion",
        "autoSend": false,
        "followUpMode": true
    }"#;
    let msg: RuntimeMessage = serde_json::from_str(json).unwrap();
    match msg {
        RuntimeMessage::OpenAiProviders {
            urls,
            prompt,
            auto_send,
            follow_up_mode,
        } => {
            assert_eq!(urls.len(), 2);
            assert_eq!(prompt, "Explain recursion");
            assert!(!auto_send);
            assert!(follow_up_mode);
        }
        other => panic!("unexpected message: {:?}", other),
    }
}

#[test]
fn test_follow_up_mode_defaults_to_false() {
    let json = r#"{"type": "FILL_PROMPT", "prompt": "hi", "autoSend": true}"#;
    let msg: RuntimeMessage = serde_json::from_str(json).unwrap();
    let instruction = msg.fill_instruction().unwrap();
    assert!(instruction.auto_send);
    assert!(!instruction.follow_up);
}

#[test]
fn test_prompt_sent_serializes_to_bare_type() {
    let json = serde_json::to_value(RuntimeMessage::PromptSent {}).unwrap();
    assert_eq!(json, serde_json::json!({"type": "PROMPT_SENT"}));
    let parsed: RuntimeMessage = serde_json::from_str(r#"{"type":"PROMPT_SENT"}"#).unwrap();
    assert_eq!(parsed.kind(), "PROMPT_SENT");
}

#[test]
fn test_fill_prompt_from_instruction_uses_camel_case() {
    let msg = RuntimeMessage::from(FillInstruction {
        prompt: "hello".to_string(),
        auto_send: false,
        follow_up: true,
    });
    let json = serde_json::to_value(&msg).unwrap();
    assert_eq!(json["type"], "FILL_PROMPT");
    assert_eq!(json["followUpMode"], true);
    assert_eq!(json["autoSend"], false);
}

#[test]
fn test_unknown_type_is_rejected() {
    let result = serde_json::from_str::<RuntimeMessage>(r#"{"type":"DELETE_EVERYTHING"}"#);
    assert!(result.is_err());
}

#[test]
fn test_ack_shapes() {
    assert_eq!(
        serde_json::to_string(&MessageAck::ok()).unwrap(),
        r#"{"success":true}"#
    );
    assert!(!MessageAck::rejected().success);
}
