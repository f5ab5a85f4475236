use livewatch_obs_protocol::{
    encode_identify, encode_request, identify_for, op, parse_server_message, Request,
    RequestType, ServerMessage,
};
use serde_json::Value;

const HELLO_WITH_AUTH: &str = r#"{
    "op": 0,
    "d": {
        "obsWebSocketVersion": "5.1.0",
        "rpcVersion": 1,
        "authentication": {
            "challenge": "+IxH4CnCiqpX1rM9scsNynZzbOe4KhDeYcTNS3PDaeY=",
            "salt": "lM1GncleQOaCu9lT1yeUZhFYnqhsLLP1G5lAGo3ixaI="
        }
    }
}"#;

#[test]
fn answers_hello_challenge_with_identify() {
    let ServerMessage::Hello(hello) = parse_server_message(HELLO_WITH_AUTH).expect("parse hello")
    else {
        panic!("expected hello");
    };

    let identify = identify_for(&hello, Some("supersecretpassword")).expect("identify");
    let frame: Value =
        serde_json::from_str(&encode_identify(&identify).expect("encode")).expect("json");

    assert_eq!(frame["op"], u64::from(op::IDENTIFY));
    assert_eq!(frame["d"]["rpcVersion"], 1);
    assert_eq!(
        frame["d"]["authentication"],
        "1Ct943GAT+6YQUUX47Ia/ncufilbe6+oD6lY+5kaCu4="
    );
}

#[test]
fn matches_response_to_request_by_id() {
    let request = Request::new(RequestType::StopRecord);
    let frame: Value =
        serde_json::from_str(&encode_request(&request).expect("encode")).expect("json");
    assert_eq!(frame["d"]["requestType"], "StopRecord");

    let reply = format!(
        r#"{{"op":7,"d":{{"requestType":"StopRecord","requestId":"{}","requestStatus":{{"result":true,"code":100}},"responseData":{{"outputPath":"/tmp/rec.mkv"}}}}}}"#,
        request.request_id
    );
    let ServerMessage::RequestResponse(response) = parse_server_message(&reply).expect("parse")
    else {
        panic!("expected request response");
    };

    assert_eq!(response.request_id, request.request_id);
    assert!(response.request_status.is_success());
    assert_eq!(
        response.response_data.expect("data")["outputPath"],
        "/tmp/rec.mkv"
    );
}

#[test]
fn events_parse_so_they_can_be_skipped() {
    let message = parse_server_message(
        r#"{"op":5,"d":{"eventType":"RecordStateChanged","eventIntent":64,"eventData":{"outputActive":true}}}"#,
    )
    .expect("parse event");
    assert!(
        matches!(message, ServerMessage::Event(event) if event.event_type == "RecordStateChanged")
    );
}
