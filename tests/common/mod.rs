#![allow(dead_code)]

use mineproxy::session::SessionSettings;
use serde_json::{json, Value as JsonValue};
use std::path::Path;

pub fn settings_with_capacity(capacity: usize, census_output: &Path) -> SessionSettings {
    SessionSettings {
        window_capacity: capacity,
        census_output: census_output.to_path_buf(),
        ..SessionSettings::default()
    }
}

pub fn chat_frame(sender: &str, message: &str) -> String {
    json!({
        "header": {
            "version": 1,
            "requestId": "00000000-0000-0000-0000-000000000000",
            "messagePurpose": "event",
            "messageType": "event"
        },
        "body": {
            "eventName": "PlayerMessage",
            "properties": { "Sender": sender, "Message": message }
        }
    })
    .to_string()
}

pub fn ack_frame(request_id: &str, status_code: i64, status_message: &str) -> String {
    json!({
        "header": {
            "version": 1,
            "requestId": request_id,
            "messagePurpose": "commandResponse",
            "messageType": "commandResponse"
        },
        "body": { "statusCode": status_code, "statusMessage": status_message }
    })
    .to_string()
}

pub fn ack_frame_without_status(request_id: &str, status_message: &str) -> String {
    json!({
        "header": {
            "version": 1,
            "requestId": request_id,
            "messagePurpose": "commandResponse",
            "messageType": "commandResponse"
        },
        "body": { "statusMessage": status_message }
    })
    .to_string()
}

pub fn probe_ack_frame(request_id: &str, block: &str, y: i64) -> String {
    json!({
        "header": {
            "version": 1,
            "requestId": request_id,
            "messagePurpose": "commandResponse",
            "messageType": "commandResponse"
        },
        "body": {
            "statusCode": -2147352576,
            "statusMessage": format!("The block at 0,{y},0 is {block} (expected: Air)."),
            "position": { "x": 0, "y": y, "z": 0 }
        }
    })
    .to_string()
}

fn parse(frame: &str) -> JsonValue {
    serde_json::from_str(frame).expect("frames are JSON")
}

pub fn request_id(frame: &str) -> String {
    parse(frame)["header"]["requestId"]
        .as_str()
        .expect("requestId present")
        .to_string()
}

pub fn command_line(frame: &str) -> String {
    parse(frame)["body"]["commandLine"]
        .as_str()
        .expect("commandLine present")
        .to_string()
}

pub fn purpose(frame: &str) -> String {
    parse(frame)["header"]["messagePurpose"]
        .as_str()
        .expect("messagePurpose present")
        .to_string()
}
