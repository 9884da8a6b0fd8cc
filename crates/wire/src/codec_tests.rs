// SPDX-License-Identifier: MIT

use super::*;
use crate::messages::MasterToSlave;
use fleet_core::NodeActionId;

#[test]
fn encode_prefixes_four_byte_big_endian_length() {
    let msg = MasterToSlave::MasterStateUpdate { message: "hi".into() };
    let framed = encode(&msg).unwrap();
    let body = serde_json::to_vec(&msg).unwrap();
    let len = u32::from_be_bytes(framed[0..4].try_into().unwrap());
    assert_eq!(len as usize, body.len());
    assert_eq!(&framed[4..], body.as_slice());
}

#[test]
fn decode_reverses_encode() {
    let msg = MasterToSlave::RequestLogFlushForTask { node_action_id: NodeActionId::from_string("na-1") };
    let framed = encode(&msg).unwrap();
    let decoded: MasterToSlave = decode(&framed[4..]).unwrap();
    assert_eq!(decoded, msg);
}

#[tokio::test]
async fn write_then_read_round_trips_over_a_pipe() {
    let msg = MasterToSlave::AdjustSystemTime { epoch_ms: 42 };
    let mut buf = Vec::new();
    write_message(&mut buf, &msg).await.unwrap();

    let mut cursor = std::io::Cursor::new(buf);
    let decoded: MasterToSlave = read_message(&mut cursor).await.unwrap();
    assert_eq!(decoded, msg);
}

#[tokio::test]
async fn read_message_rejects_oversized_frame() {
    let mut buf = Vec::new();
    buf.extend_from_slice(&(MAX_FRAME_LEN + 1).to_be_bytes());
    let mut cursor = std::io::Cursor::new(buf);
    let result: Result<MasterToSlave, _> = read_message(&mut cursor).await;
    assert!(matches!(result, Err(ProtocolError::FrameTooLarge(_))));
}
