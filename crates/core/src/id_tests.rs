// SPDX-License-Identifier: MIT

use crate::action::MasterActionId;
use crate::change_record::ChangeId;

#[test]
fn new_id_carries_its_prefix() {
    let id = MasterActionId::new();
    assert!(id.as_str().starts_with("ma-"));
}

#[test]
fn display_matches_as_str() {
    let id = ChangeId::new();
    assert_eq!(id.to_string(), id.as_str());
}

#[test]
fn from_string_round_trips() {
    let raw = "ma-3fa85f64-5717-4562-b3fc-2c963f66afa6";
    let id = MasterActionId::from_string(raw);
    assert_eq!(id.as_str(), raw);
    assert_eq!(id, *raw);
}

#[test]
fn two_generated_ids_differ() {
    assert_ne!(MasterActionId::new(), MasterActionId::new());
}

#[test]
fn serializes_as_bare_string() {
    let id = MasterActionId::from_string("ma-fixed-id");
    let json = serde_json::to_string(&id).expect("serialize");
    assert_eq!(json, "\"ma-fixed-id\"");
    let back: MasterActionId = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(back, id);
}
