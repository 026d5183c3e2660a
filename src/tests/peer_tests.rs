// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use crate::error::KernelError;
use crate::peer::{Peer, PeerRegistry};
use crate::types::id::PeerId;
use std::string::ToString;
use std::vec::Vec;

fn peer(id: i16) -> Peer {
    Peer { id: PeerId(id), address: format!("http://10.0.0.{}:7000", id) }
}

#[test]
fn test_registry_lookup() {
    let reg = PeerRegistry::new(PeerId(1), vec![peer(3), peer(1), peer(2)]).unwrap();
    assert_eq!(reg.len(), 3);
    assert_eq!(reg.self_id(), PeerId(1));
    assert_eq!(reg.get(PeerId(2)).unwrap().address, "http://10.0.0.2:7000");
    assert!(reg.get(PeerId(9)).is_none());
    assert!(reg.contains(PeerId(3)));
}

#[test]
fn test_registry_sorted_and_remotes_exclude_self() {
    let reg = PeerRegistry::new(PeerId(2), vec![peer(3), peer(1), peer(2)]).unwrap();
    let ids: Vec<i16> = reg.iter().map(|p| p.id.0).collect();
    assert_eq!(ids, vec![1, 2, 3]);
    let remotes: Vec<i16> = reg.remotes().map(|p| p.id.0).collect();
    assert_eq!(remotes, vec![1, 3]);
}

#[test]
fn test_registry_rejects_duplicates() {
    let res = PeerRegistry::new(PeerId(1), vec![peer(1), peer(2), peer(2)]);
    assert_eq!(res.unwrap_err(), KernelError::DuplicatePeer(2));
}

#[test]
fn test_peer_accepts_domain_alias() {
    let p: Peer = serde_json::from_str(r#"{"id": 4, "domain": "http://peer4:7000"}"#).unwrap();
    assert_eq!(p.id, PeerId(4));
    assert_eq!(p.address, "http://peer4:7000".to_string());
}
