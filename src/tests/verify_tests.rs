// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use crate::error::KernelError;
use crate::types::amount::Amount;
use crate::types::id::PeerId;
use crate::types::row::ArchiveRow;
use crate::verify::verify_block;
use std::string::String;
use std::vec::Vec;

fn row(peer: i16, seq: u64) -> ArchiveRow {
    ArchiveRow {
        peer_id: PeerId(peer),
        seq,
        typ: 1,
        acct: String::from("acct-1"),
        name: String::from("alice"),
        remark: String::new(),
        amt: Amount(100),
        stamp: 0,
    }
}

fn rows(peer: i16, seqs: core::ops::Range<u64>) -> Vec<ArchiveRow> {
    seqs.map(|s| row(peer, s)).collect()
}

#[test]
fn test_contiguous_extension_accepted() {
    let batch = rows(2, 5000..5010);
    let fresh = verify_block(PeerId(2), 5, Some(4999), &[], &batch).unwrap();
    assert_eq!(fresh.len(), 10);
    assert_eq!(fresh.last().unwrap().seq, 5009);
}

#[test]
fn test_empty_partition_starts_at_zero() {
    let batch = rows(2, 0..3);
    assert_eq!(verify_block(PeerId(2), 0, None, &[], &batch).unwrap().len(), 3);

    let late = rows(2, 1..3);
    assert_eq!(
        verify_block(PeerId(2), 0, None, &[], &late),
        Err(KernelError::Gap { expected: 0, found: 1 })
    );
}

#[test]
fn test_known_prefix_of_partial_block_skipped() {
    let committed = rows(2, 5000..5004);
    let batch = rows(2, 5000..5012);
    let fresh = verify_block(PeerId(2), 5, Some(5003), &committed, &batch).unwrap();
    assert_eq!(fresh.first().unwrap().seq, 5004);
    assert_eq!(fresh.len(), 8);

    // Nothing new yet.
    let stale = rows(2, 5000..5004);
    assert!(verify_block(PeerId(2), 5, Some(5003), &committed, &stale).unwrap().is_empty());
}

#[test]
fn test_rewritten_prefix_row_rejected() {
    let committed = rows(2, 1000..1003);
    let mut batch = rows(2, 1000..1008);
    batch[1].acct = String::from("evil");
    batch[1].amt = Amount(999_999);
    assert_eq!(
        verify_block(PeerId(2), 1, Some(1002), &committed, &batch),
        Err(KernelError::Divergent { seq: 1001 })
    );

    // A resent row the local copy never had is just as suspect.
    let partial = rows(2, 1001..1003);
    assert_eq!(
        verify_block(PeerId(2), 1, Some(1002), &partial, &rows(2, 1000..1004)),
        Err(KernelError::Divergent { seq: 1000 })
    );
}

#[test]
fn test_gap_rejected() {
    let batch = rows(2, 5050..5060);
    assert_eq!(
        verify_block(PeerId(2), 5, Some(4999), &[], &batch),
        Err(KernelError::Gap { expected: 5000, found: 5050 })
    );

    let mut holed = rows(2, 5000..5005);
    holed.remove(2);
    assert_eq!(
        verify_block(PeerId(2), 5, Some(4999), &[], &holed),
        Err(KernelError::Gap { expected: 5002, found: 5003 })
    );
}

#[test]
fn test_overlap_rejected() {
    let mut dup = rows(2, 5000..5003);
    dup.push(row(2, 5002));
    assert_eq!(
        verify_block(PeerId(2), 5, Some(4999), &[], &dup),
        Err(KernelError::Overlap { seq: 5002 })
    );
}

#[test]
fn test_foreign_and_out_of_block_rows_rejected() {
    let mut batch = rows(2, 5000..5002);
    batch.push(row(3, 5002));
    assert_eq!(
        verify_block(PeerId(2), 5, Some(4999), &[], &batch),
        Err(KernelError::ForeignRow { expected: 2, found: 3 })
    );

    let spill = rows(2, 5998..6001);
    assert_eq!(
        verify_block(PeerId(2), 5, Some(5997), &[], &spill),
        Err(KernelError::OutsideBlock { seq: 6000, block_id: 5 })
    );
}
