//! Integration tests for IndexScan positioning and predicates.
//!
//! Every positioned scan must produce exactly what a full scan filtered by
//! the same predicate produces, in the same order.

use ixstore::index::{AttrType, CompOp, IndexHandle, IndexManager, IndexScan, NodeLayout};
use ixstore::{Error, IndexConfig, Rid};
use tempfile::{tempdir, TempDir};

const OPS: [CompOp; 7] = [
    CompOp::NoOp,
    CompOp::Eq,
    CompOp::Ne,
    CompOp::Lt,
    CompOp::Le,
    CompOp::Gt,
    CompOp::Ge,
];

fn open_index(order: usize) -> (IndexManager, IndexHandle, TempDir) {
    let dir = tempdir().unwrap();
    let mut mgr = IndexManager::new(IndexConfig::new(dir.path()).with_pool_size(8));
    mgr.create_index("scan", 0, AttrType::Int, 4, NodeLayout::page_size_for(order, 4))
        .unwrap();
    let handle = mgr.open_index("scan", 0).unwrap();
    (mgr, handle, dir)
}

fn collect(handle: &IndexHandle, op: CompOp, value: Option<i32>, desc: bool) -> Vec<(i32, Rid)> {
    let value = value.map(i32::to_le_bytes);
    IndexScan::open(handle, op, value.as_ref().map(|v| v.as_slice()), desc)
        .unwrap()
        .map(|e| {
            let e = e.unwrap();
            (i32::from_le_bytes(e.key.try_into().unwrap()), e.rid)
        })
        .collect()
}

fn reference(all: &[(i32, Rid)], op: CompOp, value: i32, desc: bool) -> Vec<(i32, Rid)> {
    let mut out: Vec<(i32, Rid)> = all
        .iter()
        .copied()
        .filter(|(key, _)| op.holds(key.cmp(&value)))
        .collect();
    if desc {
        out.reverse();
    }
    out
}

/// Keys 0..10 with runs of duplicates long enough to span several leaves.
fn populate(handle: &mut IndexHandle) {
    let mut slot = 0;
    for round in 0..8 {
        for key in [4i32, 0, 9, 2, 7, 5, 1, 8, 6, 3] {
            if key % 3 == 0 || round < 2 {
                handle
                    .insert_entry(&key.to_le_bytes(), Rid::new(round, slot))
                    .unwrap();
                slot += 1;
            }
        }
    }
}

#[test]
fn test_positioned_scans_match_filtered_full_scan() {
    let (_mgr, mut handle, _dir) = open_index(3);
    populate(&mut handle);
    handle.verify().unwrap();

    let all = collect(&handle, CompOp::NoOp, None, false);
    assert!(all.windows(2).all(|w| w[0].0 <= w[1].0));

    for value in -1..=10 {
        for op in OPS {
            for desc in [false, true] {
                assert_eq!(
                    collect(&handle, op, Some(value), desc),
                    reference(&all, op, value, desc),
                    "op {op:?} value {value} desc {desc}"
                );
            }
        }
    }
}

#[test]
fn test_descending_full_scan_is_reverse() {
    let (_mgr, mut handle, _dir) = open_index(4);
    populate(&mut handle);

    let mut asc = collect(&handle, CompOp::NoOp, None, false);
    let desc = collect(&handle, CompOp::NoOp, None, true);
    asc.reverse();
    assert_eq!(asc, desc);
}

#[test]
fn test_eq_on_absent_key_is_empty() {
    let (_mgr, mut handle, _dir) = open_index(3);
    for v in (0i32..40).step_by(5) {
        handle.insert_entry(&v.to_le_bytes(), Rid::new(0, v)).unwrap();
    }

    for desc in [false, true] {
        assert!(collect(&handle, CompOp::Eq, Some(12), desc).is_empty());
        assert!(collect(&handle, CompOp::Eq, Some(100), desc).is_empty());
        assert!(collect(&handle, CompOp::Eq, Some(-3), desc).is_empty());
        assert_eq!(collect(&handle, CompOp::Eq, Some(15), desc).len(), 1);
    }
}

#[test]
fn test_scan_on_empty_index() {
    let (_mgr, handle, _dir) = open_index(3);
    for op in OPS {
        for desc in [false, true] {
            assert!(collect(&handle, op, Some(1), desc).is_empty());
        }
    }
}

#[test]
fn test_closed_scan_rejects_next() {
    let (_mgr, mut handle, _dir) = open_index(3);
    populate(&mut handle);

    let mut scan = IndexScan::open(&handle, CompOp::Ge, Some(&5i32.to_le_bytes()), false).unwrap();
    let first = scan.get_next_entry().unwrap().unwrap();
    assert_eq!(first.key, 5i32.to_le_bytes().to_vec());
    assert!(scan.is_open());

    scan.close();
    assert!(!scan.is_open());
    assert!(matches!(scan.get_next_entry(), Err(Error::ScanClosed)));
    assert!(scan.next().is_none());
}

#[test]
fn test_exhausted_scan_keeps_returning_none() {
    let (_mgr, mut handle, _dir) = open_index(3);
    populate(&mut handle);

    let mut scan = IndexScan::open(&handle, CompOp::Gt, Some(&8i32.to_le_bytes()), false).unwrap();
    let mut seen = 0;
    while let Some(entry) = scan.get_next_entry().unwrap() {
        assert_eq!(entry.key, 9i32.to_le_bytes().to_vec());
        seen += 1;
    }
    assert_eq!(seen, 8);
    assert!(scan.get_next_entry().unwrap().is_none());
}

#[test]
fn test_scan_value_length_checked() {
    let (_mgr, handle, _dir) = open_index(3);
    assert!(matches!(
        IndexScan::open(&handle, CompOp::Eq, Some(&[1, 2, 3]), false),
        Err(Error::KeyLength { .. })
    ));
}
