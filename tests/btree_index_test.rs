//! Integration tests for B+tree insert, delete, search and persistence.
//!
//! Most tests use tiny logical pages so that a handful of keys already
//! produces a multi-level tree.

use std::fs::OpenOptions;
use std::io::{Seek, SeekFrom, Write};

use ixstore::index::{
    AttrType, CompOp, DeleteOutcome, IndexHandle, IndexManager, IndexScan, InsertOutcome,
    NodeLayout,
};
use ixstore::{Error, IndexConfig, Rid, PAGE_SIZE};
use tempfile::{tempdir, TempDir};

fn k(v: i32) -> [u8; 4] {
    v.to_le_bytes()
}

fn setup(order: usize) -> (IndexManager, IndexHandle, TempDir) {
    let dir = tempdir().unwrap();
    let mut mgr = IndexManager::new(IndexConfig::new(dir.path()).with_pool_size(16));
    mgr.create_index("rel", 0, AttrType::Int, 4, NodeLayout::page_size_for(order, 4))
        .unwrap();
    let handle = mgr.open_index("rel", 0).unwrap();
    assert_eq!(handle.order(), order);
    (mgr, handle, dir)
}

fn scan_all(handle: &IndexHandle) -> Vec<(i32, Rid)> {
    IndexScan::open(handle, CompOp::NoOp, None, false)
        .unwrap()
        .map(|entry| {
            let entry = entry.unwrap();
            (i32::from_le_bytes(entry.key.try_into().unwrap()), entry.rid)
        })
        .collect()
}

fn scan_keys(handle: &IndexHandle) -> Vec<i32> {
    scan_all(handle).into_iter().map(|(key, _)| key).collect()
}

#[test]
fn test_order_three_scenario() {
    let (mut mgr, mut handle, _dir) = setup(3);

    for (slot, v) in [100, 102, 3, 5, 11, 31, 30].into_iter().enumerate() {
        assert_eq!(
            handle.insert_entry(&k(v), Rid::new(1, slot as i32)).unwrap(),
            InsertOutcome::Inserted
        );
        handle.verify().unwrap();
    }
    assert_eq!(handle.height(), 3);

    handle.insert_entry(&k(32), Rid::new(1, 7)).unwrap();
    assert_eq!(handle.height(), 3);
    assert_eq!(scan_keys(&handle), vec![3, 5, 11, 30, 31, 32, 100, 102]);

    let stats = handle.verify().unwrap();
    assert_eq!(stats.entries, 8);
    assert_eq!(stats.leaf_pages, 4);
    assert_eq!(stats.internal_pages, 3);

    mgr.close_index(handle).unwrap();
}

#[test]
fn test_overflowing_root_leaf_grows_tree() {
    let (_mgr, mut handle, _dir) = setup(4);

    for v in 0..4 {
        handle.insert_entry(&k(v), Rid::new(0, v)).unwrap();
    }
    assert_eq!(handle.height(), 1);
    assert_eq!(handle.verify().unwrap().leaf_pages, 1);

    handle.insert_entry(&k(4), Rid::new(0, 4)).unwrap();
    let stats = handle.verify().unwrap();
    assert_eq!(handle.height(), 2);
    assert_eq!(stats.leaf_pages, 2);
    assert_eq!(stats.internal_pages, 1);
}

#[test]
fn test_delete_cascade_and_root_collapse() {
    let (_mgr, mut handle, _dir) = setup(3);
    for (slot, v) in [100, 102, 3, 5, 11, 31, 30, 32].into_iter().enumerate() {
        handle.insert_entry(&k(v), Rid::new(1, slot as i32)).unwrap();
    }
    assert_eq!(handle.height(), 3);

    // (key, slot, height after deleting it)
    let steps = [
        (102, 1, 3),
        (100, 0, 3),
        (32, 7, 2),
        (31, 5, 2),
        (30, 6, 2),
        (11, 4, 1),
        (5, 3, 1),
        (3, 2, 1),
    ];
    let mut remaining = vec![3, 5, 11, 30, 31, 32, 100, 102];
    for (v, slot, height) in steps {
        assert_eq!(
            handle.delete_entry(&k(v), Rid::new(1, slot)).unwrap(),
            DeleteOutcome::Deleted
        );
        remaining.retain(|&x| x != v);

        assert_eq!(handle.height(), height, "after deleting {v}");
        assert_eq!(scan_keys(&handle), remaining);
        handle.verify().unwrap();
    }

    assert_eq!(handle.verify().unwrap().entries, 0);
    assert_eq!(handle.search(&k(3)).unwrap(), None);
}

#[test]
fn test_duplicates_spanning_leaves() {
    let (_mgr, mut handle, _dir) = setup(3);

    for slot in 0..20 {
        handle.insert_entry(&k(7), Rid::new(2, slot)).unwrap();
        handle.insert_entry(&k(slot), Rid::new(3, slot)).unwrap();
    }
    let stats = handle.verify().unwrap();
    assert_eq!(stats.entries, 40);
    assert!(stats.leaf_pages > 7);

    assert_eq!(
        handle.insert_entry(&k(7), Rid::new(2, 13)).unwrap(),
        InsertOutcome::AlreadyExists
    );
    assert_eq!(
        handle.delete_entry(&k(7), Rid::new(9, 9)).unwrap(),
        DeleteOutcome::NotFound
    );

    let sevens = |h: &IndexHandle| {
        IndexScan::open(h, CompOp::Eq, Some(&k(7)), false)
            .unwrap()
            .count()
    };
    assert_eq!(sevens(&handle), 21);

    let found = handle.search(&k(7)).unwrap().unwrap();
    assert!(found == Rid::new(3, 7) || (found.page.0 == 2 && found.slot < 20));

    let mut expected = 21;
    for slot in (0..20).step_by(3) {
        assert_eq!(
            handle.delete_entry(&k(7), Rid::new(2, slot)).unwrap(),
            DeleteOutcome::Deleted
        );
        expected -= 1;
        assert_eq!(sevens(&handle), expected);
        handle.verify().unwrap();
    }

    // The pair deleted first is gone for good; its neighbours are not.
    assert_eq!(
        handle.delete_entry(&k(7), Rid::new(2, 0)).unwrap(),
        DeleteOutcome::NotFound
    );
    assert_eq!(
        handle.delete_entry(&k(7), Rid::new(2, 1)).unwrap(),
        DeleteOutcome::Deleted
    );
}

#[test]
fn test_insert_then_delete_restores_content() {
    let (_mgr, mut handle, _dir) = setup(4);
    for v in (0..60).step_by(2) {
        handle.insert_entry(&k(v), Rid::new(4, v)).unwrap();
    }

    for probe in [-5, 1, 17, 30, 59, 99] {
        let content = scan_all(&handle);
        let stats = handle.verify().unwrap();

        handle.insert_entry(&k(probe), Rid::new(8, probe)).unwrap();
        let grown = handle.verify().unwrap();
        handle.delete_entry(&k(probe), Rid::new(8, probe)).unwrap();

        assert_eq!(scan_all(&handle), content);
        let after = handle.verify().unwrap();
        if grown.leaf_pages == stats.leaf_pages {
            assert_eq!(after, stats);
        }
    }
}

#[test]
fn test_search_and_key_length() {
    let (_mgr, mut handle, _dir) = setup(5);
    for v in 0..50 {
        handle.insert_entry(&k(v * 10), Rid::new(v as u32, 0)).unwrap();
    }

    assert_eq!(handle.search(&k(120)).unwrap(), Some(Rid::new(12, 0)));
    assert_eq!(handle.search(&k(125)).unwrap(), None);
    assert_eq!(handle.search(&k(10_000)).unwrap(), None);

    assert!(matches!(
        handle.insert_entry(&[1, 2], Rid::new(0, 0)),
        Err(Error::KeyLength {
            expected: 4,
            actual: 2
        })
    ));
    assert!(matches!(
        handle.search(&[0; 8]),
        Err(Error::KeyLength { .. })
    ));
}

#[test]
fn test_reverse_and_negative_inserts() {
    let (_mgr, mut handle, _dir) = setup(3);
    for v in (-40..40).rev() {
        handle.insert_entry(&k(v), Rid::new(0, v)).unwrap();
    }
    handle.verify().unwrap();
    assert_eq!(scan_keys(&handle), (-40..40).collect::<Vec<_>>());
}

#[test]
fn test_persistence_across_reopen() {
    let (mut mgr, mut handle, _dir) = setup(4);
    for v in 0..200 {
        handle.insert_entry(&k((v * 37) % 101), Rid::new(v as u32, 1)).unwrap();
    }
    let content = scan_all(&handle);
    let height = handle.height();
    mgr.close_index(handle).unwrap();

    let handle = mgr.open_index("rel", 0).unwrap();
    assert_eq!(handle.height(), height);
    assert_eq!(handle.order(), 4);
    assert_eq!(scan_all(&handle), content);
    assert_eq!(handle.verify().unwrap().entries, 200);
}

#[test]
fn test_drop_without_close_flushes() {
    let (mut mgr, mut handle, _dir) = setup(3);
    for v in 0..30 {
        handle.insert_entry(&k(v), Rid::new(0, v)).unwrap();
    }
    drop(handle);

    let handle = mgr.open_index("rel", 0).unwrap();
    assert_eq!(scan_keys(&handle), (0..30).collect::<Vec<_>>());
    handle.verify().unwrap();
}

#[test]
fn test_free_pages_are_reused() {
    let (mut mgr, mut handle, _dir) = setup(3);
    let keys: Vec<i32> = (0..60).map(|v| (v * 7) % 61).collect();

    for &v in &keys {
        handle.insert_entry(&k(v), Rid::new(0, v)).unwrap();
    }
    let pages = handle.page_count();

    for &v in &keys {
        handle.delete_entry(&k(v), Rid::new(0, v)).unwrap();
    }
    assert_eq!(handle.height(), 1);
    assert_eq!(handle.page_count(), pages);

    for &v in &keys {
        handle.insert_entry(&k(v), Rid::new(0, v)).unwrap();
    }
    assert_eq!(handle.page_count(), pages);
    handle.verify().unwrap();

    // The free chain survives a reopen.
    for &v in &keys {
        handle.delete_entry(&k(v), Rid::new(0, v)).unwrap();
    }
    mgr.close_index(handle).unwrap();
    let mut handle = mgr.open_index("rel", 0).unwrap();
    for &v in &keys {
        handle.insert_entry(&k(v), Rid::new(0, v)).unwrap();
    }
    assert_eq!(handle.page_count(), pages);
    assert_eq!(handle.verify().unwrap().entries, 60);
}

#[test]
fn test_float_and_string_keys() {
    let dir = tempdir().unwrap();
    let mut mgr = IndexManager::new(IndexConfig::new(dir.path()).with_pool_size(8));
    mgr.create_index("f", 0, AttrType::Float, 4, 64).unwrap();
    mgr.create_index("s", 1, AttrType::String, 6, 70).unwrap();

    let mut floats = mgr.open_index("f", 0).unwrap();
    let values = [2.5f32, -1.0, 0.0, 1e6, -3.75, 0.5, 99.0, -0.25];
    for (slot, v) in values.iter().enumerate() {
        floats.insert_entry(&v.to_le_bytes(), Rid::new(0, slot as i32)).unwrap();
    }
    let scanned: Vec<f32> = IndexScan::open(&floats, CompOp::Gt, Some(&0.0f32.to_le_bytes()), false)
        .unwrap()
        .map(|e| f32::from_le_bytes(e.unwrap().key.try_into().unwrap()))
        .collect();
    assert_eq!(scanned, vec![0.5, 2.5, 99.0, 1e6]);
    floats.verify().unwrap();

    let mut strings = mgr.open_index("s", 1).unwrap();
    let words = ["pear\0\0", "apple\0", "fig\0\0\0", "banana", "cherry", "date\0\0"];
    for (slot, w) in words.iter().enumerate() {
        strings.insert_entry(w.as_bytes(), Rid::new(1, slot as i32)).unwrap();
    }
    let desc: Vec<Vec<u8>> = IndexScan::open(&strings, CompOp::NoOp, None, true)
        .unwrap()
        .map(|e| e.unwrap().key)
        .collect();
    let mut expected: Vec<Vec<u8>> = words.iter().map(|w| w.as_bytes().to_vec()).collect();
    expected.sort();
    expected.reverse();
    assert_eq!(desc, expected);
    assert_eq!(strings.search(b"fig\0\0\0").unwrap(), Some(Rid::new(1, 2)));

    mgr.close_index(floats).unwrap();
    mgr.close_index(strings).unwrap();
}

#[test]
fn test_two_frame_pool_survives_splits_and_collapses() {
    let dir = tempdir().unwrap();
    let mut mgr = IndexManager::new(IndexConfig::new(dir.path()).with_pool_size(2));
    mgr.create_index("rel", 0, AttrType::Int, 4, NodeLayout::page_size_for(3, 4))
        .unwrap();
    let mut handle = mgr.open_index("rel", 0).unwrap();

    for v in 0..40 {
        handle.insert_entry(&k(v), Rid::new(1, v)).unwrap();
    }
    assert!(handle.height() >= 3);
    assert_eq!(handle.verify().unwrap().entries, 40);

    for v in (0..40).filter(|v| v % 4 != 0) {
        assert_eq!(
            handle.delete_entry(&k(v), Rid::new(1, v)).unwrap(),
            DeleteOutcome::Deleted
        );
    }
    handle.verify().unwrap();
    assert_eq!(scan_keys(&handle), (0..40).step_by(4).collect::<Vec<_>>());
    mgr.close_index(handle).unwrap();
}

#[test]
fn test_corrupt_pages_are_reported() {
    let (mut mgr, mut handle, dir) = setup(3);
    for v in 0..20 {
        handle.insert_entry(&k(v), Rid::new(0, v)).unwrap();
    }
    // Page 1 started as the root leaf and stays the leftmost leaf.
    assert_ne!(handle.root_page().0, 1);
    mgr.close_index(handle).unwrap();

    let path = dir.path().join("rel.0");
    let flip = |offset: u64| {
        let mut file = OpenOptions::new().write(true).open(&path).unwrap();
        file.seek(SeekFrom::Start(offset)).unwrap();
        file.write_all(&[0xEE]).unwrap();
    };

    flip(PAGE_SIZE as u64 + 30);
    let handle = mgr.open_index("rel", 0).unwrap();
    assert!(matches!(
        IndexScan::open(&handle, CompOp::NoOp, None, false),
        Err(Error::ChecksumMismatch { page_id: 1, .. })
    ));
    // A descending scan starts on an intact leaf and fails once it reaches
    // the damaged one.
    let desc: std::result::Result<Vec<_>, _> =
        IndexScan::open(&handle, CompOp::NoOp, None, true).unwrap().collect();
    assert!(matches!(desc, Err(Error::ChecksumMismatch { page_id: 1, .. })));
    assert!(handle.search(&k(5)).unwrap().is_some());
    assert!(handle.verify().is_err());
    drop(handle);

    flip(20);
    assert!(matches!(
        mgr.open_index("rel", 0),
        Err(Error::ChecksumMismatch { page_id: 0, .. })
    ));
}
