use anyhow::Result;
use tempfile::tempdir;

use super::helpers::{key_only_config, open_db, test_config};
use crate::{Db, Error};

// --------------------- Basic set / get / rem ---------------------

#[test]
fn set_and_get() -> Result<()> {
    let dir = tempdir()?;
    let db = open_db(dir.path());

    db.set(b"name", b"alice")?;
    assert_eq!(db.get(b"name")?, b"alice");
    Ok(())
}

#[test]
fn get_missing_key() {
    let dir = tempdir().unwrap();
    let db = open_db(dir.path());

    assert!(matches!(db.get(b"nope"), Err(Error::KeyNotFound)));
}

#[test]
fn overwrite_returns_latest() -> Result<()> {
    let dir = tempdir()?;
    let db = open_db(dir.path());

    db.set(b"k", b"v1")?;
    db.set(b"k", b"v2")?;
    assert_eq!(db.get(b"k")?, b"v2");
    assert_eq!(db.str_len(b"k"), 2);
    Ok(())
}

#[test]
fn str_rem_removes_key() -> Result<()> {
    let dir = tempdir()?;
    let db = open_db(dir.path());

    db.set(b"k", b"v")?;
    db.str_rem(b"k")?;
    assert!(matches!(db.get(b"k"), Err(Error::KeyNotFound)));
    assert!(!db.str_exists(b"k"));

    // Removing an absent key is a no-op.
    db.str_rem(b"k")?;
    Ok(())
}

#[test]
fn set_after_rem_resurrects() -> Result<()> {
    let dir = tempdir()?;
    let db = open_db(dir.path());

    db.set(b"k", b"v1")?;
    db.str_rem(b"k")?;
    db.set(b"k", b"v2")?;
    assert_eq!(db.get(b"k")?, b"v2");
    Ok(())
}

// --------------------- Argument validation ---------------------

#[test]
fn empty_key_rejected() {
    let dir = tempdir().unwrap();
    let db = open_db(dir.path());

    assert!(matches!(db.set(b"", b"v"), Err(Error::EmptyKey)));
    assert!(matches!(db.get(b""), Err(Error::EmptyKey)));
}

#[test]
fn oversized_key_rejected() {
    let dir = tempdir().unwrap();
    let db = open_db(dir.path());

    let big_key = vec![b'k'; db.config().max_key_size as usize + 1];
    assert!(matches!(db.set(&big_key, b"v"), Err(Error::KeyTooLarge)));
}

#[test]
fn oversized_value_rejected() {
    let dir = tempdir().unwrap();
    let db = open_db(dir.path());

    let big_val = vec![b'v'; db.config().max_value_size as usize + 1];
    assert!(matches!(db.set(b"k", &big_val), Err(Error::ValueTooLarge)));
}

#[test]
fn max_sized_key_accepted() -> Result<()> {
    let dir = tempdir()?;
    let db = open_db(dir.path());

    let max_key = vec![b'k'; db.config().max_key_size as usize];
    db.set(&max_key, b"v")?;
    assert_eq!(db.get(&max_key)?, b"v");
    Ok(())
}

// --------------------- set_nx / get_set / append ---------------------

#[test]
fn set_nx_only_when_absent() -> Result<()> {
    let dir = tempdir()?;
    let db = open_db(dir.path());

    assert!(db.set_nx(b"k", b"v1")?);
    assert!(!db.set_nx(b"k", b"v2")?);
    assert_eq!(db.get(b"k")?, b"v1");
    Ok(())
}

#[test]
fn get_set_returns_old_value() -> Result<()> {
    let dir = tempdir()?;
    let db = open_db(dir.path());

    db.set(b"k", b"old")?;
    assert_eq!(db.get_set(b"k", b"new")?, b"old");
    assert_eq!(db.get(b"k")?, b"new");

    assert!(matches!(db.get_set(b"nope", b"v"), Err(Error::KeyNotFound)));
    Ok(())
}

#[test]
fn append_extends_or_creates() -> Result<()> {
    let dir = tempdir()?;
    let db = open_db(dir.path());

    db.append(b"k", b"foo")?;
    db.append(b"k", b"bar")?;
    assert_eq!(db.get(b"k")?, b"foobar");
    assert_eq!(db.str_len(b"k"), 6);
    Ok(())
}

// --------------------- str_len / str_exists ---------------------

#[test]
fn str_len_of_missing_is_zero() {
    let dir = tempdir().unwrap();
    let db = open_db(dir.path());
    assert_eq!(db.str_len(b"nope"), 0);
}

#[test]
fn binary_keys_and_values() -> Result<()> {
    let dir = tempdir()?;
    let db = open_db(dir.path());

    let key = vec![0x00u8, 0xFF, 0x80];
    let val = vec![0xDEu8, 0xAD, 0xBE, 0xEF];
    db.set(&key, &val)?;
    assert_eq!(db.get(&key)?, val);
    Ok(())
}

// --------------------- Scans ---------------------

fn scan_fixture(db: &Db) -> Result<()> {
    for key in [&b"abc"[..], b"abd", b"abx", b"ay"] {
        db.set(key, key)?;
    }
    Ok(())
}

#[test]
fn prefix_scan_in_key_order() -> Result<()> {
    let dir = tempdir()?;
    let db = open_db(dir.path());
    scan_fixture(&db)?;

    let values = db.prefix_scan(b"ab", -1, 0)?;
    assert_eq!(
        values,
        vec![b"abc".to_vec(), b"abd".to_vec(), b"abx".to_vec()]
    );
    Ok(())
}

#[test]
fn prefix_scan_limit_and_offset() -> Result<()> {
    let dir = tempdir()?;
    let db = open_db(dir.path());
    scan_fixture(&db)?;

    assert_eq!(db.prefix_scan(b"ab", 2, 0)?.len(), 2);
    assert_eq!(db.prefix_scan(b"ab", -1, 1)?, vec![b"abd".to_vec(), b"abx".to_vec()]);
    assert!(db.prefix_scan(b"ab", 0, 0)?.is_empty());
    assert!(db.prefix_scan(b"zz", -1, 0)?.is_empty());
    Ok(())
}

#[test]
fn range_scan_inclusive_ascending() -> Result<()> {
    let dir = tempdir()?;
    let db = open_db(dir.path());

    for i in 1..=9u32 {
        let key = format!("k{i}");
        db.set(key.as_bytes(), key.as_bytes())?;
    }

    let values = db.range_scan(b"k3", b"k7")?;
    assert_eq!(
        values,
        vec![
            b"k3".to_vec(),
            b"k4".to_vec(),
            b"k5".to_vec(),
            b"k6".to_vec(),
            b"k7".to_vec()
        ]
    );
    Ok(())
}

// --------------------- Key-only index mode ---------------------

#[test]
fn key_only_mode_reads_from_disk() -> Result<()> {
    let dir = tempdir()?;
    let db = Db::open(key_only_config(dir.path()))?;

    db.set(b"k", b"on-disk")?;
    db.set(b"k", b"latest")?;
    assert_eq!(db.get(b"k")?, b"latest");
    assert_eq!(db.str_len(b"k"), 6);

    db.str_rem(b"k")?;
    assert!(matches!(db.get(b"k"), Err(Error::KeyNotFound)));
    Ok(())
}

#[test]
fn key_only_mode_scans() -> Result<()> {
    let dir = tempdir()?;
    let db = Db::open(key_only_config(dir.path()))?;
    scan_fixture(&db)?;

    let values = db.prefix_scan(b"ab", -1, 0)?;
    assert_eq!(
        values,
        vec![b"abc".to_vec(), b"abd".to_vec(), b"abx".to_vec()]
    );
    Ok(())
}

// --------------------- Concurrent writers ---------------------

#[test]
fn concurrent_string_writers() -> Result<()> {
    let dir = tempdir()?;
    let db = std::sync::Arc::new(open_db(dir.path()));

    let mut handles = Vec::new();
    for t in 0..4u32 {
        let db = db.clone();
        handles.push(std::thread::spawn(move || {
            for i in 0..50u32 {
                let key = format!("t{t}-k{i}");
                db.set(key.as_bytes(), key.as_bytes()).unwrap();
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    for t in 0..4u32 {
        for i in 0..50u32 {
            let key = format!("t{t}-k{i}");
            assert_eq!(db.get(key.as_bytes())?, key.as_bytes());
        }
    }
    Ok(())
}

// --------------------- Identical-value skip still clears TTL ---------------------

#[test]
fn rewriting_same_value_is_cheap_but_clears_ttl() -> Result<()> {
    let dir = tempdir()?;
    let db = Db::open(test_config(dir.path()))?;

    db.set(b"k", b"v")?;
    db.expire(b"k", 100)?;
    db.set(b"k", b"v")?;
    assert_eq!(db.ttl(b"k"), 0);
    assert_eq!(db.get(b"k")?, b"v");
    Ok(())
}
