use std::thread;
use std::time::Duration;

use anyhow::Result;
use tempfile::tempdir;

use super::helpers::{open_db, test_config};
use crate::{Db, Error};

#[test]
fn expired_key_reads_as_expired_then_absent() -> Result<()> {
    let dir = tempdir()?;
    let db = open_db(dir.path());

    db.set(b"k", b"v")?;
    db.expire(b"k", 1)?;
    thread::sleep(Duration::from_secs(2));

    // First read past the deadline reports the expiry and drops the key.
    assert!(matches!(db.get(b"k"), Err(Error::KeyExpired)));
    assert!(!db.str_exists(b"k"));
    assert!(matches!(db.get(b"k"), Err(Error::KeyNotFound)));
    Ok(())
}

#[test]
fn expiry_removal_survives_reopen() -> Result<()> {
    let dir = tempdir()?;
    {
        let db = open_db(dir.path());
        db.set(b"k", b"v")?;
        db.expire(b"k", 1)?;
        thread::sleep(Duration::from_secs(2));
        assert!(matches!(db.get(b"k"), Err(Error::KeyExpired)));
        db.close()?;
    }

    let db = open_db(dir.path());
    assert!(matches!(db.get(b"k"), Err(Error::KeyNotFound)));
    Ok(())
}

#[test]
fn ttl_counts_down_from_deadline() -> Result<()> {
    let dir = tempdir()?;
    let db = open_db(dir.path());

    db.set(b"k", b"v")?;
    db.expire(b"k", 10)?;
    let remaining = db.ttl(b"k");
    assert!(remaining > 0 && remaining <= 10, "ttl was {remaining}");
    Ok(())
}

#[test]
fn ttl_of_unexpiring_key_is_zero() -> Result<()> {
    let dir = tempdir()?;
    let db = open_db(dir.path());

    db.set(b"k", b"v")?;
    assert_eq!(db.ttl(b"k"), 0);
    assert_eq!(db.ttl(b"missing"), 0);
    Ok(())
}

#[test]
fn persist_clears_ttl() -> Result<()> {
    let dir = tempdir()?;
    let db = open_db(dir.path());

    db.set(b"k", b"v")?;
    db.expire(b"k", 10)?;
    db.persist(b"k");
    assert_eq!(db.ttl(b"k"), 0);

    // And the key is still there well past nothing.
    assert_eq!(db.get(b"k")?, b"v");
    Ok(())
}

#[test]
fn set_clears_prior_ttl() -> Result<()> {
    let dir = tempdir()?;
    let db = open_db(dir.path());

    db.set(b"k", b"v1")?;
    db.expire(b"k", 10)?;
    db.set(b"k", b"v2")?;
    assert_eq!(db.ttl(b"k"), 0);
    Ok(())
}

#[test]
fn zero_ttl_rejected() -> Result<()> {
    let dir = tempdir()?;
    let db = open_db(dir.path());

    db.set(b"k", b"v")?;
    assert!(matches!(db.expire(b"k", 0), Err(Error::InvalidTtl)));
    Ok(())
}

#[test]
fn expire_missing_key_rejected() {
    let dir = tempdir().unwrap();
    let db = open_db(dir.path());

    assert!(matches!(db.expire(b"nope", 5), Err(Error::KeyNotFound)));
}

#[test]
fn deadline_survives_reopen() -> Result<()> {
    let dir = tempdir()?;
    {
        let db = open_db(dir.path());
        db.set(b"k", b"v")?;
        db.expire(b"k", 120)?;
        db.close()?;
    }

    let db = Db::open(test_config(dir.path()))?;
    let remaining = db.ttl(b"k");
    assert!(remaining > 100, "deadline lost across reopen: {remaining}");
    assert_eq!(db.get(b"k")?, b"v");
    Ok(())
}

#[test]
fn expired_key_skipped_by_scans() -> Result<()> {
    let dir = tempdir()?;
    let db = open_db(dir.path());

    db.set(b"scan-a", b"1")?;
    db.set(b"scan-b", b"2")?;
    db.expire(b"scan-a", 1)?;
    thread::sleep(Duration::from_secs(2));

    let values = db.prefix_scan(b"scan-", -1, 0)?;
    assert_eq!(values, vec![b"2".to_vec()]);
    Ok(())
}
