//! Tests for counters and their backup files

use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use tempfile::TempDir;

use super::*;

fn utc(year: i32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, 1, 1, 0, 0, 0).unwrap()
}

// =============================================================================
// Counter
// =============================================================================

#[test]
fn test_counter_empty() {
    let counter = Counter::new();
    assert_eq!(counter.count(), 0);
    assert!(counter.first_at().is_none());
    assert!(counter.last_at().is_none());
    assert_eq!(counter.encode(), "0,,");
}

#[test]
fn test_counter_tracks_first_and_last() {
    let counter = Counter::new();
    counter.add(utc(2001), 1);
    counter.add(utc(2003), 2);
    counter.add(utc(2000), 1);
    counter.add(utc(2002), 1);

    assert_eq!(counter.count(), 5);
    assert_eq!(counter.first_at(), Some(utc(2000)));
    assert_eq!(counter.last_at(), Some(utc(2003)));
}

#[test]
fn test_counter_add_zero_is_noop() {
    let counter = Counter::new();
    counter.add(utc(2001), 0);
    assert_eq!(counter.count(), 0);
    assert!(counter.first_at().is_none());
}

#[test]
fn test_counter_clone_shares_state() {
    let counter = Counter::new();
    let other = counter.clone();
    other.add(utc(2001), 3);
    assert_eq!(counter.count(), 3);
}

// =============================================================================
// Backup
// =============================================================================

#[tokio::test]
async fn test_backup_format_and_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("completed_count");

    let counter = CounterWithBackup::open(&path, Duration::ZERO).unwrap();
    counter.add(utc(2001), 3);
    counter.add(utc(2002), 2);
    counter.close().unwrap();

    assert_eq!(
        std::fs::read_to_string(&path).unwrap(),
        "5,2001-01-01T00:00:00.000Z,2002-01-01T00:00:00.000Z"
    );

    let counter = CounterWithBackup::open(&path, Duration::ZERO).unwrap();
    assert_eq!(counter.count(), 5);
    assert_eq!(counter.first_at(), Some(utc(2001)));
    assert_eq!(counter.last_at(), Some(utc(2002)));

    counter.add(utc(2000), 1);
    counter.close().unwrap();
    assert_eq!(
        std::fs::read_to_string(&path).unwrap(),
        "6,2000-01-01T00:00:00.000Z,2002-01-01T00:00:00.000Z"
    );
}

#[tokio::test]
async fn test_backup_periodic_sync() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("completed_count");

    let counter = CounterWithBackup::open(&path, Duration::from_millis(5)).unwrap();
    counter.add(utc(2001), 1);
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(
        std::fs::read_to_string(&path).unwrap(),
        "1,2001-01-01T00:00:00.000Z,2001-01-01T00:00:00.000Z"
    );
    counter.close().unwrap();
}

#[test]
fn test_backup_invalid_content() {
    let cases = [
        (
            "foo",
            "content \"foo\" of the backup file is not valid: expected 3 comma-separated values, found 1",
        ),
        (
            "foo,,",
            "content \"foo,,\" of the backup file is not valid: invalid count \"foo\"",
        ),
        (
            "1,foo,",
            "content \"1,foo,\" of the backup file is not valid: invalid firstAt time \"foo\"",
        ),
        (
            "1,,foo",
            "content \"1,,foo\" of the backup file is not valid: invalid lastAt time \"foo\"",
        ),
    ];

    for (content, expected) in cases {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("completed_count");
        std::fs::write(&path, content).unwrap();

        let err = CounterWithBackup::open(&path, Duration::ZERO).unwrap_err();
        assert_eq!(err.to_string(), expected, "content {:?}", content);
    }
}
