//! Tests for the slice writer

use std::io::Read;
use std::sync::Arc;
use std::time::Duration;

use flate2::read::MultiGzDecoder;
use parking_lot::Mutex;
use sluice_config::{CompressionConfig, EncodingConfig, GzipImplementation, SyncConfig, SyncMode};
use sluice_model::{Column, Columns, SliceKey, StaticRecord, VolumeId, parse_time};
use sluice_writer::LocalFile;
use tempfile::TempDir;

use super::*;

fn time(value: &str) -> DateTime<Utc> {
    parse_time(value).unwrap()
}

fn sync_config() -> SyncConfig {
    SyncConfig::default()
        .with_mode(SyncMode::Disk)
        .with_wait(true)
        .with_check_interval(Duration::from_millis(1))
        .with_interval_trigger(Duration::from_millis(2))
}

fn test_slice(compression: CompressionConfig) -> Slice {
    let key = SliceKey {
        project_id: 123,
        branch_id: 456,
        source_id: "my-source".into(),
        sink_id: "my-sink".into(),
        file_opened_at: time("2000-01-01T00:00:00.000Z"),
        volume_id: VolumeId::new("my-volume"),
        slice_opened_at: time("2000-01-01T00:00:00.000Z"),
    };
    let columns = Columns::new(vec![
        Column::Datetime {
            name: "datetime".into(),
            primary_key: false,
        },
        Column::Body {
            name: "body".into(),
            primary_key: false,
        },
    ])
    .unwrap();
    let encoding = EncodingConfig {
        compression,
        sync: sync_config(),
        ..Default::default()
    };
    Slice::new(key, columns, encoding)
}

struct TestWriter {
    dir: TempDir,
    writer: Writer,
}

impl TestWriter {
    async fn open(slice: Slice) -> Self {
        let dir = TempDir::new().unwrap();
        let writer = open_in(&dir, slice, &WriterEvents::new()).await.unwrap();
        Self { dir, writer }
    }

    fn file(&self) -> Vec<u8> {
        std::fs::read(self.writer.file_path()).unwrap()
    }

    fn backup(&self, name: &str) -> String {
        std::fs::read_to_string(self.dir.path().join(name)).unwrap()
    }
}

async fn open_in(dir: &TempDir, slice: Slice, events: &Arc<WriterEvents>) -> Result<Writer> {
    let file_path = dir.path().join(slice.filename());
    let sink = Arc::new(LocalFile::open(&file_path).unwrap());
    Writer::open(slice, sink, dir.path(), file_path, events).await
}

fn record(at: &str, body: &str) -> StaticRecord {
    StaticRecord::new(time(at)).with_body(body.to_owned())
}

async fn write_test_rows(writer: &Writer) {
    writer.write_record(&record("2000-01-01T01:00:00.000Z", "abc")).await.unwrap();
    writer.write_record(&record("2000-01-01T02:00:00.000Z", "\"def\"")).await.unwrap();
    writer.write_record(&record("2000-01-01T03:00:00.000Z", "foo")).await.unwrap();
    writer.write_record(&record("2000-01-01T04:00:00.000Z", "bar")).await.unwrap();
}

const EXPECTED_CSV: &str = "\"2000-01-01T01:00:00.000Z\",\"abc\"\n\
                            \"2000-01-01T02:00:00.000Z\",\"\"\"def\"\"\"\n\
                            \"2000-01-01T03:00:00.000Z\",\"foo\"\n\
                            \"2000-01-01T04:00:00.000Z\",\"bar\"\n";

// =============================================================================
// Content and statistics
// =============================================================================

#[tokio::test]
async fn test_write_plain_csv() {
    let tw = TestWriter::open(test_slice(CompressionConfig::none())).await;
    let writer = &tw.writer;
    assert!(writer.is_ready());

    write_test_rows(writer).await;

    // Every write waited for its sync
    assert_eq!(String::from_utf8(tw.file()).unwrap(), EXPECTED_CSV);
    assert_eq!(writer.accepted_writes(), 4);
    assert_eq!(writer.completed_writes(), 4);
    assert_eq!(writer.first_record_at(), Some(time("2000-01-01T01:00:00.000Z")));
    assert_eq!(writer.last_record_at(), Some(time("2000-01-01T04:00:00.000Z")));
    assert_eq!(writer.compressed_size(), EXPECTED_CSV.len() as u64);
    assert_eq!(writer.uncompressed_size(), EXPECTED_CSV.len() as u64);

    writer.close().await.unwrap();
    assert!(!writer.is_ready());

    assert_eq!(
        tw.backup(COMPLETED_COUNT_FILE),
        "4,2000-01-01T01:00:00.000Z,2000-01-01T04:00:00.000Z"
    );
    assert_eq!(
        tw.backup(COMPRESSED_SIZE_FILE),
        EXPECTED_CSV.len().to_string()
    );
    assert!(!tw.dir.path().join(UNCOMPRESSED_SIZE_FILE).exists());
}

#[tokio::test]
async fn test_write_gzip() {
    for implementation in [
        GzipImplementation::Standard,
        GzipImplementation::Fast,
        GzipImplementation::Parallel,
    ] {
        let tw = TestWriter::open(test_slice(CompressionConfig::gzip(implementation))).await;
        let writer = &tw.writer;
        assert!(writer.file_path().ends_with("slice.csv.gz"));

        write_test_rows(writer).await;
        writer.close().await.unwrap();

        let file = tw.file();
        let mut csv = String::new();
        MultiGzDecoder::new(file.as_slice())
            .read_to_string(&mut csv)
            .unwrap();

        assert_eq!(csv, EXPECTED_CSV, "{:?}", implementation);
        assert_eq!(writer.uncompressed_size(), EXPECTED_CSV.len() as u64);
        assert_eq!(writer.compressed_size(), file.len() as u64);
        assert_eq!(
            tw.backup(UNCOMPRESSED_SIZE_FILE),
            EXPECTED_CSV.len().to_string()
        );
        assert_eq!(tw.backup(COMPRESSED_SIZE_FILE), file.len().to_string());
    }
}

#[tokio::test]
async fn test_write_zstd() {
    let tw = TestWriter::open(test_slice(CompressionConfig::zstd())).await;
    write_test_rows(&tw.writer).await;
    tw.writer.close().await.unwrap();

    let decoded = zstd::stream::decode_all(tw.file().as_slice()).unwrap();
    assert_eq!(String::from_utf8(decoded).unwrap(), EXPECTED_CSV);
}

#[tokio::test]
async fn test_write_without_wait() {
    let mut slice = test_slice(CompressionConfig::none());
    slice.encoding.sync = sync_config()
        .with_wait(false)
        .with_interval_trigger(Duration::from_secs(3600));
    let tw = TestWriter::open(slice).await;

    write_test_rows(&tw.writer).await;
    assert_eq!(tw.writer.completed_writes(), 4);

    // Data reaches the file on close
    tw.writer.close().await.unwrap();
    assert_eq!(String::from_utf8(tw.file()).unwrap(), EXPECTED_CSV);
}

#[tokio::test]
async fn test_reopen_continues_statistics() {
    let dir = TempDir::new().unwrap();
    let events = WriterEvents::new();

    let writer = open_in(&dir, test_slice(CompressionConfig::none()), &events)
        .await
        .unwrap();
    write_test_rows(&writer).await;
    writer.close().await.unwrap();

    let writer = open_in(&dir, test_slice(CompressionConfig::none()), &events)
        .await
        .unwrap();
    assert_eq!(writer.completed_writes(), 4);
    assert_eq!(writer.compressed_size(), EXPECTED_CSV.len() as u64);

    writer
        .write_record(&record("2000-01-01T05:00:00.000Z", "baz"))
        .await
        .unwrap();
    writer.close().await.unwrap();

    assert_eq!(
        std::fs::read_to_string(dir.path().join(COMPLETED_COUNT_FILE)).unwrap(),
        "5,2000-01-01T01:00:00.000Z,2000-01-01T05:00:00.000Z"
    );
    let content = std::fs::read_to_string(dir.path().join("slice.csv")).unwrap();
    assert!(content.starts_with(EXPECTED_CSV));
    assert!(content.ends_with("\"2000-01-01T05:00:00.000Z\",\"baz\"\n"));
}

// =============================================================================
// Errors
// =============================================================================

#[tokio::test]
async fn test_too_big_row_keeps_writer_open() {
    let mut slice = test_slice(CompressionConfig::none());
    slice.encoding.encoder.row_size_limit = 40;
    let tw = TestWriter::open(slice).await;

    let err = tw
        .writer
        .write_record(&record("2000-01-01T03:00:00.000Z", "foobartoomuch"))
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "too big CSV row, column: \"body\", row limit: 40 B"
    );

    tw.writer
        .write_record(&record("2000-01-01T03:00:00.000Z", "foobar"))
        .await
        .unwrap();
    tw.writer.close().await.unwrap();

    assert_eq!(
        String::from_utf8(tw.file()).unwrap(),
        "\"2000-01-01T03:00:00.000Z\",\"foobar\"\n"
    );
    assert_eq!(tw.writer.completed_writes(), 1);
}

#[tokio::test]
async fn test_write_row_column_count() {
    let tw = TestWriter::open(test_slice(CompressionConfig::none())).await;

    let err = tw
        .writer
        .write_row(time("2000-01-01T01:00:00.000Z"), &[Value::from("a")])
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "expected 2 columns in the row, given 1");

    tw.writer
        .write_row(
            time("2000-01-01T01:00:00.000Z"),
            &[Value::from("a"), Value::Int(1)],
        )
        .await
        .unwrap();
    tw.writer.close().await.unwrap();
    assert_eq!(String::from_utf8(tw.file()).unwrap(), "\"a\",\"1\"\n");
}

#[tokio::test]
async fn test_write_after_close() {
    let tw = TestWriter::open(test_slice(CompressionConfig::none())).await;
    tw.writer.close().await.unwrap();

    let err = tw
        .writer
        .write_record(&record("2000-01-01T01:00:00.000Z", "abc"))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "writer is closed");
}

#[tokio::test]
async fn test_close_twice() {
    let tw = TestWriter::open(test_slice(CompressionConfig::none())).await;
    tw.writer.close().await.unwrap();

    let err = tw.writer.close().await.unwrap_err();
    assert_eq!(err.to_string(), "writer is already closed");
}

/// Record whose body takes a while to read
struct SlowRecord {
    record: StaticRecord,
    delay: Duration,
}

impl Record for SlowRecord {
    fn timestamp(&self) -> DateTime<Utc> {
        self.record.timestamp()
    }

    fn client_ip(&self) -> Option<std::net::IpAddr> {
        self.record.client_ip()
    }

    fn headers(&self) -> &[(String, String)] {
        self.record.headers()
    }

    fn body(&self) -> sluice_model::Result<bytes::Bytes> {
        std::thread::sleep(self.delay);
        self.record.body()
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_close_waits_for_running_write() {
    for compression in [
        CompressionConfig::none(),
        CompressionConfig::gzip(GzipImplementation::Standard),
    ] {
        let tw = TestWriter::open(test_slice(compression)).await;

        let write = {
            let writer = tw.writer.clone();
            tokio::spawn(async move {
                let record = SlowRecord {
                    record: record("2000-01-01T01:00:00.000Z", "abc"),
                    delay: Duration::from_millis(300),
                };
                writer.write_record(&record).await
            })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        tokio::time::timeout(Duration::from_secs(5), tw.writer.close())
            .await
            .expect("close must not hang")
            .unwrap();
        write.await.unwrap().unwrap();

        // The row made it into the file before the chain was closed
        let mut csv = String::new();
        if tw.writer.file_path().ends_with("slice.csv.gz") {
            MultiGzDecoder::new(tw.file().as_slice())
                .read_to_string(&mut csv)
                .unwrap();
        } else {
            csv = String::from_utf8(tw.file()).unwrap();
        }
        assert_eq!(csv, "\"2000-01-01T01:00:00.000Z\",\"abc\"\n");
        assert_eq!(tw.writer.completed_writes(), 1);
        assert_eq!(
            tw.backup(COMPLETED_COUNT_FILE),
            "1,2000-01-01T01:00:00.000Z,2000-01-01T01:00:00.000Z"
        );
    }
}

#[tokio::test]
async fn test_invalid_backup_fails_open() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join(COMPLETED_COUNT_FILE), "foo").unwrap();

    let err = open_in(&dir, test_slice(CompressionConfig::none()), &WriterEvents::new())
        .await
        .unwrap_err();
    assert!(
        err.to_string()
            .starts_with("content \"foo\" of the backup file is not valid")
    );
}

// =============================================================================
// Events
// =============================================================================

#[tokio::test]
async fn test_close_events() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let events = WriterEvents::new();
    {
        let log = Arc::clone(&log);
        events.on_open(move |w: &Writer| {
            log.lock().push(format!("open {}", w.slice_key().project_id));
            Ok(())
        });
    }
    {
        let log = Arc::clone(&log);
        events.on_close(move |w: &Writer, err| {
            log.lock().push(format!("close volume {} {}", w.slice_key().project_id, err.is_some()));
            Ok(())
        });
    }

    let dir = TempDir::new().unwrap();
    let writer = open_in(&dir, test_slice(CompressionConfig::none()), &events)
        .await
        .unwrap();
    {
        let log = Arc::clone(&log);
        writer.events().on_close(move |_, _| {
            log.lock().push("close writer".into());
            Ok(())
        });
    }
    writer.close().await.unwrap();

    assert_eq!(
        *log.lock(),
        vec!["open 123", "close writer", "close volume 123 false"]
    );
}

#[tokio::test]
async fn test_open_event_error_closes_writer() {
    let events = WriterEvents::new();
    events.on_open(|_| Err("error (1)".into()));
    let volume = events.clone_child();
    volume.on_open(|_| Err("error (2)".into()));

    let dir = TempDir::new().unwrap();
    let err = open_in(&dir, test_slice(CompressionConfig::none()), &volume)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "- error (2)\n- error (1)");

    // Backups were written and released on close
    assert_eq!(
        std::fs::read_to_string(dir.path().join(COMPLETED_COUNT_FILE)).unwrap(),
        "0,,"
    );
}

#[tokio::test]
async fn test_close_event_errors() {
    let events = WriterEvents::new();
    events.on_close(|_, _| Err("error (1)".into()));
    let volume = events.clone_child();
    volume.on_close(|_, _| Err("error (2)".into()));

    let dir = TempDir::new().unwrap();
    let writer = open_in(&dir, test_slice(CompressionConfig::none()), &volume)
        .await
        .unwrap();
    writer.events().on_close(|_, _| Err("error (3)".into()));

    let err = writer.close().await.unwrap_err();
    assert_eq!(err.to_string(), "- error (3)\n- error (2)\n- error (1)");
}

// =============================================================================
// Chain layout
// =============================================================================

#[tokio::test]
async fn test_chain_layout() {
    let tw = TestWriter::open(test_slice(CompressionConfig::gzip(GzipImplementation::Standard))).await;

    assert_eq!(
        tw.writer.dump(),
        "Writers:\n  meter-with-backup\n  limit-buffer\n  compression\n  meter-with-backup\n  limit-buffer\n  sink\n\
         Flushers:\n  csv-encoder\n  limit-buffer\n  compression\n  limit-buffer\n\
         Closers:\n  csv-encoder\n  meter-with-backup\n  limit-buffer\n  compression\n  meter-with-backup\n  limit-buffer\n"
    );
    tw.writer.close().await.unwrap();
}
