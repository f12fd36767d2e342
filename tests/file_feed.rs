//! End-to-end tests over the provided file transport and line parser.

use instrument_feed::{
    Connection, ConnectionState, FeedAddress, FileTransport, InstrumentProfile, JsonLineParser,
};
use std::io::Write;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;

fn write_feed(path: &Path, lines: &[&str]) {
    let mut file = std::fs::File::create(path).unwrap();
    for line in lines {
        writeln!(file, "{}", line).unwrap();
    }
    file.sync_all().unwrap();
}

fn connect(path: &Path) -> Connection {
    let address = FeedAddress::new(path.to_str().unwrap())
        .with_update_period(Duration::from_millis(20));
    Connection::new(address, FileTransport, JsonLineParser)
}

#[test]
fn test_snapshot_from_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("profiles.feed");
    write_feed(
        &path,
        &[
            "{\"type\":\"STOCK\",\"symbol\":\"AAPL\",\"CURRENCY\":\"USD\"}",
            "{\"type\":\"FUTURE\",\"symbol\":\"/ES\",\"CURRENCY\":\"USD\"}",
        ],
    );

    let connection = connect(&path);
    let updates = connection.subscribe(16);
    connection.start().unwrap();

    // No explicit ##COMPLETE in the file: end of stream synthesizes it.
    assert!(connection.wait_for_state(Duration::from_secs(2), |s| {
        s == ConnectionState::Completed
    }));

    let delta = updates.recv_timeout(Duration::from_secs(1)).unwrap();
    assert_eq!(delta.len(), 2);
    assert_eq!(delta[0].symbol, "AAPL");
    assert_eq!(delta[1].symbol, "/ES");
    assert!(!connection.is_live());
    connection.close();
}

#[test]
fn test_unchanged_file_is_polled_but_not_reapplied() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("profiles.feed");
    write_feed(&path, &["{\"type\":\"STOCK\",\"symbol\":\"AAPL\"}"]);

    let connection = connect(&path);
    let updates = connection.subscribe(16);
    connection.start().unwrap();

    assert!(connection.wait_for_state(Duration::from_secs(2), |s| {
        s == ConnectionState::Completed
    }));
    updates.recv_timeout(Duration::from_secs(1)).unwrap();

    // Several poll periods of an untouched file: no further deltas.
    std::thread::sleep(Duration::from_millis(120));
    assert!(updates.try_recv().is_err());
    assert_eq!(
        connection.profiles(),
        vec![InstrumentProfile::new("STOCK", "AAPL")]
    );
    connection.close();
}

#[test]
fn test_rewritten_file_produces_delta() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("profiles.feed");
    write_feed(&path, &["{\"type\":\"STOCK\",\"symbol\":\"AAPL\",\"PRICE\":\"1\"}"]);

    let connection = connect(&path);
    let updates = connection.subscribe(16);
    connection.start().unwrap();
    updates.recv_timeout(Duration::from_secs(1)).unwrap();

    // Filesystem mtime can be coarse; make sure the rewrite moves it.
    std::thread::sleep(Duration::from_millis(1100));
    write_feed(
        &path,
        &[
            "{\"type\":\"STOCK\",\"symbol\":\"AAPL\",\"PRICE\":\"2\"}",
            "{\"type\":\"REMOVED\",\"symbol\":\"MSFT\"}",
        ],
    );

    let delta = updates.recv_timeout(Duration::from_secs(5)).unwrap();
    // Unknown tombstone is dropped; only the real change survives.
    assert_eq!(
        delta,
        vec![InstrumentProfile::new("STOCK", "AAPL").with_attribute("PRICE", "2")]
    );
    connection.close();
}
