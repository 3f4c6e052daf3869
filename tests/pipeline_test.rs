//! End-to-end tests: log file → tailer → assembler → store + NDJSON

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use spectre_monitor::config::{MonitorConfig, TailOptions};
use spectre_monitor::monitor::{tail_file, StopSignal};
use spectre_monitor::store::{Document, Query};
use spectre_monitor::value::Value;
use spectre_monitor::Error;

const TWO_BLOCKS: &str = "\
(PID.TID 0000.0001) // Begin MONITOR dynamic field statistics
(PID.TID 0000.0001) %MON time_tsnumber                =                     0
(PID.TID 0000.0001) %MON time_secondsf                =   0.0000000000000D+00
(PID.TID 0000.0001) %MON dynstat_eta_max              =   1.2345000000000D-01
(PID.TID 0000.0001) %MON dynstat_eta_max              =   2.5000000000000D-01
(PID.TID 0000.0001) // End MONITOR dynamic field statistics
(PID.TID 0000.0001) %MON time_tsnumber                =                    72
(PID.TID 0000.0001) %MON time_secondsf                =   8.6400000000000D+04
(PID.TID 0000.0001) %MON dynstat_eta_max              =   1.5000000000000D-01
";

fn config(root: &Path) -> MonitorConfig {
    MonitorConfig::new()
        .dbroot_path(root)
        .ensemble("ens01")
        .job(4711)
        .member("memb000")
}

fn read_lines(path: &Path) -> Vec<Document> {
    fs::read_to_string(path)
        .expect("ndjson output")
        .lines()
        .map(|l| serde_json::from_str(l).expect("json line"))
        .collect()
}

fn wait_for(mut cond: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !cond() {
        assert!(Instant::now() < deadline, "timed out waiting");
        thread::sleep(Duration::from_millis(20));
    }
}

#[test]
fn test_two_blocks_persist_and_echo_in_order() {
    let dir = tempfile::tempdir().expect("tempdir");
    let log = dir.path().join("STDOUT.0000");
    let out = dir.path().join("mon.jsonl");
    fs::write(&log, TWO_BLOCKS).expect("log");

    let cfg = config(&dir.path().join("monitoring"));
    let options = TailOptions::new()
        .from_start(true)
        .follow(false)
        .echo_stdout(false)
        .output(&out);

    let stats = tail_file(&log, &cfg, &options, &StopSignal::new()).expect("tail");
    assert_eq!(stats.records_emitted, 2);
    assert_eq!(stats.lines_matched, 7);
    assert_eq!(stats.lines_skipped, 2);

    let lines = read_lines(&out);
    let steps: Vec<i64> = lines.iter().filter_map(Document::timestep).collect();
    assert_eq!(steps, [0, 72]);
    for line in &lines {
        assert_eq!(line.get("job_id"), Some(&Value::Int(4711)));
        assert!(line.scraped_at().is_some());
    }
    assert_eq!(
        lines[0].get("dynstat_eta_max"),
        Some(&Value::List(vec![Value::Float(0.12345), Value::Float(0.25)]))
    );

    let stored = cfg.open_collection().expect("collection").find().expect("find");
    assert_eq!(stored.len(), 2);
    let first = &stored[0];
    assert_eq!(first.timestep(), Some(0));
    assert_eq!(first.get("time_secondsf"), Some(&Value::Float(0.0)));
    assert_eq!(first.get("_id"), Some(&Value::from("1")));

    let ids: Vec<Option<&Value>> = lines.iter().map(|l| l.get("_id")).collect();
    assert_eq!(ids, [Some(&Value::from("1")), Some(&Value::from("2"))]);
    assert_eq!(lines, stored);
}

#[test]
fn test_ndjson_lines_are_canonically_ordered() {
    let dir = tempfile::tempdir().expect("tempdir");
    let log = dir.path().join("STDOUT.0000");
    let out = dir.path().join("mon.jsonl");
    fs::write(&log, TWO_BLOCKS).expect("log");

    let options = TailOptions::new()
        .from_start(true)
        .follow(false)
        .echo_stdout(false)
        .output(&out);
    tail_file(&log, &config(&dir.path().join("db")), &options, &StopSignal::new()).expect("tail");

    let text = fs::read_to_string(&out).expect("output");
    for line in text.lines() {
        assert!(line.starts_with(r#"{"time_tsnumber":"#), "{line}");
        let doc: Document = serde_json::from_str(line).expect("json line");
        assert_eq!(serde_json::to_string(&doc).expect("serialize"), line);
    }
}

#[test]
fn test_missing_log_is_fatal() {
    let dir = tempfile::tempdir().expect("tempdir");
    let err = tail_file(
        dir.path().join("nope"),
        &config(dir.path()),
        &TailOptions::new(),
        &StopSignal::new(),
    )
    .expect_err("missing file must fail");
    assert!(matches!(err, Error::LogNotFound(_)));
}

#[test]
fn test_follow_picks_up_appends_and_stops_cleanly() {
    let dir = tempfile::tempdir().expect("tempdir");
    let log = dir.path().join("STDOUT.0000");
    fs::write(&log, "startup noise\n").expect("log");

    let cfg = config(&dir.path().join("monitoring"));
    let options = TailOptions::new()
        .from_start(true)
        .poll_interval(Duration::from_millis(10))
        .echo_stdout(false);
    let stop = StopSignal::new();

    let worker = {
        let (log, cfg, stop) = (log.clone(), cfg.clone(), stop.clone());
        thread::spawn(move || tail_file(&log, &cfg, &options, &stop))
    };

    let coll = cfg.open_collection().expect("collection");
    let mut f = OpenOptions::new().append(true).open(&log).expect("append");
    f.write_all(b"%MON time_tsnumber = 1\n%MON x = 2\n%MON time_tsnumber = 2\n")
        .expect("write");
    f.flush().expect("flush");
    wait_for(|| coll.len().unwrap_or(0) == 1);

    // Second block is still open; a clean stop flushes it.
    f.write_all(b"%MON x = 5\n").expect("write");
    thread::sleep(Duration::from_millis(100));
    stop.stop();
    let stats = worker.join().expect("join").expect("tail");

    assert_eq!(stats.records_emitted, 2);
    let second = coll
        .find_one(&Query::new().eq("time_tsnumber", 2))
        .expect("find")
        .expect("flushed block");
    assert_eq!(second.get("x"), Some(&Value::Int(5)));
}

#[test]
fn test_truncation_restarts_from_top() {
    let dir = tempfile::tempdir().expect("tempdir");
    let log = dir.path().join("STDOUT.0000");
    fs::write(&log, "%MON time_tsnumber = 1\n%MON x = 1\n%MON time_tsnumber = 2\n%MON x = 2\n")
        .expect("log");

    let cfg = config(&dir.path().join("monitoring"));
    let options = TailOptions::new()
        .from_start(true)
        .poll_interval(Duration::from_millis(10))
        .echo_stdout(false);
    let stop = StopSignal::new();

    let worker = {
        let (log, cfg, stop) = (log.clone(), cfg.clone(), stop.clone());
        thread::spawn(move || tail_file(&log, &cfg, &options, &stop))
    };

    let coll = cfg.open_collection().expect("collection");
    wait_for(|| coll.len().unwrap_or(0) == 1);

    // Rotate: the file shrinks and restarts with a new run.
    fs::write(&log, "%MON time_tsnumber = 7\n").expect("truncate");
    // ts 7 opens a block that only the shutdown flush completes.
    thread::sleep(Duration::from_millis(200));
    stop.stop();
    let stats = worker.join().expect("join").expect("tail");

    assert_eq!(stats.truncations, 1);
    assert_eq!(stats.discontinuities, 1);
    let steps: Vec<i64> = coll.find().expect("find").iter().filter_map(Document::timestep).collect();
    assert_eq!(steps, [1, 7]);
}
