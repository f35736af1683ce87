//! Integration tests for loading, persistence and naming.

use std::fs;
use std::path::PathBuf;

use csvql::resolver::resolve;
use csvql::storage::{FileRecord, ModStamp, Store};
use csvql::watcher::{parse_file, Synchronizer};
use csvql::{App, Config};
use tempfile::TempDir;

fn static_config(root: &std::path::Path) -> Config {
    Config {
        watch: false,
        ..Config::for_root(root)
    }
}

fn strings(cells: &[&str]) -> Vec<String> {
    cells.iter().map(ToString::to_string).collect()
}

#[test]
fn test_round_trip_pads_and_truncates() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("uneven.csv");
    fs::write(&path, "a,b,c\n1,2\n1,2,3,4\n").unwrap();

    let store = Store::open(tmp.path().join("db.sqlite")).unwrap();
    let parsed = parse_file(&path, "uneven").unwrap();
    store.load(&parsed.record, parsed.rows).unwrap();

    assert_eq!(store.table_info("uneven").unwrap(), strings(&["a", "b", "c"]));
    let result = store.query("SELECT a, b, c FROM uneven ORDER BY rowid").unwrap();
    assert_eq!(
        result.rows,
        vec![strings(&["1", "2", ""]), strings(&["1", "2", "3"])]
    );
}

#[test]
fn test_reopen_needs_no_reparse() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("users.csv"), "id,name\n1,Alice\n").unwrap();
    fs::write(tmp.path().join("sales.tsv"), "region\tamount\nnorth\t10\n").unwrap();

    let first = App::open(&static_config(tmp.path())).unwrap();
    assert_eq!(first.scan_summary().loaded, 2);
    drop(first);

    let second = App::open(&static_config(tmp.path())).unwrap();
    assert_eq!(second.scan_summary().loaded, 0);
    assert_eq!(second.scan_summary().unchanged, 2);
    assert_eq!(second.list_tables().unwrap(), vec!["sales", "users"]);
}

#[test]
fn test_stamp_survives_restart() {
    let tmp = TempDir::new().unwrap();
    let db_path = tmp.path().join("state.db");
    let record = FileRecord {
        path: PathBuf::from("/data/t.csv"),
        table_name: "t".to_string(),
        delimiter: b',',
        header_fields: strings(&["a"]),
        mod_stamp: ModStamp::from_nanos(1_700_000_000_000_000_001),
    };

    Store::open(&db_path)
        .unwrap()
        .load(&record, vec![strings(&["x"])])
        .unwrap();

    let store = Store::open(&db_path).unwrap();
    assert!(!store.needs_update("t", record.mod_stamp));
    assert!(store.needs_update("t", ModStamp::from_nanos(1_700_000_000_000_000_000)));
}

#[test]
fn test_restart_after_offline_changes() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("keep.csv"), "a\n1\n").unwrap();
    fs::write(tmp.path().join("drop.csv"), "a\n1\n").unwrap();
    drop(App::open(&static_config(tmp.path())).unwrap());

    fs::remove_file(tmp.path().join("drop.csv")).unwrap();
    fs::create_dir(tmp.path().join("sub")).unwrap();
    fs::write(tmp.path().join("sub").join("keep.csv"), "b\n2\n").unwrap();

    let app = App::open(&static_config(tmp.path())).unwrap();
    assert_eq!(app.scan_summary().pruned, 1);
    assert_eq!(app.list_tables().unwrap(), vec!["keep", "sub_keep"]);
    assert_eq!(app.table_info("sub_keep").unwrap(), vec!["b"]);
}

#[test]
fn test_resolver_names_match_loaded_tables() {
    let tmp = TempDir::new().unwrap();
    for dir in ["a", "b"] {
        fs::create_dir(tmp.path().join(dir)).unwrap();
        fs::write(tmp.path().join(dir).join("x.csv"), "v\n1\n").unwrap();
    }
    fs::write(tmp.path().join("y.csv"), "v\n1\n").unwrap();

    let root = tmp.path().canonicalize().unwrap();
    let names = resolve(
        &[root.join("a/x.csv"), root.join("b/x.csv"), root.join("y.csv")],
        &root,
    );
    let mut expected: Vec<String> = names.into_values().collect();
    expected.sort();

    let app = App::open(&static_config(tmp.path())).unwrap();
    assert_eq!(app.list_tables().unwrap(), expected);
    assert_eq!(expected, vec!["a_x", "b_x", "y"]);
}

#[test]
fn test_synchronizer_against_file_store() {
    let tmp = TempDir::new().unwrap();
    let data = tmp.path().join("data");
    fs::create_dir(&data).unwrap();
    fs::write(data.join("Monthly Report.csv"), "Total (USD),total-usd\n5,6\n").unwrap();

    let store = std::sync::Arc::new(Store::open(tmp.path().join("s.db")).unwrap());
    let sync = Synchronizer::new(&data, std::sync::Arc::clone(&store));
    let summary = sync.initial_scan().unwrap();

    assert_eq!(summary.loaded, 1);
    assert_eq!(store.list_tables().unwrap(), vec!["monthly_report"]);
    assert_eq!(
        store.table_info("monthly_report").unwrap(),
        vec!["total_usd", "total_usd_1"]
    );
}
