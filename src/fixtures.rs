//! Snapshot files in the full 46-column export layout

use std::path::{Path, PathBuf};

pub const OS_COLUMNS: [&str; 6] = [
    "endpoints_os_linux",
    "endpoints_os_windows",
    "endpoints_os_ibm_aix",
    "endpoints_os_hpux",
    "endpoints_os_solaris_sparc",
    "endpoints_os_solaris_x86",
];
const FILLER: usize = 35;

#[derive(Clone, Debug)]
pub struct Row {
    pub time: &'static str,
    pub all: u64,
    pub disconnected: u64,
    pub instances: u64,
    pub db: &'static str,
    pub os: [u64; 6],
}

pub fn row(time: &'static str, all: u64, disconnected: u64) -> Row {
    Row {
        time,
        all,
        disconnected,
        instances: all * 2,
        db: "db2",
        os: [all, 0, 0, 0, 0, 0],
    }
}

pub fn header() -> Vec<String> {
    let mut cols = vec![
        "data_collection_time".to_string(),
        "endpoints_all".to_string(),
        "endpoints_disconnected".to_string(),
        "instances_all".to_string(),
        "lmt_database_type".to_string(),
    ];
    cols.extend(OS_COLUMNS.iter().map(|x| x.to_string()));
    cols.extend((1..=FILLER).map(|i| format!("extra_{:02}", i)));
    cols
}

pub fn csv(rows: &[Row]) -> String {
    let mut out = header().join(",");
    for r in rows {
        out.push('\n');
        out.push_str(&format!("{},{},{},{},{}", r.time, r.all, r.disconnected, r.instances, r.db));
        for x in r.os {
            out.push_str(&format!(",{}", x));
        }
        for _ in 0..FILLER {
            out.push_str(",x");
        }
    }
    out.push('\n');
    out
}

/// The same layout with `column` removed
pub fn csv_without(rows: &[Row], column: &str) -> String {
    let full = csv(rows);
    let idx = header().iter().position(|x| x == column).unwrap();
    full.lines()
        .map(|line| {
            let mut cells: Vec<&str> = line.split(',').collect();
            cells.remove(idx);
            cells.join(",")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// The same layout with `column` under another name
pub fn csv_renaming(rows: &[Row], column: &str, name: &str) -> String {
    let full = csv(rows);
    match full.split_once('\n') {
        Some((head, body)) => {
            let head = head
                .split(',')
                .map(|x| if x == column { name } else { x })
                .collect::<Vec<_>>()
                .join(",");
            format!("{}\n{}", head, body)
        }
        None => full,
    }
}

/// The same layout with every cell of `column` set to `value`
pub fn csv_filling(rows: &[Row], column: &str, value: &str) -> String {
    let idx = header().iter().position(|x| x == column).unwrap();
    let mut lines = csv(rows)
        .lines()
        .enumerate()
        .map(|(i, line)| {
            let mut cells: Vec<&str> = line.split(',').collect();
            if i > 0 {
                cells[idx] = value;
            }
            cells.join(",")
        })
        .collect::<Vec<_>>()
        .join("\n");
    lines.push('\n');
    lines
}

pub fn write(dir: &Path, name: &str, rows: &[Row]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, csv(rows)).unwrap();
    path
}

#[test]
fn layout() {
    assert_eq!(header().len(), 46);
    let text = csv(&[row("2023-01-01", 1, 0)]);
    assert!(text.lines().all(|l| l.split(',').count() == 46));
    assert_eq!(csv_without(&[], "endpoints_all").split(',').count(), 45);
    let renamed = csv_renaming(&[row("2023-01-01", 1, 0)], "data_collection_time", "collected");
    assert!(renamed.starts_with("collected,endpoints_all,"));
    assert_eq!(renamed.lines().count(), 2);
    let filled = csv_filling(&[row("2023-01-01", 1, 0)], "extra_01", "7");
    assert!(filled.lines().nth(1).unwrap().contains(",7,x,"));
    assert!(filled.starts_with("data_collection_time,"));
}
