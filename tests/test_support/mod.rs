#![allow(dead_code)]

use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, TimeZone, Utc};
use std::collections::BTreeMap;
use std::fs;
use tempfile::TempDir;

/// Fixed timestamp so two runs differ only in version-derived fields
pub(crate) fn fixed_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 14, 15, 9, 26).unwrap()
}

pub(crate) fn utf8_base(temp: &TempDir) -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).expect("temp dir is UTF-8")
}

/// Relative path -> contents for every file under `dir`
pub(crate) fn snapshot(dir: &Utf8Path) -> BTreeMap<String, Vec<u8>> {
    let mut files = BTreeMap::new();
    collect(dir, dir, &mut files);
    files
}

fn collect(root: &Utf8Path, dir: &Utf8Path, files: &mut BTreeMap<String, Vec<u8>>) {
    for entry in dir.read_dir_utf8().unwrap() {
        let entry = entry.unwrap();
        let path = entry.path();
        if path.is_dir() {
            collect(root, path, files);
        } else {
            let rel = path.strip_prefix(root).unwrap().to_string();
            files.insert(rel, fs::read(path).unwrap());
        }
    }
}

/// Names directly under `dir`, sorted
pub(crate) fn entries(dir: &Utf8Path) -> Vec<String> {
    let mut names: Vec<String> = dir
        .read_dir_utf8()
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string())
        .collect();
    names.sort();
    names
}
