use std::fs;
use std::io::Write;

use phishfeat::{
    count_data_rows, read_feature_file, FeatureRecord, IncrementalWriter, RowCountMismatch,
    SinkSpec, WriterError,
};
use tempfile::tempdir;

fn rows(n: u64, label: u8) -> Vec<FeatureRecord> {
    (0..n)
        .map(|i| FeatureRecord {
            url_length: 20 + i,
            num_subdomains: i % 3,
            has_https: (i % 2) as u8,
            num_hyphens: i,
            num_special_chars: 0,
            has_suspicious_keyword: 1,
            num_external_links: 4 * i,
            num_scripts: 2,
            label,
        })
        .collect()
}

fn sink(dir: &std::path::Path, rows_per_file: Option<u64>) -> (IncrementalWriter, SinkSpec) {
    let spec = SinkSpec {
        id: "phishing".to_string(),
        path: dir.join("out").join("phishing_features.csv"),
        rows_per_file,
    };
    let mut writer = IncrementalWriter::new();
    writer.register(spec.clone()).unwrap();
    (writer, spec)
}

#[test]
fn empty_append_leaves_sink_untouched() {
    let dir = tempdir().unwrap();
    let (mut writer, spec) = sink(dir.path(), None);

    let report = writer.append(&spec.id, &[], true).unwrap();
    assert_eq!(report.rows_written, 0);
    assert!(!spec.path.exists());
    assert!(!writer.header_written(&spec.id));

    writer.append(&spec.id, &rows(2, 1), true).unwrap();
    let before = fs::read(&spec.path).unwrap();
    writer.append(&spec.id, &[], false).unwrap();
    assert_eq!(fs::read(&spec.path).unwrap(), before);
}

#[test]
fn header_once_then_appends() {
    let dir = tempdir().unwrap();
    let (mut writer, spec) = sink(dir.path(), None);

    let first = writer.append(&spec.id, &rows(3, 1), true).unwrap();
    assert!(first.created);
    assert_eq!(first.mismatch, None);
    assert_eq!(count_data_rows(&spec.path).unwrap(), 3);

    let second = writer.append(&spec.id, &rows(4, 1), false).unwrap();
    assert!(!second.created);
    assert_eq!(second.mismatch, None);
    assert_eq!(count_data_rows(&spec.path).unwrap(), 7);

    let contents = fs::read_to_string(&spec.path).unwrap();
    let mut lines = contents.lines();
    assert_eq!(
        lines.next(),
        Some(concat!(
            "url_length,num_subdomains,has_https,num_hyphens,num_special_chars,",
            "has_suspicious_keyword,num_external_links,num_scripts,label"
        ))
    );
    assert_eq!(lines.count(), 7);
    assert_eq!(contents.matches("url_length").count(), 1);
}

#[test]
fn foreign_rows_in_the_sink_are_reported_without_failing_the_write() {
    let dir = tempdir().unwrap();
    let (mut writer, spec) = sink(dir.path(), None);

    writer.append(&spec.id, &rows(2, 1), true).unwrap();
    let mut file = fs::OpenOptions::new().append(true).open(&spec.path).unwrap();
    file.write_all(b"1,1,1,1,1,1,1,1,1\n").unwrap();
    drop(file);

    let report = writer.append(&spec.id, &rows(1, 1), false).unwrap();
    assert_eq!(report.rows_written, 1);
    assert_eq!(
        report.mismatch,
        Some(RowCountMismatch {
            path: spec.path.clone(),
            expected: 3,
            actual: 4,
        })
    );
    assert_eq!(count_data_rows(&spec.path).unwrap(), 4);
}

#[test]
fn first_write_truncates_previous_contents() {
    let dir = tempdir().unwrap();
    let (mut writer, spec) = sink(dir.path(), None);
    fs::write(&spec.path, "stale,data\n1,2\n3,4\n").unwrap();

    writer.append(&spec.id, &rows(1, 0), true).unwrap();
    assert_eq!(count_data_rows(&spec.path).unwrap(), 1);
}

#[test]
fn written_rows_read_back_unchanged() {
    let dir = tempdir().unwrap();
    let (mut writer, spec) = sink(dir.path(), None);
    let mut expected = rows(5, 0);
    expected.extend(rows(2, 1));

    writer.append(&spec.id, &expected[..5], true).unwrap();
    writer.append(&spec.id, &expected[5..], false).unwrap();

    assert_eq!(read_feature_file(&spec.path).unwrap(), expected);
}

#[test]
fn rolled_parts_each_carry_a_header_and_digest() {
    let dir = tempdir().unwrap();
    let (mut writer, spec) = sink(dir.path(), Some(3));

    writer.append(&spec.id, &rows(3, 1), true).unwrap();
    writer.append(&spec.id, &rows(2, 1), false).unwrap();
    writer.append(&spec.id, &rows(2, 1), false).unwrap();

    let summary = writer.finish(&spec.id).unwrap();
    assert_eq!(summary.rows_total, 7);
    assert_eq!(summary.parts.len(), 2);
    assert_eq!(summary.parts[0].rows, 3);
    assert_eq!(summary.parts[1].rows, 4);
    assert!(summary.parts[1].path.ends_with("phishing_features_1.csv"));
    for part in &summary.parts {
        assert_eq!(part.sha256.len(), 64);
        assert_eq!(count_data_rows(&part.path).unwrap(), part.rows);
    }
    assert!(matches!(
        writer.append(&spec.id, &rows(1, 1), false),
        Err(WriterError::UnknownSink(_))
    ));
}

#[test]
fn directory_path_is_rejected() {
    let dir = tempdir().unwrap();
    let mut writer = IncrementalWriter::new();
    let err = writer
        .register(SinkSpec {
            id: "benign".to_string(),
            path: dir.path().to_path_buf(),
            rows_per_file: None,
        })
        .unwrap_err();
    assert!(matches!(err, WriterError::InvalidPath { .. }));
}
