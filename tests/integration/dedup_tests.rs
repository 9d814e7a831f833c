//! Duplicate detection through the full pipeline with real hashing.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use filevet::duplicates::group_duplicates;
use filevet::output::{build_report, ActionLog, CsvOutput};
use filevet::pipeline::{
    run_pipeline, ControllerConfig, PipelineRun, Scheduler, SchedulerConfig, TaskQueue,
};
use filevet::progress::NoProgress;
use filevet::signal::ShutdownHandler;
use filevet::verifier::{ContentHasher, HashAlgorithm, InvocationFault, Verifier};
use tempfile::TempDir;

/// Passes every file.
struct PassAll;

impl Verifier for PassAll {
    fn verify(&self, _path: &Path, _cancel: &AtomicBool) -> Result<String, InvocationFault> {
        Ok(String::new())
    }
}

/// Writes `(name, content)` pairs and returns their paths in order.
fn write_files(dir: &TempDir, files: &[(&str, &str)]) -> Vec<PathBuf> {
    files
        .iter()
        .map(|(name, content)| {
            let path = dir.path().join(name);
            fs::write(&path, content).unwrap();
            path
        })
        .collect()
}

fn run_with_hasher(paths: Vec<PathBuf>, algorithm: HashAlgorithm) -> PipelineRun {
    let scheduler = Scheduler::new(
        TaskQueue::from_paths(paths),
        Arc::new(PassAll),
        SchedulerConfig::default()
            .with_max_concurrent(3)
            .with_hasher(ContentHasher::new(algorithm)),
    )
    .unwrap();
    run_pipeline(
        scheduler,
        &ControllerConfig::default().with_poll_interval(Duration::from_millis(2)),
        &ShutdownHandler::new(),
        &mut NoProgress,
        &mut ActionLog::new(),
    )
}

#[test]
fn test_one_group_of_three() {
    let dir = TempDir::new().unwrap();
    let paths = write_files(
        &dir,
        &[
            ("a.mkv", "content A"),
            ("b1.mkv", "content B"),
            ("c.mkv", "content C"),
            ("b2.mkv", "content B"),
            ("b3.mkv", "content B"),
        ],
    );

    let run = run_with_hasher(paths.clone(), HashAlgorithm::Blake3);
    let (_, index) = run.aggregator.into_parts();
    let (groups, stats) = group_duplicates(&index);

    assert_eq!(groups.len(), 1);
    assert_eq!(
        groups[0].paths,
        vec![paths[1].clone(), paths[3].clone(), paths[4].clone()]
    );
    assert_eq!(stats.unique_hashes, 3);
    assert_eq!(stats.eliminated_unique, 2);
    assert_eq!(stats.duplicate_files, 3);
    assert_eq!(stats.redundant_files(), 2);
}

#[test]
fn test_sha256_groups_match_blake3() {
    let dir = TempDir::new().unwrap();
    let paths = write_files(
        &dir,
        &[("x.mkv", "same"), ("y.mkv", "same"), ("z.mkv", "different")],
    );

    let groups_for = |algorithm| {
        let (_, index) = run_with_hasher(paths.clone(), algorithm).aggregator.into_parts();
        group_duplicates(&index).0
    };
    let blake = groups_for(HashAlgorithm::Blake3);
    let sha = groups_for(HashAlgorithm::Sha256);

    assert_eq!(blake.len(), 1);
    assert_eq!(sha.len(), 1);
    assert_eq!(blake[0].paths, sha[0].paths);
    assert_eq!(sha[0].hash.len(), 64);
}

#[test]
fn test_no_duplicates_means_no_groups() {
    let dir = TempDir::new().unwrap();
    let paths = write_files(&dir, &[("a.mkv", "1"), ("b.mkv", "2"), ("c.mkv", "3")]);

    let (_, index) = run_with_hasher(paths, HashAlgorithm::Blake3).aggregator.into_parts();
    let (groups, stats) = group_duplicates(&index);

    assert!(groups.is_empty());
    assert_eq!(stats.eliminated_unique, 3);
}

#[test]
fn test_duplicate_records_in_csv() {
    let dir = TempDir::new().unwrap();
    let paths = write_files(&dir, &[("a.mkv", "dup"), ("b.mkv", "dup")]);

    let (_, index) = run_with_hasher(paths, HashAlgorithm::Blake3).aggregator.into_parts();
    let (groups, _) = group_duplicates(&index);
    let records = build_report(&groups, &[]);
    let csv = CsvOutput::new(&records).to_string().unwrap();

    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines[0], "type,status,detail,diagnostic,path");
    assert_eq!(lines.len(), 3);
    assert!(lines[1].starts_with(&format!("duplicate,group-1,{},", groups[0].hash)));
    assert!(lines[2].ends_with("b.mkv"));
}
