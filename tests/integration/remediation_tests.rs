//! Remediation against a real filesystem.

use std::fs;
use std::io::Cursor;
use std::path::PathBuf;

use filevet::actions::{
    AutoConfirm, OutcomeKind, PromptConfirm, RemediationAction, RemediationEngine,
    RemediationPlan, RemediationState,
};
use filevet::pipeline::FlaggedFile;
use tempfile::TempDir;

fn flagged_files(dir: &TempDir, names: &[&str]) -> Vec<FlaggedFile> {
    names
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let path = dir.path().join(name);
            fs::write(&path, name.as_bytes()).unwrap();
            FlaggedFile::new(path, "corrupt", i)
        })
        .collect()
}

#[test]
fn test_move_isolates_missing_file() {
    let dir = TempDir::new().unwrap();
    let flagged = flagged_files(&dir, &["one.mkv", "two.mkv", "three.mkv"]);
    fs::remove_file(dir.path().join("two.mkv")).unwrap();
    let quarantine = dir.path().join("quarantine");

    let engine = RemediationEngine::new(
        flagged,
        RemediationPlan::new(RemediationAction::Move).with_quarantine_dir(&quarantine),
    );
    let outcomes = engine.run(&mut AutoConfirm(true), None).unwrap();

    let kinds: Vec<_> = outcomes.iter().map(|o| o.action).collect();
    assert_eq!(
        kinds,
        vec![OutcomeKind::Moved, OutcomeKind::Failed, OutcomeKind::Moved]
    );
    assert!(quarantine.join("one.mkv").is_file());
    assert!(quarantine.join("three.mkv").is_file());
    assert!(!dir.path().join("one.mkv").exists());
}

#[test]
fn test_move_renames_on_collision() {
    let dir = TempDir::new().unwrap();
    let quarantine = dir.path().join("q");
    fs::create_dir(&quarantine).unwrap();
    fs::write(quarantine.join("clip.mkv"), b"already here").unwrap();
    let flagged = flagged_files(&dir, &["clip.mkv"]);

    let outcomes = RemediationEngine::new(
        flagged,
        RemediationPlan::new(RemediationAction::Move).with_quarantine_dir(&quarantine),
    )
    .run(&mut AutoConfirm(true), None)
    .unwrap();

    assert_eq!(outcomes[0].action, OutcomeKind::Moved);
    assert_eq!(
        fs::read(quarantine.join("clip.mkv")).unwrap(),
        b"already here"
    );
    assert_eq!(fs::read(quarantine.join("clip (1).mkv")).unwrap(), b"clip.mkv");
}

#[test]
fn test_permanent_delete() {
    let dir = TempDir::new().unwrap();
    let flagged = flagged_files(&dir, &["a.mkv", "b.mkv"]);

    let outcomes = RemediationEngine::new(flagged, RemediationPlan::new(RemediationAction::Delete))
        .run(&mut AutoConfirm(true), None)
        .unwrap();

    assert!(outcomes.iter().all(|o| o.action == OutcomeKind::Deleted));
    assert!(!dir.path().join("a.mkv").exists());
    assert!(!dir.path().join("b.mkv").exists());
}

#[test]
fn test_prompt_reasks_until_answered() {
    let dir = TempDir::new().unwrap();
    let flagged = flagged_files(&dir, &["keep.mkv"]);
    let mut output = Vec::new();

    let outcomes = {
        let mut prompt = PromptConfirm::new(Cursor::new("maybe\n\nno\n"), &mut output);
        RemediationEngine::new(flagged, RemediationPlan::new(RemediationAction::Delete))
            .run(&mut prompt, None)
            .unwrap()
    };

    let transcript = String::from_utf8(output).unwrap();
    assert!(transcript.contains("Permanently delete 1 flagged file?"));
    assert!(transcript.contains("Please answer y or n."));
    assert_eq!(outcomes[0].action, OutcomeKind::Skipped);
    assert!(dir.path().join("keep.mkv").exists());
}

#[test]
fn test_prompt_eof_is_an_error() {
    let dir = TempDir::new().unwrap();
    let flagged = flagged_files(&dir, &["keep.mkv"]);
    let mut prompt = PromptConfirm::new(Cursor::new(""), Vec::new());

    let result = RemediationEngine::new(flagged, RemediationPlan::new(RemediationAction::Move))
        .run(&mut prompt, None);

    assert!(result.is_err());
    assert!(dir.path().join("keep.mkv").exists());
}

#[test]
fn test_step_by_step_transitions() {
    let dir = TempDir::new().unwrap();
    let flagged = flagged_files(&dir, &["x.mkv"]);
    let mut engine = RemediationEngine::new(
        flagged,
        RemediationPlan::new(RemediationAction::Move)
            .with_quarantine_dir(dir.path().join("quarantine")),
    );

    assert_eq!(engine.state(), RemediationState::AwaitingConfirmation);
    engine.answer(true);
    assert_eq!(engine.state(), RemediationState::Acting);
    engine.act(None);
    assert_eq!(engine.state(), RemediationState::Done);
    assert_eq!(engine.outcomes().len(), 1);
    assert_eq!(
        engine.outcomes()[0].detail,
        dir.path()
            .join("quarantine")
            .join("x.mkv")
            .to_string_lossy()
    );
}

#[test]
fn test_empty_list_never_prompts() {
    struct Panicking;
    impl filevet::actions::Confirm for Panicking {
        fn confirm(&mut self, _question: &str) -> std::io::Result<bool> {
            panic!("should not be asked");
        }
    }

    let outcomes = RemediationEngine::new(
        Vec::<FlaggedFile>::new(),
        RemediationPlan::new(RemediationAction::Move).with_quarantine_dir(PathBuf::from("unused")),
    )
    .run(&mut Panicking, None)
    .unwrap();
    assert!(outcomes.is_empty());
}
