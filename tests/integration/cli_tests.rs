use clap::Parser;
use reclaim::cli::Cli;
use reclaim::duplicates::FinderError;
use reclaim::error::ExitCode;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn run(args: &[&str]) -> anyhow::Result<ExitCode> {
    let mut argv = vec!["reclaim", "-q", "--no-color"];
    argv.extend_from_slice(args);
    reclaim::run_app(Cli::try_parse_from(argv).unwrap())
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[test]
fn test_scan_exit_code_duplicates_found() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("a"), [1u8; 2048]).unwrap();
    fs::write(dir.path().join("b"), [1u8; 2048]).unwrap();
    let root = path_arg(dir.path());

    let code = run(&["scan", &root, "--output", "json"]).unwrap();
    assert_eq!(code, ExitCode::Success);
}

#[test]
fn test_scan_exit_code_no_duplicates() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("a"), [1u8; 2048]).unwrap();
    fs::write(dir.path().join("b"), [2u8; 2048]).unwrap();
    let root = path_arg(dir.path());

    let code = run(&["scan", &root]).unwrap();
    assert_eq!(code, ExitCode::NoDuplicates);
}

#[test]
fn test_scan_default_min_size_skips_small_files() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("a"), b"small").unwrap();
    fs::write(dir.path().join("b"), b"small").unwrap();
    let root = path_arg(dir.path());

    assert_eq!(run(&["scan", &root]).unwrap(), ExitCode::NoDuplicates);
    assert_eq!(
        run(&["scan", &root, "--min-size", "1"]).unwrap(),
        ExitCode::Success
    );
}

#[test]
fn test_scan_missing_path_is_error() {
    let dir = tempdir().unwrap();
    let missing = path_arg(&dir.path().join("nope"));

    let err = run(&["scan", &missing]).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<FinderError>(),
        Some(FinderError::PathNotFound(_))
    ));
}

#[test]
fn test_explicit_config_file_applies() {
    let dir = tempdir().unwrap();
    let data = dir.path().join("data");
    fs::create_dir(&data).unwrap();
    fs::write(data.join("a"), b"tiny").unwrap();
    fs::write(data.join("b"), b"tiny").unwrap();
    let config = dir.path().join("reclaim.toml");
    fs::write(&config, "min_size = 1\nkeep = \"oldest\"\n").unwrap();

    let code = run(&["--config", &path_arg(&config), "scan", &path_arg(&data)]).unwrap();
    assert_eq!(code, ExitCode::Success);
}

#[test]
fn test_missing_config_file_is_error() {
    let dir = tempdir().unwrap();
    let missing = path_arg(&dir.path().join("absent.toml"));
    let root = path_arg(dir.path());

    assert!(run(&["--config", &missing, "scan", &root]).is_err());
}

#[test]
fn test_clean_with_yes_removes_copies() {
    let dir = tempdir().unwrap();
    let data = dir.path().join("data");
    fs::create_dir(&data).unwrap();
    fs::write(data.join("a"), [3u8; 4096]).unwrap();
    fs::write(data.join("b"), [3u8; 4096]).unwrap();
    let root = path_arg(&data);

    // The system trash may be unavailable in CI sandboxes
    match run(&["clean", &root, "--yes", "--keep", "oldest"]) {
        Ok(ExitCode::Success) => {
            let remaining = fs::read_dir(&data).unwrap().count();
            assert_eq!(remaining, 1);
        }
        Ok(code) => assert_eq!(code, ExitCode::PartialSuccess),
        Err(e) => panic!("clean failed: {e:#}"),
    }
}
