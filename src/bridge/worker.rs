//! Worker-side implementation of the isolation protocol.
//!
//! The `analyzer` binary is a thin wrapper around [`run`]: read the file,
//! parse it with the no-recovery grammar, serialize the tree to an artifact
//! under the dedicated temp directory, and hand the artifact path back. The
//! logic lives in the library so the protocol is testable without spawning a
//! process.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

use crate::bridge::ast;
use crate::error::OutlineError;

/// Monotonic per-process counter; combined with the PID it makes artifact
/// names unique across concurrent requests and across worker restarts.
static ARTIFACT_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Directory all artifacts are written under.
pub fn artifact_dir() -> PathBuf {
    std::env::temp_dir().join("symline")
}

fn next_artifact_path() -> PathBuf {
    let counter = ARTIFACT_COUNTER.fetch_add(1, Ordering::Relaxed);
    artifact_dir().join(format!("ast-{}-{}.json", std::process::id(), counter))
}

/// Parse `file` and write the serialized tree to a fresh artifact, returning
/// the artifact's path. Ownership of the artifact transfers to whoever
/// receives the path.
pub fn run(file: &Path) -> Result<PathBuf, OutlineError> {
    let code = fs::read_to_string(file)?;
    let module = ast::parse_module(&code)?;
    let bytes = serde_json::to_vec(&module)
        .map_err(|err| OutlineError::analysis(format!("failed to serialize tree: {err}")))?;

    let path = next_artifact_path();
    fs::create_dir_all(artifact_dir())?;
    fs::write(&path, bytes)?;
    debug!(artifact = %path.display(), "wrote analysis artifact");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn writes_an_artifact_for_a_valid_file() {
        let mut source = NamedTempFile::new().unwrap();
        writeln!(source, "def f():\n    return 1").unwrap();

        let artifact = run(source.path()).unwrap();
        assert!(artifact.exists());
        let node: ast::AstNode =
            serde_json::from_slice(&fs::read(&artifact).unwrap()).unwrap();
        assert!(matches!(node, ast::AstNode::Module { .. }));
        fs::remove_file(artifact).unwrap();
    }

    #[test]
    fn artifact_paths_are_unique_per_request() {
        let mut source = NamedTempFile::new().unwrap();
        writeln!(source, "x = 1").unwrap();

        let a = run(source.path()).unwrap();
        let b = run(source.path()).unwrap();
        assert_ne!(a, b);
        fs::remove_file(a).unwrap();
        fs::remove_file(b).unwrap();
    }

    #[test]
    fn nonexistent_file_fails_without_writing_anything() {
        let err = run(Path::new("/no/such/file.py")).unwrap_err();
        assert!(matches!(err, OutlineError::Io(_)));
    }

    #[test]
    fn parse_failure_fails_without_an_artifact() {
        let mut source = NamedTempFile::new().unwrap();
        writeln!(source, "def broken(:").unwrap();

        let err = run(source.path()).unwrap_err();
        assert!(matches!(err, OutlineError::Syntax { .. }));
    }
}
