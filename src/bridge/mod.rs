//! Out-of-process AST bridge.
//!
//! A hostile or pathological source file can blow the recursion limits of an
//! AST builder, so the native-AST backend never parses in the host process.
//! It spawns the disposable `analyzer` worker, which parses the file and
//! trades the tree for a serialized artifact: the worker prints the artifact
//! path on stdout and exits 0, or prints nothing and exits 1. The caller
//! deserializes, validates, and unconditionally deletes the artifact —
//! success or failure — so repeated analyses never leak temp files.

pub mod ast;
pub mod worker;

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, warn};

use crate::error::OutlineError;

pub use ast::AstNode;

/// Client side of the isolation protocol.
pub struct AstBridge {
    worker: PathBuf,
}

impl Default for AstBridge {
    /// By default the worker binary is expected beside the host executable.
    fn default() -> Self {
        let worker = std::env::current_exe()
            .map(|exe| exe.with_file_name(format!("analyzer{}", std::env::consts::EXE_SUFFIX)))
            .unwrap_or_else(|_| PathBuf::from("analyzer"));
        AstBridge { worker }
    }
}

impl AstBridge {
    pub fn new() -> AstBridge {
        AstBridge::default()
    }

    /// Use a specific worker executable.
    pub fn with_worker(worker: impl Into<PathBuf>) -> AstBridge {
        AstBridge { worker: worker.into() }
    }

    /// The worker executable this bridge spawns.
    pub fn worker_path(&self) -> &Path {
        &self.worker
    }

    /// Parse `file` in an isolated worker process and hand back the
    /// deserialized module tree.
    ///
    /// Once the worker is spawned this call is committed: cancellation can at
    /// best stop waiting on the result, and any artifact the worker leaves
    /// behind is still cleaned up on every exit path below.
    pub fn parse_isolated(&self, file: &Path) -> Result<AstNode, OutlineError> {
        debug!(worker = %self.worker.display(), file = %file.display(), "spawning analyzer");
        let output = Command::new(&self.worker)
            .arg(file)
            .output()
            .map_err(|err| {
                OutlineError::analysis(format!("failed to run external analyzer: {err}"))
            })?;

        if !output.status.success() || output.stdout.is_empty() {
            if !output.stderr.is_empty() {
                warn!(
                    stderr = %String::from_utf8_lossy(&output.stderr).trim_end(),
                    "analyzer worker failed"
                );
            }
            return Err(OutlineError::analysis("failed to run external analyzer"));
        }

        let stdout = String::from_utf8(output.stdout)
            .map_err(|_| OutlineError::analysis("failed to run external analyzer"))?;
        let artifact = PathBuf::from(stdout.trim_end_matches(['\n', '\r']));
        read_artifact(&artifact)
    }
}

/// Read, delete, and deserialize an artifact file.
///
/// The delete happens before any validation so that a malformed artifact is
/// still removed; ownership of the file transferred to us with its path.
pub fn read_artifact(path: &Path) -> Result<AstNode, OutlineError> {
    let bytes = fs::read(path);
    if let Err(err) = fs::remove_file(path) {
        // deletion is best-effort when the read itself already failed
        if bytes.is_ok() {
            warn!(artifact = %path.display(), %err, "failed to delete analysis artifact");
        }
    }
    let bytes =
        bytes.map_err(|err| OutlineError::analysis(format!("failed to read artifact: {err}")))?;

    let node: AstNode = serde_json::from_slice(&bytes)
        .map_err(|_| OutlineError::analysis("unexpected artifact shape"))?;
    match node {
        AstNode::Module { .. } => Ok(node),
        _ => Err(OutlineError::analysis("unexpected artifact shape")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    #[test]
    fn worker_artifact_round_trips_through_the_caller_protocol() {
        let mut source = NamedTempFile::new().unwrap();
        writeln!(source, "class C:\n    def m(self):\n        pass").unwrap();

        let artifact = worker::run(source.path()).unwrap();
        let node = read_artifact(&artifact).unwrap();
        assert!(matches!(node, AstNode::Module { .. }));
        // the artifact was consumed
        assert!(!artifact.exists());
    }

    #[test]
    fn malformed_artifact_is_deleted_and_reported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, b"not json at all").unwrap();

        let err = read_artifact(&path).unwrap_err();
        assert!(matches!(err, OutlineError::Analysis(ref msg) if msg == "unexpected artifact shape"));
        assert!(!path.exists());
    }

    #[test]
    fn artifact_with_the_wrong_root_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("leaf.json");
        let not_a_module = AstNode::Assign {
            targets: vec!["x".to_string()],
            lineno: 1,
            col_offset: 0,
        };
        fs::write(&path, serde_json::to_vec(&not_a_module).unwrap()).unwrap();

        let err = read_artifact(&path).unwrap_err();
        assert!(matches!(err, OutlineError::Analysis(ref msg) if msg == "unexpected artifact shape"));
        assert!(!path.exists());
    }

    #[test]
    fn missing_worker_surfaces_an_analysis_error() {
        let bridge = AstBridge::with_worker("/no/such/analyzer-binary");
        let mut source = NamedTempFile::new().unwrap();
        writeln!(source, "x = 1").unwrap();

        let err = bridge.parse_isolated(source.path()).unwrap_err();
        assert!(matches!(err, OutlineError::Analysis(ref msg) if msg.starts_with("failed to run external analyzer")));
    }
}
