//! Analysis configuration fed in by the host's preference store.
//!
//! The host supplies three export booleans plus a backend-selection string;
//! everything else (dialect, grammar version) is derived from the file unless
//! overridden per request.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::OutlineError;

/// Which parse strategy serves a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    /// In-process grammar-driven parse with error recovery.
    GrammarTree,
    /// Out-of-process native-AST parse in a disposable worker.
    NativeAst,
}

impl FromStr for Backend {
    type Err = OutlineError;

    /// Invalid selection strings fail closed, before any parsing work.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "grammar-tree" => Ok(Backend::GrammarTree),
            "native-ast" => Ok(Backend::NativeAst),
            other => Err(OutlineError::UnsupportedBackend(other.to_string())),
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::GrammarTree => write!(f, "grammar-tree"),
            Backend::NativeAst => write!(f, "native-ast"),
        }
    }
}

/// Source dialect recognized by the grammar-tree backend.
///
/// Cython is a strict syntactic superset of Python; the extra productions are
/// layered onto the base grammar at load time, never patched in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    Python,
    Cython,
}

impl Dialect {
    /// Name used in grammar resource paths.
    pub fn resource_name(self) -> &'static str {
        match self {
            Dialect::Python => "python",
            Dialect::Cython => "cython",
        }
    }

    /// Detect the dialect from a file extension.
    pub fn from_extension(extension: &str) -> Option<Dialect> {
        match extension {
            "py" | "pyi" => Some(Dialect::Python),
            "pyx" | "pxd" | "pxi" => Some(Dialect::Cython),
            _ => None,
        }
    }

    /// Dialect for a path, defaulting to Python for unknown extensions.
    pub fn for_path(path: &Path) -> Dialect {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Dialect::from_extension)
            .unwrap_or(Dialect::Python)
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.resource_name())
    }
}

/// The three-flag visibility policy controlling which symbol kinds are
/// suppressed. CLASS/FUNCTION/METHOD emission is unconditional and not
/// governed here.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportPolicy {
    /// Emit import statements as PACKAGE leaves.
    #[serde(default)]
    pub export_imports: bool,
    /// Emit assignments whose lexical parent is the module.
    #[serde(default)]
    pub export_module_variables: bool,
    /// Emit assignments whose lexical parent is a class body.
    #[serde(default)]
    pub export_class_variables: bool,
}

impl ExportPolicy {
    /// Policy with every export flag raised.
    pub fn export_all() -> ExportPolicy {
        ExportPolicy {
            export_imports: true,
            export_module_variables: true,
            export_class_variables: true,
        }
    }
}

/// Per-request options.
#[derive(Debug, Clone)]
pub struct OutlineOptions {
    pub backend: Backend,
    pub policy: ExportPolicy,
    /// Grammar version as "major.minor"; defaults to the newest supported.
    pub version: Option<String>,
    /// Dialect override; detected from the file extension when absent.
    pub dialect: Option<Dialect>,
}

impl Default for OutlineOptions {
    fn default() -> Self {
        OutlineOptions {
            backend: Backend::GrammarTree,
            policy: ExportPolicy::default(),
            version: None,
            dialect: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_strings_round_trip() {
        assert_eq!("grammar-tree".parse::<Backend>().unwrap(), Backend::GrammarTree);
        assert_eq!("native-ast".parse::<Backend>().unwrap(), Backend::NativeAst);
    }

    #[test]
    fn unknown_backend_fails_closed() {
        let err = "jit-ast".parse::<Backend>().unwrap_err();
        assert!(matches!(err, OutlineError::UnsupportedBackend(ref s) if s == "jit-ast"));
    }

    #[test]
    fn dialect_detection_from_extension() {
        assert_eq!(Dialect::from_extension("py"), Some(Dialect::Python));
        assert_eq!(Dialect::from_extension("pyx"), Some(Dialect::Cython));
        assert_eq!(Dialect::from_extension("pxd"), Some(Dialect::Cython));
        assert_eq!(Dialect::from_extension("rs"), None);
        assert_eq!(Dialect::for_path(Path::new("pkg/module.pyx")), Dialect::Cython);
        assert_eq!(Dialect::for_path(Path::new("README")), Dialect::Python);
    }

    #[test]
    fn export_policy_defaults_off() {
        let policy = ExportPolicy::default();
        assert!(!policy.export_imports);
        assert!(!policy.export_module_variables);
        assert!(!policy.export_class_variables);
    }
}
