//! OutlineManager — public API for symbol outline extraction.
//!
//! Stateless: every request sets up its own parse and resolves to a single
//! complete symbol tree or a single typed failure. Requests can run on the
//! caller's thread or on a dedicated worker thread; the only shared state
//! between concurrent requests is the immutable grammar and token-pattern
//! caches.

use std::fs;
use std::path::{Path, PathBuf};
use std::thread::JoinHandle;

use tracing::debug;

use crate::bridge::{AstBridge, AstNode};
use crate::config::{Backend, Dialect, ExportPolicy, OutlineOptions};
use crate::error::OutlineError;
use crate::grammar::{load_grammar, DEFAULT_VERSION};
use crate::parser::parse;
use crate::symbols::{build_symbol_tree, Symbol};
use crate::syntax::grammar_tree::GrammarNode;
use crate::syntax::native_ast::AstSyntaxNode;
use crate::tokenizer::{token_collection, tokenize};

/// Manager for outline requests across both parse backends.
pub struct OutlineManager {
    bridge: AstBridge,
}

impl Default for OutlineManager {
    fn default() -> Self {
        Self::new()
    }
}

impl OutlineManager {
    pub fn new() -> OutlineManager {
        OutlineManager { bridge: AstBridge::new() }
    }

    /// Use a specific worker executable for the native-AST backend.
    pub fn with_worker(worker: impl Into<PathBuf>) -> OutlineManager {
        OutlineManager { bridge: AstBridge::with_worker(worker) }
    }

    /// Build the symbol outline of `file_path` with the selected backend.
    pub fn build_outline(
        &self,
        file_path: &Path,
        options: &OutlineOptions,
    ) -> Result<Symbol, OutlineError> {
        match options.backend {
            Backend::GrammarTree => {
                let content = fs::read_to_string(file_path)?;
                self.build_outline_from_source(file_path, &content, options)
            }
            Backend::NativeAst => {
                let module = self.bridge.parse_isolated(file_path)?;
                Ok(self.outline_from_module(&module, file_path, &options.policy))
            }
        }
    }

    /// Grammar-tree outline of in-memory content (e.g. an editor buffer).
    /// Error recovery is always on for this backend; malformed regions
    /// degrade to error nodes instead of failing the request.
    pub fn build_outline_from_source(
        &self,
        file_path: &Path,
        content: &str,
        options: &OutlineOptions,
    ) -> Result<Symbol, OutlineError> {
        let dialect = options
            .dialect
            .unwrap_or_else(|| Dialect::for_path(file_path));
        let version = options.version.as_deref().unwrap_or(DEFAULT_VERSION);
        let grammar = load_grammar(dialect, version)?;
        let collection = token_collection(dialect, grammar.version);

        let tree = parse(tokenize(content, &collection), &grammar, true)?;
        let root = GrammarNode::root(&tree);
        let symbol = build_symbol_tree(&root, &file_path.to_string_lossy(), &options.policy);
        debug!(
            file = %file_path.display(),
            %dialect,
            symbols = symbol.total() - 1,
            "extracted outline via grammar tree"
        );
        Ok(symbol)
    }

    /// Outline of an already-deserialized native module tree.
    pub fn outline_from_module(
        &self,
        module: &AstNode,
        file_path: &Path,
        policy: &ExportPolicy,
    ) -> Symbol {
        let root = AstSyntaxNode::root(module);
        let symbol = build_symbol_tree(&root, &file_path.to_string_lossy(), policy);
        debug!(
            file = %file_path.display(),
            symbols = symbol.total() - 1,
            "extracted outline via native ast"
        );
        symbol
    }

    /// Run a request on a dedicated worker thread. Dropping the handle is the
    /// best-effort cancellation: the result is simply never collected, and
    /// an already-spawned analyzer process is left to finish on its own.
    pub fn spawn(
        &self,
        file_path: PathBuf,
        options: OutlineOptions,
    ) -> JoinHandle<Result<Symbol, OutlineError>> {
        let worker = self.bridge_worker();
        std::thread::spawn(move || {
            OutlineManager::with_worker(worker).build_outline(&file_path, &options)
        })
    }

    fn bridge_worker(&self) -> PathBuf {
        self.bridge.worker_path().to_path_buf()
    }
}
