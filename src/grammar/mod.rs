//! Grammar loading and composition.
//!
//! One grammar resource exists per (dialect, major.minor) version, embedded
//! at build time and addressed by a deterministic virtual path. Loaded
//! grammars are immutable, cached for the process lifetime, and shared across
//! concurrent parses. The dialect's node map is the base language's map with
//! the dialect-only productions added as extra entries — base entries are
//! never overwritten.

pub mod bnf;

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use once_cell::sync::Lazy;
use tracing::debug;

use crate::config::Dialect;
use crate::error::OutlineError;
use crate::parser::tree::{LeafKind, NodeKind};
use crate::tokenizer::TokenType;

pub use bnf::{Production, RhsItem};

/// Newest version with a grammar resource; used when a request names none.
pub const DEFAULT_VERSION: &str = "3.12";

/// Embedded grammar resources, keyed by their deterministic virtual path.
static RESOURCES: &[(&str, &str)] = &[
    ("python/grammar310.txt", include_str!("python/grammar310.txt")),
    ("python/grammar311.txt", include_str!("python/grammar311.txt")),
    ("python/grammar312.txt", include_str!("python/grammar312.txt")),
    ("cython/grammar310.txt", include_str!("cython/grammar310.txt")),
    ("cython/grammar311.txt", include_str!("cython/grammar311.txt")),
    ("cython/grammar312.txt", include_str!("cython/grammar312.txt")),
];

/// An immutable, shareable grammar for one dialect and version.
#[derive(Debug)]
pub struct Grammar {
    pub dialect: Dialect,
    pub version: (u8, u8),
    productions: HashMap<String, Production>,
    /// Leading keyword to the productions it can introduce, in file order.
    keyword_dispatch: HashMap<String, Vec<String>>,
    node_map: HashMap<&'static str, NodeKind>,
    leaf_map: HashMap<TokenType, LeafKind>,
    default_node: NodeKind,
    keywords: HashSet<String>,
}

impl Grammar {
    pub fn has_production(&self, name: &str) -> bool {
        self.productions.contains_key(name)
    }

    pub fn production(&self, name: &str) -> Option<&Production> {
        self.productions.get(name)
    }

    /// Productions a statement-introducing keyword can start.
    pub fn dispatch(&self, keyword: &str) -> &[String] {
        self.keyword_dispatch
            .get(keyword)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Node constructor for a completed production; unmapped productions use
    /// the default constructor.
    pub fn node_kind(&self, production: &str) -> NodeKind {
        self.node_map
            .get(production)
            .copied()
            .unwrap_or(self.default_node)
    }

    /// Leaf constructor for a token. Names that are reserved words become
    /// keyword leaves.
    pub fn leaf_kind(&self, token_type: TokenType, text: &str) -> LeafKind {
        if token_type == TokenType::Name && self.keywords.contains(text) {
            return LeafKind::Keyword;
        }
        self.leaf_map.get(&token_type).copied().unwrap_or(LeafKind::Operator)
    }

    pub fn is_keyword(&self, text: &str) -> bool {
        self.keywords.contains(text)
    }
}

fn base_node_map() -> HashMap<&'static str, NodeKind> {
    HashMap::from([
        ("file_input", NodeKind::Module),
        ("classdef", NodeKind::ClassDef),
        ("funcdef", NodeKind::FuncDef),
        ("async_funcdef", NodeKind::AsyncFuncDef),
        ("decorated", NodeKind::Decorated),
        ("decorators", NodeKind::Decorators),
        ("decorator", NodeKind::Decorator),
        ("import_name", NodeKind::ImportName),
        ("import_from", NodeKind::ImportFrom),
        ("expr_stmt", NodeKind::ExprStmt),
        ("simple_stmt", NodeKind::SimpleStmt),
        ("suite", NodeKind::Suite),
        ("parameters", NodeKind::Parameters),
    ])
}

/// Dialect-only node constructors, layered on top of the base map.
fn cython_node_additions() -> HashMap<&'static str, NodeKind> {
    HashMap::from([
        ("cclassdef", NodeKind::CClassDef),
        ("cfuncdef", NodeKind::CFuncDef),
        ("cvar_def", NodeKind::CVarDef),
        ("ctypedef_stmt", NodeKind::CTypedef),
    ])
}

fn leaf_map() -> HashMap<TokenType, LeafKind> {
    HashMap::from([
        (TokenType::Name, LeafKind::Name),
        (TokenType::Number, LeafKind::Number),
        (TokenType::String, LeafKind::String),
        (TokenType::Operator, LeafKind::Operator),
        (TokenType::Newline, LeafKind::Newline),
        (TokenType::EndMarker, LeafKind::EndMarker),
        (TokenType::FStringStart, LeafKind::FStringStart),
        (TokenType::FStringString, LeafKind::FStringString),
        (TokenType::FStringEnd, LeafKind::FStringEnd),
        (TokenType::ErrorToken, LeafKind::ErrorLeaf),
    ])
}

fn base_keywords() -> HashSet<String> {
    [
        "False", "None", "True", "and", "as", "assert", "async", "await",
        "break", "class", "continue", "def", "del", "elif", "else", "except",
        "finally", "for", "from", "global", "if", "import", "in", "is",
        "lambda", "nonlocal", "not", "or", "pass", "raise", "return", "try",
        "while", "with", "yield",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}

const CYTHON_KEYWORD_ADDITIONS: &[&str] = &["cdef", "cpdef", "ctypedef"];

fn build_grammar(dialect: Dialect, version: (u8, u8), text: &str) -> Grammar {
    let production_list = bnf::parse_grammar_text(text);

    let mut keyword_dispatch: HashMap<String, Vec<String>> = HashMap::new();
    for production in &production_list {
        for keyword in production.leading_keywords() {
            keyword_dispatch
                .entry(keyword.to_string())
                .or_default()
                .push(production.name.clone());
        }
    }

    let mut node_map = base_node_map();
    let mut keywords = base_keywords();
    if dialect == Dialect::Cython {
        for (name, kind) in cython_node_additions() {
            // additions only; base entries stay authoritative
            node_map.entry(name).or_insert(kind);
        }
        keywords.extend(CYTHON_KEYWORD_ADDITIONS.iter().map(|k| k.to_string()));
    }

    let productions = production_list
        .into_iter()
        .map(|p| (p.name.clone(), p))
        .collect();

    Grammar {
        dialect,
        version,
        productions,
        keyword_dispatch,
        node_map,
        leaf_map: leaf_map(),
        default_node: NodeKind::Generic,
        keywords,
    }
}

fn parse_version(version: &str) -> Option<(u8, u8)> {
    let (major, minor) = version.split_once('.')?;
    Some((major.parse().ok()?, minor.parse().ok()?))
}

static LOADED_GRAMMARS: Lazy<Mutex<HashMap<String, Arc<Grammar>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Load (or fetch from cache) the grammar for a dialect and version string.
///
/// The cache is keyed by the resolved resource path; concurrent callers for
/// the same key receive the same instance, and construction happens at most
/// once because it runs under the cache lock.
pub fn load_grammar(dialect: Dialect, version: &str) -> Result<Arc<Grammar>, OutlineError> {
    let unsupported = || OutlineError::UnsupportedVersion { version: version.to_string() };
    let (major, minor) = parse_version(version).ok_or_else(unsupported)?;
    let path = format!("{}/grammar{}{}.txt", dialect.resource_name(), major, minor);

    let mut cache = LOADED_GRAMMARS
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    if let Some(grammar) = cache.get(&path) {
        return Ok(grammar.clone());
    }
    let (_, text) = RESOURCES
        .iter()
        .find(|(resource_path, _)| *resource_path == path)
        .ok_or_else(unsupported)?;
    debug!(%path, "loading grammar resource");
    let grammar = Arc::new(build_grammar(dialect, (major, minor), text));
    cache.insert(path, grammar.clone());
    Ok(grammar)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_and_caches_by_resolved_path() {
        let a = load_grammar(Dialect::Python, "3.10").unwrap();
        let b = load_grammar(Dialect::Python, "3.10").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.version, (3, 10));
    }

    #[test]
    fn unsupported_version_is_a_normal_failure() {
        let err = load_grammar(Dialect::Python, "9.9").unwrap_err();
        assert!(matches!(err, OutlineError::UnsupportedVersion { ref version } if version == "9.9"));
        let err = load_grammar(Dialect::Cython, "not-a-version").unwrap_err();
        assert!(matches!(err, OutlineError::UnsupportedVersion { .. }));
    }

    #[test]
    fn dialect_productions_extend_the_base_set() {
        let python = load_grammar(Dialect::Python, "3.12").unwrap();
        let cython = load_grammar(Dialect::Cython, "3.12").unwrap();

        assert!(python.has_production("funcdef"));
        assert!(!python.has_production("cfuncdef"));
        assert!(cython.has_production("funcdef"));
        assert!(cython.has_production("cfuncdef"));

        // base dispatch survives under the dialect
        assert_eq!(cython.dispatch("def"), ["funcdef".to_string()]);
        assert_eq!(
            cython.dispatch("cdef"),
            ["cclassdef".to_string(), "cfuncdef".to_string(), "cvar_def".to_string()]
        );
        assert_eq!(cython.dispatch("cpdef"), ["cfuncdef".to_string()]);
    }

    #[test]
    fn node_map_falls_back_to_the_default_constructor() {
        let grammar = load_grammar(Dialect::Python, "3.12").unwrap();
        assert_eq!(grammar.node_kind("classdef"), NodeKind::ClassDef);
        assert_eq!(grammar.node_kind("if_stmt"), NodeKind::Generic);
    }

    #[test]
    fn keyword_leaves_are_distinguished_from_names() {
        let grammar = load_grammar(Dialect::Cython, "3.12").unwrap();
        assert_eq!(grammar.leaf_kind(TokenType::Name, "class"), LeafKind::Keyword);
        assert_eq!(grammar.leaf_kind(TokenType::Name, "cdef"), LeafKind::Keyword);
        assert_eq!(grammar.leaf_kind(TokenType::Name, "widget"), LeafKind::Name);
        assert_eq!(grammar.leaf_kind(TokenType::Number, "1"), LeafKind::Number);
    }
}
