//! Backend-agnostic view over a parsed tree.
//!
//! Both parse backends — the in-process grammar tree and the out-of-process
//! native AST — are wrapped by adapters implementing [`SyntaxNode`]. The
//! symbol tree builder only ever sees this trait, so adding a third backend
//! means adding one adapter, never touching the builder. Adapter construction
//! never fails: shapes the classification rules do not recognize degrade to
//! [`SymbolKind::None`], whose children are still visited.

pub mod grammar_tree;
pub mod native_ast;

use serde::{Deserialize, Serialize};

/// Classification assigned to a syntax node and carried by the resulting
/// symbols.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    /// The module root, and import statements.
    Package,
    Class,
    Function,
    Method,
    Constructor,
    Property,
    Variable,
    /// Not a symbol-bearing node; skipped by the builder, children visited.
    None,
}

impl std::fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SymbolKind::Package => write!(f, "package"),
            SymbolKind::Class => write!(f, "class"),
            SymbolKind::Function => write!(f, "function"),
            SymbolKind::Method => write!(f, "method"),
            SymbolKind::Constructor => write!(f, "constructor"),
            SymbolKind::Property => write!(f, "property"),
            SymbolKind::Variable => write!(f, "variable"),
            SymbolKind::None => write!(f, "none"),
        }
    }
}

/// The capability set the symbol tree builder consumes.
///
/// Lines and columns are both 0-based at this layer; adapters normalize the
/// 1-based lines reported by the native trees. Iterating `children` never
/// revisits a node and never mutates the wrapped tree.
pub trait SyntaxNode {
    fn kind(&self) -> SymbolKind;
    fn name(&self) -> Option<String>;
    fn line(&self) -> u32;
    fn col(&self) -> u32;
    fn children(&self) -> Vec<Box<dyn SyntaxNode + '_>>;
    /// Human-readable rendition of the wrapped subtree.
    fn dump(&self) -> String;
}

/// Shared classification of a function-shaped definition, identical for both
/// backends: METHOD under a class (with `__new__` as the constructor and a
/// `property`-decorated definition as a property), FUNCTION elsewhere.
pub(crate) fn function_kind(
    parent_kind: SymbolKind,
    name: &str,
    decorators: &[String],
) -> SymbolKind {
    if parent_kind == SymbolKind::Class {
        if name == "__new__" {
            return SymbolKind::Constructor;
        }
        if decorators.iter().any(|d| d == "property") {
            return SymbolKind::Property;
        }
        return SymbolKind::Method;
    }
    SymbolKind::Function
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn function_kind_depends_on_the_lexical_parent() {
        assert_eq!(function_kind(SymbolKind::Package, "f", &[]), SymbolKind::Function);
        assert_eq!(function_kind(SymbolKind::None, "f", &[]), SymbolKind::Function);
        assert_eq!(function_kind(SymbolKind::Class, "m", &[]), SymbolKind::Method);
        assert_eq!(function_kind(SymbolKind::Class, "__new__", &[]), SymbolKind::Constructor);
        assert_eq!(
            function_kind(SymbolKind::Class, "width", &["property".to_string()]),
            SymbolKind::Property
        );
        // property decoration outside a class body is just a function
        assert_eq!(
            function_kind(SymbolKind::Package, "width", &["property".to_string()]),
            SymbolKind::Function
        );
    }
}
