//! The uniform symbol tree — the artifact the presentation layer consumes.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ExportPolicy;
use crate::syntax::{SymbolKind, SyntaxNode};

/// One node of the outline. Children are in source order; lines and columns
/// are 0-based.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    pub line: u32,
    pub col: u32,
    /// Identity of the analyzed file, carried by every node.
    pub file_path: String,
    pub children: Vec<Symbol>,
}

impl Symbol {
    /// Number of direct children, for the tree-widget contract.
    pub fn n_children(&self) -> usize {
        self.children.len()
    }

    /// The nth direct child, for the tree-widget contract.
    pub fn nth_child(&self, n: usize) -> Option<&Symbol> {
        self.children.get(n)
    }

    /// Total number of symbols in this subtree, the root included.
    pub fn total(&self) -> usize {
        1 + self.children.iter().map(Symbol::total).sum::<usize>()
    }

    /// Indented one-line-per-symbol rendition.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        self.dump_into(0, &mut out);
        out
    }

    fn dump_into(&self, depth: usize, out: &mut String) {
        for _ in 0..depth {
            out.push_str("   ");
        }
        out.push_str(&format!(
            "{} {} ({}:{})\n",
            self.kind, self.name, self.line, self.col
        ));
        for child in &self.children {
            child.dump_into(depth + 1, out);
        }
    }
}

/// Walk a syntax-node tree depth-first and build the symbol tree under the
/// given export policy.
///
/// The root is always a PACKAGE named after the file. Emission rules:
/// CLASS/FUNCTION/METHOD/CONSTRUCTOR/PROPERTY are unconditional; VARIABLE is
/// gated by the flag matching its lexical parent's kind (module variables
/// under PACKAGE, class variables under CLASS, anything else never emitted);
/// import PACKAGE leaves are gated by `export_imports`. A suppressed or
/// unclassified node still has its children visited, attached to the nearest
/// emitted ancestor — the builder is total over any syntax tree.
pub fn build_symbol_tree(root: &dyn SyntaxNode, file_path: &str, policy: &ExportPolicy) -> Symbol {
    let file_name = Path::new(file_path)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| file_path.to_string());

    let mut root_symbol = Symbol {
        name: file_name,
        kind: SymbolKind::Package,
        line: 0,
        col: 0,
        file_path: file_path.to_string(),
        children: Vec::new(),
    };
    for child in root.children() {
        visit(child.as_ref(), root.kind(), &mut root_symbol, policy, file_path);
    }
    debug!(file = file_path, symbols = root_symbol.total() - 1, "built symbol tree");
    root_symbol
}

fn visit(
    node: &dyn SyntaxNode,
    parent_kind: SymbolKind,
    parent_symbol: &mut Symbol,
    policy: &ExportPolicy,
    file_path: &str,
) {
    let kind = node.kind();
    let emitted = match kind {
        SymbolKind::None => false,
        SymbolKind::Variable => match parent_kind {
            SymbolKind::Package => policy.export_module_variables,
            SymbolKind::Class => policy.export_class_variables,
            _ => false,
        },
        SymbolKind::Package => policy.export_imports,
        _ => true,
    };

    let name = node.name();
    if emitted && name.is_some() {
        parent_symbol.children.push(Symbol {
            name: name.expect("checked above"),
            kind,
            line: node.line(),
            col: node.col(),
            file_path: file_path.to_string(),
            children: Vec::new(),
        });
        let slot = parent_symbol
            .children
            .last_mut()
            .expect("just pushed a child");
        for child in node.children() {
            visit(child.as_ref(), kind, slot, policy, file_path);
        }
    } else {
        // still recurse: definitions may nest under a suppressed node
        for child in node.children() {
            visit(child.as_ref(), kind, parent_symbol, policy, file_path);
        }
    }
}
