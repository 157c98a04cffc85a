//! Adapter over the out-of-process bridge's deserialized tree.

use crate::bridge::AstNode;
use crate::syntax::{function_kind, SymbolKind, SyntaxNode};

/// A view over one node of the native AST, carrying the classified kind of
/// its lexical parent.
pub struct AstSyntaxNode<'a> {
    node: &'a AstNode,
    parent_kind: SymbolKind,
}

impl<'a> AstSyntaxNode<'a> {
    /// Wrap the deserialized module root.
    pub fn root(module: &'a AstNode) -> AstSyntaxNode<'a> {
        AstSyntaxNode { node: module, parent_kind: SymbolKind::None }
    }

    /// Per-node-type dispatch producing the (kind, name) pair.
    fn classify(&self) -> (SymbolKind, Option<String>) {
        match self.node {
            AstNode::Module { .. } => (SymbolKind::Package, Some("module".to_string())),
            AstNode::FunctionDef { name, decorator_list, .. }
            | AstNode::AsyncFunctionDef { name, decorator_list, .. } => (
                function_kind(self.parent_kind, name, decorator_list),
                Some(name.clone()),
            ),
            AstNode::ClassDef { name, .. } => (SymbolKind::Class, Some(name.clone())),
            AstNode::Import { names, .. } | AstNode::ImportFrom { names, .. } => {
                if names.is_empty() {
                    (SymbolKind::None, None)
                } else {
                    (SymbolKind::Package, Some(names.join(", ")))
                }
            }
            AstNode::Assign { targets, .. } => match targets.first() {
                Some(first) => (SymbolKind::Variable, Some(first.clone())),
                None => (SymbolKind::None, None),
            },
            AstNode::Block { .. } => (SymbolKind::None, None),
        }
    }

    fn position(&self) -> (u32, u32) {
        match self.node {
            AstNode::Module { .. } => (0, 0),
            AstNode::FunctionDef { lineno, col_offset, .. }
            | AstNode::AsyncFunctionDef { lineno, col_offset, .. }
            | AstNode::ClassDef { lineno, col_offset, .. }
            | AstNode::Assign { lineno, col_offset, .. }
            | AstNode::Import { lineno, col_offset, .. }
            | AstNode::ImportFrom { lineno, col_offset, .. }
            | AstNode::Block { lineno, col_offset, .. } => {
                (lineno.saturating_sub(1), *col_offset)
            }
        }
    }
}

impl<'a> SyntaxNode for AstSyntaxNode<'a> {
    fn kind(&self) -> SymbolKind {
        self.classify().0
    }

    fn name(&self) -> Option<String> {
        self.classify().1
    }

    fn line(&self) -> u32 {
        self.position().0
    }

    fn col(&self) -> u32 {
        self.position().1
    }

    fn children(&self) -> Vec<Box<dyn SyntaxNode + '_>> {
        let kind = self.kind();
        self.node
            .body()
            .iter()
            .map(|child| {
                Box::new(AstSyntaxNode { node: child, parent_kind: kind })
                    as Box<dyn SyntaxNode + '_>
            })
            .collect()
    }

    fn dump(&self) -> String {
        let mut out = String::new();
        dump_into(self.node, 0, &mut out);
        out
    }
}

fn dump_into(node: &AstNode, depth: usize, out: &mut String) {
    for _ in 0..depth {
        out.push_str("  ");
    }
    let label = match node {
        AstNode::Module { .. } => "Module".to_string(),
        AstNode::FunctionDef { name, lineno, .. } => format!("FunctionDef {name} line:{lineno}"),
        AstNode::AsyncFunctionDef { name, lineno, .. } => {
            format!("AsyncFunctionDef {name} line:{lineno}")
        }
        AstNode::ClassDef { name, lineno, .. } => format!("ClassDef {name} line:{lineno}"),
        AstNode::Assign { targets, lineno, .. } => {
            format!("Assign {} line:{lineno}", targets.join(", "))
        }
        AstNode::Import { names, lineno, .. } => {
            format!("Import {} line:{lineno}", names.join(", "))
        }
        AstNode::ImportFrom { names, lineno, .. } => {
            format!("ImportFrom {} line:{lineno}", names.join(", "))
        }
        AstNode::Block { lineno, .. } => format!("Block line:{lineno}"),
    };
    out.push_str(&label);
    out.push('\n');
    for child in node.body() {
        dump_into(child, depth + 1, out);
    }
}
