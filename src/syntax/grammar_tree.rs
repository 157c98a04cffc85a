//! Adapter over the grammar backend's concrete syntax tree.

use crate::parser::tree::{LeafKind, NodeId, NodeKind, SyntaxTree};
use crate::syntax::{function_kind, SymbolKind, SyntaxNode};

/// A lazily-constructed view over one node of a [`SyntaxTree`].
///
/// Carries the classified kind of its lexical parent so that context-
/// dependent rules (method vs function) resolve without back-pointers.
pub struct GrammarNode<'t> {
    tree: &'t SyntaxTree,
    node: NodeId,
    kind: SymbolKind,
    name: Option<String>,
    line: u32,
    col: u32,
    /// The nodes `children()` will wrap — for definitions these are the
    /// suite's children, so nesting is walked the way scopes nest.
    child_ids: Vec<NodeId>,
}

impl<'t> GrammarNode<'t> {
    /// Wrap the module root.
    pub fn root(tree: &'t SyntaxTree) -> GrammarNode<'t> {
        GrammarNode::wrap(tree, tree.root(), SymbolKind::None, Vec::new())
    }

    fn wrap(
        tree: &'t SyntaxTree,
        node: NodeId,
        parent_kind: SymbolKind,
        decorators: Vec<String>,
    ) -> GrammarNode<'t> {
        let start = tree.start_position(node);
        let line = start.line.saturating_sub(1);
        let col = start.col;
        let fallback = |kind: SymbolKind, name: Option<String>| GrammarNode {
            tree,
            node,
            kind,
            name,
            line,
            col,
            child_ids: tree.children(node).to_vec(),
        };

        match tree.kind(node) {
            Some(NodeKind::Module) => GrammarNode {
                tree,
                node,
                kind: SymbolKind::Package,
                name: Some("module".to_string()),
                line: 0,
                col: 0,
                child_ids: tree.children(node).to_vec(),
            },
            Some(NodeKind::Decorated) => {
                // unwrap to the definition, retaining the decorator names
                let decorators = decorator_names(tree, node);
                match tree.children(node).last() {
                    Some(&inner) if !tree.is_leaf(inner) => {
                        GrammarNode::wrap(tree, inner, parent_kind, decorators)
                    }
                    _ => fallback(SymbolKind::None, None),
                }
            }
            Some(NodeKind::AsyncFuncDef) => {
                let inner = tree
                    .children(node)
                    .iter()
                    .copied()
                    .find(|&c| tree.kind(c) == Some(NodeKind::FuncDef));
                match inner {
                    Some(inner) => {
                        // classification follows the inner definition, the
                        // position stays anchored at the `async` keyword
                        let mut wrapped = GrammarNode::wrap(tree, inner, parent_kind, decorators);
                        wrapped.node = node;
                        wrapped.line = line;
                        wrapped.col = col;
                        wrapped
                    }
                    None => fallback(SymbolKind::None, None),
                }
            }
            Some(NodeKind::ClassDef) | Some(NodeKind::CClassDef) => {
                let name = class_name(tree, node);
                GrammarNode {
                    tree,
                    node,
                    kind: SymbolKind::Class,
                    name,
                    line,
                    col,
                    child_ids: suite_children(tree, node),
                }
            }
            Some(NodeKind::FuncDef) | Some(NodeKind::CFuncDef) => {
                match function_name(tree, node) {
                    Some(name) => {
                        let kind = function_kind(parent_kind, &name, &decorators);
                        GrammarNode {
                            tree,
                            node,
                            kind,
                            name: Some(name),
                            line,
                            col,
                            child_ids: suite_children(tree, node),
                        }
                    }
                    None => fallback(SymbolKind::None, None),
                }
            }
            Some(NodeKind::ImportName) => {
                fallback(SymbolKind::Package, import_display_name(tree, node, false))
            }
            Some(NodeKind::ImportFrom) => {
                fallback(SymbolKind::Package, import_display_name(tree, node, true))
            }
            Some(NodeKind::ExprStmt) => match assignment_target(tree, node) {
                Some(name) => fallback(SymbolKind::Variable, Some(name)),
                None => fallback(SymbolKind::None, None),
            },
            Some(NodeKind::CVarDef) => match cvar_name(tree, node) {
                Some(name) => fallback(SymbolKind::Variable, Some(name)),
                None => fallback(SymbolKind::None, None),
            },
            _ => fallback(SymbolKind::None, None),
        }
    }
}

impl<'t> SyntaxNode for GrammarNode<'t> {
    fn kind(&self) -> SymbolKind {
        self.kind
    }

    fn name(&self) -> Option<String> {
        self.name.clone()
    }

    fn line(&self) -> u32 {
        self.line
    }

    fn col(&self) -> u32 {
        self.col
    }

    fn children(&self) -> Vec<Box<dyn SyntaxNode + '_>> {
        self.child_ids
            .iter()
            .filter(|&&c| !self.tree.is_leaf(c))
            .map(|&c| {
                Box::new(GrammarNode::wrap(self.tree, c, self.kind, Vec::new()))
                    as Box<dyn SyntaxNode + '_>
            })
            .collect()
    }

    fn dump(&self) -> String {
        self.tree.dump(self.node)
    }
}

/// A definition's logical children are its suite's children; a definition
/// without a suite (a `cdef` declaration) has none worth walking.
fn suite_children(tree: &SyntaxTree, node: NodeId) -> Vec<NodeId> {
    tree.children(node)
        .iter()
        .copied()
        .find(|&c| tree.kind(c) == Some(NodeKind::Suite))
        .map(|suite| tree.children(suite).to_vec())
        .unwrap_or_default()
}

/// Names of the decorators on a `decorated` wrapper: a plain-name decorator
/// contributes its name, the callee of a simple call likewise; dotted
/// decorators contribute nothing.
fn decorator_names(tree: &SyntaxTree, decorated: NodeId) -> Vec<String> {
    let mut names = Vec::new();
    let decorators = tree
        .children(decorated)
        .iter()
        .copied()
        .find(|&c| tree.kind(c) == Some(NodeKind::Decorators));
    let Some(decorators) = decorators else {
        return names;
    };
    for &decorator in tree.children(decorators) {
        let leaves = tree.children(decorator);
        // leaves[0] is the '@'
        let Some(&first) = leaves.get(1) else { continue };
        if tree.leaf_kind(first) != Some(LeafKind::Name) {
            continue;
        }
        let dotted = leaves
            .get(2)
            .map(|&next| tree.token(next).map(|t| t.text == ".").unwrap_or(false))
            .unwrap_or(false);
        if !dotted {
            names.push(tree.type_name(first).to_string());
        }
    }
    names
}

/// The first plain-name leaf after the `class` keyword.
fn class_name(tree: &SyntaxTree, node: NodeId) -> Option<String> {
    let children = tree.children(node);
    let class_idx = children.iter().position(|&c| {
        tree.leaf_kind(c) == Some(LeafKind::Keyword) && tree.type_name(c) == "class"
    })?;
    children[class_idx + 1..]
        .iter()
        .find(|&&c| tree.leaf_kind(c) == Some(LeafKind::Name))
        .map(|&c| tree.type_name(c).to_string())
}

/// The name leaf directly before the parameter list. Covers both `def f(...)`
/// and the dialect's `cdef int f(...)`, where type tokens run ahead of the
/// name.
fn function_name(tree: &SyntaxTree, node: NodeId) -> Option<String> {
    let children = tree.children(node);
    let params_idx = children
        .iter()
        .position(|&c| tree.kind(c) == Some(NodeKind::Parameters))?;
    children[..params_idx]
        .iter()
        .rev()
        .find(|&&c| tree.leaf_kind(c) == Some(LeafKind::Name))
        .map(|&c| tree.type_name(c).to_string())
}

/// Comma-joined dotted names of an import statement, aliases ignored.
fn import_display_name(tree: &SyntaxTree, node: NodeId, from_import: bool) -> Option<String> {
    let mut names: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut aliased = false;
    let mut seen_import_kw = false;
    for &child in tree.children(node) {
        let Some(token) = tree.token(child) else { continue };
        let is_keyword = tree.leaf_kind(child) == Some(LeafKind::Keyword);
        match token.text.as_str() {
            "from" | "import" if is_keyword => {
                if token.text == "import" {
                    seen_import_kw = true;
                    // in a from-import, only the names after `import` count
                    if from_import {
                        names.clear();
                        current.clear();
                        aliased = false;
                    }
                }
            }
            "as" if is_keyword => aliased = true,
            "," => {
                if !current.is_empty() {
                    names.push(std::mem::take(&mut current));
                }
                aliased = false;
            }
            "(" | ")" => {}
            _ if token.token_type == crate::tokenizer::TokenType::Newline => {}
            _ if aliased => {}
            _ if from_import && !seen_import_kw => {}
            _ => current.push_str(&token.text),
        }
    }
    if !current.is_empty() {
        names.push(current);
    }
    if names.is_empty() {
        None
    } else {
        Some(names.join(", "))
    }
}

/// First target of a plain (unannotated) assignment whose targets are simple
/// names; anything else is not a variable symbol.
fn assignment_target(tree: &SyntaxTree, node: NodeId) -> Option<String> {
    let mut depth = 0u32;
    let mut targets: Vec<NodeId> = Vec::new();
    let mut found_eq = false;
    for &child in tree.children(node) {
        let Some(token) = tree.token(child) else {
            return None; // structure before the '=' means no plain target
        };
        match token.text.as_str() {
            "(" | "[" | "{" => depth += 1,
            ")" | "]" | "}" => depth = depth.saturating_sub(1),
            ":" if depth == 0 => return None, // annotated assignment
            "=" if depth == 0 => {
                found_eq = true;
                break;
            }
            _ => targets.push(child),
        }
    }
    if !found_eq || targets.is_empty() {
        return None;
    }
    let plain = targets.iter().all(|&c| {
        tree.leaf_kind(c) == Some(LeafKind::Name)
            || tree.token(c).map(|t| t.text == ",").unwrap_or(false)
    });
    if !plain || tree.leaf_kind(targets[0]) != Some(LeafKind::Name) {
        return None;
    }
    Some(tree.type_name(targets[0]).to_string())
}

/// Declared name of a `cdef` variable: the last plain name before the
/// initializer (or the end of the declaration).
fn cvar_name(tree: &SyntaxTree, node: NodeId) -> Option<String> {
    let mut last_name = None;
    for &child in tree.children(node) {
        let Some(token) = tree.token(child) else { continue };
        match token.text.as_str() {
            "=" | "," => break,
            _ if tree.leaf_kind(child) == Some(LeafKind::Name) => {
                last_name = Some(token.text.clone());
            }
            _ => {}
        }
    }
    last_name
}
