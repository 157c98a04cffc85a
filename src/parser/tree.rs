//! Arena-allocated concrete syntax tree.
//!
//! Nodes live in one `Vec` owned by the tree and are addressed by `NodeId`;
//! children vectors are owned by their node, parents are plain back indices.
//! There is no shared ownership anywhere in the tree, so it is `Send` and can
//! cross a worker-thread boundary as a whole.

use crate::tokenizer::{Position, Token};

/// Constructors for internal nodes, selected through the grammar's node map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Module,
    ClassDef,
    FuncDef,
    AsyncFuncDef,
    Decorated,
    Decorators,
    Decorator,
    ImportName,
    ImportFrom,
    ExprStmt,
    SimpleStmt,
    Suite,
    Parameters,
    /// Cython `cdef class`.
    CClassDef,
    /// Cython `cdef`/`cpdef` function.
    CFuncDef,
    /// Cython `cdef` variable declaration.
    CVarDef,
    /// Cython `ctypedef`.
    CTypedef,
    /// Wraps the tokens skipped while resynchronizing after a parse error.
    ErrorNode,
    /// Fallback constructor for productions without a mapping.
    Generic,
}

/// Constructors for leaves, selected through the grammar's leaf map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LeafKind {
    Name,
    Keyword,
    Number,
    String,
    FStringStart,
    FStringString,
    FStringEnd,
    Newline,
    EndMarker,
    Operator,
    ErrorLeaf,
}

/// Index of a node within its tree's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug)]
enum NodeData {
    Internal {
        kind: NodeKind,
        type_name: String,
        parent: Option<NodeId>,
        children: Vec<NodeId>,
    },
    Leaf {
        kind: LeafKind,
        token: Token,
        parent: Option<NodeId>,
    },
}

/// The concrete syntax tree produced by the grammar-driven parser.
#[derive(Debug)]
pub struct SyntaxTree {
    nodes: Vec<NodeData>,
    root: Option<NodeId>,
}

impl SyntaxTree {
    pub fn new() -> SyntaxTree {
        SyntaxTree { nodes: Vec::new(), root: None }
    }

    pub fn push_leaf(&mut self, kind: LeafKind, token: Token) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(NodeData::Leaf { kind, token, parent: None });
        id
    }

    /// Create an internal node, taking ownership of `children` and fixing up
    /// their parent back-references.
    pub fn push_internal(
        &mut self,
        kind: NodeKind,
        type_name: impl Into<String>,
        children: Vec<NodeId>,
    ) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        for &child in &children {
            match &mut self.nodes[child.index()] {
                NodeData::Internal { parent, .. } => *parent = Some(id),
                NodeData::Leaf { parent, .. } => *parent = Some(id),
            }
        }
        self.nodes.push(NodeData::Internal {
            kind,
            type_name: type_name.into(),
            parent: None,
            children,
        });
        id
    }

    pub fn set_root(&mut self, id: NodeId) {
        self.root = Some(id);
    }

    /// Root node. Present on every tree the parser returns.
    pub fn root(&self) -> NodeId {
        self.root.expect("parse always sets a root")
    }

    pub fn kind(&self, id: NodeId) -> Option<NodeKind> {
        match &self.nodes[id.index()] {
            NodeData::Internal { kind, .. } => Some(*kind),
            NodeData::Leaf { .. } => None,
        }
    }

    pub fn leaf_kind(&self, id: NodeId) -> Option<LeafKind> {
        match &self.nodes[id.index()] {
            NodeData::Leaf { kind, .. } => Some(*kind),
            NodeData::Internal { .. } => None,
        }
    }

    /// Production name for internal nodes, token text for leaves.
    pub fn type_name(&self, id: NodeId) -> &str {
        match &self.nodes[id.index()] {
            NodeData::Internal { type_name, .. } => type_name,
            NodeData::Leaf { token, .. } => &token.text,
        }
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        match &self.nodes[id.index()] {
            NodeData::Internal { children, .. } => children,
            NodeData::Leaf { .. } => &[],
        }
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        match &self.nodes[id.index()] {
            NodeData::Internal { parent, .. } => *parent,
            NodeData::Leaf { parent, .. } => *parent,
        }
    }

    pub fn token(&self, id: NodeId) -> Option<&Token> {
        match &self.nodes[id.index()] {
            NodeData::Leaf { token, .. } => Some(token),
            NodeData::Internal { .. } => None,
        }
    }

    pub fn is_leaf(&self, id: NodeId) -> bool {
        matches!(self.nodes[id.index()], NodeData::Leaf { .. })
    }

    /// Start position of a node: its first leaf's token start.
    pub fn start_position(&self, id: NodeId) -> Position {
        match &self.nodes[id.index()] {
            NodeData::Leaf { token, .. } => token.start,
            NodeData::Internal { children, .. } => children
                .first()
                .map(|&c| self.start_position(c))
                .unwrap_or(Position::new(1, 0)),
        }
    }

    /// End position of a node: its last leaf's token end.
    pub fn end_position(&self, id: NodeId) -> Position {
        match &self.nodes[id.index()] {
            NodeData::Leaf { token, .. } => token.end(),
            NodeData::Internal { children, .. } => children
                .last()
                .map(|&c| self.end_position(c))
                .unwrap_or(Position::new(1, 0)),
        }
    }

    /// Human-readable rendition of a subtree, one node per line.
    pub fn dump(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.dump_into(id, 0, &mut out);
        out
    }

    fn dump_into(&self, id: NodeId, depth: usize, out: &mut String) {
        for _ in 0..depth {
            out.push_str("  ");
        }
        match &self.nodes[id.index()] {
            NodeData::Internal { kind, type_name, children, .. } => {
                out.push_str(&format!("{kind:?}({type_name})\n"));
                for &child in children {
                    self.dump_into(child, depth + 1, out);
                }
            }
            NodeData::Leaf { kind, token, .. } => {
                out.push_str(&format!(
                    "{kind:?} {:?} @{}:{}\n",
                    token.text, token.start.line, token.start.col
                ));
            }
        }
    }
}

impl Default for SyntaxTree {
    fn default() -> Self {
        SyntaxTree::new()
    }
}
