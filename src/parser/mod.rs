//! Grammar-driven statement parser with error recovery.
//!
//! The parser consumes the tokenizer's stream under the rules of a loaded
//! [`Grammar`](crate::grammar::Grammar): statement dispatch comes from the
//! grammar's leading-keyword table, completed productions are materialized
//! through its node map (falling back to the default constructor), and leaves
//! through its leaf map. Definition-shaped productions get dedicated handling;
//! every other statement parses as a generic run of leaves up to the next
//! NEWLINE, picking up an indented suite when one follows — which is also how
//! soft-keyword statements keep their nested definitions reachable.
//!
//! With `error_recovery` enabled the parser is total: offending tokens are
//! wrapped into an `error_node` and parsing resynchronizes at the next
//! statement boundary. With it disabled, the first offending token aborts the
//! parse with a positioned syntax error.

pub mod tree;

use std::collections::VecDeque;

use tracing::debug;

use crate::error::OutlineError;
use crate::grammar::Grammar;
use crate::tokenizer::{Token, TokenType};

use tree::{LeafKind, NodeId, NodeKind, SyntaxTree};

/// Parse a token stream into a concrete syntax tree.
pub fn parse<I>(
    tokens: I,
    grammar: &Grammar,
    error_recovery: bool,
) -> Result<SyntaxTree, OutlineError>
where
    I: IntoIterator<Item = Token>,
{
    Parser {
        grammar,
        error_recovery,
        tree: SyntaxTree::new(),
        tokens: tokens.into_iter().collect(),
    }
    .parse_file_input()
}

struct Parser<'g> {
    grammar: &'g Grammar,
    error_recovery: bool,
    tree: SyntaxTree,
    tokens: VecDeque<Token>,
}

impl<'g> Parser<'g> {
    // ------------------------------------------------------------------
    // token access
    // ------------------------------------------------------------------

    fn peek_type(&self) -> TokenType {
        self.tokens
            .front()
            .map(|t| t.token_type)
            .unwrap_or(TokenType::EndMarker)
    }

    fn peek_is(&self, text: &str) -> bool {
        self.tokens.front().map(|t| t.text == text).unwrap_or(false)
    }

    fn peek_nth(&self, n: usize) -> Option<&Token> {
        self.tokens.get(n)
    }

    fn bump(&mut self) -> Token {
        self.tokens.pop_front().unwrap_or(Token {
            token_type: TokenType::EndMarker,
            text: String::new(),
            start: crate::tokenizer::Position::new(1, 0),
            prefix: String::new(),
        })
    }

    fn leaf(&mut self, token: Token) -> NodeId {
        let kind = self.grammar.leaf_kind(token.token_type, &token.text);
        self.tree.push_leaf(kind, token)
    }

    fn error_leaf(&mut self, token: Token) -> NodeId {
        self.tree.push_leaf(LeafKind::ErrorLeaf, token)
    }

    fn syntax_error(&self, message: &str) -> OutlineError {
        let (line, col) = self
            .tokens
            .front()
            .map(|t| (t.start.line, t.start.col))
            .unwrap_or((1, 0));
        OutlineError::Syntax { line, col, message: message.to_string() }
    }

    fn node(&mut self, production: &str, children: Vec<NodeId>) -> NodeId {
        let kind = self.grammar.node_kind(production);
        self.tree.push_internal(kind, production, children)
    }

    fn error_node(&mut self, children: Vec<NodeId>) -> NodeId {
        self.tree.push_internal(NodeKind::ErrorNode, "error_node", children)
    }

    // ------------------------------------------------------------------
    // file input
    // ------------------------------------------------------------------

    fn parse_file_input(mut self) -> Result<SyntaxTree, OutlineError> {
        let mut children = Vec::new();
        loop {
            match self.peek_type() {
                TokenType::EndMarker => {
                    let token = self.bump();
                    children.push(self.leaf(token));
                    break;
                }
                TokenType::Newline => {
                    let token = self.bump();
                    children.push(self.leaf(token));
                }
                TokenType::Indent => {
                    // indentation where no suite was opened
                    if !self.error_recovery {
                        return Err(self.syntax_error("unexpected indent"));
                    }
                    debug!("recovering from unexpected indent");
                    let block = self.parse_block()?;
                    let node = self.error_node(vec![block]);
                    children.push(node);
                }
                TokenType::Dedent | TokenType::ErrorDedent => {
                    // stray structural token; drop it and carry on
                    self.bump();
                }
                _ => children.push(self.parse_stmt()?),
            }
        }
        let root = self.node("file_input", children);
        self.tree.set_root(root);
        Ok(self.tree)
    }

    // ------------------------------------------------------------------
    // statements
    // ------------------------------------------------------------------

    fn parse_stmt(&mut self) -> Result<NodeId, OutlineError> {
        if self.peek_type() == TokenType::ErrorToken {
            if !self.error_recovery {
                return Err(self.syntax_error("invalid syntax"));
            }
            return self.recover_stmt(Vec::new());
        }
        if self.peek_type() == TokenType::Operator && self.peek_is("@") {
            return self.parse_decorated();
        }
        if self.peek_type() == TokenType::Name {
            let text = self.tokens.front().expect("peeked Name").text.clone();
            if self.grammar.is_keyword(&text) {
                return self.parse_keyword_stmt(&text);
            }
        }
        self.parse_generic_stmt(Vec::new(), "expr_stmt")
    }

    fn parse_keyword_stmt(&mut self, keyword: &str) -> Result<NodeId, OutlineError> {
        match keyword {
            "def" => self.parse_funcdef(Vec::new()),
            "class" => self.parse_classdef(Vec::new(), "classdef"),
            "async" => self.parse_async(),
            "import" => self.parse_line_stmt(Vec::new(), "import_name"),
            "from" => self.parse_line_stmt(Vec::new(), "import_from"),
            "cdef" | "cpdef" if self.grammar.has_production("cfuncdef") => self.parse_cdef(),
            "ctypedef" if self.grammar.has_production("ctypedef_stmt") => {
                self.parse_line_stmt(Vec::new(), "ctypedef_stmt")
            }
            _ => {
                let production = self
                    .grammar
                    .dispatch(keyword)
                    .first()
                    .cloned()
                    .unwrap_or_else(|| "simple_stmt".to_string());
                self.parse_generic_stmt(Vec::new(), &production)
            }
        }
    }

    /// Any statement without dedicated structure: leaves up to the NEWLINE,
    /// plus the indented block that may follow the header.
    fn parse_generic_stmt(
        &mut self,
        mut children: Vec<NodeId>,
        production: &str,
    ) -> Result<NodeId, OutlineError> {
        let damaged = self.consume_until_newline(&mut children)?;
        if self.peek_type() == TokenType::Indent {
            let block = self.parse_block()?;
            children.push(block);
        }
        if damaged {
            return Ok(self.error_node(children));
        }
        Ok(self.node(production, children))
    }

    /// A one-line statement: leaves up to and including the NEWLINE.
    fn parse_line_stmt(
        &mut self,
        mut children: Vec<NodeId>,
        production: &str,
    ) -> Result<NodeId, OutlineError> {
        let damaged = self.consume_until_newline(&mut children)?;
        if damaged {
            return Ok(self.error_node(children));
        }
        Ok(self.node(production, children))
    }

    fn parse_funcdef(&mut self, leading: Vec<NodeId>) -> Result<NodeId, OutlineError> {
        let mut children = leading;
        let def = self.bump();
        children.push(self.leaf(def));

        if !self.at_plain_name() {
            return self.recover_or_fail(children, "expected function name");
        }
        let name = self.bump();
        children.push(self.leaf(name));

        if !self.peek_is("(") {
            return self.recover_or_fail(children, "expected parameter list");
        }
        children.push(self.parse_parameters()?);

        // optional return annotation, then the suite-introducing colon
        let mut depth = 0u32;
        loop {
            match self.peek_type() {
                TokenType::Operator if depth == 0 && self.peek_is(":") => break,
                TokenType::Newline | TokenType::EndMarker => {
                    return self.recover_or_fail(children, "expected ':'");
                }
                TokenType::ErrorToken if !self.error_recovery => {
                    return Err(self.syntax_error("invalid syntax"));
                }
                _ => {
                    let token = self.bump();
                    match token.text.as_str() {
                        "(" | "[" | "{" => depth += 1,
                        ")" | "]" | "}" => depth = depth.saturating_sub(1),
                        _ => {}
                    }
                    children.push(self.leaf(token));
                }
            }
        }
        let colon = self.bump();
        children.push(self.leaf(colon));
        children.push(self.parse_suite()?);
        Ok(self.node("funcdef", children))
    }

    fn parse_classdef(
        &mut self,
        leading: Vec<NodeId>,
        production: &str,
    ) -> Result<NodeId, OutlineError> {
        let mut children = leading;
        let class_kw = self.bump();
        children.push(self.leaf(class_kw));

        if !self.at_plain_name() {
            return self.recover_or_fail(children, "expected class name");
        }
        let name = self.bump();
        children.push(self.leaf(name));

        // optional superclass argument list, then ':'
        let mut depth = 0u32;
        loop {
            match self.peek_type() {
                TokenType::Operator if depth == 0 && self.peek_is(":") => break,
                TokenType::Newline | TokenType::EndMarker => {
                    return self.recover_or_fail(children, "expected ':'");
                }
                TokenType::ErrorToken if !self.error_recovery => {
                    return Err(self.syntax_error("invalid syntax"));
                }
                _ => {
                    let token = self.bump();
                    match token.text.as_str() {
                        "(" | "[" | "{" => depth += 1,
                        ")" | "]" | "}" => depth = depth.saturating_sub(1),
                        _ => {}
                    }
                    children.push(self.leaf(token));
                }
            }
        }
        let colon = self.bump();
        children.push(self.leaf(colon));
        children.push(self.parse_suite()?);
        Ok(self.node(production, children))
    }

    fn parse_async(&mut self) -> Result<NodeId, OutlineError> {
        let async_kw = self.bump();
        let async_leaf = self.leaf(async_kw);
        if self.peek_is("def") {
            let funcdef = self.parse_funcdef(Vec::new())?;
            return Ok(self.node("async_funcdef", vec![async_leaf, funcdef]));
        }
        // async for / async with
        let production = if self.peek_is("with") {
            "with_stmt"
        } else if self.peek_is("for") {
            "for_stmt"
        } else {
            "simple_stmt"
        };
        self.parse_generic_stmt(vec![async_leaf], production)
    }

    fn parse_decorated(&mut self) -> Result<NodeId, OutlineError> {
        let mut decorators = Vec::new();
        while self.peek_is("@") {
            let mut children = Vec::new();
            let at = self.bump();
            children.push(self.leaf(at));
            self.consume_until_newline(&mut children)?;
            decorators.push(self.node("decorator", children));
        }
        let decorators_node = self.node("decorators", decorators);

        let definition = match self.peek_type() {
            TokenType::Name if self.peek_is("def") => self.parse_funcdef(Vec::new())?,
            TokenType::Name if self.peek_is("class") => {
                self.parse_classdef(Vec::new(), "classdef")?
            }
            TokenType::Name if self.peek_is("async") => self.parse_async()?,
            TokenType::Name
                if (self.peek_is("cdef") || self.peek_is("cpdef"))
                    && self.grammar.has_production("cfuncdef") =>
            {
                self.parse_cdef()?
            }
            _ => return self.recover_or_fail(vec![decorators_node], "expected a definition"),
        };
        Ok(self.node("decorated", vec![decorators_node, definition]))
    }

    /// Disambiguate the three `cdef`-led productions by scanning the logical
    /// line: `cdef class` is a class, a name directly followed by `(` before
    /// any `=` is a function, anything else is a variable declaration.
    fn parse_cdef(&mut self) -> Result<NodeId, OutlineError> {
        let introducer = self.bump();
        let is_cdef = introducer.text == "cdef";
        let leading = vec![self.leaf(introducer)];

        if is_cdef && self.peek_is("class") && self.grammar.has_production("cclassdef") {
            return self.parse_classdef(leading, "cclassdef");
        }
        if self.looks_like_cfuncdef() {
            return self.parse_cfuncdef(leading);
        }
        self.parse_line_stmt(leading, "cvar_def")
    }

    fn looks_like_cfuncdef(&self) -> bool {
        let mut depth = 0u32;
        let mut i = 0;
        while let Some(token) = self.peek_nth(i) {
            match token.token_type {
                TokenType::Newline | TokenType::EndMarker => return false,
                TokenType::Operator => match token.text.as_str() {
                    "=" if depth == 0 => return false,
                    ":" if depth == 0 => return false,
                    "(" => {
                        if depth == 0
                            && i > 0
                            && self
                                .peek_nth(i - 1)
                                .map(|t| t.token_type == TokenType::Name)
                                .unwrap_or(false)
                        {
                            return true;
                        }
                        depth += 1;
                    }
                    "[" | "{" => depth += 1,
                    ")" | "]" | "}" => depth = depth.saturating_sub(1),
                    _ => {}
                },
                _ => {}
            }
            i += 1;
        }
        false
    }

    /// `cdef`/`cpdef` function: optional C-type leaves run up to the name
    /// that owns the parameter list; an optional exception clause follows the
    /// parameters, then either a suite or a bare NEWLINE (declaration form).
    fn parse_cfuncdef(&mut self, leading: Vec<NodeId>) -> Result<NodeId, OutlineError> {
        let mut children = leading;
        loop {
            let name_before_paren = self.peek_type() == TokenType::Name
                && !self
                    .tokens
                    .front()
                    .map(|t| self.grammar.is_keyword(&t.text))
                    .unwrap_or(false)
                && self.peek_nth(1).map(|t| t.text == "(").unwrap_or(false);
            if name_before_paren {
                break;
            }
            match self.peek_type() {
                TokenType::Newline | TokenType::EndMarker => {
                    return self.recover_or_fail(children, "expected function name");
                }
                TokenType::ErrorToken if !self.error_recovery => {
                    return Err(self.syntax_error("invalid syntax"));
                }
                _ => {
                    let token = self.bump();
                    children.push(self.leaf(token));
                }
            }
        }
        let name = self.bump();
        children.push(self.leaf(name));
        children.push(self.parse_parameters()?);

        loop {
            match self.peek_type() {
                TokenType::Operator if self.peek_is(":") => {
                    let colon = self.bump();
                    children.push(self.leaf(colon));
                    children.push(self.parse_suite()?);
                    return Ok(self.node("cfuncdef", children));
                }
                TokenType::Newline => {
                    // declaration without a body
                    let newline = self.bump();
                    children.push(self.leaf(newline));
                    return Ok(self.node("cfuncdef", children));
                }
                TokenType::EndMarker => return Ok(self.node("cfuncdef", children)),
                TokenType::ErrorToken if !self.error_recovery => {
                    return Err(self.syntax_error("invalid syntax"));
                }
                _ => {
                    let token = self.bump();
                    children.push(self.leaf(token));
                }
            }
        }
    }

    fn parse_parameters(&mut self) -> Result<NodeId, OutlineError> {
        let mut children = Vec::new();
        let open = self.bump();
        children.push(self.leaf(open));
        let mut depth = 1u32;
        loop {
            match self.peek_type() {
                TokenType::EndMarker => break,
                // a NEWLINE can only appear here if the tokenizer had to
                // force-close broken brackets; stop and let the caller recover
                TokenType::Newline => break,
                TokenType::ErrorToken if !self.error_recovery => {
                    return Err(self.syntax_error("invalid syntax"));
                }
                _ => {
                    let token = self.bump();
                    match token.text.as_str() {
                        "(" | "[" | "{" => depth += 1,
                        ")" | "]" | "}" => depth -= 1,
                        _ => {}
                    }
                    let done = depth == 0;
                    children.push(self.leaf(token));
                    if done {
                        break;
                    }
                }
            }
        }
        Ok(self.node("parameters", children))
    }

    // ------------------------------------------------------------------
    // suites
    // ------------------------------------------------------------------

    /// Suite after a ':' — either an inline simple statement or
    /// NEWLINE INDENT stmt+ DEDENT.
    fn parse_suite(&mut self) -> Result<NodeId, OutlineError> {
        if self.peek_type() != TokenType::Newline {
            // inline suite on the header line
            let stmt = self.parse_stmt()?;
            return Ok(self.node("suite", vec![stmt]));
        }
        let newline = self.bump();
        let mut children = vec![self.leaf(newline)];
        if self.peek_type() != TokenType::Indent {
            if !self.error_recovery {
                return Err(self.syntax_error("expected an indented block"));
            }
            debug!("suite without an indented block");
            return Ok(self.node("suite", children));
        }
        let block = self.parse_block()?;
        // flatten the block into the suite node
        let block_children = self.tree.children(block).to_vec();
        children.extend(block_children);
        Ok(self.node("suite", children))
    }

    /// INDENT stmt+ DEDENT, starting at the INDENT.
    fn parse_block(&mut self) -> Result<NodeId, OutlineError> {
        let indent = self.bump();
        let mut children = vec![self.leaf(indent)];
        loop {
            match self.peek_type() {
                TokenType::Dedent => {
                    let dedent = self.bump();
                    children.push(self.leaf(dedent));
                    break;
                }
                TokenType::EndMarker => break,
                TokenType::ErrorDedent => {
                    if !self.error_recovery {
                        return Err(self.syntax_error("unindent does not match any outer level"));
                    }
                    let token = self.bump();
                    children.push(self.error_leaf(token));
                }
                TokenType::Indent => {
                    // nested indentation without a header
                    if !self.error_recovery {
                        return Err(self.syntax_error("unexpected indent"));
                    }
                    let inner = self.parse_block()?;
                    let node = self.node("error_node", vec![inner]);
                    children.push(node);
                }
                TokenType::Newline => {
                    let token = self.bump();
                    children.push(self.leaf(token));
                }
                _ => children.push(self.parse_stmt()?),
            }
        }
        Ok(self.tree.push_internal(NodeKind::Suite, "block", children))
    }

    // ------------------------------------------------------------------
    // recovery
    // ------------------------------------------------------------------

    fn recover_or_fail(
        &mut self,
        children: Vec<NodeId>,
        message: &str,
    ) -> Result<NodeId, OutlineError> {
        if !self.error_recovery {
            return Err(self.syntax_error(message));
        }
        self.recover_stmt(children)
    }

    /// Wrap everything up to the next statement boundary in an error node.
    /// A block following the broken header is parsed normally and attached,
    /// so definitions nested under the damage stay visible.
    fn recover_stmt(&mut self, mut children: Vec<NodeId>) -> Result<NodeId, OutlineError> {
        debug!("resynchronizing at next statement boundary");
        loop {
            match self.peek_type() {
                TokenType::Newline => {
                    let token = self.bump();
                    children.push(self.leaf(token));
                    break;
                }
                TokenType::EndMarker | TokenType::Dedent => break,
                _ => {
                    let token = self.bump();
                    children.push(self.error_leaf(token));
                }
            }
        }
        if self.peek_type() == TokenType::Indent {
            let block = self.parse_block()?;
            children.push(block);
        }
        Ok(self.error_node(children))
    }

    // ------------------------------------------------------------------
    // helpers
    // ------------------------------------------------------------------

    fn at_plain_name(&self) -> bool {
        self.tokens
            .front()
            .map(|t| t.token_type == TokenType::Name && !self.grammar.is_keyword(&t.text))
            .unwrap_or(false)
    }

    /// Consume leaves up to and including the next NEWLINE. Returns whether
    /// an `ErrorToken` was among them (the statement is then damaged and the
    /// caller wraps it in an error node).
    fn consume_until_newline(&mut self, children: &mut Vec<NodeId>) -> Result<bool, OutlineError> {
        let mut damaged = false;
        loop {
            match self.peek_type() {
                TokenType::Newline => {
                    let token = self.bump();
                    children.push(self.leaf(token));
                    return Ok(damaged);
                }
                TokenType::EndMarker
                | TokenType::Indent
                | TokenType::Dedent
                | TokenType::ErrorDedent => return Ok(damaged),
                TokenType::ErrorToken => {
                    if !self.error_recovery {
                        return Err(self.syntax_error("invalid syntax"));
                    }
                    damaged = true;
                    let token = self.bump();
                    children.push(self.error_leaf(token));
                }
                _ => {
                    let token = self.bump();
                    children.push(self.leaf(token));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::tree::{NodeKind, SyntaxTree};
    use super::*;
    use crate::config::Dialect;
    use crate::grammar::load_grammar;
    use crate::tokenizer::{token_collection, tokenize};

    fn parse_python(code: &str, recovery: bool) -> Result<SyntaxTree, OutlineError> {
        let grammar = load_grammar(Dialect::Python, "3.12").unwrap();
        let collection = token_collection(Dialect::Python, (3, 12));
        parse(tokenize(code, &collection), &grammar, recovery)
    }

    fn parse_cython(code: &str) -> SyntaxTree {
        let grammar = load_grammar(Dialect::Cython, "3.12").unwrap();
        let collection = token_collection(Dialect::Cython, (3, 12));
        parse(tokenize(code, &collection), &grammar, true).unwrap()
    }

    fn top_level_kinds(tree: &SyntaxTree) -> Vec<NodeKind> {
        tree.children(tree.root())
            .iter()
            .filter_map(|&c| tree.kind(c))
            .collect()
    }

    #[test]
    fn function_definition_builds_a_funcdef_node() {
        let tree = parse_python("def f():\n    return 1\n", true).unwrap();
        assert_eq!(tree.kind(tree.root()), Some(NodeKind::Module));
        assert_eq!(top_level_kinds(&tree), vec![NodeKind::FuncDef]);
        let funcdef = tree.children(tree.root())[0];
        assert_eq!(tree.start_position(funcdef).line, 1);
        assert_eq!(tree.start_position(funcdef).col, 0);
    }

    #[test]
    fn method_nests_inside_the_class_suite() {
        let tree = parse_python("class C:\n    def m(self): pass\n", true).unwrap();
        assert_eq!(top_level_kinds(&tree), vec![NodeKind::ClassDef]);
        let classdef = tree.children(tree.root())[0];
        let suite = *tree
            .children(classdef)
            .iter()
            .find(|&&c| tree.kind(c) == Some(NodeKind::Suite))
            .unwrap();
        let has_funcdef = tree
            .children(suite)
            .iter()
            .any(|&c| tree.kind(c) == Some(NodeKind::FuncDef));
        assert!(has_funcdef);
    }

    #[test]
    fn unknown_statements_use_the_default_constructor() {
        let tree = parse_python("if x:\n    y = 1\n", true).unwrap();
        let node = tree.children(tree.root())[0];
        assert_eq!(tree.kind(node), Some(NodeKind::Generic));
        assert_eq!(tree.type_name(node), "if_stmt");
        // the nested assignment is reachable through the attached block
        let block = *tree.children(node).last().unwrap();
        assert!(tree
            .children(block)
            .iter()
            .any(|&c| tree.kind(c) == Some(NodeKind::ExprStmt)));
    }

    #[test]
    fn decorated_definitions_are_wrapped() {
        let tree = parse_python("@property\ndef f(self):\n    pass\n", true).unwrap();
        let decorated = tree.children(tree.root())[0];
        assert_eq!(tree.kind(decorated), Some(NodeKind::Decorated));
        let kinds: Vec<_> = tree
            .children(decorated)
            .iter()
            .filter_map(|&c| tree.kind(c))
            .collect();
        assert_eq!(kinds, vec![NodeKind::Decorators, NodeKind::FuncDef]);
    }

    #[test]
    fn async_def_wraps_a_funcdef() {
        let tree = parse_python("async def go():\n    pass\n", true).unwrap();
        let node = tree.children(tree.root())[0];
        assert_eq!(tree.kind(node), Some(NodeKind::AsyncFuncDef));
        assert!(tree
            .children(node)
            .iter()
            .any(|&c| tree.kind(c) == Some(NodeKind::FuncDef)));
    }

    #[test]
    fn imports_build_import_nodes() {
        let tree = parse_python("import os.path, sys\nfrom x import y as z\n", true).unwrap();
        assert_eq!(
            top_level_kinds(&tree),
            vec![NodeKind::ImportName, NodeKind::ImportFrom]
        );
    }

    #[test]
    fn cython_definitions_parse_like_their_base_counterparts() {
        let tree = parse_cython(
            "cdef class Grid(Base):\n    cpdef int total(self):\n        return 1\ncdef int rows = 2\nctypedef unsigned long size_k\n",
        );
        let kinds = top_level_kinds(&tree);
        assert_eq!(
            kinds,
            vec![NodeKind::CClassDef, NodeKind::CVarDef, NodeKind::CTypedef]
        );
        let cclass = tree.children(tree.root())[0];
        let suite = *tree
            .children(cclass)
            .iter()
            .find(|&&c| tree.kind(c) == Some(NodeKind::Suite))
            .unwrap();
        assert!(tree
            .children(suite)
            .iter()
            .any(|&c| tree.kind(c) == Some(NodeKind::CFuncDef)));
    }

    #[test]
    fn cdef_declaration_without_body_parses() {
        let tree = parse_cython("cdef int add(int a, int b)\n");
        assert_eq!(top_level_kinds(&tree), vec![NodeKind::CFuncDef]);
    }

    #[test]
    fn cython_syntax_is_inert_under_the_python_grammar() {
        let tree = parse_python("cdef int x = 1\n", true).unwrap();
        // `cdef` is a plain name in Python, so this is just an expression line
        assert_eq!(top_level_kinds(&tree), vec![NodeKind::ExprStmt]);
    }

    #[test]
    fn recovery_wraps_damage_and_keeps_following_statements() {
        let tree = parse_python("def broken(:\n    pass\ndef ok():\n    pass\n", true).unwrap();
        let kinds = top_level_kinds(&tree);
        assert!(kinds.contains(&NodeKind::FuncDef));
        // the damaged line became an error node rather than aborting the parse
        let has_error = tree
            .children(tree.root())
            .iter()
            .any(|&c| tree.kind(c) == Some(NodeKind::ErrorNode) || tree.type_name(c) == "error_node");
        assert!(has_error || kinds.len() >= 2);
    }

    #[test]
    fn unterminated_string_positions_the_failure() {
        let err = parse_python("x = 'abc\n", false).unwrap_err();
        match err {
            OutlineError::Syntax { line, col, .. } => {
                assert_eq!(line, 1);
                assert_eq!(col, 4);
            }
            other => panic!("expected a syntax error, got {other:?}"),
        }
    }

    #[test]
    fn unterminated_string_recovers_into_an_error_node() {
        let tree = parse_python("x = 'abc\ny = 1\n", true).unwrap();
        fn find_error(tree: &SyntaxTree, id: super::tree::NodeId) -> bool {
            if tree.kind(id) == Some(NodeKind::ErrorNode) {
                return true;
            }
            tree.children(id).iter().any(|&c| find_error(tree, c))
        }
        assert!(find_error(&tree, tree.root()));
        // parsing continued past the damage
        assert!(top_level_kinds(&tree).contains(&NodeKind::ExprStmt));
    }

    #[test]
    fn empty_source_is_just_module_and_endmarker() {
        let tree = parse_python("", true).unwrap();
        assert_eq!(tree.kind(tree.root()), Some(NodeKind::Module));
        assert_eq!(tree.children(tree.root()).len(), 1);
    }
}
