//! The native AST exchanged across the process boundary.
//!
//! This is the worker's view of a module: a small, typed node set covering
//! exactly what symbol classification consumes, produced by a simpler parser
//! with no error recovery. The tree serializes to the artifact file via serde
//! and is structurally different from the grammar backend's concrete syntax
//! tree on purpose — the syntax-node adapters are what unify them.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::config::Dialect;
use crate::error::OutlineError;
use crate::tokenizer::{token_collection, tokenize, Token, TokenType};

/// One node of the native AST. Line numbers are 1-based, columns 0-based,
/// matching the conventions of the tree it models.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node")]
pub enum AstNode {
    Module {
        body: Vec<AstNode>,
    },
    FunctionDef {
        name: String,
        lineno: u32,
        col_offset: u32,
        decorator_list: Vec<String>,
        body: Vec<AstNode>,
    },
    AsyncFunctionDef {
        name: String,
        lineno: u32,
        col_offset: u32,
        decorator_list: Vec<String>,
        body: Vec<AstNode>,
    },
    ClassDef {
        name: String,
        lineno: u32,
        col_offset: u32,
        decorator_list: Vec<String>,
        body: Vec<AstNode>,
    },
    Assign {
        targets: Vec<String>,
        lineno: u32,
        col_offset: u32,
    },
    Import {
        names: Vec<String>,
        lineno: u32,
        col_offset: u32,
    },
    ImportFrom {
        module: Option<String>,
        names: Vec<String>,
        lineno: u32,
        col_offset: u32,
    },
    /// A compound statement of no particular interest whose body must stay
    /// traversable (if/while/for/try/with/match blocks).
    Block {
        lineno: u32,
        col_offset: u32,
        body: Vec<AstNode>,
    },
}

impl AstNode {
    pub fn body(&self) -> &[AstNode] {
        match self {
            AstNode::Module { body }
            | AstNode::FunctionDef { body, .. }
            | AstNode::AsyncFunctionDef { body, .. }
            | AstNode::ClassDef { body, .. }
            | AstNode::Block { body, .. } => body,
            _ => &[],
        }
    }
}

/// Parse a module with the simpler, no-recovery grammar. Any malformed input
/// fails with a positioned syntax error; there are no error nodes here.
pub fn parse_module(code: &str) -> Result<AstNode, OutlineError> {
    let collection = token_collection(Dialect::Python, (3, 12));
    let tokens = tokenize(code, &collection).collect();
    let mut parser = AstParser { tokens };
    let body = parser.parse_body(true)?;
    Ok(AstNode::Module { body })
}

struct AstParser {
    tokens: VecDeque<Token>,
}

impl AstParser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.front()
    }

    fn peek_type(&self) -> TokenType {
        self.peek().map(|t| t.token_type).unwrap_or(TokenType::EndMarker)
    }

    fn peek_is(&self, text: &str) -> bool {
        self.peek().map(|t| t.text == text).unwrap_or(false)
    }

    fn bump(&mut self) -> Token {
        self.tokens.pop_front().unwrap_or(Token {
            token_type: TokenType::EndMarker,
            text: String::new(),
            start: crate::tokenizer::Position::new(1, 0),
            prefix: String::new(),
        })
    }

    fn fail(&self, message: &str) -> OutlineError {
        let (line, col) = self
            .peek()
            .map(|t| (t.start.line, t.start.col))
            .unwrap_or((1, 0));
        OutlineError::Syntax { line, col, message: message.to_string() }
    }

    /// Statements until the closing DEDENT (consumed) or the end marker.
    fn parse_body(&mut self, top_level: bool) -> Result<Vec<AstNode>, OutlineError> {
        let mut body = Vec::new();
        loop {
            match self.peek_type() {
                TokenType::EndMarker => break,
                TokenType::Dedent => {
                    self.bump();
                    if !top_level {
                        break;
                    }
                }
                TokenType::Newline => {
                    self.bump();
                }
                TokenType::Indent => return Err(self.fail("unexpected indent")),
                TokenType::ErrorDedent => {
                    return Err(self.fail("unindent does not match any outer level"));
                }
                TokenType::ErrorToken => return Err(self.fail("invalid syntax")),
                _ => {
                    if let Some(node) = self.parse_stmt()? {
                        body.push(node);
                    }
                }
            }
        }
        Ok(body)
    }

    fn parse_stmt(&mut self) -> Result<Option<AstNode>, OutlineError> {
        if self.peek_is("@") {
            return self.parse_decorated();
        }
        if self.peek_is("def") {
            return Ok(Some(self.parse_funcdef(Vec::new(), None, false)?));
        }
        if self.peek_is("class") {
            return Ok(Some(self.parse_classdef(Vec::new())?));
        }
        if self.peek_is("async") {
            let async_tok = self.bump();
            if self.peek_is("def") {
                return Ok(Some(self.parse_funcdef(
                    Vec::new(),
                    Some((async_tok.start.line, async_tok.start.col)),
                    true,
                )?));
            }
            return self.parse_generic(async_tok);
        }
        let first = self.bump();
        self.parse_generic(first)
    }

    /// Decorator lines, then the definition they decorate.
    fn parse_decorated(&mut self) -> Result<Option<AstNode>, OutlineError> {
        let mut decorators = Vec::new();
        while self.peek_is("@") {
            self.bump();
            if let Some(name) = self.parse_decorator_name()? {
                decorators.push(name);
            }
        }
        if self.peek_is("def") {
            return Ok(Some(self.parse_funcdef(decorators, None, false)?));
        }
        if self.peek_is("async") {
            let async_tok = self.bump();
            if !self.peek_is("def") {
                return Err(self.fail("expected 'def' after decorators"));
            }
            return Ok(Some(self.parse_funcdef(
                decorators,
                Some((async_tok.start.line, async_tok.start.col)),
                true,
            )?));
        }
        if self.peek_is("class") {
            return Ok(Some(self.parse_classdef(decorators)?));
        }
        Err(self.fail("expected a definition after decorators"))
    }

    /// A decorator's recognizable name: a plain name, or the callee of a
    /// simple call. Dotted decorators carry no name here.
    fn parse_decorator_name(&mut self) -> Result<Option<String>, OutlineError> {
        let mut name = None;
        if self.peek_type() == TokenType::Name {
            let token = self.bump();
            if self.peek_is(".") {
                name = None;
            } else {
                name = Some(token.text);
            }
        }
        self.skip_line()?;
        Ok(name)
    }

    fn parse_funcdef(
        &mut self,
        decorator_list: Vec<String>,
        intro: Option<(u32, u32)>,
        is_async: bool,
    ) -> Result<AstNode, OutlineError> {
        let def = self.bump();
        let (lineno, col_offset) = intro.unwrap_or((def.start.line, def.start.col));

        if self.peek_type() != TokenType::Name {
            return Err(self.fail("expected function name"));
        }
        let name = self.bump().text;

        if !self.peek_is("(") {
            return Err(self.fail("expected parameter list"));
        }
        self.skip_balanced()?;
        self.expect_colon()?;
        let body = self.parse_suite_body()?;

        if is_async {
            Ok(AstNode::AsyncFunctionDef { name, lineno, col_offset, decorator_list, body })
        } else {
            Ok(AstNode::FunctionDef { name, lineno, col_offset, decorator_list, body })
        }
    }

    fn parse_classdef(&mut self, decorator_list: Vec<String>) -> Result<AstNode, OutlineError> {
        let class_kw = self.bump();
        let (lineno, col_offset) = (class_kw.start.line, class_kw.start.col);

        if self.peek_type() != TokenType::Name {
            return Err(self.fail("expected class name"));
        }
        let name = self.bump().text;

        if self.peek_is("(") {
            self.skip_balanced()?;
        }
        self.expect_colon()?;
        let body = self.parse_suite_body()?;
        Ok(AstNode::ClassDef { name, lineno, col_offset, decorator_list, body })
    }

    /// Everything else: capture the logical line, attach a following block,
    /// and distill imports and plain assignments out of the leftovers.
    fn parse_generic(&mut self, first: Token) -> Result<Option<AstNode>, OutlineError> {
        let lineno = first.start.line;
        let col_offset = first.start.col;
        let mut line = vec![first];
        loop {
            match self.peek_type() {
                TokenType::Newline => {
                    self.bump();
                    break;
                }
                TokenType::EndMarker | TokenType::Dedent => break,
                TokenType::ErrorToken => return Err(self.fail("invalid syntax")),
                TokenType::ErrorDedent => {
                    return Err(self.fail("unindent does not match any outer level"));
                }
                _ => line.push(self.bump()),
            }
        }
        if self.peek_type() == TokenType::Indent {
            self.bump();
            let body = self.parse_body(false)?;
            return Ok(Some(AstNode::Block { lineno, col_offset, body }));
        }

        match line[0].text.as_str() {
            "import" => Ok(Some(AstNode::Import {
                names: import_names(&line[1..]),
                lineno,
                col_offset,
            })),
            "from" => Ok(Some(parse_import_from(&line, lineno, col_offset))),
            _ => Ok(assign_from_line(&line, lineno, col_offset)),
        }
    }

    fn expect_colon(&mut self) -> Result<(), OutlineError> {
        // optional annotation tokens run up to the suite-introducing colon
        let mut depth = 0u32;
        loop {
            match self.peek_type() {
                TokenType::Operator if depth == 0 && self.peek_is(":") => {
                    self.bump();
                    return Ok(());
                }
                TokenType::Newline | TokenType::EndMarker => {
                    return Err(self.fail("expected ':'"));
                }
                TokenType::ErrorToken => return Err(self.fail("invalid syntax")),
                _ => {
                    let token = self.bump();
                    match token.text.as_str() {
                        "(" | "[" | "{" => depth += 1,
                        ")" | "]" | "}" => depth = depth.saturating_sub(1),
                        _ => {}
                    }
                }
            }
        }
    }

    fn parse_suite_body(&mut self) -> Result<Vec<AstNode>, OutlineError> {
        if self.peek_type() != TokenType::Newline {
            // inline suite; nothing in it can hold a nested definition
            self.skip_line()?;
            return Ok(Vec::new());
        }
        self.bump();
        if self.peek_type() != TokenType::Indent {
            return Err(self.fail("expected an indented block"));
        }
        self.bump();
        self.parse_body(false)
    }

    fn skip_balanced(&mut self) -> Result<(), OutlineError> {
        self.bump(); // opening bracket
        let mut depth = 1u32;
        while depth > 0 {
            match self.peek_type() {
                TokenType::EndMarker | TokenType::Newline => {
                    return Err(self.fail("unbalanced brackets"));
                }
                TokenType::ErrorToken => return Err(self.fail("invalid syntax")),
                _ => {
                    let token = self.bump();
                    match token.text.as_str() {
                        "(" | "[" | "{" => depth += 1,
                        ")" | "]" | "}" => depth -= 1,
                        _ => {}
                    }
                }
            }
        }
        Ok(())
    }

    fn skip_line(&mut self) -> Result<(), OutlineError> {
        loop {
            match self.peek_type() {
                TokenType::Newline => {
                    self.bump();
                    return Ok(());
                }
                TokenType::EndMarker | TokenType::Dedent => return Ok(()),
                TokenType::ErrorToken => return Err(self.fail("invalid syntax")),
                _ => {
                    self.bump();
                }
            }
        }
    }
}

/// Dotted names after `import`, commas separating, aliases ignored.
fn import_names(tokens: &[Token]) -> Vec<String> {
    let mut names = Vec::new();
    let mut current = String::new();
    let mut aliased = false;
    for token in tokens {
        match token.text.as_str() {
            "," => {
                if !current.is_empty() {
                    names.push(std::mem::take(&mut current));
                }
                aliased = false;
            }
            "as" if token.token_type == TokenType::Name => aliased = true,
            "(" | ")" => {}
            _ if aliased => {}
            _ => current.push_str(&token.text),
        }
    }
    if !current.is_empty() {
        names.push(current);
    }
    names
}

fn parse_import_from(line: &[Token], lineno: u32, col_offset: u32) -> AstNode {
    let import_idx = line.iter().position(|t| t.text == "import");
    let (module_tokens, name_tokens) = match import_idx {
        Some(idx) => (&line[1..idx], &line[idx + 1..]),
        None => (&line[1..], &[][..]),
    };
    let module: String = module_tokens.iter().map(|t| t.text.as_str()).collect();
    AstNode::ImportFrom {
        module: if module.is_empty() { None } else { Some(module) },
        names: import_names(name_tokens),
        lineno,
        col_offset,
    }
}

/// A plain (unannotated) assignment whose first target is a simple name or a
/// tuple of simple names. Anything else is not a symbol-bearing statement.
fn assign_from_line(line: &[Token], lineno: u32, col_offset: u32) -> Option<AstNode> {
    let mut depth = 0u32;
    let mut eq_idx = None;
    for (i, token) in line.iter().enumerate() {
        match token.text.as_str() {
            "(" | "[" | "{" => depth += 1,
            ")" | "]" | "}" => depth = depth.saturating_sub(1),
            ":" if depth == 0 => return None, // annotated assignment or a header
            "=" if depth == 0 => {
                eq_idx = Some(i);
                break;
            }
            _ => {}
        }
    }
    let eq_idx = eq_idx?;
    let target_tokens = &line[..eq_idx];
    if target_tokens.is_empty() {
        return None;
    }
    let plain = target_tokens.iter().all(|t| {
        t.token_type == TokenType::Name && t.text != "as" || t.text == ","
    });
    if !plain || target_tokens[0].token_type != TokenType::Name {
        return None;
    }
    let targets: Vec<String> = target_tokens
        .iter()
        .filter(|t| t.token_type == TokenType::Name)
        .map(|t| t.text.clone())
        .collect();
    Some(AstNode::Assign { targets, lineno, col_offset })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn module(code: &str) -> AstNode {
        parse_module(code).unwrap()
    }

    #[test]
    fn function_and_class_definitions() {
        let m = module("def f():\n    return 1\n\nclass C:\n    def m(self):\n        pass\n");
        let body = m.body();
        assert_eq!(body.len(), 2);
        assert!(matches!(&body[0], AstNode::FunctionDef { name, lineno: 1, col_offset: 0, .. } if name == "f"));
        match &body[1] {
            AstNode::ClassDef { name, lineno, body, .. } => {
                assert_eq!(name, "C");
                assert_eq!(*lineno, 4);
                assert!(matches!(&body[0], AstNode::FunctionDef { name, lineno: 5, .. } if name == "m"));
            }
            other => panic!("expected a class, got {other:?}"),
        }
    }

    #[test]
    fn async_and_decorated_definitions() {
        let m = module("@property\ndef width(self):\n    pass\n\nasync def fetch():\n    pass\n");
        let body = m.body();
        assert!(matches!(
            &body[0],
            AstNode::FunctionDef { name, decorator_list, .. }
                if name == "width" && decorator_list == &vec!["property".to_string()]
        ));
        assert!(matches!(&body[1], AstNode::AsyncFunctionDef { name, .. } if name == "fetch"));
    }

    #[test]
    fn dotted_decorators_carry_no_name() {
        let m = module("@app.route\ndef index():\n    pass\n");
        assert!(matches!(
            &m.body()[0],
            AstNode::FunctionDef { decorator_list, .. } if decorator_list.is_empty()
        ));
    }

    #[test]
    fn imports_keep_dotted_names_and_drop_aliases() {
        let m = module("import os.path, numpy as np\nfrom collections import OrderedDict, deque\n");
        assert!(matches!(
            &m.body()[0],
            AstNode::Import { names, .. }
                if names == &vec!["os.path".to_string(), "numpy".to_string()]
        ));
        assert!(matches!(
            &m.body()[1],
            AstNode::ImportFrom { module: Some(module), names, .. }
                if module == "collections"
                    && names == &vec!["OrderedDict".to_string(), "deque".to_string()]
        ));
    }

    #[test]
    fn assignments_distill_to_their_targets() {
        let m = module("x = 1\na, b = 1, 2\nself.x = 5\ny: int = 2\nz += 1\n");
        let body = m.body();
        assert_eq!(body.len(), 2);
        assert!(matches!(&body[0], AstNode::Assign { targets, .. } if targets[0] == "x"));
        assert!(matches!(&body[1], AstNode::Assign { targets, .. } if targets[0] == "a"));
    }

    #[test]
    fn blocks_keep_nested_definitions_reachable() {
        let m = module("if flag:\n    def inner():\n        pass\n");
        match &m.body()[0] {
            AstNode::Block { body, .. } => {
                assert!(matches!(&body[0], AstNode::FunctionDef { name, .. } if name == "inner"));
            }
            other => panic!("expected a block, got {other:?}"),
        }
    }

    #[test]
    fn no_recovery_means_positioned_failures() {
        let err = parse_module("x = 'abc\n").unwrap_err();
        assert!(matches!(err, OutlineError::Syntax { line: 1, col: 4, .. }));
        assert!(parse_module("def broken(:\n    pass\n").is_err());
    }

    #[test]
    fn round_trips_through_serde() {
        let m = module("class C:\n    def m(self):\n        pass\n");
        let bytes = serde_json::to_vec(&m).unwrap();
        let back: AstNode = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(m, back);
    }
}
