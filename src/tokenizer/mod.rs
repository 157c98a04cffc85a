//! Lazy tokenizer for Python-family source.
//!
//! Produces an ordered sequence of typed tokens from raw text, one physical
//! line at a time. The tokenizer never fails: malformed input degrades to
//! `ErrorToken`s and always advances by at least one character, so the parser
//! above it can keep extracting symbols around damaged regions.

pub mod patterns;

use std::collections::VecDeque;
use std::mem;

use tracing::debug;

pub use patterns::{token_collection, TokenCollection};

/// Token classes produced by the tokenizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenType {
    Name,
    Number,
    String,
    Operator,
    Newline,
    Indent,
    Dedent,
    /// A dedent that matches no level of the indentation stack. Non-fatal.
    ErrorDedent,
    FStringStart,
    FStringString,
    FStringEnd,
    /// A character sequence no token class matched. Non-fatal.
    ErrorToken,
    EndMarker,
}

/// A point in the source. Lines are 1-based, columns 0-based, both counted
/// in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Position {
    pub line: u32,
    pub col: u32,
}

impl Position {
    pub fn new(line: u32, col: u32) -> Position {
        Position { line, col }
    }
}

/// One token. Immutable once produced; tokens form a total order over source
/// offsets. `prefix` carries the whitespace, comments and line continuations
/// that preceded the token.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub token_type: TokenType,
    pub text: String,
    pub start: Position,
    pub prefix: String,
}

impl Token {
    /// End position, derived from the text (which may span lines).
    pub fn end(&self) -> Position {
        let newlines = self.text.matches('\n').count() as u32;
        if newlines == 0 {
            Position::new(self.start.line, self.start.col + self.text.chars().count() as u32)
        } else {
            let tail = self.text.rsplit('\n').next().unwrap_or("");
            Position::new(self.start.line + newlines, tail.chars().count() as u32)
        }
    }
}

/// Tokenize `code` with an already-built pattern collection.
pub fn tokenize<'a>(code: &'a str, collection: &'a TokenCollection) -> Tokenizer<'a> {
    Tokenizer {
        collection,
        lines: code.split_inclusive('\n').collect(),
        line_idx: 0,
        pos: 0,
        indents: vec![0],
        bracket_level: 0,
        pending: VecDeque::new(),
        prefix: String::new(),
        new_line: true,
        suppress_indent: false,
        finished: false,
    }
}

/// Iterator over the tokens of one source text. Restartable per call to
/// [`tokenize`]; no state survives between calls other than the cached
/// pattern collection.
pub struct Tokenizer<'a> {
    collection: &'a TokenCollection,
    lines: Vec<&'a str>,
    line_idx: usize,
    pos: usize,
    indents: Vec<u32>,
    bracket_level: u32,
    pending: VecDeque<Token>,
    prefix: String,
    /// True until the first token of the current logical line is emitted.
    new_line: bool,
    /// Set after a forced logical-line break; the next line keeps the
    /// current indentation stack untouched.
    suppress_indent: bool,
    finished: bool,
}

impl<'a> Iterator for Tokenizer<'a> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        loop {
            if let Some(token) = self.pending.pop_front() {
                return Some(token);
            }
            if self.finished {
                return None;
            }
            self.step();
        }
    }
}

fn char_col(line: &str, byte_pos: usize) -> u32 {
    line[..byte_pos].chars().count() as u32
}

impl<'a> Tokenizer<'a> {
    fn step(&mut self) {
        if self.line_idx >= self.lines.len() {
            self.finish();
            return;
        }
        let line = self.lines[self.line_idx];
        let lnum = (self.line_idx + 1) as u32;

        if let Some(ws) = self.collection.whitespace.find(&line[self.pos..]) {
            if !ws.as_str().is_empty() {
                self.prefix.push_str(ws.as_str());
                self.pos += ws.end();
            }
        }
        let rest = &line[self.pos..];

        if rest.is_empty() {
            // only a final line can lack its terminator
            self.advance_line();
            return;
        }
        if rest.starts_with('\r') || rest.starts_with('\n') {
            self.end_of_line(line, lnum);
            return;
        }

        let col = char_col(line, self.pos);
        let caps = match self.collection.pseudo_token.captures(rest) {
            Some(caps) => caps,
            None => {
                // forward progress on input nothing recognizes
                let ch = rest.chars().next().expect("rest is non-empty");
                self.handle_indentation(lnum, col);
                self.pos += ch.len_utf8();
                self.push_token(TokenType::ErrorToken, ch.to_string(), lnum, col);
                return;
            }
        };

        if let Some(comment) = caps.name("comment") {
            self.prefix.push_str(comment.as_str());
            self.pos += comment.end();
            return;
        }
        if let Some(cont) = caps.name("cont") {
            // explicit line continuation joins the next token's prefix
            self.prefix.push_str(cont.as_str());
            self.advance_line();
            return;
        }

        if let Some(name) = caps.name("name") {
            let text = name.as_str();
            if self.bracket_level > 0
                && self.collection.always_break_tokens.contains(text)
                && line[..self.pos].chars().all(|c| matches!(c, ' ' | '\t' | '\x0c'))
            {
                // a statement keyword inside an unclosed bracket: the
                // bracket structure is broken, force a statement boundary
                debug!(line = lnum, token = text, "closing open brackets at keyword");
                self.bracket_level = 0;
                self.push_marker(TokenType::Newline, lnum, col);
                self.new_line = true;
                self.suppress_indent = true;
            }
            self.handle_indentation(lnum, col);
            self.pos += text.len();
            self.push_token(TokenType::Name, text.to_string(), lnum, col);
            return;
        }

        self.handle_indentation(lnum, col);

        if let Some(number) = caps.name("number") {
            self.pos += number.end();
            self.push_token(TokenType::Number, number.as_str().to_string(), lnum, col);
        } else if let Some(funny) = caps.name("funny") {
            let text = funny.as_str();
            match text {
                "(" | "[" | "{" => self.bracket_level += 1,
                ")" | "]" | "}" => self.bracket_level = self.bracket_level.saturating_sub(1),
                _ => {}
            }
            self.pos += text.len();
            self.push_token(TokenType::Operator, text.to_string(), lnum, col);
        } else if let Some(fstr) = caps.name("fstr") {
            let opener = fstr.as_str().to_string();
            let quotes = self.collection.fstring_openers[&opener].clone();
            self.pos += opener.len();
            self.push_token(TokenType::FStringStart, opener, lnum, col);
            self.scan_fstring(&quotes);
        } else if let Some(triple) = caps.name("triple") {
            let opener = triple.as_str().to_string();
            self.pos += opener.len();
            self.scan_triple(opener, lnum, col);
        } else if let Some(sstart) = caps.name("sstart") {
            let opener = sstart.as_str().to_string();
            self.pos += opener.len();
            self.scan_single(opener, lnum, col);
        } else {
            // a populated group is guaranteed by the pattern shape
            let ch = rest.chars().next().expect("rest is non-empty");
            self.pos += ch.len_utf8();
            self.push_token(TokenType::ErrorToken, ch.to_string(), lnum, col);
        }
    }

    fn advance_line(&mut self) {
        self.line_idx += 1;
        self.pos = 0;
    }

    fn end_of_line(&mut self, line: &str, lnum: u32) {
        let rest = &line[self.pos..];
        let nl_len = if rest.starts_with("\r\n") { 2 } else { 1 };
        let nl = &rest[..nl_len];
        if self.bracket_level > 0 || self.new_line {
            // implicit continuation, or a blank/comment-only line
            self.prefix.push_str(nl);
        } else {
            let col = char_col(line, self.pos);
            self.push_token(TokenType::Newline, nl.to_string(), lnum, col);
            self.new_line = true;
        }
        self.advance_line();
    }

    fn finish(&mut self) {
        let last_line = self.lines.last().copied().unwrap_or("");
        let mut end_line = self.lines.len() as u32;
        let mut end_col = last_line.trim_end_matches(['\r', '\n']).chars().count() as u32;
        if last_line.ends_with('\n') || self.lines.is_empty() {
            end_line += 1;
            end_col = 0;
        }
        let end_line = end_line.max(1);

        if !self.new_line {
            // the file ended mid logical line
            self.push_token(TokenType::Newline, String::new(), end_line, end_col);
        }
        while self.indents.len() > 1 {
            self.indents.pop();
            self.push_marker(TokenType::Dedent, end_line, 0);
        }
        self.push_token(TokenType::EndMarker, String::new(), end_line, 0);
        self.finished = true;
    }

    /// Compare the column of the first token on a logical line against the
    /// indentation stack, emitting INDENT/DEDENT markers.
    fn handle_indentation(&mut self, lnum: u32, col: u32) {
        if !self.new_line || self.bracket_level > 0 {
            return;
        }
        self.new_line = false;
        if self.suppress_indent {
            self.suppress_indent = false;
            return;
        }
        let top = *self.indents.last().expect("indent stack is never empty");
        if col > top {
            self.indents.push(col);
            self.push_marker(TokenType::Indent, lnum, 0);
            return;
        }
        while col < *self.indents.last().expect("indent stack is never empty") {
            let below = self.indents[self.indents.len() - 2];
            if col > below {
                // matches no stack level: report and realign, keep going
                self.push_marker(TokenType::ErrorDedent, lnum, col);
                *self.indents.last_mut().expect("indent stack is never empty") = col;
                break;
            }
            self.indents.pop();
            self.push_marker(TokenType::Dedent, lnum, 0);
        }
    }

    fn push_token(&mut self, token_type: TokenType, text: String, line: u32, col: u32) {
        self.pending.push_back(Token {
            token_type,
            text,
            start: Position::new(line, col),
            prefix: mem::take(&mut self.prefix),
        });
    }

    /// A zero-width structural token that does not consume the pending prefix.
    fn push_marker(&mut self, token_type: TokenType, line: u32, col: u32) {
        self.pending.push_back(Token {
            token_type,
            text: String::new(),
            start: Position::new(line, col),
            prefix: String::new(),
        });
    }

    /// Scan the remainder of a triple-quoted string, across lines. An
    /// unterminated literal becomes one `ErrorToken` spanning to end-of-file.
    fn scan_triple(&mut self, opener: String, lnum: u32, col: u32) {
        let quote = opener.chars().last().expect("opener ends with its quote");
        let mut text = opener;
        loop {
            let line = self.lines[self.line_idx];
            let rest = &line[self.pos..];
            if let Some(end) = find_closing_quotes(rest, quote, 3) {
                text.push_str(&rest[..end]);
                self.pos += end;
                self.push_token(TokenType::String, text, lnum, col);
                return;
            }
            text.push_str(rest);
            self.advance_line();
            if self.line_idx >= self.lines.len() {
                debug!(line = lnum, "unterminated triple-quoted string");
                self.push_token(TokenType::ErrorToken, text, lnum, col);
                return;
            }
        }
    }

    /// Scan the remainder of a single-quoted string. The literal may continue
    /// over backslash-terminated lines; an unescaped end-of-line makes it an
    /// `ErrorToken` covering the opener and the rest of the line.
    fn scan_single(&mut self, opener: String, lnum: u32, col: u32) {
        let quote = opener.chars().last().expect("opener ends with its quote");
        let mut text = opener;
        loop {
            let line = self.lines[self.line_idx];
            let rest = &line[self.pos..];
            match find_single_end(rest, quote) {
                SingleEnd::Closed(end) => {
                    text.push_str(&rest[..end]);
                    self.pos += end;
                    self.push_token(TokenType::String, text, lnum, col);
                    return;
                }
                SingleEnd::Continues => {
                    text.push_str(rest);
                    self.advance_line();
                    if self.line_idx >= self.lines.len() {
                        self.push_token(TokenType::ErrorToken, text, lnum, col);
                        return;
                    }
                }
                SingleEnd::Unterminated(content_len) => {
                    text.push_str(&rest[..content_len]);
                    self.pos += content_len;
                    self.push_token(TokenType::ErrorToken, text, lnum, col);
                    return;
                }
            }
        }
    }

    /// Scan f-string content up to the closing quote run. Replacement fields
    /// are not tokenized recursively; the content between the start and end
    /// quotes is one `FStringString` token.
    fn scan_fstring(&mut self, quotes: &str) {
        let quote = quotes.chars().next().expect("quote run is non-empty");
        let count = quotes.chars().count();
        let multiline = count == 3;

        let mut content = String::new();
        let start_line = (self.line_idx + 1) as u32;
        let start_col = char_col(self.lines[self.line_idx], self.pos);
        loop {
            let line = self.lines[self.line_idx];
            let rest = &line[self.pos..];
            if let Some(close) = find_closing_quotes(rest, quote, count) {
                let content_end = close - quotes.len();
                content.push_str(&rest[..content_end]);
                if !content.is_empty() {
                    self.push_token(TokenType::FStringString, content, start_line, start_col);
                }
                let close_line = (self.line_idx + 1) as u32;
                let close_col = char_col(line, self.pos + content_end);
                self.pos += close;
                self.push_token(TokenType::FStringEnd, quotes.to_string(), close_line, close_col);
                return;
            }
            if !multiline && !ends_with_continuation(rest) {
                let content_len = rest.trim_end_matches(['\r', '\n']).len();
                content.push_str(&rest[..content_len]);
                self.pos += content_len;
                self.push_token(TokenType::ErrorToken, content, start_line, start_col);
                return;
            }
            content.push_str(rest);
            self.advance_line();
            if self.line_idx >= self.lines.len() {
                self.push_token(TokenType::ErrorToken, content, start_line, start_col);
                return;
            }
        }
    }
}

fn ends_with_continuation(rest: &str) -> bool {
    let stripped = rest.strip_suffix('\n').map(|s| s.strip_suffix('\r').unwrap_or(s));
    matches!(stripped, Some(s) if s.ends_with('\\'))
}

/// Find the end (exclusive) of a closing run of `count` quote characters,
/// honoring backslash escapes.
fn find_closing_quotes(s: &str, quote: char, count: usize) -> Option<usize> {
    let closing: String = std::iter::repeat(quote).take(count).collect();
    let bytes = s.as_bytes();
    let mut i = 0;
    while i < s.len() {
        if bytes[i] == b'\\' {
            i += 1;
            if i < s.len() {
                i += s[i..].chars().next().map(char::len_utf8).unwrap_or(1);
            }
            continue;
        }
        if s[i..].starts_with(&closing) {
            return Some(i + closing.len());
        }
        i += s[i..].chars().next().map(char::len_utf8).unwrap_or(1);
    }
    None
}

enum SingleEnd {
    /// String closes in this line; end offset is exclusive of nothing — it
    /// includes the closing quote.
    Closed(usize),
    /// Line ends with a backslash continuation; the string goes on.
    Continues,
    /// Unescaped end of line; the payload is the content length before it.
    Unterminated(usize),
}

fn find_single_end(s: &str, quote: char) -> SingleEnd {
    let bytes = s.as_bytes();
    let mut i = 0;
    while i < s.len() {
        let ch = s[i..].chars().next().expect("in-bounds char");
        if ch == '\\' {
            let next = s[i + 1..].chars().next();
            match next {
                Some('\n') | Some('\r') => return SingleEnd::Continues,
                Some(escaped) => {
                    i += 1 + escaped.len_utf8();
                    continue;
                }
                None => return SingleEnd::Continues,
            }
        }
        if ch == quote {
            return SingleEnd::Closed(i + ch.len_utf8());
        }
        if ch == '\n' || ch == '\r' {
            return SingleEnd::Unterminated(i);
        }
        i += ch.len_utf8();
    }
    SingleEnd::Unterminated(s.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Dialect;

    fn tokens(code: &str) -> Vec<Token> {
        let collection = token_collection(Dialect::Python, (3, 12));
        tokenize(code, &collection).collect()
    }

    fn cython_tokens(code: &str) -> Vec<Token> {
        let collection = token_collection(Dialect::Cython, (3, 12));
        tokenize(code, &collection).collect()
    }

    fn kinds(tokens: &[Token]) -> Vec<TokenType> {
        tokens.iter().map(|t| t.token_type).collect()
    }

    #[test]
    fn empty_source_yields_endmarker_only() {
        let toks = tokens("");
        assert_eq!(kinds(&toks), vec![TokenType::EndMarker]);
        assert_eq!(toks[0].start, Position::new(1, 0));
    }

    #[test]
    fn simple_statement() {
        let toks = tokens("x = 1\n");
        assert_eq!(
            kinds(&toks),
            vec![
                TokenType::Name,
                TokenType::Operator,
                TokenType::Number,
                TokenType::Newline,
                TokenType::EndMarker,
            ]
        );
        assert_eq!(toks[0].text, "x");
        assert_eq!(toks[0].start, Position::new(1, 0));
        assert_eq!(toks[2].prefix, " ");
    }

    #[test]
    fn indentation_produces_markers() {
        let toks = tokens("def f():\n    return 1\n");
        let kinds = kinds(&toks);
        assert!(kinds.contains(&TokenType::Indent));
        assert!(kinds.contains(&TokenType::Dedent));
        // def NAME ( ) : NEWLINE INDENT return 1 NEWLINE DEDENT ENDMARKER
        assert_eq!(toks[0].text, "def");
        assert_eq!(toks[1].text, "f");
        let ret = toks.iter().find(|t| t.text == "return").unwrap();
        assert_eq!(ret.start, Position::new(2, 4));
    }

    #[test]
    fn dedent_matching_no_level_is_error_dedent() {
        let toks = tokens("if x:\n        a = 1\n    b = 2\n");
        assert!(kinds(&toks).contains(&TokenType::ErrorDedent));
        // and the stream still terminates normally
        assert_eq!(toks.last().unwrap().token_type, TokenType::EndMarker);
    }

    #[test]
    fn blank_and_comment_lines_join_the_prefix() {
        let toks = tokens("x = 1\n\n# comment\ny = 2\n");
        let y = toks.iter().find(|t| t.text == "y").unwrap();
        assert!(y.prefix.contains("# comment"));
        assert_eq!(y.start.line, 4);
        // no NEWLINE tokens were emitted for the blank or comment lines
        let newlines = toks.iter().filter(|t| t.token_type == TokenType::Newline).count();
        assert_eq!(newlines, 2);
    }

    #[test]
    fn triple_quoted_string_spans_lines() {
        let toks = tokens("s = '''one\ntwo'''\n");
        let s = toks.iter().find(|t| t.token_type == TokenType::String).unwrap();
        assert_eq!(s.text, "'''one\ntwo'''");
        assert_eq!(s.end(), Position::new(2, 6));
    }

    #[test]
    fn unterminated_triple_quote_spans_to_eof_without_panicking() {
        let toks = tokens("s = '''never closed\nmore\n");
        let err = toks.iter().find(|t| t.token_type == TokenType::ErrorToken).unwrap();
        assert_eq!(err.start, Position::new(1, 4));
        assert!(err.text.starts_with("'''"));
        assert!(err.text.contains("more"));
        assert_eq!(toks.last().unwrap().token_type, TokenType::EndMarker);
    }

    #[test]
    fn unterminated_single_quote_is_error_token_at_the_quote() {
        let toks = tokens("x = 'abc\ny = 2\n");
        let err = toks.iter().find(|t| t.token_type == TokenType::ErrorToken).unwrap();
        assert_eq!(err.start, Position::new(1, 4));
        assert_eq!(err.text, "'abc");
        // tokenizing continues on the next line
        assert!(toks.iter().any(|t| t.text == "y"));
    }

    #[test]
    fn fstring_tokenizes_as_start_content_end() {
        let toks = tokens("m = f'hi {name}!'\n");
        let seq: Vec<TokenType> = toks
            .iter()
            .filter(|t| {
                matches!(
                    t.token_type,
                    TokenType::FStringStart | TokenType::FStringString | TokenType::FStringEnd
                )
            })
            .map(|t| t.token_type)
            .collect();
        assert_eq!(
            seq,
            vec![TokenType::FStringStart, TokenType::FStringString, TokenType::FStringEnd]
        );
        let content = toks.iter().find(|t| t.token_type == TokenType::FStringString).unwrap();
        assert_eq!(content.text, "hi {name}!");
    }

    #[test]
    fn newlines_inside_brackets_are_prefix() {
        let toks = tokens("x = (1,\n     2)\n");
        let newlines = toks.iter().filter(|t| t.token_type == TokenType::Newline).count();
        assert_eq!(newlines, 1);
        let two = toks.iter().find(|t| t.text == "2").unwrap();
        assert!(two.prefix.contains('\n'));
    }

    #[test]
    fn statement_keyword_closes_open_brackets() {
        let toks = cython_tokens("x = (1,\ncdef int y\n");
        let cdef_idx = toks.iter().position(|t| t.text == "cdef").unwrap();
        assert_eq!(toks[cdef_idx - 1].token_type, TokenType::Newline);
        assert_eq!(toks.last().unwrap().token_type, TokenType::EndMarker);
    }

    #[test]
    fn unmatchable_character_advances_as_error_token() {
        let toks = tokens("x = $ 1\n");
        let err = toks.iter().find(|t| t.token_type == TokenType::ErrorToken).unwrap();
        assert_eq!(err.text, "$");
        assert!(toks.iter().any(|t| t.text == "1"));
    }

    #[test]
    fn missing_final_newline_still_terminates() {
        let toks = tokens("x = 1");
        let kinds = kinds(&toks);
        assert_eq!(
            kinds,
            vec![
                TokenType::Name,
                TokenType::Operator,
                TokenType::Number,
                TokenType::Newline,
                TokenType::EndMarker,
            ]
        );
        assert_eq!(toks[3].text, "");
    }

    #[test]
    fn restartable_and_deterministic() {
        let code = "class C:\n    def m(self):\n        pass\n";
        let a = tokens(code);
        let b = tokens(code);
        assert_eq!(a, b);
    }

    #[test]
    fn backslash_continuation_joins_logical_line() {
        let toks = tokens("x = 1 + \\\n    2\n");
        let newlines = toks.iter().filter(|t| t.token_type == TokenType::Newline).count();
        assert_eq!(newlines, 1);
        let two = toks.iter().find(|t| t.text == "2").unwrap();
        assert_eq!(two.start.line, 2);
    }
}
