//! Parsing of the plain-text BNF grammar resources.
//!
//! A resource is a list of productions, one per line (continuation lines are
//! indented). The parser here is deliberately shallow: it records each
//! production's right-hand side as a flat item list and derives the leading
//! keyword terminals used for statement dispatch. Full expression structure
//! is the tree parser's business, not the resource format's.

/// One item of a production's right-hand side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RhsItem {
    /// A quoted terminal, e.g. `'def'` or `':'`.
    Literal(String),
    /// An UPPERCASE token-type reference, e.g. `NAME` or `NEWLINE`.
    Token(String),
    /// A lowercase reference to another production.
    Rule(String),
    /// Structure punctuation: `( ) [ ] | * +`.
    Punct(char),
}

/// A named production with its flat right-hand side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Production {
    pub name: String,
    pub items: Vec<RhsItem>,
}

impl Production {
    /// Keyword terminals that can introduce this production.
    ///
    /// Covers the two shapes the resources use: a leading literal
    /// (`funcdef: 'def' ...`) and a leading alternation of literals
    /// (`cfuncdef: ('cdef' | 'cpdef') ...`). Productions led by anything
    /// else dispatch structurally in the parser, not by keyword.
    pub fn leading_keywords(&self) -> Vec<&str> {
        match self.items.first() {
            Some(RhsItem::Literal(lit)) => vec![lit.as_str()],
            Some(RhsItem::Punct('(')) => {
                let mut keywords = Vec::new();
                for item in &self.items[1..] {
                    match item {
                        RhsItem::Literal(lit) => keywords.push(lit.as_str()),
                        RhsItem::Punct('|') => continue,
                        RhsItem::Punct(')') => return keywords,
                        _ => return Vec::new(),
                    }
                }
                Vec::new()
            }
            _ => Vec::new(),
        }
    }
}

/// Parse a grammar resource into its productions, preserving file order.
pub fn parse_grammar_text(text: &str) -> Vec<Production> {
    let mut productions: Vec<Production> = Vec::new();
    for raw_line in text.lines() {
        let line = strip_comment(raw_line);
        if line.trim().is_empty() {
            continue;
        }
        let continuation = raw_line.starts_with(' ') || raw_line.starts_with('\t');
        if continuation {
            if let Some(last) = productions.last_mut() {
                last.items.extend(parse_rhs(line.trim()));
            }
            continue;
        }
        let Some((name, rhs)) = line.split_once(':') else {
            continue;
        };
        productions.push(Production {
            name: name.trim().to_string(),
            items: parse_rhs(rhs.trim()),
        });
    }
    productions
}

fn strip_comment(line: &str) -> &str {
    match line.find('#') {
        Some(idx) => &line[..idx],
        None => line,
    }
}

fn parse_rhs(rhs: &str) -> Vec<RhsItem> {
    let mut items = Vec::new();
    let mut chars = rhs.char_indices().peekable();
    while let Some((idx, ch)) = chars.next() {
        match ch {
            c if c.is_whitespace() => {}
            '\'' => {
                let start = idx + 1;
                let mut end = start;
                for (j, c) in rhs[start..].char_indices() {
                    if c == '\'' {
                        end = start + j;
                        break;
                    }
                }
                items.push(RhsItem::Literal(rhs[start..end].to_string()));
                while let Some(&(j, _)) = chars.peek() {
                    if j <= end {
                        chars.next();
                    } else {
                        break;
                    }
                }
            }
            '(' | ')' | '[' | ']' | '|' | '*' | '+' => items.push(RhsItem::Punct(ch)),
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = idx;
                let mut end = rhs.len();
                while let Some(&(j, next)) = chars.peek() {
                    if next.is_ascii_alphanumeric() || next == '_' {
                        chars.next();
                    } else {
                        end = j;
                        break;
                    }
                }
                let word = &rhs[start..end];
                if word.chars().all(|c| c.is_ascii_uppercase() || c == '_') {
                    items.push(RhsItem::Token(word.to_string()));
                } else {
                    items.push(RhsItem::Rule(word.to_string()));
                }
            }
            _ => {}
        }
    }
    items
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_named_productions_in_order() {
        let text = "\
# comment
file_input: (NEWLINE | stmt)* ENDMARKER
funcdef: 'def' NAME parameters ':' suite
";
        let productions = parse_grammar_text(text);
        assert_eq!(productions.len(), 2);
        assert_eq!(productions[0].name, "file_input");
        assert_eq!(productions[1].name, "funcdef");
        assert_eq!(
            productions[1].items[0],
            RhsItem::Literal("def".to_string())
        );
        assert_eq!(productions[1].items[1], RhsItem::Token("NAME".to_string()));
        assert_eq!(
            productions[1].items[2],
            RhsItem::Rule("parameters".to_string())
        );
    }

    #[test]
    fn leading_keywords_from_literal_and_alternation() {
        let productions = parse_grammar_text(
            "classdef: 'class' NAME ':' suite\ncfuncdef: ('cdef' | 'cpdef') NAME parameters ':' suite\nsuite: simple_stmt | NEWLINE INDENT stmt+ DEDENT\n",
        );
        assert_eq!(productions[0].leading_keywords(), vec!["class"]);
        assert_eq!(productions[1].leading_keywords(), vec!["cdef", "cpdef"]);
        assert!(productions[2].leading_keywords().is_empty());
    }

    #[test]
    fn continuation_lines_extend_the_previous_production() {
        let text = "import_from: 'from' dotted_name\n    'import' import_as_names\n";
        let productions = parse_grammar_text(text);
        assert_eq!(productions.len(), 1);
        assert!(productions[0]
            .items
            .contains(&RhsItem::Literal("import".to_string())));
    }
}
