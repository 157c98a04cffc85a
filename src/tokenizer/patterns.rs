//! Lexical pattern composition.
//!
//! One composite regular expression recognizes every token class; it is built
//! by unioning sub-patterns for numbers, strings (with prefix variants),
//! f-string openers, operators (ordered longest-match-first so `**=` wins
//! over `*=` and `*`), brackets, and punctuation. The compiled set is cached
//! once per (dialect, version) with at-most-once construction per key.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::Dialect;

/// Reserved words of the base language.
const BASE_KEYWORDS: &[&str] = &[
    "False", "None", "True", "and", "as", "assert", "async", "await", "break",
    "class", "continue", "def", "del", "elif", "else", "except", "finally",
    "for", "from", "global", "if", "import", "in", "is", "lambda", "nonlocal",
    "not", "or", "pass", "raise", "return", "try", "while", "with", "yield",
];

/// Extra reserved words introduced by the Cython dialect.
const CYTHON_KEYWORDS: &[&str] = &["cdef", "cpdef", "ctypedef"];

/// Tokens that always introduce a new logical line. Seeing one while brackets
/// are still open means the bracket structure is broken; the tokenizer closes
/// it and forces a statement boundary.
const BASE_ALWAYS_BREAK: &[&str] = &[
    ";", "import", "class", "def", "try", "except", "finally", "while", "with",
    "return", "continue", "break", "del", "pass", "global", "assert",
    "nonlocal",
];

const CYTHON_ALWAYS_BREAK: &[&str] = &["cdef", "cpdef", "ctypedef"];

/// Compiled pattern set shared by every tokenize call for one
/// (dialect, version) pair.
pub struct TokenCollection {
    /// Matches one token (without its whitespace prefix) at the start of the
    /// remaining input. Exactly one named group is populated per match.
    pub pseudo_token: Regex,
    /// Matches the whitespace run preceding a token.
    pub whitespace: Regex,
    /// F-string opener (e.g. `rf'''`) to its closing quote run.
    pub fstring_openers: HashMap<String, String>,
    pub keywords: HashSet<String>,
    pub always_break_tokens: HashSet<String>,
}

fn group(parts: &[String]) -> String {
    format!("(?:{})", parts.join("|"))
}

fn maybe(pattern: &str) -> String {
    format!("(?:{})?", pattern)
}

/// All case variants of a short ASCII prefix ("rb" -> rb, rB, Rb, RB).
fn case_variants(prefix: &str) -> Vec<String> {
    let mut variants = vec![String::new()];
    for ch in prefix.chars() {
        let mut next = Vec::with_capacity(variants.len() * 2);
        for v in &variants {
            let mut lower = v.clone();
            lower.push(ch.to_ascii_lowercase());
            next.push(lower);
            let mut upper = v.clone();
            upper.push(ch.to_ascii_uppercase());
            next.push(upper);
        }
        variants = next;
    }
    variants
}

/// Every valid non-f string prefix, including the empty prefix.
fn string_prefixes() -> Vec<String> {
    let mut out = vec![String::new()];
    for base in ["b", "r", "u", "br", "rb"] {
        out.extend(case_variants(base));
    }
    out.sort_by_key(|p| std::cmp::Reverse(p.len()));
    out.dedup();
    out
}

/// Every valid f-string prefix.
fn fstring_prefixes() -> Vec<String> {
    let mut out = Vec::new();
    for base in ["f", "fr", "rf"] {
        out.extend(case_variants(base));
    }
    out.sort_by_key(|p| std::cmp::Reverse(p.len()));
    out.dedup();
    out
}

fn number_pattern() -> String {
    let hex = r"0[xX](?:_?[0-9a-fA-F])+".to_string();
    let bin = r"0[bB](?:_?[01])+".to_string();
    let oct = r"0[oO](?:_?[0-7])+".to_string();
    let dec = r"(?:0(?:_?0)*|[1-9](?:_?[0-9])*)".to_string();
    let int = group(&[hex, bin, oct, dec]);

    let exponent = r"[eE][-+]?[0-9](?:_?[0-9])*";
    let pointfloat = group(&[
        r"[0-9](?:_?[0-9])*\.(?:[0-9](?:_?[0-9])*)?".to_string(),
        r"\.[0-9](?:_?[0-9])*".to_string(),
    ]) + &maybe(exponent);
    let expfloat = format!(r"[0-9](?:_?[0-9])*{exponent}");
    let float = group(&[pointfloat, expfloat]);
    let imag = group(&[r"[0-9](?:_?[0-9])*[jJ]".to_string(), format!("{float}[jJ]")]);

    group(&[imag, float, int])
}

/// Operators, brackets and punctuation. Longest operators first so that a
/// longer spelling is never split into its prefixes. The Cython dialect adds
/// its own punctuation (the `except?` form) to the base set.
fn funny_pattern(dialect: Dialect) -> String {
    let mut parts = vec![
        r"\*\*=?",
        r">>=?",
        r"<<=?",
        r"//=?",
        r"->",
        r"[-+*/%&@`|^!=<>]=?",
        r"~",
        r"[\]\[(){}]",
        r":=",
        r"\.\.\.",
        r"[;.,:@]",
    ];
    if dialect == Dialect::Cython {
        parts.push(r"\?");
    }
    let owned: Vec<String> = parts.iter().map(|p| p.to_string()).collect();
    group(&owned)
}

fn build_collection(dialect: Dialect) -> TokenCollection {
    let prefixes = string_prefixes();
    let f_prefixes = fstring_prefixes();

    let quote_alternatives = ["'''", "\"\"\"", "'", "\""];
    let mut fstring_openers = HashMap::new();
    for prefix in &f_prefixes {
        for quotes in quote_alternatives {
            fstring_openers.insert(format!("{prefix}{quotes}"), quotes.to_string());
        }
    }

    let prefix_group = group(&prefixes);
    let f_prefix_group = group(&f_prefixes);

    let comment = r"#[^\r\n]*";
    let continuation = r"\\\r?\n";
    let fstring_start = format!("{f_prefix_group}(?:'''|\"\"\"|'|\")");
    let triple_start = format!("{prefix_group}(?:'''|\"\"\")");
    let string_start = format!("{prefix_group}['\"]");
    let number = number_pattern();
    let funny = funny_pattern(dialect);
    let name = r"[A-Za-z_0-9\x{0080}-\x{10FFFF}]+";

    let pseudo = format!(
        "^(?:(?P<comment>{comment})|(?P<cont>{continuation})|(?P<fstr>{fstring_start})|(?P<triple>{triple_start})|(?P<sstart>{string_start})|(?P<number>{number})|(?P<funny>{funny})|(?P<name>{name}))"
    );

    let mut keywords: HashSet<String> =
        BASE_KEYWORDS.iter().map(|k| k.to_string()).collect();
    let mut always_break: HashSet<String> =
        BASE_ALWAYS_BREAK.iter().map(|k| k.to_string()).collect();
    if dialect == Dialect::Cython {
        keywords.extend(CYTHON_KEYWORDS.iter().map(|k| k.to_string()));
        always_break.extend(CYTHON_ALWAYS_BREAK.iter().map(|k| k.to_string()));
    }

    TokenCollection {
        pseudo_token: Regex::new(&pseudo).expect("static token pattern must compile"),
        whitespace: Regex::new(r"^[ \f\t]*").expect("static whitespace pattern must compile"),
        fstring_openers,
        keywords,
        always_break_tokens: always_break,
    }
}

static TOKEN_COLLECTIONS: Lazy<Mutex<HashMap<(Dialect, (u8, u8)), Arc<TokenCollection>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Fetch (building at most once) the pattern set for a dialect and version.
///
/// Construction runs under the cache lock, so concurrent callers for the
/// same key observe a single build.
pub fn token_collection(dialect: Dialect, version: (u8, u8)) -> Arc<TokenCollection> {
    let mut cache = TOKEN_COLLECTIONS
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    cache
        .entry((dialect, version))
        .or_insert_with(|| Arc::new(build_collection(dialect)))
        .clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matched_group<'t>(collection: &TokenCollection, input: &'t str) -> (&'static str, &'t str) {
        let caps = collection.pseudo_token.captures(input).expect("no token match");
        for group in ["comment", "cont", "fstr", "triple", "sstart", "number", "funny", "name"] {
            if let Some(m) = caps.name(group) {
                return (group, m.as_str());
            }
        }
        panic!("match without a populated group");
    }

    #[test]
    fn longest_operator_wins() {
        let c = token_collection(Dialect::Python, (3, 12));
        assert_eq!(matched_group(&c, "**=2"), ("funny", "**="));
        assert_eq!(matched_group(&c, "*=2"), ("funny", "*="));
        assert_eq!(matched_group(&c, "*2"), ("funny", "*"));
        assert_eq!(matched_group(&c, ":=1"), ("funny", ":="));
        assert_eq!(matched_group(&c, "...x"), ("funny", "..."));
    }

    #[test]
    fn string_openers_classify_by_prefix() {
        let c = token_collection(Dialect::Python, (3, 12));
        assert_eq!(matched_group(&c, "'''doc"), ("triple", "'''"));
        assert_eq!(matched_group(&c, "rb'x'"), ("sstart", "rb'"));
        assert_eq!(matched_group(&c, "f'{x}'"), ("fstr", "f'"));
        assert_eq!(matched_group(&c, "rf\"\"\"x\"\"\""), ("fstr", "rf\"\"\""));
        // a name that merely starts like a prefix is still a name
        assert_eq!(matched_group(&c, "band = 1"), ("name", "band"));
    }

    #[test]
    fn numbers_and_names() {
        let c = token_collection(Dialect::Python, (3, 12));
        assert_eq!(matched_group(&c, "0x1f "), ("number", "0x1f"));
        assert_eq!(matched_group(&c, "1_000.5e3j"), ("number", "1_000.5e3j"));
        assert_eq!(matched_group(&c, ".5+x"), ("number", ".5"));
        assert_eq!(matched_group(&c, "classify"), ("name", "classify"));
    }

    #[test]
    fn dialect_adds_break_keywords_without_removing_base_ones() {
        let base = token_collection(Dialect::Python, (3, 12));
        let cython = token_collection(Dialect::Cython, (3, 12));
        assert!(!base.always_break_tokens.contains("cdef"));
        assert!(cython.always_break_tokens.contains("cdef"));
        for kw in BASE_ALWAYS_BREAK {
            assert!(cython.always_break_tokens.contains(*kw));
        }
        assert!(cython.keywords.contains("cpdef"));
        assert!(cython.keywords.contains("class"));
    }

    #[test]
    fn collection_is_cached_per_key() {
        let a = token_collection(Dialect::Python, (3, 12));
        let b = token_collection(Dialect::Python, (3, 12));
        assert!(Arc::ptr_eq(&a, &b));
        let c = token_collection(Dialect::Cython, (3, 12));
        assert!(!Arc::ptr_eq(&a, &c));
    }
}
