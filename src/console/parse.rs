//! Splits pseudocode files into functions and recovers their names,
//! parameters and local variable declarations.

use regex::Regex;
use std::sync::LazyLock;

static SIGNATURE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)([A-Za-z_][\w]*)\s*\(([^()]*)\)\s*$").expect("signature pattern is valid")
});

static PARAM_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([A-Za-z_]\w*)\s*(?:\[[^\]]*\])?\s*$").expect("parameter pattern is valid")
});

static DECLARATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\s*((?:[A-Za-z_]\w*(?:\s*\*+\s*|\s+))+)([A-Za-z_]\w*)\s*(?:\[[^\]]*\])?\s*;\s*(?://.*)?$",
    )
    .expect("declaration pattern is valid")
});

static CALL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b([A-Za-z_]\w*)\s*\(").expect("call pattern is valid"));

static SUB_ADDRESS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^sub_([0-9A-Fa-f]+)$").expect("address pattern is valid"));

/// Words that can start a statement ending in `name;` without declaring anything.
const STATEMENT_KEYWORDS: &[&str] = &["return", "goto", "break", "continue", "case", "else", "do"];

/// One function found in a pseudocode file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedFunction {
    pub name: String,
    /// Signature and body, without any leading comment.
    pub code: String,
    /// Text of a `/* ... */` block directly above the signature.
    pub comment: Option<String>,
    /// Parameters first, then locals, in declaration order.
    pub locals: Vec<String>,
}

/// Finds every top-level `signature { body }` in `source`.
///
/// Braces inside comments and string or character literals do not count.
pub fn parse_functions(source: &str) -> Vec<ParsedFunction> {
    let bytes = source.as_bytes();
    let mut functions = Vec::new();
    let mut depth = 0usize;
    let mut chunk_start = 0;
    let mut body_start = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i = source[i + 2..].find("*/").map_or(bytes.len(), |end| i + 2 + end + 2);
                continue;
            }
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                i = source[i..].find('\n').map_or(bytes.len(), |end| i + end + 1);
                continue;
            }
            quote @ (b'"' | b'\'') => {
                i = skip_literal(bytes, i, quote);
                continue;
            }
            b'{' => {
                if depth == 0 {
                    body_start = i;
                }
                depth += 1;
            }
            b'}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    let header = &source[chunk_start..body_start];
                    if let Some(f) = parse_one(header, &source[body_start..=i]) {
                        functions.push(f);
                    }
                    chunk_start = i + 1;
                }
            }
            _ => {}
        }
        i += 1;
    }
    functions
}

/// Index just past the literal opened by `quote` at `start`.
fn skip_literal(bytes: &[u8], start: usize, quote: u8) -> usize {
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'\n' => return i + 1,
            b if b == quote => return i + 1,
            _ => i += 1,
        }
    }
    bytes.len()
}

fn parse_one(header: &str, body: &str) -> Option<ParsedFunction> {
    let (comment, signature) = split_leading_comment(header);
    let signature = signature.trim();
    let caps = SIGNATURE.captures(signature)?;
    let name = caps[1].to_string();

    let mut locals: Vec<String> = caps[2]
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty() && *p != "void" && *p != "...")
        .filter_map(|p| PARAM_NAME.captures(p).map(|c| c[1].to_string()))
        .collect();
    for line in body.lines().skip(1) {
        if let Some(decl) = DECLARATION.captures(line) {
            let first_word = decl[1].split_whitespace().next().unwrap_or_default();
            if STATEMENT_KEYWORDS.contains(&first_word) {
                continue;
            }
            let local = decl[2].to_string();
            if !locals.contains(&local) {
                locals.push(local);
            }
        }
    }

    Some(ParsedFunction {
        name,
        code: format!("{signature}\n{body}"),
        comment,
        locals,
    })
}

/// Separates a `/* ... */` block (and `//` lines) above a signature from it.
fn split_leading_comment(header: &str) -> (Option<String>, &str) {
    let mut rest = header.trim_start();
    let mut comment = None;
    loop {
        if let Some(after) = rest.strip_prefix("/*") {
            let Some(end) = after.find("*/") else {
                break;
            };
            comment = Some(uncomment(&after[..end]));
            rest = after[end + 2..].trim_start();
        } else if rest.starts_with("//") {
            rest = rest.split_once('\n').map_or("", |(_, r)| r).trim_start();
        } else {
            break;
        }
    }
    (comment, rest)
}

/// Strips the ` * ` gutter of a rendered block comment.
fn uncomment(block: &str) -> String {
    let lines: Vec<&str> = block
        .lines()
        .map(|l| {
            let l = l.trim_start();
            l.strip_prefix("* ").or_else(|| l.strip_prefix('*')).unwrap_or(l)
        })
        .collect();
    lines.join("\n").trim().to_string()
}

/// Renders a function comment as the block [`split_leading_comment`] reads back.
pub fn render_comment(comment: &str) -> String {
    let mut out = String::from("/*\n");
    for line in comment.lines() {
        if line.is_empty() {
            out.push_str(" *\n");
        } else {
            // A literal `*/` would close the block early.
            out.push_str(&format!(" * {}\n", line.replace("*/", "* /")));
        }
    }
    out.push_str(" */\n");
    out
}

/// Names of `known` functions called from `code`, in order of first call.
pub fn called_names<'a>(code: &str, own_name: &str, known: &[&'a str]) -> Vec<&'a str> {
    let body = code.split_once('{').map_or(code, |(_, b)| b);
    let mut names = Vec::new();
    for caps in CALL.captures_iter(body) {
        let called = &caps[1];
        if called == own_name {
            continue;
        }
        if let Some(&name) = known.iter().find(|k| **k == called) {
            if !names.contains(&name) {
                names.push(name);
            }
        }
    }
    names
}

/// Address encoded in an auto-generated `sub_XXXX` name.
pub fn address_from_name(name: &str) -> Option<u64> {
    let caps = SUB_ADDRESS.captures(name)?;
    u64::from_str_radix(&caps[1], 16).ok()
}
