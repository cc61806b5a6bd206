//! Token-level scans over expression text that tree-sitter leaves opaque: macro
//! arguments and attribute values.

const KEYWORDS: &[&str] = &[
    "as", "else", "false", "fn", "if", "in", "let", "match", "move", "mut", "ref", "return", "self",
    "Self", "true", "while", "for", "loop",
];

/// Byte ranges of identifier tokens outside string and char literals.
fn identifier_tokens(text: &str) -> Vec<(usize, usize)> {
    let bytes = text.as_bytes();
    let mut out = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        if b == b'"' {
            i += 1;
            while i < bytes.len() && bytes[i] != b'"' {
                if bytes[i] == b'\\' {
                    i += 1;
                }
                i += 1;
            }
            i += 1;
        } else if b == b'\'' && i + 2 < bytes.len() && bytes[i + 2] == b'\'' {
            i += 3;
        } else if b.is_ascii_alphabetic() || b == b'_' {
            let start = i;
            while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                i += 1;
            }
            let prev = start.checked_sub(1).map(|p| bytes[p]);
            // `b"..."` byte-string prefix
            if &text[start..i] == "b" && bytes.get(i) == Some(&b'"') {
                continue;
            }
            if prev != Some(b'\'') {
                out.push((start, i));
            }
        } else if b.is_ascii_digit() {
            while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                i += 1;
            }
        } else {
            i += 1;
        }
    }
    out
}

/// Distinct identifiers in first-seen order.
pub fn identifiers(text: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for (start, end) in identifier_tokens(text) {
        let ident = &text[start..end];
        if KEYWORDS.contains(&ident) || out.iter().any(|o| o == ident) {
            continue;
        }
        out.push(ident.to_string());
    }
    out
}

/// Identifiers whose `.len()` is compared against a bound, e.g. `name.len() <= 32`.
pub fn length_bounded(text: &str) -> Vec<String> {
    if !text.contains('<') && !text.contains('>') {
        return Vec::new();
    }

    let mut out: Vec<String> = Vec::new();
    let mut rest = text;
    let mut offset = 0;
    while let Some(pos) = rest.find(".len()") {
        let absolute = offset + pos;
        if let Some(subject) = receiver_root(&text[..absolute]) {
            if !out.contains(&subject) {
                out.push(subject);
            }
        }
        offset = absolute + ".len()".len();
        rest = &text[offset..];
    }
    out
}

/// Last identifier of the path before `.len()`, skipping byte views.
fn receiver_root(before: &str) -> Option<String> {
    let mut head = before.trim_end();
    loop {
        let stripped = [".as_bytes()", ".as_ref()", ".as_str()", ".to_vec()"]
            .iter()
            .find_map(|suffix| head.strip_suffix(suffix));
        match stripped {
            Some(s) => head = s.trim_end(),
            None => break,
        }
    }
    let ident: String = head
        .chars()
        .rev()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    if ident.is_empty() || ident.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        None
    } else {
        Some(ident)
    }
}

/// Literals, SCREAMING_CASE constants and `size_of` calls.
pub fn is_constant_operand(text: &str) -> bool {
    let text = text.trim().trim_start_matches('(').trim_end_matches(')').trim();
    if text.is_empty() {
        return false;
    }
    if text.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        return true;
    }
    if text.contains("size_of") {
        return true;
    }
    let last = text.rsplit("::").next().unwrap_or(text);
    !last.is_empty()
        && last.chars().any(|c| c.is_ascii_uppercase())
        && last
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

/// First identifier in the text, e.g. the event type inside `emit!(...)` arguments.
pub fn first_identifier(text: &str) -> Option<String> {
    identifier_tokens(text)
        .into_iter()
        .map(|(s, e)| &text[s..e])
        .find(|ident| !KEYWORDS.contains(ident))
        .map(str::to_string)
}

/// `ctx.accounts.vault.amount` -> `["ctx", "accounts", "vault", "amount"]`, stopping at
/// the first call or index.
pub fn path_segments(text: &str) -> Vec<&str> {
    let text = text
        .trim()
        .trim_start_matches(['&', '*'])
        .trim_start();
    let text = text.strip_prefix("mut ").unwrap_or(text).trim_start();

    let mut out = Vec::new();
    for segment in text.split('.') {
        let ident: &str = segment
            .split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .next()
            .unwrap_or("");
        if ident.is_empty() {
            break;
        }
        out.push(ident);
        if ident.len() != segment.trim_end().len() {
            break;
        }
    }
    out
}
