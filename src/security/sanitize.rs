use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref TAG_RE: Regex = Regex::new(r"(?s)<[^>]*>").unwrap();
    static ref SCHEME_RE: Regex = Regex::new(r"(?i)\b(?:javascript|vbscript|data)\s*:").unwrap();
    static ref HANDLER_RE: Regex = Regex::new(r"(?i)\bon[a-z]+\s*=").unwrap();
    static ref CONTROL_RE: Regex = Regex::new(r"[\x00-\x08\x0B\x0C\x0E-\x1F\x7F]").unwrap();
    static ref SPACE_RE: Regex = Regex::new(r"\s+").unwrap();
    static ref SQL_RE: Regex = Regex::new(
        r"(?ix)
        \bunion\s+(?:all\s+)?select\b
        | \bdrop\s+(?:table|database|schema)\b
        | \binsert\s+into\b
        | \bdelete\s+from\b
        | \bupdate\s+\w+\s+set\b
        | \b(?:exec|execute)\s*\(
        | ;\s*(?:drop|delete|update|insert|alter|truncate)\b
        | '\s*or\s+'?\d+'?\s*=\s*'?\d+
        | '\s*or\s+'[^']*'\s*=\s*'
        | --
        | /\*
        | \*/
        "
    )
    .unwrap();
}

/// Strips markup and script vectors from free text, then normalizes spaces.
pub fn sanitize_text(input: &str) -> String {
    let s = TAG_RE.replace_all(input, "");
    let s = SCHEME_RE.replace_all(&s, "");
    let s = HANDLER_RE.replace_all(&s, "");
    let s = CONTROL_RE.replace_all(&s, "");
    SPACE_RE.replace_all(&s, " ").trim().to_string()
}

/// True if the input looks like an SQL injection attempt.
pub fn looks_like_sql_injection(input: &str) -> bool {
    SQL_RE.is_match(input)
}
