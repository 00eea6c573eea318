//! Static require-call scanner.
//!
//! Scans captured source text for `require(...)` calls without full parsing.
//! Used by the deferred-resolution wrapper to pre-resolve every literal
//! require before the wrapped body runs synchronously. Only plain
//! string-literal specifiers and plain option-object literals with recognized
//! keys are supported; anything else is reported as dynamic and skipped by
//! the caller.

use crate::options::{CacheInvalidationMode, RequireOptions};

/// One `require(...)` call found in source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScannedRequire {
    /// Literal specifier, optionally with a literal options object.
    Literal {
        spec: String,
        options: Option<RequireOptions>,
    },
    /// First argument (or options object) was not a supported literal.
    Dynamic { argument: String },
}

/// Scan source text for `require(...)` calls.
///
/// Literal calls are deduplicated by specifier in first-appearance order;
/// dynamic calls are reported individually so the caller can warn.
#[must_use]
pub fn scan_require_calls(source: &str) -> Vec<ScannedRequire> {
    let mut results = Vec::new();
    let mut seen = Vec::new();
    let chars: Vec<char> = source.chars().collect();
    let len = chars.len();
    let mut i = 0;

    while i < len {
        // Skip single-line comments
        if i + 1 < len && chars[i] == '/' && chars[i + 1] == '/' {
            while i < len && chars[i] != '\n' {
                i += 1;
            }
            continue;
        }

        // Skip block comments
        if i + 1 < len && chars[i] == '/' && chars[i + 1] == '*' {
            i += 2;
            while i + 1 < len && !(chars[i] == '*' && chars[i + 1] == '/') {
                i += 1;
            }
            i += 2;
            continue;
        }

        // Skip string literals so require-looking text inside them is ignored
        if chars[i] == '"' || chars[i] == '\'' || chars[i] == '`' {
            i = skip_string(&chars, i);
            continue;
        }

        if matches_keyword(&chars, i, "require") {
            let start_i = i;
            i += 7;
            match scan_require_arguments(&chars, i) {
                Some((scanned, end)) => {
                    match &scanned {
                        ScannedRequire::Literal { spec, .. } => {
                            if !spec.is_empty() && !seen.contains(spec) {
                                seen.push(spec.clone());
                                results.push(scanned);
                            }
                        }
                        ScannedRequire::Dynamic { .. } => results.push(scanned),
                    }
                    i = end;
                    continue;
                }
                None => {
                    i = start_i + 1;
                    continue;
                }
            }
        }

        i += 1;
    }

    results
}

/// Check if chars at position match a keyword (with word boundary).
fn matches_keyword(chars: &[char], pos: usize, keyword: &str) -> bool {
    let kw: Vec<char> = keyword.chars().collect();
    let len = kw.len();

    if pos + len > chars.len() {
        return false;
    }

    if pos > 0 && (chars[pos - 1].is_alphanumeric() || chars[pos - 1] == '_' || chars[pos - 1] == '.')
    {
        return false;
    }

    for (j, &c) in kw.iter().enumerate() {
        if chars[pos + j] != c {
            return false;
        }
    }

    if pos + len < chars.len() && (chars[pos + len].is_alphanumeric() || chars[pos + len] == '_') {
        return false;
    }

    true
}

/// Scan the argument list after the `require` keyword.
/// Returns the scanned call and the position past the closing paren.
fn scan_require_arguments(chars: &[char], start: usize) -> Option<(ScannedRequire, usize)> {
    let len = chars.len();
    let mut i = skip_whitespace(chars, start);

    if i >= len || chars[i] != '(' {
        return None;
    }
    i += 1;
    i = skip_whitespace(chars, i);

    // First argument must be a plain string literal
    if i >= len || !(chars[i] == '"' || chars[i] == '\'') {
        let (snippet, end) = capture_until_close(chars, i);
        return Some((ScannedRequire::Dynamic { argument: snippet }, end));
    }

    let quote = chars[i];
    i += 1;
    let mut spec = String::new();
    while i < len && chars[i] != quote {
        if chars[i] == '\\' && i + 1 < len {
            spec.push(chars[i + 1]);
            i += 2;
            continue;
        }
        spec.push(chars[i]);
        i += 1;
    }
    if i >= len {
        return None;
    }
    i += 1; // closing quote
    i = skip_whitespace(chars, i);

    // Optional second argument: a literal options object
    let mut options = None;
    if i < len && chars[i] == ',' {
        i = skip_whitespace(chars, i + 1);
        if i >= len || chars[i] != '{' {
            let (snippet, end) = capture_until_close(chars, i);
            return Some((ScannedRequire::Dynamic { argument: snippet }, end));
        }
        let (object_text, end) = capture_braced(chars, i)?;
        match parse_options_literal(&object_text) {
            Some(parsed) => options = Some(parsed),
            None => {
                let (_, close) = capture_until_close(chars, end);
                return Some((
                    ScannedRequire::Dynamic {
                        argument: object_text,
                    },
                    close,
                ));
            }
        }
        i = skip_whitespace(chars, end);
    }

    if i < len && chars[i] == ')' {
        i += 1;
    }

    Some((ScannedRequire::Literal { spec, options }, i))
}

fn skip_whitespace(chars: &[char], mut i: usize) -> usize {
    while i < chars.len() && chars[i].is_whitespace() {
        i += 1;
    }
    i
}

/// Skip a string literal starting at `i` (which holds the quote char).
fn skip_string(chars: &[char], mut i: usize) -> usize {
    let quote = chars[i];
    i += 1;
    while i < chars.len() && chars[i] != quote {
        if chars[i] == '\\' && i + 1 < chars.len() {
            i += 2;
            continue;
        }
        i += 1;
    }
    i + 1
}

/// Capture a snippet up to the call's closing paren (capped for messages).
fn capture_until_close(chars: &[char], start: usize) -> (String, usize) {
    const SNIPPET_CAP: usize = 48;
    let len = chars.len();
    let mut depth = 0usize;
    let mut snippet = String::new();
    let mut i = start;
    while i < len {
        let c = chars[i];
        if c == '(' {
            depth += 1;
        } else if c == ')' {
            if depth == 0 {
                i += 1;
                break;
            }
            depth -= 1;
        } else if c == '"' || c == '\'' || c == '`' {
            let end = skip_string(chars, i);
            if snippet.len() < SNIPPET_CAP {
                snippet.extend(chars[i..end.min(len)].iter());
            }
            i = end;
            continue;
        }
        if snippet.len() < SNIPPET_CAP {
            snippet.push(c);
        }
        i += 1;
    }
    (snippet.trim().to_string(), i)
}

/// Capture a balanced `{...}` block starting at `start` (which holds `{`).
/// Returns the block text including braces and the position past it.
fn capture_braced(chars: &[char], start: usize) -> Option<(String, usize)> {
    let len = chars.len();
    let mut depth = 0usize;
    let mut i = start;
    let mut text = String::new();
    while i < len {
        let c = chars[i];
        if c == '"' || c == '\'' || c == '`' {
            let end = skip_string(chars, i);
            text.extend(chars[i..end.min(len)].iter());
            i = end;
            continue;
        }
        text.push(c);
        if c == '{' {
            depth += 1;
        } else if c == '}' {
            depth -= 1;
            if depth == 0 {
                return Some((text, i + 1));
            }
        }
        i += 1;
    }
    None
}

/// Parse a `{ key: "value" }` options literal with recognized keys only.
///
/// Fails closed: unknown keys, non-string values, or anything structurally
/// surprising yields `None` so the caller treats the call as dynamic.
#[must_use]
pub fn parse_options_literal(text: &str) -> Option<RequireOptions> {
    let chars: Vec<char> = text.chars().collect();
    let len = chars.len();
    let mut i = skip_whitespace(&chars, 0);
    if i >= len || chars[i] != '{' {
        return None;
    }
    i += 1;

    let mut options = RequireOptions::default();
    loop {
        i = skip_whitespace(&chars, i);
        if i >= len {
            return None;
        }
        if chars[i] == '}' {
            return Some(options);
        }

        let key = if chars[i] == '"' || chars[i] == '\'' {
            let (value, end) = read_string_literal(&chars, i)?;
            i = end;
            value
        } else {
            let start = i;
            while i < len
                && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '$')
            {
                i += 1;
            }
            if i == start {
                return None;
            }
            chars[start..i].iter().collect()
        };

        i = skip_whitespace(&chars, i);
        if i >= len || chars[i] != ':' {
            return None;
        }
        i = skip_whitespace(&chars, i + 1);
        if i >= len || !(chars[i] == '"' || chars[i] == '\'') {
            return None;
        }
        let (value, end) = read_string_literal(&chars, i)?;
        i = end;

        match key.as_str() {
            "cacheInvalidationMode" => {
                options.cache_invalidation_mode = Some(CacheInvalidationMode::from_name(&value)?);
            }
            "parentPath" => options.parent_path = Some(value),
            _ => return None,
        }

        i = skip_whitespace(&chars, i);
        if i < len && chars[i] == ',' {
            i += 1;
        }
    }
}

fn read_string_literal(chars: &[char], start: usize) -> Option<(String, usize)> {
    let quote = chars[start];
    let mut i = start + 1;
    let mut value = String::new();
    while i < chars.len() {
        if chars[i] == '\\' && i + 1 < chars.len() {
            value.push(chars[i + 1]);
            i += 2;
            continue;
        }
        if chars[i] == quote {
            return Some((value, i + 1));
        }
        value.push(chars[i]);
        i += 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_literal_requires() {
        let source = r#"
            const a = require("./a.ts");
            const b = require('./b.ts');
        "#;
        let calls = scan_require_calls(source);
        assert_eq!(calls.len(), 2);
        assert_eq!(
            calls[0],
            ScannedRequire::Literal {
                spec: "./a.ts".to_string(),
                options: None
            }
        );
    }

    #[test]
    fn test_scan_dedup_by_spec() {
        let source = r#"require("./a.ts"); require("./a.ts");"#;
        assert_eq!(scan_require_calls(source).len(), 1);
    }

    #[test]
    fn test_scan_with_options_literal() {
        let source = r#"require("./b.ts", { cacheInvalidationMode: "never" });"#;
        let calls = scan_require_calls(source);
        assert_eq!(
            calls[0],
            ScannedRequire::Literal {
                spec: "./b.ts".to_string(),
                options: Some(RequireOptions::with_mode(CacheInvalidationMode::Never)),
            }
        );
    }

    #[test]
    fn test_scan_dynamic_argument_reported() {
        let source = "const mod = require(name);";
        let calls = scan_require_calls(source);
        assert_eq!(calls.len(), 1);
        assert!(matches!(
            &calls[0],
            ScannedRequire::Dynamic { argument } if argument == "name"
        ));
    }

    #[test]
    fn test_scan_dynamic_options_reported() {
        let source = r#"require("./a.ts", opts);"#;
        let calls = scan_require_calls(source);
        assert!(matches!(&calls[0], ScannedRequire::Dynamic { .. }));
    }

    #[test]
    fn test_scan_skips_comments_and_strings() {
        let source = r#"
            // require("./commented.ts")
            /* require("./blocked.ts") */
            const s = "require('./quoted.ts')";
            require("./real.ts");
        "#;
        let calls = scan_require_calls(source);
        assert_eq!(calls.len(), 1);
        assert!(matches!(
            &calls[0],
            ScannedRequire::Literal { spec, .. } if spec == "./real.ts"
        ));
    }

    #[test]
    fn test_scan_ignores_member_access() {
        let source = "custom.require('./x.ts'); myrequire('./y.ts');";
        assert!(scan_require_calls(source).is_empty());
    }

    #[test]
    fn test_parse_options_literal_full() {
        let parsed =
            parse_options_literal(r#"{ cacheInvalidationMode: "always", parentPath: "/p.ts" }"#)
                .unwrap();
        assert_eq!(
            parsed.cache_invalidation_mode,
            Some(CacheInvalidationMode::Always)
        );
        assert_eq!(parsed.parent_path.as_deref(), Some("/p.ts"));
    }

    #[test]
    fn test_parse_options_literal_quoted_keys() {
        let parsed = parse_options_literal(r#"{"cacheInvalidationMode": "never"}"#).unwrap();
        assert_eq!(
            parsed.cache_invalidation_mode,
            Some(CacheInvalidationMode::Never)
        );
    }

    #[test]
    fn test_parse_options_literal_fails_closed() {
        assert!(parse_options_literal(r#"{ cacheInvalidationMode: mode }"#).is_none());
        assert!(parse_options_literal(r#"{ unknownKey: "x" }"#).is_none());
        assert!(parse_options_literal(r#"{ cacheInvalidationMode: "bogus" }"#).is_none());
    }
}
