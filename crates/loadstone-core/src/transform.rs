//! Transform pipeline.
//!
//! Converts source text into a loadable module-factory form. The ESM-to-CJS
//! rewrite itself is the injected [`Transpiler`] collaborator; this module
//! owns what surrounds it: top-level-await detection, factory wrapping for
//! the sync and async execution paths, and patching the generated source
//! map's `sources` entries to a logical URL derived from the original path so
//! stack traces and breakpoints resolve against the real file.

use serde_json::Value;

use crate::error::Error;
use crate::evaluate::Transpiler;

/// Output of the transform pipeline, ready for factory instantiation.
#[derive(Debug, Clone)]
pub struct CompiledModule {
    /// Factory-wrapped code.
    pub code: String,
    /// Whether the program body contains a top-level `await`.
    pub has_top_level_await: bool,
    /// Structured source map with patched `sources`/`file` entries.
    pub source_map: Option<Value>,
    /// Logical URL the map and diagnostics refer to.
    pub logical_url: String,
}

/// Run `source` through the transpiler and wrap it as a module factory.
///
/// `filename` is the resolved path of the module (used for error context and
/// the logical URL); `dir` is its containing directory, passed through to the
/// transpiler for relative-import handling.
pub fn compile(
    transpiler: &dyn Transpiler,
    source: &str,
    filename: &str,
    dir: &str,
    logical_url_prefix: &str,
) -> Result<CompiledModule, Error> {
    let output = transpiler
        .compile_to_loadable(source, filename, dir)
        .map_err(|source| Error::Compile {
            path: filename.to_string(),
            source,
        })?;

    let has_top_level_await = has_top_level_await(source);
    let code = wrap_factory(&output.code, has_top_level_await);
    let logical_url = logical_source_url(logical_url_prefix, filename);
    let source_map = output.source_map.map(|map| patch_source_map(map, &logical_url));

    Ok(CompiledModule {
        code,
        has_top_level_await,
        source_map,
        logical_url,
    })
}

/// Wrap transformed statements in the loadable factory form.
///
/// The sync form takes `(require, module, exports, requireAsyncWrapper)`;
/// the async form routes the body through `requireAsyncWrapper` so literal
/// requires are pre-resolved before the body runs.
#[must_use]
pub fn wrap_factory(code: &str, has_top_level_await: bool) -> String {
    if has_top_level_await {
        format!(
            "function (require, module, exports, requireAsyncWrapper) {{\nreturn requireAsyncWrapper(async () => {{\n{code}\n}});\n}}"
        )
    } else {
        format!("function (require, module, exports, requireAsyncWrapper) {{\n{code}\n}}")
    }
}

/// Logical URL for a module path, e.g. `app://host/scripts/util.ts`.
#[must_use]
pub fn logical_source_url(prefix: &str, path: &str) -> String {
    format!("{}{}", prefix, path.trim_start_matches('/'))
}

/// Rewrite the map's `sources` and `file` entries to the logical URL.
fn patch_source_map(mut map: Value, logical_url: &str) -> Value {
    if let Some(obj) = map.as_object_mut() {
        if let Some(sources) = obj.get_mut("sources").and_then(Value::as_array_mut) {
            for entry in sources {
                *entry = Value::String(logical_url.to_string());
            }
        }
        obj.insert("file".to_string(), Value::String(logical_url.to_string()));
    }
    map
}

/// Detect a top-level `await` expression.
///
/// Lexical scan of the program body: comments, strings, and templates are
/// skipped; `function`, `class`, and arrow bodies are tracked so awaits
/// nested in them do not count. Best-effort on exotic one-liners (an
/// expression-bodied arrow suppresses awaits only to the end of its
/// statement), which matches how the loader is actually fed by transpilers.
#[must_use]
pub fn has_top_level_await(source: &str) -> bool {
    let chars: Vec<char> = source.chars().collect();
    let len = chars.len();
    let mut i = 0;
    let mut depth: u32 = 0;
    // Brace depths at which a function or class body opened.
    let mut body_depths: Vec<u32> = Vec::new();
    let mut pending_body: Option<PendingBody> = None;
    let mut last_sig = '\0';

    while i < len {
        let c = chars[i];

        if c == '/' && i + 1 < len && chars[i + 1] == '/' {
            while i < len && chars[i] != '\n' {
                i += 1;
            }
            continue;
        }
        if c == '/' && i + 1 < len && chars[i + 1] == '*' {
            i += 2;
            while i + 1 < len && !(chars[i] == '*' && chars[i + 1] == '/') {
                i += 1;
            }
            i += 2;
            continue;
        }
        if c == '"' || c == '\'' || c == '`' {
            i = skip_string(&chars, i);
            last_sig = c;
            continue;
        }

        if c == '{' {
            depth += 1;
            if let Some(kind) = pending_body {
                let is_body = match kind {
                    // Function body follows the parameter list's `)`.
                    PendingBody::Function => last_sig == ')',
                    // Class body follows the class name or extends clause.
                    PendingBody::Class => last_sig != '(' && last_sig != ',',
                };
                if is_body {
                    body_depths.push(depth);
                    pending_body = None;
                }
            }
            last_sig = c;
            i += 1;
            continue;
        }
        if c == '}' {
            if body_depths.last() == Some(&depth) {
                body_depths.pop();
            }
            depth = depth.saturating_sub(1);
            last_sig = c;
            i += 1;
            continue;
        }

        if c == '=' && i + 1 < len && chars[i + 1] == '>' {
            pending_body = None;
            i += 2;
            let after = skip_light_whitespace(&chars, i);
            if after < len && chars[after] == '{' {
                depth += 1;
                body_depths.push(depth);
                i = after + 1;
                last_sig = '{';
                // Find the matching close through normal scanning; mark that
                // this depth belongs to a function body.
                continue;
            }
            // Expression-bodied arrow: suppress awaits to end of statement.
            while i < len && chars[i] != ';' && chars[i] != '\n' {
                if chars[i] == '"' || chars[i] == '\'' || chars[i] == '`' {
                    i = skip_string(&chars, i);
                    continue;
                }
                i += 1;
            }
            continue;
        }

        if c.is_ascii_alphabetic() || c == '_' || c == '$' {
            let start = i;
            while i < len && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '$') {
                i += 1;
            }
            let word: String = chars[start..i].iter().collect();
            match word.as_str() {
                "function" => pending_body = Some(PendingBody::Function),
                "class" => pending_body = Some(PendingBody::Class),
                // Covers `async f() {}` method shorthand, which has no
                // `function` keyword; the `{` still follows a `)`.
                "async" => pending_body = Some(PendingBody::Function),
                "await" => {
                    if body_depths.is_empty() {
                        return true;
                    }
                }
                _ => {}
            }
            last_sig = chars[i - 1];
            continue;
        }

        if c == ';' {
            // No function or class header contains one; a flag still set
            // here belonged to a finished statement.
            pending_body = None;
        }
        if !c.is_whitespace() {
            last_sig = c;
        }
        i += 1;
    }

    false
}

#[derive(Clone, Copy)]
enum PendingBody {
    Function,
    Class,
}

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

fn skip_light_whitespace(chars: &[char], mut i: usize) -> usize {
    while i < chars.len() && chars[i].is_whitespace() {
        i += 1;
    }
    i
}
