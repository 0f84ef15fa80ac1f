//! Built-in expression functions.
//!
//! Function names are case-insensitive. The status functions
//! (`success`/`failure`/`always`/`cancelled`) are registered as hooks that
//! error until a job status tracker exists to back them.

use std::collections::{BTreeSet, HashMap};
use std::fs::File;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use super::value::{JsType, JsValue};
use super::ExprError;

/// A built-in callable.
pub type BuiltinFn = fn(&[JsValue]) -> Result<JsValue, ExprError>;

/// Case-insensitive registry of expression functions.
pub struct Functions {
    map: HashMap<String, BuiltinFn>,
}

impl Functions {
    /// The standard table: the eight documented functions plus status hooks.
    pub fn standard() -> Self {
        let mut fns = Functions { map: HashMap::new() };
        fns.add("contains", func_contains);
        fns.add("startsWith", func_starts_with);
        fns.add("endsWith", func_ends_with);
        fns.add("format", func_format);
        fns.add("join", func_join);
        fns.add("toJSON", func_to_json);
        fns.add("fromJSON", func_from_json);
        fns.add("hashFiles", func_hash_files);
        fns.add("success", func_unimplemented);
        fns.add("failure", func_unimplemented);
        fns.add("always", func_unimplemented);
        fns.add("cancelled", func_unimplemented);
        fns
    }

    pub fn add(&mut self, name: &str, f: BuiltinFn) {
        self.map.insert(name.to_lowercase(), f);
    }

    pub fn get(&self, name: &str) -> Option<BuiltinFn> {
        self.map.get(&name.to_lowercase()).copied()
    }
}

fn func_unimplemented(_args: &[JsValue]) -> Result<JsValue, ExprError> {
    Err(ExprError::Eval("function is not implemented".to_string()))
}

/// Cast a value to its string form:
/// `null`/`undefined` are empty, booleans are `true`/`false`, integers are
/// decimal, floats use exponential form for very large or very small
/// magnitudes, and arrays/objects are not convertible.
pub fn cast_to_string(value: &JsValue) -> Result<String, ExprError> {
    match value {
        JsValue::Null | JsValue::Undefined => Ok(String::new()),
        JsValue::Bool(b) => Ok(if *b { "true" } else { "false" }.to_string()),
        JsValue::String(s) => Ok(s.clone()),
        JsValue::Int(i) => Ok(i.to_string()),
        JsValue::Float(f) => {
            let f = *f;
            if f != 0.0 && (f.abs() >= 1e15 || f.abs() < 1e-4) {
                Ok(format!("{f:e}"))
            } else {
                Ok(f.to_string())
            }
        }
        JsValue::Array(_) => Err(ExprError::Cast(JsType::Array)),
        JsValue::Object(_) => Err(ExprError::Cast(JsType::Object)),
    }
}

/// Structural equality used by `contains` on arrays; strings compare
/// case-insensitively, mixed types never match.
fn values_equal(a: &JsValue, b: &JsValue) -> bool {
    match (a, b) {
        (JsValue::Null, JsValue::Null) | (JsValue::Undefined, JsValue::Undefined) => true,
        (JsValue::Bool(l), JsValue::Bool(r)) => l == r,
        (JsValue::String(l), JsValue::String(r)) => l.eq_ignore_ascii_case(r),
        (JsValue::Int(l), JsValue::Int(r)) => l == r,
        (JsValue::Float(l), JsValue::Float(r)) => l == r,
        _ => false,
    }
}

fn require_args(name: &str, args: &[JsValue], min: usize) -> Result<(), ExprError> {
    if args.len() < min {
        return Err(ExprError::Eval(format!(
            "{name} requires at least {min} argument{}, got {}",
            if min == 1 { "" } else { "s" },
            args.len()
        )));
    }
    Ok(())
}

fn func_contains(args: &[JsValue]) -> Result<JsValue, ExprError> {
    require_args("contains", args, 2)?;
    let (search, item) = (&args[0], &args[1]);

    if let JsValue::Array(elems) = search {
        let item_str = cast_to_string(item);
        for elem in elems {
            if values_equal(elem, item) {
                return Ok(JsValue::Bool(true));
            }
            if let (Ok(e), Ok(i)) = (cast_to_string(elem), item_str.as_ref()) {
                if e.eq_ignore_ascii_case(i) {
                    return Ok(JsValue::Bool(true));
                }
            }
        }
        return Ok(JsValue::Bool(false));
    }

    let search = cast_to_string(search)?.to_lowercase();
    let item = cast_to_string(item)?.to_lowercase();
    Ok(JsValue::Bool(search.contains(&item)))
}

fn func_starts_with(args: &[JsValue]) -> Result<JsValue, ExprError> {
    require_args("startsWith", args, 2)?;
    let s = cast_to_string(&args[0])?.to_lowercase();
    let prefix = cast_to_string(&args[1])?.to_lowercase();
    Ok(JsValue::Bool(s.starts_with(&prefix)))
}

fn func_ends_with(args: &[JsValue]) -> Result<JsValue, ExprError> {
    require_args("endsWith", args, 2)?;
    let s = cast_to_string(&args[0])?.to_lowercase();
    let suffix = cast_to_string(&args[1])?.to_lowercase();
    Ok(JsValue::Bool(s.ends_with(&suffix)))
}

fn func_format(args: &[JsValue]) -> Result<JsValue, ExprError> {
    require_args("format", args, 2)?;
    const OPEN_BRACE: &str = "\u{0}open-brace\u{0}";
    const CLOSE_BRACE: &str = "\u{0}close-brace\u{0}";

    let format_str = cast_to_string(&args[0])?;
    let mut result = format_str.replace("{{", OPEN_BRACE).replace("}}", CLOSE_BRACE);

    for (i, arg) in args[1..].iter().enumerate() {
        let placeholder = format!("{{{i}}}");
        let replacement = cast_to_string(arg)?;
        result = result.replace(&placeholder, &replacement);
    }

    let result = result.replace(OPEN_BRACE, "{").replace(CLOSE_BRACE, "}");
    Ok(JsValue::String(result))
}

fn func_join(args: &[JsValue]) -> Result<JsValue, ExprError> {
    require_args("join", args, 1)?;

    let separator = if args.len() >= 2 {
        cast_to_string(&args[1])?
    } else {
        ",".to_string()
    };

    let JsValue::Array(elems) = &args[0] else {
        // a scalar joins to its own string cast
        return Ok(JsValue::String(cast_to_string(&args[0])?));
    };

    let mut parts = Vec::with_capacity(elems.len());
    for elem in elems {
        parts.push(cast_to_string(elem)?);
    }
    Ok(JsValue::String(parts.join(&separator)))
}

fn func_to_json(args: &[JsValue]) -> Result<JsValue, ExprError> {
    require_args("toJSON", args, 1)?;
    Ok(JsValue::String(args[0].to_json_pretty()))
}

fn func_from_json(args: &[JsValue]) -> Result<JsValue, ExprError> {
    require_args("fromJSON", args, 1)?;
    let raw = cast_to_string(&args[0])?;
    let parsed: serde_json::Value = serde_json::from_str(&raw)
        .map_err(|e| ExprError::Eval(format!("fromJSON: failed to parse JSON: {e}")))?;
    Ok(JsValue::from_json(&parsed))
}

fn func_hash_files(args: &[JsValue]) -> Result<JsValue, ExprError> {
    require_args("hashFiles", args, 1)?;

    let workspace = match std::env::var("GITHUB_WORKSPACE") {
        Ok(ws) if !ws.is_empty() => PathBuf::from(ws),
        _ => std::env::current_dir()
            .map_err(|e| ExprError::Eval(format!("hashFiles: cannot determine workspace: {e}")))?,
    };

    let mut patterns = Vec::with_capacity(args.len());
    for arg in args {
        patterns.push(cast_to_string(arg)?);
    }

    let digest = hash_files(&workspace, &patterns)?;
    Ok(JsValue::String(digest))
}

/// Hash the set of regular files under `workspace` matching `patterns`.
///
/// Patterns starting with `!` exclude. `**` is recursive, `*` matches within
/// one path segment, `?` matches one non-`/` character. Matching files are
/// sorted by path, each file is SHA-256 hashed, and the concatenation of the
/// digests is hashed again. No matches yields an empty string.
pub fn hash_files(workspace: &Path, patterns: &[String]) -> Result<String, ExprError> {
    let mut included: BTreeSet<PathBuf> = BTreeSet::new();
    let mut excluded: BTreeSet<PathBuf> = BTreeSet::new();

    for pattern in patterns {
        let (is_exclusion, pattern) = match pattern.strip_prefix('!') {
            Some(rest) => (true, rest),
            None => (false, pattern.as_str()),
        };
        let pattern = pattern.trim_start_matches('/');
        let re = regex::Regex::new(&glob_to_regex(pattern))
            .map_err(|e| ExprError::Eval(format!("hashFiles: invalid pattern '{pattern}': {e}")))?;

        for entry in walkdir::WalkDir::new(workspace)
            .into_iter()
            .filter_map(Result::ok)
        {
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(rel) = entry.path().strip_prefix(workspace) else {
                continue;
            };
            let rel = rel.to_string_lossy().replace('\\', "/");
            if re.is_match(&rel) {
                if is_exclusion {
                    excluded.insert(entry.path().to_path_buf());
                } else {
                    included.insert(entry.path().to_path_buf());
                }
            }
        }
    }

    let files: Vec<&PathBuf> = included.iter().filter(|f| !excluded.contains(*f)).collect();
    if files.is_empty() {
        return Ok(String::new());
    }

    let mut combined = Sha256::new();
    for file in files {
        let mut hasher = Sha256::new();
        let mut f = File::open(file).map_err(|e| {
            ExprError::Eval(format!("hashFiles: cannot open {}: {e}", file.display()))
        })?;
        std::io::copy(&mut f, &mut hasher).map_err(|e| {
            ExprError::Eval(format!("hashFiles: cannot read {}: {e}", file.display()))
        })?;
        combined.update(hasher.finalize());
    }

    Ok(format!("{:x}", combined.finalize()))
}

/// Translate a glob pattern to an anchored regex over slash-separated
/// relative paths.
fn glob_to_regex(glob: &str) -> String {
    let mut out = String::from("^");
    let bytes = glob.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'*' => {
                if bytes.get(i + 1) == Some(&b'*') {
                    if bytes.get(i + 2) == Some(&b'/') {
                        out.push_str("(?:.*/)?");
                        i += 3;
                    } else {
                        out.push_str(".*");
                        i += 2;
                    }
                    continue;
                }
                out.push_str("[^/]*");
            }
            b'?' => out.push_str("[^/]"),
            c @ (b'.' | b'+' | b'^' | b'$' | b'(' | b')' | b'[' | b']' | b'{' | b'}' | b'|'
            | b'\\') => {
                out.push('\\');
                out.push(c as char);
            }
            c => out.push(c as char),
        }
        i += 1;
    }
    out.push('$');
    out
}
