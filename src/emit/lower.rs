//! Module lowering
//!
//! Rewrites ES module syntax in transformed module code to the bundle
//! runtime's require/register form, and rewires every import specifier to
//! the resolved module key so inter-chunk references survive emission.
//! A regex-level rewrite, paired with the regex-level import extraction
//! in the resolver: what one finds, the other rewrites.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::graph::ImportKind;

/// One import to rewrite: the specifier as written and the module key it
/// resolved to
pub struct ImportBinding {
    pub specifier: String,
    pub key: String,
    pub kind: ImportKind,
}

static EXPORT_DEFAULT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"export\s+default\s+").unwrap());
static EXPORT_DECL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"export\s+(const|let|var)\s+(\w+)").unwrap());
static EXPORT_FUNCTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"export\s+function\s+(\w+)").unwrap());
static EXPORT_CLASS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"export\s+class\s+(\w+)").unwrap());
static EXPORT_LOCAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"export\s*\{([^}]*)\}\s*;?").unwrap());

/// Lower one module's code to runtime-registered form
pub fn lower_module(code: &str, imports: &[ImportBinding]) -> String {
    let mut out = code.to_string();

    for import in imports {
        out = rewrite_import(&out, import);
    }

    out = EXPORT_DEFAULT.replace_all(&out, "module.exports = ").into_owned();
    out = EXPORT_DECL
        .replace_all(&out, "$1 $2 = module.exports.$2")
        .into_owned();
    out = EXPORT_FUNCTION
        .replace_all(&out, "module.exports.$1 = function $1")
        .into_owned();
    out = EXPORT_CLASS
        .replace_all(&out, "module.exports.$1 = class $1")
        .into_owned();
    out = EXPORT_LOCAL
        .replace_all(&out, |caps: &regex::Captures| {
            export_assignments(&caps[1])
        })
        .into_owned();

    out
}

fn rewrite_import(code: &str, import: &ImportBinding) -> String {
    let spec = regex::escape(&import.specifier);
    let require = format!("__tangram_require__({:?})", import.key);

    if import.kind == ImportKind::Dynamic {
        let dynamic = Regex::new(&format!(r#"import\s*\(\s*["']{spec}["']\s*\)"#))
            .expect("escaped specifier");
        return dynamic
            .replace_all(code, format!("__tangram_import__({:?})", import.key).as_str())
            .into_owned();
    }

    let mut out = code.to_string();

    // import * as ns from 'spec'
    let namespace = Regex::new(&format!(
        r#"import\s+\*\s+as\s+(\w+)\s+from\s+["']{spec}["']\s*;?"#
    ))
    .expect("escaped specifier");
    out = namespace
        .replace_all(&out, format!("const $1 = {require};").as_str())
        .into_owned();

    // import def, { a, b as c } from 'spec'
    let default_and_named = Regex::new(&format!(
        r#"import\s+(\w+)\s*,\s*\{{([^}}]*)\}}\s*from\s+["']{spec}["']\s*;?"#
    ))
    .expect("escaped specifier");
    out = default_and_named
        .replace_all(&out, |caps: &regex::Captures| {
            format!(
                "const {} = {require}; const {{ {} }} = {require};",
                &caps[1],
                destructure_bindings(&caps[2])
            )
        })
        .into_owned();

    // import { a, b as c } from 'spec'
    let named = Regex::new(&format!(
        r#"import\s+\{{([^}}]*)\}}\s*from\s+["']{spec}["']\s*;?"#
    ))
    .expect("escaped specifier");
    out = named
        .replace_all(&out, |caps: &regex::Captures| {
            format!("const {{ {} }} = {require};", destructure_bindings(&caps[1]))
        })
        .into_owned();

    // import def from 'spec'
    let default_only = Regex::new(&format!(
        r#"import\s+(\w+)\s+from\s+["']{spec}["']\s*;?"#
    ))
    .expect("escaped specifier");
    out = default_only
        .replace_all(&out, format!("const $1 = {require};").as_str())
        .into_owned();

    // import 'spec' (side effects only)
    let bare = Regex::new(&format!(r#"import\s+["']{spec}["']\s*;?"#))
        .expect("escaped specifier");
    out = bare.replace_all(&out, format!("{require};").as_str()).into_owned();

    // export { a, b as c } from 'spec'
    let reexport = Regex::new(&format!(
        r#"export\s*\{{([^}}]*)\}}\s*from\s+["']{spec}["']\s*;?"#
    ))
    .expect("escaped specifier");
    out = reexport
        .replace_all(&out, |caps: &regex::Captures| {
            reexport_assignments(&caps[1], &require)
        })
        .into_owned();

    // require('spec')
    let cjs = Regex::new(&format!(r#"require\s*\(\s*["']{spec}["']\s*\)"#))
        .expect("escaped specifier");
    out = cjs.replace_all(&out, require.as_str()).into_owned();

    out
}

/// `a, b as c` -> `a, b: c` for destructuring
fn destructure_bindings(bindings: &str) -> String {
    bindings
        .split(',')
        .map(str::trim)
        .filter(|b| !b.is_empty())
        .map(|binding| match binding.split_once(" as ") {
            Some((from, to)) => format!("{}: {}", from.trim(), to.trim()),
            None => binding.to_string(),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// `a, b as c` -> `module.exports.a = a; module.exports.c = b;` assignments
fn export_assignments(bindings: &str) -> String {
    bindings
        .split(',')
        .map(str::trim)
        .filter(|b| !b.is_empty())
        .map(|binding| match binding.split_once(" as ") {
            Some((local, exported)) => {
                format!("module.exports.{} = {};", exported.trim(), local.trim())
            }
            None => format!("module.exports.{binding} = {binding};"),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// `a, b as c` from another module -> assignments off a required namespace
fn reexport_assignments(bindings: &str, require: &str) -> String {
    let assignments = bindings
        .split(',')
        .map(str::trim)
        .filter(|b| !b.is_empty())
        .map(|binding| match binding.split_once(" as ") {
            Some((from, to)) => format!("module.exports.{} = __m.{};", to.trim(), from.trim()),
            None => format!("module.exports.{binding} = __m.{binding};"),
        })
        .collect::<Vec<_>>()
        .join(" ");
    format!("(function () {{ var __m = {require}; {assignments} }})();")
}
