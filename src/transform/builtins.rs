//! Built-in transforms
//!
//! The set of transforms the configuration can name: TypeScript type
//! stripping, stylesheet normalization, JSON wrapping, and asset inlining.

use std::path::Path;
use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use lightningcss::stylesheet::{ParserOptions, PrinterOptions, StyleSheet};

use super::{Transform, TransformContext};
use crate::graph::ModuleSource;

/// Look up a built-in transform by its configuration name
pub fn builtin_transform(name: &str) -> Option<Arc<dyn Transform>> {
    match name {
        "typescript" => Some(Arc::new(TypeScriptTransform)),
        "css" => Some(Arc::new(CssTransform)),
        "json" => Some(Arc::new(JsonTransform)),
        "inline-assets" => Some(Arc::new(InlineAssetsTransform)),
        _ => None,
    }
}

fn expect_text(source: ModuleSource, what: &str) -> Result<String, String> {
    match source {
        ModuleSource::Text(text) => Ok(text),
        ModuleSource::Binary(_) => Err(format!("{what} module is not text")),
    }
}

/// Strips TypeScript type annotations, leaving plain JavaScript.
///
/// A lexical pass, not a parser: it tracks strings and template literals
/// and removes annotation-shaped syntax (`: Type`, `interface`/`type`
/// declarations, `as Type` casts).
struct TypeScriptTransform;

impl Transform for TypeScriptTransform {
    fn name(&self) -> &'static str {
        "typescript"
    }

    fn apply(
        &self,
        source: ModuleSource,
        _path: &Path,
        _ctx: &TransformContext,
    ) -> Result<ModuleSource, String> {
        let text = expect_text(source, "script")?;
        Ok(ModuleSource::Text(strip_types(&text)))
    }
}

fn strip_types(source: &str) -> String {
    let mut result = String::with_capacity(source.len());
    let mut chars = source.chars().peekable();
    let mut in_string = false;
    let mut string_char = '"';
    let mut in_template = false;

    while let Some(c) = chars.next() {
        // String literals
        if !in_template && (c == '"' || c == '\'') {
            if !in_string {
                in_string = true;
                string_char = c;
            } else if string_char == c {
                in_string = false;
            }
            result.push(c);
            continue;
        }

        // Template literals
        if c == '`' {
            in_template = !in_template;
            result.push(c);
            continue;
        }

        if in_string || in_template {
            result.push(c);
            continue;
        }

        // Annotations after colons
        if c == ':' {
            let rest: String = chars.clone().take(50).collect();
            if rest.starts_with(' ') {
                let trimmed = rest.trim_start();
                let type_like = trimmed.starts_with("string")
                    || trimmed.starts_with("number")
                    || trimmed.starts_with("boolean")
                    || trimmed.starts_with("any")
                    || trimmed.starts_with("void")
                    || trimmed.starts_with("never")
                    || trimmed.starts_with("unknown")
                    || trimmed.starts_with("null")
                    || trimmed.starts_with("undefined")
                    || trimmed.starts_with("Array<")
                    || trimmed.starts_with("Promise<")
                    || trimmed.starts_with("Record<")
                    || trimmed.starts_with("Map<")
                    || trimmed.starts_with("Set<")
                    || trimmed.chars().next().map(|c| c.is_uppercase()).unwrap_or(false);

                if type_like {
                    // Consume until the annotation ends at depth zero
                    let mut depth = 0;
                    while let Some(&next) = chars.peek() {
                        if next == '<' || next == '(' || next == '[' {
                            depth += 1;
                            chars.next();
                        } else if next == '>' || next == ']' {
                            depth -= 1;
                            chars.next();
                        } else if next == ')' {
                            if depth == 0 {
                                break;
                            }
                            depth -= 1;
                            chars.next();
                        } else if depth == 0
                            && (next == '=' || next == ',' || next == '{' || next == ';' || next == '\n')
                        {
                            break;
                        } else {
                            chars.next();
                        }
                    }
                    continue;
                }
            }
        }

        // interface declarations: drop the whole block
        if c == 'i' {
            let rest: String = std::iter::once(c).chain(chars.clone().take(10)).collect();
            if rest.starts_with("interface ") {
                while let Some(nc) = chars.next() {
                    if nc == '{' {
                        let mut depth = 1;
                        while depth > 0 {
                            match chars.next() {
                                Some('{') => depth += 1,
                                Some('}') => depth -= 1,
                                Some(_) => {}
                                None => break,
                            }
                        }
                        break;
                    }
                }
                continue;
            }
        }

        // type aliases: drop to end of statement
        if c == 't' {
            let rest: String = std::iter::once(c).chain(chars.clone().take(5)).collect();
            if rest.starts_with("type ") {
                for nc in chars.by_ref() {
                    if nc == ';' || nc == '\n' {
                        break;
                    }
                }
                continue;
            }
        }

        // `as Type` casts
        if c == ' ' {
            let rest: String = chars.clone().take(3).collect();
            if rest == "as " {
                for _ in 0..3 {
                    chars.next();
                }
                let mut depth = 0;
                while let Some(&next) = chars.peek() {
                    if next == '<' || next == '(' {
                        depth += 1;
                        chars.next();
                    } else if next == '>' {
                        depth -= 1;
                        chars.next();
                    } else if next == ')' {
                        if depth == 0 {
                            break;
                        }
                        depth -= 1;
                        chars.next();
                    } else if depth == 0
                        && (next.is_whitespace() || next == ',' || next == ';' || next == '}')
                    {
                        break;
                    } else {
                        chars.next();
                    }
                }
                result.push(' ');
                continue;
            }
        }

        result.push(c);
    }

    result
}

/// Parses and reserializes stylesheets through lightningcss.
///
/// Catches syntax errors early and normalizes output; minification is a
/// post-emit concern.
struct CssTransform;

impl Transform for CssTransform {
    fn name(&self) -> &'static str {
        "css"
    }

    fn apply(
        &self,
        source: ModuleSource,
        path: &Path,
        _ctx: &TransformContext,
    ) -> Result<ModuleSource, String> {
        let text = expect_text(source, "stylesheet")?;

        let sheet = StyleSheet::parse(
            &text,
            ParserOptions {
                filename: path.display().to_string(),
                ..ParserOptions::default()
            },
        )
        .map_err(|e| e.to_string())?;

        let output = sheet
            .to_css(PrinterOptions::default())
            .map_err(|e| e.to_string())?;

        Ok(ModuleSource::Text(output.code))
    }
}

/// Validates JSON and wraps it as a script module
struct JsonTransform;

impl Transform for JsonTransform {
    fn name(&self) -> &'static str {
        "json"
    }

    fn apply(
        &self,
        source: ModuleSource,
        _path: &Path,
        _ctx: &TransformContext,
    ) -> Result<ModuleSource, String> {
        let text = expect_text(source, "json")?;

        serde_json::from_str::<serde_json::Value>(&text)
            .map_err(|e| format!("invalid JSON: {e}"))?;

        Ok(ModuleSource::Text(format!("module.exports = {};", text.trim_end())))
    }
}

/// Inlines small binary assets as base64 data-URI modules.
///
/// Assets above the configured limit pass through and are emitted as
/// standalone files.
struct InlineAssetsTransform;

impl Transform for InlineAssetsTransform {
    fn name(&self) -> &'static str {
        "inline-assets"
    }

    fn apply(
        &self,
        source: ModuleSource,
        path: &Path,
        ctx: &TransformContext,
    ) -> Result<ModuleSource, String> {
        let bytes = match source {
            ModuleSource::Binary(bytes) => bytes,
            text @ ModuleSource::Text(_) => return Ok(text),
        };

        if bytes.len() > ctx.inline_limit {
            return Ok(ModuleSource::Binary(bytes));
        }

        let mime = match path.extension().and_then(|e| e.to_str()) {
            Some("png") => "image/png",
            Some("jpg") | Some("jpeg") => "image/jpeg",
            Some("gif") => "image/gif",
            _ => "application/octet-stream",
        };

        let encoded = BASE64.encode(&bytes);
        Ok(ModuleSource::Text(format!(
            "module.exports = \"data:{mime};base64,{encoded}\";"
        )))
    }
}
