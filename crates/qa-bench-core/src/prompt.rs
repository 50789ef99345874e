//! Prompt templates with `{{ name }}` placeholders.
//!
//! Substitution is a single pass over the template: bound values are inserted
//! verbatim and never re-scanned, so a question containing `{{ ... }}` is
//! passed through untouched.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::{Captures, Regex};

use crate::error::{BenchError, Result};

fn placeholder_regex() -> Result<&'static Regex> {
    static PLACEHOLDER: OnceLock<std::result::Result<Regex, regex::Error>> = OnceLock::new();
    PLACEHOLDER
        .get_or_init(|| Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}"))
        .as_ref()
        .map_err(|e| BenchError::Template {
            reason: format!("placeholder pattern failed to compile: {}", e),
        })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    source: String,
}

impl PromptTemplate {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }

    /// Names of all placeholders, in order of first appearance
    pub fn placeholders(&self) -> Result<Vec<&str>> {
        let mut names = Vec::new();
        for caps in placeholder_regex()?.captures_iter(&self.source) {
            if let Some(name) = caps.get(1).map(|m| m.as_str()) {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }
        Ok(names)
    }

    /// Substitute every placeholder; an unbound placeholder is an error.
    pub fn render(&self, bindings: &HashMap<&str, &str>) -> Result<String> {
        if let Some(missing) = self
            .placeholders()?
            .into_iter()
            .find(|name| !bindings.contains_key(name))
        {
            return Err(BenchError::Template {
                reason: format!("no value bound for placeholder '{}'", missing),
            });
        }

        let source = dedent(&self.source);
        let rendered = placeholder_regex()?.replace_all(&source, |caps: &Captures<'_>| {
            bindings.get(&caps[1]).copied().unwrap_or_default().to_string()
        });

        Ok(rendered.into_owned())
    }
}

/// Strip the common leading indentation and surrounding blank lines.
///
/// Templates are written as indented raw strings; the model should not see
/// the source indentation.
fn dedent(text: &str) -> String {
    let indent = text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.len() - line.trim_start().len())
        .min()
        .unwrap_or(0);

    text.lines()
        .map(|line| line.get(indent..).unwrap_or_else(|| line.trim_start()))
        .collect::<Vec<_>>()
        .join("\n")
        .trim_matches('\n')
        .to_string()
}
