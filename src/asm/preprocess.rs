//! Textual macro and conditional expansion.
//!
//! Produces a flat stream of logical lines: comments stripped from `;`,
//! blanks dropped, `#include` expanded in place, `#define` recorded and
//! substituted, `#ifdef`/`#ifndef`/`#endif` gating emission on the
//! conjunction of the open conditions.

use std::collections::BTreeMap;
use std::path::Path;

#[derive(thiserror::Error, Debug)]
pub enum PreprocessError {
    #[error("cannot read include `{path}`: {source}")]
    UnreadableInclude {
        path: String,
        source: std::io::Error,
    },
    #[error("malformed directive: `{line}`")]
    MalformedDirective { line: String },
    #[error("unmatched #endif")]
    UnmatchedEndif,
    #[error("{depth} conditional(s) left open at end of input")]
    UnterminatedConditional { depth: usize },
}

#[derive(Default)]
pub struct Preprocessor {
    // BTreeMap keeps substitution order deterministic across runs.
    defines: BTreeMap<String, String>,
    conditions: Vec<bool>,
}

impl Preprocessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define(&mut self, name: &str, replacement: &str) {
        self.defines.insert(name.into(), replacement.into());
    }

    /// Preprocesses a whole file, resolving includes relative to its
    /// directory.
    pub fn preprocess_file(&mut self, path: impl AsRef<Path>) -> Result<Vec<String>, PreprocessError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| {
            PreprocessError::UnreadableInclude {
                path: path.display().to_string(),
                source,
            }
        })?;
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let lines = self.process(&source, dir)?;
        self.check_balanced()?;
        Ok(lines)
    }

    pub fn preprocess(&mut self, source: &str, include_dir: &Path) -> Result<Vec<String>, PreprocessError> {
        let lines = self.process(source, include_dir)?;
        self.check_balanced()?;
        Ok(lines)
    }

    fn check_balanced(&self) -> Result<(), PreprocessError> {
        if self.conditions.is_empty() {
            Ok(())
        } else {
            Err(PreprocessError::UnterminatedConditional {
                depth: self.conditions.len(),
            })
        }
    }

    fn active(&self) -> bool {
        self.conditions.iter().all(|&c| c)
    }

    fn process(&mut self, source: &str, include_dir: &Path) -> Result<Vec<String>, PreprocessError> {
        let mut out = Vec::new();
        for raw in source.lines() {
            let line = raw.split(';').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }

            if let Some(rest) = line.strip_prefix("#ifdef") {
                let name = single_name(rest, line)?;
                self.conditions.push(self.defines.contains_key(&name));
                continue;
            }
            if let Some(rest) = line.strip_prefix("#ifndef") {
                let name = single_name(rest, line)?;
                self.conditions.push(!self.defines.contains_key(&name));
                continue;
            }
            if line.starts_with("#endif") {
                self.conditions.pop().ok_or(PreprocessError::UnmatchedEndif)?;
                continue;
            }
            if !self.active() {
                continue;
            }

            if let Some(rest) = line.strip_prefix("#define") {
                let mut parts = rest.split_whitespace();
                let name = parts.next().ok_or_else(|| PreprocessError::MalformedDirective {
                    line: line.into(),
                })?;
                let replacement = parts.collect::<Vec<_>>().join(" ");
                self.defines.insert(name.to_string(), replacement);
                continue;
            }
            if let Some(rest) = line.strip_prefix("#include") {
                let quoted = rest.trim();
                let path = quoted
                    .strip_prefix('"')
                    .and_then(|p| p.strip_suffix('"'))
                    .ok_or_else(|| PreprocessError::MalformedDirective { line: line.into() })?;
                let full = include_dir.join(path);
                let source = std::fs::read_to_string(&full).map_err(|source| {
                    PreprocessError::UnreadableInclude {
                        path: full.display().to_string(),
                        source,
                    }
                })?;
                let dir = full.parent().unwrap_or(include_dir).to_path_buf();
                out.extend(self.process(&source, &dir)?);
                continue;
            }
            if line.starts_with('#') {
                return Err(PreprocessError::MalformedDirective { line: line.into() });
            }

            let mut expanded = line.to_string();
            for (name, replacement) in &self.defines {
                if expanded.contains(name.as_str()) {
                    expanded = expanded.replace(name.as_str(), replacement);
                }
            }
            out.push(expanded);
        }
        Ok(out)
    }
}

fn single_name(rest: &str, line: &str) -> Result<String, PreprocessError> {
    let mut parts = rest.split_whitespace();
    match (parts.next(), parts.next()) {
        (Some(name), None) => Ok(name.to_string()),
        _ => Err(PreprocessError::MalformedDirective { line: line.into() }),
    }
}
