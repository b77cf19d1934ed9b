//! Per-seed config rendering
//!
//! Template files carry `{{name}}` placeholders. The directory builder passes
//! the current parameter values (and the seed index) as explicit bindings.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{DirectoryError, TemplateError};

/// Placeholder name -> rendered value
pub type Bindings = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateFile {
    pub name: String,
    pub body: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigTemplate {
    pub files: Vec<TemplateFile>,
}

impl ConfigTemplate {
    pub fn new(files: Vec<TemplateFile>) -> Self {
        Self { files }
    }

    /// Read template files from disk, keeping their file names
    pub fn load(paths: &[PathBuf]) -> Result<Self, DirectoryError> {
        let files = paths
            .iter()
            .map(|path| {
                let body = fs::read_to_string(path).map_err(|e| DirectoryError::io(path, e))?;
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.display().to_string());
                Ok(TemplateFile { name, body })
            })
            .collect::<Result<Vec<_>, DirectoryError>>()?;
        Ok(Self { files })
    }

    pub fn render(&self, bindings: &Bindings) -> Result<Vec<(String, String)>, TemplateError> {
        self.files
            .iter()
            .map(|file| Ok((file.name.clone(), render_str(&file.name, &file.body, bindings)?)))
            .collect()
    }

    /// Render every file into `dir`
    pub fn write_to(&self, dir: &Path, bindings: &Bindings) -> Result<(), DirectoryError> {
        for (name, content) in self.render(bindings)? {
            let path = dir.join(name);
            fs::write(&path, content).map_err(|e| DirectoryError::io(&path, e))?;
        }
        Ok(())
    }
}

fn render_str(file: &str, body: &str, bindings: &Bindings) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(body.len());
    let mut rest = body;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after.find("}}").ok_or_else(|| TemplateError::Unterminated {
            file: file.to_string(),
        })?;
        let name = after[..end].trim();
        let value = bindings.get(name).ok_or_else(|| TemplateError::Unbound {
            file: file.to_string(),
            name: name.to_string(),
        })?;
        out.push_str(value);
        rest = &after[end + 2..];
    }
    out.push_str(rest);
    Ok(out)
}
