use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::rc::Rc;

use camino::{Utf8Path, Utf8PathBuf};
use tracing::{info, warn};

use crate::error::{ScanError, TaskError};
use crate::finder::ClassFinder;
use crate::io::remove;
use crate::scanner::TAG;
use crate::task::{Command, TaskKind, render_into};

const TEMPLATE: &str = "web-component.js";
pub(crate) const FOLDER: &str = "web-component";

/// Writes one module per web component exporter, named after its tag.
pub(crate) struct GenerateWebComponents {
    finder: Rc<dyn ClassFinder>,
    exporters: BTreeSet<String>,
    folder: Utf8PathBuf,
}

impl GenerateWebComponents {
    pub fn new(
        finder: Rc<dyn ClassFinder>,
        exporters: BTreeSet<String>,
        generated_folder: &Utf8Path,
    ) -> Self {
        Self {
            finder,
            exporters,
            folder: generated_folder.join(FOLDER),
        }
    }

    fn tag(&self, exporter: &str) -> Result<String, TaskError> {
        let annotations = self
            .finder
            .annotations(exporter)
            .map_err(|e| ScanError::Finder(exporter.to_string(), e))?;

        let explicit = annotations
            .iter()
            .find(|annotation| annotation.name == TAG)
            .and_then(|annotation| annotation.value());

        let tag = match explicit {
            Some(tag) => tag.to_string(),
            None => tag_of(&element_name(exporter)),
        };

        if tag.contains(['/', '\\']) || tag.contains("..") {
            return Err(TaskError::InvalidTag {
                exporter: exporter.to_string(),
                tag,
            });
        }

        Ok(tag)
    }
}

impl Command for GenerateWebComponents {
    fn kind(&self) -> TaskKind {
        TaskKind::GenerateWebComponents
    }

    fn execute(&self) -> Result<(), TaskError> {
        // file name to the exporter that claimed it
        let mut written = BTreeMap::new();

        for exporter in &self.exporters {
            let tag = self.tag(exporter)?;
            let file = format!("{tag}.js");

            if let Some(owner) = written.get(&file) {
                warn!("Exporters {owner} and {exporter} share the tag '{tag}', keeping {owner}");
                continue;
            }

            let tokens = [
                ("{{TAG}}", tag),
                ("{{CLASS_NAME}}", element_name(exporter)),
                ("{{EXPORTER}}", exporter.clone()),
            ];

            render_into(self.finder.as_ref(), TEMPLATE, &self.folder.join(&file), &tokens)?;
            written.insert(file, exporter);
        }

        if let Ok(entries) = fs::read_dir(&self.folder) {
            for entry in entries.flatten() {
                let name = entry.file_name().to_string_lossy().into_owned();
                if name.ends_with(".js") && !written.contains_key(&name) {
                    info!("Removing stale web component {name}");
                    remove(&self.folder.join(&name))?;
                }
            }
        }

        Ok(())
    }
}

/// Simple class name without an `Exporter` suffix, e.g. `LoginFormExporter`
/// becomes `LoginForm`.
fn element_name(class: &str) -> String {
    let simple = class.rsplit(['.', '$']).next().unwrap_or(class);
    match simple.strip_suffix("Exporter") {
        Some(stripped) if !stripped.is_empty() => stripped.to_string(),
        _ => simple.to_string(),
    }
}

/// Kebab-cases a class name. Custom element names need a dash, so a single
/// word gets a `-element` suffix.
fn tag_of(name: &str) -> String {
    let mut tag = String::with_capacity(name.len() + 8);

    for (i, c) in name.chars().enumerate() {
        if c.is_uppercase() {
            if i > 0 {
                tag.push('-');
            }
            tag.extend(c.to_lowercase());
        } else {
            tag.push(c);
        }
    }

    if !tag.contains('-') {
        tag.push_str("-element");
    }

    tag
}
