use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

/// A stylesheet pulled in by a `CssImport` annotation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct CssImport {
    pub value: String,
    pub include: Option<String>,
    pub theme_for: Option<String>,
    pub id: Option<String>,
}

impl CssImport {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            include: None,
            theme_for: None,
            id: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThemeDefinition {
    /// The theme class named by the `Theme` annotation.
    pub class: String,
    /// Theme variant applied to the document, possibly empty.
    pub variant: String,
}

/// Everything the server-side component tree requires from the frontend.
///
/// Ordered collections keep discovery order and never hold duplicates, so the
/// generated imports file is stable between runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DependencyManifest {
    /// npm package name to version.
    pub packages: BTreeMap<String, String>,
    /// JS module imports.
    pub modules: Vec<String>,
    /// Plain script imports.
    pub scripts: Vec<String>,
    pub css: Vec<CssImport>,
    pub theme: Option<ThemeDefinition>,
    /// Classes exporting embeddable web components.
    pub exporters: BTreeSet<String>,
}

impl DependencyManifest {
    pub fn add_module(&mut self, module: impl Into<String>) {
        push_unique(&mut self.modules, module.into());
    }

    pub fn add_script(&mut self, script: impl Into<String>) {
        push_unique(&mut self.scripts, script.into());
    }

    pub fn add_css(&mut self, css: CssImport) {
        push_unique(&mut self.css, css);
    }

    /// Registers an npm package. The first version seen wins; a conflicting
    /// later version is returned so the caller can report it.
    pub fn add_package(&mut self, name: &str, version: &str) -> Option<String> {
        match self.packages.get(name) {
            Some(existing) if existing != version => Some(existing.clone()),
            Some(_) => None,
            None => {
                self.packages.insert(name.to_string(), version.to_string());
                None
            }
        }
    }

    /// Entries present in `self` but absent from `primary`.
    pub fn difference(&self, primary: &DependencyManifest) -> DependencyManifest {
        let mut rest = DependencyManifest::default();

        for module in &self.modules {
            if !primary.modules.contains(module) {
                rest.add_module(module.clone());
            }
        }

        for script in &self.scripts {
            if !primary.scripts.contains(script) {
                rest.add_script(script.clone());
            }
        }

        for css in &self.css {
            if !primary.css.contains(css) {
                rest.add_css(css.clone());
            }
        }

        rest
    }
}

fn push_unique<T: PartialEq>(items: &mut Vec<T>, item: T) {
    if !items.contains(&item) {
        items.push(item);
    }
}
