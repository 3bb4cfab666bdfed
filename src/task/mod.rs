//! The closed set of build steps.
//!
//! Every step implements [`Command`]. Steps that only materialize a template
//! when the destination is missing implement the narrower [`ClientGenerator`]
//! instead and get [`Command`] through the blanket implementation below.

mod bootstrap;
mod connect;
mod copy;
mod imports;
mod install;
mod openapi;
mod package_json;
mod packages;
mod web_components;
mod webpack;

use std::cell::Cell;
use std::fmt::Display;
use std::rc::Rc;

use camino::Utf8PathBuf;
use tracing::info;

use crate::error::TaskError;
use crate::finder::ClassFinder;
use crate::io::write_if_changed;
use crate::template::Template;

pub(crate) use bootstrap::{IndexHtml, IndexTs, TsConfig, TsDefinitions};
pub(crate) use connect::GenerateConnect;
pub(crate) use copy::{CopyFrontendFiles, CopyLocalFrontendFiles};
pub(crate) use imports::UpdateImports;
pub(crate) use install::RunNpmInstall;
pub(crate) use openapi::GenerateOpenApi;
pub(crate) use package_json::GeneratePackageJson;
pub(crate) use packages::UpdatePackages;
pub(crate) use web_components::GenerateWebComponents;
pub(crate) use webpack::UpdateWebpack;

/// Identifies a build step in errors, logs and assembled task lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    GenerateWebComponents,
    GeneratePackageJson,
    GenerateIndexHtml,
    GenerateIndexTs,
    GenerateTsConfig,
    GenerateTsDefinitions,
    GenerateOpenApi,
    GenerateConnect,
    UpdatePackages,
    RunNpmInstall,
    CopyFrontendFiles,
    CopyLocalFrontendFiles,
    UpdateWebpack,
    UpdateImports,
}

impl TaskKind {
    /// The four steps producing the client-side bootstrap files.
    pub const BOOTSTRAP: [TaskKind; 4] = [
        TaskKind::GenerateIndexHtml,
        TaskKind::GenerateIndexTs,
        TaskKind::GenerateTsConfig,
        TaskKind::GenerateTsDefinitions,
    ];
}

impl Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}

/// A single side-effecting build step.
pub trait Command {
    fn kind(&self) -> TaskKind;
    fn execute(&self) -> Result<(), TaskError>;
}

/// A step that renders one template into a file it doesn't own afterwards.
///
/// The destination is only written when [`should_generate`] says so, which by
/// default means the file doesn't exist yet.
///
/// [`should_generate`]: ClientGenerator::should_generate
pub trait ClientGenerator {
    const KIND: TaskKind;

    fn finder(&self) -> &dyn ClassFinder;

    /// Template identifier, see [`Template::resolve`].
    fn template(&self) -> &str;

    fn destination(&self) -> Utf8PathBuf;

    fn should_generate(&self) -> bool {
        !self.destination().exists()
    }

    fn tokens(&self) -> Vec<(&'static str, String)> {
        Vec::new()
    }
}

// Bridges the two traits, the same way for every generator.
impl<T: ClientGenerator> Command for T {
    fn kind(&self) -> TaskKind {
        T::KIND
    }

    fn execute(&self) -> Result<(), TaskError> {
        let destination = self.destination();

        if !self.should_generate() {
            info!("{destination} already exists, skipping");
            return Ok(());
        }

        render_into(self.finder(), self.template(), &destination, &self.tokens())?;
        Ok(())
    }
}

/// Resolves a template, substitutes `tokens` and writes the result if it
/// differs from what's on disk.
pub(crate) fn render_into(
    finder: &dyn ClassFinder,
    template: &str,
    destination: &camino::Utf8Path,
    tokens: &[(&'static str, String)],
) -> Result<bool, TaskError> {
    let template = Template::resolve(finder, template)?;
    let tokens: Vec<(&str, &str)> = tokens
        .iter()
        .map(|(token, value)| (*token, value.as_str()))
        .collect();

    let written = write_if_changed(destination, template.render(&tokens))?;
    if written {
        info!("Wrote {destination} from {}", template.origin);
    }

    Ok(written)
}

/// A JS string literal holding `value`, quoted and escaped.
pub(crate) fn js_string(value: &str) -> String {
    serde_json::Value::from(value).to_string()
}

/// Whether the package update step changed anything. The install step reads
/// it to decide whether to run at all.
#[derive(Debug, Clone, Default)]
pub struct PackagesOutcome(Rc<Cell<bool>>);

impl PackagesOutcome {
    pub fn mark_modified(&self) {
        self.0.set(true);
    }

    pub fn modified(&self) -> bool {
        self.0.get()
    }
}
