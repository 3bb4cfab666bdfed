//! Frontend dependency discovery.
//!
//! Two strategies turn the classpath into a [`DependencyManifest`]:
//!
//! * [`ScanStrategy::Full`] asks the [`ClassFinder`] for every class carrying
//!   one of the dependency annotations, reachable or not.
//! * [`ScanStrategy::ByteCode`] starts at the application entry points (routes,
//!   the app shell, web component exporters) and follows the class references
//!   found in compiled method bodies, so only classes that can actually be
//!   instantiated contribute.
//!
//! Both produce the same manifest shape; the rest of the pipeline doesn't
//! know which one ran.

mod bytecode;
mod full;

use tracing::warn;

use crate::error::{RuntimeError, ScanError};
use crate::finder::{Annotation, ClassFinder};
use crate::manifest::{CssImport, DependencyManifest, ThemeDefinition};

pub const JS_MODULE: &str = "JsModule";
pub const JAVASCRIPT: &str = "JavaScript";
pub const CSS_IMPORT: &str = "CssImport";
pub const NPM_PACKAGE: &str = "NpmPackage";
pub const THEME: &str = "Theme";
pub const ROUTE: &str = "Route";
pub const TAG: &str = "Tag";
pub const APP_SHELL: &str = "AppShellConfigurator";
pub const WEB_COMPONENT_EXPORTER: &str = "WebComponentExporter";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanStrategy {
    Full,
    ByteCode,
}

impl ScanStrategy {
    pub fn new(use_byte_code_scanner: bool) -> Self {
        if use_byte_code_scanner {
            Self::ByteCode
        } else {
            Self::Full
        }
    }
}

/// Scans the classpath with the chosen strategy.
///
/// With `embeddable` set, web component exporters are collected and, for the
/// byte-code strategy, treated as entry points.
pub fn scan(
    strategy: ScanStrategy,
    finder: &dyn ClassFinder,
    embeddable: bool,
) -> Result<DependencyManifest, ScanError> {
    let mut collector = Collector::default();

    match strategy {
        ScanStrategy::Full => full::scan(finder, &mut collector)?,
        ScanStrategy::ByteCode => bytecode::scan(finder, embeddable, &mut collector)?,
    }

    if embeddable {
        collector.manifest.exporters = query(WEB_COMPONENT_EXPORTER, || {
            finder.subtypes_of(WEB_COMPONENT_EXPORTER)
        })?;
    }

    Ok(collector.manifest)
}

/// Accumulates annotation values into a manifest.
#[derive(Default)]
struct Collector {
    manifest: DependencyManifest,
}

impl Collector {
    fn visit(&mut self, class: &str, annotations: &[Annotation]) {
        for annotation in annotations {
            match annotation.name.as_str() {
                JS_MODULE => {
                    if let Some(value) = annotation.value() {
                        self.manifest.add_module(value);
                    }
                }
                JAVASCRIPT => {
                    if let Some(value) = annotation.value() {
                        self.manifest.add_script(value);
                    }
                }
                CSS_IMPORT => {
                    if let Some(value) = annotation.value() {
                        self.manifest.add_css(CssImport {
                            value: value.to_string(),
                            include: annotation.get("include").map(str::to_string),
                            theme_for: annotation.get("themeFor").map(str::to_string),
                            id: annotation.get("id").map(str::to_string),
                        });
                    }
                }
                NPM_PACKAGE => {
                    let (Some(name), Some(version)) =
                        (annotation.value(), annotation.get("version"))
                    else {
                        warn!(class, "NpmPackage without a name or version, ignoring");
                        continue;
                    };

                    if let Some(kept) = self.manifest.add_package(name, version) {
                        warn!(
                            class,
                            "package {name} requested in version {version}, keeping {kept}"
                        );
                    }
                }
                _ => {}
            }
        }
    }

    fn theme(&mut self, annotations: &[Annotation]) -> Result<(), ScanError> {
        let Some(theme) = annotations.iter().find(|a| a.name == THEME) else {
            return Ok(());
        };
        let Some(class) = theme.value() else {
            return Ok(());
        };

        let found = ThemeDefinition {
            class: class.to_string(),
            variant: theme.get("variant").unwrap_or_default().to_string(),
        };

        match &self.manifest.theme {
            Some(existing) if existing.class != found.class => Err(ScanError::ThemeConflict(
                existing.class.clone(),
                found.class,
            )),
            Some(_) => Ok(()),
            None => {
                self.manifest.theme = Some(found);
                Ok(())
            }
        }
    }
}

/// Runs a finder query, tagging a failure with the query name.
fn query<T>(
    name: &str,
    f: impl FnOnce() -> Result<T, RuntimeError>,
) -> Result<T, ScanError> {
    f().map_err(|err| ScanError::Finder(name.to_string(), err))
}
