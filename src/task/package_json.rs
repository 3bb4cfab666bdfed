use std::rc::Rc;

use camino::Utf8Path;
use serde_json::{Map, Value, json};
use tracing::info;

use crate::config::{Config, PACKAGE_JSON};
use crate::error::TaskError;
use crate::io::{read_json_object, relativize, write_json};
use crate::task::{Command, TaskKind};

/// Package holding the dependencies collected from the classpath.
pub(crate) const APP_DEPS: &str = "@tsumiki/app-deps";
/// Package holding the frontend resources copied out of jars.
pub(crate) const FRONTEND_RESOURCES: &str = "@tsumiki/frontend-resources";

/// Creates the package manifests the package manager needs and links the
/// generated packages into the project's own `package.json`.
pub(crate) struct GeneratePackageJson {
    config: Rc<Config>,
}

impl GeneratePackageJson {
    pub fn new(config: Rc<Config>) -> Self {
        Self { config }
    }

    fn main_package(&self) -> Result<(), TaskError> {
        let npm = &self.config.npm_folder;
        let path = npm.join(PACKAGE_JSON);

        let mut package = match read_json_object(&path)? {
            Some(package) => package,
            None => {
                info!("Creating {path}");
                skeleton("no-name")
            }
        };

        let mut links = vec![(APP_DEPS, local_link(npm, &self.config.generated_folder))];
        if let Some(resources) = &self.config.resources_folder {
            links.push((FRONTEND_RESOURCES, local_link(npm, resources)));
        }

        let dependencies = dependencies_of(&mut package);
        for (name, link) in links {
            if !dependencies.contains_key(name) {
                info!("Adding {name} to {path}");
                dependencies.insert(name.to_string(), Value::String(link));
            }
        }

        write_json(&path, &package)?;
        Ok(())
    }
}

impl Command for GeneratePackageJson {
    fn kind(&self) -> TaskKind {
        TaskKind::GeneratePackageJson
    }

    fn execute(&self) -> Result<(), TaskError> {
        self.main_package()?;

        create_if_missing(&self.config.generated_folder.join(PACKAGE_JSON), APP_DEPS)?;
        if let Some(resources) = &self.config.resources_folder {
            create_if_missing(&resources.join(PACKAGE_JSON), FRONTEND_RESOURCES)?;
        }

        Ok(())
    }
}

/// Minimal package manifest with empty dependency tables.
pub(crate) fn skeleton(name: &str) -> Map<String, Value> {
    let value = json!({
        "name": name,
        "license": "UNLICENSED",
        "dependencies": {},
        "devDependencies": {},
    });

    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// The `dependencies` table, replacing anything that isn't an object.
pub(crate) fn dependencies_of(package: &mut Map<String, Value>) -> &mut Map<String, Value> {
    let entry = package
        .entry("dependencies")
        .or_insert_with(|| Value::Object(Map::new()));

    if !entry.is_object() {
        *entry = Value::Object(Map::new());
    }

    match entry {
        Value::Object(map) => map,
        _ => unreachable!("dependencies was just made an object"),
    }
}

fn create_if_missing(path: &Utf8Path, name: &str) -> Result<(), TaskError> {
    if path.exists() {
        return Ok(());
    }

    info!("Creating {path}");
    let mut package = skeleton(name);
    package.insert("version".into(), Value::String("1.0.0".into()));
    write_json(path, &package)?;
    Ok(())
}

/// A `./`-prefixed path usable as an npm local dependency.
fn local_link(npm: &Utf8Path, target: &Utf8Path) -> String {
    let path = relativize(npm, target);
    if path.starts_with("../") {
        path
    } else {
        format!("./{path}")
    }
}
