use std::rc::Rc;

use serde_json::{Map, Value};
use tracing::info;

use crate::config::{Config, NODE_MODULES, PACKAGE_JSON};
use crate::error::TaskError;
use crate::io::{read_json_object, remove, write_json};
use crate::manifest::DependencyManifest;
use crate::process::PackageManager;
use crate::task::package_json::{APP_DEPS, dependencies_of, skeleton};
use crate::task::{Command, PackagesOutcome, TaskKind};

/// Key of the section this crate owns inside the generated `package.json`.
const OWN_KEY: &str = "tsumiki";

/// Brings the generated package's dependencies in line with the classpath.
pub(crate) struct UpdatePackages {
    config: Rc<Config>,
    manifest: Rc<DependencyManifest>,
    outcome: PackagesOutcome,
}

impl UpdatePackages {
    pub fn new(config: Rc<Config>, manifest: Rc<DependencyManifest>, outcome: PackagesOutcome) -> Self {
        Self {
            config,
            manifest,
            outcome,
        }
    }

    fn manager(&self) -> PackageManager {
        PackageManager::new(self.config.enable_pnpm)
    }

    /// Wipes installed modules and every lock file so the next install starts
    /// from scratch.
    fn clean(&self) -> Result<(), TaskError> {
        let npm = &self.config.npm_folder;
        let manager = self.manager();

        for path in [
            npm.join(NODE_MODULES),
            npm.join(manager.lock_file()),
            npm.join(manager.foreign_lock_file()),
        ] {
            if remove(&path)? {
                info!("Removed {path}");
            }
        }

        Ok(())
    }
}

impl Command for UpdatePackages {
    fn kind(&self) -> TaskKind {
        TaskKind::UpdatePackages
    }

    fn execute(&self) -> Result<(), TaskError> {
        let path = self.config.generated_folder.join(PACKAGE_JSON);
        let mut package = match read_json_object(&path)? {
            Some(package) => package,
            None => {
                let mut package = skeleton(APP_DEPS);
                package.insert("version".into(), Value::String("1.0.0".into()));
                package
            }
        };

        let wanted: Map<String, Value> = self
            .manifest
            .packages
            .iter()
            .map(|(name, version)| (name.clone(), Value::String(version.clone())))
            .collect();

        let current = dependencies_of(&mut package);
        let removed: Vec<String> = current
            .keys()
            .filter(|name| !wanted.contains_key(*name))
            .cloned()
            .collect();
        let changed = *current != wanted;
        *current = wanted;

        let hash = dependency_hash(current);
        let own = package
            .entry(OWN_KEY)
            .or_insert_with(|| Value::Object(Map::new()));
        if !own.is_object() {
            *own = Value::Object(Map::new());
        }
        if let Value::Object(own) = own {
            own.insert("hash".into(), Value::String(hash));
        }

        if write_json(&path, &package)? {
            info!("Updated dependencies in {path}");
        }

        if changed {
            self.outcome.mark_modified();
        }

        let foreign = self.config.npm_folder.join(self.manager().foreign_lock_file());
        if !removed.is_empty() || self.config.clean_npm_files || foreign.exists() {
            if !removed.is_empty() {
                info!("Dependencies removed: {}", removed.join(", "));
            }
            self.clean()?;
            self.outcome.mark_modified();
        }

        Ok(())
    }
}

/// Stable digest of a dependency table.
fn dependency_hash(dependencies: &Map<String, Value>) -> String {
    let mut hasher = blake3::Hasher::new();
    for (name, version) in dependencies {
        hasher.update(name.as_bytes());
        hasher.update(b"\0");
        hasher.update(version.as_str().unwrap_or_default().as_bytes());
        hasher.update(b"\n");
    }
    hasher.finalize().to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use std::fs;

    use camino::Utf8Path;

    use super::*;
    use crate::config::Options;
    use crate::testing::scratch;

    fn task(root: &Utf8Path, packages: &[(&str, &str)], clean: bool) -> (UpdatePackages, PackagesOutcome) {
        let options = Options {
            clean_npm_files: clean,
            ..Options::new(root)
        };
        let mut manifest = DependencyManifest::default();
        for (name, version) in packages {
            manifest.add_package(name, version);
        }

        let outcome = PackagesOutcome::default();
        let task = UpdatePackages::new(
            Rc::new(Config::resolve(options).unwrap()),
            Rc::new(manifest),
            outcome.clone(),
        );
        (task, outcome)
    }

    fn generated(root: &Utf8Path) -> Map<String, Value> {
        read_json_object(&root.join("target/frontend/package.json"))
            .unwrap()
            .unwrap()
    }

    #[test]
    fn test_new_dependencies_mark_modified() {
        let (_dir, root) = scratch();
        let (task, outcome) = task(&root, &[("lit", "3.1.0")], false);

        task.execute().unwrap();
        assert!(outcome.modified());

        let package = generated(&root);
        assert_eq!(package["dependencies"]["lit"], "3.1.0");
        assert_eq!(package[OWN_KEY]["hash"].as_str().unwrap().len(), 64);
    }

    #[test]
    fn test_unchanged_dependencies_are_not_modified() {
        let (_dir, root) = scratch();
        task(&root, &[("lit", "3.1.0")], false).0.execute().unwrap();

        let (again, outcome) = task(&root, &[("lit", "3.1.0")], false);
        again.execute().unwrap();
        assert!(!outcome.modified());
    }

    #[test]
    fn test_removed_dependency_cleans_node_modules() {
        let (_dir, root) = scratch();
        task(&root, &[("lit", "3.1.0"), ("dayjs", "1.11.0")], false)
            .0
            .execute()
            .unwrap();

        fs::create_dir_all(root.join("node_modules/lit")).unwrap();
        fs::write(root.join("package-lock.json"), "{}").unwrap();

        let (again, outcome) = task(&root, &[("lit", "3.1.0")], false);
        again.execute().unwrap();

        assert!(outcome.modified());
        assert!(!root.join("node_modules").exists());
        assert!(!root.join("package-lock.json").exists());
        assert!(generated(&root)["dependencies"].get("dayjs").is_none());
    }

    #[test]
    fn test_foreign_lock_file_forces_clean() {
        let (_dir, root) = scratch();
        task(&root, &[], false).0.execute().unwrap();
        fs::write(root.join("pnpm-lock.yaml"), "lockfileVersion: 5").unwrap();

        let (again, outcome) = task(&root, &[], false);
        again.execute().unwrap();

        assert!(outcome.modified());
        assert!(!root.join("pnpm-lock.yaml").exists());
    }
}
