//! Client-side bootstrap files. All of them are left alone once the project
//! provides its own version.

use std::rc::Rc;

use camino::Utf8PathBuf;

use crate::config::{Config, INDEX_HTML, INDEX_JS, INDEX_TS, TS_DEFINITIONS, TSCONFIG_JSON};
use crate::finder::ClassFinder;
use crate::io::relativize;
use crate::task::{ClientGenerator, TaskKind};

pub(crate) struct IndexHtml {
    finder: Rc<dyn ClassFinder>,
    config: Rc<Config>,
}

impl IndexHtml {
    pub fn new(finder: Rc<dyn ClassFinder>, config: Rc<Config>) -> Self {
        Self { finder, config }
    }
}

impl ClientGenerator for IndexHtml {
    const KIND: TaskKind = TaskKind::GenerateIndexHtml;

    fn finder(&self) -> &dyn ClassFinder {
        self.finder.as_ref()
    }

    fn template(&self) -> &str {
        INDEX_HTML
    }

    fn destination(&self) -> Utf8PathBuf {
        self.config.bootstrap_folder().join(INDEX_HTML)
    }

    fn should_generate(&self) -> bool {
        !self.config.frontend_directory.join(INDEX_HTML).exists()
    }
}

pub(crate) struct IndexTs {
    finder: Rc<dyn ClassFinder>,
    config: Rc<Config>,
    /// Not written yet when this step runs.
    imports: Utf8PathBuf,
}

impl IndexTs {
    pub fn new(finder: Rc<dyn ClassFinder>, config: Rc<Config>, imports: Utf8PathBuf) -> Self {
        Self {
            finder,
            config,
            imports,
        }
    }
}

impl ClientGenerator for IndexTs {
    const KIND: TaskKind = TaskKind::GenerateIndexTs;

    fn finder(&self) -> &dyn ClassFinder {
        self.finder.as_ref()
    }

    fn template(&self) -> &str {
        INDEX_TS
    }

    fn destination(&self) -> Utf8PathBuf {
        self.config.bootstrap_folder().join(INDEX_TS)
    }

    fn should_generate(&self) -> bool {
        let frontend = &self.config.frontend_directory;
        !frontend.join(INDEX_TS).exists() && !frontend.join(INDEX_JS).exists()
    }

    fn tokens(&self) -> Vec<(&'static str, String)> {
        let path = relativize(&self.config.bootstrap_folder(), &self.imports);
        let path = if path.starts_with("../") {
            path
        } else {
            format!("./{path}")
        };

        vec![("{{GENERATED_IMPORTS}}", path)]
    }
}

pub(crate) struct TsConfig {
    finder: Rc<dyn ClassFinder>,
    config: Rc<Config>,
}

impl TsConfig {
    pub fn new(finder: Rc<dyn ClassFinder>, config: Rc<Config>) -> Self {
        Self { finder, config }
    }
}

impl ClientGenerator for TsConfig {
    const KIND: TaskKind = TaskKind::GenerateTsConfig;

    fn finder(&self) -> &dyn ClassFinder {
        self.finder.as_ref()
    }

    fn template(&self) -> &str {
        TSCONFIG_JSON
    }

    fn destination(&self) -> Utf8PathBuf {
        self.config.npm_folder.join(TSCONFIG_JSON)
    }

    fn tokens(&self) -> Vec<(&'static str, String)> {
        let frontend = relativize(&self.config.npm_folder, &self.config.frontend_directory);
        vec![("{{FRONTEND_DIRECTORY}}", frontend)]
    }
}

pub(crate) struct TsDefinitions {
    finder: Rc<dyn ClassFinder>,
    config: Rc<Config>,
}

impl TsDefinitions {
    pub fn new(finder: Rc<dyn ClassFinder>, config: Rc<Config>) -> Self {
        Self { finder, config }
    }
}

impl ClientGenerator for TsDefinitions {
    const KIND: TaskKind = TaskKind::GenerateTsDefinitions;

    fn finder(&self) -> &dyn ClassFinder {
        self.finder.as_ref()
    }

    fn template(&self) -> &str {
        TS_DEFINITIONS
    }

    fn destination(&self) -> Utf8PathBuf {
        self.config.npm_folder.join(TS_DEFINITIONS)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::config::Options;
    use crate::task::Command;
    use crate::testing::{FakeFinder, scratch};

    fn setup(root: &camino::Utf8Path) -> (Rc<dyn ClassFinder>, Rc<Config>) {
        let config = Config::resolve(Options::new(root)).unwrap();
        (Rc::new(FakeFinder::default()), Rc::new(config))
    }

    #[test]
    fn test_index_ts_imports_generated_file_relatively() {
        let (_dir, root) = scratch();
        let (finder, config) = setup(&root);

        let imports = config.imports_file();
        IndexTs::new(finder, config.clone(), imports).execute().unwrap();

        let text = fs::read_to_string(root.join("target/index.ts")).unwrap();
        assert!(text.contains("import './frontend/generated-imports.js';"));
    }

    #[test]
    fn test_index_html_skipped_when_project_has_one() {
        let (_dir, root) = scratch();
        let (finder, config) = setup(&root);
        fs::create_dir_all(root.join("frontend")).unwrap();
        fs::write(root.join("frontend/index.html"), "<mine/>").unwrap();

        IndexHtml::new(finder, config).execute().unwrap();
        assert!(!root.join("target/index.html").exists());
    }

    #[test]
    fn test_tsconfig_is_never_overwritten() {
        let (_dir, root) = scratch();
        let (finder, config) = setup(&root);
        let task = TsConfig::new(finder, config);

        task.execute().unwrap();
        let first = fs::read_to_string(root.join("tsconfig.json")).unwrap();
        assert!(first.contains("\"baseUrl\": \"frontend\""));

        fs::write(root.join("tsconfig.json"), "{}").unwrap();
        task.execute().unwrap();
        assert_eq!(fs::read_to_string(root.join("tsconfig.json")).unwrap(), "{}");
    }

    #[test]
    fn test_generator_is_idempotent() {
        let (_dir, root) = scratch();
        let (finder, config) = setup(&root);
        let task = TsDefinitions::new(finder, config);

        task.execute().unwrap();
        let first = fs::read_to_string(root.join("types.d.ts")).unwrap();
        task.execute().unwrap();
        assert_eq!(fs::read_to_string(root.join("types.d.ts")).unwrap(), first);
        assert_eq!(task.kind(), TaskKind::GenerateTsDefinitions);
    }
}
