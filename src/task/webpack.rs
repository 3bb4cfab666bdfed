use std::rc::Rc;

use camino::Utf8PathBuf;
use tracing::info;

use crate::config::{Config, INDEX_HTML, INDEX_JS, INDEX_TS, WEBPACK_CONFIG, WEBPACK_GENERATED};
use crate::error::TaskError;
use crate::finder::ClassFinder;
use crate::io::relativize;
use crate::task::{Command, TaskKind, render_into};

/// Creates `webpack.config.js` once and keeps `webpack.generated.js` in sync
/// with the current configuration.
pub(crate) struct UpdateWebpack {
    finder: Rc<dyn ClassFinder>,
    config: Rc<Config>,
    template: String,
    output: Utf8PathBuf,
}

impl UpdateWebpack {
    pub fn new(
        finder: Rc<dyn ClassFinder>,
        config: Rc<Config>,
        template: String,
        output: Utf8PathBuf,
    ) -> Self {
        Self {
            finder,
            config,
            template,
            output,
        }
    }

    /// The project's entry file if it has one, the generated one otherwise.
    fn entry(&self, candidates: &[&str], generated: &str) -> Utf8PathBuf {
        candidates
            .iter()
            .map(|name| self.config.frontend_directory.join(name))
            .find(|path| path.exists())
            .unwrap_or_else(|| self.config.bootstrap_folder().join(generated))
    }

    fn tokens(&self) -> Vec<(&'static str, String)> {
        let npm = &self.config.npm_folder;
        let output = if self.output.is_absolute() {
            self.output.clone()
        } else {
            npm.join(&self.output)
        };

        vec![
            ("{{OUTPUT_DIRECTORY}}", relativize(npm, &output)),
            ("{{GENERATED_IMPORTS}}", relativize(npm, &self.config.imports_file())),
            ("{{FRONTEND_DIRECTORY}}", relativize(npm, &self.config.frontend_directory)),
            (
                "{{USE_CLIENT_SIDE_BOOTSTRAP}}",
                (!self.config.use_deprecated_v14_bootstrapping).to_string(),
            ),
            ("{{INDEX_HTML}}", relativize(npm, &self.entry(&[INDEX_HTML], INDEX_HTML))),
            ("{{INDEX_TS}}", relativize(npm, &self.entry(&[INDEX_TS, INDEX_JS], INDEX_TS))),
        ]
    }
}

impl Command for UpdateWebpack {
    fn kind(&self) -> TaskKind {
        TaskKind::UpdateWebpack
    }

    fn execute(&self) -> Result<(), TaskError> {
        let tokens = self.tokens();
        let config_file = self.config.npm_folder.join(WEBPACK_CONFIG);

        if config_file.exists() {
            info!("{config_file} already exists, skipping");
        } else {
            render_into(self.finder.as_ref(), &self.template, &config_file, &tokens)?;
        }

        if let Some(generated) = &self.config.webpack_generated_template {
            let generated_file = self.config.npm_folder.join(WEBPACK_GENERATED);
            render_into(self.finder.as_ref(), generated, &generated_file, &tokens)?;
        }

        Ok(())
    }
}
