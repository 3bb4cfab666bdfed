//! Build options and the frozen configuration derived from them.
//!
//! [`Options`] is what a caller fills in. [`NodeTasks::new`](crate::NodeTasks::new)
//! turns it into a [`Config`], resolving every derived path exactly once.
//! Nothing mutates the configuration after that point.

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;

use camino::{Utf8Path, Utf8PathBuf};

use crate::error::ConfigError;

/// Environment variable overriding the default generated folder.
pub const PARAM_GENERATED_DIR: &str = "TSUMIKI_GENERATED_DIR";
/// Environment variable overriding the default frontend directory.
pub const PARAM_FRONTEND_DIR: &str = "TSUMIKI_FRONTEND_DIR";

pub const DEFAULT_GENERATED_DIR: &str = "target/frontend";
pub const DEFAULT_FRONTEND_DIR: &str = "frontend";

/// Folder (relative to the npm folder) receiving the bootstrap files.
pub const TARGET: &str = "target";

pub const IMPORTS_NAME: &str = "generated-imports.js";
pub const FALLBACK_IMPORTS_NAME: &str = "generated-imports-fallback.js";
pub const PACKAGE_JSON: &str = "package.json";
pub const WEBPACK_CONFIG: &str = "webpack.config.js";
pub const WEBPACK_GENERATED: &str = "webpack.generated.js";
pub const INDEX_HTML: &str = "index.html";
pub const INDEX_TS: &str = "index.ts";
pub const INDEX_JS: &str = "index.js";
pub const TSCONFIG_JSON: &str = "tsconfig.json";
pub const TS_DEFINITIONS: &str = "types.d.ts";
pub const NODE_MODULES: &str = "node_modules";

/// Key/value data destined for the token file, shared with the caller so it
/// can read back what the pipeline recorded.
pub type TokenData = Rc<RefCell<serde_json::Map<String, serde_json::Value>>>;

/// Every option recognized by the pipeline.
///
/// Construct with [`Options::new`] and override fields with struct update
/// syntax:
///
/// ```rust
/// use tsumiki::Options;
///
/// let options = Options {
///     enable_imports_update: true,
///     enable_packages_update: true,
///     ..Options::new("/project")
/// };
/// ```
#[derive(Debug, Clone)]
pub struct Options {
    /// Folder holding the main `package.json`.
    pub npm_folder: Utf8PathBuf,
    /// Folder for generated files. Defaults to `TSUMIKI_GENERATED_DIR` or
    /// `target/frontend`, relative to `npm_folder`.
    pub generated_folder: Option<Utf8PathBuf>,
    /// Folder with the project's own frontend sources. Defaults to
    /// `TSUMIKI_FRONTEND_DIR` or `frontend`, relative to `npm_folder`.
    pub frontend_directory: Option<Utf8PathBuf>,
    /// Where webpack writes its build output.
    pub webpack_output_directory: Option<Utf8PathBuf>,
    /// Template used to create `webpack.config.js` when it doesn't exist.
    pub webpack_template: Option<String>,
    /// Template used to regenerate `webpack.generated.js`.
    pub webpack_generated_template: Option<String>,
    pub enable_packages_update: bool,
    pub create_missing_package_json: bool,
    /// Also forces `create_missing_package_json`.
    pub enable_imports_update: bool,
    pub run_npm_install: bool,
    /// Jars (or exploded class directories) to copy frontend resources from.
    pub jar_files: Option<BTreeSet<Utf8PathBuf>>,
    pub generate_embeddable_web_components: bool,
    /// Always wipe `node_modules` and lock files during package updates.
    pub clean_npm_files: bool,
    /// Destination of copied frontend resources.
    pub resources_folder: Option<Utf8PathBuf>,
    /// Project-local overrides copied on top of the jar resources.
    pub local_resources_folder: Option<Utf8PathBuf>,
    pub use_byte_code_scanner: bool,
    pub token_file: Option<Utf8PathBuf>,
    pub token_file_data: Option<TokenData>,
    pub enable_pnpm: bool,
    pub connect_java_source_folder: Option<Utf8PathBuf>,
    pub connect_generated_open_api_file: Option<Utf8PathBuf>,
    pub connect_application_properties: Option<Utf8PathBuf>,
    pub connect_client_ts_api_folder: Option<Utf8PathBuf>,
    /// Only accept a package manager installed under `~/.tsumiki/node`.
    pub require_home_node_exec: bool,
    /// Skip the client-side bootstrap files altogether.
    pub use_deprecated_v14_bootstrapping: bool,
}

impl Options {
    pub fn new(npm_folder: impl Into<Utf8PathBuf>) -> Self {
        Self {
            npm_folder: npm_folder.into(),
            generated_folder: None,
            frontend_directory: None,
            webpack_output_directory: None,
            webpack_template: None,
            webpack_generated_template: None,
            enable_packages_update: false,
            create_missing_package_json: false,
            enable_imports_update: false,
            run_npm_install: false,
            jar_files: None,
            generate_embeddable_web_components: true,
            clean_npm_files: false,
            resources_folder: None,
            local_resources_folder: None,
            use_byte_code_scanner: false,
            token_file: None,
            token_file_data: None,
            enable_pnpm: false,
            connect_java_source_folder: None,
            connect_generated_open_api_file: None,
            connect_application_properties: None,
            connect_client_ts_api_folder: None,
            require_home_node_exec: false,
            use_deprecated_v14_bootstrapping: false,
        }
    }
}

/// The resolved, read-only configuration of one pipeline.
#[derive(Debug, Clone)]
pub struct Config {
    pub npm_folder: Utf8PathBuf,
    pub generated_folder: Utf8PathBuf,
    pub frontend_directory: Utf8PathBuf,
    pub webpack_output_directory: Option<Utf8PathBuf>,
    pub webpack_template: Option<String>,
    pub webpack_generated_template: Option<String>,
    pub enable_packages_update: bool,
    pub create_missing_package_json: bool,
    pub enable_imports_update: bool,
    pub run_npm_install: bool,
    pub jar_files: Option<BTreeSet<Utf8PathBuf>>,
    pub generate_embeddable_web_components: bool,
    pub clean_npm_files: bool,
    pub resources_folder: Option<Utf8PathBuf>,
    pub local_resources_folder: Option<Utf8PathBuf>,
    pub use_byte_code_scanner: bool,
    pub token_file: Option<Utf8PathBuf>,
    pub token_file_data: Option<TokenData>,
    pub enable_pnpm: bool,
    pub connect_java_source_folder: Option<Utf8PathBuf>,
    pub connect_generated_open_api_file: Option<Utf8PathBuf>,
    pub connect_application_properties: Option<Utf8PathBuf>,
    pub connect_client_ts_api_folder: Option<Utf8PathBuf>,
    pub require_home_node_exec: bool,
    pub use_deprecated_v14_bootstrapping: bool,
}

impl Config {
    pub(crate) fn resolve(options: Options) -> Result<Self, ConfigError> {
        let npm_folder = if options.npm_folder.is_absolute() {
            options.npm_folder
        } else {
            let cwd = std::env::current_dir().map_err(ConfigError::WorkingDirectory)?;
            Utf8PathBuf::try_from(cwd)?.join(options.npm_folder)
        };

        let generated_folder = options
            .generated_folder
            .unwrap_or_else(|| default_dir(PARAM_GENERATED_DIR, DEFAULT_GENERATED_DIR));
        let frontend_directory = options
            .frontend_directory
            .unwrap_or_else(|| default_dir(PARAM_FRONTEND_DIR, DEFAULT_FRONTEND_DIR));

        let resources_folder = options
            .resources_folder
            .map(|path| against(&npm_folder, path));

        if options.jar_files.is_some() && resources_folder.is_none() {
            return Err(ConfigError::MissingResourcesFolder);
        }

        let webpack_template = options.webpack_template.filter(|t| !t.trim().is_empty());
        if let (Some(template), None) = (&webpack_template, &options.webpack_output_directory) {
            return Err(ConfigError::MissingWebpackOutput(template.clone()));
        }

        Ok(Self {
            generated_folder: against(&npm_folder, generated_folder),
            frontend_directory: against(&npm_folder, frontend_directory),
            webpack_output_directory: options.webpack_output_directory,
            webpack_template,
            webpack_generated_template: options
                .webpack_generated_template
                .filter(|t| !t.trim().is_empty()),
            enable_packages_update: options.enable_packages_update,
            create_missing_package_json: options.create_missing_package_json
                || options.enable_imports_update,
            enable_imports_update: options.enable_imports_update,
            run_npm_install: options.run_npm_install,
            jar_files: options.jar_files,
            generate_embeddable_web_components: options.generate_embeddable_web_components,
            clean_npm_files: options.clean_npm_files,
            resources_folder,
            local_resources_folder: options
                .local_resources_folder
                .map(|path| against(&npm_folder, path)),
            use_byte_code_scanner: options.use_byte_code_scanner,
            token_file: options.token_file.map(|path| against(&npm_folder, path)),
            token_file_data: options.token_file_data,
            enable_pnpm: options.enable_pnpm,
            connect_java_source_folder: options
                .connect_java_source_folder
                .map(|path| against(&npm_folder, path)),
            connect_generated_open_api_file: options
                .connect_generated_open_api_file
                .map(|path| against(&npm_folder, path)),
            connect_application_properties: options
                .connect_application_properties
                .map(|path| against(&npm_folder, path)),
            connect_client_ts_api_folder: options
                .connect_client_ts_api_folder
                .map(|path| against(&npm_folder, path)),
            require_home_node_exec: options.require_home_node_exec,
            use_deprecated_v14_bootstrapping: options.use_deprecated_v14_bootstrapping,
            npm_folder,
        })
    }

    /// The generated imports file, whether or not it exists yet.
    pub fn imports_file(&self) -> Utf8PathBuf {
        self.generated_folder.join(IMPORTS_NAME)
    }

    /// Folder receiving `index.html` and `index.ts` when the project has none.
    pub fn bootstrap_folder(&self) -> Utf8PathBuf {
        self.npm_folder.join(TARGET)
    }
}

fn default_dir(var: &str, fallback: &str) -> Utf8PathBuf {
    std::env::var(var)
        .ok()
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| fallback.to_string())
        .into()
}

fn against(base: &Utf8Path, path: Utf8PathBuf) -> Utf8PathBuf {
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}
