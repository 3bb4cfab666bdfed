use camino::Utf8PathBuf;
use thiserror::Error;

pub use anyhow::Error as RuntimeError;

use crate::task::TaskKind;

#[derive(Debug, Error)]
pub enum TsumikiError {
    #[error("Invalid build configuration.\n{0}")]
    Config(#[from] ConfigError),

    #[error("Error while scanning frontend dependencies.\n{0}")]
    Scan(#[from] ScanError),

    #[error("Task '{0}':\n{1}")]
    Task(TaskKind, TaskError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Jar files were given to copy but no resources folder is configured")]
    MissingResourcesFolder,

    #[error("Webpack template '{0}' is configured without a webpack output directory")]
    MissingWebpackOutput(String),

    #[error("Couldn't determine the working directory.\n{0}")]
    WorkingDirectory(std::io::Error),

    #[error("Couldn't convert path to UTF-8.\n{0}")]
    PathFormat(#[from] camino::FromPathBufError),
}

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Class finder query '{0}' failed.\n{1}")]
    Finder(String, RuntimeError),

    #[error("Multiple themes are declared: '{0}' and '{1}'")]
    ThemeConflict(String, String),
}

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("Template '{0}' is neither a resource nor a valid URL")]
    NotFound(String),

    #[error("Couldn't read template from '{0}'.\n{1}")]
    Read(Utf8PathBuf, std::io::Error),

    #[error("Remote templates are not supported in this build: '{0}'")]
    RemoteDisabled(String),

    #[cfg(feature = "remote-templates")]
    #[error("Couldn't fetch template from '{0}'.\n{1}")]
    Http(String, Box<ureq::Error>),

    #[cfg(feature = "remote-templates")]
    #[error("Couldn't read response body from '{0}'.\n{1}")]
    Body(String, std::io::Error),
}

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("Couldn't read '{0}'.\n{1}")]
    Read(Utf8PathBuf, std::io::Error),

    #[error("Couldn't write '{0}'.\n{1}")]
    Write(Utf8PathBuf, std::io::Error),

    #[error("Couldn't remove '{0}'.\n{1}")]
    Remove(Utf8PathBuf, std::io::Error),

    #[error("Malformed JSON in '{0}'.\n{1}")]
    Json(Utf8PathBuf, serde_json::Error),

    #[error("Expected a JSON object in '{0}'")]
    NotAnObject(Utf8PathBuf),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error("Couldn't read archive '{0}'.\n{1}")]
    Archive(Utf8PathBuf, zip::result::ZipError),

    #[error("Couldn't walk directory.\n{0}")]
    Walk(#[from] walkdir::Error),

    #[error("Couldn't compile glob pattern.\n{0}")]
    GlobPattern(#[from] glob::PatternError),

    #[error("Couldn't run glob.\n{0}")]
    Glob(#[from] glob::GlobError),

    #[error("Couldn't convert path to UTF-8.\n{0}")]
    PathFormat(#[from] camino::FromPathBufError),

    #[error("Couldn't start '{0}'.\n{1}")]
    Spawn(String, std::io::Error),

    #[error("Web component tag '{tag}' of '{exporter}' is not a valid file name")]
    InvalidTag { exporter: String, tag: String },

    #[error("Command '{command}' failed with {status}.\n{output}")]
    Process {
        command: String,
        status: String,
        output: String,
    },

    #[error("Executable '{0}' not found")]
    ExecutableNotFound(Utf8PathBuf),

    #[error("Home directory is not available")]
    NoHomeDirectory,
}
