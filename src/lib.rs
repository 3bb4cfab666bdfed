#![forbid(unsafe_code)]
#![doc = include_str!("../README.md")]

mod config;
mod error;
mod finder;
mod io;
#[cfg(feature = "logging")]
mod logging;
mod manifest;
mod pipeline;
mod process;
pub mod scanner;
pub mod task;
mod template;
#[cfg(test)]
mod testing;

pub use crate::config::{
    DEFAULT_FRONTEND_DIR, DEFAULT_GENERATED_DIR, Config, Options, PARAM_FRONTEND_DIR,
    PARAM_GENERATED_DIR, TokenData,
};
pub use crate::error::*;
pub use crate::finder::{Annotation, CachedClassFinder, ClassFinder};
pub use crate::io::relativize;
#[cfg(feature = "logging")]
pub use crate::logging::init_logging;
pub use crate::manifest::{CssImport, DependencyManifest, ThemeDefinition};
pub use crate::pipeline::NodeTasks;
pub use crate::process::{PackageManager, ProcessOutput, ProcessRunner, SystemRunner};
pub use crate::task::{Command, TaskKind};
pub use crate::template::Template;
