use std::fs;
use std::io::ErrorKind;
use std::rc::Rc;
use std::time::Instant;

use camino::Utf8PathBuf;
use tracing::info;

use crate::config::{Config, NODE_MODULES, PACKAGE_JSON};
use crate::error::TaskError;
use crate::io::{as_overhead, write_if_changed};
use crate::process::{PackageManager, ProcessRunner};
use crate::task::{Command, PackagesOutcome, TaskKind};

/// Marker left in `node_modules` after a successful install.
pub(crate) const INSTALL_STAMP: &str = ".tsumiki-install-stamp";

/// Runs `npm install` (or `pnpm install`) when the dependencies changed since
/// the last successful install.
pub(crate) struct RunNpmInstall {
    config: Rc<Config>,
    runner: Rc<dyn ProcessRunner>,
    outcome: PackagesOutcome,
}

impl RunNpmInstall {
    pub fn new(config: Rc<Config>, runner: Rc<dyn ProcessRunner>, outcome: PackagesOutcome) -> Self {
        Self {
            config,
            runner,
            outcome,
        }
    }

    fn stamp(&self) -> Utf8PathBuf {
        self.config.npm_folder.join(NODE_MODULES).join(INSTALL_STAMP)
    }

    /// Digest of both package manifests. Missing files hash as empty.
    fn digest(&self) -> Result<String, TaskError> {
        let mut hasher = blake3::Hasher::new();
        for path in [
            self.config.npm_folder.join(PACKAGE_JSON),
            self.config.generated_folder.join(PACKAGE_JSON),
        ] {
            let data = match fs::read(&path) {
                Ok(data) => data,
                Err(e) if e.kind() == ErrorKind::NotFound => Vec::new(),
                Err(e) => return Err(TaskError::Read(path, e)),
            };
            hasher.update(&data);
            hasher.update(b"\0");
        }
        Ok(hasher.finalize().to_hex().to_string())
    }
}

impl Command for RunNpmInstall {
    fn kind(&self) -> TaskKind {
        TaskKind::RunNpmInstall
    }

    fn execute(&self) -> Result<(), TaskError> {
        let stamp = self.stamp();
        let digest = self.digest()?;
        let installed = fs::read_to_string(&stamp).is_ok_and(|text| text.trim() == digest);

        if !self.outcome.modified() && installed {
            info!("Dependencies are installed and unchanged, skipping install");
            return Ok(());
        }

        let manager = PackageManager::new(self.config.enable_pnpm);
        let program = manager.executable(self.config.require_home_node_exec)?;
        let args: &[&str] = match manager {
            PackageManager::Npm => &["install"],
            PackageManager::Pnpm => &["install", "--shamefully-hoist=true"],
        };

        info!("Running {manager} install in {}", self.config.npm_folder);
        let start = Instant::now();

        let output = self
            .runner
            .run(&program, args, &self.config.npm_folder)
            .map_err(|e| TaskError::Spawn(program.clone(), e))?;

        if !output.success() {
            return Err(TaskError::Process {
                command: format!("{program} {}", args.join(" ")),
                status: match output.code {
                    Some(code) => format!("exit code {code}"),
                    None => "no exit code".into(),
                },
                output: output.combined(),
            });
        }

        write_if_changed(&stamp, &digest)?;
        info!("Installed frontend dependencies {}", as_overhead(start));
        Ok(())
    }
}
