use std::rc::Rc;
use std::time::Instant;

use console::style;
use indicatif::ProgressStyle;
use tracing::{Level, debug, info};
use tracing_indicatif::span_ext::IndicatifSpanExt;

use crate::config::{Config, Options};
use crate::error::TsumikiError;
use crate::finder::{CachedClassFinder, ClassFinder};
use crate::io::as_overhead;
use crate::manifest::DependencyManifest;
use crate::process::{ProcessRunner, SystemRunner};
use crate::scanner::{ScanStrategy, scan};
use crate::task::{
    Command, CopyFrontendFiles, CopyLocalFrontendFiles, GenerateConnect, GenerateOpenApi,
    GeneratePackageJson, GenerateWebComponents, IndexHtml, IndexTs, PackagesOutcome,
    RunNpmInstall, TaskKind, TsConfig, TsDefinitions, UpdateImports, UpdatePackages,
    UpdateWebpack,
};

/// The ordered list of frontend build steps for one configuration.
///
/// Assembly happens once, in [`NodeTasks::new`]; the resulting order never
/// changes. [`NodeTasks::execute`] runs the steps one after another and stops
/// at the first failure.
///
/// ```rust,no_run
/// # use tsumiki::{ClassFinder, NodeTasks, Options};
/// # fn run(finder: impl ClassFinder + 'static) -> Result<(), tsumiki::TsumikiError> {
/// let options = Options {
///     enable_packages_update: true,
///     enable_imports_update: true,
///     run_npm_install: true,
///     ..Options::new("/path/to/project")
/// };
///
/// NodeTasks::new(finder, options)?.execute()?;
/// # Ok(())
/// # }
/// ```
pub struct NodeTasks {
    config: Rc<Config>,
    commands: Vec<Box<dyn Command>>,
}

impl NodeTasks {
    pub fn new(finder: impl ClassFinder + 'static, options: Options) -> Result<Self, TsumikiError> {
        Self::with_runner(finder, Rc::new(SystemRunner), options)
    }

    /// Like [`NodeTasks::new`], with a custom way of starting the package
    /// manager.
    pub fn with_runner(
        finder: impl ClassFinder + 'static,
        runner: Rc<dyn ProcessRunner>,
        options: Options,
    ) -> Result<Self, TsumikiError> {
        let config = Rc::new(Config::resolve(options)?);
        let finder: Rc<dyn ClassFinder> = Rc::new(CachedClassFinder::new(finder));
        let mut commands: Vec<Box<dyn Command>> = Vec::new();

        let needs_manifest = config.enable_packages_update || config.enable_imports_update;

        let strategy = ScanStrategy::new(config.use_byte_code_scanner);
        let manifest: Option<Rc<DependencyManifest>> = if needs_manifest {
            let s = Instant::now();
            let manifest = scan(
                strategy,
                finder.as_ref(),
                config.generate_embeddable_web_components,
            )?;
            debug!("Scanned frontend dependencies {}", as_overhead(s));
            Some(Rc::new(manifest))
        } else {
            None
        };

        if let (true, Some(manifest)) = (config.generate_embeddable_web_components, &manifest) {
            commands.push(Box::new(GenerateWebComponents::new(
                finder.clone(),
                manifest.exporters.clone(),
                &config.generated_folder,
            )));
        }

        if config.create_missing_package_json {
            commands.push(Box::new(GeneratePackageJson::new(config.clone())));
        }

        if !config.use_deprecated_v14_bootstrapping {
            commands.push(Box::new(IndexHtml::new(finder.clone(), config.clone())));
            commands.push(Box::new(IndexTs::new(
                finder.clone(),
                config.clone(),
                config.imports_file(),
            )));
            commands.push(Box::new(TsConfig::new(finder.clone(), config.clone())));
            commands.push(Box::new(TsDefinitions::new(finder.clone(), config.clone())));

            let connect = (
                config.connect_java_source_folder.as_ref(),
                config.connect_generated_open_api_file.as_ref(),
            );
            if let (Some(sources), Some(openapi)) = connect {
                if sources.is_dir() {
                    commands.push(Box::new(GenerateOpenApi::new(
                        sources.clone(),
                        config.connect_application_properties.clone(),
                        openapi.clone(),
                    )));

                    if let Some(api) = &config.connect_client_ts_api_folder {
                        commands.push(Box::new(GenerateConnect::new(
                            finder.clone(),
                            config.clone(),
                            openapi.clone(),
                            api.clone(),
                        )));
                    }
                }
            }
        }

        if let (true, Some(manifest)) = (config.enable_packages_update, &manifest) {
            let outcome = PackagesOutcome::default();
            commands.push(Box::new(UpdatePackages::new(
                config.clone(),
                manifest.clone(),
                outcome.clone(),
            )));

            if config.run_npm_install {
                commands.push(Box::new(RunNpmInstall::new(config.clone(), runner, outcome)));
            }
        }

        if let (Some(jars), Some(resources)) = (&config.jar_files, &config.resources_folder) {
            commands.push(Box::new(CopyFrontendFiles::new(jars.clone(), resources.clone())));

            if let Some(local) = &config.local_resources_folder {
                commands.push(Box::new(CopyLocalFrontendFiles::new(
                    local.clone(),
                    resources.clone(),
                )));
            }
        }

        if let (Some(template), Some(output)) =
            (&config.webpack_template, &config.webpack_output_directory)
        {
            commands.push(Box::new(UpdateWebpack::new(
                finder.clone(),
                config.clone(),
                template.clone(),
                output.clone(),
            )));
        }

        if let (true, Some(manifest)) = (config.enable_imports_update, manifest) {
            commands.push(Box::new(UpdateImports::new(
                finder,
                config.clone(),
                manifest,
                strategy == ScanStrategy::ByteCode,
            )));
        }

        Ok(Self { config, commands })
    }

    /// Kinds of the assembled steps, in execution order.
    pub fn kinds(&self) -> Vec<TaskKind> {
        self.commands.iter().map(|command| command.kind()).collect()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Runs every step in order. The first failure stops the run and is
    /// returned together with the kind of the step that failed.
    pub fn execute(&self) -> Result<(), TsumikiError> {
        let s = Instant::now();

        eprintln!(
            "Running {} frontend tasks in {}",
            style(self.commands.len()).blue(),
            style(&self.config.npm_folder).red(),
        );

        let span = tracing::span!(Level::INFO, "frontend_tasks");
        span.pb_set_length(self.commands.len() as u64);
        if let Ok(bar) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
        {
            span.pb_set_style(&bar.progress_chars("=>-"));
        }
        let _enter = span.enter();

        for command in &self.commands {
            let kind = command.kind();
            let start = Instant::now();
            span.pb_set_message(&format!("Running {kind}"));

            command
                .execute()
                .map_err(|err| TsumikiError::Task(kind, err))?;

            debug!("{kind} finished {}", as_overhead(start));
            span.pb_inc(1);
        }

        info!("Frontend tasks done {}", as_overhead(s));
        Ok(())
    }
}
