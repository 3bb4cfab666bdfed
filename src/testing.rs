//! In-memory collaborators shared by the unit tests.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet};

use camino::{Utf8Path, Utf8PathBuf};

use crate::error::RuntimeError;
use crate::finder::{Annotation, ClassFinder};
use crate::process::{ProcessOutput, ProcessRunner};

#[derive(Default)]
pub(crate) struct FakeFinder {
    classes: BTreeMap<String, Vec<Annotation>>,
    subtypes: BTreeMap<String, BTreeSet<String>>,
    references: BTreeMap<String, BTreeSet<String>>,
    resources: BTreeMap<String, Utf8PathBuf>,
    calls: Cell<usize>,
}

impl FakeFinder {
    pub fn class<const N: usize>(mut self, name: &str, annotations: [Annotation; N]) -> Self {
        self.classes
            .entry(name.to_string())
            .or_default()
            .extend(annotations);
        self
    }

    pub fn subtype(mut self, class: &str, ty: &str) -> Self {
        self.classes.entry(class.to_string()).or_default();
        self.subtypes
            .entry(ty.to_string())
            .or_default()
            .insert(class.to_string());
        self
    }

    pub fn reference(mut self, from: &str, to: &str) -> Self {
        self.classes.entry(to.to_string()).or_default();
        self.references
            .entry(from.to_string())
            .or_default()
            .insert(to.to_string());
        self
    }

    pub fn resource(mut self, name: &str, path: impl Into<Utf8PathBuf>) -> Self {
        self.resources.insert(name.to_string(), path.into());
        self
    }

    /// Number of classpath queries answered so far.
    pub fn calls(&self) -> usize {
        self.calls.get()
    }

    fn tick(&self) {
        self.calls.set(self.calls.get() + 1);
    }
}

impl ClassFinder for FakeFinder {
    fn annotated_classes(&self, annotation: &str) -> Result<BTreeSet<String>, RuntimeError> {
        self.tick();
        Ok(self
            .classes
            .iter()
            .filter(|(_, annotations)| annotations.iter().any(|a| a.name == annotation))
            .map(|(name, _)| name.clone())
            .collect())
    }

    fn subtypes_of(&self, ty: &str) -> Result<BTreeSet<String>, RuntimeError> {
        self.tick();
        Ok(self.subtypes.get(ty).cloned().unwrap_or_default())
    }

    fn annotations(&self, class: &str) -> Result<Vec<Annotation>, RuntimeError> {
        self.tick();
        Ok(self.classes.get(class).cloned().unwrap_or_default())
    }

    fn references(&self, class: &str) -> Result<BTreeSet<String>, RuntimeError> {
        self.tick();
        Ok(self.references.get(class).cloned().unwrap_or_default())
    }

    fn resource(&self, name: &str) -> Option<Utf8PathBuf> {
        self.resources.get(name).cloned()
    }
}

/// Records every invocation and answers with a fixed exit code.
pub(crate) struct CountingRunner {
    code: i32,
    stderr: &'static str,
    pub invocations: RefCell<Vec<(String, Vec<String>, Utf8PathBuf)>>,
}

impl CountingRunner {
    pub fn succeeding() -> Self {
        Self {
            code: 0,
            stderr: "",
            invocations: RefCell::default(),
        }
    }

    pub fn failing(stderr: &'static str) -> Self {
        Self {
            code: 1,
            stderr,
            invocations: RefCell::default(),
        }
    }

    pub fn count(&self) -> usize {
        self.invocations.borrow().len()
    }
}

impl ProcessRunner for CountingRunner {
    fn run(&self, program: &str, args: &[&str], cwd: &Utf8Path) -> std::io::Result<ProcessOutput> {
        self.invocations.borrow_mut().push((
            program.to_string(),
            args.iter().map(|arg| arg.to_string()).collect(),
            cwd.to_path_buf(),
        ));

        Ok(ProcessOutput {
            code: Some(self.code),
            stdout: Vec::new(),
            stderr: self.stderr.as_bytes().to_vec(),
        })
    }
}

/// A scratch directory with a UTF-8 path.
pub(crate) fn scratch() -> (tempfile::TempDir, Utf8PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = Utf8PathBuf::try_from(dir.path().to_path_buf()).unwrap();
    (dir, path)
}
