//! The classpath as seen by the pipeline.
//!
//! The pipeline never inspects compiled classes itself. Everything it needs to
//! know comes through [`ClassFinder`], which a build-tool plugin or a server
//! startup hook implements on top of whatever classpath model it has.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::rc::Rc;

use camino::Utf8PathBuf;

use crate::error::RuntimeError;

/// A single annotation occurrence on a class, e.g. `@JsModule("./foo.js")`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    /// Simple annotation name, e.g. `JsModule`.
    pub name: String,
    /// Annotation attributes. A single-value annotation stores it under
    /// `value`.
    pub values: BTreeMap<String, String>,
}

impl Annotation {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: BTreeMap::new(),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Shorthand for an annotation carrying only `value`.
    pub fn value_of(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(name).with("value", value)
    }

    pub fn value(&self) -> Option<&str> {
        self.get("value")
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }
}

/// Answers queries about the server-side classpath.
pub trait ClassFinder {
    /// Fully qualified names of classes carrying the annotation.
    fn annotated_classes(&self, annotation: &str) -> Result<BTreeSet<String>, RuntimeError>;

    /// Fully qualified names of classes assignable to `ty`, excluding `ty`.
    fn subtypes_of(&self, ty: &str) -> Result<BTreeSet<String>, RuntimeError>;

    /// Annotations declared on the class, repeated annotations included.
    fn annotations(&self, class: &str) -> Result<Vec<Annotation>, RuntimeError>;

    /// Classes referenced from the compiled method bodies of `class`.
    fn references(&self, class: &str) -> Result<BTreeSet<String>, RuntimeError>;

    /// Class loader resource lookup.
    fn resource(&self, name: &str) -> Option<Utf8PathBuf>;
}

impl<T: ClassFinder + ?Sized> ClassFinder for Rc<T> {
    fn annotated_classes(&self, annotation: &str) -> Result<BTreeSet<String>, RuntimeError> {
        (**self).annotated_classes(annotation)
    }

    fn subtypes_of(&self, ty: &str) -> Result<BTreeSet<String>, RuntimeError> {
        (**self).subtypes_of(ty)
    }

    fn annotations(&self, class: &str) -> Result<Vec<Annotation>, RuntimeError> {
        (**self).annotations(class)
    }

    fn references(&self, class: &str) -> Result<BTreeSet<String>, RuntimeError> {
        (**self).references(class)
    }

    fn resource(&self, name: &str) -> Option<Utf8PathBuf> {
        (**self).resource(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Query {
    Annotated(String),
    Subtypes(String),
    References(String),
}

/// Memoizes the expensive classpath queries for a single pipeline run.
///
/// Only successful answers are cached. The cache lives as long as the
/// [`NodeTasks`](crate::NodeTasks) owning it and is never shared between
/// threads.
pub struct CachedClassFinder {
    inner: Box<dyn ClassFinder>,
    classes: RefCell<HashMap<Query, BTreeSet<String>>>,
    annotations: RefCell<HashMap<String, Vec<Annotation>>>,
}

impl CachedClassFinder {
    pub fn new(inner: impl ClassFinder + 'static) -> Self {
        Self {
            inner: Box::new(inner),
            classes: RefCell::default(),
            annotations: RefCell::default(),
        }
    }

    fn classes(
        &self,
        query: Query,
        compute: impl FnOnce(&dyn ClassFinder) -> Result<BTreeSet<String>, RuntimeError>,
    ) -> Result<BTreeSet<String>, RuntimeError> {
        if let Some(hit) = self.classes.borrow().get(&query) {
            return Ok(hit.clone());
        }

        let result = compute(self.inner.as_ref())?;
        self.classes.borrow_mut().insert(query, result.clone());
        Ok(result)
    }
}

impl ClassFinder for CachedClassFinder {
    fn annotated_classes(&self, annotation: &str) -> Result<BTreeSet<String>, RuntimeError> {
        self.classes(Query::Annotated(annotation.to_string()), |inner| {
            inner.annotated_classes(annotation)
        })
    }

    fn subtypes_of(&self, ty: &str) -> Result<BTreeSet<String>, RuntimeError> {
        self.classes(Query::Subtypes(ty.to_string()), |inner| inner.subtypes_of(ty))
    }

    fn annotations(&self, class: &str) -> Result<Vec<Annotation>, RuntimeError> {
        if let Some(hit) = self.annotations.borrow().get(class) {
            return Ok(hit.clone());
        }

        let result = self.inner.annotations(class)?;
        self.annotations
            .borrow_mut()
            .insert(class.to_string(), result.clone());
        Ok(result)
    }

    fn references(&self, class: &str) -> Result<BTreeSet<String>, RuntimeError> {
        self.classes(Query::References(class.to_string()), |inner| {
            inner.references(class)
        })
    }

    fn resource(&self, name: &str) -> Option<Utf8PathBuf> {
        self.inner.resource(name)
    }
}
