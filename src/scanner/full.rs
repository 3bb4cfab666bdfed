use std::collections::BTreeSet;

use crate::error::ScanError;
use crate::finder::ClassFinder;
use crate::scanner::{CSS_IMPORT, Collector, JAVASCRIPT, JS_MODULE, NPM_PACKAGE, THEME, query};

const ANNOTATIONS: [&str; 4] = [JS_MODULE, JAVASCRIPT, CSS_IMPORT, NPM_PACKAGE];

/// Collects every dependency annotation on the classpath.
pub(super) fn scan(finder: &dyn ClassFinder, collector: &mut Collector) -> Result<(), ScanError> {
    let mut seen = BTreeSet::new();
    let mut classes = Vec::new();

    for annotation in ANNOTATIONS {
        for class in query(annotation, || finder.annotated_classes(annotation))? {
            if seen.insert(class.clone()) {
                classes.push(class);
            }
        }
    }

    for class in &classes {
        let annotations = query(class, || finder.annotations(class))?;
        collector.visit(class, &annotations);
    }

    for class in query(THEME, || finder.annotated_classes(THEME))? {
        let annotations = query(&class, || finder.annotations(&class))?;
        collector.theme(&annotations)?;
    }

    Ok(())
}
