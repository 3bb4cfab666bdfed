use std::collections::{BTreeSet, HashMap, HashSet};

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Dfs;

use crate::error::ScanError;
use crate::finder::ClassFinder;
use crate::scanner::{APP_SHELL, Collector, ROUTE, WEB_COMPONENT_EXPORTER, query};

/// Class reference graph, grown lazily from the entry points.
struct References<'a> {
    finder: &'a dyn ClassFinder,
    graph: DiGraph<String, ()>,
    nodes: HashMap<String, NodeIndex>,
}

impl<'a> References<'a> {
    fn new(finder: &'a dyn ClassFinder) -> Self {
        Self {
            finder,
            graph: DiGraph::new(),
            nodes: HashMap::new(),
        }
    }

    fn node(&mut self, class: &str) -> NodeIndex {
        if let Some(&index) = self.nodes.get(class) {
            return index;
        }

        let index = self.graph.add_node(class.to_string());
        self.nodes.insert(class.to_string(), index);
        index
    }

    /// Adds every class reachable from `root`, following byte-code references.
    fn expand(&mut self, root: &str) -> Result<NodeIndex, ScanError> {
        let start = self.node(root);
        let mut pending = vec![root.to_string()];
        let mut expanded = HashSet::new();

        while let Some(class) = pending.pop() {
            if !expanded.insert(class.clone()) {
                continue;
            }

            let source = self.node(&class);
            for target in query(&class, || self.finder.references(&class))? {
                let known = self.nodes.contains_key(&target);
                let target_index = self.node(&target);
                self.graph.update_edge(source, target_index, ());

                if !known {
                    pending.push(target);
                }
            }
        }

        Ok(start)
    }
}

/// Collects annotations of the classes reachable from the entry points.
pub(super) fn scan(
    finder: &dyn ClassFinder,
    embeddable: bool,
    collector: &mut Collector,
) -> Result<(), ScanError> {
    let mut entry_points = BTreeSet::new();
    entry_points.extend(query(ROUTE, || finder.annotated_classes(ROUTE))?);
    entry_points.extend(query(APP_SHELL, || finder.subtypes_of(APP_SHELL))?);
    if embeddable {
        entry_points.extend(query(WEB_COMPONENT_EXPORTER, || {
            finder.subtypes_of(WEB_COMPONENT_EXPORTER)
        })?);
    }

    let mut references = References::new(finder);
    let mut visited = HashSet::new();

    for entry in &entry_points {
        let annotations = query(entry, || finder.annotations(entry))?;
        collector.theme(&annotations)?;

        let start = references.expand(entry)?;
        let mut dfs = Dfs::new(&references.graph, start);

        while let Some(index) = dfs.next(&references.graph) {
            if !visited.insert(index) {
                continue;
            }

            let class = &references.graph[index];
            let annotations = query(class, || finder.annotations(class))?;
            collector.visit(class, &annotations);
        }
    }

    Ok(())
}
