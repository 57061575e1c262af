//! # Build Graph
//!
//! Components and their rules, connected by dependency edges (which may cross component
//! boundaries). A `Graph` is validated on construction: every dependency resolves and there are
//! no cycles. It is read-only afterwards.
//!
mod error;
mod loader;
mod manifest;
mod selection;

pub use error::*;
pub use loader::*;
pub use manifest::*;
pub use selection::*;

use crate::config::ConfigError;
use crate::model::{Component, Rule, RuleId};
use fxhash::{FxHashMap, FxHashSet};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::path::Path;
use std::sync::Arc;
use tracing::*;

/// The position of a rule in declaration order. Stable for the lifetime of a `Graph`.
pub type RuleIdx = usize;

#[derive(Debug)]
pub struct Graph {
    components: Vec<Arc<Component>>,
    rules: Vec<Arc<Rule>>,
    index: FxHashMap<RuleId, RuleIdx>,

    /// Dependencies of every rule, in the order they were declared.
    dependencies: Vec<Vec<RuleIdx>>,

    /// Edges go from a dependency to its dependent.
    dag: DiGraph<RuleIdx, ()>,
}

impl Graph {
    /// Discovers every component under `root` and builds the graph of their rules.
    #[tracing::instrument(name = "Graph::load")]
    pub async fn load(root: &Path) -> Result<Self, GraphError> {
        let components = load_components(root).await?;
        Self::new(components)
    }

    pub fn new(components: Vec<(Arc<Component>, Vec<Rule>)>) -> Result<Self, GraphError> {
        let mut all_components = Vec::with_capacity(components.len());
        let mut rules: Vec<Arc<Rule>> = vec![];
        let mut index = FxHashMap::default();

        for (component, component_rules) in components {
            all_components.push(component);
            for rule in component_rules {
                let idx = rules.len();
                if index.insert(rule.id().clone(), idx).is_some() {
                    return Err(ConfigError::DuplicateRule(rule.id().clone()).into());
                }
                rules.push(Arc::new(rule));
            }
        }

        let mut dag = DiGraph::with_capacity(rules.len(), rules.len());
        for idx in 0..rules.len() {
            dag.add_node(idx);
        }

        let mut dependencies = Vec::with_capacity(rules.len());
        for (idx, rule) in rules.iter().enumerate() {
            let mut deps: Vec<RuleIdx> = Vec::with_capacity(rule.requires().len());
            for dep in rule.requires() {
                let dep_idx =
                    *index
                        .get(dep)
                        .ok_or_else(|| GraphError::UnresolvedDependency {
                            rule: rule.id().clone(),
                            dependency: dep.clone(),
                        })?;
                if !deps.contains(&dep_idx) {
                    deps.push(dep_idx);
                    dag.add_edge(NodeIndex::new(dep_idx), NodeIndex::new(idx), ());
                }
            }
            dependencies.push(deps);
        }

        let graph = Self {
            components: all_components,
            rules,
            index,
            dependencies,
            dag,
        };

        if let Some(rules) = graph.detect_cycle() {
            return Err(GraphError::Cycle { rules });
        }

        debug!(
            "Built graph with {} components and {} rules",
            graph.components.len(),
            graph.rules.len()
        );
        Ok(graph)
    }

    pub fn components(&self) -> &[Arc<Component>] {
        self.components.as_ref()
    }

    pub fn rules(&self) -> &[Arc<Rule>] {
        self.rules.as_ref()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn rule(&self, idx: RuleIdx) -> &Arc<Rule> {
        &self.rules[idx]
    }

    pub fn find(&self, id: &RuleId) -> Option<RuleIdx> {
        self.index.get(id).copied()
    }

    /// The direct dependencies of a rule, in declaration order.
    pub fn dependencies(&self, idx: RuleIdx) -> &[RuleIdx] {
        self.dependencies[idx].as_ref()
    }

    /// The rules that directly depend on `idx`, in declaration order.
    pub fn dependents(&self, idx: RuleIdx) -> Vec<RuleIdx> {
        let mut dependents: Vec<RuleIdx> = self
            .dag
            .neighbors_directed(NodeIndex::new(idx), Direction::Outgoing)
            .map(|node| self.dag[node])
            .collect();
        dependents.sort_unstable();
        dependents
    }

    /// Returns every rule taking part in a dependency cycle, if there is one.
    pub fn detect_cycle(&self) -> Option<Vec<RuleId>> {
        petgraph::algo::tarjan_scc(&self.dag)
            .into_iter()
            .find(|scc| scc.len() > 1 || self.dag.contains_edge(scc[0], scc[0]))
            .map(|scc| {
                let mut members: Vec<RuleIdx> = scc.iter().map(|node| self.dag[*node]).collect();
                members.sort_unstable();
                members
                    .into_iter()
                    .map(|idx| self.rules[idx].id().clone())
                    .collect()
            })
    }

    /// Resolves a selection into the rules to run, dependencies included, in the order they
    /// should be dispatched.
    #[tracing::instrument(name = "Graph::select", skip(self))]
    pub fn select(&self, selection: &Selection) -> Result<Vec<RuleIdx>, GraphError> {
        for filter in selection.rules() {
            if !self
                .rules
                .iter()
                .any(|rule| rule_filter_matches(filter, rule))
            {
                return Err(GraphError::UnknownRule(filter.clone()));
            }
        }

        let mut selected = FxHashSet::default();
        let mut stack: Vec<RuleIdx> = self
            .rules
            .iter()
            .enumerate()
            .filter(|(_, rule)| selection.matches(rule))
            .map(|(idx, _)| idx)
            .collect();

        while let Some(idx) = stack.pop() {
            if selected.insert(idx) {
                stack.extend(self.dependencies(idx).iter().copied());
            }
        }

        self.topological_order(&selected)
    }

    /// Orders `subset` so that every rule comes after its dependencies. Rules that become ready
    /// at the same time keep their declaration order.
    pub fn topological_order(
        &self,
        subset: &FxHashSet<RuleIdx>,
    ) -> Result<Vec<RuleIdx>, GraphError> {
        let mut pending: FxHashMap<RuleIdx, usize> = subset
            .iter()
            .map(|idx| {
                let deps = self
                    .dependencies(*idx)
                    .iter()
                    .filter(|dep| subset.contains(dep))
                    .count();
                (*idx, deps)
            })
            .collect();

        let mut ready: BinaryHeap<Reverse<RuleIdx>> = pending
            .iter()
            .filter(|(_, deps)| **deps == 0)
            .map(|(idx, _)| Reverse(*idx))
            .collect();

        let mut order = Vec::with_capacity(subset.len());
        while let Some(Reverse(idx)) = ready.pop() {
            order.push(idx);
            for dependent in self.dependents(idx) {
                if let Some(count) = pending.get_mut(&dependent) {
                    *count -= 1;
                    if *count == 0 {
                        ready.push(Reverse(dependent));
                    }
                }
            }
        }

        if order.len() != subset.len() {
            let mut stuck: Vec<RuleIdx> = subset
                .iter()
                .filter(|idx| !order.contains(idx))
                .copied()
                .collect();
            stuck.sort_unstable();
            return Err(GraphError::Cycle {
                rules: stuck
                    .into_iter()
                    .map(|idx| self.rules[idx].id().clone())
                    .collect(),
            });
        }

        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn component(name: &str, rules: &[(&str, &[&str])]) -> (Arc<Component>, Vec<Rule>) {
        let component = Arc::new(
            Component::builder()
                .name(name)
                .root(format!("/repo/{}", name))
                .build()
                .unwrap(),
        );
        let rules = rules
            .iter()
            .map(|(rule, deps)| {
                Rule::builder()
                    .id(RuleId::new(name, *rule))
                    .component(component.clone())
                    .command("true")
                    .requires(
                        deps.iter()
                            .map(|d| RuleId::parse_reference(d, name).unwrap())
                            .collect::<Vec<RuleId>>(),
                    )
                    .build()
                    .unwrap()
            })
            .collect();
        (component, rules)
    }

    fn ids(graph: &Graph, order: &[RuleIdx]) -> Vec<String> {
        order
            .iter()
            .map(|idx| graph.rule(*idx).id().to_string())
            .collect()
    }

    #[test]
    fn orders_dependencies_first_with_declaration_tie_breaks() {
        let graph = Graph::new(vec![
            component("api", &[("build", &["lib:build"]), ("test", &["build"])]),
            component("lib", &[("build", &[]), ("lint", &[])]),
        ])
        .unwrap();

        let order = graph.select(&Selection::all()).unwrap();
        assert_eq!(
            ids(&graph, &order),
            vec!["lib:build", "api:build", "api:test", "lib:lint"]
        );
    }

    #[test]
    fn selection_pulls_in_transitive_dependencies() {
        let graph = Graph::new(vec![
            component("api", &[("build", &["lib:build"]), ("test", &["build"])]),
            component("lib", &[("build", &[]), ("lint", &[])]),
        ])
        .unwrap();

        let selection = Selection::builder()
            .rules(vec!["api:test".to_string()])
            .build()
            .unwrap();
        let order = graph.select(&selection).unwrap();
        assert_eq!(ids(&graph, &order), vec!["lib:build", "api:build", "api:test"]);
    }

    #[test]
    fn unknown_rule_filters_are_rejected() {
        let graph = Graph::new(vec![component("api", &[("build", &[])])]).unwrap();
        let selection = Selection::builder()
            .rules(vec!["deploy".to_string()])
            .build()
            .unwrap();
        assert_matches!(graph.select(&selection), Err(GraphError::UnknownRule(r)) if r == "deploy");
    }

    #[test]
    fn cycles_name_every_rule_involved() {
        let result = Graph::new(vec![component("x", &[("a", &["b"]), ("b", &["a"])])]);
        assert_matches!(result, Err(GraphError::Cycle { rules }) => {
            assert_eq!(rules, vec![RuleId::new("x", "a"), RuleId::new("x", "b")]);
        });
    }

    #[test]
    fn self_dependencies_are_cycles() {
        let result = Graph::new(vec![component("x", &[("a", &["a"])])]);
        assert_matches!(result, Err(GraphError::Cycle { rules }) if rules == vec![RuleId::new("x", "a")]);
    }

    #[test]
    fn unresolved_dependencies_are_rejected() {
        let result = Graph::new(vec![component("x", &[("a", &["y:missing"])])]);
        assert_matches!(
            result,
            Err(GraphError::UnresolvedDependency { dependency, .. }) if dependency == RuleId::new("y", "missing")
        );
    }

    #[test]
    fn dependents_are_found_across_components() {
        let graph = Graph::new(vec![
            component("api", &[("build", &["lib:build"])]),
            component("lib", &[("build", &[])]),
            component("web", &[("build", &["lib:build"])]),
        ])
        .unwrap();

        let lib = graph.find(&RuleId::new("lib", "build")).unwrap();
        assert_eq!(
            ids(&graph, &graph.dependents(lib)),
            vec!["api:build", "web:build"]
        );
    }
}
