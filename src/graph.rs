//! Named task graph.
//!
//! Tasks are leaves (an action) or composites (`series` / `parallel` lists
//! of other task names). The graph is assembled with a [`GraphBuilder`] and
//! validated once by [`GraphBuilder::build`]: duplicate names, references to
//! undefined tasks, and cycles are all configuration errors raised before
//! anything can run.
//!
//! ## Execution
//!
//! - **series**: members run in order; the first failure stops the rest.
//! - **parallel**: members run on the rayon pool; every member runs to
//!   completion, then the first failure in declaration order is reported.
//!
//! A failure always names the leaf that produced it, however deeply it is
//! nested. Leaves receive a [`Scope`] giving access to the shared context
//! and to the graph itself, so a long-running leaf (the file watcher) can run
//! other tasks later.

use crate::error::TaskError;
use rayon::prelude::*;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("task '{0}' is defined twice")]
    DuplicateTask(String),
    #[error("task '{parent}' refers to unknown task '{member}'")]
    UnknownTask { parent: String, member: String },
    #[error("task cycle: {}", .0.join(" → "))]
    Cycle(Vec<String>),
    #[error("no task named '{0}'")]
    NotFound(String),
}

/// A leaf failed while running the requested task.
#[derive(Error, Debug)]
#[error("'{task}' failed: {error}")]
pub struct TaskFailure {
    pub task: String,
    pub error: TaskError,
}

/// Leaves completed by a run, in completion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub completed: Vec<String>,
}

pub type Action<C> = Arc<dyn Fn(&Scope<C>) -> Result<(), TaskError> + Send + Sync>;

/// How a task is made up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    Leaf,
    Series,
    Parallel,
}

enum Node<C> {
    Leaf(Action<C>),
    Series(Vec<String>),
    Parallel(Vec<String>),
}

impl<C> Node<C> {
    fn members(&self) -> &[String] {
        match self {
            Node::Leaf(_) => &[],
            Node::Series(m) | Node::Parallel(m) => m,
        }
    }

    fn kind(&self) -> TaskKind {
        match self {
            Node::Leaf(_) => TaskKind::Leaf,
            Node::Series(_) => TaskKind::Series,
            Node::Parallel(_) => TaskKind::Parallel,
        }
    }
}

/// Collects task definitions; [`build`](Self::build) validates them.
pub struct GraphBuilder<C> {
    nodes: BTreeMap<String, Node<C>>,
    order: Vec<String>,
}

impl<C> Default for GraphBuilder<C> {
    fn default() -> Self {
        Self {
            nodes: BTreeMap::new(),
            order: Vec::new(),
        }
    }
}

impl<C> GraphBuilder<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a leaf task.
    pub fn define<F>(&mut self, name: &str, action: F) -> Result<&mut Self, GraphError>
    where
        F: Fn(&Scope<C>) -> Result<(), TaskError> + Send + Sync + 'static,
    {
        self.insert(name, Node::Leaf(Arc::new(action)))
    }

    /// Register a composite whose members run strictly in order.
    pub fn series(&mut self, name: &str, members: &[&str]) -> Result<&mut Self, GraphError> {
        self.insert(name, Node::Series(to_owned(members)))
    }

    /// Register a composite whose members run concurrently.
    pub fn parallel(&mut self, name: &str, members: &[&str]) -> Result<&mut Self, GraphError> {
        self.insert(name, Node::Parallel(to_owned(members)))
    }

    fn insert(&mut self, name: &str, node: Node<C>) -> Result<&mut Self, GraphError> {
        if self.nodes.contains_key(name) {
            return Err(GraphError::DuplicateTask(name.to_string()));
        }
        self.nodes.insert(name.to_string(), node);
        self.order.push(name.to_string());
        Ok(self)
    }

    /// Check every reference and reject cycles.
    pub fn build(self) -> Result<TaskGraph<C>, GraphError> {
        for name in &self.order {
            for member in self.nodes[name].members() {
                if !self.nodes.contains_key(member) {
                    return Err(GraphError::UnknownTask {
                        parent: name.clone(),
                        member: member.clone(),
                    });
                }
            }
        }

        {
            let mut state: HashMap<&str, Visit> = HashMap::new();
            let mut path = Vec::new();
            for name in &self.order {
                detect_cycle(&self.nodes, name, &mut state, &mut path)?;
            }
        }

        Ok(TaskGraph {
            nodes: self.nodes,
            order: self.order,
        })
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Visit {
    InProgress,
    Done,
}

fn detect_cycle<'a, C>(
    nodes: &'a BTreeMap<String, Node<C>>,
    name: &'a str,
    state: &mut HashMap<&'a str, Visit>,
    path: &mut Vec<&'a str>,
) -> Result<(), GraphError> {
    match state.get(name) {
        Some(Visit::Done) => return Ok(()),
        Some(Visit::InProgress) => {
            let start = path.iter().position(|n| *n == name).unwrap_or(0);
            let mut cycle: Vec<String> = path[start..].iter().map(|n| n.to_string()).collect();
            cycle.push(name.to_string());
            return Err(GraphError::Cycle(cycle));
        }
        None => {}
    }
    state.insert(name, Visit::InProgress);
    path.push(name);
    if let Some(node) = nodes.get(name) {
        for member in node.members() {
            detect_cycle(nodes, member, state, path)?;
        }
    }
    path.pop();
    state.insert(name, Visit::Done);
    Ok(())
}

fn to_owned(members: &[&str]) -> Vec<String> {
    members.iter().map(|m| m.to_string()).collect()
}

/// A validated, acyclic task graph.
pub struct TaskGraph<C> {
    nodes: BTreeMap<String, Node<C>>,
    order: Vec<String>,
}

impl<C> TaskGraph<C> {
    /// Task names in definition order.
    pub fn names(&self) -> &[String] {
        &self.order
    }

    pub fn kind(&self, name: &str) -> Option<TaskKind> {
        self.nodes.get(name).map(Node::kind)
    }

    /// Direct members of a composite; empty for leaves.
    pub fn members(&self, name: &str) -> Option<&[String]> {
        self.nodes.get(name).map(Node::members)
    }

    /// Leaves `name` would run, flattened in declaration order.
    pub fn plan(&self, name: &str) -> Result<Vec<String>, GraphError> {
        if !self.nodes.contains_key(name) {
            return Err(GraphError::NotFound(name.to_string()));
        }
        let mut leaves = Vec::new();
        self.collect_leaves(name, &mut leaves);
        Ok(leaves)
    }

    fn collect_leaves(&self, name: &str, leaves: &mut Vec<String>) {
        match self.nodes.get(name) {
            Some(Node::Leaf(_)) => leaves.push(name.to_string()),
            Some(node) => {
                for member in node.members() {
                    self.collect_leaves(member, leaves);
                }
            }
            None => {}
        }
    }
}

impl<C: Send + Sync> TaskGraph<C> {
    fn execute(
        &self,
        name: &str,
        scope: &Scope<C>,
        completed: &Mutex<Vec<String>>,
    ) -> Result<(), TaskFailure> {
        let Some(node) = self.nodes.get(name) else {
            return Err(TaskFailure {
                task: name.to_string(),
                error: TaskError::Configuration(GraphError::NotFound(name.to_string()).to_string()),
            });
        };
        match node {
            Node::Leaf(action) => {
                tracing::info!("Starting '{name}'...");
                let started = Instant::now();
                action(scope).map_err(|error| TaskFailure {
                    task: name.to_string(),
                    error,
                })?;
                tracing::info!(
                    "Finished '{name}' after {}",
                    format_elapsed(started.elapsed().as_millis())
                );
                completed
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(name.to_string());
                Ok(())
            }
            Node::Series(members) => {
                for member in members {
                    self.execute(member, scope, completed)?;
                }
                Ok(())
            }
            Node::Parallel(members) => {
                let results: Vec<Result<(), TaskFailure>> = members
                    .par_iter()
                    .map(|member| self.execute(member, scope, completed))
                    .collect();
                results.into_iter().collect()
            }
        }
    }
}

fn format_elapsed(ms: u128) -> String {
    if ms < 1000 {
        format!("{ms} ms")
    } else {
        format!("{:.2} s", ms as f64 / 1000.0)
    }
}

/// What a running leaf sees: the shared context and the graph.
pub struct Scope<C> {
    graph: Arc<TaskGraph<C>>,
    ctx: Arc<C>,
}

impl<C> Clone for Scope<C> {
    fn clone(&self) -> Self {
        Self {
            graph: Arc::clone(&self.graph),
            ctx: Arc::clone(&self.ctx),
        }
    }
}

impl<C: Send + Sync> Scope<C> {
    pub fn new(graph: Arc<TaskGraph<C>>, ctx: Arc<C>) -> Self {
        Self { graph, ctx }
    }

    pub fn ctx(&self) -> &C {
        &self.ctx
    }

    pub fn graph(&self) -> &TaskGraph<C> {
        &self.graph
    }

    /// Run `name` to completion.
    pub fn run(&self, name: &str) -> Result<RunReport, TaskFailure> {
        let completed = Mutex::new(Vec::new());
        self.graph.execute(name, self, &completed)?;
        Ok(RunReport {
            completed: completed.into_inner().unwrap_or_else(PoisonError::into_inner),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    /// Context that records which leaves ran.
    #[derive(Default)]
    struct Log(Mutex<Vec<String>>);

    impl Log {
        fn push(&self, name: &str) {
            self.0.lock().unwrap().push(name.to_string());
        }

        fn entries(&self) -> Vec<String> {
            self.0.lock().unwrap().clone()
        }
    }

    fn ok(name: &'static str) -> impl Fn(&Scope<Log>) -> Result<(), TaskError> + Send + Sync {
        move |scope| {
            scope.ctx().push(name);
            Ok(())
        }
    }

    fn fail(name: &'static str) -> impl Fn(&Scope<Log>) -> Result<(), TaskError> + Send + Sync {
        move |scope| {
            scope.ctx().push(name);
            Err(TaskError::Configuration(format!("{name} broke")))
        }
    }

    fn scope(builder: GraphBuilder<Log>) -> Scope<Log> {
        Scope::new(Arc::new(builder.build().unwrap()), Arc::new(Log::default()))
    }

    // =========================================================================
    // Construction
    // =========================================================================

    #[test]
    fn duplicate_define_is_rejected() {
        let mut b = GraphBuilder::<Log>::new();
        b.define("a", ok("a")).unwrap();
        assert_eq!(
            b.define("a", ok("a")).err(),
            Some(GraphError::DuplicateTask("a".into()))
        );
        assert_eq!(
            b.series("a", &[]).err(),
            Some(GraphError::DuplicateTask("a".into()))
        );
    }

    #[test]
    fn unknown_member_is_rejected_at_build() {
        let mut b = GraphBuilder::<Log>::new();
        b.define("a", ok("a")).unwrap();
        b.series("all", &["a", "missing"]).unwrap();
        assert_eq!(
            b.build().err(),
            Some(GraphError::UnknownTask {
                parent: "all".into(),
                member: "missing".into()
            })
        );
    }

    #[test]
    fn cycle_is_rejected_at_build() {
        let mut b = GraphBuilder::<Log>::new();
        b.define("leaf", ok("leaf")).unwrap();
        b.series("x", &["leaf", "y"]).unwrap();
        b.parallel("y", &["z"]).unwrap();
        b.series("z", &["x"]).unwrap();
        match b.build().err() {
            Some(GraphError::Cycle(path)) => {
                assert_eq!(path.first(), path.last());
                assert!(path.contains(&"y".to_string()));
            }
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    #[test]
    fn self_reference_is_a_cycle() {
        let mut b = GraphBuilder::<Log>::new();
        b.series("loop", &["loop"]).unwrap();
        assert_eq!(
            b.build().err(),
            Some(GraphError::Cycle(vec!["loop".into(), "loop".into()]))
        );
    }

    #[test]
    fn shared_members_are_not_cycles() {
        let mut b = GraphBuilder::<Log>::new();
        b.define("fonts", ok("fonts")).unwrap();
        b.series("css", &["fonts"]).unwrap();
        b.series("dev", &["css", "fonts"]).unwrap();
        assert!(b.build().is_ok());
    }

    #[test]
    fn plan_flattens_in_declaration_order() {
        let mut b = GraphBuilder::<Log>::new();
        for leaf in ["a", "b", "c", "d"] {
            b.define(leaf, ok(leaf)).unwrap();
        }
        b.parallel("ab", &["a", "b"]).unwrap();
        b.series("all", &["ab", "c", "d"]).unwrap();
        let graph = b.build().unwrap();

        assert_eq!(graph.plan("all").unwrap(), vec!["a", "b", "c", "d"]);
        assert_eq!(graph.plan("c").unwrap(), vec!["c"]);
        assert_eq!(graph.plan("nope"), Err(GraphError::NotFound("nope".into())));
        assert_eq!(graph.kind("ab"), Some(TaskKind::Parallel));
    }

    // =========================================================================
    // Execution
    // =========================================================================

    #[test]
    fn series_runs_in_order() {
        let mut b = GraphBuilder::new();
        b.define("a", ok("a")).unwrap();
        b.define("b", ok("b")).unwrap();
        b.define("c", ok("c")).unwrap();
        b.series("abc", &["a", "b", "c"]).unwrap();
        let scope = scope(b);

        let report = scope.run("abc").unwrap();
        assert_eq!(report.completed, vec!["a", "b", "c"]);
        assert_eq!(scope.ctx().entries(), vec!["a", "b", "c"]);
    }

    #[test]
    fn series_failure_stops_later_members() {
        let mut b = GraphBuilder::new();
        b.define("a", ok("a")).unwrap();
        b.define("b", fail("b")).unwrap();
        b.define("c", ok("c")).unwrap();
        b.series("abc", &["a", "b", "c"]).unwrap();
        let scope = scope(b);

        let failure = scope.run("abc").unwrap_err();
        assert_eq!(failure.task, "b");
        assert_eq!(scope.ctx().entries(), vec!["a", "b"]);
    }

    #[test]
    fn failure_is_attributed_to_nested_leaf() {
        let mut b = GraphBuilder::new();
        b.define("fine", ok("fine")).unwrap();
        b.define("broken", fail("broken")).unwrap();
        b.parallel("inner", &["fine", "broken"]).unwrap();
        b.series("outer", &["inner"]).unwrap();
        let scope = scope(b);

        assert_eq!(scope.run("outer").unwrap_err().task, "broken");
    }

    #[test]
    fn parallel_siblings_finish_after_a_failure() {
        let mut b = GraphBuilder::new();
        b.define("fast_fail", fail("fast_fail")).unwrap();
        b.define("slow", |scope: &Scope<Log>| {
            thread::sleep(Duration::from_millis(50));
            scope.ctx().push("slow");
            Ok(())
        })
        .unwrap();
        b.parallel("both", &["fast_fail", "slow"]).unwrap();
        let scope = scope(b);

        let failure = scope.run("both").unwrap_err();
        assert_eq!(failure.task, "fast_fail");
        assert!(scope.ctx().entries().contains(&"slow".to_string()));
    }

    #[test]
    fn parallel_reports_first_failure_in_declaration_order() {
        let mut b = GraphBuilder::new();
        b.define("first", |scope: &Scope<Log>| {
            thread::sleep(Duration::from_millis(50));
            scope.ctx().push("first");
            Err(TaskError::Configuration("first".into()))
        })
        .unwrap();
        b.define("second", fail("second")).unwrap();
        b.parallel("both", &["first", "second"]).unwrap();
        let scope = scope(b);

        assert_eq!(scope.run("both").unwrap_err().task, "first");
    }

    #[test]
    fn leaves_can_run_other_tasks() {
        let mut b = GraphBuilder::new();
        b.define("inner", ok("inner")).unwrap();
        b.define("outer", |scope: &Scope<Log>| {
            scope.run("inner").map_err(|f| f.error)?;
            scope.ctx().push("outer");
            Ok(())
        })
        .unwrap();
        let scope = scope(b);

        scope.run("outer").unwrap();
        assert_eq!(scope.ctx().entries(), vec!["inner", "outer"]);
    }

    #[test]
    fn unknown_task_at_run_is_a_failure() {
        let scope = scope(GraphBuilder::new());
        let failure = scope.run("ghost").unwrap_err();
        assert_eq!(failure.task, "ghost");
        assert!(matches!(failure.error, TaskError::Configuration(_)));
    }

    #[test]
    fn elapsed_formatting() {
        assert_eq!(format_elapsed(12), "12 ms");
        assert_eq!(format_elapsed(1500), "1.50 s");
    }
}
