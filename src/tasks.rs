//! The pipeline's task graph.
//!
//! Leaves wrap one pipeline stage each; composites sequence them:
//!
//! ```text
//! images = parallel(images:general, images:uploads)
//! css    = series(fonts, images, styles:main, styles:vendor)
//! dev    = series(css, scripts, buildSiteGenerator, watch, server)
//! prod   = series(css, scripts, resizeImages, buildSiteGenerator)
//! ```
//!
//! Every leaf reads the shared, immutable [`BuildContext`]. The responsive
//! resizer is only reachable from `prod` and its own entry point.

use crate::config::{BuildMode, PipelineConfig};
use crate::error::TaskError;
use crate::fonts::copy_fonts;
use crate::graph::{GraphBuilder, GraphError, RunReport, Scope, TaskFailure, TaskGraph, TaskKind};
use crate::imaging::{ImageBackend, RustBackend};
use crate::images::optimize_stream;
use crate::output::{self, TaskListing};
use crate::reload::ReloadSink;
use crate::responsive::resize_all;
use crate::scripts::{ExternalMinifier, ScriptMinifier, build_scripts};
use crate::site::build_site;
use crate::styles::{NativeStyleCompiler, StyleCompiler, build_styles};
use crate::transform::{AssetPlan, BatchReport, TransformSpec};
use crate::{server, watch};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level tasks offered on the command line, with descriptions.
pub const ENTRY_POINTS: &[(&str, &str)] = &[
    ("clean", "remove the build root"),
    ("images", "optimize general images and uploads"),
    ("css", "fonts, images and stylesheets"),
    ("scripts", "minify scripts"),
    ("resizeImages", "write responsive variants of uploads"),
    ("buildSiteGenerator", "run the site generator"),
    ("server", "serve the site with live reload"),
    ("dev", "development build, then watch and serve"),
    ("prod", "production build"),
];

/// Everything a leaf needs. Built once, shared read-only.
pub struct BuildContext {
    pub root: PathBuf,
    pub config: PipelineConfig,
    pub mode: BuildMode,
    pub plan: AssetPlan,
    pub site_root: PathBuf,
    pub reload: ReloadSink,
    pub images: Box<dyn ImageBackend + Send + Sync>,
    pub styles: Box<dyn StyleCompiler>,
    pub scripts: Box<dyn ScriptMinifier>,
}

impl BuildContext {
    /// Context with the production collaborators.
    pub fn new(root: &Path, config: PipelineConfig, mode: BuildMode) -> Result<Self, TaskError> {
        let root = root.canonicalize().map_err(|e| TaskError::io(root, e))?;
        let plan = AssetPlan::from_config(&root, &config, mode)?;
        Ok(Self {
            site_root: root.join(&config.paths.site),
            reload: ReloadSink::for_mode(mode),
            images: Box::new(RustBackend::new()),
            styles: Box::new(NativeStyleCompiler),
            scripts: Box::new(ExternalMinifier),
            root,
            config,
            mode,
            plan,
        })
    }

    pub fn with_images(mut self, backend: impl ImageBackend + Send + Sync + 'static) -> Self {
        self.images = Box::new(backend);
        self
    }

    pub fn with_styles(mut self, compiler: impl StyleCompiler + 'static) -> Self {
        self.styles = Box::new(compiler);
        self
    }

    pub fn with_scripts(mut self, minifier: impl ScriptMinifier + 'static) -> Self {
        self.scripts = Box::new(minifier);
        self
    }

    fn report(&self, report: &BatchReport) {
        output::print_batch_summary(report, &self.plan.build_root);
    }
}

type Ctx = Scope<BuildContext>;

/// The pipeline graph, validated.
pub fn pipeline_graph() -> Result<TaskGraph<BuildContext>, GraphError> {
    let mut b = GraphBuilder::<BuildContext>::new();

    b.define("clean", |s: &Ctx| clean(&s.ctx().plan.build_root))?;
    b.define("fonts", |s: &Ctx| {
        s.ctx().report(&copy_fonts(&s.ctx().plan.fonts)?);
        Ok(())
    })?;
    b.define("images:general", |s: &Ctx| {
        optimize(s.ctx(), &s.ctx().plan.images_general)
    })?;
    b.define("images:uploads", |s: &Ctx| {
        optimize(s.ctx(), &s.ctx().plan.images_uploads)
    })?;
    b.define("styles:main", |s: &Ctx| styles(s.ctx(), &s.ctx().plan.style_main))?;
    b.define("styles:vendor", |s: &Ctx| {
        styles(s.ctx(), &s.ctx().plan.style_vendor)
    })?;
    b.define("scripts", |s: &Ctx| {
        let ctx = s.ctx();
        ctx.report(&build_scripts(&ctx.plan.scripts, &*ctx.scripts, &ctx.reload)?);
        Ok(())
    })?;
    b.define("resizeImages", |s: &Ctx| {
        let ctx = s.ctx();
        for report in resize_all(&ctx.plan.responsive, &*ctx.images)? {
            ctx.report(&report);
        }
        Ok(())
    })?;
    b.define("buildSiteGenerator", |s: &Ctx| {
        let ctx = s.ctx();
        build_site(&ctx.root, &ctx.config.site.command, &ctx.reload)
    })?;
    b.define("watch", start_watch)?;
    b.define("server", |s: &Ctx| {
        let ctx = s.ctx();
        match ctx.reload.transport() {
            Some(live) => server::run_blocking(
                &ctx.site_root,
                ctx.config.server.port,
                ctx.config.server.open,
                live.clone(),
            ),
            None => {
                tracing::info!("no dev server in {} mode", ctx.mode);
                Ok(())
            }
        }
    })?;

    b.parallel("images", &["images:general", "images:uploads"])?;
    b.series("css", &["fonts", "images", "styles:main", "styles:vendor"])?;
    b.series(
        "dev",
        &["css", "scripts", "buildSiteGenerator", "watch", "server"],
    )?;
    b.series(
        "prod",
        &["css", "scripts", "resizeImages", "buildSiteGenerator"],
    )?;

    b.build()
}

fn optimize(ctx: &BuildContext, spec: &TransformSpec) -> Result<(), TaskError> {
    ctx.report(&optimize_stream(spec, &*ctx.images)?);
    Ok(())
}

fn styles(ctx: &BuildContext, spec: &TransformSpec) -> Result<(), TaskError> {
    ctx.report(&build_styles(spec, &*ctx.styles, &ctx.site_root, &ctx.reload)?);
    Ok(())
}

fn require_development(mode: BuildMode, what: &str) -> Result<(), TaskError> {
    if mode.is_development() {
        return Ok(());
    }
    Err(TaskError::Configuration(format!(
        "{what} requires development mode (NODE_ENV is production)"
    )))
}

/// Start the file watcher on its own thread and return.
fn start_watch(scope: &Ctx) -> Result<(), TaskError> {
    let ctx = scope.ctx();
    require_development(ctx.mode, "'watch'")?;
    let bindings = watch::bindings(&ctx.root, &ctx.config)?;
    let runner = scope.clone();
    // The handle is dropped: the watcher lives as long as the process.
    watch::spawn(
        &ctx.root,
        bindings,
        Duration::from_millis(ctx.config.server.debounce_ms),
        ctx.reload.clone(),
        move |task| runner.run(task),
    )?;
    Ok(())
}

/// Remove the build root. A missing directory is already clean.
pub fn clean(build_root: &Path) -> Result<(), TaskError> {
    match fs::remove_dir_all(build_root) {
        Ok(()) => {
            tracing::info!(path = %build_root.display(), "removed");
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(TaskError::io(build_root, e)),
    }
}

/// Check a requested task before anything runs and return its leaf plan.
pub fn preflight(
    graph: &TaskGraph<BuildContext>,
    name: &str,
    mode: BuildMode,
) -> Result<Vec<String>, TaskError> {
    let plan = graph
        .plan(name)
        .map_err(|e| TaskError::Configuration(e.to_string()))?;
    if plan.iter().any(|leaf| leaf == "watch") {
        require_development(mode, &format!("'{name}'"))?;
    }
    Ok(plan)
}

/// Pre-flight `name`, then run it.
pub fn run(scope: &Ctx, name: &str) -> Result<RunReport, TaskFailure> {
    preflight(scope.graph(), name, scope.ctx().mode).map_err(|error| TaskFailure {
        task: name.to_string(),
        error,
    })?;
    tracing::info!(mode = %scope.ctx().mode, "running '{name}'");
    scope.run(name)
}

/// Leaf stages of `name`: series members follow each other, members of a
/// parallel composite share one stage.
pub fn stages<C>(graph: &TaskGraph<C>, name: &str) -> Vec<Vec<String>> {
    match graph.kind(name) {
        Some(TaskKind::Leaf) => vec![vec![name.to_string()]],
        Some(TaskKind::Series) => graph
            .members(name)
            .unwrap_or_default()
            .iter()
            .flat_map(|member| stages(graph, member))
            .collect(),
        Some(TaskKind::Parallel) => {
            let together = graph
                .members(name)
                .unwrap_or_default()
                .iter()
                .flat_map(|member| graph.plan(member).unwrap_or_default())
                .collect();
            vec![together]
        }
        None => Vec::new(),
    }
}

/// Entry points with descriptions and stages, for `tasks`.
pub fn listing<C>(graph: &TaskGraph<C>) -> Vec<TaskListing<'static>> {
    ENTRY_POINTS
        .iter()
        .map(|&(name, description)| TaskListing {
            name,
            description,
            stages: stages(graph, name),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::backend::tests::MockBackend;
    use crate::scripts::tests::MockMinifier;
    use crate::styles::tests::MockStyleCompiler;
    use crate::test_helpers::{list_files, setup_fixtures};
    use std::sync::Arc;

    fn strings(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    fn context(root: &Path, config: PipelineConfig, mode: BuildMode) -> BuildContext {
        BuildContext::new(root, config, mode)
            .unwrap()
            .with_images(MockBackend::new())
            .with_styles(MockStyleCompiler::default())
            .with_scripts(MockMinifier::default())
    }

    fn scope(ctx: BuildContext) -> Ctx {
        Scope::new(Arc::new(pipeline_graph().unwrap()), Arc::new(ctx))
    }

    // =========================================================================
    // Graph shape
    // =========================================================================

    #[test]
    fn dev_plan_never_resizes() {
        let graph = pipeline_graph().unwrap();
        assert_eq!(
            graph.plan("dev").unwrap(),
            strings(&[
                "fonts",
                "images:general",
                "images:uploads",
                "styles:main",
                "styles:vendor",
                "scripts",
                "buildSiteGenerator",
                "watch",
                "server",
            ])
        );
    }

    #[test]
    fn prod_plan_resizes_before_site_build() {
        let graph = pipeline_graph().unwrap();
        let plan = graph.plan("prod").unwrap();
        let resize = plan.iter().position(|t| t == "resizeImages").unwrap();
        let site = plan.iter().position(|t| t == "buildSiteGenerator").unwrap();
        assert!(resize < site);
        assert!(!plan.contains(&"watch".to_string()));
    }

    #[test]
    fn every_entry_point_exists() {
        let graph = pipeline_graph().unwrap();
        for (name, _) in ENTRY_POINTS {
            assert!(graph.kind(name).is_some(), "{name}");
        }
    }

    #[test]
    fn images_stage_is_parallel() {
        let graph = pipeline_graph().unwrap();
        assert_eq!(
            stages(&graph, "css"),
            vec![
                strings(&["fonts"]),
                strings(&["images:general", "images:uploads"]),
                strings(&["styles:main"]),
                strings(&["styles:vendor"]),
            ]
        );
    }

    // =========================================================================
    // Pre-flight
    // =========================================================================

    #[test]
    fn watch_in_production_is_rejected_before_running() {
        let graph = pipeline_graph().unwrap();
        let err = preflight(&graph, "dev", BuildMode::Production).unwrap_err();
        assert!(matches!(err, TaskError::Configuration(_)));
        assert!(preflight(&graph, "dev", BuildMode::Development).is_ok());
        assert!(preflight(&graph, "prod", BuildMode::Production).is_ok());
    }

    #[test]
    fn unknown_entry_is_a_configuration_error() {
        let graph = pipeline_graph().unwrap();
        assert!(matches!(
            preflight(&graph, "deploy", BuildMode::Development),
            Err(TaskError::Configuration(_))
        ));
    }

    #[test]
    fn rejected_plan_runs_nothing() {
        let tmp = setup_fixtures();
        let scope = scope(context(tmp.path(), PipelineConfig::default(), BuildMode::Production));

        let failure = run(&scope, "dev").unwrap_err();

        assert_eq!(failure.task, "dev");
        assert!(!tmp.path().join("_site").exists());
    }

    #[test]
    fn watch_leaf_fails_in_production() {
        let tmp = setup_fixtures();
        let scope = scope(context(tmp.path(), PipelineConfig::default(), BuildMode::Production));

        let failure = scope.run("watch").unwrap_err();
        assert_eq!(failure.task, "watch");
        assert!(matches!(failure.error, TaskError::Configuration(_)));
    }

    #[test]
    fn server_is_a_no_op_in_production() {
        let tmp = setup_fixtures();
        let scope = scope(context(tmp.path(), PipelineConfig::default(), BuildMode::Production));
        assert_eq!(scope.run("server").unwrap().completed, strings(&["server"]));
    }

    // =========================================================================
    // Clean
    // =========================================================================

    #[test]
    fn clean_removes_build_root() {
        let tmp = setup_fixtures();
        let build = tmp.path().join("_site/assets");
        fs::create_dir_all(build.join("images")).unwrap();
        fs::write(build.join("images/a.png"), b"x").unwrap();

        clean(&build).unwrap();

        assert!(!build.exists());
        assert!(tmp.path().join("_site").exists());
    }

    #[test]
    fn clean_of_missing_root_succeeds() {
        let tmp = setup_fixtures();
        clean(&tmp.path().join("_site/assets")).unwrap();
    }

    // =========================================================================
    // Runs
    // =========================================================================

    #[test]
    fn images_composite_runs_both_streams() {
        let tmp = setup_fixtures();
        let scope = scope(context(tmp.path(), PipelineConfig::default(), BuildMode::Development));

        let mut completed = scope.run("images").unwrap().completed;
        completed.sort();

        assert_eq!(completed, strings(&["images:general", "images:uploads"]));
        assert_eq!(
            list_files(&tmp.path().join("_site/assets/images")),
            vec!["icons/star.png", "logo.png"]
        );
    }

    #[cfg(unix)]
    #[test]
    fn prod_builds_everything() {
        let tmp = setup_fixtures();
        let mut config = PipelineConfig::default();
        config.site.command = strings(&["sh", "-c", "mkdir -p _site && echo ok > _site/index.html"]);
        let scope = scope(context(tmp.path(), config, BuildMode::Production));

        let report = run(&scope, "prod").unwrap();

        assert_eq!(report.completed.len(), 8);
        assert_eq!(report.completed.last().map(String::as_str), Some("buildSiteGenerator"));
        let build = tmp.path().join("_site/assets");
        assert!(build.join("fonts/inter.woff2").exists());
        assert!(build.join("uploads/photo.jpg").exists());
        assert!(build.join("styles/main.min.css").exists());
        assert!(build.join("styles/libs/normalize.min.css").exists());
        assert!(build.join("js/app.min.js").exists());
        for width in [640, 960, 1280, 1600] {
            assert!(build.join(format!("images/{width}w/photo.jpg")).exists());
        }
        assert!(tmp.path().join("_site/index.html").exists());
    }

    #[test]
    fn script_failure_stops_prod_before_resizing() {
        let tmp = setup_fixtures();
        let scope = scope(
            context(tmp.path(), PipelineConfig::default(), BuildMode::Production).with_scripts(
                MockMinifier {
                    failing: strings(&["app.js"]),
                    ..Default::default()
                },
            ),
        );

        let failure = run(&scope, "prod").unwrap_err();

        assert_eq!(failure.task, "scripts");
        assert!(matches!(failure.error, TaskError::Batch { .. }));
        assert!(!tmp.path().join("_site/assets/images/640w").exists());
    }
}
