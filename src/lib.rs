//! # assetline
//!
//! Asset build pipeline for statically generated sites. Stylesheets,
//! scripts, fonts and images under a source root are compiled, minified and
//! optimized into a build root inside the generated site; the site generator
//! is then run, and in development the result is watched and served with
//! live reload.
//!
//! # Architecture: A Task Graph Over Transforms
//!
//! ```text
//! assets.toml ─► PipelineConfig ─► AssetPlan (one TransformSpec per stage)
//!                                      │
//! CLI task ─► TaskGraph (series / parallel) ─► leaf ─► batch transform
//!                                                         │
//!                                    staleness filter ─► backend ─► write
//! ```
//!
//! Every stage is a leaf task in a named graph; composites (`css`, `dev`,
//! `prod`) sequence them. A leaf runs one [`transform::TransformSpec`] as a
//! batch: files are processed on the rayon pool and each file's outcome is
//! collected, so one bad image never stops the rest.
//!
//! Codec and language work is delegated behind traits so the graph can be
//! tested without decoding a single pixel:
//!
//! - [`imaging::ImageBackend`]: pure-Rust `image` crate implementation
//! - [`styles::StyleCompiler`]: `grass` for SCSS, `lightningcss` for
//!   prefixing and minification
//! - [`scripts::ScriptMinifier`]: an external minifier command
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`config`] | `assets.toml` loading and validation, [`config::BuildMode`] |
//! | [`sources`] | Source globs: base directory plus gitignore-style patterns |
//! | [`freshness`] | Source vs destination staleness check |
//! | [`transform`] | Transform specs, the asset plan, and the batch runner |
//! | [`imaging`] | Image backend trait, pure-Rust backend, dimension math |
//! | [`images`] | The two image optimization streams |
//! | [`fonts`] | Font copy |
//! | [`styles`] | SCSS compile, prefix and minify |
//! | [`scripts`] | Script minification |
//! | [`responsive`] | Cover-fit variants of uploads at fixed widths |
//! | [`command`] | External command runner |
//! | [`site`] | Site generator invocation |
//! | [`graph`] | Generic named task graph with series and parallel composites |
//! | [`tasks`] | The pipeline's tasks, entry points and pre-flight checks |
//! | [`reload`] | Live-reload notifications |
//! | [`watch`] | Debounced file watching bound to tasks |
//! | [`server`] | Development HTTP server with server-sent events |
//! | [`output`] | CLI report formatting |
//! | [`error`] | Leaf task errors |
//!
//! # Build Modes
//!
//! `NODE_ENV` selects the mode once at start-up. Development adds inline
//! source maps, live reload, the watcher and the server; production adds
//! responsive image variants.

pub mod command;
pub mod config;
pub mod error;
pub mod fonts;
pub mod freshness;
pub mod graph;
pub mod images;
pub mod imaging;
pub mod output;
pub mod reload;
pub mod responsive;
pub mod scripts;
pub mod server;
pub mod site;
pub mod sources;
pub mod styles;
pub mod tasks;
pub mod transform;
pub mod watch;

#[cfg(test)]
pub(crate) mod test_helpers;
