//! Development server with live reload.
//!
//! Serves the generated site root over HTTP on `127.0.0.1` and pushes
//! [`ReloadEvent`]s to browsers as server-sent events on
//! [`LIVERELOAD_PATH`]. Every HTML page served gets a small client script
//! appended before `</body>` that listens on that endpoint:
//!
//! - `reload`: reload the page
//! - `inject`: re-fetch the stylesheet whose URL path is the event data
//! - `close`: the server is shutting down
//!
//! Missing files get a 404 page rendered with maud. The CLI entry point can
//! also open the site in the default browser.

use crate::command;
use crate::error::TaskError;
use crate::reload::{LiveReload, ReloadEvent};
use axum::{
    Router,
    body::Body,
    extract::State,
    handler::HandlerWithoutStateExt,
    http::{StatusCode, header},
    middleware,
    response::{
        Html, IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
    routing::get,
};
use maud::{DOCTYPE, Markup, PreEscaped, html};
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_stream::{Stream, StreamExt, wrappers::BroadcastStream};
use tower_http::{services::ServeDir, trace::TraceLayer};

/// Server-sent events endpoint.
pub const LIVERELOAD_PATH: &str = "/__livereload";

const CLIENT_JS: &str = r#"(function () {
  var source = new EventSource("/__livereload");
  source.addEventListener("reload", function () { location.reload(); });
  source.addEventListener("inject", function (e) {
    var links = document.querySelectorAll('link[rel="stylesheet"]');
    var found = false;
    links.forEach(function (link) {
      var url = new URL(link.href);
      if (url.pathname === e.data) {
        url.searchParams.set("livereload", Date.now());
        link.href = url.toString();
        found = true;
      }
    });
    if (!found) { location.reload(); }
  });
  source.addEventListener("close", function () { source.close(); });
})();"#;

fn client_script() -> Markup {
    html! {
        script { (PreEscaped(CLIENT_JS)) }
    }
}

/// Insert the client script before the last `</body>`, or append it when
/// the page has none.
pub fn inject_script(page: &str) -> String {
    let script = client_script().into_string();
    match page.rfind("</body>") {
        Some(at) => {
            let mut out = String::with_capacity(page.len() + script.len());
            out.push_str(&page[..at]);
            out.push_str(&script);
            out.push_str(&page[at..]);
            out
        }
        None => format!("{page}{script}"),
    }
}

/// SSE event name and data for a reload event.
pub fn event_fields(event: &ReloadEvent) -> (&'static str, String) {
    match event {
        ReloadEvent::Reload => ("reload", "reload".to_string()),
        ReloadEvent::Inject { path } => ("inject", path.clone()),
        ReloadEvent::Shutdown => ("close", "server shutting down".to_string()),
    }
}

fn to_event(event: &ReloadEvent) -> Event {
    let (name, data) = event_fields(event);
    Event::default().event(name).data(data)
}

async fn livereload(
    State(live): State<LiveReload>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    tracing::debug!("live reload client connected");
    let stream = BroadcastStream::new(live.subscribe())
        .take_while(|message| !matches!(message, Ok(ReloadEvent::Shutdown)))
        .map(|message| {
            let event = match message {
                Ok(event) => to_event(&event),
                // Lagged behind; a full reload catches up.
                Err(_) => to_event(&ReloadEvent::Reload),
            };
            Ok::<_, Infallible>(event)
        })
        .chain(tokio_stream::once(Ok(to_event(&ReloadEvent::Shutdown))));

    Sse::new(stream).keep_alive(KeepAlive::default())
}

fn not_found_page() -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="utf-8";
                title { "404 Not Found" }
            }
            body {
                h1 { "404 Not Found" }
                p { "Nothing has been generated at this path yet." }
            }
        }
    }
}

async fn handle_404() -> (StatusCode, Html<String>) {
    (StatusCode::NOT_FOUND, Html(not_found_page().into_string()))
}

fn is_html(response: &Response) -> bool {
    response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("text/html"))
}

async fn inject_client(response: Response) -> Response {
    if response.status() != StatusCode::OK || !is_html(&response) {
        return response;
    }
    let (mut parts, body) = response.into_parts();
    let bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!("cannot read page body: {e}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };
    let page = inject_script(&String::from_utf8_lossy(&bytes));
    parts.headers.remove(header::CONTENT_LENGTH);
    Response::from_parts(parts, Body::from(page))
}

/// The dev server's routes over `site_root`.
pub fn router(site_root: &Path, live: LiveReload) -> Router {
    let files = ServeDir::new(site_root).not_found_service(handle_404.into_service());
    Router::new()
        .route(LIVERELOAD_PATH, get(livereload))
        .fallback_service(files)
        .layer(middleware::map_response(inject_client))
        .layer(TraceLayer::new_for_http())
        .with_state(live)
}

/// Serve on `listener` until `shutdown` resolves, then tell clients to
/// close.
pub async fn serve(
    listener: TcpListener,
    site_root: PathBuf,
    live: LiveReload,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), TaskError> {
    let app = router(&site_root, live.clone());
    let closing = async move {
        shutdown.await;
        live.shutdown();
        tokio::time::sleep(Duration::from_millis(200)).await;
    };
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(closing)
        .await
        .map_err(|e| TaskError::Server(e.to_string()))?;
    tracing::info!("dev server shut down");
    Ok(())
}

/// Platform command that opens `url` in the default browser.
pub fn browser_command(url: &str) -> Vec<String> {
    let launcher: &[&str] = if cfg!(target_os = "macos") {
        &["open"]
    } else if cfg!(windows) {
        &["cmd", "/C", "start", ""]
    } else {
        &["xdg-open"]
    };
    launcher
        .iter()
        .map(|s| s.to_string())
        .chain(std::iter::once(url.to_string()))
        .collect()
}

fn open_browser(url: &str) {
    if let Err(e) = command::spawn_detached(&browser_command(url)) {
        tracing::warn!("cannot open a browser: {e}");
    }
}

/// Bind `127.0.0.1:port` and serve until Ctrl-C, on a runtime owned by the
/// calling thread. With `open`, the site is opened in a browser once bound.
pub fn run_blocking(
    site_root: &Path,
    port: u16,
    open: bool,
    live: LiveReload,
) -> Result<(), TaskError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("assetline-server")
        .build()
        .map_err(|e| TaskError::Server(format!("cannot start runtime: {e}")))?;

    runtime.block_on(async {
        let addr = SocketAddr::from(([127, 0, 0, 1], port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| TaskError::Server(format!("cannot bind {addr}: {e}")))?;
        tracing::info!(root = %site_root.display(), "dev server listening on http://{addr}");
        println!("Serving {} at http://{addr}", site_root.display());
        if open {
            open_browser(&format!("http://{addr}/"));
        }

        let shutdown = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!("cannot listen for Ctrl-C: {e}");
                std::future::pending::<()>().await;
            }
        };
        serve(listener, site_root.to_path_buf(), live, shutdown).await
    })
}
