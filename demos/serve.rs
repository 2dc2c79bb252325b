//! File download server over a directory tree.
//!
//! ```text
//! cargo run --example serve [ROOT] [PORT] [PREFIX]
//! ```
//!
//! Serves `ROOT` (default `.`) on `PORT` (default 8000) under `PREFIX`
//! (default `/`). Directories render as a browsable listing, files
//! download resumably, `/upload` accepts new files, and `/md5/<path>`
//! reports checksums for verifying finished downloads.

use std::io;

use axum::extract::{Multipart, Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use chrono::{DateTime, Local};
use md5::{Digest, Md5};
use serde::Deserialize;
use tokio::fs;
use tracing_subscriber::EnvFilter;

use axum_byteserve::{FileMetadata, FileServer, ServeError, ServeOutcome};

#[derive(Clone)]
struct AppState {
    server: FileServer,
    prefix: String,
}

/// Query flags shared by the listing and download routes: `show_time`
/// adds modification times to listings, `dd=1` forces files to
/// download as opaque blobs.
#[derive(Deserialize)]
struct ViewQuery {
    #[serde(default)]
    show_time: bool,
    #[serde(default)]
    dd: String,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let root = args.next().unwrap_or_else(|| ".".to_string());
    let port: u16 = args.next().and_then(|port| port.parse().ok()).unwrap_or(8000);
    let prefix = args.next().unwrap_or_else(|| "/".to_string());

    if !prefix.starts_with('/') || !prefix.ends_with('/') {
        eprintln!("prefix must start and end with /");
        std::process::exit(1);
    }

    let root = std::fs::canonicalize(&root).unwrap_or_else(|err| {
        eprintln!("cannot serve {root}: {err}");
        std::process::exit(1);
    });

    let state = AppState {
        server: FileServer::new(root),
        prefix: prefix.clone(),
    };
    let app = router(state, &prefix);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await.unwrap();
    tracing::info!("serving on http://0.0.0.0:{port}{prefix}");
    axum::serve(listener, app).await.unwrap();
}

fn router(state: AppState, prefix: &str) -> Router {
    let routes = Router::new()
        .route("/", get(index))
        .route("/upload", get(upload_page).post(upload))
        .route("/md5/{*path}", get(checksum))
        .route("/{*path}", get(download))
        .with_state(state);

    let app = if prefix == "/" {
        routes
    } else {
        Router::new().nest(prefix.trim_end_matches('/'), routes)
    };

    // crawlers are unwelcome regardless of prefix
    app.route("/robots.txt", get(robots_txt))
}

async fn robots_txt() -> &'static str {
    "User-Agent: *\nDisallow: /"
}

async fn index(State(state): State<AppState>, Query(view): Query<ViewQuery>) -> Response {
    let root = state.server.root().to_path_buf();
    match render_listing(&state, &root, &view).await {
        Ok(html) => Html(html).into_response(),
        Err(err) => ServeError::Io(err).into_response(),
    }
}

async fn download(
    State(state): State<AppState>,
    Path(path): Path<String>,
    Query(view): Query<ViewQuery>,
    headers: HeaderMap,
) -> Response {
    let range = headers
        .get(header::RANGE)
        .and_then(|value| value.to_str().ok());

    match state.server.serve(&path, range, view.dd == "1").await {
        Ok(ServeOutcome::Download(download)) => download.into_response(),
        Ok(ServeOutcome::Directory(dir)) => match render_listing(&state, &dir, &view).await {
            Ok(html) => Html(html).into_response(),
            Err(err) => ServeError::Io(err).into_response(),
        },
        Err(err) => err.into_response(),
    }
}

async fn upload_page(State(state): State<AppState>) -> Html<String> {
    Html(format!(
        "<form action=\"{}upload\" method=\"post\" enctype=\"multipart/form-data\">\n\
         <input type=\"file\" name=\"file\" id=\"file\">\n\
         <input type=\"submit\" value=\"upload\">\n\
         </form>",
        state.prefix,
    ))
}

/// Store the uploaded file under the served root, keeping whatever is
/// already there: uploads never overwrite. Responds with the stored
/// filename.
async fn upload(State(state): State<AppState>, mut multipart: Multipart) -> Response {
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => return (StatusCode::BAD_REQUEST, "no file field").into_response(),
            Err(err) => return (StatusCode::BAD_REQUEST, err.to_string()).into_response(),
        };

        let Some(name) = field.file_name().map(ToOwned::to_owned) else {
            continue;
        };

        // keep only the final component of a client-supplied path
        let Some(name) = std::path::Path::new(&name)
            .file_name()
            .and_then(|name| name.to_str())
            .map(ToOwned::to_owned)
        else {
            return (StatusCode::BAD_REQUEST, "bad filename").into_response();
        };

        let bytes = match field.bytes().await {
            Ok(bytes) => bytes,
            Err(err) => return (StatusCode::BAD_REQUEST, err.to_string()).into_response(),
        };

        let save_path = state.server.root().join(&name);
        if !fs::try_exists(&save_path).await.unwrap_or(false) {
            tracing::info!(name = %name, bytes = bytes.len(), "storing upload");
            if let Err(err) = fs::write(&save_path, &bytes).await {
                return ServeError::Io(err).into_response();
            }
        }

        return name.into_response();
    }
}

/// MD5 of a served file, for checking a finished download against the
/// copy on the server.
async fn checksum(State(state): State<AppState>, Path(path): Path<String>) -> Response {
    let path = match state.server.locate(&path) {
        Ok(path) => path,
        Err(err) => return err.into_response(),
    };

    match FileMetadata::resolve(&path).await {
        Err(err) => err.into_response(),
        Ok(meta) if meta.is_directory => "is a directory".into_response(),
        Ok(_) => match fs::read(&path).await {
            Err(err) => ServeError::Io(err).into_response(),
            Ok(data) => {
                let digest = Md5::digest(&data);
                digest
                    .iter()
                    .map(|byte| format!("{byte:02x}"))
                    .collect::<String>()
                    .into_response()
            }
        },
    }
}

/// Render a directory as linked breadcrumbs plus an entry list.
/// Entry links are relative and re-carry the view flags so `dd` and
/// `show_time` survive navigation.
async fn render_listing(
    state: &AppState,
    dir: &std::path::Path,
    view: &ViewQuery,
) -> io::Result<String> {
    let prefix = &state.prefix;

    let mut crumbs = vec![format!("<a href=\"{prefix}\"><span> / </span></a>")];
    if let Ok(relative) = dir.strip_prefix(state.server.root()) {
        let mut so_far = String::new();
        for part in relative.iter() {
            let part = part.to_string_lossy();
            if !so_far.is_empty() {
                so_far.push('/');
            }
            so_far.push_str(&part);
            crumbs.push(format!("<a href=\"{prefix}{so_far}/\"><span>{part}</span></a>"));
        }
    }

    let query = if view.dd.is_empty() && !view.show_time {
        String::new()
    } else {
        format!("?dd={}&show_time={}", view.dd, view.show_time)
    };

    let mut entries = Vec::new();
    let mut read_dir = fs::read_dir(dir).await?;
    while let Some(entry) = read_dir.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        let meta = entry.metadata().await?;

        let slash = if meta.is_dir() { "/" } else { "" };
        let time = if view.show_time {
            let modified: DateTime<Local> = meta.modified()?.into();
            modified.format("%Y-%m-%d %H:%M:%S").to_string()
        } else {
            String::new()
        };

        entries.push((name, slash, time));
    }
    entries.sort();

    let items = entries
        .iter()
        .map(|(name, slash, time)| {
            format!("<li><a href='{name}{slash}{query}'>{name}{slash}</a>{time}</li>")
        })
        .collect::<Vec<_>>()
        .join("\n");

    Ok(format!(
        "<html><head><style>span:hover{{background-color:#f2f2f2}}li{{width:70%;}}</style></head>\
         <body><h2>{}</h2><ul>{}</ul></body></html>",
        crumbs.join("→"),
        items,
    ))
}
