//! Server-rendered HTML page for every non-API route.
//!
//! The template is read on each request so edits show up without a restart.
//! Development reads `index.html`; production reads the client build's
//! `index.html` and also serves the build's static assets.

use std::path::PathBuf;

use axum::extract::State;
use axum::http::{StatusCode, Uri};
use axum::response::{Html, IntoResponse, Response};

use crate::config::EnvironmentMode;
use crate::db::Table;
use crate::http::state::AppState;

/// Placeholder replaced by the rendered application markup.
pub const APP_HTML_MARKER: &str = "<!--app-html-->";

/// Template used when no `index.html` exists.
pub const DEFAULT_SHELL: &str = r#"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="UTF-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1.0" />
    <title>hotenv</title>
  </head>
  <body>
    <div id="root"><!--app-html--></div>
  </body>
</html>
"#;

#[derive(Debug, Clone)]
pub struct PageOptions {
    /// Template used in development.
    pub template: PathBuf,
    /// Client build directory served in production.
    pub static_dir: PathBuf,
}

impl Default for PageOptions {
    fn default() -> Self {
        Self {
            template: PathBuf::from("index.html"),
            static_dir: PathBuf::from("dist/client"),
        }
    }
}

impl PageOptions {
    pub fn template_for(&self, mode: EnvironmentMode) -> PathBuf {
        match mode {
            EnvironmentMode::Development => self.template.clone(),
            EnvironmentMode::Production => self.static_dir.join("index.html"),
        }
    }
}

pub async fn render_page(State(state): State<AppState>, mode: EnvironmentMode, uri: Uri) -> Response {
    let path = state.pages.template_for(mode);
    let template = match tokio::fs::read_to_string(&path).await {
        Ok(template) => template,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => DEFAULT_SHELL.to_string(),
        Err(e) => {
            tracing::error!(template = %path.display(), error = %e, "Failed to read page template");
            return (StatusCode::INTERNAL_SERVER_ERROR, "Failed to render page").into_response();
        }
    };

    let app_html = render_app(uri.path(), state.process.is_db_connected());
    Html(template.replacen(APP_HTML_MARKER, &app_html, 1)).into_response()
}

/// Markup of the application shell for `path`.
pub fn render_app(path: &str, db_connected: bool) -> String {
    let status = if db_connected {
        "Database connected"
    } else {
        "Database not connected"
    };

    let links: String = Table::ALL
        .iter()
        .map(|table| format!(r#"<li><a href="/api/{0}">{0}</a></li>"#, table.name()))
        .collect();

    format!(
        r#"<main data-path="{path}"><h1>Dashboard</h1><p class="db-status">{status}</p><ul>{links}</ul></main>"#,
        path = escape_html(path),
    )
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_is_escaped() {
        let html = render_app("/<script>\"x\"", false);
        assert!(html.contains(r#"data-path="/&lt;script&gt;&quot;x&quot;""#));
        assert!(html.contains("Database not connected"));
    }

    #[test]
    fn shell_carries_marker() {
        assert!(DEFAULT_SHELL.contains(APP_HTML_MARKER));
    }

    #[test]
    fn production_reads_build_template() {
        let options = PageOptions::default();
        assert_eq!(options.template_for(EnvironmentMode::Development), PathBuf::from("index.html"));
        assert_eq!(
            options.template_for(EnvironmentMode::Production),
            PathBuf::from("dist/client/index.html")
        );
    }
}
