// SPDX-License-Identifier: MIT OR Apache-2.0
//! Headless Blueprint editor host.
//!
//! Loads settings and a graph document, compiles the graph, reports every
//! compile message and exits non-zero when the graph cannot run.
//!
//! ```text
//! blueprint_editor [GRAPH_JSON]
//! ```

mod hooks;
mod persistence;
mod settings;

use blueprint_graph::{Blueprint, Severity};
use hooks::LoggingHooks;
use settings::{EditorSettings, SETTINGS_FILE_NAME};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let (settings, settings_error) = EditorSettings::load_or_default(Path::new(SETTINGS_FILE_NAME));

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.log_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Blueprint editor v{}", env!("CARGO_PKG_VERSION"));
    if let Some(err) = settings_error {
        tracing::warn!("Ignoring {}: {}", SETTINGS_FILE_NAME, err);
    }

    let graph_path = std::env::args_os()
        .nth(1)
        .map_or_else(|| settings.graph_path.clone(), PathBuf::from);

    let (hooks, autosaves) = LoggingHooks::new();
    let mut blueprint = Blueprint::default().with_hooks(Box::new(hooks));
    if let Some(report) = persistence::load_or_default(&mut blueprint, &graph_path) {
        if report.nodes_skipped > 0 || report.links_skipped > 0 {
            tracing::warn!(
                "Skipped {} node(s) and {} link(s) from {}",
                report.nodes_skipped,
                report.links_skipped,
                graph_path.display()
            );
        }
    }

    let valid = blueprint.compile();
    for message in blueprint.compiler.messages() {
        let node = message.node.as_ref().map(ToString::to_string).unwrap_or_default();
        match message.severity {
            Severity::Info => tracing::info!("{} {}", node, message.issue),
            Severity::Error => tracing::error!("{} {}", node, message.issue),
        }
    }
    tracing::info!(
        "{}: {} node(s), {} link(s), {} variable(s), {} error(s)",
        blueprint.graph.name,
        blueprint.graph.node_count(),
        blueprint.graph.link_count(),
        blueprint.variables.len(),
        blueprint.compiler.error_count()
    );

    if settings.save_on_exit {
        match persistence::write_back(&mut blueprint, &graph_path, settings.snap_grid()) {
            Ok(()) => tracing::info!("Saved {}", graph_path.display()),
            Err(err) => tracing::error!("Failed to save {}: {}", graph_path.display(), err),
        }
    } else if autosaves.get() > 0 {
        tracing::info!("Graph changed during load; set save_on_exit to keep the changes");
    }

    if valid {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
