mod app;
mod ui;
mod viewport;

use std::path::PathBuf;
use std::time::Duration;

use app::ViewerApp;
use stl_viewer_lib::{MeshSource, ViewerConfig};

const USAGE: &str = "usage: stl-viewer [REFERENCE] [--config FILE] [--base-url URL]";

/// Command line options
#[derive(Debug, Default, PartialEq)]
struct CliArgs {
    /// Path or URL of the mesh to open on start
    reference: Option<String>,
    config: Option<PathBuf>,
    base_url: Option<String>,
    help: bool,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stl_viewer=info,mesh=info".into()),
        )
        .init();

    let args = match parse_args(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(msg) => {
            eprintln!("{msg}\n{USAGE}");
            std::process::exit(2);
        }
    };
    if args.help {
        println!("{USAGE}");
        return;
    }

    let mut config = match &args.config {
        Some(path) => match ViewerConfig::load_from(path) {
            Ok(config) => config,
            Err(e) => {
                tracing::error!("{e}");
                std::process::exit(1);
            }
        },
        None => ViewerConfig::load(),
    };
    if let Some(base_url) = args.base_url {
        config.source.base_url = Some(base_url);
    }

    let initial = args
        .reference
        .map(|reference| MeshSource::resolve(&reference, config.source.base_url.as_deref()));

    let tasks = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("stl-load")
        .build()
    {
        Ok(tasks) => tasks,
        Err(e) => {
            tracing::error!("Failed to start async runtime: {e}");
            return;
        }
    };
    let handle = tasks.handle().clone();

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("STL Viewer")
            .with_inner_size([1200.0, 800.0])
            .with_min_inner_size([480.0, 360.0]),
        ..Default::default()
    };

    if let Err(e) = eframe::run_native(
        "stl-viewer",
        native_options,
        Box::new(move |cc| Ok(Box::new(ViewerApp::new(cc, handle, config, initial)))),
    ) {
        tracing::error!("Failed to start application: {e}");
    }

    tasks.shutdown_timeout(Duration::from_secs(1));
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<CliArgs, String> {
    let mut parsed = CliArgs::default();
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => parsed.help = true,
            "--config" => {
                let path = args.next().ok_or("--config needs a file path")?;
                parsed.config = Some(PathBuf::from(path));
            }
            "--base-url" => {
                parsed.base_url = Some(args.next().ok_or("--base-url needs a URL")?);
            }
            flag if flag.starts_with("--") => return Err(format!("unknown option {flag}")),
            other => {
                if parsed.reference.is_some() {
                    return Err(format!("unexpected extra argument {other}"));
                }
                parsed.reference = Some(other.to_string());
            }
        }
    }
    Ok(parsed)
}
