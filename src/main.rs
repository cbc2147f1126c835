use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use diffuser_viz::app::DiffuserVizApp;
use diffuser_viz::field::{analyze_coverage, estimate_field, Bucket};
use diffuser_viz::render::export_heatmap;
use diffuser_viz::{Catalog, Settings, ViewMode};
use log::info;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum View {
    Elevation,
    Plan,
    #[value(name = "3d", alias = "perspective")]
    Perspective,
}

impl From<View> for ViewMode {
    fn from(view: View) -> Self {
        match view {
            View::Elevation => ViewMode::Elevation,
            View::Plan => ViewMode::Plan,
            View::Perspective => ViewMode::Perspective,
        }
    }
}

#[derive(Parser)]
#[command(name = "diffuser-viz")]
#[command(about = "Air diffuser performance model and airflow visualizer", long_about = None)]
#[command(version)]
struct Cli {
    /// Settings JSON (diffuser, room, placed diffusers)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// External catalog JSON replacing the built-in one
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// View shown at startup
    #[arg(long, value_enum, default_value = "elevation")]
    view: View,

    /// Write the plan heat map to a PNG and exit without opening a window
    #[arg(long, value_name = "PNG")]
    export_heatmap: Option<PathBuf>,

    /// Pixels per velocity-field cell in the exported heat map
    #[arg(long, default_value_t = 8)]
    cell_pixels: u32,
}

/// Computes the field for the placed diffusers, prints the coverage summary
/// and writes the heat map
fn export(catalog: &Catalog, mut settings: Settings, path: &Path, cell_pixels: u32) -> Result<()> {
    settings.refresh_placed(catalog);
    let sources: Vec<_> = settings.diffusers.iter().filter_map(|d| d.field_source()).collect();
    let field = estimate_field(settings.room.width, settings.room.length, settings.grid_step, &sources);
    let coverage = analyze_coverage(&field);

    println!(
        "Room {:.2} x {:.2} m, {} placed diffusers, {} in the field",
        settings.room.width,
        settings.room.length,
        settings.diffusers.len(),
        sources.len()
    );
    println!("Covered: {:.1} %", coverage.covered_fraction * 100.0);
    for bucket in Bucket::ALL {
        println!(
            "  {:<8} {:>5.1} %  ({} cells)",
            bucket.label(),
            coverage.fraction(bucket) * 100.0,
            coverage.count(bucket)
        );
    }
    println!(
        "Average {:.2} m/s, max {:.2} m/s",
        coverage.average_velocity, coverage.max_velocity
    );

    let (w, h) = export_heatmap(&field, path, cell_pixels)
        .with_context(|| format!("Failed to export heat map to {}", path.display()))?;
    println!("Wrote {} ({}x{})", path.display(), w, h);
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let catalog = match &cli.catalog {
        Some(path) => Catalog::from_path(path)
            .with_context(|| format!("Failed to load catalog {}", path.display()))?,
        None => Catalog::builtin().context("Built-in catalog is invalid")?,
    };
    info!("Catalog with {} models", catalog.models().len());

    let settings = match &cli.config {
        Some(path) => Settings::load(path)
            .with_context(|| format!("Failed to load settings {}", path.display()))?,
        None => Settings::default(),
    };

    if let Some(path) = &cli.export_heatmap {
        return export(&catalog, settings, path, cli.cell_pixels);
    }

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default().with_inner_size([1280.0, 860.0]),
        ..Default::default()
    };
    let view = cli.view.into();
    let settings_path = cli.config.clone();

    eframe::run_native(
        "Diffuser Visualizer",
        options,
        Box::new(move |cc| Box::new(DiffuserVizApp::new(cc, catalog, settings, settings_path, view))),
    )
    .map_err(|e| anyhow::anyhow!("Window failed: {}", e))
}
