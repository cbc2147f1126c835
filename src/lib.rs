//! Air diffuser performance model and airflow visualizer.
//!
//! The catalog-calibrated [`performance`] model drives three particle views
//! (elevation, plan and 3D) and a steady work-zone velocity [`field`] with
//! coverage statistics for diffusers placed in the plan view.

pub mod app;
pub mod camera;
pub mod catalog;
pub mod error;
pub mod field;
pub mod layout;
pub mod particles;
pub mod performance;
pub mod plan;
pub mod render;
pub mod settings;

pub use catalog::{Catalog, FlowType};
pub use error::{CatalogError, ExportError, PerformanceError, SettingsError};
pub use field::{analyze_coverage, estimate_field, CoverageAnalysis, VelocityField};
pub use particles::{ParticleEngine, ViewMode};
pub use performance::{calculate_performance, DiffuserSetup, PerformanceResult};
pub use settings::Settings;
