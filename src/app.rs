use crate::camera::{Camera3D, CameraDrag};
use crate::catalog::{Catalog, FlowType};
use crate::field::{analyze_coverage, estimate_field, CoverageAnalysis, FieldSource, VelocityField};
use crate::layout::Layout;
use crate::particles::{FrameInput, FrameStats, ParticleEngine, Projection, ViewMode};
use crate::performance::{centerline_profile, PerformanceResult, TERMINAL_VELOCITY};
use crate::plan::{BackgroundCache, PlanBounds, PlanController, PlanEvent, PlanIntent, PlanKey};
use crate::render::{self, BackgroundOptions, HeatColormap};
use crate::settings::Settings;
use egui::{pos2, Color32, PointerButton, Pos2, Rect, Sense, TextureHandle, TextureOptions};
use egui_plot::{Bar, BarChart, HLine, Legend, Line, Plot, PlotPoints, VLine};
use log::{debug, error};
use nalgebra as na;
use std::path::PathBuf;

const DEFAULT_SETTINGS_FILE: &str = "diffuser-viz.json";
const DEFAULT_EXPORT_FILE: &str = "heatmap.png";
const EXPORT_PIXELS_PER_CELL: u32 = 8;
const PROFILE_SAMPLES: usize = 48;

pub struct DiffuserVizApp {
    catalog: Catalog,
    settings: Settings,
    settings_path: Option<PathBuf>,
    view: ViewMode,
    performance: PerformanceResult,
    elevation: ParticleEngine,
    plan: ParticleEngine,
    perspective: ParticleEngine,
    camera: Camera3D,
    controller: PlanController,
    field: VelocityField,
    field_revision: u64,
    coverage: CoverageAnalysis,
    background: BackgroundCache,
    background_texture: Option<TextureHandle>,
    colormap: HeatColormap,
    stats: FrameStats,
    status: Option<String>,
}

impl DiffuserVizApp {
    pub fn new(
        _cc: &eframe::CreationContext<'_>,
        catalog: Catalog,
        settings: Settings,
        settings_path: Option<PathBuf>,
        view: ViewMode,
    ) -> Self {
        let performance = settings.setup().evaluate(&catalog);
        let mut app = Self {
            catalog,
            settings,
            settings_path,
            view,
            performance,
            elevation: ParticleEngine::for_view(ViewMode::Elevation),
            plan: ParticleEngine::for_view(ViewMode::Plan),
            perspective: ParticleEngine::for_view(ViewMode::Perspective),
            camera: Camera3D::default(),
            controller: PlanController::default(),
            field: VelocityField::empty(),
            field_revision: 0,
            coverage: CoverageAnalysis::default(),
            background: BackgroundCache::default(),
            background_texture: None,
            colormap: HeatColormap::new(),
            stats: FrameStats::default(),
            status: None,
        };
        app.recompute();
        app
    }

    /// Re-evaluates every diffuser and the field after a settings change
    fn recompute(&mut self) {
        self.performance = self.settings.setup().evaluate(&self.catalog);
        self.settings.refresh_placed(&self.catalog);
        self.recompute_field();
    }

    fn recompute_field(&mut self) {
        let sources: Vec<FieldSource> = self
            .settings
            .diffusers
            .iter()
            .filter_map(|d| d.field_source())
            .collect();
        self.field = estimate_field(
            self.settings.room.width,
            self.settings.room.length,
            self.settings.grid_step,
            &sources,
        );
        self.coverage = analyze_coverage(&self.field);
        self.field_revision += 1;
    }

    fn save_settings(&mut self) {
        let path = self
            .settings_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SETTINGS_FILE));
        match self.settings.save(&path) {
            Ok(()) => {
                self.status = Some(format!("Saved {}", path.display()));
                self.settings_path = Some(path);
            }
            Err(e) => {
                error!("Saving settings failed: {}", e);
                self.status = Some(format!("Save failed: {}", e));
            }
        }
    }

    fn export_heatmap(&mut self) {
        match render::export_heatmap(&self.field, DEFAULT_EXPORT_FILE, EXPORT_PIXELS_PER_CELL) {
            Ok((w, h)) => self.status = Some(format!("Exported {} ({}x{})", DEFAULT_EXPORT_FILE, w, h)),
            Err(e) => {
                error!("Heat map export failed: {}", e);
                self.status = Some(format!("Export failed: {}", e));
            }
        }
    }

    fn diffuser_controls(&mut self, ui: &mut egui::Ui) {
        let catalog = &self.catalog;
        let settings = &mut self.settings;

        ui.heading("Diffuser");
        let model_name = catalog
            .model(&settings.model)
            .map(|m| m.name.clone())
            .unwrap_or_else(|| settings.model.clone());
        let previous_model = settings.model.clone();
        egui::ComboBox::from_label("Model")
            .selected_text(model_name)
            .show_ui(ui, |ui| {
                for model in catalog.models() {
                    ui.selectable_value(&mut settings.model, model.id.clone(), model.name.as_str());
                }
            });
        if settings.model != previous_model {
            settings.fit_to_model(catalog);
        }

        let flow_types: Vec<FlowType> = catalog
            .model(&settings.model)
            .map(|m| m.flow_types.clone())
            .unwrap_or_else(|| FlowType::ALL.to_vec());
        egui::ComboBox::from_label("Flow type")
            .selected_text(settings.flow_type.label())
            .show_ui(ui, |ui| {
                for flow in flow_types {
                    ui.selectable_value(&mut settings.flow_type, flow, flow.label());
                }
            });

        egui::ComboBox::from_label("Size")
            .selected_text(settings.size.as_str())
            .show_ui(ui, |ui| {
                for (size, _) in catalog.sizes() {
                    let label = if catalog.is_incompatible(&settings.model, size) {
                        format!("{} (n/a)", size)
                    } else {
                        size.to_string()
                    };
                    ui.selectable_value(&mut settings.size, size.to_string(), label);
                }
            });

        ui.horizontal(|ui| {
            ui.label("Volume:");
            ui.add(
                egui::DragValue::new(&mut settings.volume)
                    .clamp_range(10.0..=3000.0)
                    .speed(5.0)
                    .suffix(" m³/h"),
            );
        });

        ui.separator();
        ui.heading("Temperatures");
        ui.horizontal(|ui| {
            ui.label("Supply:");
            ui.add(egui::DragValue::new(&mut settings.supply_temp).clamp_range(5.0..=45.0).speed(0.1).suffix(" °C"));
            ui.label("Room:");
            ui.add(egui::DragValue::new(&mut settings.room_temp).clamp_range(10.0..=35.0).speed(0.1).suffix(" °C"));
        });
        ui.label(format!("ΔT: {:+.1} °C", settings.delta_t()));

        ui.separator();
        ui.heading("Room");
        ui.horizontal(|ui| {
            ui.label("W:");
            ui.add(egui::DragValue::new(&mut settings.room.width).clamp_range(1.0..=30.0).speed(0.05).suffix(" m"));
            ui.label("L:");
            ui.add(egui::DragValue::new(&mut settings.room.length).clamp_range(1.0..=30.0).speed(0.05).suffix(" m"));
            ui.label("H:");
            ui.add(egui::DragValue::new(&mut settings.room.height).clamp_range(2.0..=12.0).speed(0.05).suffix(" m"));
        });
        let room_height = settings.room.height;
        ui.add(
            egui::Slider::new(&mut settings.diffuser_height, 0.5..=room_height)
                .text("Diffuser height (m)"),
        );
        ui.add(
            egui::Slider::new(&mut settings.work_zone_height, 0.1..=room_height)
                .text("Work zone (m)"),
        );

        ui.separator();
        ui.checkbox(&mut settings.show_grid, "Show grid");
        ui.checkbox(&mut settings.show_heatmap, "Show heat map");
        ui.checkbox(&mut settings.snap_to_grid, "Snap to grid");
        ui.add(egui::Slider::new(&mut settings.grid_step, 0.1..=1.0).text("Grid step (m)"));

        ui.horizontal(|ui| {
            let power = if settings.powered { "⏻ Power off" } else { "⏻ Power on" };
            if ui.button(power).clicked() {
                settings.powered = !settings.powered;
            }
            let play = if settings.playing { "⏸ Pause" } else { "▶ Play" };
            if ui.button(play).clicked() {
                settings.playing = !settings.playing;
            }
        });
    }

    fn show_performance(&self, ui: &mut egui::Ui) {
        ui.heading("Performance");
        let perf = &self.performance;
        egui::Frame::none()
            .fill(ui.visuals().extreme_bg_color)
            .show(ui, |ui| {
                ui.vertical(|ui| {
                    if let Some(err) = &perf.error {
                        ui.colored_label(Color32::from_rgb(230, 70, 70), err.to_string());
                        return;
                    }
                    ui.label(format!("Exit velocity: {:.2} m/s", perf.v0));
                    ui.label(format!("Pressure drop: {:.1} Pa", perf.pressure));
                    ui.label(format!("Noise: {:.1} dB(A)", perf.noise));
                    ui.label(format!("Throw: {:.2} m", perf.throw_dist));
                    ui.label(format!("Work-zone velocity: {:.2} m/s", perf.workzone_velocity));
                    ui.label(format!("Coverage radius: {:.2} m", perf.coverage_radius));
                    if perf.out_of_range {
                        if let Some(spec) = perf.spec {
                            ui.colored_label(
                                Color32::from_rgb(230, 180, 60),
                                format!("Outside catalog range {:.0}-{:.0} m³/h", spec.min, spec.max),
                            );
                        }
                    }
                });
            });
    }

    fn show_coverage(&self, ui: &mut egui::Ui) {
        ui.heading("Coverage");
        if self.field.is_empty() {
            ui.label("Place supply diffusers in the plan view");
            return;
        }
        let c = &self.coverage;
        ui.label(format!("Covered: {:.0} %", c.covered_fraction * 100.0));
        ui.label(format!("Average: {:.2} m/s, max {:.2} m/s", c.average_velocity, c.max_velocity));
        for (color, bucket, band) in render::legend(&self.colormap) {
            ui.horizontal(|ui| {
                ui.colored_label(color, "■");
                ui.label(format!("{}: {:.0} % ({})", bucket.label(), c.fraction(bucket) * 100.0, band));
            });
        }
    }

    fn show_catalog(&self, ui: &mut egui::Ui) {
        egui::CollapsingHeader::new("Catalog").show(ui, |ui| {
            for model in self.catalog.models() {
                ui.label(egui::RichText::new(&model.name).strong());
                let flows: Vec<&str> = model.flow_types.iter().map(|f| f.label()).collect();
                ui.label(flows.join(", "));
                ui.label(format!("Sizes: {}", self.catalog.sizes_for(&model.id).join(", ")));
            }
        });
    }

    fn show_stats(&self, ui: &mut egui::Ui) {
        ui.columns(2, |columns| {
            let bars: Vec<Bar> = render::legend(&self.colormap)
                .into_iter()
                .enumerate()
                .map(|(i, (color, bucket, _))| {
                    Bar::new(i as f64, self.coverage.fraction(bucket) * 100.0)
                        .name(bucket.label())
                        .fill(color)
                })
                .collect();
            Plot::new("coverage_buckets")
                .legend(Legend::default())
                .include_y(0.0)
                .include_y(100.0)
                .y_axis_label("% of floor")
                .show(&mut columns[0], |plot_ui| {
                    plot_ui.bar_chart(BarChart::new(bars).name("Coverage"));
                });

            let perf = &self.performance;
            let profile = centerline_profile(perf.v0, perf.throw_dist, PROFILE_SAMPLES);
            let drop = self.settings.diffuser_height - self.settings.work_zone_height;
            Plot::new("centerline_decay")
                .legend(Legend::default())
                .x_axis_label("distance from nozzle (m)")
                .y_axis_label("m/s")
                .include_y(0.0)
                .show(&mut columns[1], |plot_ui| {
                    plot_ui.line(
                        Line::new(PlotPoints::new(profile))
                            .color(Color32::from_rgb(120, 190, 255))
                            .width(2.0)
                            .name("Centerline velocity"),
                    );
                    plot_ui.hline(HLine::new(TERMINAL_VELOCITY).name("Terminal velocity"));
                    if drop > 0.0 {
                        plot_ui.vline(VLine::new(drop).name("Work zone"));
                    }
                });
        });
    }

    fn frame_dt(ctx: &egui::Context) -> f32 {
        ctx.input(|i| i.stable_dt)
    }

    fn elevation_view(&mut self, ui: &mut egui::Ui) {
        let (response, painter) = ui.allocate_painter(ui.available_size(), Sense::hover());
        let rect = response.rect;
        painter.rect_filled(rect, 0.0, render::BACKGROUND);

        let layout = Layout::elevation(rect, self.settings.room.height as f32);
        let input = self.settings.frame_input(&self.performance);
        painter.extend(render::elevation_scene(
            &layout,
            &input,
            self.settings.work_zone_height as f32,
        ));

        self.stats = self.elevation.update(&input, Self::frame_dt(ui.ctx()));
        painter.extend(self.elevation.render(&Projection::Elevation(layout)));
        self.draw_status_overlay(&painter, rect);
    }

    fn plan_view(&mut self, ui: &mut egui::Ui) {
        let (response, painter) = ui.allocate_painter(ui.available_size(), Sense::click_and_drag());
        let rect = response.rect;
        let (width, length) = (self.settings.room.width, self.settings.room.length);
        let layout = Layout::plan(rect, width as f32, length as f32);

        // raster-local layout, same fit without the screen offset
        let size = [rect.width().max(0.0) as usize, rect.height().max(0.0) as usize];
        if size[0] > 0 && size[1] > 0 {
            let local = Layout::plan(
                Rect::from_min_size(Pos2::ZERO, egui::vec2(size[0] as f32, size[1] as f32)),
                width as f32,
                length as f32,
            );
            let options = BackgroundOptions {
                room_width: width,
                room_length: length,
                grid_step: self.settings.show_grid.then_some(self.settings.grid_step),
                show_heatmap: self.settings.show_heatmap,
            };
            let (image, rebuilt) =
                self.background
                    .get_or_build(size, &local, &options, &self.field, self.field_revision);
            match self.background_texture.as_mut() {
                Some(texture) if rebuilt => texture.set(image.clone(), TextureOptions::LINEAR),
                Some(_) => {}
                None => {
                    self.background_texture = Some(ui.ctx().load_texture(
                        "plan_background",
                        image.clone(),
                        TextureOptions::LINEAR,
                    ));
                }
            }
            if let Some(texture) = &self.background_texture {
                let uv = Rect::from_min_max(pos2(0.0, 0.0), pos2(1.0, 1.0));
                let target = Rect::from_min_size(rect.min, egui::vec2(size[0] as f32, size[1] as f32));
                painter.image(texture.id(), target, uv, Color32::WHITE);
            }
        }

        let intents = self.plan_input(ui, &response, &layout);
        let mut changed = false;
        for intent in &intents {
            changed |= self.settings.apply_intent(intent);
        }

        let selected = self.controller.selected();
        let mut menu_intents = Vec::new();
        response.context_menu(|ui| match selected {
            Some(id) => {
                if ui.button("Duplicate").clicked() {
                    menu_intents.push(PlanIntent::Duplicate(id));
                    ui.close_menu();
                }
                if ui.button("Delete").clicked() {
                    menu_intents.push(PlanIntent::Delete(id));
                    ui.close_menu();
                }
            }
            None => {
                ui.label("No diffuser selected");
            }
        });
        for intent in &menu_intents {
            changed |= self.settings.apply_intent(intent);
        }

        if changed {
            self.recompute();
            self.controller.sync(&self.settings.diffusers);
        }

        painter.extend(render::plan_diffusers(
            &layout,
            &self.settings.diffusers,
            self.controller.selected(),
        ));
        for d in &self.settings.diffusers {
            let center = layout.to_screen(d.x as f32, d.y as f32);
            let half = layout.scale(d.footprint() as f32).max(8.0) / 2.0;
            painter.text(
                center - egui::vec2(0.0, half + 2.0),
                egui::Align2::CENTER_BOTTOM,
                d.index.to_string(),
                egui::FontId::monospace(11.0),
                Color32::WHITE,
            );
        }

        let input = self.settings.frame_input(&self.performance);
        // plan tracers only need the placed diffusers to be valid
        let input = FrameInput {
            feasible: true,
            ..input
        };
        self.stats = self.plan.update(&input, Self::frame_dt(ui.ctx()));
        painter.extend(self.plan.render(&Projection::Plan(layout)));

        if !self.settings.powered {
            render::draw_power_off(&painter, rect);
        }
    }

    fn plan_input(&mut self, ui: &egui::Ui, response: &egui::Response, layout: &Layout) -> Vec<PlanIntent> {
        let bounds = PlanBounds {
            width: self.settings.room.width,
            length: self.settings.room.length,
            snap_step: self.settings.snap_to_grid.then_some(self.settings.grid_step),
        };
        let (primary_pressed, secondary_pressed, released, pointer, delete, duplicate, escape) =
            ui.input(|i| {
                (
                    i.pointer.primary_pressed(),
                    i.pointer.secondary_pressed(),
                    i.pointer.any_released(),
                    i.pointer.interact_pos(),
                    i.key_pressed(egui::Key::Delete) || i.key_pressed(egui::Key::Backspace),
                    i.modifiers.command && i.key_pressed(egui::Key::D),
                    i.key_pressed(egui::Key::Escape),
                )
            });

        let mut events = Vec::new();
        if let Some(pos) = pointer.filter(|p| response.rect.contains(*p)) {
            if primary_pressed {
                events.push(PlanEvent::Press { pos, secondary: false });
            } else if secondary_pressed {
                events.push(PlanEvent::Press { pos, secondary: true });
            }
        }
        if response.dragged_by(PointerButton::Primary) {
            if let Some(pos) = response.interact_pointer_pos() {
                events.push(PlanEvent::Drag { pos });
            }
        }
        if response.double_clicked() {
            if let Some(pos) = response.interact_pointer_pos() {
                events.push(PlanEvent::DoubleClick { pos });
            }
        }
        if released {
            events.push(PlanEvent::Release);
        }
        if response.hovered() {
            if delete {
                events.push(PlanEvent::Key(PlanKey::Delete));
            }
            if duplicate {
                events.push(PlanEvent::Key(PlanKey::Duplicate));
            }
            if escape {
                events.push(PlanEvent::Key(PlanKey::Escape));
            }
        }

        events
            .into_iter()
            .flat_map(|event| {
                self.controller
                    .handle(event, &self.settings.diffusers, layout, &bounds)
            })
            .collect()
    }

    fn perspective_view(&mut self, ui: &mut egui::Ui) {
        let (response, painter) = ui.allocate_painter(ui.available_size(), Sense::click_and_drag());
        let rect = response.rect;
        painter.rect_filled(rect, 0.0, render::BACKGROUND);

        if response.dragged() {
            let modifier = ui.input(|i| i.modifiers.shift);
            if let Some(mode) = CameraDrag::from_buttons(
                response.dragged_by(PointerButton::Primary),
                response.dragged_by(PointerButton::Secondary),
                modifier,
            ) {
                self.camera.drag(mode, response.drag_delta());
            }
        }
        if response.hovered() {
            let scroll = ui.input(|i| i.smooth_scroll_delta.y);
            if scroll != 0.0 {
                self.camera.zoom_by(scroll);
            }
        }
        if response.double_clicked() {
            self.camera.reset();
        }

        let input = self.settings.frame_input(&self.performance);
        let projection = Projection::Perspective {
            camera: &self.camera,
            viewport: rect,
            target: na::Vector3::new(0.0, input.room_height / 2.0, 0.0),
        };
        painter.extend(render::room_wireframe(&projection, &input));
        self.stats = self.perspective.update(&input, Self::frame_dt(ui.ctx()));
        painter.extend(self.perspective.render(&projection));
        self.draw_status_overlay(&painter, rect);
    }

    fn draw_status_overlay(&self, painter: &egui::Painter, rect: Rect) {
        if !self.settings.powered {
            render::draw_power_off(painter, rect);
        } else if let Some(err) = &self.performance.error {
            render::draw_unavailable(painter, rect, &err.to_string());
        }
    }
}

impl eframe::App for DiffuserVizApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let before = self.settings.clone();

        egui::SidePanel::left("controls").show(ctx, |ui| {
            egui::ScrollArea::vertical().show(ui, |ui| {
                self.diffuser_controls(ui);
                ui.separator();
                self.show_performance(ui);
                ui.separator();
                self.show_coverage(ui);
                ui.separator();
                self.show_catalog(ui);
                ui.separator();

                ui.horizontal(|ui| {
                    if ui.button("Save settings").clicked() {
                        self.save_settings();
                    }
                    if ui
                        .add_enabled(!self.field.is_empty(), egui::Button::new("Export heat map"))
                        .clicked()
                    {
                        self.export_heatmap();
                    }
                });
                if ui.button("Add diffuser").clicked() {
                    let (x, y) = (self.settings.room.width / 2.0, self.settings.room.length / 2.0);
                    self.settings.add_diffuser(x, y);
                }
                if let Some(status) = &self.status {
                    ui.label(status.as_str());
                }
            });
        });

        if self.settings != before {
            debug!(
                "Configuration: {} {} {} at {:.0} m³/h",
                self.settings.model, self.settings.flow_type, self.settings.size, self.settings.volume
            );
            self.recompute();
        }

        egui::TopBottomPanel::bottom("stats")
            .resizable(true)
            .default_height(180.0)
            .show(ctx, |ui| {
                self.show_stats(ui);
                ui.label(format!(
                    "Particles: {} active, {} spawned, {} retired this frame",
                    self.stats.active, self.stats.spawned, self.stats.retired
                ));
            });

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.selectable_value(&mut self.view, ViewMode::Elevation, "Elevation");
                ui.selectable_value(&mut self.view, ViewMode::Plan, "Plan");
                ui.selectable_value(&mut self.view, ViewMode::Perspective, "3D");
            });
            match self.view {
                ViewMode::Elevation => self.elevation_view(ui),
                ViewMode::Plan => self.plan_view(ui),
                ViewMode::Perspective => self.perspective_view(ui),
            }
        });

        if self.settings.keeps_animating() {
            ctx.request_repaint();
        }
    }
}
