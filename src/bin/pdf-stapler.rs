//! PDF Stapler - desktop utility for merging PDFs
//!
//! A thin egui shell around the pdf-stapler library: a reorderable list of
//! input documents with a "number pages" toggle and a merge button. All
//! merge work runs synchronously on the UI thread; the window blocks from
//! the user's point of view until the merge finishes or fails.

use std::path::PathBuf;

use eframe::egui;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pdf_stapler::{count_pages, is_pdf_path, merge, DocumentList, MergeRequest};

fn main() -> eframe::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::filter::LevelFilter::INFO)
        .init();

    tracing::info!("Starting PDF Stapler...");

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([480.0, 380.0])
            .with_min_inner_size([360.0, 280.0])
            .with_title("PDF Stapler"),
        ..Default::default()
    };

    eframe::run_native(
        "PDF Stapler",
        native_options,
        Box::new(|_cc| Ok(Box::new(StaplerApp::default()))),
    )
}

/// Main application state
struct StaplerApp {
    /// Ordered input documents, merge order = list order
    list: DocumentList,
    /// Currently selected row, if any
    selected: Option<usize>,
    /// Whether to stamp page numbers onto the merged output
    number_pages: bool,
    /// One-line status shown under the controls
    status: String,
}

impl Default for StaplerApp {
    fn default() -> Self {
        Self {
            list: DocumentList::new(),
            selected: None,
            number_pages: true,
            status: "Drop PDF files here, or use Add PDFs…".to_string(),
        }
    }
}

impl StaplerApp {
    /// Filter incoming paths to PDFs and append them to the list
    fn append_paths(&mut self, paths: Vec<PathBuf>) {
        let mut added = 0;
        for path in paths {
            if !is_pdf_path(&path) {
                tracing::warn!("ignoring non-PDF file: {}", path.display());
                continue;
            }
            match count_pages(&path) {
                Ok(pages) => tracing::info!("added {} ({} pages)", path.display(), pages),
                Err(e) => tracing::warn!("added {} ({})", path.display(), e),
            }
            self.list.append(path);
            added += 1;
        }
        if added > 0 {
            self.status = format!("Added {added} file(s), {} in list", self.list.len());
        }
    }

    /// Accept paths dropped onto the window
    fn handle_dropped_files(&mut self, ctx: &egui::Context) {
        let dropped: Vec<PathBuf> = ctx.input(|i| {
            i.raw
                .dropped_files
                .iter()
                .filter_map(|f| f.path.clone())
                .collect()
        });
        if !dropped.is_empty() {
            self.append_paths(dropped);
        }
    }

    fn remove_selected(&mut self) {
        if let Some(index) = self.selected {
            self.list.remove(index);
            self.selected = None;
        }
    }

    /// Build a merge request from the current list and run it
    fn run_merge(&mut self) {
        if self.list.is_empty() {
            let _ = rfd::MessageDialog::new()
                .set_level(rfd::MessageLevel::Error)
                .set_title("Merge")
                .set_description("The document list is empty.")
                .show();
            return;
        }

        // Cancelling the save dialog cancels the merge, it is not an error
        let Some(output_path) = rfd::FileDialog::new()
            .add_filter("PDF files", &["pdf"])
            .set_file_name("merged.pdf")
            .save_file()
        else {
            return;
        };
        let output_path = if is_pdf_path(&output_path) {
            output_path
        } else {
            output_path.with_extension("pdf")
        };

        let request = MergeRequest {
            ordered_paths: self.list.snapshot().to_vec(),
            number_pages: self.number_pages,
            output_path,
        };

        match merge(&request) {
            Ok(report) => {
                tracing::info!(
                    "merged {} pages into {}",
                    report.page_count,
                    report.output_path.display()
                );
                self.status = format!("Saved {}", report.output_path.display());
                let _ = rfd::MessageDialog::new()
                    .set_level(rfd::MessageLevel::Info)
                    .set_title("Merge complete")
                    .set_description(format!(
                        "Merged PDF saved ({} pages):\n{}",
                        report.page_count,
                        report.output_path.display()
                    ))
                    .show();
            }
            Err(e) => {
                tracing::error!("merge failed: {e}");
                self.status = "Merge failed".to_string();
                let _ = rfd::MessageDialog::new()
                    .set_level(rfd::MessageLevel::Error)
                    .set_title("Merge failed")
                    .set_description(e.to_string())
                    .show();
            }
        }
    }

    /// Render the button row, checkbox and status line
    fn render_controls(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::bottom("controls").show(ctx, |ui| {
            ui.add_space(4.0);
            ui.checkbox(&mut self.number_pages, "Number pages");
            ui.horizontal(|ui| {
                if ui.button("↑ Up").clicked() {
                    if let Some(index) = self.selected {
                        self.selected = Some(self.list.move_up(index));
                    }
                }
                if ui.button("↓ Down").clicked() {
                    if let Some(index) = self.selected {
                        self.selected = Some(self.list.move_down(index));
                    }
                }
                if ui.button("Remove").clicked() {
                    self.remove_selected();
                }
                if ui.button("Add PDFs…").clicked() {
                    if let Some(paths) = rfd::FileDialog::new()
                        .add_filter("PDF files", &["pdf"])
                        .pick_files()
                    {
                        self.append_paths(paths);
                    }
                }
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if ui.button("Merge…").clicked() {
                        self.run_merge();
                    }
                });
            });
            ui.separator();
            ui.label(&self.status);
            ui.add_space(2.0);
        });
    }

    /// Render the document list
    fn render_list(&mut self, ctx: &egui::Context) {
        // Snapshot the rows first so selection updates don't fight the
        // borrow of the list.
        let rows: Vec<(String, String)> = self
            .list
            .iter()
            .map(|path| {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.display().to_string());
                (name, path.display().to_string())
            })
            .collect();

        egui::CentralPanel::default().show(ctx, |ui| {
            egui::ScrollArea::vertical().auto_shrink(false).show(ui, |ui| {
                for (i, (name, full_path)) in rows.iter().enumerate() {
                    let is_selected = self.selected == Some(i);
                    let response = ui
                        .selectable_label(is_selected, name)
                        .on_hover_text(full_path);
                    if response.clicked() {
                        self.selected = Some(i);
                    }
                }
                if rows.is_empty() {
                    ui.weak("The list is empty.");
                }
            });
        });
    }
}

impl eframe::App for StaplerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.handle_dropped_files(ctx);
        self.render_controls(ctx);
        self.render_list(ctx);
    }
}
