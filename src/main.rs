mod adjustments;
mod app;
mod config;
mod crop;
mod geometry;
mod render;
mod view;

use std::path::PathBuf;

use app::ViewfinderApp;
use config::AppConfig;

/// First non-flag argument is the image to open.
fn parse_image_arg() -> Option<PathBuf> {
    std::env::args_os()
        .skip(1)
        .map(PathBuf::from)
        .find(|p| !p.display().to_string().starts_with('-'))
}

fn main() -> eframe::Result {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = AppConfig::load();
    let image_arg = parse_image_arg();

    let width = config.window_width.unwrap_or(1280.0);
    let height = config.window_height.unwrap_or(840.0);

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("Viewfinder")
            .with_app_id("viewfinder")
            .with_inner_size([width, height]),
        renderer: eframe::Renderer::Wgpu,
        ..Default::default()
    };

    eframe::run_native(
        "viewfinder",
        native_options,
        Box::new(|cc| {
            let app = ViewfinderApp::new(cc, config, image_arg)
                .map_err(|err| -> Box<dyn std::error::Error + Send + Sync> {
                    tracing::error!(%err, "viewport renderer failed to initialize");
                    err.into()
                })?;
            Ok(Box::new(app))
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_arg_skips_flags() {
        // parse_image_arg reads the process args; only exercise the filter
        // predicate here.
        let args = ["--verbose", "photo.jpg"];
        let picked = args
            .iter()
            .map(PathBuf::from)
            .find(|p| !p.display().to_string().starts_with('-'));
        assert_eq!(picked, Some(PathBuf::from("photo.jpg")));
    }
}
