// Command line arguments

use clap::Parser;
use std::path::PathBuf;

/// Size the responsive images of an HTML page and print their sizes attribute
#[derive(Parser, Debug)]
#[command(name = "autosizes", version, about)]
pub struct Cli {
    /// HTML file to load
    pub page: PathBuf,

    /// JSON file with autosizes settings (camelCase keys)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Viewport width in CSS pixels
    #[arg(long, default_value_t = 1024.0)]
    pub width: f32,

    /// Viewport height in CSS pixels
    #[arg(long, default_value_t = 768.0)]
    pub height: f32,

    /// Resize the viewport to these widths one after another, printing after each
    #[arg(long = "resize", value_name = "WIDTH")]
    pub resize: Vec<f32>,
}
