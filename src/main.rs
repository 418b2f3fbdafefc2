mod cli;

use autosizes::autosizes::{AutoSizes, AutoSizesConfig};
use autosizes::dom::{resize, DomConfig, DomRef, HtmlParser, Viewport};
use autosizes::engine::{EngineConfig, EventLoop};
use clap::Parser;
use eyre::{Context, Result};
use std::rc::Rc;
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AutoSizesConfig::from_file(path)?,
        None => AutoSizesConfig::default(),
    };

    let html = std::fs::read_to_string(&cli.page)
        .context(format!("Failed to read {}", cli.page.display()))?;
    let dom = HtmlParser::new()
        .parse(
            &html,
            DomConfig {
                viewport: Some(Viewport::new(cli.width, cli.height)),
            },
        )
        .context("Failed to parse page")?
        .into_ref();

    let event_loop = EventLoop::new(EngineConfig::default());
    let autosizes = AutoSizes::install(dom.clone(), Rc::new(event_loop.clone()), config);
    if !autosizes.is_initialized() {
        tracing::info!("init disabled in config; running the first pass anyway");
        autosizes.init();
    }
    event_loop.run_until_idle().await;
    print_sizes(&dom, &autosizes, cli.width);

    for width in cli.resize {
        resize(&dom, Viewport::new(width, cli.height));
        event_loop.run_until_idle().await;
        print_sizes(&dom, &autosizes, width);
    }

    Ok(())
}

fn print_sizes(dom: &DomRef, autosizes: &AutoSizes, viewport_width: f32) {
    let sizes_attr = &autosizes.config().sizes_attr;
    let tracked = autosizes.tracked_elements();
    let dom = dom.borrow();

    println!("viewport {viewport_width}px");
    for element in tracked {
        let Some(node) = dom.get_node(element) else {
            continue;
        };
        let label = node
            .element_data()
            .map(|el| match el.id() {
                Some(id) => format!("{}#{id}", el.tag_name()),
                None => format!("{} (node {element})", el.tag_name()),
            })
            .unwrap_or_default();
        let value = dom.get_attribute(element, sizes_attr).unwrap_or("");
        println!("  {label}: {sizes_attr}=\"{value}\"");
    }
}
