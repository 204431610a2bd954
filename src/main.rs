use std::io;
use std::path::PathBuf;

use plex_cloud_template::{config, stack, writer};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let config_path = PathBuf::from(config::DEFAULT_PATH);
    let config = config::load(&config_path)?;

    let template = stack::build(&config)?;
    let contents = template.render_as(config.format())?;

    let stdout = io::stdout();
    writer::publish(&mut stdout.lock(), &config.output.location, &contents)?;

    return Ok(());
}
