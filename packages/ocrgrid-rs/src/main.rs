mod cli;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Args, Commands};
use ocrgrid_ocr::OcrInput;
use ocrgrid_rs::artifact_store::ArtifactStore;
use ocrgrid_rs::config::AppConfig;
use ocrgrid_rs::server;
use ocrgrid_rs::table_extractor::TableExtractor;
use tracing_subscriber::EnvFilter;

fn init_logging(verbose: bool) {
  let default = if verbose { "debug" } else { "info" };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .init();
}

async fn run(args: Args) -> Result<()> {
  let mut config = AppConfig::load(args.config.as_deref())?;

  match args.command {
    Commands::Version => {
      println!("ocrgrid {}", env!("CARGO_PKG_VERSION"));
    }
    Commands::Extract {
      image,
      output,
      print,
      engine,
    } => {
      engine.apply(&mut config);
      let image = image
        .canonicalize()
        .with_context(|| format!("Cannot open image {}", image.display()))?;
      let engine = config
        .engine
        .start(config.timeout())
        .await
        .context("recognition failed")?;
      let extractor = TableExtractor::new(engine);

      let grid = extractor
        .extract_to_file(&OcrInput::FilePath(image), &output)
        .await?;
      if print {
        println!("{}", grid.to_tsv());
      }
      eprintln!(
        "Wrote {} rows x {} columns to {}",
        grid.height(),
        grid.width(),
        output.display()
      );
    }
    Commands::Serve {
      bind,
      output_dir,
      engine,
    } => {
      engine.apply(&mut config);
      if let Some(bind) = bind {
        config.bind = bind;
      }
      if let Some(dir) = output_dir {
        config.output_dir = dir;
      }
      let engine = config
        .engine
        .start(config.timeout())
        .await
        .context("recognition failed")?;
      let store = ArtifactStore::open(&config.output_dir)
        .with_context(|| format!("Cannot create {}", config.output_dir.display()))?;
      let listener = tokio::net::TcpListener::bind(&config.bind)
        .await
        .with_context(|| format!("Cannot listen on {}", config.bind))?;
      let extractor = TableExtractor::new(engine).with_store(store);
      server::serve(listener, Arc::new(extractor), config.artifact_ttl()).await?;
    }
  }
  Ok(())
}

#[tokio::main]
async fn main() {
  let args = Args::parse();
  init_logging(args.verbose);

  if let Err(e) = run(args).await {
    eprintln!("Error: {:#}", e);
    std::process::exit(1);
  }
}
