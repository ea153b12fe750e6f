//! Command line arguments backing the `ocrgrid` binary.
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

use ocrgrid_rs::config::{AppConfig, EngineMode};

#[derive(Parser, Debug)]
#[command(
  name = "ocrgrid",
  about = "Turns photographed or scanned tables into spreadsheets using an OCR engine",
  version
)]
pub struct Args {
  /// TOML configuration file
  #[arg(long, short = 'c', global = true)]
  pub config: Option<PathBuf>,

  /// Enable debug logging
  #[arg(long, short = 'v', global = true)]
  pub verbose: bool,

  #[command(subcommand)]
  pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
  /// Print version information
  Version,
  /// Recognize a table image and write it as a spreadsheet
  Extract {
    /// Image containing the table
    image: PathBuf,

    /// Output spreadsheet path
    #[arg(long, short = 'o', default_value = "table.xlsx")]
    output: PathBuf,

    /// Also print the reconstructed table as tab separated text
    #[arg(long)]
    print: bool,

    #[command(flatten)]
    engine: EngineOverrides,
  },
  /// Serve the upload/download HTTP API
  Serve {
    /// Address to listen on
    #[arg(long, short = 'b')]
    bind: Option<String>,

    /// Directory for spreadsheets awaiting download
    #[arg(long)]
    output_dir: Option<PathBuf>,

    #[command(flatten)]
    engine: EngineOverrides,
  },
}

#[derive(ClapArgs, Debug, Default)]
pub struct EngineOverrides {
  /// Run the engine executable as a child process
  #[arg(long, conflicts_with = "engine_host")]
  pub engine_exe: Option<PathBuf>,

  /// Reach an engine server at this host instead of spawning one
  #[arg(long)]
  pub engine_host: Option<String>,

  /// Port of the engine server
  #[arg(long, requires = "engine_host")]
  pub engine_port: Option<u16>,

  /// Seconds to wait for the engine
  #[arg(long)]
  pub timeout: Option<u64>,
}

impl EngineOverrides {
  pub fn apply(&self, config: &mut AppConfig) {
    if let Some(exe) = &self.engine_exe {
      config.engine.mode = EngineMode::Process;
      config.engine.exe_path = exe.clone();
    }
    if let Some(host) = &self.engine_host {
      config.engine.mode = EngineMode::Socket;
      config.engine.host = host.clone();
    }
    if let Some(port) = self.engine_port {
      config.engine.port = port;
    }
    if let Some(timeout) = self.timeout {
      config.timeout_secs = timeout;
    }
  }
}
