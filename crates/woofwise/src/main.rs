use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use woofwise::commands;
use woofwise::config::WoofwiseConfig;
use woofwise::retriever::DEFAULT_TOP_K;

#[derive(Parser)]
#[command(name = "woofwise")]
#[command(about = "Woofwise - Dog Breed Assistant\nAnswers questions about dog breeds from a breed dataset")]
#[command(version)]
struct Cli {
  /// Path to a YAML configuration file
  #[arg(long, global = true)]
  config: Option<PathBuf>,

  /// Path to the breed dataset CSV
  #[arg(long, global = true)]
  dataset: Option<PathBuf>,

  /// Show routing and retrieval details
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Commands,
}

// violet ignore chunk
#[derive(Subcommand)]
enum Commands {
  /// Route a question and answer it
  Ask {
    #[arg(required = true)]
    question: Vec<String>,
  },
  /// Show which pipeline a question goes to
  Route {
    #[arg(required = true)]
    question: Vec<String>,
  },
  /// List the breeds most relevant to a question
  Retrieve {
    #[arg(required = true)]
    question: Vec<String>,
    /// Number of breeds to return
    #[arg(short = 'k', long, default_value_t = DEFAULT_TOP_K)]
    top_k: usize,
  },
  /// Print every breed description
  Describe,
  /// Ask questions interactively
  Chat,
}

#[tokio::main]
async fn main() -> Result<()> {
  let cli = Cli::parse();

  bentley::set_verbose(cli.verbose);
  bentley::init_tracing(cli.verbose);

  let mut config = WoofwiseConfig::load(cli.config.as_deref())?;
  if let Some(dataset) = cli.dataset {
    config.dataset.path = dataset;
  }
  config.validate()?;

  match cli.command {
    Commands::Ask { question } => commands::ask(&config, &question.join(" ")).await?,
    Commands::Route { question } => commands::route(&config, &question.join(" ")).await?,
    Commands::Retrieve { question, top_k } => {
      commands::retrieve(&config, &question.join(" "), top_k).await?
    }
    Commands::Describe => commands::describe(&config)?,
    Commands::Chat => commands::chat(&config).await?,
  }

  Ok(())
}
