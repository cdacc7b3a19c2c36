use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::config::PipelineConfig;
use crate::generate::GeminiClient;
use crate::load_config::load_profile;
use crate::pipeline::{Pipeline, Publication};
use crate::publish::GitHubClient;

/// CLI for folio-press: generate a portfolio site and publish it.
#[derive(Parser)]
#[clap(
    name = "folio-press",
    version,
    about = "Generate a single-file portfolio site with an LLM and publish it to a public GitHub Pages repository"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate the site from a profile file and publish it as a new repository
    Build {
        /// Path to the YAML profile file (secrets come from the environment)
        #[clap(long)]
        profile: PathBuf,
        /// Explicit repository name; derived from the invocation time when omitted
        #[clap(long)]
        name: Option<String>,
    },
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    tracing::info!("cli_started");

    match cli.command {
        Commands::Build { profile, name } => {
            let (profile, creds) = load_profile(profile)?;
            let mut config = PipelineConfig::default();
            config.repo_name = name;
            config.trace_loaded();

            let llm = GeminiClient::new(&config)?;
            let host = GitHubClient::new(&config)?;
            let pipeline = Pipeline::new(llm, host, config);

            println!("Build starting...");
            match pipeline.run(&profile, &creds).await {
                Ok(Publication::Complete(result)) => {
                    println!("Build complete.");
                    println!("Repository: {}", result.repo);
                    println!("Commit:     {}", result.commit);
                    println!("Live at:    {}", result.url);
                    Ok(())
                }
                Ok(Publication::Partial(partial)) => {
                    eprintln!(
                        "[PARTIAL] Repository {} was created, but the site commit failed: {}",
                        partial.repo, partial.reason
                    );
                    eprintln!(
                        "The empty repository is public; re-run with a fresh name or push index.html manually."
                    );
                    Err(anyhow::anyhow!(
                        "publish incomplete: repository {} has no site content",
                        partial.repo
                    ))
                }
                Err(e) => {
                    let stage = e.stage();
                    Err(anyhow::Error::new(e).context(format!("build failed at {stage} stage")))
                }
            }
        }
    }
}
