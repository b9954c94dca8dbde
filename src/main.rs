use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ideaworks::errors::WorkflowError;
use ideaworks::logging::init_tracing;
use ideaworks_common::{IdeaStatus, WorkType};

mod cmd;

#[derive(Parser)]
#[command(name = "ideaworks")]
#[command(version, about = "Publish, claim and complete community ideas as pull requests")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Directory holding `.ideaworks/` (defaults to the current directory)
    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the ideas database and run migrations
    InitDb,
    /// Record a new open idea
    Publish {
        #[arg(long)]
        author: String,
        #[arg(long)]
        title: String,
        #[arg(long)]
        summary: String,
        #[arg(long)]
        details: Option<String>,
        /// Repeat for several tags
        #[arg(long = "tag")]
        tags: Vec<String>,
        /// Identity of the caller
        #[arg(long, default_value = "")]
        actor: String,
        #[arg(long, default_value = "cli")]
        ip: String,
    },
    /// Claim an open idea and open a draft work PR
    Claim {
        /// Idea id as `author/slug`
        idea: String,
        /// Author the work is published under
        #[arg(long)]
        implementer: String,
        #[arg(long, default_value = "")]
        actor: String,
        /// Shown in the PR body instead of the actor id
        #[arg(long)]
        contact: Option<String>,
        #[arg(long, default_value = "cli")]
        ip: String,
    },
    /// Publish the finished work for an idea and mark it done
    Complete {
        /// Idea id as `author/slug`
        idea: String,
        #[arg(long)]
        implementer: String,
        /// demo or case-study
        #[arg(long = "type", default_value = "demo")]
        work_type: WorkType,
        /// Work title (defaults to the idea title)
        #[arg(long)]
        title: Option<String>,
    },
    /// Print one stored idea as JSON
    Show {
        /// Idea id as `author/slug`
        idea: String,
    },
    /// List stored ideas as JSON
    List {
        #[arg(long)]
        status: Option<IdeaStatus>,
    },
    /// View or validate configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Validate configuration and show any warnings
    Validate,
    /// Initialize a default ideaworks.toml file
    Init,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            match e.downcast_ref::<WorkflowError>() {
                Some(wf) => match serde_json::to_string(&wf.to_body()) {
                    Ok(body) => eprintln!("{body}"),
                    Err(_) => eprintln!("Error: {wf}"),
                },
                None => eprintln!("Error: {e:#}"),
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let project_dir = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    match cli.command {
        Commands::InitDb => cmd::cmd_init_db(&project_dir)?,
        Commands::Publish {
            author,
            title,
            summary,
            details,
            tags,
            actor,
            ip,
        } => {
            let input = ideaworks::workflow::PublishIdeaInput {
                author_id: author,
                title,
                summary,
                details,
                tags,
                actor_id: actor,
                source_ip: ip,
            };
            cmd::cmd_publish(&project_dir, input).await?
        }
        Commands::Claim {
            idea,
            implementer,
            actor,
            contact,
            ip,
        } => {
            cmd::cmd_claim(&project_dir, &idea, implementer, actor, contact, ip).await?
        }
        Commands::Complete {
            idea,
            implementer,
            work_type,
            title,
        } => {
            let input = ideaworks::workflow::CompleteInput {
                idea_id: idea,
                implement_author_id: implementer,
                work_type,
                title,
            };
            cmd::cmd_complete(&project_dir, input).await?
        }
        Commands::Show { idea } => cmd::cmd_show(&project_dir, &idea).await?,
        Commands::List { status } => cmd::cmd_list(&project_dir, status).await?,
        Commands::Config { command } => cmd::cmd_config(&project_dir, command)?,
    }

    Ok(())
}
