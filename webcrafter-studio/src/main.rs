//! WebCrafter studio binary.
//!
//! One-shot generation and refinement of project directories, plus an
//! interactive session over stdin.

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tracing::info;
use webcrafter_core::{assemble_preview, CodeBundle, Language, PreviewRenderer, SandboxPolicy};
use webcrafter_studio::project::{read_project, write_project};
use webcrafter_studio::{gateway_from_env, open_playground, Command, Session, StudioConfig};

#[derive(Parser, Debug)]
#[command(name = "webcrafter-studio")]
#[command(about = "Describe a web page, get html/css/js, keep editing it")]
struct Cli {
    /// Config file (defaults to ./webcrafter.yaml when present)
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Print the preview document for a project directory
    Preview {
        dir: PathBuf,
        /// Wrap the document in a sandboxed iframe
        #[arg(long)]
        iframe: bool,
    },
    /// Write the autosaved project to a directory
    Resume {
        #[arg(short, long, default_value = "site")]
        out: PathBuf,
    },
    /// Generate a new project from a description
    Generate {
        prompt: String,
        /// Output directory
        #[arg(short, long, default_value = "site")]
        out: PathBuf,
    },
    /// Refine an existing project directory in place
    Refine {
        dir: PathBuf,
        prompt: String,
        /// Refine only one file (html, css or js)
        #[arg(short, long)]
        file: Option<Language>,
    },
    /// Interactive editing session
    Session {
        /// Start from the project in this directory
        #[arg(short, long, value_name = "DIR")]
        template: Option<PathBuf>,
        /// Restore the autosaved project
        #[arg(short, long)]
        resume: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    setup_tracing(cli.verbose);

    let config = StudioConfig::load(cli.config.as_deref())
        .await
        .context("loading config")?;

    match cli.command {
        Cmd::Preview { dir, iframe } => {
            let bundle = read_project(&dir).await?;
            if iframe {
                let mut renderer = PreviewRenderer::new(SandboxPolicy::default());
                println!("{}", renderer.render(&bundle).to_iframe());
            } else {
                println!("{}", assemble_preview(&bundle));
            }
        }
        Cmd::Resume { out } => {
            let mut playground = open_playground(&config, CodeBundle::default()).await;
            if !playground.resume(tokio::time::Instant::now().into_std()) {
                bail!("no saved project in {}", config.store_path.display());
            }
            write_project(&out, &playground.snapshot()).await?;
            println!("✓ restored into {}", out.display());
        }
        Cmd::Generate { prompt, out } => {
            let Some(gateway) = gateway_from_env(&config)? else {
                bail!("set OPENROUTER_API_KEY to generate code");
            };
            let bundle = gateway.generate(&prompt).await?;
            write_project(&out, &bundle).await?;
            println!("✓ wrote {}", out.display());
        }
        Cmd::Refine { dir, prompt, file } => {
            let Some(gateway) = gateway_from_env(&config)? else {
                bail!("set OPENROUTER_API_KEY to refine code");
            };
            let bundle = read_project(&dir).await?;
            let refined = match file {
                Some(language) => {
                    let text = gateway.refine_file(&prompt, language, &bundle).await?;
                    bundle.with(language, text)
                }
                None => gateway.refine(&prompt, &bundle).await?,
            };
            write_project(&dir, &refined).await?;
            println!("✓ refined {}", dir.display());
        }
        Cmd::Session { template, resume } => run_session(&config, template, resume).await?,
    }

    Ok(())
}

async fn run_session(
    config: &StudioConfig,
    template: Option<PathBuf>,
    resume: bool,
) -> anyhow::Result<()> {
    let initial = match &template {
        Some(dir) => read_project(dir)
            .await
            .with_context(|| format!("reading template {}", dir.display()))?,
        None => CodeBundle::default(),
    };

    let mut playground = open_playground(config, initial).await;
    if resume {
        if !playground.resume(tokio::time::Instant::now().into_std()) {
            println!("no saved project to resume");
        }
    } else if playground.has_saved_project() {
        println!("a saved project exists; start with --resume to restore it");
    }

    let gateway = gateway_from_env(config)?;
    let session = Session::new(playground, gateway, config.notification_ttl());
    let mut notifications = session.subscribe();

    let (command_tx, command_rx) = mpsc::channel::<Command>(16);
    let (reply_tx, mut reply_rx) = mpsc::channel::<String>(16);

    let printer = tokio::spawn(async move {
        loop {
            tokio::select! {
                reply = reply_rx.recv() => match reply {
                    Some(text) => println!("{}", text),
                    None => break,
                },
                Some(Ok(n)) = notifications.next() => {
                    println!("[{:?}] {}", n.level, n.message);
                }
            }
        }
    });

    let runner = tokio::spawn(session.run(command_rx, reply_tx));
    info!("session started");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        match line.parse::<Command>() {
            Ok(command) => {
                let quit = command == Command::Quit;
                if command_tx.send(command).await.is_err() || quit {
                    break;
                }
            }
            Err(e) => eprintln!("error: {}", e),
        }
    }
    drop(command_tx);

    runner.await.context("session task")?;
    printer.await.context("printer task")?;
    Ok(())
}

fn setup_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("webcrafter_core=debug,webcrafter_studio=debug,info")
        } else {
            EnvFilter::new("webcrafter_core=info,webcrafter_studio=info,warn")
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
