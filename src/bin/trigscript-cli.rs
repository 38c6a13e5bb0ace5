//! Trigscript CLI - Command-line interface for trigger scripts
//!
//! Provides subcommands for checking, dumping and running a script file.

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use trigscript::interpreter::{Script, Value};
use trigscript::runtime::event::{ActorId, EventContext};
use trigscript::runtime::globals::MemoryGlobals;
use trigscript::runtime::messaging::Messenger;
use trigscript::runtime::registry::{ConditionRegistry, ExecutorRegistry};
use trigscript::runtime::storage;
use trigscript::{Bindings, EngineConfig, TriggerManager};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "trigscript")]
#[command(about = "Compile and run trigger scripts", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a script and report the first error, if any
    Check {
        /// Script file
        file: PathBuf,
    },

    /// Print the syntax tree of a script as JSON
    Ast {
        /// Script file
        file: PathBuf,
    },

    /// Run a script once with demo executors
    Run {
        /// Script file
        file: PathBuf,

        /// Initial variable as name=json (repeatable)
        #[arg(long = "var")]
        vars: Vec<String>,

        /// Actor ID (UUID); a random one is used when omitted
        #[arg(long)]
        actor: Option<String>,

        /// Event name exposed as `event.name`
        #[arg(long, default_value = "cli")]
        event: String,

        /// Engine configuration file (JSON)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Globals snapshot, loaded before and saved after the run
        #[arg(long)]
        globals: Option<PathBuf>,
    },
}

/// Prints actor notices to stdout.
struct ConsoleMessenger;

impl Messenger for ConsoleMessenger {
    fn notify(&self, actor: ActorId, text: &str) {
        println!("[{}] {}", actor, text);
    }
}

fn read_source(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn parse_var(arg: &str) -> Result<(String, Value)> {
    let Some((name, raw)) = arg.split_once('=') else {
        bail!("expected name=json, got '{}'", arg);
    };
    let json: serde_json::Value =
        serde_json::from_str(raw).with_context(|| format!("invalid JSON for '{}'", name))?;
    Ok((name.to_string(), Value::from(json)))
}

fn demo_executors() -> ExecutorRegistry {
    let executors = ExecutorRegistry::new();
    executors.register("Message", |args: &[Value], event: &EventContext| {
        let text: Vec<String> = args.iter().map(|arg| arg.to_string()).collect();
        match event.actor() {
            Some(actor) => println!("[{}] {}", actor, text.join(" ")),
            None => println!("{}", text.join(" ")),
        }
        Ok(Value::Null)
    });
    executors.register("Log", |args: &[Value], _event: &EventContext| {
        let text: Vec<String> = args.iter().map(|arg| arg.to_string()).collect();
        tracing::info!(target: "trigger", "{}", text.join(" "));
        Ok(Value::Null)
    });
    executors
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Check { file } => {
            let source = read_source(&file)?;
            match Script::compile(source) {
                Ok(script) => println!("ok {}", script.fingerprint()),
                Err(err) => bail!("{}: {}", file.display(), err),
            }
        }

        Commands::Ast { file } => {
            let source = read_source(&file)?;
            let script =
                Script::compile(source).with_context(|| format!("{}", file.display()))?;
            println!("{}", serde_json::to_string_pretty(script.program())?);
        }

        Commands::Run {
            file,
            vars,
            actor,
            event,
            config,
            globals,
        } => {
            let config = match config {
                Some(path) => storage::load_config(&path)?,
                None => EngineConfig::default(),
            };

            let store = Arc::new(MemoryGlobals::new());
            if let Some(path) = globals.as_deref().filter(|path| path.exists()) {
                storage::load_globals(path, &store)?;
            }

            let bindings = Bindings::new(
                Arc::new(demo_executors()),
                Arc::new(ConditionRegistry::new()),
                store.clone(),
            );
            let manager = TriggerManager::builder(bindings)
                .config(config)
                .messenger(Arc::new(ConsoleMessenger))
                .build()?;

            let name = file
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_else(|| "script".to_string());
            let trigger = manager
                .compile(name, read_source(&file)?)
                .with_context(|| format!("{}", file.display()))?;

            let actor = match actor {
                Some(raw) => ActorId::from_uuid(
                    Uuid::parse_str(&raw).with_context(|| format!("invalid actor id '{}'", raw))?,
                ),
                None => ActorId::new(),
            };
            let variables = vars
                .iter()
                .map(|arg| parse_var(arg))
                .collect::<Result<HashMap<_, _>>>()?;

            if let Some(handle) = trigger.activate(EventContext::for_actor(event, actor), variables)
            {
                handle.await.context("activation task panicked")?;
            }

            if let Some(path) = globals {
                storage::save_globals(&path, &store)?;
            }
        }
    }

    Ok(())
}
