mod config;
mod events;

use actuator_link::{ActuatorLink, FileHandshake, MockLink};
use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use command_pipeline::{CommandOutcome, CommandProcessor, Debouncer, DispatchAction};
use config::DaemonConfig;
use instruction_set::{Compiler, InstructionRegistry, Params};
use phrase_cache::PhraseBank;
use robot_executor::{AssemblyExecutor, Executor};
use sequence_interpreter::{create_model, mock::MockModel, LanguageModel, SequenceInterpreter};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "brain-daemon", version, about = "Voice-driven robot command daemon")]
struct Args {
    /// YAML configuration file
    #[arg(long, global = true, default_value = "brain-daemon.yaml")]
    config: PathBuf,

    /// Use the scripted mock model instead of the Anthropic API
    #[arg(long, action = ArgAction::SetTrue, global = true)]
    mock_model: bool,

    /// Record actuator frames in memory instead of the file handshake
    #[arg(long, action = ArgAction::SetTrue, global = true)]
    mock_link: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Read speech events from stdin and drive the robot
    Run,
    /// Expand an instruction into primitive steps
    Compile {
        name: String,
        /// Parameter as key=value; values are parsed as JSON when possible
        #[arg(long = "param", value_parser = parse_param)]
        params: Vec<(String, Value)>,
    },
    /// Show what the phrase bank would answer for an utterance
    Lookup { text: String },
    /// Phrase bank statistics
    Stats,
}

fn parse_param(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty parameter name in '{raw}'"));
    }
    let value = serde_json::from_str(value.trim())
        .unwrap_or_else(|_| Value::String(value.trim().to_string()));
    Ok((key.to_string(), value))
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_tracing();
    let args = Args::parse();
    let config = DaemonConfig::load(Some(&args.config))?;

    match args.command.as_ref().unwrap_or(&Commands::Run) {
        Commands::Run => run(&args, config).await,
        Commands::Compile { name, params } => compile(&config, name, params),
        Commands::Lookup { text } => lookup(&config, text),
        Commands::Stats => {
            let bank = PhraseBank::open(&config.phrase_bank, config.cache.clone())?;
            println!("{}", serde_json::to_string_pretty(&bank.stats())?);
            Ok(())
        }
    }
}

async fn run(args: &Args, config: DaemonConfig) -> Result<()> {
    info!("brain-daemon starting");
    command_pipeline::init()?;

    let registry =
        InstructionRegistry::load(&config.instruction_set, &config.scene_context)?.into_shared();
    let bank = PhraseBank::open(&config.phrase_bank, config.cache.clone())?.into_shared();
    let interpreter = SequenceInterpreter::new(
        build_model(&config, args.mock_model),
        registry.clone(),
        config.interpreter.clone(),
    );

    let link: Box<dyn ActuatorLink> = if args.mock_link {
        info!("using in-memory actuator link");
        Box::new(MockLink::new())
    } else {
        info!(
            commands = %config.handshake.command_path.display(),
            acks = %config.handshake.ack_path.display(),
            "using file handshake"
        );
        Box::new(FileHandshake::new(config.handshake.clone(), config.motion.home))
    };
    let executor = Executor::new(registry.clone(), link, config.motion.clone())
        .with_domain(Box::new(AssemblyExecutor::new()));
    let processor = CommandProcessor::new(registry, bank, interpreter, executor, &config.pipeline)?;

    let (event_tx, event_rx) = mpsc::channel(64);
    let (action_tx, mut action_rx) = mpsc::channel(16);
    let debouncer = Debouncer::new(config.pipeline.debounce.clone()).with_halt(processor.halt_handle());
    tokio::spawn(debouncer.run(event_rx, action_tx));
    tokio::spawn(events::forward_lines(tokio::io::stdin(), event_tx));

    info!("listening for speech events on stdin");
    while let Some(action) = action_rx.recv().await {
        match action {
            DispatchAction::Execute { text, origin } => {
                let outcome = processor.process(&text, origin).await;
                report(&text, &outcome);
            }
            DispatchAction::EmergencyStop { text, origin } => {
                let outcome = processor.emergency_stop(&text);
                report(&text, &outcome);
                warn!(?origin, "halted, shutting down");
                break;
            }
        }
    }

    info!(
        unconfirmed = processor.metrics().cmd.ack_timeouts.get(),
        "brain-daemon shutting down"
    );
    Ok(())
}

fn build_model(config: &DaemonConfig, mock: bool) -> Arc<dyn LanguageModel> {
    if mock {
        info!("using scripted mock model");
        return Arc::new(MockModel::new());
    }
    match create_model(&config.model) {
        Ok(model) => model,
        Err(e) => {
            warn!(error = %e, "language model unavailable, only cached phrases will work");
            Arc::new(MockModel::new())
        }
    }
}

fn report(text: &str, outcome: &CommandOutcome) {
    println!("> {text}");
    println!("{outcome}");
    if let CommandOutcome::NeedsConfirmation { prompt, .. } = outcome {
        println!("{prompt}");
    }
}

fn compile(config: &DaemonConfig, name: &str, params: &[(String, Value)]) -> Result<()> {
    let registry = InstructionRegistry::load(&config.instruction_set, &config.scene_context)?;
    let params: Params = params.iter().cloned().collect();
    let plan = Compiler::new(&registry)
        .compile(name, &params)
        .with_context(|| format!("compiling '{name}'"))?;
    println!("{}", serde_json::to_string_pretty(&plan)?);
    Ok(())
}

fn lookup(config: &DaemonConfig, text: &str) -> Result<()> {
    let bank = PhraseBank::open(&config.phrase_bank, config.cache.clone())?;
    let report = if let Some(alias) = bank.resolve_alias(text) {
        json!({ "route": "alias", "composite": alias.maps_to_composite })
    } else if let Some(hit) = bank.sequences().lookup(text) {
        json!({
            "route": format!("sequence-{}", hit.kind.as_str()),
            "phrase": hit.phrase,
            "similarity": hit.similarity,
            "confidence": hit.confidence,
            "needs_confirmation": hit.needs_confirmation,
            "plan": hit.result,
        })
    } else if let Some(hit) = bank.intents().lookup(text) {
        json!({
            "route": format!("intent-{}", hit.kind.as_str()),
            "phrase": hit.phrase,
            "similarity": hit.similarity,
            "confidence": hit.confidence,
            "needs_confirmation": hit.needs_confirmation,
            "intent": hit.result,
        })
    } else {
        json!({ "route": "interpreter", "note": "no cached match" })
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn setup_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();
}
