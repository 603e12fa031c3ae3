use anyhow::{Context, Result};
use call_core::{
    checklist, spawn_call, CallServices, CallSession, MetricsHub, SessionView, TrainerConfig,
};
use catalog::{builtin_catalog, load_catalog_dir, Catalog};
use clap::{ArgAction, Parser, Subcommand};
use llm_services::{
    create_dialogue_service, create_evaluation_service, EvaluationOutcome, EvaluationRequest,
    EvaluationService, Speaker, Turn,
};
use speech_io::{default_voices, MockCapture, MockSynthesis};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(
    name = "trainer",
    version,
    about = "Practice sales calls against a scripted persona",
    disable_help_subcommand = true
)]
struct Cli {
    /// Settings file (YAML or JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory of catalog YAML files layered over the built-in catalog
    #[arg(long, global = true)]
    catalog_dir: Option<PathBuf>,

    /// Use scripted dialogue and evaluation instead of the chat API
    #[arg(long, action = ArgAction::SetTrue, global = true)]
    mock: bool,

    /// Print Prometheus metrics when the command finishes
    #[arg(long, action = ArgAction::SetTrue, global = true)]
    metrics: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List personas and scenarios
    Catalog {
        #[arg(long, action = ArgAction::SetTrue)]
        json: bool,
    },
    /// Run an interactive call; every stdin line is heard as speech
    Call {
        #[arg(long)]
        persona: Option<String>,
        #[arg(long)]
        scenario: Option<String>,
        /// End-of-utterance silence window
        #[arg(long)]
        silence_ms: Option<u64>,
        #[arg(long)]
        debounce_ms: Option<u64>,
        /// Simulated playback speed of the counterpart voice
        #[arg(long, default_value_t = 40)]
        speech_ms_per_char: u64,
    },
    /// Score a transcript file (JSON or YAML list of turns)
    Eval {
        transcript: PathBuf,
        #[arg(long)]
        context: Option<String>,
    },
    /// Check a transcript file against a scenario checklist
    Checklist {
        transcript: PathBuf,
        #[arg(long)]
        scenario: Option<String>,
    },
}

fn setup_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_tracing();
    let cli = Cli::parse();

    let mut config = TrainerConfig::resolve(cli.config.as_deref())?;
    if cli.mock {
        config.chat.backend = "mock".to_string();
    }
    if let Some(dir) = cli.catalog_dir.clone() {
        config.catalog_dir = Some(dir);
    }
    let catalog = load_catalog(&config)?;

    call_core::init()?;
    llm_services::init()?;
    let metrics = MetricsHub::new()?;

    match cli.command {
        Commands::Catalog { json } => print_catalog(&catalog, json)?,
        Commands::Call {
            persona,
            scenario,
            silence_ms,
            debounce_ms,
            speech_ms_per_char,
        } => {
            if let Some(p) = persona {
                config.persona = p;
            }
            if let Some(s) = scenario {
                config.scenario = s;
            }
            if let Some(ms) = silence_ms {
                config.call.silence_ms = ms;
            }
            if let Some(ms) = debounce_ms {
                config.call.evaluation_debounce_ms = ms;
            }
            run_call(config, catalog, &metrics, speech_ms_per_char).await?;
        }
        Commands::Eval {
            transcript,
            context,
        } => run_eval(&config, &transcript, context).await?,
        Commands::Checklist {
            transcript,
            scenario,
        } => {
            let scenario = scenario.unwrap_or_else(|| config.scenario.clone());
            run_checklist(&catalog, &scenario, &transcript)?;
        }
    }

    if cli.metrics {
        print!("{}", metrics.encode_text());
    }
    Ok(())
}

fn load_catalog(config: &TrainerConfig) -> Result<Catalog> {
    let base = builtin_catalog();
    match &config.catalog_dir {
        Some(dir) => load_catalog_dir(base, dir),
        None => Ok(base),
    }
}

fn load_transcript(path: &Path) -> Result<Vec<Turn>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading transcript: {}", path.display()))?;
    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    let turns = if is_json {
        serde_json::from_str(&raw)
            .with_context(|| format!("parsing json: {}", path.display()))?
    } else {
        serde_yaml::from_str(&raw)
            .with_context(|| format!("parsing yaml: {}", path.display()))?
    };
    Ok(turns)
}

fn print_catalog(catalog: &Catalog, json: bool) -> Result<()> {
    if json {
        let doc = serde_json::json!({
            "personas": catalog.personas.values().collect::<Vec<_>>(),
            "scenarios": catalog.scenarios.values().collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&doc)?);
        return Ok(());
    }
    println!("Personas:");
    for persona in catalog.personas.values() {
        println!("  {:<12} {} [{}]", persona.id, persona.title, persona.disc);
    }
    println!("Scenarios:");
    for scenario in catalog.scenarios.values() {
        println!(
            "  {:<12} {} ({} objectives)",
            scenario.id,
            scenario.title,
            scenario.tasks.len()
        );
    }
    Ok(())
}

fn speaker_label(speaker: Speaker) -> &'static str {
    match speaker {
        Speaker::Trainee => "Вы",
        Speaker::Counterpart => "Клиент",
    }
}

fn describe_evaluation(outcome: &EvaluationOutcome) -> String {
    match outcome {
        Ok(report) => format!("Оценка: {:.1}/10. {}", report.total, report.summary),
        Err(failure) => match &failure.details {
            Some(details) => format!("Оценка недоступна: {} ({details})", failure.error),
            None => format!("Оценка недоступна: {}", failure.error),
        },
    }
}

async fn print_updates(mut rx: watch::Receiver<SessionView>) {
    let mut shown_turns = 0;
    let mut shown_evaluation: Option<String> = None;
    let mut shown_fault = None;
    while rx.changed().await.is_ok() {
        let view = rx.borrow_and_update().clone();
        if view.transcript.len() < shown_turns {
            println!("--- new session {} ---", view.session);
            shown_turns = 0;
        }
        for turn in &view.transcript[shown_turns..] {
            println!("{}: {}", speaker_label(turn.speaker), turn.text);
        }
        shown_turns = view.transcript.len();

        if let Some(outcome) = &view.evaluation {
            let line = describe_evaluation(outcome);
            if shown_evaluation.as_deref() != Some(line.as_str()) {
                println!("{line}");
                shown_evaluation = Some(line);
            }
        }
        if view.last_fault != shown_fault {
            if let Some(fault) = &view.last_fault {
                println!("Микрофон: {fault}");
            }
            shown_fault = view.last_fault.clone();
        }
    }
}

fn print_summary(catalog: &Catalog, scenario: &str, view: &SessionView) {
    println!();
    if let Some(scenario) = catalog.scenario(scenario) {
        println!("{}", scenario.title);
        for task in &scenario.tasks {
            let done = view.checklist.get(&task.id).copied().unwrap_or(false);
            println!("  [{}] {}", if done { "x" } else { " " }, task.text);
        }
    }
    if let Some(outcome) = &view.evaluation {
        println!("{}", describe_evaluation(outcome));
    }
}

async fn run_call(
    config: TrainerConfig,
    catalog: Catalog,
    metrics: &MetricsHub,
    speech_ms_per_char: u64,
) -> Result<()> {
    let catalog = Arc::new(catalog);
    let session = CallSession::for_scenario(
        config.call.clone(),
        &catalog,
        &config.persona,
        &config.scenario,
    )?;
    let dialogue = create_dialogue_service(&config.chat, catalog.clone())?;
    let evaluator = create_evaluation_service(&config.chat)?;

    let capture = MockCapture::new(config.call.capture.clone());
    let mic = capture.microphone();
    let synthesis = MockSynthesis::new(
        default_voices(),
        Duration::from_millis(speech_ms_per_char),
    );
    let handle = spawn_call(
        session,
        Box::new(capture),
        Box::new(synthesis),
        CallServices {
            dialogue,
            evaluator,
        },
        Some(metrics.clone()),
    );
    info!(
        "call with {} on scenario {} ({} backend)",
        config.persona, config.scenario, config.chat.backend
    );

    if let Some(scenario) = catalog.scenario(&config.scenario) {
        println!("{}", scenario.title);
        if let Some(tips) = &scenario.tips {
            println!("{tips}");
        }
    }
    println!("Commands: :send <text>, :eval, :stop, :start, :quit. Any other line is spoken.");

    let printer = tokio::spawn(print_updates(handle.subscribe()));
    handle.start()?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        match line {
            "" => continue,
            ":quit" | ":q" => break,
            ":eval" => handle.evaluate_now()?,
            ":stop" => handle.stop()?,
            ":start" => handle.start()?,
            _ => {
                if let Some(text) = line.strip_prefix(":send ") {
                    handle.send_utterance(text)?;
                } else if !mic.say(line) {
                    warn!("microphone is not capturing, line dropped");
                }
            }
        }
    }

    // piped input ends before the last utterance is answered
    let settled = tokio::time::timeout(
        Duration::from_secs(30),
        handle.wait_for(|v| v.pending_text.is_empty() && !v.busy && !v.counterpart_speaking),
    )
    .await;
    if settled.is_err() {
        warn!("call did not settle before shutdown");
    }

    let session = handle.shutdown().await?;
    printer.abort();
    print_summary(&catalog, &config.scenario, &session.view());
    Ok(())
}

async fn run_eval(config: &TrainerConfig, path: &Path, context: Option<String>) -> Result<()> {
    let transcript = load_transcript(path)?;
    let evaluator = create_evaluation_service(&config.chat)?;
    let request = EvaluationRequest {
        transcript,
        context: context.unwrap_or_else(|| config.call.evaluation_context.clone()),
    };
    let outcome = evaluator.evaluate(&request).await;
    let doc = match &outcome {
        Ok(report) => serde_json::to_value(report)?,
        Err(failure) => serde_json::to_value(failure)?,
    };
    println!("{}", serde_json::to_string_pretty(&doc)?);
    Ok(())
}

fn run_checklist(catalog: &Catalog, scenario_id: &str, path: &Path) -> Result<()> {
    let scenario = catalog
        .scenario(scenario_id)
        .with_context(|| format!("unknown scenario: {scenario_id}"))?;
    let transcript = load_transcript(path)?;
    let marks = checklist::recompute(&transcript, &scenario.tasks);
    println!("{}", scenario.title);
    for task in &scenario.tasks {
        let done = marks.get(&task.id).copied().unwrap_or(false);
        println!("  [{}] {}", if done { "x" } else { " " }, task.text);
    }
    let done = marks.values().filter(|v| **v).count();
    println!("{done}/{} objectives met", scenario.tasks.len());
    Ok(())
}
