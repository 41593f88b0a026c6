use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use fixflow_config::TaskTemplate;
use fixflow_engine::{Action, ActionOutcome, NewTask, WorkflowEngine};
use fixflow_store::SqliteStore;
use fixflow_workflow::{ProgressReport, TaskNote, TaskStep, WorkflowState, rules};

/// Fixflow - guided remediation workflows for reported defects
#[derive(Parser)]
#[command(name = "fixflow")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Path to the data directory (default: ~/.fixflow)
  #[arg(long, global = true, env = "FIXFLOW_DATA_DIR")]
  data_dir: Option<PathBuf>,

  /// Name recorded on completed steps and notes
  #[arg(long, global = true, env = "FIXFLOW_ACTOR", default_value = "cli")]
  actor: String,

  /// Print results as JSON
  #[arg(long, global = true)]
  json: bool,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Create and list tasks
  Task {
    #[command(subcommand)]
    command: TaskCommand,
  },

  /// Show the workflow state of a task
  State { task_id: String },

  /// Complete the current step
  Complete {
    task_id: String,
    step_id: String,

    #[arg(long)]
    note: Option<String>,
  },

  /// Answer the current decision step
  Decide {
    task_id: String,
    step_id: String,

    /// Yes or No
    answer: String,

    #[arg(long)]
    note: Option<String>,
  },

  /// Roll back to a previously completed step
  Back { task_id: String, step_id: String },

  /// Add a note to a task
  Note { task_id: String, content: String },

  /// List the notes of a task
  Notes { task_id: String },

  /// Apply an action read as JSON from stdin
  Apply { task_id: String },
}

#[derive(Subcommand)]
enum TaskCommand {
  /// Create a task from a template file
  Create {
    /// Path to the template file (JSON)
    template_file: PathBuf,

    #[arg(long)]
    title: String,

    /// The defect this task remediates
    #[arg(long)]
    defect_id: String,

    #[arg(long, default_value = "")]
    description: String,

    #[arg(long)]
    product_version: Option<String>,
  },

  /// List tasks with their progress
  List,
}

fn main() -> Result<()> {
  let cli = Cli::parse();

  let Some(command) = cli.command else {
    println!("fixflow - use --help to see available commands");
    return Ok(());
  };

  init_tracing()?;

  let data_dir = match cli.data_dir {
    Some(dir) => dir,
    None => dirs::home_dir()
      .context("could not determine home directory")?
      .join(".fixflow"),
  };
  let output = Output { json: cli.json };

  let rt = tokio::runtime::Runtime::new()?;
  rt.block_on(async { run(command, &data_dir, &cli.actor, output).await })
}

fn init_tracing() -> Result<()> {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(io::stderr)
    .try_init()
    .map_err(|e| anyhow::anyhow!(e))
    .context("failed to initialize logging")
}

async fn open_engine(data_dir: &Path) -> Result<WorkflowEngine> {
  tokio::fs::create_dir_all(data_dir)
    .await
    .with_context(|| format!("failed to create data directory: {}", data_dir.display()))?;

  let db_path = data_dir.join("fixflow.db");
  debug!(path = %db_path.display(), "opening task database");
  let store = SqliteStore::open(&db_path)
    .await
    .with_context(|| format!("failed to open database: {}", db_path.display()))?;

  Ok(WorkflowEngine::new(Arc::new(store)))
}

async fn run(command: Commands, data_dir: &Path, actor: &str, output: Output) -> Result<()> {
  let engine = open_engine(data_dir).await?;

  match command {
    Commands::Task { command } => match command {
      TaskCommand::Create {
        template_file,
        title,
        defect_id,
        description,
        product_version,
      } => {
        let template = load_template(&template_file).await?;
        let details = NewTask {
          title,
          description,
          defect_id,
          product_version,
        };
        let state = engine
          .create_from_template(&template, details, actor)
          .await
          .context("failed to create task")?;
        output.state(&state)
      }
      TaskCommand::List => {
        let report = engine.report().await.context("failed to list tasks")?;
        output.report(&report)
      }
    },
    Commands::State { task_id } => {
      let state = engine
        .get_state(&task_id)
        .await
        .with_context(|| format!("failed to load task '{}'", task_id))?;
      output.state(&state)
    }
    Commands::Complete {
      task_id,
      step_id,
      note,
    } => {
      let state = engine
        .complete_step(&task_id, &step_id, note.as_deref(), actor)
        .await
        .with_context(|| format!("failed to complete step '{}'", step_id))?;
      output.state(&state)
    }
    Commands::Decide {
      task_id,
      step_id,
      answer,
      note,
    } => {
      let state = engine
        .make_decision(&task_id, &step_id, &answer, note.as_deref(), actor)
        .await
        .with_context(|| format!("failed to answer step '{}'", step_id))?;
      output.state(&state)
    }
    Commands::Back { task_id, step_id } => {
      let state = engine
        .go_back(&task_id, &step_id, actor)
        .await
        .with_context(|| format!("failed to go back to step '{}'", step_id))?;
      output.state(&state)
    }
    Commands::Note { task_id, content } => {
      let note = engine
        .add_note(&task_id, &content, actor)
        .await
        .context("failed to add note")?;
      output.notes(std::slice::from_ref(&note))
    }
    Commands::Notes { task_id } => {
      let notes = engine
        .list_notes(&task_id)
        .await
        .with_context(|| format!("failed to list notes for task '{}'", task_id))?;
      output.notes(&notes)
    }
    Commands::Apply { task_id } => {
      let action = read_action_from_stdin()?;
      let outcome = engine
        .apply(&task_id, action, actor)
        .await
        .context("failed to apply action")?;
      match outcome {
        ActionOutcome::State(state) => output.state(&state),
        ActionOutcome::Note(note) => output.notes(std::slice::from_ref(&note)),
      }
    }
  }
}

async fn load_template(path: &Path) -> Result<TaskTemplate> {
  let content = tokio::fs::read_to_string(path)
    .await
    .with_context(|| format!("failed to read template file: {}", path.display()))?;

  TaskTemplate::from_json(&content)
    .with_context(|| format!("failed to parse template file: {}", path.display()))
}

fn read_action_from_stdin() -> Result<Action> {
  if io::stdin().is_terminal() {
    bail!("expected an action as JSON on stdin, e.g. {{\"action\": \"complete\", \"step_id\": \"...\"}}");
  }

  let mut input = String::new();
  io::stdin()
    .read_to_string(&mut input)
    .context("failed to read action from stdin")?;
  serde_json::from_str(&input).context("failed to parse action JSON from stdin")
}

/// Renders command results as text or JSON.
#[derive(Clone, Copy)]
struct Output {
  json: bool,
}

impl Output {
  fn state(&self, state: &WorkflowState) -> Result<()> {
    if self.json {
      println!("{}", serde_json::to_string_pretty(state)?);
      return Ok(());
    }

    let progress = &state.progress;
    println!(
      "Task {} [{}] {}/{} steps ({}%)",
      state.task_id,
      state.task_status,
      progress.completed_steps_count,
      progress.total_steps_count,
      progress.completion_percentage
    );

    if !state.completed_steps.is_empty() {
      println!("Completed:");
      for step in &state.completed_steps {
        let by = step.completed_by.as_deref().unwrap_or("-");
        match step.decision_answer {
          Some(answer) => println!("  [x] {} -> {} ({})", step.action, answer, by),
          None => println!("  [x] {} ({})", step.action, by),
        }
      }
    }

    match &state.current_step {
      Some(step) => println!("Current: {}  {}{}", step.step_id, step.action, flags(step)),
      None if progress.is_complete => println!("Task complete."),
      None => println!("No current step."),
    }

    for entry in &state.preview {
      match entry.condition {
        Some(answer) => println!("  if {:<3} -> {}", answer.as_str(), entry.step.action),
        None => println!("  next   -> {}", entry.step.action),
      }
    }
    Ok(())
  }

  fn report(&self, report: &ProgressReport) -> Result<()> {
    if self.json {
      println!("{}", serde_json::to_string_pretty(report)?);
      return Ok(());
    }

    for summary in &report.tasks {
      println!(
        "{}  {:<11} {:>3}%  {}",
        summary.task_id,
        summary.status.as_str(),
        summary.progress.completion_percentage,
        summary.title
      );
    }
    let rollup = &report.rollup;
    println!(
      "{} tasks, {} complete, {}/{} steps ({}%)",
      rollup.task_count,
      rollup.completed_task_count,
      rollup.completed_steps_count,
      rollup.total_steps_count,
      rollup.completion_percentage
    );
    Ok(())
  }

  fn notes(&self, notes: &[TaskNote]) -> Result<()> {
    if self.json {
      println!("{}", serde_json::to_string_pretty(notes)?);
      return Ok(());
    }

    for note in notes {
      println!(
        "{} {}: {}",
        note.created_at.format("%Y-%m-%d %H:%M"),
        note.author,
        note.content
      );
    }
    Ok(())
  }
}

fn flags(step: &TaskStep) -> String {
  let mut flags = Vec::new();
  if step.is_decision {
    flags.push("decision");
  }
  if step.is_terminal {
    flags.push("terminal");
  }
  if rules::requires_note_for(step) {
    flags.push("note required");
  }
  if flags.is_empty() {
    String::new()
  } else {
    format!(" [{}]", flags.join(", "))
  }
}
