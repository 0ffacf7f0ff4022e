use anyhow::{Context, Result};
use crossci::cli::commands::{
    HistoryCommand, ProfileAction, ProfileCommand, PruneCommand, RunCommand, ValidateCommand,
};
use crossci::cli::output::*;
use crossci::cli::terminal_output::TerminalReporter;
use crossci::cli::{Cli, Command};
use crossci::core::config::WorkflowConfig;
use crossci::core::{RunContext, TriggerEvent};
use crossci::execution::{
    CacheManager, CommandRunner, DryRunRunner, ExecutionEngine, ShellRunner, StepExecutor,
};
use crossci::persistence::{create_summary, InMemoryPersistence, PersistenceBackend, RunSummary};
use crossci::profile::ProfileStore;
use crossci::registry::{retention_plan, InMemoryRegistry, LocalFeedRegistry, PackageRegistry};
use crossci::{core::matrix::expand_home, prune_versions};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::error;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set logging subscriber")?;

    // Execute command
    match &cli.command {
        Command::Run(cmd) => run_workflow(cmd, cli.verbose).await?,
        Command::Validate(cmd) => validate_workflow(cmd)?,
        Command::Profile(cmd) => show_profiles(cmd)?,
        Command::Prune(cmd) => prune_packages(cmd).await?,
        Command::History(cmd) => show_history(cmd).await?,
    }

    Ok(())
}

fn load_profiles(dir: Option<&str>) -> Result<ProfileStore> {
    match dir {
        Some(dir) => ProfileStore::load_dir(expand_home(dir))
            .with_context(|| format!("Failed to load profiles from {}", dir)),
        None => Ok(ProfileStore::new()),
    }
}

/// Open the history/cache database, or an in-memory store when history is off
async fn open_store(no_history: bool) -> Result<Arc<dyn PersistenceBackend>> {
    if no_history {
        return Ok(Arc::new(InMemoryPersistence::new()));
    }

    #[cfg(feature = "sqlite")]
    {
        Ok(Arc::new(
            crossci::persistence::SqliteStore::with_default_path().await?,
        ))
    }

    #[cfg(not(feature = "sqlite"))]
    {
        Ok(Arc::new(InMemoryPersistence::new()))
    }
}

async fn run_workflow(cmd: &RunCommand, verbose: bool) -> Result<()> {
    let config = WorkflowConfig::from_file(&cmd.file).context("Failed to load workflow config")?;
    let profiles = load_profiles(cmd.profiles.as_deref())?;
    config.validate_profiles(&profiles)?;

    println!("{} Loaded workflow: {}", INFO, style(&config.name).bold());

    let mut run = RunContext::new(&cmd.branch, TriggerEvent::from(cmd.event));
    if !config.trigger.matches(run.event, &run.branch) {
        println!(
            "{} {} on {} does not trigger {}, nothing to do",
            INFO,
            run.event,
            style(&run.branch).cyan(),
            style(&config.name).bold()
        );
        return Ok(());
    }

    for (key, value) in &cmd.var {
        run.variables.insert(key.clone(), value.clone());
        println!(
            "{} Variable override: {} = {}",
            INFO,
            style(key).cyan(),
            style(value).dim()
        );
    }

    // secrets are only ever read here; the library receives them explicitly
    for name in &cmd.secret {
        let value = std::env::var(name)
            .with_context(|| format!("Secret {} is not set in the environment", name))?;
        run.secrets.insert(name.clone(), value);
    }

    let mut workflow = config.to_workflow()?;
    workflow.retain_entries(&cmd.entry);
    if workflow.entries.is_empty() {
        anyhow::bail!("No matrix entries match {:?}", cmd.entry);
    }

    let store = open_store(!cmd.records_history()).await?;
    let cache_root = cmd
        .cache_dir
        .as_deref()
        .map(expand_home)
        .unwrap_or_else(CacheManager::default_root);
    let cache = Arc::new(CacheManager::new(cache_root, store.clone()));

    let registry: Arc<dyn PackageRegistry> = if cmd.dry_run {
        Arc::new(InMemoryRegistry::new())
    } else {
        match cmd
            .registry
            .as_deref()
            .map(expand_home)
            .or_else(|| workflow.registry_path.clone())
        {
            Some(path) => Arc::new(LocalFeedRegistry::new(path)),
            None => Arc::new(LocalFeedRegistry::new(default_feed_dir())),
        }
    };

    let summary = if cmd.dry_run {
        println!("{} Dry run: commands are printed, not executed", WARN);
        let executor = StepExecutor::new(DryRunRunner::new()).with_registry(registry);
        execute(executor, cmd, &workflow, &run, &profiles, verbose).await?
    } else {
        let executor = StepExecutor::new(ShellRunner::new())
            .with_cache(cache)
            .with_registry(registry);
        execute(executor, cmd, &workflow, &run, &profiles, verbose).await?
    };

    if cmd.records_history() {
        store.save_run(&summary).await?;
        println!(
            "\n{} Run saved to history (ID: {})",
            INFO,
            style(&summary.run_id.to_string()[..8]).dim()
        );
    }

    if summary.status != crossci::ExecutionStatus::Completed {
        std::process::exit(1);
    }

    Ok(())
}

async fn execute<R: CommandRunner + 'static>(
    executor: StepExecutor<R>,
    cmd: &RunCommand,
    workflow: &crossci::Workflow,
    run: &RunContext,
    profiles: &ProfileStore,
    verbose: bool,
) -> Result<RunSummary> {
    let mut engine = ExecutionEngine::new(executor);
    if let Some(strategy) = cmd.strategy {
        engine = engine.with_strategy(strategy);
    }

    let reporter = Arc::new(TerminalReporter::new(workflow.entries.len(), verbose));
    let handler = reporter.clone();
    engine
        .add_event_handler(move |event| handler.handle(&event))
        .await;

    println!();
    let result = engine.execute(workflow, run, profiles).await?;

    reporter.print_separator();
    println!("{}", format_run_report(&result));

    if result.is_success() {
        println!(
            "\n{} {} completed {}",
            CHECK,
            style(&result.workflow_name).bold(),
            style("successfully").green()
        );
    } else {
        println!(
            "\n{} {} {}",
            CROSS,
            style(&result.workflow_name).bold(),
            style("failed").red()
        );
        error!("Workflow {} failed", result.workflow_name);
    }

    Ok(create_summary(&result))
}

fn validate_workflow(cmd: &ValidateCommand) -> Result<()> {
    println!("{} Validating workflow...", INFO);

    let result = WorkflowConfig::from_file(&cmd.file).and_then(|config| {
        let profiles = load_profiles(cmd.profiles.as_deref())?;
        config.validate_profiles(&profiles)?;
        Ok(config)
    });

    match result {
        Ok(config) => {
            println!("{} Workflow configuration is valid!", CHECK);
            println!("  Name: {}", style(&config.name).bold());
            println!("  Matrix entries: {}", style(config.matrix.len()).cyan());
            println!("  Steps: {}", style(config.steps.len()).cyan());
            println!("  Variables: {}", style(config.variable_count()).cyan());

            if cmd.json {
                let json = serde_json::to_string_pretty(&config)?;
                println!("\n{}", json);
            }
            Ok(())
        }
        Err(e) => {
            println!("{} Validation failed:", CROSS);
            println!("  {}", style(format!("{:#}", e)).red());
            std::process::exit(1);
        }
    }
}

fn show_profiles(cmd: &ProfileCommand) -> Result<()> {
    match &cmd.action {
        ProfileAction::List { dir, json } => {
            let store = load_profiles(Some(dir))?;
            if *json {
                let names: Vec<&str> = store.names().collect();
                println!("{}", serde_json::to_string_pretty(&names)?);
                return Ok(());
            }
            if store.is_empty() {
                println!("{} No profiles found in {}", INFO, dir);
                return Ok(());
            }
            println!("{} Profiles in {}:", INFO, style(dir).dim());
            for name in store.names() {
                let profile = store.get(name)?;
                println!(
                    "  {} ({}/{})",
                    style(name).bold(),
                    profile.host.system,
                    profile.host.cpu_family
                );
            }
        }
        ProfileAction::Show { name, dir, json } => {
            let store = load_profiles(Some(dir))?;
            let profile = store.get(name)?;
            if *json {
                println!("{}", serde_json::to_string_pretty(profile)?);
            } else {
                println!("{}", format_profile(profile));
            }
        }
    }
    Ok(())
}

async fn prune_packages(cmd: &PruneCommand) -> Result<()> {
    let feed = LocalFeedRegistry::new(expand_home(&cmd.registry));

    if cmd.dry_run {
        let versions = feed.list_versions(&cmd.package).await?;
        let (_, expired) = retention_plan(versions, cmd.keep);
        println!(
            "{} Would delete {} version(s) of {}:",
            INFO,
            style(expired.len()).cyan(),
            style(&cmd.package).bold()
        );
        for version in &expired {
            println!("  {}", version.version);
        }
        return Ok(());
    }

    let deleted = prune_versions(&feed, &cmd.package, cmd.keep)
        .await
        .with_context(|| format!("Failed to prune {}", cmd.package))?;
    println!(
        "{} Deleted {} version(s) of {}, keeping the {} most recent",
        CHECK,
        style(deleted.len()).cyan(),
        style(&cmd.package).bold(),
        cmd.keep
    );
    for version in &deleted {
        println!("  {}", style(&version.version).dim());
    }
    Ok(())
}

async fn show_history(cmd: &HistoryCommand) -> Result<()> {
    let store = open_store(false).await?;

    if let Some(run_id) = &cmd.run_id {
        let run_id = uuid::Uuid::parse_str(run_id).context("Invalid run ID format")?;
        match store.load_run(run_id).await? {
            Some(summary) => print_run_details(&summary, cmd.json)?,
            None => println!("{} Run not found", WARN),
        }
        return Ok(());
    }

    let mut runs = match &cmd.workflow {
        Some(name) => store.list_runs(name).await?,
        None => {
            let mut all_runs = Vec::new();
            for name in store.list_workflows().await? {
                all_runs.extend(store.list_runs(&name).await?);
            }
            all_runs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
            all_runs
        }
    };
    runs.truncate(cmd.limit);

    if cmd.json {
        let data = serde_json::json!({ "runs": runs });
        println!("{}", serde_json::to_string_pretty(&data)?);
        return Ok(());
    }

    if runs.is_empty() {
        println!("{} No runs found", INFO);
        return Ok(());
    }

    println!("{} Run history (showing latest {}):", INFO, cmd.limit);
    for summary in &runs {
        println!("  {}", format_run_summary(summary));
    }

    Ok(())
}

fn print_run_details(summary: &RunSummary, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(summary)?);
        return Ok(());
    }

    println!("{} Run Details", INFO);
    println!("  ID: {}", style(summary.run_id).cyan());
    println!("  Workflow: {}", style(&summary.workflow_name).bold());
    println!("  Trigger: {} on {}", summary.event, style(&summary.branch).cyan());
    println!("  Status: {}", format_status(summary.status));
    println!("  Started: {}", style(summary.started_at.to_rfc3339()).dim());
    if let Some(completed) = summary.completed_at {
        println!("  Completed: {}", style(completed.to_rfc3339()).dim());
        if let Ok(duration) = completed.signed_duration_since(summary.started_at).to_std() {
            println!("  Duration: {}", style(format_duration(duration)).dim());
        }
    }

    println!("  {}", style("Entries:").bold());
    for entry in &summary.entries {
        println!(
            "    {} {} ({}) {}/{} completed, {} failed, {} skipped",
            format_status(entry.status),
            style(&entry.name).bold(),
            entry.target,
            entry.completed_steps,
            entry.total_steps,
            entry.failed_steps,
            entry.skipped_steps
        );
    }

    Ok(())
}

fn default_feed_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("crossci")
        .join("feed")
}
