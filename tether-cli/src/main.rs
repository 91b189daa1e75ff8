mod config;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use colored::Colorize;

use tether_core::differ::{create_plan, destroy_plan};
use tether_core::effect::Effect;
use tether_core::interpreter::{ApplyResult, EffectOutcome, Interpreter, InterpreterConfig};
use tether_core::plan::Plan;
use tether_core::provider::Provider;
use tether_core::resource::{Resource, ResourceId, State, Value};
use tether_core::schema::{DriftDetection, ResourceSchema};
use tether_provider_okta::{OktaConfig, OktaProvider, schemas};
use tether_state::{ResourceState, StateBackend, StateFile, create_backend};

use config::Configuration;

#[derive(Parser)]
#[command(name = "tether")]
#[command(about = "Manage single entries of list attributes on remote objects", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the configuration file
    Validate {
        /// Path to configuration file
        #[arg(default_value = "tether.json")]
        file: PathBuf,
    },
    /// Show execution plan without applying changes
    Plan {
        /// Path to configuration file
        #[arg(default_value = "tether.json")]
        file: PathBuf,
    },
    /// Apply changes to reach the desired state
    Apply {
        /// Path to configuration file
        #[arg(default_value = "tether.json")]
        file: PathBuf,

        /// Maximum number of changes in flight at once
        #[arg(long, default_value_t = 10)]
        parallelism: usize,
    },
    /// Destroy all tracked resources
    Destroy {
        /// Path to configuration file
        #[arg(default_value = "tether.json")]
        file: PathBuf,

        /// Skip confirmation prompt (auto-approve)
        #[arg(long)]
        auto_approve: bool,

        /// Maximum number of changes in flight at once
        #[arg(long, default_value_t = 10)]
        parallelism: usize,
    },
    /// Start tracking an existing entry, e.g. `import okta.app_oauth_redirect_uri.cb 0oa1/https://host/cb`
    Import {
        /// Resource address: <type>.<name>
        address: String,

        /// Import id: <app_id>/<uri>
        id: String,

        /// Path to configuration file
        #[arg(long, default_value = "tether.json")]
        file: PathBuf,
    },
    /// State inspection commands
    State {
        #[command(subcommand)]
        command: StateCommands,
    },
}

#[derive(Subcommand)]
enum StateCommands {
    /// List tracked resources
    List {
        /// Path to configuration file
        #[arg(default_value = "tether.json")]
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Validate { file } => run_validate(&file),
        Commands::Plan { file } => run_plan(&file).await,
        Commands::Apply { file, parallelism } => run_apply(&file, parallelism).await,
        Commands::Destroy {
            file,
            auto_approve,
            parallelism,
        } => run_destroy(&file, auto_approve, parallelism).await,
        Commands::Import { address, id, file } => run_import(&file, &address, &id).await,
        Commands::State { command } => match command {
            StateCommands::List { file } => run_state_list(&file).await,
        },
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn get_schemas() -> HashMap<String, ResourceSchema> {
    let mut all_schemas = HashMap::new();
    for schema in schemas::all_schemas() {
        all_schemas.insert(schema.resource_type.clone(), schema);
    }
    all_schemas
}

fn validate_resources(resources: &[Resource]) -> Result<(), String> {
    let schemas = get_schemas();
    let mut all_errors = Vec::new();

    for resource in resources {
        match schemas.get(&resource.id.resource_type) {
            Some(schema) => {
                if let Err(errors) = schema.validate(&resource.attributes) {
                    for error in errors {
                        all_errors.push(format!("{}: {}", resource.id, error));
                    }
                }
            }
            None => all_errors.push(format!(
                "{}: unknown resource type '{}'",
                resource.id, resource.id.resource_type
            )),
        }
    }

    if all_errors.is_empty() {
        Ok(())
    } else {
        Err(all_errors.join("\n"))
    }
}

/// Directory that relative paths in the configuration file resolve against
fn config_dir(file: &Path) -> &Path {
    file.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."))
}

fn load_resources(file: &Path) -> Result<(Configuration, Vec<Resource>), String> {
    let config = Configuration::load(file)?;
    let resources = config.resources()?;
    validate_resources(&resources)?;
    Ok((config, resources))
}

fn open_backend(config: &Configuration, file: &Path) -> Result<Box<dyn StateBackend>, String> {
    create_backend(&config.backend_config(config_dir(file))).map_err(|e| e.to_string())
}

fn get_provider(config: &Configuration) -> Result<Arc<OktaProvider>, String> {
    let okta = OktaConfig::resolve(&config.provider.okta).map_err(|e| e.to_string())?;
    log::debug!("using Okta org {}", okta.org_url);
    OktaProvider::new(&okta)
        .map(Arc::new)
        .map_err(|e| e.to_string())
}

/// Current state of every tracked resource
///
/// Types whose schema disables drift detection keep their tracked state;
/// the rest are read back from the provider.
async fn refresh_states<P: Provider + ?Sized>(
    provider: &P,
    state_file: &StateFile,
    schemas: &HashMap<String, ResourceSchema>,
) -> Result<HashMap<ResourceId, State>, String> {
    let mut current_states = HashMap::new();
    for (id, prior) in state_file.current_states() {
        let detects_drift = schemas
            .get(&id.resource_type)
            .is_none_or(|schema| schema.drift_detection == DriftDetection::Enabled);
        if !detects_drift {
            log::debug!("{}: drift detection disabled, using tracked state", id);
            current_states.insert(id, prior);
            continue;
        }

        let state = provider
            .read(&id, Some(&prior))
            .await
            .map_err(|e| format!("Failed to read state: {}", e))?;
        current_states.insert(id, state);
    }
    Ok(current_states)
}

fn run_validate(file: &Path) -> Result<(), String> {
    println!("{}", "Validating...".cyan());

    let (_, resources) = load_resources(file)?;

    println!(
        "{}",
        format!("✓ {} resources validated successfully.", resources.len())
            .green()
            .bold()
    );

    for resource in &resources {
        println!("  • {}", resource.id);
    }

    Ok(())
}

async fn run_plan(file: &Path) -> Result<(), String> {
    let (config, resources) = load_resources(file)?;
    let provider = get_provider(&config)?;
    let backend = open_backend(&config, file)?;

    let state_file = backend
        .read_state()
        .await
        .map_err(|e| e.to_string())?
        .unwrap_or_default();
    let current_states = refresh_states(provider.as_ref(), &state_file, &get_schemas()).await?;

    let plan = create_plan(&resources, &current_states, &get_schemas());
    print_plan(&plan);
    Ok(())
}

async fn run_apply(file: &Path, parallelism: usize) -> Result<(), String> {
    let (config, resources) = load_resources(file)?;
    let provider = get_provider(&config)?;
    let backend = open_backend(&config, file)?;

    let lock = backend
        .acquire_lock("apply")
        .await
        .map_err(|e| e.to_string())?;
    let result = apply_locked(backend.as_ref(), provider, parallelism, |current| {
        Ok(create_plan(&resources, current, &get_schemas()))
    })
    .await;
    release(backend.as_ref(), &lock).await;
    result
}

async fn run_destroy(file: &Path, auto_approve: bool, parallelism: usize) -> Result<(), String> {
    let config = Configuration::load(file)?;
    let provider = get_provider(&config)?;
    let backend = open_backend(&config, file)?;

    let lock = backend
        .acquire_lock("destroy")
        .await
        .map_err(|e| e.to_string())?;
    let result = apply_locked(backend.as_ref(), provider, parallelism, |current| {
        let plan = destroy_plan(current);
        if plan.is_empty() || auto_approve {
            return Ok(plan);
        }
        print_plan(&plan);
        println!();
        if confirm_destroy()? {
            Ok(plan)
        } else {
            println!();
            println!("{}", "Destroy cancelled.".yellow());
            Ok(Plan::new())
        }
    })
    .await;
    release(backend.as_ref(), &lock).await;
    result
}

async fn release(backend: &dyn StateBackend, lock: &tether_state::LockInfo) {
    if let Err(e) = backend.release_lock(lock).await {
        eprintln!(
            "{} failed to release state lock {}: {}",
            "Warning:".yellow().bold(),
            lock.id,
            e
        );
    }
}

fn confirm_destroy() -> Result<bool, String> {
    println!(
        "{}",
        "Do you really want to destroy all resources?"
            .yellow()
            .bold()
    );
    println!(
        "  {}",
        "This action cannot be undone. Type 'yes' to confirm.".yellow()
    );
    print!("\n  Enter a value: ");
    std::io::Write::flush(&mut std::io::stdout()).map_err(|e| e.to_string())?;

    let mut input = String::new();
    std::io::stdin()
        .read_line(&mut input)
        .map_err(|e| e.to_string())?;
    Ok(input.trim() == "yes")
}

/// Plan, apply and persist while the caller holds the state lock
async fn apply_locked<F>(
    backend: &dyn StateBackend,
    provider: Arc<OktaProvider>,
    parallelism: usize,
    make_plan: F,
) -> Result<(), String>
where
    F: FnOnce(&HashMap<ResourceId, State>) -> Result<Plan, String>,
{
    let mut state_file = backend
        .read_state()
        .await
        .map_err(|e| e.to_string())?
        .unwrap_or_default();
    let current_states = refresh_states(provider.as_ref(), &state_file, &get_schemas()).await?;

    let plan = make_plan(&current_states)?;
    if plan.is_empty() {
        println!("{}", "No changes needed.".green());
        return Ok(());
    }

    print_plan(&plan);
    println!();
    println!("{}", "Applying changes...".cyan().bold());
    println!();

    let provider_name = provider.name();
    let interpreter = Interpreter::from_shared(provider).with_config(InterpreterConfig {
        parallelism,
        ..Default::default()
    });
    let result = interpreter.apply(&plan).await;

    for (effect, outcome) in &result.outcomes {
        match outcome {
            Ok(_) => println!("  {} {}", "✓".green(), format_effect(effect)),
            Err(e) => println!("  {} {} - {}", "✗".red(), format_effect(effect), e),
        }
    }

    record_outcomes(&mut state_file, &result, provider_name);
    state_file.increment_serial();
    backend
        .write_state(&state_file)
        .await
        .map_err(|e| format!("Failed to write state: {}", e))?;

    println!();
    if result.is_success() {
        println!(
            "{}",
            format!("Apply complete! {} changes applied.", result.success_count)
                .green()
                .bold()
        );
        Ok(())
    } else {
        Err(format!(
            "Apply failed. {} succeeded, {} failed.",
            result.success_count, result.failure_count
        ))
    }
}

/// Fold successful outcomes into the state file; failed effects leave their entry as it was
fn record_outcomes(state_file: &mut StateFile, result: &ApplyResult, provider: &str) {
    for (_, outcome) in &result.outcomes {
        match outcome {
            Ok(EffectOutcome::Created { state })
            | Ok(EffectOutcome::Updated { state })
            | Ok(EffectOutcome::Replaced { state }) => {
                state_file.upsert_resource(ResourceState::from_state(state, provider));
            }
            Ok(EffectOutcome::Deleted { id }) | Ok(EffectOutcome::Forgotten { id }) => {
                state_file.remove_resource(&id.resource_type, &id.name);
            }
            Ok(EffectOutcome::Skipped { .. }) | Err(_) => {}
        }
    }
}

/// Split `<type>.<name>`; resource types contain dots themselves
fn parse_address(address: &str) -> Result<ResourceId, String> {
    match address.rsplit_once('.') {
        Some((resource_type, name)) if !resource_type.is_empty() && !name.is_empty() => {
            Ok(ResourceId::new(resource_type, name))
        }
        _ => Err(format!(
            "invalid resource address '{}': expected <type>.<name>",
            address
        )),
    }
}

async fn run_import(file: &Path, address: &str, import_id: &str) -> Result<(), String> {
    let id = parse_address(address)?;
    if !get_schemas().contains_key(&id.resource_type) {
        return Err(format!("unknown resource type '{}'", id.resource_type));
    }

    let config = Configuration::load(file)?;
    let provider = get_provider(&config)?;
    let backend = open_backend(&config, file)?;

    let lock = backend
        .acquire_lock("import")
        .await
        .map_err(|e| e.to_string())?;
    let result = import_locked(backend.as_ref(), provider.as_ref(), &id, import_id).await;
    release(backend.as_ref(), &lock).await;
    result?;

    println!("{}", format!("✓ Imported {}", id).green().bold());
    Ok(())
}

async fn import_locked(
    backend: &dyn StateBackend,
    provider: &OktaProvider,
    id: &ResourceId,
    import_id: &str,
) -> Result<(), String> {
    let mut state_file = backend
        .read_state()
        .await
        .map_err(|e| e.to_string())?
        .unwrap_or_default();
    if state_file.find_resource(&id.resource_type, &id.name).is_some() {
        return Err(format!("{} is already tracked", id));
    }

    let state = provider
        .import(id, import_id)
        .await
        .map_err(|e| e.to_string())?;
    state_file.upsert_resource(ResourceState::from_state(&state, provider.name()));
    state_file.increment_serial();
    backend
        .write_state(&state_file)
        .await
        .map_err(|e| format!("Failed to write state: {}", e))
}

async fn run_state_list(file: &Path) -> Result<(), String> {
    let config = Configuration::load(file)?;
    let backend = open_backend(&config, file)?;

    let Some(state_file) = backend.read_state().await.map_err(|e| e.to_string())? else {
        println!("{}", "No state found.".yellow());
        return Ok(());
    };

    let mut resources: Vec<&ResourceState> = state_file.resources.iter().collect();
    resources.sort_by(|a, b| {
        (&a.resource_type, &a.name).cmp(&(&b.resource_type, &b.name))
    });

    println!(
        "{}",
        format!("State serial {} ({})", state_file.serial, state_file.lineage).cyan()
    );
    for resource in resources {
        println!(
            "  • {}.{} {}",
            resource.resource_type,
            resource.name,
            resource.identifier.as_deref().unwrap_or("-").dimmed()
        );
    }
    Ok(())
}

fn print_plan(plan: &Plan) {
    if plan.is_empty() {
        println!("{}", "No changes. Infrastructure is up-to-date.".green());
        return;
    }

    println!("{}", "Execution Plan:".cyan().bold());
    println!();

    for effect in plan.effects() {
        let colored_symbol = match effect {
            Effect::Create(_) => "+".green().bold(),
            Effect::Update { .. } => "~".yellow().bold(),
            Effect::Replace { .. } => "-/+".magenta().bold(),
            Effect::Delete { .. } => "-".red().bold(),
            Effect::Forget { .. } => "(-)".dimmed().bold(),
        };
        let id = effect.resource_id();
        println!(
            "  {} {}.{}",
            colored_symbol,
            id.resource_type.cyan().bold(),
            id.name
        );

        match effect {
            Effect::Create(r) => {
                for (key, value) in sorted_attributes(&r.attributes) {
                    println!("      {}: {}", key, format_value(value).green());
                }
            }
            Effect::Update { from, to, .. } => print_changes(from, to, &[]),
            Effect::Replace {
                from,
                to,
                changed_attributes,
                keep_previous,
                ..
            } => {
                print_changes(from, to, changed_attributes);
                if *keep_previous {
                    println!(
                        "      {}",
                        "(previous value is declared by another resource and stays)".dimmed()
                    );
                }
            }
            Effect::Delete { from, .. } => {
                for (key, value) in sorted_attributes(&from.attributes) {
                    println!("      {}: {}", key, format_value(value).red());
                }
            }
            Effect::Forget { .. } => {
                println!(
                    "      {}",
                    "(remote entry is declared by another resource; only tracking is removed)"
                        .dimmed()
                );
            }
        }
    }

    println!();
    let summary = plan.summary();
    println!(
        "Plan: {} to add, {} to change, {} to replace, {} to destroy, {} to forget.",
        summary.create.to_string().green(),
        summary.update.to_string().yellow(),
        summary.replace.to_string().magenta(),
        summary.delete.to_string().red(),
        summary.forget.to_string().dimmed()
    );
}

fn print_changes(from: &State, to: &Resource, forces_replacement: &[String]) {
    for (key, value) in sorted_attributes(&to.attributes) {
        match from.attributes.get(key) {
            Some(old) if old == value => {}
            old => {
                let old = old.map(format_value).unwrap_or_else(|| "(none)".to_string());
                let marker = if forces_replacement.iter().any(|a| a == key) {
                    " (forces replacement)".red().to_string()
                } else {
                    String::new()
                };
                println!(
                    "      {}: {} → {}{}",
                    key,
                    old.red(),
                    format_value(value).green(),
                    marker
                );
            }
        }
    }
}

fn sorted_attributes(attributes: &HashMap<String, Value>) -> Vec<(&String, &Value)> {
    let mut attrs: Vec<_> = attributes.iter().collect();
    attrs.sort_by(|a, b| a.0.cmp(b.0));
    attrs
}

fn format_effect(effect: &Effect) -> String {
    let id = effect.resource_id();
    match effect {
        Effect::Create(_) => format!("Create {}", id),
        Effect::Update { .. } => format!("Update {}", id),
        Effect::Replace { .. } => format!("Replace {}", id),
        Effect::Delete { .. } => format!("Delete {}", id),
        Effect::Forget { .. } => format!("Forget {}", id),
    }
}

fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => format!("\"{}\"", s),
        Value::Int(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::List(items) => {
            let items: Vec<String> = items.iter().map(format_value).collect();
            format!("[{}]", items.join(", "))
        }
        Value::Map(map) => {
            let entries: Vec<String> = sorted_attributes(map)
                .into_iter()
                .map(|(k, v)| format!("{}: {}", k, format_value(v)))
                .collect();
            format!("{{{}}}", entries.join(", "))
        }
    }
}
