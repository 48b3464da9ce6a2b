mod apply;
mod document;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use colored::Colorize;

use tfaws_core::provider::Provider;
use tfaws_core::resource::ResourceId;
use tfaws_core::schema::ResourceSchema;
use tfaws_provider_aws::AwsProvider;
use tfaws_provider_aws::config::ProviderConfig;
use tfaws_provider_aws::resources::{find_resource_type, resource_types};

use apply::{Action, apply_entry, destroy_order};
use document::Document;

#[derive(Parser)]
#[command(name = "tfaws")]
#[command(about = "Manage Global Accelerator, GuardDuty and Lex resources", long_about = None)]
struct Cli {
    /// Provider configuration file (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// AWS region, overriding the config file and environment
    #[arg(long, global = true)]
    region: Option<String>,

    /// Shared config profile
    #[arg(long, global = true)]
    profile: Option<String>,

    /// Increase log output (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a resource document against the schemas
    Validate {
        /// Path to the resource document
        file: PathBuf,
    },
    /// List resource types, or show the schema of one
    Schema {
        resource_type: Option<String>,

        /// Show the data source instead of the resource
        #[arg(long)]
        data: bool,
    },
    /// Read one resource and print its state as JSON
    Read {
        #[arg(long = "type")]
        resource_type: String,

        /// Provider identifier (ARN, detector ID or composite ID)
        #[arg(long)]
        id: String,
    },
    /// Create, update or replace the resources of a document
    Apply {
        file: PathBuf,
    },
    /// Delete the identified resources of a document
    Destroy {
        file: PathBuf,

        /// Skip confirmation prompt (auto-approve)
        #[arg(long)]
        auto_approve: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logger(cli.verbose);

    let result = match &cli.command {
        Commands::Validate { file } => run_validate(file),
        Commands::Schema {
            resource_type,
            data,
        } => run_schema(resource_type.as_deref(), *data),
        Commands::Read { resource_type, id } => run_read(&cli, resource_type, id).await,
        Commands::Apply { file } => run_apply(&cli, file).await,
        Commands::Destroy { file, auto_approve } => run_destroy(&cli, file, *auto_approve).await,
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_logger(verbose: u8) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    match verbose {
        0 => {}
        1 => {
            builder.filter_level(log::LevelFilter::Info);
        }
        _ => {
            builder.filter_level(log::LevelFilter::Debug);
        }
    }
    builder.init();
}

fn load_config(cli: &Cli) -> Result<ProviderConfig, String> {
    let config = ProviderConfig::load(cli.config.as_deref()).map_err(|e| e.to_string())?;
    let config = config
        .from_env()
        .with_overrides(cli.region.clone(), cli.profile.clone());
    config.region().map_err(|e| e.to_string())?;
    Ok(config)
}

async fn get_provider(cli: &Cli) -> Result<AwsProvider, String> {
    let config = load_config(cli)?;
    AwsProvider::new(&config).await.map_err(|e| e.to_string())
}

fn load_valid_document(file: &Path) -> Result<Document, String> {
    let doc = Document::load(file)?;
    if let Err(errors) = doc.validate(&resource_types()) {
        for error in &errors {
            eprintln!("  {} {}", "✗".red(), error);
        }
        return Err(format!("{} validation error(s) in {}", errors.len(), file.display()));
    }
    Ok(doc)
}

fn run_validate(file: &Path) -> Result<(), String> {
    let doc = load_valid_document(file)?;
    println!(
        "{}",
        format!("{} is valid ({} resources).", file.display(), doc.resources.len())
            .green()
            .bold()
    );
    Ok(())
}

fn run_schema(resource_type: Option<&str>, data: bool) -> Result<(), String> {
    let Some(name) = resource_type else {
        let mut names: Vec<String> = resource_types()
            .iter()
            .map(|t| {
                if t.is_data_source() {
                    format!("{} (data)", t.name())
                } else {
                    t.name().to_string()
                }
            })
            .collect();
        names.sort();
        for name in names {
            println!("{}", name);
        }
        return Ok(());
    };

    let found = find_resource_type(name, data).ok_or_else(|| {
        let kind = if data { "data source" } else { "resource type" };
        format!("Unknown {}: {}", kind, name)
    })?;
    print!("{}", format_schema(&found.schema()));
    Ok(())
}

fn format_schema(schema: &ResourceSchema) -> String {
    let mut out = format!("{}\n", schema.resource_type.bold());
    if let Some(description) = &schema.description {
        out.push_str(&format!("  {}\n", description));
    }
    for name in schema.attribute_names() {
        let attr = &schema.attributes[name];
        let mut flags = Vec::new();
        if attr.required {
            flags.push("required");
        }
        if attr.computed && !attr.optional_computed {
            flags.push("computed");
        } else if attr.optional_computed {
            flags.push("optional, computed");
        }
        if attr.force_new {
            flags.push("forces replacement");
        }
        if attr.write_only {
            flags.push("write-only");
        }
        out.push_str(&format!("  {}: {}", name.cyan(), attr.attr_type));
        if !flags.is_empty() {
            out.push_str(&format!(" ({})", flags.join(", ")));
        }
        if let Some(default) = &attr.default {
            out.push_str(&format!(" = {}", default.to_json()));
        }
        out.push('\n');
    }
    out
}

async fn run_read(cli: &Cli, resource_type: &str, identifier: &str) -> Result<(), String> {
    if find_resource_type(resource_type, false).is_none() {
        return Err(format!("Unknown resource type: {}", resource_type));
    }
    let provider = get_provider(cli).await?;
    let id = ResourceId::new(resource_type, identifier);
    let state = provider
        .read(&id, identifier)
        .await
        .map_err(|e| e.to_string())?;
    if !state.exists {
        return Err(format!("{} {} not found", resource_type, identifier));
    }
    let json = serde_json::to_string_pretty(&state.to_json()).map_err(|e| e.to_string())?;
    println!("{}", json);
    Ok(())
}

async fn run_apply(cli: &Cli, file: &Path) -> Result<(), String> {
    let doc = load_valid_document(file)?;
    let provider = get_provider(cli).await?;

    println!("{}", "Applying resources...".cyan().bold());
    println!();

    let mut changed = 0;
    let mut failure_count = 0;
    for entry in &doc.resources {
        let label = entry.label();
        match apply_entry(&provider, entry).await {
            Ok((action, state)) => {
                let identifier = state.identifier.as_deref().unwrap_or("-");
                println!(
                    "  {} {} {} => {}",
                    "✓".green(),
                    label,
                    action.to_string().dimmed(),
                    identifier.bold()
                );
                if !matches!(action, Action::Read | Action::Unchanged) {
                    changed += 1;
                }
            }
            Err(e) => {
                println!("  {} {} - {}", "✗".red(), label, e);
                failure_count += 1;
            }
        }
    }

    println!();
    if failure_count == 0 {
        println!(
            "{}",
            format!("Apply complete! {} changes applied.", changed)
                .green()
                .bold()
        );
        Ok(())
    } else {
        Err(format!(
            "Apply failed. {} changed, {} failed.",
            changed, failure_count
        ))
    }
}

async fn run_destroy(cli: &Cli, file: &Path, auto_approve: bool) -> Result<(), String> {
    let doc = load_valid_document(file)?;
    let targets = destroy_order(&doc.resources);
    if targets.is_empty() {
        println!("{}", "No identified resources to destroy.".green());
        return Ok(());
    }

    println!("{}", "Destroy Plan:".red().bold());
    for entry in &targets {
        println!(
            "  {} {} ({})",
            "-".red().bold(),
            entry.label(),
            entry.identifier.as_deref().unwrap_or_default()
        );
    }
    println!();

    if !auto_approve {
        println!(
            "{}",
            "Do you really want to destroy these resources?"
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

        if input.trim() != "yes" {
            println!();
            println!("{}", "Destroy cancelled.".yellow());
            return Ok(());
        }
        println!();
    }

    let provider = get_provider(cli).await?;
    println!("{}", "Destroying resources...".red().bold());
    println!();

    let mut success_count = 0;
    let mut failure_count = 0;
    for entry in targets {
        let resource = entry.to_resource();
        let identifier = entry.identifier.as_deref().unwrap_or_default();
        match provider.delete(&resource.id, identifier).await {
            Ok(()) => {
                println!("  {} {}", "✓".green(), entry.label());
                success_count += 1;
            }
            Err(e) => {
                println!("  {} {} - {}", "✗".red(), entry.label(), e);
                failure_count += 1;
            }
        }
    }

    println!();
    if failure_count == 0 {
        println!(
            "{}",
            format!("Destroy complete! {} resources destroyed.", success_count)
                .green()
                .bold()
        );
        Ok(())
    } else {
        Err(format!(
            "Destroy failed. {} succeeded, {} failed.",
            success_count, failure_count
        ))
    }
}
