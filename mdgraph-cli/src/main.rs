use clap::{Parser, Subcommand, ValueEnum};
use mdgraph::{load_markdown, ContentStore, LoadOptions, MdGraphError, PublishedSchema};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

/// mdgraph CLI: load a tree of markdown files and query it from the command line
#[derive(Parser)]
#[command(name = "mdgraph", version, about)]
struct Cli {
    /// Directory holding the markdown files (default: current directory)
    #[arg(long, env = "MDGRAPH_CONTENT_ROOT", default_value = ".")]
    content_root: PathBuf,

    /// Output format
    #[arg(long, default_value = "yaml")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    Yaml,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Print the schema with the fields inferred from front-matter
    Schema,

    /// List inferred front-matter fields, their types and declaring files
    Fields,

    /// Show file, field and item counts
    Status,

    /// Run a resolver (contentItemById, contentItemsByIds, contentItemsByGroupId,
    /// contentItems, contentItemsByQuery)
    Query {
        /// Resolver name
        resolver: String,
        /// Arguments as a JSON object (e.g. --args '{"filter": {"AND": {"groupId": "blog"}}}')
        #[arg(long)]
        args: Option<String>,
        /// Single arguments, merged over --args (e.g. --arg id=home)
        #[arg(long = "arg", value_parser = parse_key_value)]
        arg: Vec<(String, String)>,
    },
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let pos = s
        .find('=')
        .ok_or_else(|| format!("Invalid key=value pair: no '=' found in '{s}'"))?;
    Ok((s[..pos].to_string(), s[pos + 1..].to_string()))
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        // Machine-readable error on stderr
        eprintln!("ERROR:{e}");
        process::exit(exit_code(e.as_ref()));
    }
}

/// 2 when the content itself could not be loaded, 1 for anything else.
fn exit_code(error: &(dyn std::error::Error + 'static)) -> i32 {
    match error.downcast_ref::<MdGraphError>() {
        Some(e) if e.is_load_error() => 2,
        _ => 1,
    }
}

async fn load(cli: &Cli) -> Result<PublishedSchema, Box<dyn std::error::Error>> {
    let options = LoadOptions::discover(&cli.content_root)?;
    log::debug!("Loading markdown from {}", cli.content_root.display());
    let store = Arc::new(ContentStore::open_in_memory()?);
    Ok(load_markdown(options, store).await?)
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let published = load(&cli).await?;

    match &cli.command {
        Command::Schema => {
            print!("{}", published.type_defs.source());
        }

        Command::Fields => {
            print_output(&serde_json::to_value(&published.registry)?, &cli.format)?;
        }

        Command::Status => {
            let status = serde_json::json!({
                "content_root": cli.content_root.display().to_string(),
                "files": published.file_count,
                "fields": published.registry.len(),
                "items": published.resolvers.store().count()?,
            });
            print_output(&status, &cli.format)?;
        }

        Command::Query {
            resolver,
            args,
            arg,
        } => {
            let args = build_args(args.as_deref(), arg)?;
            let result = published.resolvers.resolve(resolver, args)?;
            print_output(&result, &cli.format)?;
        }
    }

    Ok(())
}

fn build_args(
    json: Option<&str>,
    pairs: &[(String, String)],
) -> Result<serde_json::Value, Box<dyn std::error::Error>> {
    let mut map = match json {
        Some(json) => match serde_json::from_str(json)? {
            serde_json::Value::Object(map) => map,
            _ => return Err("--args must be a JSON object".into()),
        },
        None => serde_json::Map::new(),
    };
    for (key, val) in pairs {
        // Try to parse as JSON value (for numbers, booleans, arrays, objects)
        let json_val = serde_json::from_str(val).unwrap_or(serde_json::Value::String(val.clone()));
        map.insert(key.clone(), json_val);
    }
    Ok(serde_json::Value::Object(map))
}

fn print_output(
    value: &serde_json::Value,
    format: &OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(value)?),
    }
    Ok(())
}
