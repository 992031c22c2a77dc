use anyhow::{bail, Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use metaform_engine::{Control, EngineConfig, Orchestrator, RenderedField, RenderedForm, Table};
use metaform_meta::{Catalog, EntityMetadata};
use metaform_transport::HttpTransport;
use serde_json::Map;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn cli() -> Command {
    Command::new("metaform")
        .version(metaform_engine::VERSION)
        .about("Forms and tables for metadata-described entities")
        .subcommand_required(true)
        .arg(
            Arg::new("catalog")
                .long("catalog")
                .required(true)
                .value_parser(value_parser!(PathBuf))
                .help("Entity catalog (JSON or YAML)"),
        )
        .arg(
            Arg::new("base-url")
                .long("base-url")
                .default_value("http://localhost:8080")
                .help("Base URL of the JSON API"),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .value_parser(value_parser!(PathBuf))
                .help("Engine configuration (TOML)"),
        )
        .arg(
            Arg::new("timeout-secs")
                .long("timeout-secs")
                .default_value("30")
                .value_parser(value_parser!(u64))
                .help("Request timeout in seconds"),
        )
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON"),
        )
        .subcommand(
            Command::new("describe")
                .about("Print the form layout and table columns of an entity")
                .arg(Arg::new("entity").required(true))
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Output the rendered form as JSON"),
                ),
        )
        .subcommand(
            Command::new("list")
                .about("Fetch and print the table of an entity")
                .arg(Arg::new("entity").required(true)),
        )
        .subcommand(
            Command::new("show")
                .about("Fetch one record and print it read-only")
                .arg(Arg::new("entity").required(true))
                .arg(Arg::new("id").required(true)),
        )
        .subcommand(
            Command::new("search")
                .about("Search the options of a reference field")
                .arg(Arg::new("entity").required(true))
                .arg(Arg::new("field").required(true))
                .arg(Arg::new("query").required(true)),
        )
        .subcommand(
            Command::new("delete")
                .about("Delete one record")
                .arg(Arg::new("entity").required(true))
                .arg(Arg::new("id").required(true))
                .arg(
                    Arg::new("yes")
                        .long("yes")
                        .action(ArgAction::SetTrue)
                        .help("Confirm the delete"),
                ),
        )
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn arg<'a>(args: &'a ArgMatches, name: &str) -> Result<&'a str> {
    args.get_one::<String>(name)
        .map(String::as_str)
        .with_context(|| format!("missing argument <{name}>"))
}

struct Host {
    catalog: Catalog,
    transport: Arc<HttpTransport>,
    config: EngineConfig,
}

impl Host {
    fn from_matches(matches: &ArgMatches) -> Result<Self> {
        let catalog_path = matches
            .get_one::<PathBuf>("catalog")
            .context("missing --catalog")?;
        let catalog = Catalog::load(catalog_path)
            .with_context(|| format!("loading catalog {}", catalog_path.display()))?;

        let config = match matches.get_one::<PathBuf>("config") {
            Some(path) => EngineConfig::load(path)
                .with_context(|| format!("loading config {}", path.display()))?,
            None => EngineConfig::default(),
        };

        let base_url = arg(matches, "base-url")?;
        let timeout = Duration::from_secs(*matches.get_one::<u64>("timeout-secs").unwrap_or(&30));
        let transport = Arc::new(HttpTransport::with_timeout(base_url, timeout)?);
        debug!(%base_url, entities = catalog.len(), "host ready");

        Ok(Self {
            catalog,
            transport,
            config,
        })
    }

    fn entity(&self, name: &str) -> Result<Arc<EntityMetadata>> {
        match self.catalog.get(name) {
            Some(meta) => Ok(meta),
            None => {
                let known: Vec<&str> = self.catalog.names().collect();
                bail!("unknown entity '{name}' (known: {})", known.join(", "))
            }
        }
    }

    fn orchestrator(&self, name: &str) -> Result<Orchestrator> {
        let meta = self.entity(name)?;
        Ok(Orchestrator::new(meta, self.transport.clone(), self.config.clone()))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();
    init_tracing(matches.get_flag("log-json"));
    let host = Host::from_matches(&matches)?;

    match matches.subcommand() {
        Some(("describe", args)) => {
            let orchestrator = host.orchestrator(arg(args, "entity")?)?;
            orchestrator.open_create(&Map::new())?;
            let form = orchestrator.render_form()?;
            if args.get_flag("json") {
                println!("{}", serde_json::to_string_pretty(&form)?);
            } else {
                describe(orchestrator.meta(), &form, &orchestrator.table());
            }
        }
        Some(("list", args)) => {
            let orchestrator = host.orchestrator(arg(args, "entity")?)?;
            orchestrator.refresh().await?;
            print_table(&orchestrator.table());
        }
        Some(("show", args)) => {
            let orchestrator = host.orchestrator(arg(args, "entity")?)?;
            orchestrator.open_view(arg(args, "id")?).await?;
            print_form(&orchestrator.render_form()?);
        }
        Some(("search", args)) => {
            let orchestrator = host.orchestrator(arg(args, "entity")?)?;
            let field = arg(args, "field")?;
            let meta = orchestrator.meta();
            let reference = meta
                .field(field)
                .and_then(|f| f.kind.reference_config())
                .with_context(|| format!("'{field}' is not a reference field of {}", meta.name()))?
                .clone();

            orchestrator.open_create(&Map::new())?;
            let options = orchestrator.search_now(field, arg(args, "query")?).await?;
            for option in &options {
                println!(
                    "{}\t{}",
                    reference.id_of(option).unwrap_or_default(),
                    reference.label_of(option)
                );
            }
            info!(count = options.len(), "search finished");
        }
        Some(("delete", args)) => {
            let orchestrator = host.orchestrator(arg(args, "entity")?)?;
            let id = arg(args, "id")?;
            orchestrator.request_delete(id)?;
            if !args.get_flag("yes") {
                orchestrator.cancel_delete()?;
                bail!("refusing to delete {id} without --yes");
            }
            orchestrator.confirm_delete().await?;
            for notice in orchestrator.drain_notices() {
                eprintln!("{notice}");
            }
        }
        _ => bail!("no command given"),
    }
    Ok(())
}

fn describe(meta: &EntityMetadata, form: &RenderedForm, table: &Table) {
    let operations: Vec<String> = meta.operations().iter().map(ToString::to_string).collect();
    println!("{} ({})", meta.name(), meta.endpoint());
    println!("operations: {}", operations.join(", "));
    println!();
    print_form(form);
    println!();
    let headers: Vec<&str> = table.columns.iter().map(|c| c.header.as_str()).collect();
    println!("columns: {}", headers.join(" | "));
}

fn print_form(form: &RenderedForm) {
    for section in &form.sections {
        if let Some(title) = &section.title {
            println!("[{title}]");
        }
        for field in &section.fields {
            print_field(field, 1);
        }
    }
}

fn print_field(field: &RenderedField, depth: usize) {
    let indent = "  ".repeat(depth);
    let marker = if field.required { "*" } else { "" };
    let summary = match &field.control {
        Control::TextInput { markdown: true, .. } => "markdown".to_string(),
        Control::TextInput { multiline: true, .. } => "text (multi-line)".to_string(),
        Control::TextInput { value, .. } => format!("text {}", quoted(value)),
        Control::NumberInput { value } => format!("number {}", quoted(value)),
        Control::Checkbox { checked } => format!("checkbox [{}]", if *checked { "x" } else { " " }),
        Control::DateInput { with_time, value } => {
            let kind = if *with_time { "date-time" } else { "date" };
            format!("{kind} {}", quoted(value))
        }
        Control::Select { value, options } => {
            let options: Vec<&str> = options.iter().map(|o| o.value.as_str()).collect();
            format!(
                "select {} of [{}]",
                quoted(value.as_deref().unwrap_or_default()),
                options.join(", ")
            )
        }
        Control::Reference(picker) => {
            let kind = if picker.multiple { "references" } else { "reference" };
            let create = if picker.can_create { " (+ create)" } else { "" };
            format!("{kind}{create}")
        }
        Control::Group { fields } => {
            println!("{indent}{}{marker}:", field.label);
            for nested in fields {
                print_field(nested, depth + 1);
            }
            return;
        }
        Control::Display { text } => text.clone(),
    };
    println!("{indent}{}{marker}: {summary}", field.label);
}

fn quoted(value: &str) -> String {
    if value.is_empty() {
        String::new()
    } else {
        format!("{value:?}")
    }
}

fn print_table(table: &Table) {
    let headers: Vec<&str> = table.columns.iter().map(|c| c.header.as_str()).collect();
    println!("id\t{}", headers.join("\t"));
    for row in &table.rows {
        println!("{}\t{}", row.id.as_deref().unwrap_or("-"), row.cells.join("\t"));
    }
    if let Some(error) = &table.error {
        eprintln!("{error}");
    }
}
