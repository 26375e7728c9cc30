use anyhow::Context;
use clap::{Parser, Subcommand};
use clinic_core::constants::{CODES_URL_ENV, SPEC_DIR_ENV, STORAGE_URL_ENV};
use clinic_core::{
    CodeSource, CoreConfig, DocumentKind, HttpCodeSource, RecordService, SpecLoader,
    StaticCodeSource,
};
use ehr::{Document, FormData};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "clinic")]
#[command(about = "Clinic record form/document mapping CLI")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Compose a document from a form JSON file
    Compose {
        /// Document kind (person or info)
        kind: DocumentKind,
        /// Form data JSON file
        form: PathBuf,
        /// YAML code-table file; the lookup service is used when omitted
        #[arg(long)]
        codes: Option<PathBuf>,
        /// Directory of spec table overrides (<kind>.yaml)
        #[arg(long)]
        spec_dir: Option<PathBuf>,
    },
    /// Extract form data from a document JSON file
    Extract {
        /// Document kind (person or info)
        kind: DocumentKind,
        /// Document JSON file
        document: PathBuf,
        /// YAML code-table file; the lookup service is used when omitted
        #[arg(long)]
        codes: Option<PathBuf>,
        /// Directory of spec table overrides (<kind>.yaml)
        #[arg(long)]
        spec_dir: Option<PathBuf>,
    },
    /// Compose a form and upload it to the storage service
    Submit {
        /// Document kind (person or info)
        kind: DocumentKind,
        /// Form data JSON file
        form: PathBuf,
        /// Label to attach (repeatable)
        #[arg(long = "label")]
        labels: Vec<String>,
    },
    /// Download a stored document and print its form data
    Fetch {
        /// Document kind (person or info)
        kind: DocumentKind,
        /// Storage ID
        id: String,
    },
    /// Render one code string from a YAML code-table file
    CodeString {
        /// Selected code identifier
        key: String,
        /// Code category
        #[arg(long)]
        category: String,
        /// YAML code-table file
        #[arg(long)]
        codes: PathBuf,
    },
}

type DynSource = Arc<dyn CodeSource>;

fn core_config() -> anyhow::Result<CoreConfig> {
    Ok(CoreConfig::from_env_values(
        std::env::var(CODES_URL_ENV).ok(),
        std::env::var(STORAGE_URL_ENV).ok(),
        std::env::var(SPEC_DIR_ENV).ok(),
    )?)
}

async fn spec_loader(
    codes: Option<&Path>,
    spec_dir: Option<PathBuf>,
) -> anyhow::Result<SpecLoader<DynSource>> {
    let spec_dir = spec_dir.or_else(|| std::env::var(SPEC_DIR_ENV).ok().map(PathBuf::from));

    let source: DynSource = match codes {
        Some(path) => {
            tracing::debug!(path = %path.display(), "using local code tables");
            Arc::new(StaticCodeSource::from_yaml_file(path).await?)
        }
        None => {
            let cfg = core_config()?;
            tracing::debug!(url = %cfg.codes_url(), "using code lookup service");
            Arc::new(HttpCodeSource::from_config(&cfg))
        }
    };

    Ok(SpecLoader::new(source, spec_dir))
}

async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("{} is not valid JSON", path.display()))
}

async fn compose_file(
    loader: &SpecLoader<DynSource>,
    kind: DocumentKind,
    form: &Path,
) -> anyhow::Result<Document> {
    let form: FormData = read_json(form).await?;
    let spec = loader.load(kind).await?;
    Ok(spec.compose(&form)?)
}

async fn extract_file(
    loader: &SpecLoader<DynSource>,
    kind: DocumentKind,
    document: &Path,
) -> anyhow::Result<FormData> {
    let document: Document = read_json(document).await?;
    let spec = loader.load(kind).await?;
    Ok(spec.extract(&document))
}

async fn code_string(key: &str, category: &str, codes: &Path) -> anyhow::Result<String> {
    let source = StaticCodeSource::from_yaml_file(codes).await?;
    let entries = source.load_code(category).await?;
    Ok(ehr::code_to_string(key, &entries)?)
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive("clinic=info".parse()?))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Compose {
            kind,
            form,
            codes,
            spec_dir,
        }) => {
            let loader = spec_loader(codes.as_deref(), spec_dir).await?;
            print_json(&compose_file(&loader, kind, &form).await?)?;
        }
        Some(Commands::Extract {
            kind,
            document,
            codes,
            spec_dir,
        }) => {
            let loader = spec_loader(codes.as_deref(), spec_dir).await?;
            print_json(&extract_file(&loader, kind, &document).await?)?;
        }
        Some(Commands::Submit { kind, form, labels }) => {
            let service = RecordService::from_config(&core_config()?);
            let form: FormData = read_json(&form).await?;
            let stored = service.submit(kind, &form, &labels).await?;
            tracing::info!(kind = %kind, id = %stored.id, "document stored");
            println!("Stored {kind} document with ID: {}", stored.id);
        }
        Some(Commands::Fetch { kind, id }) => {
            let service = RecordService::from_config(&core_config()?);
            let form = service.fetch(kind, &id).await?;
            tracing::info!(kind = %kind, id = %id, "document fetched");
            print_json(&form)?;
        }
        Some(Commands::CodeString {
            key,
            category,
            codes,
        }) => {
            println!("{}", code_string(&key, &category, &codes).await?);
        }
        None => {
            println!("Use 'clinic --help' for commands");
        }
    }

    Ok(())
}
