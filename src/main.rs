use clap::Parser;
use forest_stream::auth::Credentials;
use forest_stream::client::{CompletionClient, StreamRequest};
use forest_stream::config::{load_config, AppConfig, ConfigError};
use forest_stream::error::StreamError;
use forest_stream::observability::init_tracing;
use forest_stream::protocol::EndpointKind;
use serde_json::{json, Map, Value};
use tokio_util::sync::CancellationToken;

const CONFIG_ENV: &str = "FOREST_STREAM_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config.yaml";
const EXIT_INTERRUPTED: i32 = 130;

#[derive(Debug, Parser)]
#[command(name = "forest-stream")]
#[command(about = "Stream several completion candidates for one prompt")]
struct Cli {
    /// Use the plain completions endpoint instead of chat
    #[arg(long)]
    completions: bool,

    /// List the models the upstream offers and exit
    #[arg(long, conflicts_with_all = ["prompt", "completions"])]
    models: bool,

    /// Prompt text; several words are joined with spaces
    #[arg(required_unless_present = "models")]
    prompt: Vec<String>,
}

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Generate { endpoint: EndpointKind, prompt: String },
    Models,
}

impl Cli {
    fn into_command(self) -> Command {
        if self.models {
            return Command::Models;
        }
        let endpoint = if self.completions {
            EndpointKind::Completions
        } else {
            EndpointKind::Chat
        };
        Command::Generate {
            endpoint,
            prompt: self.prompt.join(" "),
        }
    }
}

fn main() {
    let command = Cli::parse().into_command();

    let config = resolve_config().unwrap_or_else(|e| {
        eprintln!("Failed to load configuration: {e}");
        eprintln!("Please copy 'config.example.yaml' to 'config.yaml' and modify as needed.");
        std::process::exit(1);
    });

    init_tracing(&config.features.log_level, config.features.log_json);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_io()
        .enable_time()
        .build()
        .unwrap_or_else(|e| {
            eprintln!("Failed to initialize Tokio runtime: {e}");
            std::process::exit(1);
        });

    let code = runtime.block_on(run(config, command));
    std::process::exit(code);
}

/// An explicitly configured path must exist; the default path falls back to
/// built-in defaults when absent.
fn resolve_config() -> Result<AppConfig, ConfigError> {
    if let Ok(path) = std::env::var(CONFIG_ENV) {
        return load_config(&path);
    }
    match load_config(DEFAULT_CONFIG_PATH) {
        Err(ConfigError::Io(err)) if err.kind() == std::io::ErrorKind::NotFound => {
            Ok(AppConfig::default())
        }
        other => other,
    }
}

async fn run(config: AppConfig, command: Command) -> i32 {
    let credentials = match Credentials::resolve(&config.upstream) {
        Ok(credentials) => credentials,
        Err(err) => {
            eprintln!("{err}");
            return 1;
        }
    };
    let client = match CompletionClient::new(&config) {
        Ok(client) => client,
        Err(err) => {
            eprintln!("{err}");
            return 1;
        }
    };

    match command {
        Command::Models => match client.list_models(&credentials).await {
            Ok(models) => {
                for model in models {
                    println!("{model}");
                }
                0
            }
            Err(err) => {
                eprintln!("{err}");
                1
            }
        },
        Command::Generate { endpoint, prompt } => {
            let request = build_request(&config, endpoint, &prompt);
            generate(&client, &request, &credentials).await
        }
    }
}

fn build_request(config: &AppConfig, endpoint: EndpointKind, prompt: &str) -> StreamRequest {
    let defaults = &config.defaults;
    let mut params = Map::new();
    params.insert("model".to_string(), Value::from(defaults.model.as_str()));
    params.insert("temperature".to_string(), Value::from(defaults.temperature));
    params.insert("n".to_string(), Value::from(defaults.n));
    match endpoint {
        EndpointKind::Chat => {
            let mut messages = Vec::with_capacity(2);
            if !defaults.preamble.is_empty() {
                messages.push(json!({"role": "system", "content": defaults.preamble}));
            }
            messages.push(json!({"role": "user", "content": prompt}));
            params.insert("messages".to_string(), Value::Array(messages));
        }
        EndpointKind::Completions => {
            let text = if defaults.preamble.is_empty() {
                prompt.to_string()
            } else {
                format!("{}\n\n{prompt}", defaults.preamble)
            };
            params.insert("prompt".to_string(), Value::from(text));
        }
    }
    StreamRequest::new(endpoint, params)
}

async fn generate(
    client: &CompletionClient,
    request: &StreamRequest,
    credentials: &Credentials,
) -> i32 {
    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupted, cancelling candidates");
            interrupt.cancel();
        }
    });

    let candidates = match client.stream(request, credentials, &cancel).await {
        Ok(candidates) => candidates,
        Err(StreamError::Cancelled) => return EXIT_INTERRUPTED,
        Err(err) => {
            eprintln!("{err}");
            return 1;
        }
    };

    let results = futures_util::future::join_all(candidates.into_iter().map(|candidate| async move {
        let index = candidate.index();
        (index, candidate.collect_text().await)
    }))
    .await;

    let mut code = 0;
    for (index, result) in results {
        match result {
            Ok(text) => println!("--- candidate {} ---\n{text}\n", index + 1),
            Err(err) => {
                eprintln!("candidate {} failed: {err}", index + 1);
                code = 1;
            }
        }
    }
    if cancel.is_cancelled() {
        code = EXIT_INTERRUPTED;
    }
    code
}
