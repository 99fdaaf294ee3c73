//! Purpose: `graphkit` CLI entry point.
//! Role: Binary crate root; parses args, runs one graph operation, emits JSON on stdout.
//! Invariants: Node data is printed as one JSON object per line.
//! Invariants: Errors go to stderr (JSON unless stderr is a terminal).
//! Invariants: Process exit code is derived from `api::to_exit_code`.
#![allow(clippy::result_large_err)]
use std::error::Error as StdError;
use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueHint, error::ErrorKind as ClapErrorKind};
use graphkit::api::{
    AnyNode, Cursor, Error, ErrorKind, HttpTransport, ID_FIELD, Node, Params, SharedTransport,
    to_exit_code,
};
use serde_json::{Map, Value, json};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "graphkit",
    version,
    about = "Read nodes and walk paginated edges of a graph API",
    long_about = None,
    after_help = r#"EXAMPLES
  $ graphkit --base-url https://graph.example --token-file ~/.graph-token read 42 --fields name,email
  $ graphkit --base-url https://graph.example edge 42 friends --limit 50 --pages 3
  $ graphkit --base-url https://graph.example ids 1 2 3 --fields name
"#
)]
struct Cli {
    #[arg(long, help = "Graph API base url (http or https)")]
    base_url: String,
    #[arg(long, conflicts_with = "token_file", help = "Access token")]
    token: Option<String>,
    #[arg(
        long,
        help = "Read the access token from a file",
        value_hint = ValueHint::FilePath
    )]
    token_file: Option<PathBuf>,
    #[arg(long, help = "Version segment prefixed to request paths, e.g. v19.0")]
    api_version: Option<String>,
    #[arg(long, default_value_t = 30_000, help = "Request timeout in milliseconds")]
    timeout_ms: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Read one node
    Read {
        id: String,
        #[arg(long, value_delimiter = ',', help = "Fields to request (comma-separated)")]
        fields: Vec<String>,
    },
    /// Walk an edge of a node, one JSON line per node
    Edge {
        id: String,
        endpoint: String,
        #[arg(long, value_delimiter = ',', help = "Fields to request (comma-separated)")]
        fields: Vec<String>,
        #[arg(long, help = "Page size hint sent to the server")]
        limit: Option<u64>,
        #[arg(long, default_value_t = 1, help = "Maximum number of pages to load")]
        pages: usize,
    },
    /// Fetch several nodes in one request
    Ids {
        #[arg(required = true)]
        ids: Vec<String>,
        #[arg(long, value_delimiter = ',', help = "Fields to request (comma-separated)")]
        fields: Vec<String>,
    },
}

fn main() {
    let exit_code = match run() {
        Ok(code) => code,
        Err(err) => {
            emit_error(&err);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn run() -> Result<i32, Error> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp | ClapErrorKind::DisplayVersion => {
                err.print().map_err(|io_err| {
                    Error::new(ErrorKind::Io)
                        .with_message("failed to write help")
                        .with_source(io_err)
                })?;
                return Ok(0);
            }
            _ => {
                return Err(Error::new(ErrorKind::Usage)
                    .with_message(clap_error_summary(&err))
                    .with_hint("Run `graphkit --help` for usage."));
            }
        },
    };

    init_tracing();
    let transport = build_transport(&cli)?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| {
            Error::new(ErrorKind::Internal)
                .with_message("failed to start async runtime")
                .with_source(err)
        })?;
    runtime.block_on(dispatch(cli.command, transport))?;
    Ok(0)
}

fn build_transport(cli: &Cli) -> Result<SharedTransport, Error> {
    let mut transport = HttpTransport::new(cli.base_url.clone())?
        .with_timeout(Duration::from_millis(cli.timeout_ms));
    if let Some(version) = &cli.api_version {
        transport = transport.with_version(version.clone());
    }
    if let Some(token) = read_token(cli)? {
        transport = transport.with_token(token);
    }
    Ok(transport.install_default())
}

fn read_token(cli: &Cli) -> Result<Option<String>, Error> {
    if let Some(token) = &cli.token {
        return Ok(Some(token.clone()));
    }
    let Some(path) = &cli.token_file else {
        return Ok(None);
    };
    let token = std::fs::read_to_string(path).map_err(|err| {
        Error::new(ErrorKind::Config)
            .with_message("failed to read token file")
            .with_path(path.display().to_string())
            .with_source(err)
    })?;
    let token = token.trim();
    if token.is_empty() {
        return Err(Error::new(ErrorKind::Config)
            .with_message("token file is empty")
            .with_path(path.display().to_string()));
    }
    Ok(Some(token.to_string()))
}

async fn dispatch(command: Command, transport: SharedTransport) -> Result<(), Error> {
    match command {
        Command::Read { id, fields } => {
            let mut node = source_node(&id, &transport);
            node.read(&as_strs(&fields), Params::new()).await?;
            emit_json(&Value::Object(node.data().clone()))
        }
        Command::Edge {
            id,
            endpoint,
            fields,
            limit,
            pages,
        } => {
            let node = source_node(&id, &transport);
            let mut params = Params::new();
            if !fields.is_empty() {
                params.insert("fields".to_string(), json!(fields.join(",")));
            }
            if let Some(limit) = limit {
                params.insert("limit".to_string(), json!(limit));
            }
            let mut cursor = Cursor::<AnyNode>::for_endpoint(&node, &endpoint, params)?;
            for _ in 0..pages {
                if !cursor.has_next() {
                    break;
                }
                cursor.next().await?;
                for item in &cursor {
                    emit_json(&Value::Object(item.data().clone()))?;
                }
            }
            Ok(())
        }
        Command::Ids { ids, fields } => {
            let nodes =
                Node::<AnyNode>::get_by_ids(&ids, Params::new(), &as_strs(&fields), Some(transport))
                    .await?;
            for node in &nodes {
                emit_json(&Value::Object(node.data().clone()))?;
            }
            Ok(())
        }
    }
}

fn source_node(id: &str, transport: &SharedTransport) -> Node<AnyNode> {
    let mut data = Map::new();
    data.insert(ID_FIELD.to_string(), Value::String(id.to_string()));
    Node::from_data(data).with_transport(transport.clone())
}

fn as_strs(values: &[String]) -> Vec<&str> {
    values.iter().map(String::as_str).collect()
}

fn emit_json(value: &Value) -> Result<(), Error> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer(&mut stdout, value)
        .map_err(io::Error::from)
        .and_then(|()| stdout.write_all(b"\n"))
        .map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to write output")
                .with_source(err)
        })
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

fn clap_error_summary(err: &clap::Error) -> String {
    let rendered = err.to_string();
    rendered
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(|line| line.trim_start_matches("error:").trim().to_string())
        .unwrap_or_else(|| "invalid arguments".to_string())
}

fn emit_error(err: &Error) {
    if io::stderr().is_terminal() {
        eprintln!("{}", error_text(err));
        return;
    }
    let json = serde_json::to_string(&error_json(err)).unwrap_or_else(|_| {
        "{\"error\":{\"kind\":\"Internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn error_message(err: &Error) -> String {
    if let Some(message) = err.message() {
        return message.to_string();
    }
    match err.kind() {
        ErrorKind::Internal => "internal error".to_string(),
        ErrorKind::Usage => "usage error".to_string(),
        ErrorKind::Config => "configuration error".to_string(),
        ErrorKind::IdentityMissing => "node has no id".to_string(),
        ErrorKind::PaginationExhausted => "no more pages".to_string(),
        ErrorKind::Permission => "permission denied".to_string(),
        ErrorKind::NotFound => "not found".to_string(),
        ErrorKind::RateLimited => "rate limited".to_string(),
        ErrorKind::Remote => "remote error".to_string(),
        ErrorKind::Io => "i/o error".to_string(),
        ErrorKind::Decode => "unexpected response".to_string(),
    }
}

fn error_causes(err: &Error) -> Vec<String> {
    let mut causes = Vec::new();
    let mut cur = StdError::source(err);
    while let Some(source) = cur {
        causes.push(source.to_string());
        cur = source.source();
    }
    causes
}

fn error_json(err: &Error) -> Value {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(format!("{:?}", err.kind())));
    inner.insert("message".to_string(), json!(error_message(err)));
    if let Some(hint) = err.hint() {
        inner.insert("hint".to_string(), json!(hint));
    }
    if let Some(path) = err.path() {
        inner.insert("path".to_string(), json!(path));
    }
    if let Some(status) = err.status() {
        inner.insert("status".to_string(), json!(status));
    }
    if let Some(code) = err.code() {
        inner.insert("code".to_string(), json!(code));
    }
    let causes = error_causes(err);
    if !causes.is_empty() {
        inner.insert("causes".to_string(), json!(causes));
    }

    let mut outer = Map::new();
    outer.insert("error".to_string(), Value::Object(inner));
    Value::Object(outer)
}

fn error_text(err: &Error) -> String {
    let mut lines = vec![format!("error: {}", error_message(err))];
    if let Some(hint) = err.hint() {
        lines.push(format!("hint: {hint}"));
    }
    if let Some(path) = err.path() {
        lines.push(format!("path: {path}"));
    }
    if let Some(status) = err.status() {
        lines.push(format!("status: {status}"));
    }
    lines.join("\n")
}
