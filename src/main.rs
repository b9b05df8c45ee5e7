//! `storefront` command-line client.
//!
//! Thin shell over the library: every subcommand is one API call, and the
//! session persists between runs through the configured storage.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use reqwest::multipart::{Form, Part};
use reqwest::Method;
use serde_json::Value;

use storefront_client::api::{auth, Access, ApiClient, ApiError};
use storefront_client::config::ClientConfig;
use storefront_client::session::{CredentialStore, SessionEvent};

#[derive(Parser, Debug)]
#[command(name = "storefront", about = "Storefront API client")]
struct Args {
    /// Override the API base URL (otherwise STOREFRONT_API_URL / API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// View the caller is on, for admin-session redirects
    #[arg(long, global = true)]
    view: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in and store the session
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Sign out and clear the stored session
    Logout,
    /// Show the signed-in user
    Whoami,
    /// GET a path; repeat --query key=value for parameters
    Get {
        path: String,
        #[arg(long = "query", short = 'q')]
        query: Vec<String>,
    },
    /// POST a JSON body
    Post { path: String, data: String },
    /// PUT a JSON body
    Put { path: String, data: String },
    /// PATCH a JSON body
    Patch { path: String, data: String },
    /// DELETE a path
    Delete { path: String },
    /// POST a file as multipart form data
    Upload {
        path: String,
        file: PathBuf,
        /// Form field name for the file
        #[arg(long, default_value = "image")]
        field: String,
        /// Extra text fields as key=value
        #[arg(long = "text", short = 't')]
        text: Vec<String>,
    },
    /// Show whether a request would carry the credential
    Classify {
        path: String,
        #[arg(long, default_value = "GET")]
        method: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    env_logger::init();

    let args = Args::parse();
    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = ClientConfig::from_env()?;
    if let Some(url) = args.api_url {
        config.api_base_url = url;
    }
    log::debug!("API base URL: {}", config.api_base_url);

    let store = Arc::new(CredentialStore::new(config.storage.open()));
    let client = ApiClient::new(&config, store)?;
    if let Some(view) = args.view {
        client.set_current_view(view);
    }

    let mut events = client.subscribe();
    let result = dispatch(&client, args.command).await;

    while let Ok(event) = events.try_recv() {
        match event {
            SessionEvent::CredentialCleared(reason) => {
                log::warn!("Session cleared: {:?}", reason);
            }
            SessionEvent::LoginRedirect { target } => {
                log::warn!("Sign in again at {}", target);
            }
        }
    }

    match result {
        Ok(Some(body)) => {
            println!("{}", serde_json::to_string_pretty(&body)?);
            Ok(())
        }
        Ok(None) => Ok(()),
        Err(e) => Err(describe(e).into()),
    }
}

async fn dispatch(client: &ApiClient, command: Command) -> Result<Option<Value>, ApiError> {
    match command {
        Command::Login { email, password } => {
            let resp = auth::login(client, &email, &password).await?;
            let role = resp.user.as_ref().and_then(|u| u.role.clone());
            println!("Signed in as {} ({})", email, role.as_deref().unwrap_or("no role"));
            Ok(None)
        }
        Command::Logout => {
            auth::logout(client).await;
            println!("Signed out");
            Ok(None)
        }
        Command::Whoami => {
            let user = auth::me(client).await?;
            Ok(Some(serde_json::to_value(user).unwrap_or(Value::Null)))
        }
        Command::Get { path, query } => {
            let params = key_values(&query)?;
            client.get(&path, &params).await.map(Some)
        }
        Command::Post { path, data } => client.post(&path, &parse_json(&data)?).await.map(Some),
        Command::Put { path, data } => client.put(&path, &parse_json(&data)?).await.map(Some),
        Command::Patch { path, data } => client.patch(&path, &parse_json(&data)?).await.map(Some),
        Command::Delete { path } => client.delete(&path).await.map(Some),
        Command::Upload {
            path,
            file,
            field,
            text,
        } => {
            let form = build_form(&file, field, &text).await?;
            client.post_multipart(&path, form).await.map(Some)
        }
        Command::Classify { path, method } => {
            let method = Method::from_bytes(method.to_uppercase().as_bytes())
                .map_err(|e| usage(format!("invalid method: {}", e)))?;
            let access = match client.routes().classify(&method, &path) {
                Access::Public => "public",
                Access::Protected => "protected",
            };
            println!("{} {} -> {}", method, path, access);
            Ok(None)
        }
    }
}

async fn build_form(file: &Path, field: String, text: &[String]) -> Result<Form, ApiError> {
    let bytes = tokio::fs::read(file)
        .await
        .map_err(|e| usage(format!("cannot read {}: {}", file.display(), e)))?;
    let file_name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".to_string());

    let mut form = Form::new().part(field, Part::bytes(bytes).file_name(file_name));
    for pair in text {
        let (key, value) = split_pair(pair)?;
        form = form.text(key.to_string(), value.to_string());
    }
    Ok(form)
}

/// `key=value` arguments as a JSON object of strings.
fn key_values(pairs: &[String]) -> Result<Value, ApiError> {
    let mut map = serde_json::Map::new();
    for pair in pairs {
        let (key, value) = split_pair(pair)?;
        map.insert(key.to_string(), Value::String(value.to_string()));
    }
    Ok(Value::Object(map))
}

fn split_pair(pair: &str) -> Result<(&str, &str), ApiError> {
    pair.split_once('=')
        .ok_or_else(|| usage(format!("expected key=value, got {:?}", pair)))
}

fn parse_json(data: &str) -> Result<Value, ApiError> {
    serde_json::from_str(data).map_err(|e| usage(format!("invalid JSON body: {}", e)))
}

fn usage(message: String) -> ApiError {
    ApiError::BadRequest {
        message,
        errors: None,
    }
}

/// Error text for the terminal, including field errors.
fn describe(err: ApiError) -> String {
    let mut out = format!("{} (status {})", err, err.status());
    if let Some(errors) = err.validation_errors() {
        for field in errors.fields() {
            for message in errors.get(field).unwrap_or_default() {
                out.push_str(&format!("\n  {}: {}", field, message));
            }
        }
    }
    out
}
