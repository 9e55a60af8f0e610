use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use d3_client::helpers::parse_parameters;
use d3_client::{
    ClientConfig, D3Client, D3Error, OperationRequest, PollOptions, StatusQuery,
    SupportedOperationQuery, TaskStatus, UploadOptions, UploadProgress, UploadSession,
};

#[derive(Parser, Debug)]
#[command(
    name = "d3",
    version = env!("CARGO_PKG_VERSION"),
    author = "Tyr Chen <tyr.chen@gmail.com>",
    about = "Upload, convert and track files with the D3 file-processing API",
    long_about = "Uploads local files through presigned multipart URLs, submits operations \
                  (convert, compress, merge, zip, share, lock, unlock, reset_password) over \
                  the uploaded file keys and polls their status until they finish.",
    after_help = "Examples:\n  \
                  d3 upload ./report.pdf                         # Upload a file\n  \
                  d3 supported pdf --action convert              # Check what a format supports\n  \
                  d3 run compress --file-key KEY --wait          # Compress and wait for the result\n  \
                  d3 convert ./report.pdf --to png               # Upload, convert and print links\n\n\
                  Configuration (.env):\n  \
                  D3_API_KEY=your-api-key\n  \
                  D3_BASE_URL=https://api-dev.dragdropdo.com\n  \
                  D3_TIMEOUT_SECS=30"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload a local file and print its file key
    Upload(UploadArgs),

    /// Check whether an action is supported for a file extension
    Supported {
        /// File extension, e.g. "pdf"
        ext: String,

        /// Action to check, e.g. "convert"
        #[arg(long, short = 'a')]
        action: Option<String>,
    },

    /// Submit an operation over uploaded file keys
    Run {
        /// Action name (convert, compress, merge, zip, share, lock, unlock, reset_password)
        action: String,

        /// File key returned by an upload (repeatable)
        #[arg(long = "file-key", short = 'k', required = true)]
        file_keys: Vec<String>,

        /// Operation parameters (key=value pairs, comma-separated)
        #[arg(long)]
        params: Option<String>,

        #[command(flatten)]
        poll: PollArgs,
    },

    /// Show the status of a task
    Status {
        main_task_id: String,

        /// Query a single file task inside the main task
        file_task_id: Option<String>,

        #[command(flatten)]
        poll: PollArgs,
    },

    /// Upload a file, convert it and wait for the download links
    Convert {
        file: PathBuf,

        /// Target format, e.g. "png"
        #[arg(long)]
        to: String,

        /// Number of upload parts (default: one per 5MB, at most 100)
        #[arg(long, short = 'p')]
        parts: Option<u32>,

        /// Polling interval in milliseconds (0 uses the 2s default)
        #[arg(long, default_value = "2000")]
        interval_ms: u64,

        /// Give up waiting after this many seconds (0 uses the 5m default)
        #[arg(long, default_value = "300")]
        timeout_secs: u64,
    },
}

#[derive(Args, Debug)]
struct UploadArgs {
    file: PathBuf,

    /// Name to register the file under (default: the local file name)
    #[arg(long)]
    name: Option<String>,

    /// Override the detected MIME type
    #[arg(long)]
    mime_type: Option<String>,

    /// Number of upload parts (default: one per 5MB, at most 100)
    #[arg(long, short = 'p')]
    parts: Option<u32>,
}

#[derive(Args, Debug)]
struct PollArgs {
    /// Keep polling until the task completes or fails
    #[arg(long, short = 'w')]
    wait: bool,

    /// Polling interval in milliseconds (0 uses the 2s default)
    #[arg(long, default_value = "2000")]
    interval_ms: u64,

    /// Give up waiting after this many seconds (0 uses the 5m default)
    #[arg(long, default_value = "300")]
    timeout_secs: u64,
}

impl PollArgs {
    fn options(&self) -> PollOptions {
        poll_options(self.interval_ms, self.timeout_secs)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file early to get LOG_LEVEL
    dotenv::dotenv().ok();

    let log_level = std::env::var("LOG_LEVEL")
        .ok()
        .or_else(|| std::env::var("RUST_LOG").ok())
        .unwrap_or_else(|| "info".to_string());

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .or_else(|_| tracing_subscriber::EnvFilter::try_new(&log_level))
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_level(true)
        .init();

    let cli = Cli::parse();

    info!("D3 client v{}", env!("CARGO_PKG_VERSION"));

    let config = ClientConfig::from_env().map_err(report)?;
    let client = D3Client::new(config).map_err(report)?;

    match cli.command {
        Command::Upload(args) => {
            let session = upload(&client, &args.file, args.name, args.mime_type, args.parts).await?;
            println!("{} {}", style("File key:").bold(), style(&session.file_key).cyan());
            println!("{} {}", style("Upload ID:").bold(), session.upload_id);
        }
        Command::Supported { ext, action } => {
            let mut query = SupportedOperationQuery::new(ext);
            if let Some(action) = action {
                query = query.action(action);
            }
            let result = client
                .check_supported_operation(&query)
                .await
                .map_err(report)?;

            if result.supported {
                println!("{} .{} is supported", style("✓").green(), result.ext);
            } else {
                println!("{} .{} is not supported", style("✗").red(), result.ext);
            }
            if let Some(actions) = result.available_actions {
                println!("{} {}", style("Available actions:").bold(), actions.join(", "));
            }
        }
        Command::Run {
            action,
            file_keys,
            params,
            poll,
        } => {
            let mut request = OperationRequest::new(action, file_keys);
            if let Some(params) = params.as_deref() {
                request = request.parameters(parse_parameters(params));
            }
            let operation = client.create_operation(&request).await.map_err(report)?;
            println!(
                "{} {}",
                style("Task ID:").bold(),
                style(&operation.main_task_id).cyan()
            );

            if poll.wait {
                let status =
                    wait_for(&client, &StatusQuery::new(operation.main_task_id), poll.options())
                        .await?;
                print_status(&status);
            }
        }
        Command::Status {
            main_task_id,
            file_task_id,
            poll,
        } => {
            let mut query = StatusQuery::new(main_task_id);
            if let Some(file_task_id) = file_task_id {
                query = query.file_task(file_task_id);
            }

            let status = if poll.wait {
                wait_for(&client, &query, poll.options()).await?
            } else {
                client.get_status(&query).await.map_err(report)?
            };
            print_status(&status);
        }
        Command::Convert {
            file,
            to,
            parts,
            interval_ms,
            timeout_secs,
        } => {
            let session = upload(&client, &file, None, None, parts).await?;
            let operation = client
                .convert([session.file_key], &to, None)
                .await
                .map_err(report)?;
            info!("Conversion task {} submitted", operation.main_task_id);

            let status = wait_for(
                &client,
                &StatusQuery::new(operation.main_task_id),
                poll_options(interval_ms, timeout_secs),
            )
            .await?;
            print_status(&status);
        }
    }

    Ok(())
}

fn poll_options(interval_ms: u64, timeout_secs: u64) -> PollOptions {
    PollOptions::new()
        .interval(Duration::from_millis(interval_ms))
        .timeout(Duration::from_secs(timeout_secs))
}

/// Upload with a progress bar driven by per-part notifications
async fn upload(
    client: &D3Client,
    file: &Path,
    name: Option<String>,
    mime_type: Option<String>,
    parts: Option<u32>,
) -> Result<UploadSession> {
    let mut options = match name {
        Some(name) => UploadOptions::new(file, name),
        None => UploadOptions::from_path(file),
    };
    if let Some(mime_type) = mime_type {
        options = options.mime_type(mime_type);
    }
    if let Some(parts) = parts {
        options = options.parts(parts);
    }

    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {bytes}/{total_bytes} {msg}")
            .context("invalid progress bar template")?
            .progress_chars("#>-"),
    );
    pb.set_message(options.file_name.clone());

    let bar = pb.clone();
    let options = options.on_progress(move |p: &UploadProgress| -> d3_client::Result<()> {
        bar.set_length(p.total_bytes);
        bar.set_position(p.bytes_uploaded);
        bar.set_message(format!("part {}/{}", p.current_part, p.total_parts));
        Ok(())
    });

    let result = client.upload_file(options).await;
    pb.finish_and_clear();

    let session = result.map_err(report)?;
    println!(
        "{} Uploaded {} ({})",
        style("✓").green(),
        style(file.display()).bold(),
        style(format_size(
            std::fs::metadata(file).map(|m| m.len()).unwrap_or_default()
        ))
        .dim()
    );
    Ok(session)
}

/// Poll with a spinner showing the latest status
async fn wait_for(client: &D3Client, query: &StatusQuery, options: PollOptions) -> Result<TaskStatus> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .context("invalid spinner template")?,
    );
    spinner.enable_steady_tick(Duration::from_millis(100));

    let ticker = spinner.clone();
    let options = options.on_update(move |status: &TaskStatus| -> d3_client::Result<()> {
        ticker.set_message(format!("Task is {}", status.operation_status));
        Ok(())
    });

    let result = client.poll_status(query, options).await;
    spinner.finish_and_clear();
    result.map_err(report)
}

fn print_status(status: &TaskStatus) {
    let label = if status.is_terminal() && status.files_data.iter().all(|f| f.error_code.is_none())
    {
        style(status.operation_status.to_string()).green()
    } else {
        style(status.operation_status.to_string()).yellow()
    };
    println!("{} {}", style("Status:").bold(), label);

    for file in &status.files_data {
        match (&file.download_link, &file.error_message) {
            (Some(link), _) => println!("  {} {} {}", style("✓").green(), file.file_key, link),
            (None, Some(message)) => println!(
                "  {} {} {} ({})",
                style("✗").red(),
                file.file_key,
                message,
                file.error_code.as_deref().unwrap_or("unknown error")
            ),
            (None, None) => println!("  {} {} {}", style("•").dim(), file.file_key, file.status),
        }
    }
}

/// Turn a client error into a CLI error carrying its user-facing message
fn report(e: D3Error) -> anyhow::Error {
    anyhow::anyhow!(e.user_message())
}

/// Format file size for display
fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
