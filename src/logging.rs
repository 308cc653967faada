use crate::utils::truncate_str;
use crate::{PageSummary, UnfurlError};
use std::io;
use std::path::PathBuf;
use tracing::{debug, error, info};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    fmt as subscriber_fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer,
};

#[derive(Debug)]
pub struct LogConfig {
    pub log_dir: PathBuf,
    pub log_level: String,
    pub console_output: bool,
    pub file_output: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_dir: "logs".into(),
            log_level: "info".into(),
            console_output: true,
            file_output: true,
        }
    }
}

const CARD_WIDTH: usize = 80;
const LABEL_WIDTH: usize = 11;

fn card_line(label: &str, value: &str) -> String {
    let value = truncate_str(value, CARD_WIDTH - LABEL_WIDTH - 4);
    format!("║ {label:>width$}: {value}", width = LABEL_WIDTH)
}

/// One line per summary field; unset fields are shown as `-`.
fn summary_lines(summary: &PageSummary) -> Vec<String> {
    let or_dash = |value: Option<&str>| value.unwrap_or("-").to_string();

    let mut lines = vec![
        card_line("URL", &summary.url),
        card_line("Title", &or_dash(summary.title.as_deref())),
        card_line("Description", &or_dash(summary.description.as_deref())),
        card_line("Image", &or_dash(summary.images.first().map(String::as_str))),
    ];

    if let Some(site_name) = summary.site_name() {
        lines.push(card_line("Site", site_name));
    }
    if let Some(kind) = summary.kind() {
        lines.push(card_line("Type", kind));
    }
    let keywords = summary.keywords();
    if !keywords.is_empty() {
        lines.push(card_line("Keywords", &keywords.join(", ")));
    }
    lines.push(card_line("Meta keys", &summary.meta.len().to_string()));

    lines
}

pub fn log_summary_card(summary: &PageSummary) {
    let border = "═".repeat(CARD_WIDTH - 2);
    info!(
        url = %summary.url,
        "\n╔{}╗\n{}\n╚{}╝",
        border,
        summary_lines(summary).join("\n"),
        border
    );
}

/// Structured failure event for one unfurled URL, tagged with the error kind.
pub fn log_failure(url: &str, error: &UnfurlError) {
    error!(
        url = %url,
        kind = error.kind(),
        error = %error,
        "Unfurl failed"
    );
}

/// Installs the global subscriber: a pretty console layer and/or a daily
/// rolling file under `log_dir`. `RUST_LOG` overrides `log_level`.
pub fn setup_logging(config: LogConfig) -> io::Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let mut layers = Vec::new();

    if config.console_output {
        let console_layer = subscriber_fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_line_number(true)
            .with_file(true)
            .with_span_events(subscriber_fmt::format::FmtSpan::CLOSE)
            .pretty();
        layers.push(console_layer.boxed());
    }

    if config.file_output {
        std::fs::create_dir_all(&config.log_dir)?;

        let file_appender =
            RollingFileAppender::new(Rotation::DAILY, &config.log_dir, "unfurl.log");

        let file_layer = subscriber_fmt::layer()
            .with_ansi(false)
            .with_target(true)
            .with_thread_ids(true)
            .with_line_number(true)
            .with_file(true)
            .with_writer(file_appender);

        layers.push(file_layer.boxed());
    }

    tracing_subscriber::registry()
        .with(env_filter)
        .with(layers)
        .try_init()
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;

    debug!("Logging system initialized with config: {:?}", config);
    Ok(())
}
