use dotenvy::dotenv;
use regex::Regex;
use std::io::{self, Write};
use std::sync::Arc;
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use teloxide::types::CallbackQuery;
use tracing::{error, info, warn};
use tracing_subscriber::{prelude::*, EnvFilter};
use tube_courier::bot::handlers::{self, Command};
use tube_courier::bot::{JobRunner, Messenger, TelegramMessenger};
use tube_courier::config::{
    SecondaryTransportConfig, Settings, PENDING_LINKS_MAX_SIZE, PROGRESS_EDIT_INTERVAL,
    PROGRESS_THROTTLE_MAX_SIZE, PROGRESS_THROTTLE_TTL,
};
use tube_courier::delivery::{build_bot, BotApiTransport, DeliveryDispatcher, UploadTransport};
use tube_courier::media::{Downloader, TokioProcessRunner};
use tube_courier::session::{EditThrottle, PendingLinks};

/// Regex patterns for redacting sensitive data
struct RedactionPatterns {
    token1: Regex,
    token2: Regex,
    token3: Regex,
    api_hash_env: Regex,
    api_hash_value: Option<Regex>,
}

impl RedactionPatterns {
    /// Initialize all regex patterns
    ///
    /// # Errors
    ///
    /// Returns an error if any regex pattern is invalid
    fn new(api_hash: Option<&str>) -> Result<Self, regex::Error> {
        let api_hash_value = api_hash
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .map(|h| Regex::new(&regex::escape(h)))
            .transpose()?;
        Ok(Self {
            token1: Regex::new(r"(https?://[^/]+/bot)([0-9]+:[A-Za-z0-9_-]+)(/['\s]*)")?,
            token2: Regex::new(r"([0-9]{8,10}:[A-Za-z0-9_-]{35})")?,
            token3: Regex::new(r"(bot[0-9]{8,10}:)[A-Za-z0-9_-]+")?,
            api_hash_env: Regex::new(r"API_HASH=[^\s&]+")?,
            api_hash_value,
        })
    }

    fn redact(&self, input: &str) -> String {
        let mut output = input.to_string();
        output = self
            .token1
            .replace_all(&output, "$1[TELEGRAM_TOKEN]$3")
            .to_string();
        output = self
            .token2
            .replace_all(&output, "[TELEGRAM_TOKEN]")
            .to_string();
        output = self
            .token3
            .replace_all(&output, "$1[TELEGRAM_TOKEN]")
            .to_string();
        output = self
            .api_hash_env
            .replace_all(&output, "API_HASH=[MASKED]")
            .to_string();
        if let Some(re) = &self.api_hash_value {
            output = re.replace_all(&output, "[API_HASH]").to_string();
        }
        output
    }
}

struct RedactingWriter<W: Write> {
    inner: W,
    patterns: Arc<RedactionPatterns>,
}

impl<W: Write> RedactingWriter<W> {
    const fn new(inner: W, patterns: Arc<RedactionPatterns>) -> Self {
        Self { inner, patterns }
    }
}

impl<W: Write> Write for RedactingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let s = String::from_utf8_lossy(buf);
        let redacted = self.patterns.redact(&s);
        self.inner.write_all(redacted.as_bytes())?;
        // Report the original length; the redacted text may be shorter or longer
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

struct RedactingMakeWriter<F> {
    make_inner: F,
    patterns: Arc<RedactionPatterns>,
}

impl<F> RedactingMakeWriter<F> {
    const fn new(make_inner: F, patterns: Arc<RedactionPatterns>) -> Self {
        Self {
            make_inner,
            patterns,
        }
    }
}

impl<'a, F, W> tracing_subscriber::fmt::MakeWriter<'a> for RedactingMakeWriter<F>
where
    F: Fn() -> W + 'static,
    W: Write,
{
    type Writer = RedactingWriter<W>;

    fn make_writer(&'a self) -> Self::Writer {
        RedactingWriter::new((self.make_inner)(), self.patterns.clone())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file
    dotenv().ok();

    // Redaction must be in place before the first log line
    let api_hash = std::env::var("API_HASH").ok();
    let patterns = Arc::new(RedactionPatterns::new(api_hash.as_deref()).map_err(|e| {
        eprintln!("Failed to compile regex patterns: {e}");
        e
    })?);

    init_logging(patterns);

    info!("Starting YouTube download bot...");

    let settings = init_settings();

    let primary_bot = build_bot(
        &settings.telegram_bot_token,
        std::time::Duration::from_secs(settings.primary_upload_timeout_secs),
        None,
    )?;
    let secondary = init_secondary_transport(&settings)?;

    let throttle = EditThrottle::new(
        PROGRESS_EDIT_INTERVAL,
        PROGRESS_THROTTLE_TTL,
        PROGRESS_THROTTLE_MAX_SIZE,
    );
    let delivery = Arc::new(DeliveryDispatcher::new(
        Arc::new(BotApiTransport::primary(primary_bot.clone())),
        secondary,
        throttle,
    ));

    let downloader = Arc::new(Downloader::new(&settings, Arc::new(TokioProcessRunner)));
    info!(
        strategies = downloader.strategy_count(),
        download_dir = %settings.download_dir,
        "Downloader initialized."
    );

    let messenger: Arc<dyn Messenger> = Arc::new(TelegramMessenger::new(primary_bot.clone()));
    let jobs = Arc::new(JobRunner::new(
        messenger.clone(),
        downloader,
        delivery,
        settings.max_concurrent_jobs,
    ));
    let pending = Arc::new(PendingLinks::new(
        settings.pending_link_ttl(),
        PENDING_LINKS_MAX_SIZE,
    ));

    let handler = setup_handler();

    info!("Bot is running...");

    Dispatcher::builder(primary_bot, handler)
        .dependencies(dptree::deps![settings, messenger, pending, jobs])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}

fn init_logging(patterns: Arc<RedactionPatterns>) {
    let make_writer = RedactingMakeWriter::new(io::stderr, patterns);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(make_writer))
        .init();
}

fn init_settings() -> Arc<Settings> {
    match Settings::new() {
        Ok(s) => {
            info!("Configuration loaded successfully.");
            Arc::new(s)
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    }
}

fn init_secondary_transport(
    settings: &Settings,
) -> Result<Option<Arc<dyn UploadTransport>>, reqwest::Error> {
    match settings.secondary_transport() {
        SecondaryTransportConfig::Enabled(endpoint) => {
            info!(
                api_url = %endpoint.api_url,
                api_id = endpoint.api_id,
                "Large-file transport enabled."
            );
            let bot = build_bot(
                &settings.telegram_bot_token,
                std::time::Duration::from_secs(settings.secondary_upload_timeout_secs),
                Some(endpoint.api_url),
            )?;
            Ok(Some(Arc::new(BotApiTransport::secondary(bot))))
        }
        SecondaryTransportConfig::Disabled => {
            warn!("Large-file transport not configured; files over 50 MB will be refused.");
            Ok(None)
        }
        SecondaryTransportConfig::Invalid(reason) => {
            error!("Large-file transport disabled, configuration is invalid: {reason}");
            Ok(None)
        }
    }
}

fn setup_handler() -> UpdateHandler<teloxide::RequestError> {
    dptree::entry()
        .branch(Update::filter_callback_query().endpoint(handle_callback))
        .branch(
            Update::filter_message()
                .branch(
                    dptree::entry()
                        .filter_command::<Command>()
                        .endpoint(handle_command),
                )
                .branch(dptree::filter(|msg: Message| msg.text().is_some()).endpoint(handle_text)),
        )
}

async fn handle_command(
    messenger: Arc<dyn Messenger>,
    msg: Message,
    cmd: Command,
) -> Result<(), teloxide::RequestError> {
    let res = match cmd {
        Command::Start => handlers::start(messenger, msg).await,
        Command::Help => handlers::help(messenger, msg).await,
        Command::Healthcheck => handlers::healthcheck(messenger, msg).await,
    };
    if let Err(e) = res {
        error!("Command error: {}", e);
    }
    respond(())
}

async fn handle_text(
    messenger: Arc<dyn Messenger>,
    msg: Message,
    pending: Arc<PendingLinks>,
) -> Result<(), teloxide::RequestError> {
    if let Err(e) = handlers::handle_text(messenger, msg, pending).await {
        error!("Text handler error: {}", e);
    }
    respond(())
}

async fn handle_callback(
    bot: Bot,
    messenger: Arc<dyn Messenger>,
    q: CallbackQuery,
    pending: Arc<PendingLinks>,
    jobs: Arc<JobRunner>,
) -> Result<(), teloxide::RequestError> {
    // Stops the client-side spinner before any slow work
    if let Err(e) = bot.answer_callback_query(q.id.clone()).await {
        warn!("Failed to answer callback query {}: {e}", q.id);
    }
    if let Err(e) = handlers::handle_callback(messenger, q.clone(), pending, jobs).await {
        error!("Callback handler error: {}", e);
        if let Some(chat) = q.message.as_ref().map(|m| m.chat().id) {
            if let Err(e) = bot
                .send_message(chat, tube_courier::bot::views::BUTTON_ERROR)
                .await
            {
                error!("Failed to report callback error: {}", e);
            }
        }
    }
    respond(())
}
