use anyhow::Context as _;
use courier::adapters::{LoggerAdapter, MemoryAdapter};
use courier::{AdapterConfig, AdapterRegistry, Email, FormatEmailAddress, Mailer, MailerSettings};
use tracing_subscriber::EnvFilter;

#[derive(Clone, FormatEmailAddress)]
struct User {
    name: String,
    email: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("courier=debug,info")),
        )
        .init();

    // Falls back to an in-memory outbox when DEMO_MAILER_ADAPTER is unset
    let settings = MailerSettings::from_env("demo", "mailer").context("reading mailer settings")?;
    let settings = match settings.adapter {
        Some(_) => settings,
        None => settings.adapter("memory"),
    };
    let mailer = Mailer::from_settings("mailer", settings, &AdapterRegistry::default())
        .context("defining mailer")?;

    let audit = Mailer::builder("audit")
        .adapter(LoggerAdapter::new())
        .config(AdapterConfig::new().with("log_full_email", true))
        .build()?;

    let user = User {
        name: "Jane Doe".to_string(),
        email: "jane@example.com".to_string(),
    };

    let email = Email::new()
        .from(("Demo", "noreply@example.com"))
        .to(user)
        .subject("Welcome!!!")
        .html_body("<strong>WELCOME</strong>")
        .text_body("WELCOME");

    let receipt = mailer.deliver(&email).await?;
    tracing::info!(%receipt, adapter = mailer.adapter_name(), "delivered");

    let handle = audit.deliver_async(&email)?;
    tracing::info!(delivery_id = %handle.id(), "audit copy queued");
    handle.await?;

    let outbox = MemoryAdapter::new();
    let preview = Mailer::builder("preview").adapter(outbox.clone()).build()?;
    preview.deliver(&email).await?;
    for sent in outbox.take().await {
        println!("{}", serde_json::to_string_pretty(&sent)?);
    }

    Ok(())
}
