use clap::Parser;
use idea_filter::adapters::{OpenRouterClassifier, RedditSource, SmtpMailer};
use idea_filter::core::Mailer;
use idea_filter::utils::error::IdeaFilterError;
use idea_filter::utils::{logger, validation::Validate};
use idea_filter::{AppConfig, CliArgs, DeliveryCoordinator, DigestEngine, DigestPipeline, LocalStorage};
use std::sync::Arc;

#[tokio::main]
async fn main() {
    // .env 不存在時忽略
    let _ = dotenvy::dotenv();

    let args = CliArgs::parse();

    if args.json_logs {
        logger::init_json_logger(args.verbose);
    } else {
        logger::init_cli_logger(args.verbose);
    }

    if let Err(e) = run(args).await {
        tracing::error!(
            "❌ Idea filter failed: {} (Category: {:?}, Severity: {:?})",
            e,
            e.category(),
            e.severity()
        );
        tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 {}", e.recovery_suggestion());

        std::process::exit(e.exit_code());
    }
}

async fn run(args: CliArgs) -> Result<(), IdeaFilterError> {
    tracing::info!("📁 Loading configuration from: {}", args.config);
    let mut config = AppConfig::from_file(&args.config)?;

    // 套用命令列覆蓋設定
    if let Some(limit) = args.limit {
        config.sources.limit = Some(limit);
        tracing::info!("🔧 Post limit overridden to: {}", limit);
    }
    if let Some(output) = &args.output {
        config.report.output_path = Some(output.clone());
        tracing::info!("🔧 Output path overridden to: {}", output);
    }
    if args.no_email {
        config.mail = None;
        tracing::info!("🔧 Email delivery disabled from the command line");
    }

    config.validate()?;
    tracing::info!("✅ Configuration loaded and validated successfully");

    for missing in config.missing_optional_settings() {
        tracing::warn!("⚠️ Optional setting missing: {}", missing);
    }

    display_config_summary(&config);

    if args.dry_run {
        tracing::info!("🔍 DRY RUN MODE - no requests will be sent");
        println!("Dry run complete. {} subreddit(s) would be processed.", config.sources.names.len());
        return Ok(());
    }

    let source = Arc::new(RedditSource::new(config.reddit_settings())?);
    let classifier = Arc::new(OpenRouterClassifier::new(config.classifier_settings()?)?);

    let mut delivery = DeliveryCoordinator::new(LocalStorage::new(config.output_path().to_string()));
    if let Some(smtp) = config.smtp_settings() {
        let mailer: Arc<dyn Mailer> = Arc::new(SmtpMailer::new(smtp));
        delivery = delivery.with_mailer(mailer);
    }

    let pipeline = DigestPipeline::new(source, classifier, delivery, config.run_config())?;
    let summary = DigestEngine::new(pipeline).run().await?;

    println!(
        "✅ {} of {} posts matched ({} fetched, {} skipped, {} duplicates)",
        summary.matched, summary.evaluated, summary.fetched, summary.skipped, summary.duplicates
    );
    if let Some(path) = &summary.delivery.local_path {
        println!("📁 Report saved to: {}", path);
    }
    match (summary.delivery.email_sent, &summary.delivery.email_error) {
        (true, _) => println!("📧 Email report sent"),
        (false, Some(err)) => println!("⚠️ Email report failed: {}", err),
        (false, None) => println!("📭 Email not configured, report kept locally"),
    }

    Ok(())
}

fn display_config_summary(config: &AppConfig) {
    tracing::info!("📋 Configuration summary:");
    tracing::info!("  Subreddits: {}", config.sources.names.join(", "));
    tracing::info!("  Posts per subreddit: {}", config.limit());
    tracing::info!("  Criterion: {}", config.criterion().as_str());
    tracing::info!("  Output path: {}", config.output_path());
    match config.mail_config() {
        Some(mail) => tracing::info!("  Email recipient: {}", mail.recipient),
        None => tracing::info!("  Email: disabled"),
    }
}
