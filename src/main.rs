//! taskpro - console entry point
//!
//! Loads the task store and preferences, starts the reminder scheduler, and
//! reads commands from stdin until EOF, `quit`, or Ctrl-C.

use std::sync::Arc;

use taskpro::config::Config;
use taskpro::console::{parse_command, Command, Console, HELP};
use taskpro::reminder::{LogSink, NoopSink, NotificationSink, ReminderScheduler};
use taskpro::settings::PreferencesStore;
use taskpro::store::TaskStore;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> anyhow::Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(async_main())
}

async fn async_main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "taskpro=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Load configuration
    let config = Config::from_env()?;
    info!("Loaded configuration: data_dir={}", config.data_dir.display());

    let store = Arc::new(TaskStore::open(config.tasks_path()).await);
    let preferences = Arc::new(PreferencesStore::new(config.preferences_path()).await);

    let sink: Arc<dyn NotificationSink> = if config.notifications_enabled {
        Arc::new(LogSink)
    } else {
        info!("Notifications disabled");
        Arc::new(NoopSink)
    };
    let reminders =
        ReminderScheduler::new(Arc::clone(&store), sink, config.reminder.clone()).spawn();

    let console = Console::new(Arc::clone(&store), Arc::clone(&preferences), &reminders);
    println!("{}", HELP);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else { break };

        match parse_command(&line) {
            Ok(None) => {}
            Ok(Some(Command::Quit)) => break,
            Ok(Some(command)) => match console.execute(command).await {
                Ok(output) => println!("{}", output),
                Err(e) => println!("error: {:#}", e),
            },
            Err(e) => println!("error: {}", e),
        }
    }

    // Teardown: stop the timer first, then flush what the last mutation left.
    drop(console);
    reminders.shutdown().await;
    if let Err(e) = store.flush().await {
        warn!("Failed to flush task store on shutdown: {}", e);
    }
    if let Err(e) = preferences.save().await {
        warn!("Failed to save preferences on shutdown: {}", e);
    }
    info!("Goodbye");

    Ok(())
}
