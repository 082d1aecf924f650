//! Book catalog entry point.
//!
//! `serve` (the default) runs the GraphQL server; `watch` and `add` talk to a
//! running server through the client transport.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use book_catalog::cli::{Cli, Command};
use book_catalog::client::{
    BookForm, BookListController, CatalogTransport, HttpTransport, SubscriptionState,
};
use book_catalog::config::Config;
use book_catalog::graphql::GraphqlServiceConfig;
use book_catalog::services::{CatalogServiceConfig, HttpServerConfig, ServicesManager};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "book_catalog=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
        .init();

    match cli.command() {
        Command::Serve { port } => serve(port).await,
        Command::Watch { url } => watch(&url).await,
        Command::Add { url, title, author } => add(&url, title, author).await,
    }
}

async fn serve(port_override: Option<u16>) -> anyhow::Result<()> {
    let mut config = Config::from_env()?;
    if let Some(port) = port_override {
        config.port = port;
    }
    let config = Arc::new(config);
    tracing::info!(port = config.port, "Starting book catalog");

    let services = ServicesManager::builder()
        .add_service(CatalogServiceConfig::default())
        .add_service(GraphqlServiceConfig {
            server_port: config.port,
        })
        .add_service(HttpServerConfig {
            config: config.clone(),
        })
        .start()
        .await?;

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;
    tracing::info!("Shutting down");
    services.stop_all().await
}

async fn watch(url: &str) -> anyhow::Result<()> {
    let controller = BookListController::init(HttpTransport::new(url)?).await?;
    if controller.subscription_state() != SubscriptionState::Active {
        anyhow::bail!("could not subscribe to new books at {url}");
    }

    let mut refreshes = controller.refreshes();
    let mut state = controller.watch_state();
    let mut printed = 0;
    print_new_books(&controller, &mut printed);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = refreshes.changed() => {
                if changed.is_err() {
                    break;
                }
                print_new_books(&controller, &mut printed);
            }
            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = *state.borrow_and_update();
                if matches!(current, SubscriptionState::Closed | SubscriptionState::Errored) {
                    tracing::warn!(state = ?current, "Subscription ended");
                    break;
                }
            }
        }
    }

    controller.close();
    Ok(())
}

fn print_new_books<T: CatalogTransport>(controller: &BookListController<T>, printed: &mut usize) {
    let books = controller.books();
    for book in books.iter().skip(*printed) {
        println!("{} by {}", book.title, book.author);
    }
    *printed = books.len();
}

async fn add(url: &str, title: String, author: String) -> anyhow::Result<()> {
    let book = BookForm::new(title, author).validate()?;
    let added = HttpTransport::new(url)?.add_book(&book).await?;
    println!("Added {} by {}", added.title, added.author);
    Ok(())
}
