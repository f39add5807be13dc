mod render;
mod shell;

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use client_core::{
    config::{load_settings_from, Settings, DEFAULT_CONFIG_FILE},
    DataService, MissingDataService, PaginatedTaskListController, RestDataService,
};
use shared::domain::{PageSize, TaskId};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(about = "Browse and edit a remote task list page by page")]
struct Args {
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,
    #[arg(long)]
    service_url: Option<String>,
    #[arg(long)]
    api_key: Option<String>,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print one page of tasks.
    List(PageArgs),
    /// Create a task.
    Add { title: String },
    /// Flip the completion flag of a task on the given page.
    Toggle {
        id: i64,
        #[command(flatten)]
        page: PageArgs,
    },
    /// Interactive pager (the default).
    Shell(PageArgs),
}

#[derive(ClapArgs, Debug, Clone, Default)]
struct PageArgs {
    #[arg(long, default_value_t = 1)]
    page: u32,
    #[arg(long, value_parser = parse_page_size)]
    page_size: Option<PageSize>,
}

fn parse_page_size(raw: &str) -> Result<PageSize, String> {
    let size: u32 = raw
        .parse()
        .map_err(|_| format!("'{raw}' is not a number"))?;
    PageSize::new(size).map_err(|err| err.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let mut settings = load_settings_from(&args.config, |key| std::env::var(key).ok())?;
    if let Some(url) = &args.service_url {
        settings.apply("service_url", url)?;
    }
    if let Some(key) = &args.api_key {
        settings.apply("api_key", key)?;
    }

    let controller =
        PaginatedTaskListController::new(data_service(&settings), settings.controller_options());
    let default_size = settings.default_page_size;

    match args.command.unwrap_or(Command::Shell(PageArgs { page: 1, page_size: None })) {
        Command::List(page) => {
            load(&controller, &page, default_size).await?;
            println!("{}", render::page_view(&controller.snapshot().await));
        }
        Command::Add { title } => {
            let task = controller.create_task(&title).await?;
            println!("{}", render::task_row(&task, false));
        }
        Command::Toggle { id, page } => {
            load(&controller, &page, default_size).await?;
            match controller.toggle_complete(TaskId(id)).await? {
                Some(task) => println!("{}", render::task_row(&task, false)),
                None => println!("task #{id} updated"),
            }
        }
        Command::Shell(page) => {
            shell::run(&controller, page.page, page.page_size.unwrap_or(default_size)).await?;
        }
    }

    Ok(())
}

/// Falls back to a service that fails every call, so the pager still starts
/// and reports the problem through its notifications.
fn data_service(settings: &Settings) -> Arc<dyn DataService> {
    match RestDataService::from_settings(settings) {
        Ok(service) => {
            tracing::info!("tasks: using {}", service.base_url());
            Arc::new(service)
        }
        Err(err) => {
            tracing::warn!(
                "tasks: no data service for '{}': {err}",
                settings.service_url
            );
            Arc::new(MissingDataService)
        }
    }
}

async fn load(
    controller: &PaginatedTaskListController,
    page: &PageArgs,
    default_size: PageSize,
) -> Result<()> {
    controller
        .load_page(page.page, page.page_size.unwrap_or(default_size))
        .await
        .with_context(|| format!("failed to load page {}", page.page))?;
    Ok(())
}
