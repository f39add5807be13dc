//! Interactive loop over the controller: one line in, one action out.

use anyhow::Result;
use chrono::Utc;
use client_core::{ControllerEvent, NotificationKey, PaginatedTaskListController, TaskListError};
use shared::domain::{PageSize, TaskId};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    sync::broadcast::{self, error::TryRecvError},
};

use crate::render;

pub const HELP: &str = "\
commands:
  n | next            next page
  p | prev            previous page
  size <n>            change page size (10, 20, 50, 100, 500, 1000, 5000, 10000, 50000, 100000)
  add [title]         create a task; without a title opens the form
  toggle <id>         flip completion of a task on this page
  r | reload          re-fetch the current page
  ls | show           print the current page
  help                this text
  q | quit            leave";

const CANCEL: &str = "/cancel";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    Next,
    Prev,
    Size(PageSize),
    Add(Option<String>),
    Toggle(TaskId),
    Reload,
    Show,
    Help,
    Quit,
}

pub fn parse_command(line: &str) -> Result<ShellCommand, String> {
    let line = line.trim();
    let (head, rest) = match line.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (line, ""),
    };

    match head.to_ascii_lowercase().as_str() {
        "n" | "next" => Ok(ShellCommand::Next),
        "p" | "prev" | "previous" => Ok(ShellCommand::Prev),
        "size" => {
            let raw: u32 = rest
                .parse()
                .map_err(|_| format!("size expects a number, got '{rest}'"))?;
            PageSize::new(raw)
                .map(ShellCommand::Size)
                .map_err(|err| err.to_string())
        }
        "add" | "new" => Ok(ShellCommand::Add((!rest.is_empty()).then(|| rest.to_string()))),
        "toggle" | "t" => rest
            .trim_start_matches('#')
            .parse::<i64>()
            .map(|id| ShellCommand::Toggle(TaskId(id)))
            .map_err(|_| format!("toggle expects a task id, got '{rest}'")),
        "r" | "reload" => Ok(ShellCommand::Reload),
        "ls" | "show" => Ok(ShellCommand::Show),
        "help" | "?" => Ok(ShellCommand::Help),
        "q" | "quit" | "exit" => Ok(ShellCommand::Quit),
        "" => Ok(ShellCommand::Show),
        other => Err(format!("unknown command '{other}'; try 'help'")),
    }
}

pub async fn run(controller: &PaginatedTaskListController, page: u32, page_size: PageSize) -> Result<()> {
    let mut events = controller.subscribe_events();
    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    if let Err(err) = controller.load_page(page, page_size).await {
        tracing::debug!("shell: initial load failed: {err}");
    }
    emit(&mut stdout, &notifications(controller, &mut events).await).await?;
    emit(&mut stdout, &render::page_view(&controller.snapshot().await)).await?;

    loop {
        let form_open = controller.with_state(|s| s.create_form_open()).await;
        let prompt = if form_open { "title> " } else { "tasks> " };
        stdout.write_all(prompt.as_bytes()).await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        if form_open {
            if line.trim() == CANCEL {
                controller.cancel_create_form().await;
            } else {
                let _ = controller.create_task(&line).await;
            }
            emit(&mut stdout, &notifications(controller, &mut events).await).await?;
            continue;
        }

        let command = match parse_command(&line) {
            Ok(command) => command,
            Err(message) => {
                emit(&mut stdout, &message).await?;
                continue;
            }
        };

        let show_page = match command {
            ShellCommand::Quit => break,
            ShellCommand::Help => {
                emit(&mut stdout, HELP).await?;
                false
            }
            ShellCommand::Show => true,
            ShellCommand::Next => report(controller.next_page().await.map(|moved| moved.is_some())),
            ShellCommand::Prev => {
                report(controller.previous_page().await.map(|moved| moved.is_some()))
            }
            ShellCommand::Size(size) => report(controller.set_page_size(size).await.map(|_| true)),
            ShellCommand::Reload => report(controller.reload().await.map(|_| true)),
            ShellCommand::Add(Some(title)) => report(controller.create_task(&title).await.map(|_| true)),
            ShellCommand::Add(None) => {
                controller.open_create_form().await;
                emit(&mut stdout, &format!("enter a title, or {CANCEL}")).await?;
                false
            }
            ShellCommand::Toggle(id) => {
                match controller.toggle_complete(id).await {
                    Err(err @ (TaskListError::UnknownTask(_) | TaskListError::ToggleInFlight(_))) => {
                        emit(&mut stdout, &err.to_string()).await?;
                        false
                    }
                    other => report(other.map(|_| true)),
                }
            }
        };

        emit(&mut stdout, &notifications(controller, &mut events).await).await?;
        if show_page {
            emit(&mut stdout, &render::page_view(&controller.snapshot().await)).await?;
        }
        controller.prune_notifications().await;
    }

    Ok(())
}

/// Failures are already surfaced as notifications; only successes redraw.
fn report(result: Result<bool, TaskListError>) -> bool {
    match result {
        Ok(changed) => changed,
        Err(err) => {
            tracing::debug!("shell: action failed: {err}");
            false
        }
    }
}

/// Keys notified since the last call, in first-posted order.
fn touched_keys(events: &mut broadcast::Receiver<ControllerEvent>) -> Vec<NotificationKey> {
    let mut keys = Vec::new();
    loop {
        match events.try_recv() {
            Ok(ControllerEvent::Notified(notification)) => {
                if !keys.contains(&notification.key) {
                    keys.push(notification.key);
                }
            }
            Ok(_) | Err(TryRecvError::Lagged(_)) => {}
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
        }
    }
    keys
}

/// What the last action left on screen: one line per touched key.
async fn notifications(
    controller: &PaginatedTaskListController,
    events: &mut broadcast::Receiver<ControllerEvent>,
) -> String {
    let keys = touched_keys(events);
    if keys.is_empty() {
        return String::new();
    }
    controller
        .with_state(|state| render::notification_block(state, &keys, Utc::now()))
        .await
}

async fn emit(stdout: &mut tokio::io::Stdout, text: &str) -> std::io::Result<()> {
    if text.is_empty() {
        return Ok(());
    }
    stdout.write_all(text.as_bytes()).await?;
    stdout.write_all(b"\n").await?;
    stdout.flush().await
}
