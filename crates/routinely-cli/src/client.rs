//! HTTP client commands talking to a running routinely server.

use anyhow::{bail, Context, Result};
use chrono::Local;
use serde_json::{json, Value};

use routinely_storage::TaskStore;
use routinely_types::{NewTask, RepeatKind, SchedulerStatus, Task};

fn http() -> reqwest::Client {
    reqwest::Client::new()
}

/// Join the base URL and an API path without doubling slashes.
fn api_url(base: &str, path: &str) -> String {
    format!("{}{}", base.trim_end_matches('/'), path)
}

fn with_auth(request: reqwest::RequestBuilder, token: &Option<String>) -> reqwest::RequestBuilder {
    match token {
        Some(token) => request.bearer_auth(token),
        None => request,
    }
}

/// Read a response body, turning the server's error envelope into a failure.
async fn read_body(response: reqwest::Response) -> Result<Value> {
    let status = response.status();
    let body: Value = response.json().await.unwrap_or_else(|_| json!({}));
    if !status.is_success() {
        let message = body
            .get("error")
            .and_then(|e| e.as_str())
            .unwrap_or("request failed");
        bail!("{message} (HTTP {status})");
    }
    Ok(body)
}

async fn get(url: String, token: &Option<String>) -> Result<Value> {
    let response = with_auth(http().get(&url), token)
        .send()
        .await
        .context("Failed to reach routinely server (is `routinely serve` running?)")?;
    read_body(response).await
}

async fn post(url: String, body: Option<Value>, token: &Option<String>) -> Result<Value> {
    let mut request = with_auth(http().post(&url), token);
    if let Some(body) = body {
        request = request.json(&body);
    }
    let response = request
        .send()
        .await
        .context("Failed to reach routinely server (is `routinely serve` running?)")?;
    read_body(response).await
}

pub async fn run_add(text: String, url: String, token: Option<String>) -> Result<()> {
    let request = with_auth(http().post(api_url(&url, "/api/parse")), &token)
        .json(&json!({"text": text}));
    let response = match request.send().await {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!("Server unreachable ({e}), adding to the local store instead");
            let task = add_offline(&open_local_store()?, &text).await?;
            println!("Added (offline):");
            println!("{}", format_task_line(&task));
            println!("Reminders start once `routinely serve` is running.");
            return Ok(());
        }
    };
    let body = read_body(response).await?;
    let task: Task = serde_json::from_value(body["task"].clone())
        .context("Server returned an unexpected task payload")?;
    println!("Added:");
    println!("{}", format_task_line(&task));
    Ok(())
}

fn open_local_store() -> Result<TaskStore> {
    let dir =
        routinely_config::ensure_config_dir().context("Failed to resolve config directory")?;
    TaskStore::open(&dir.join("routinely.db")).context("Failed to open task database")
}

/// Offline fallback for `add`: regex-parse the command and write straight to
/// the local store.
async fn add_offline(store: &TaskStore, text: &str) -> Result<Task> {
    let parsed = routinely_assistant::parse_task_offline(text, Local::now().date_naive());
    let task = store
        .create_task(NewTask {
            title: parsed.title,
            time: parsed.time,
            date: parsed.date,
            repeat: RepeatKind::Once,
            priority: parsed.priority,
            category: parsed.category,
        })
        .await?;
    Ok(task)
}

pub async fn run_list(all: bool, url: String, token: Option<String>) -> Result<()> {
    let body = get(api_url(&url, "/api/tasks"), &token).await?;
    let tasks: Vec<Task> =
        serde_json::from_value(body).context("Server returned an unexpected task list")?;

    let mut shown = 0;
    for task in &tasks {
        if task.completed && !all {
            continue;
        }
        println!("{}", format_task_line(task));
        shown += 1;
    }
    if shown == 0 {
        println!("No tasks. Add one with: routinely add \"call mom at 3pm tomorrow\"");
    }
    Ok(())
}

pub async fn run_done(id: i64, url: String, token: Option<String>) -> Result<()> {
    let body = post(api_url(&url, &format!("/api/tasks/{id}/complete")), None, &token).await?;
    let task: Task = serde_json::from_value(body)
        .context("Server returned an unexpected task payload")?;
    println!("Completed: {}", task.title);
    Ok(())
}

pub async fn run_rm(id: i64, url: String, token: Option<String>) -> Result<()> {
    let request = with_auth(http().delete(api_url(&url, &format!("/api/tasks/{id}"))), &token);
    let response = request
        .send()
        .await
        .context("Failed to reach routinely server (is `routinely serve` running?)")?;
    read_body(response).await?;
    println!("Deleted task {id}");
    Ok(())
}

pub async fn run_chat(message: String, url: String, token: Option<String>) -> Result<()> {
    let body = post(
        api_url(&url, "/api/chat"),
        Some(json!({"message": message})),
        &token,
    )
    .await?;
    let reply = body
        .get("response")
        .and_then(|r| r.as_str())
        .unwrap_or("(no response)");
    println!("{reply}");
    Ok(())
}

pub async fn run_status(url: String, token: Option<String>) -> Result<()> {
    let request = with_auth(http().get(api_url(&url, "/api/scheduler/status")), &token);
    let response = match request.send().await {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!("Server unreachable ({e}), summarizing the local store instead");
            println!("{}", offline_status_summary(&open_local_store()?).await?);
            return Ok(());
        }
    };
    let body = read_body(response).await?;
    let status: SchedulerStatus =
        serde_json::from_value(body).context("Server returned an unexpected status payload")?;

    println!(
        "Scheduler: {}",
        if status.running { "running" } else { "stopped" }
    );
    if status.running && !status.loop_alive {
        println!("  warning: dispatcher loop is not alive");
    }
    println!("  triggers: {}", status.total_triggers);
    println!(
        "    once: {}  daily: {}  weekly: {}  monthly: {}",
        status.once, status.daily, status.weekly, status.monthly
    );
    Ok(())
}

/// Task summary printed by `status` when no server is reachable.
async fn offline_status_summary(store: &TaskStore) -> Result<String> {
    let (total, active) = store.task_counts().await?;
    Ok(format!(
        "Scheduler: unreachable (is `routinely serve` running?)\n  tasks: {total} total, {active} active"
    ))
}

pub async fn run_health(url: String, token: Option<String>) -> Result<()> {
    let body = get(api_url(&url, "/health"), &token).await?;
    println!(
        "Server is healthy (version {})",
        body.get("version").and_then(|v| v.as_str()).unwrap_or("?")
    );
    Ok(())
}

/// One-line task rendering for `list` and `add`.
fn format_task_line(task: &Task) -> String {
    let done = if task.completed { "x" } else { " " };
    let when = match task.repeat {
        RepeatKind::Once => format!("{} {}", task.date, task.time),
        _ => format!("{} {}", task.repeat, task.time),
    };
    format!(
        "#{} [{}] {}  {} ({}, {})",
        task.id,
        done,
        when,
        task.title,
        task.category.as_str(),
        task.priority
    )
}
