// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Router lifecycle commands against a running server
//!
//! Commands: show, create, delete, images, status, health

use anyhow::Result;
use clap::{Args, Subcommand};
use colored::Colorize;
use serde_json::Value;
use std::time::Duration;

use crate::client::{RouterClient, TaskPoll, TaskTicket};

#[derive(Args)]
pub struct ServerArgs {
    /// Server URL
    #[arg(
        long,
        global = true,
        env = "VROUTER_SERVER",
        default_value = "http://127.0.0.1:5000"
    )]
    server: String,

    /// Token sent in the X-Auth header
    #[arg(long, global = true, env = "VROUTER_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Print the task id and return without waiting for the result
    #[arg(long, global = true)]
    no_wait: bool,

    /// Poll interval while waiting, in milliseconds
    #[arg(long, global = true, default_value = "500")]
    poll_ms: u64,
}

#[derive(Subcommand)]
pub enum RouterCommand {
    /// Show routers owned by the caller
    Show,

    /// Provision a router from an image
    Create {
        /// Router name
        name: String,

        /// Image version (see `vrouter router images`)
        #[arg(long)]
        image: String,

        /// Network for the next interface slot; repeat 2 to 4 times.
        /// An empty value leaves the slot unconnected.
        #[arg(long = "network", value_name = "NAME", required = true)]
        networks: Vec<String>,
    },

    /// Power off and destroy a router
    Delete {
        /// Router name
        name: String,
    },

    /// List image versions available on the server
    Images,

    /// Show the status of a previously dispatched task
    Status {
        /// Task id
        task_id: String,
    },

    /// Check that the server is up
    Health,
}

pub async fn handle_command(command: RouterCommand, server: ServerArgs) -> Result<()> {
    let client = RouterClient::new(&server.server, server.token.clone())?;

    let ticket = match command {
        RouterCommand::Show => client.show().await?,
        RouterCommand::Create {
            name,
            image,
            networks,
        } => {
            let networks = slot_networks(networks);
            client.create(&name, &image, &networks).await?
        }
        RouterCommand::Delete { name } => client.delete(&name).await?,
        RouterCommand::Images => client.images().await?,
        RouterCommand::Status { task_id } => {
            return match client.task(&task_id).await? {
                TaskPoll::Pending => {
                    println!("{} {}", "⋯ Task still running:".yellow(), task_id);
                    Ok(())
                }
                TaskPoll::Finished(body) => print_result(&body),
            };
        }
        RouterCommand::Health => {
            let body = client.health().await?;
            println!("{} {}", "✓".green(), describe_health(&body));
            return Ok(());
        }
    };

    print_ticket(&ticket);
    if server.no_wait {
        return Ok(());
    }

    let body = client
        .wait(&ticket.task_id, Duration::from_millis(server.poll_ms))
        .await?;
    print_result(&body)
}

/// Empty values become unconnected slots.
fn slot_networks(networks: Vec<String>) -> Vec<Option<String>> {
    networks
        .into_iter()
        .map(|n| if n.trim().is_empty() { None } else { Some(n) })
        .collect()
}

fn describe_health(body: &Value) -> String {
    let status = body.get("status").and_then(Value::as_str).unwrap_or("unknown");
    match body.get("uptime_seconds").and_then(Value::as_u64) {
        Some(uptime) => format!("Server {status}, up {uptime}s"),
        None => format!("Server {status}"),
    }
}

fn print_ticket(ticket: &TaskTicket) {
    println!("{} {}", "Task dispatched:".bold(), ticket.task_id);
    if let Some(link) = &ticket.status_link {
        println!("  Status: {}", link.dimmed());
    }
}

fn print_result(body: &Value) -> Result<()> {
    if let Some(error) = body.get("error").and_then(Value::as_str) {
        anyhow::bail!("{}", error);
    }

    println!("{}", "✓ Task complete".green());
    let content = body.get("content").cloned().unwrap_or(Value::Null);
    println!("{}", serde_json::to_string_pretty(&content)?);
    Ok(())
}
