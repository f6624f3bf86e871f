use std::{path::PathBuf, sync::Arc};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use client_core::{Dialogs, FormClient, HeadlessDialogs, MemorySurface, PageEvent};
use serde_json::Value;
use shared::domain::{ElementId, FieldBinding};
use tracing::{info, warn};

mod config;
mod dialogs;

use config::load_settings;
use dialogs::TerminalDialogs;

#[derive(Parser, Debug)]
#[command(about = "Drive formwire endpoints from the terminal")]
struct Cli {
    #[arg(long, default_value = "formwire.toml")]
    config: PathBuf,
    /// Log alerts instead of printing them and cancel every prompt.
    #[arg(long)]
    headless: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Post a JSON value and print the returned envelope.
    SubmitData {
        #[arg(long)]
        location: Option<String>,
        #[arg(long, default_value = "{}")]
        data: String,
    },
    /// Bind a form of NAME=VALUE fields, edit it once and activate its control.
    SubmitForm {
        #[arg(long)]
        location: Option<String>,
        #[arg(long = "field", value_parser = parse_field)]
        fields: Vec<(String, String)>,
        #[arg(long, default_value = "panel")]
        target: String,
        #[arg(long, default_value = "submit")]
        control: String,
    },
    /// Prompt for an identifier and create a resource of KIND.
    Create {
        #[arg(long)]
        base: Option<String>,
        #[arg(long)]
        kind: String,
        #[arg(long, default_value = "")]
        prefix: String,
    },
}

fn parse_field(raw: &str) -> Result<(String, String)> {
    let Some((name, value)) = raw.split_once('=') else {
        bail!("expected NAME=VALUE, got '{raw}'");
    };
    if name.is_empty() {
        bail!("field name must not be empty in '{raw}'");
    }
    Ok((name.to_string(), value.to_string()))
}

fn field_element(name: &str) -> ElementId {
    ElementId::new(format!("field-{name}"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let loaded = load_settings(&cli.config);
    let settings = loaded.settings;
    tracing_subscriber::fmt()
        .with_env_filter(settings.log_filter.as_str())
        .init();
    for warning in &loaded.warnings {
        warn!("{warning}");
    }

    let dialogs: Arc<dyn Dialogs> = if cli.headless {
        Arc::new(HeadlessDialogs)
    } else {
        Arc::new(TerminalDialogs)
    };
    let surface = Arc::new(MemorySurface::new());
    let client = FormClient::new(surface.clone(), dialogs, settings.client_options());

    match cli.command {
        Command::SubmitData { location, data } => {
            let location = location.unwrap_or_else(|| settings.base_url.clone());
            let data: Value =
                serde_json::from_str(&data).context("--data must be a JSON value")?;
            match client.submit_data(&location, &data).await {
                Some(envelope) => println!("{}", serde_json::to_string_pretty(&envelope)?),
                None => println!("no result"),
            }
        }
        Command::SubmitForm {
            location,
            fields,
            target,
            control,
        } => {
            let location = location.unwrap_or_else(|| settings.base_url.clone());
            let target = ElementId::new(target);
            let control = ElementId::new(control);
            surface.add_element(target.clone(), "div", None)?;
            surface.add_element(control.clone(), "button", None)?;

            let binding: FieldBinding = fields
                .iter()
                .map(|(name, _)| (name.clone(), field_element(name)))
                .collect();
            for (name, value) in &fields {
                surface.add_input(field_element(name), None, value)?;
            }

            if binding.is_empty() {
                info!("no fields given, submitting without dirty tracking");
                client
                    .submit_form(&location, binding, target.clone(), control)
                    .await;
            } else {
                let edited = binding.elements().next().cloned();
                client
                    .bind_form(&location, binding, target.clone(), control.clone())
                    .await;
                if let Some(element) = edited {
                    client.dispatch(PageEvent::Input { element }).await;
                }
                client.dispatch(PageEvent::Activate { element: control }).await;
            }
            println!("{}", surface.content(&target)?);
        }
        Command::Create { base, kind, prefix } => {
            let base = base.unwrap_or_else(|| settings.base_url.clone());
            let list = ElementId::new("list");
            let button = ElementId::new("create");
            surface.add_element(list.clone(), "ul", None)?;
            surface.add_element(button.clone(), "button", Some(&list))?;

            client.create_resource(&base, &kind, &prefix, button).await;
            println!("{}", surface.content(&list)?);
        }
    }

    Ok(())
}
