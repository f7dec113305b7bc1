mod actor;
mod defs;
mod render;

use std::fs;
use std::process;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use cmdtree_core::{CommandEngine, Settings};
use cmdtree_diagnostics as diag;
use tracing_subscriber::EnvFilter;

use crate::actor::{CliActor, permission_reader};
use crate::render::{Format, render_pretty};

// ── CLI definition ──────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "cmdtree",
    version,
    about = "Dispatch, complete, and inspect commands declared in a JSON definitions file"
)]
struct Cli {
    /// Output mode: "pretty" for coloured terminal output, "json" for
    /// machine-readable JSON. Defaults to "pretty" when stdout is a TTY,
    /// "json" otherwise.
    #[arg(long, global = true, value_parser = ["pretty", "json"])]
    output: Option<String>,

    /// Command definitions JSON. The built-in demo set is used when omitted.
    #[arg(long, global = true)]
    commands: Option<String>,

    /// Dispatcher settings JSON.
    #[arg(long, global = true)]
    settings: Option<String>,

    /// Name of the actor running the command.
    #[arg(long = "as", global = true, default_value = "console")]
    actor: String,

    /// Permission held by the actor (repeatable; `*` grants all).
    #[arg(long, global = true)]
    grant: Vec<String>,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Parse and run one command line.
    Dispatch {
        /// The command line, e.g. "give @s diamond 5".
        #[arg(allow_hyphen_values = true)]
        input: String,
    },

    /// List completion candidates for partial input.
    Suggest {
        /// The input typed so far; a trailing space starts a new word.
        #[arg(allow_hyphen_values = true)]
        input: String,
    },

    /// List every registered command with its usage.
    Tree,

    /// Explain a diagnostic ID (e.g. CMD1101).
    Explain { id: String },
}

// ── Main ────────────────────────────────────────────────────────────────

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let format = Format::resolve_or_detect(cli.output.as_deref());

    match run(cli, format) {
        Ok(code) => process::exit(code),
        Err(err) => {
            match format {
                Format::Json => {
                    let out = serde_json::json!({
                        "success": false,
                        "error": "command_failed",
                        "message": format!("{err:#}"),
                    });
                    println!("{}", serde_json::to_string_pretty(&out).unwrap_or_default());
                }
                Format::Pretty => eprintln!("error: {err:#}"),
            }
            process::exit(2);
        }
    }
}

/// Run the selected subcommand, returning the process exit code.
fn run(cli: Cli, format: Format) -> Result<i32> {
    if let Cmd::Explain { id } = &cli.cmd {
        cmd_explain(id, format)?;
        return Ok(0);
    }

    let engine = build_engine(cli.commands.as_deref(), cli.settings.as_deref())?;
    let actor = Arc::new(CliActor::new(cli.actor, cli.grant));

    match cli.cmd {
        Cmd::Dispatch { input } => cmd_dispatch(&engine, actor, &input, format),
        Cmd::Suggest { input } => cmd_suggest(&engine, actor, &input, format).map(|()| 0),
        Cmd::Tree => cmd_tree(&engine, format).map(|()| 0),
        Cmd::Explain { .. } => Ok(0),
    }
}

fn build_engine(
    commands_path: Option<&str>,
    settings_path: Option<&str>,
) -> Result<CommandEngine<CliActor>> {
    let settings = match settings_path {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("failed to read settings file '{path}'"))?;
            cmdtree_settings::load_settings_from_str(&text)
                .with_context(|| format!("failed to load settings from '{path}'"))?
        }
        None => Settings::default(),
    };

    let mut engine = CommandEngine::builder()
        .settings(settings)
        .permission_reader(permission_reader)
        .build();

    let (json, origin) = match commands_path {
        Some(path) => (
            fs::read_to_string(path)
                .with_context(|| format!("failed to read definitions file '{path}'"))?,
            path,
        ),
        None => (defs::DEMO.to_string(), "built-in demo"),
    };
    defs::load_into(&mut engine, &json)
        .with_context(|| format!("failed to load command definitions from {origin}"))?;
    Ok(engine)
}

// ── Commands ────────────────────────────────────────────────────────────

fn cmd_dispatch(
    engine: &CommandEngine<CliActor>,
    actor: Arc<CliActor>,
    input: &str,
    format: Format,
) -> Result<i32> {
    let result = engine.dispatch(Arc::clone(&actor), input);
    let replies = actor.take_replies();
    let errors = actor.take_errors();

    match (&result, format) {
        (Ok(ctx), Format::Json) => {
            let arguments: serde_json::Map<String, serde_json::Value> = ctx
                .arguments()
                .iter()
                .map(|(name, value)| (name.to_string(), defs::render_value(value).into()))
                .collect();
            let out = serde_json::json!({
                "success": true,
                "command": ctx.command().map(|c| c.path()),
                "arguments": arguments,
                "replies": replies,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        (Ok(_), Format::Pretty) => {
            for line in &replies {
                println!("{line}");
            }
        }
        (Err(failure), Format::Json) => {
            let out = serde_json::json!({
                "success": false,
                "diagnostic": failure.to_diagnostic(),
                "replies": replies,
                "errors": errors,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        (Err(failure), Format::Pretty) => {
            for line in &replies {
                println!("{line}");
            }
            render_pretty(input, &failure.to_diagnostic());
        }
    }
    Ok(i32::from(result.is_err()))
}

fn cmd_suggest(
    engine: &CommandEngine<CliActor>,
    actor: Arc<CliActor>,
    input: &str,
    format: Format,
) -> Result<()> {
    let suggestions = engine.suggest(actor, input);
    match format {
        Format::Json => {
            let out = serde_json::json!({
                "input": input,
                "suggestions": suggestions,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        Format::Pretty => {
            for s in suggestions {
                println!("{s}");
            }
        }
    }
    Ok(())
}

fn cmd_tree(engine: &CommandEngine<CliActor>, format: Format) -> Result<()> {
    let commands = engine.commands();
    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&commands)?),
        Format::Pretty => {
            let width = commands.iter().map(|c| c.usage.len()).max().unwrap_or(0);
            for info in &commands {
                let mut notes = Vec::new();
                if let Some(permission) = &info.permission {
                    notes.push(format!("requires {permission}"));
                }
                if info.secret {
                    notes.push("secret".to_string());
                }
                if let Some(ms) = info.cooldown_ms {
                    notes.push(format!("cooldown {}s", ms.div_ceil(1000)));
                }
                let description = info.description.as_deref().unwrap_or("");
                let notes = if notes.is_empty() {
                    String::new()
                } else {
                    format!(" ({})", notes.join(", "))
                };
                println!("{:width$}  {description}{notes}", info.usage);
            }
        }
    }
    Ok(())
}

fn cmd_explain(id: &str, format: Format) -> Result<()> {
    match format {
        Format::Json => {
            let out = serde_json::json!({
                "id": id,
                "explanation": diag::explain(id),
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        Format::Pretty => {
            if let Some(text) = diag::explain(id) {
                use ariadne::Fmt;
                println!("{}: {}", id.fg(ariadne::Color::Cyan), text);
            } else {
                println!("{id}: (no explanation available)");
            }
        }
    }
    Ok(())
}
