//! agent-providers: 提供商状态查询、单次对话、工具调用提取的诊断命令行工具
//!
//! Usage:
//!   agent-providers status [--force]                Probe every configured provider
//!   agent-providers chat <prompt> [--provider <n>]  Send one prompt to a provider
//!   agent-providers extract <file> [--tools a,b]    Normalize tool calls in a saved response

use anyhow::{anyhow, bail, Context};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use ai_agent_providers::config::store::{ConfigStore, FileConfigStore};
use ai_agent_providers::drivers::openai::{content_text, reasoning_field};
use ai_agent_providers::drivers::{join_reasoning, split_think_blocks};
use ai_agent_providers::toolcalls::{catalog, normalize_tool_calls};
use ai_agent_providers::{ChatOptions, ChatProvider, ChatRequest, Message, ProviderRegistry};

const CONFIG_ENV: &str = "AI_AGENT_PROVIDERS_CONFIG";

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        print_usage();
        std::process::exit(1);
    }

    let result = match args[1].as_str() {
        "status" => cmd_status(&args[2..]).await,
        "chat" => cmd_chat(&args[2..]).await,
        "extract" => cmd_extract(&args[2..]),
        "version" | "--version" | "-V" => {
            println!("agent-providers {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {other}");
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        if let Some(hint) = e
            .downcast_ref::<ai_agent_providers::Error>()
            .and_then(|e| e.remediation())
        {
            eprintln!("hint: {hint}");
        }
        std::process::exit(1);
    }
}

fn print_usage() {
    println!(
        r#"agent-providers: 模型后端诊断工具

USAGE:
    agent-providers <COMMAND> [OPTIONS]

COMMANDS:
    status [--force]                  Show configured/available/model/primary per provider
    chat <prompt> [--provider <name>] Send one prompt (default: the primary provider)
    extract <file> [--tools a,b,...]  Run the tool-call pipeline over a saved response
    version                           Show version information
    help                              Show this help message

OPTIONS:
    --config <path>                   Provider config file (.json, .yaml or .yml)

ENVIRONMENT:
    AI_AGENT_PROVIDERS_CONFIG         Default provider config file
    <KIND>_API_KEY                    API key per backend, e.g. ZHIPU_API_KEY
    RUST_LOG                          Log filter (default: info)"#
    );
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

/// Positional arguments, skipping `--flag value` pairs and bare switches.
fn positionals(args: &[String]) -> Vec<&str> {
    let mut out = Vec::new();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--force" => {}
            a if a.starts_with("--") => {
                iter.next();
            }
            a => out.push(a),
        }
    }
    out
}

async fn open_registry(args: &[String]) -> ProviderRegistry {
    let path = flag_value(args, "--config")
        .map(PathBuf::from)
        .or_else(|| std::env::var(CONFIG_ENV).ok().map(PathBuf::from));
    let store = path.map(|p| Arc::new(FileConfigStore::new(p)) as Arc<dyn ConfigStore>);
    let registry = ProviderRegistry::new(store);
    registry.load().await;
    registry
}

async fn cmd_status(args: &[String]) -> anyhow::Result<()> {
    let registry = open_registry(args).await;
    let force = args.iter().any(|a| a == "--force");
    let status = registry.get_status(force).await;

    println!(
        "{:<12} {:<11} {:<10} {:<8} MODEL",
        "PROVIDER", "CONFIGURED", "AVAILABLE", "PRIMARY"
    );
    for (name, s) in &status {
        println!(
            "{:<12} {:<11} {:<10} {:<8} {}",
            name,
            yes_no(s.configured),
            yes_no(s.available),
            if s.is_primary { "*" } else { "" },
            s.model
        );
    }
    Ok(())
}

fn yes_no(v: bool) -> &'static str {
    if v {
        "yes"
    } else {
        "no"
    }
}

async fn cmd_chat(args: &[String]) -> anyhow::Result<()> {
    let prompt = positionals(args).join(" ");
    if prompt.trim().is_empty() {
        bail!("usage: agent-providers chat <prompt> [--provider <name>]");
    }
    let registry = open_registry(args).await;
    let request = ChatRequest::new(vec![Message::user(prompt)], vec![], ChatOptions::default());

    let result = match flag_value(args, "--provider") {
        Some(name) => {
            let adapter = registry
                .provider(name)
                .await
                .ok_or_else(|| anyhow!("provider '{name}' is not configured or disabled"))?;
            adapter.chat(&request).await?
        }
        None => registry.chat(&request).await?,
    };

    if let Some(thinking) = &result.thinking {
        eprintln!("[thinking] {thinking}");
    }
    println!("{}", result.text);
    eprintln!(
        "[usage] prompt={} completion={} total={}",
        result.usage.prompt_tokens, result.usage.completion_tokens, result.usage.total_tokens
    );
    Ok(())
}

fn cmd_extract(args: &[String]) -> anyhow::Result<()> {
    let Some(file) = positionals(args).first().copied() else {
        bail!("usage: agent-providers extract <file> [--tools a,b,...]");
    };
    let raw = std::fs::read_to_string(file).with_context(|| format!("reading {file}"))?;

    let tools: Vec<String> = match flag_value(args, "--tools") {
        Some(list) => list.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect(),
        None => catalog::known_tool_names().map(String::from).collect(),
    };
    let offered: Vec<&str> = tools.iter().map(String::as_str).collect();

    // A saved chat-completion body, a bare message object, or plain text.
    let message = match serde_json::from_str::<Value>(&raw) {
        Ok(body) if body["choices"][0]["message"].is_object() => body["choices"][0]["message"].clone(),
        Ok(body) if body["message"].is_object() => body["message"].clone(),
        Ok(body) if body.is_object() => body,
        _ => json!({ "content": raw }),
    };
    let (content, inline) = split_think_blocks(&content_text(message.get("content")));
    let reasoning = join_reasoning(reasoning_field(&message), inline);

    let calls = normalize_tool_calls(&message, &content, reasoning.as_deref(), &offered);
    println!("{}", serde_json::to_string_pretty(&calls)?);
    Ok(())
}
