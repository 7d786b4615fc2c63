//! Command handlers for CLI operations
//!
//! - serve: Run the HTTP server until Ctrl-C
//! - doctor: Report configuration and credential presence
//! - deconstruct / simulate: Run one pipeline step and print the result
//! - export: Build a slide deck from a saved request body

use anyhow::{Context, Result};
use serde_json::json;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::export::{self, ExportRequest};
use crate::secrets::CredentialStore;
use crate::server;
use crate::service::{DeconstructRequest, GenerationService, SimulateRequest};

/// Output format for command results
#[derive(Debug, Clone, Copy)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output for machine consumption
    Json,
}

/// Run the HTTP server with optional address overrides
pub async fn handle_serve(mut config: Config, host: Option<String>, port: Option<u16>) -> Result<()> {
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    let service = GenerationService::from_config(&config, CredentialStore::from_env())
        .context("Failed to build generation service")?;
    let report = service.provider_report();
    for (kind, states) in [
        ("text", &report.text),
        ("image", &report.image),
        ("transcription", &report.transcription),
    ] {
        let ready: Vec<&str> = states
            .iter()
            .filter(|s| s.configured)
            .map(|s| s.name.as_str())
            .collect();
        if ready.is_empty() {
            tracing::warn!("No {} provider has credentials; requests will fail", kind);
        } else {
            tracing::info!("{} providers: {}", kind, ready.join(", "));
        }
    }

    server::serve(&config, service).await?;
    Ok(())
}

/// One credential line in the doctor report
struct CredentialCheck {
    backend: &'static str,
    env: String,
    present: bool,
    used_by: Vec<&'static str>,
}

/// Validate configuration and report which provider credentials are present
pub async fn handle_doctor(config: &Config, config_path: Option<&Path>, format: OutputFormat) -> Result<()> {
    let credentials = CredentialStore::from_env();
    let providers = &config.providers;
    let mut checks: Vec<(String, String)> = Vec::new();
    let mut issues = Vec::new();

    let path = match config_path {
        Some(path) => Some(path.to_path_buf()),
        None => Config::default_config_path().ok(),
    };
    match path {
        Some(path) if path.exists() => checks.push(("Configuration".to_string(), path.display().to_string())),
        _ => checks.push(("Configuration".to_string(), "Built-in defaults".to_string())),
    }

    let backends = [
        ("openai", providers.openai.api_key_env.clone()),
        ("anthropic", providers.anthropic.api_key_env.clone()),
        ("gemini", providers.gemini.api_key_env.clone()),
        ("stability", providers.stability.api_key_env.clone()),
        ("groq", providers.groq.api_key_env.clone()),
    ];
    let credential_checks: Vec<CredentialCheck> = backends
        .into_iter()
        .map(|(backend, env)| {
            let mut used_by = Vec::new();
            for (kind, list) in [
                ("text", &providers.text),
                ("image", &providers.image),
                ("transcription", &providers.transcription),
            ] {
                if list.iter().any(|name| name == backend) {
                    used_by.push(kind);
                }
            }
            CredentialCheck {
                backend,
                present: credentials.has_secret(&env),
                env,
                used_by,
            }
        })
        .collect();

    for check in &credential_checks {
        let status = match (check.present, check.used_by.is_empty()) {
            (true, _) => "Configured",
            (false, true) => "Not configured (unused)",
            (false, false) => "Not configured",
        };
        checks.push((format!("{} ({})", check.backend, check.env), status.to_string()));
    }

    for (kind, list) in [
        ("text", &providers.text),
        ("image", &providers.image),
        ("transcription", &providers.transcription),
    ] {
        let usable = credential_checks
            .iter()
            .any(|c| c.present && list.iter().any(|name| name == c.backend));
        if !usable {
            issues.push(format!(
                "No {} provider has credentials. Set one of: {}",
                kind,
                credential_checks
                    .iter()
                    .filter(|c| list.iter().any(|name| name == c.backend))
                    .map(|c| c.env.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            ));
        }
    }

    let moderation = if !config.moderation.enabled {
        "Disabled".to_string()
    } else if config.moderation.remote {
        format!(
            "Keywords + remote (fail {})",
            if config.moderation.fail_open { "open" } else { "closed" }
        )
    } else {
        "Keywords only".to_string()
    };
    checks.push(("Moderation".to_string(), moderation));

    match format {
        OutputFormat::Text => {
            println!("Uchronia Diagnostics");
            println!("====================");
            println!();

            println!("Checks:");
            for (check, status) in &checks {
                println!("  {:<30} {}", format!("{}:", check), status);
            }

            println!();

            if issues.is_empty() {
                println!("✓ All checks passed!");
            } else {
                println!("⚠ Issues found:");
                println!();
                for (i, issue) in issues.iter().enumerate() {
                    println!("  {}. {}", i + 1, issue);
                }
            }
        }
        OutputFormat::Json => {
            let output = json!({
                "checks": checks.iter().map(|(name, status)| {
                    json!({
                        "name": name,
                        "status": status
                    })
                }).collect::<Vec<_>>(),
                "credentials": credential_checks.iter().map(|c| {
                    json!({
                        "backend": c.backend,
                        "env": c.env,
                        "present": c.present,
                        "used_by": c.used_by,
                    })
                }).collect::<Vec<_>>(),
                "issues": issues,
                "healthy": issues.is_empty()
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}

/// Decompose one invention and print it
pub async fn handle_deconstruct(invention: String, config: &Config, format: OutputFormat) -> Result<()> {
    let service = GenerationService::from_config(config, CredentialStore::from_env())?;
    let result = service
        .deconstruct(&DeconstructRequest::new(invention))
        .await?;
    let decomposition = result.value;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&decomposition)?);
        }
        OutputFormat::Text => {
            println!("{}", decomposition.invention);
            println!();
            println!("{}", decomposition.summary);
            print_list("Core principles", &decomposition.core_principles);
            println!();
            println!("Components:");
            for component in &decomposition.components {
                println!("  - {}: {}", component.name, component.function);
            }
            println!();
            println!("Prerequisites:");
            for p in &decomposition.prerequisites {
                println!("  - {} [{}], earliest {}", p.name, p.category, p.earliest_plausible_era);
            }
            print_list("Materials", &decomposition.materials);
        }
    }
    Ok(())
}

/// Simulate pathways for one invention and era and print them
pub async fn handle_simulate(
    request: SimulateRequest,
    config: &Config,
    format: OutputFormat,
) -> Result<()> {
    let service = GenerationService::from_config(config, CredentialStore::from_env())?;
    let simulation = service.simulate(&request).await?.value;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&simulation)?);
        }
        OutputFormat::Text => {
            for (i, pathway) in simulation.pathways.iter().enumerate() {
                println!(
                    "{}. {} (feasibility {:.1}/10)",
                    i + 1,
                    pathway.title,
                    pathway.feasibility_score
                );
                println!("   {}", pathway.summary);
                for step in &pathway.technical_steps {
                    println!("   - {}", step);
                }
                println!();
            }
        }
    }
    Ok(())
}

/// Build a deck from a JSON request body on disk
pub async fn handle_export(input: &Path, out: Option<PathBuf>, format: OutputFormat) -> Result<()> {
    let raw = tokio::fs::read_to_string(input)
        .await
        .with_context(|| format!("Failed to read {}", input.display()))?;
    let request: ExportRequest =
        serde_json::from_str(&raw).context("Export file is not a valid request body")?;

    let exported = export::export_pptx(&request)?;
    let out = out.unwrap_or_else(|| PathBuf::from(&exported.file_name));
    tokio::fs::write(&out, &exported.bytes)
        .await
        .with_context(|| format!("Failed to write {}", out.display()))?;

    match format {
        OutputFormat::Json => println!(
            "{}",
            json!({ "path": out.display().to_string(), "slides": exported.slides, "bytes": exported.bytes.len() })
        ),
        OutputFormat::Text => println!(
            "Wrote {} slides to {}",
            exported.slides,
            out.display()
        ),
    }
    Ok(())
}

fn print_list(heading: &str, items: &[String]) {
    println!();
    println!("{}:", heading);
    for item in items {
        println!("  - {}", item);
    }
}
