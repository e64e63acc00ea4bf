//! yachai-cli: operator and scripting client for a running yachai-server
//!
//! # Subcommands
//! - `check <text>`                                   : submit a claim for scoring
//! - `reports [--pending] [--json]`                   : list stored reports
//! - `resolve <id> <label>`                           : record a final verdict
//! - `alert <id>`                                     : send a manual escalation alert
//! - `settings [--threshold N] [--auto-send BOOL]`    : show or change alert settings
//! - `export`                                         : dump all reports as JSON lines
//! - `status`                                         : show server health

use clap::{Parser, Subcommand};
use serde::Deserialize;

const DEFAULT_SERVER: &str = "http://127.0.0.1:8787";
const ADMIN_PASSWORD_HEADER: &str = "x-admin-password";

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Debug, Parser)]
#[command(name = "yachai-cli", version, about = "Yachai misinformation triage command-line client")]
struct Cli {
    /// Yachai HTTP server URL (overrides YACHAI_HTTP_URL env var)
    #[arg(long, env = "YACHAI_HTTP_URL", default_value = DEFAULT_SERVER)]
    server: String,

    /// Operator password for /admin routes
    #[arg(long, env = "YACHAI_ADMIN_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Submit a claim and print the AI assessment
    Check {
        /// Claim text (Bengali or English)
        text: String,
    },

    /// List reports, newest first
    Reports {
        /// Only reports still waiting for a final verdict
        #[arg(long)]
        pending: bool,

        /// Print the raw JSON array
        #[arg(long)]
        json: bool,
    },

    /// Record the operator's final verdict for a report
    Resolve {
        id: i64,

        /// সত্য / বিভ্রান্তিকর / মিথ্যা (or true / misleading / false)
        label: String,
    },

    /// Send the escalation alert for a report resolved as false
    Alert { id: i64 },

    /// Show alert settings, or change them when flags are given
    Settings {
        #[arg(long)]
        threshold: Option<u16>,

        #[arg(long, value_name = "BOOL", action = clap::ArgAction::Set)]
        auto_send: Option<bool>,
    },

    /// Dump every report as JSON lines (oldest first)
    Export,

    /// Show Yachai server status
    Status,
}

// ============================================================================
// API Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct SubmissionView {
    pub id: i64,
    pub score: i32,
    pub verdict: String,
    pub justification: String,
    pub severity: String,
    pub indicator: String,
}

#[derive(Debug, Deserialize)]
pub struct ReportView {
    pub id: i64,
    pub text: String,
    pub timestamp: String,
    pub score: i32,
    pub verdict: String,
    pub final_verdict: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReportList {
    pub count: usize,
    pub reports: Vec<ReportView>,
}

// ============================================================================
// Output formatting
// ============================================================================

pub fn format_submission(s: &SubmissionView) -> String {
    format!(
        "{} Misinformation score: {}%\nVerdict:       {}\nJustification: {}\nSeverity:      {}\nReport id:     #{}",
        s.indicator, s.score, s.verdict, s.justification, s.severity, s.id
    )
}

/// One line per report; claim text is shortened to keep the table readable.
pub fn format_report_line(r: &ReportView) -> String {
    let preview: String = r.text.chars().take(60).collect();
    let ellipsis = if r.text.chars().count() > 60 { "…" } else { "" };
    format!(
        "#{:<5} {:>3}%  {:<14} {:<12} {}  {}{}",
        r.id,
        r.score,
        r.verdict,
        r.final_verdict.as_deref().unwrap_or("pending"),
        r.timestamp,
        preview,
        ellipsis
    )
}

// ============================================================================
// HTTP Client Calls
// ============================================================================

struct Api {
    client: reqwest::blocking::Client,
    server: String,
    password: Option<String>,
}

impl Api {
    fn new(server: &str, password: Option<String>) -> anyhow::Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()?;
        Ok(Self {
            client,
            server: server.trim_end_matches('/').to_string(),
            password,
        })
    }

    fn admin(&self, builder: reqwest::blocking::RequestBuilder) -> reqwest::blocking::RequestBuilder {
        match &self.password {
            Some(p) => builder.header(ADMIN_PASSWORD_HEADER, p),
            None => builder,
        }
    }

    /// Send the request and exit with the server's message on a non-2xx answer.
    fn send(&self, builder: reqwest::blocking::RequestBuilder) -> reqwest::blocking::Response {
        let resp = match builder.send() {
            Ok(r) => r,
            Err(e) => {
                eprintln!("yachai-cli: connection failed to {}: {}", self.server, e);
                std::process::exit(1);
            }
        };

        if !resp.status().is_success() {
            let status = resp.status();
            let body: serde_json::Value = resp.json().unwrap_or_default();
            let msg = body["error"].as_str().unwrap_or("no detail");
            eprintln!("yachai-cli: server returned {}: {}", status, msg);
            std::process::exit(1);
        }
        resp
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.server, path)
    }
}

fn do_check(api: &Api, text: &str) -> anyhow::Result<()> {
    let req = api
        .client
        .post(api.url("/claims"))
        .json(&serde_json::json!({ "text": text }));
    let submission: SubmissionView = api.send(req).json()?;
    println!("{}", format_submission(&submission));
    Ok(())
}

fn do_reports(api: &Api, pending: bool, json_output: bool) -> anyhow::Result<()> {
    let path = if pending { "/admin/reports?pending=true" } else { "/admin/reports" };
    let body: serde_json::Value = api.send(api.admin(api.client.get(api.url(path)))).json()?;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&body["reports"])?);
        return Ok(());
    }

    let list: ReportList = serde_json::from_value(body)?;
    if list.reports.is_empty() {
        eprintln!("No reports.");
        return Ok(());
    }
    for r in &list.reports {
        println!("{}", format_report_line(r));
    }
    eprintln!("{} report(s)", list.count);
    Ok(())
}

fn do_resolve(api: &Api, id: i64, label: &str) -> anyhow::Result<()> {
    let req = api
        .admin(api.client.post(api.url(&format!("/admin/reports/{}/verdict", id))))
        .json(&serde_json::json!({ "final_verdict": label }));
    let body: serde_json::Value = api.send(req).json()?;

    let final_verdict = body["report"]["final_verdict"].as_str().unwrap_or("?");
    println!("Report #{} resolved: {}", id, final_verdict);
    match body["alert"]["status"].as_str() {
        Some("sent") => println!("🚨 Alert sent to the moderation channel"),
        Some("manual_available") => println!("Alert not sent automatically; run `yachai-cli alert {}` to send it", id),
        Some("failed") => println!(
            "⚠️  Alert failed: {}",
            body["alert"]["reason"].as_str().unwrap_or("unknown")
        ),
        _ => {}
    }
    Ok(())
}

fn do_alert(api: &Api, id: i64) -> anyhow::Result<()> {
    let req = api.admin(api.client.post(api.url(&format!("/admin/reports/{}/alert", id))));
    api.send(req);
    println!("🚨 Alert sent for report #{}", id);
    Ok(())
}

fn do_settings(api: &Api, threshold: Option<u16>, auto_send: Option<bool>) -> anyhow::Result<()> {
    let req = if threshold.is_none() && auto_send.is_none() {
        api.admin(api.client.get(api.url("/admin/settings")))
    } else {
        let mut update = serde_json::Map::new();
        if let Some(t) = threshold {
            update.insert("threshold".into(), t.into());
        }
        if let Some(a) = auto_send {
            update.insert("auto_send".into(), a.into());
        }
        api.admin(api.client.put(api.url("/admin/settings")))
            .json(&serde_json::Value::Object(update))
    };

    let body: serde_json::Value = api.send(req).json()?;
    println!("Threshold: {}%", body["threshold"]);
    println!("Auto-send: {}", body["auto_send"]);
    Ok(())
}

fn do_export(api: &Api) -> anyhow::Result<()> {
    let text = api
        .send(api.admin(api.client.get(api.url("/admin/export"))))
        .text()?;
    print!("{}", text);
    Ok(())
}

/// Show the server status by calling GET /health.
fn do_status(api: &Api) -> anyhow::Result<()> {
    let url = api.url("/health");
    match api.client.get(&url).send() {
        Ok(r) if r.status().is_success() => {
            let body: serde_json::Value = r.json().unwrap_or_default();
            println!("Yachai server: {}", body["status"].as_str().unwrap_or("unknown"));
            println!("Version:       {}", body["version"].as_str().unwrap_or("?"));
            println!("Store:         {}", body["store"].as_str().unwrap_or("?"));
        }
        Ok(r) => {
            eprintln!("yachai-cli: server unhealthy (HTTP {})", r.status());
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("yachai-cli: cannot reach {}: {}", url, e);
            std::process::exit(1);
        }
    }
    Ok(())
}

// ============================================================================
// Main
// ============================================================================

fn main() {
    let cli = Cli::parse();

    let result = Api::new(&cli.server, cli.password).and_then(|api| match cli.command {
        Commands::Check { text } => do_check(&api, &text),
        Commands::Reports { pending, json } => do_reports(&api, pending, json),
        Commands::Resolve { id, label } => do_resolve(&api, id, &label),
        Commands::Alert { id } => do_alert(&api, id),
        Commands::Settings { threshold, auto_send } => do_settings(&api, threshold, auto_send),
        Commands::Export => do_export(&api),
        Commands::Status => do_status(&api),
    });

    if let Err(e) = result {
        eprintln!("yachai-cli: {}", e);
        std::process::exit(1);
    }
}

// ============================================================================
// Tests
// ============================================================================
