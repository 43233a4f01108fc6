//! Human-facing output: categorised progress lines and the final summary.

use crate::provisioner::{IpStatus, ProvisionSummary, StepOutcome};
use anyhow::Result;
use clap::ValueEnum;
use colored::Colorize;
use std::io::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Sink for progress lines emitted by the provisioning steps
#[cfg_attr(test, mockall::automock)]
pub trait Reporter: Send + Sync {
    /// Heading for a new step
    fn step(&self, title: &str);
    fn info(&self, message: &str);
    fn success(&self, message: &str);
    fn warning(&self, message: &str);
    fn error(&self, message: &str);
    fn summary(&self, summary: &ProvisionSummary) -> Result<()>;
}

/// Colour-coded terminal reporter.
///
/// In JSON mode the progress lines move to stderr so stdout carries only the
/// summary document.
pub struct ConsoleReporter {
    format: OutputFormat,
}

impl ConsoleReporter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    fn emit(&self, line: String) {
        match self.format {
            OutputFormat::Text => println!("{line}"),
            OutputFormat::Json => eprintln!("{line}"),
        }
    }
}

impl Reporter for ConsoleReporter {
    fn step(&self, title: &str) {
        self.emit(String::new());
        self.emit(format!("{}", format!("==> {title}").bold()));
    }

    fn info(&self, message: &str) {
        self.emit(format!("{} {}", "[INFO]".blue().bold(), message));
    }

    fn success(&self, message: &str) {
        self.emit(format!("{} {}", "[SUCCESS]".green().bold(), message));
    }

    fn warning(&self, message: &str) {
        self.emit(format!("{} {}", "[WARNING]".yellow().bold(), message));
    }

    fn error(&self, message: &str) {
        self.emit(format!("{} {}", "[ERROR]".red().bold(), message));
    }

    fn summary(&self, summary: &ProvisionSummary) -> Result<()> {
        match self.format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(summary)?);
            }
            OutputFormat::Text => {
                let mut stdout = std::io::stdout().lock();
                stdout.write_all(render_text_summary(summary).as_bytes())?;
                stdout.flush()?;
            }
        }
        Ok(())
    }
}

fn outcome_label(outcome: &StepOutcome) -> String {
    match outcome {
        StepOutcome::Created => "created".green().to_string(),
        StepOutcome::Updated => "updated".green().to_string(),
        StepOutcome::AlreadyPresent => "already present".normal().to_string(),
        StepOutcome::Applied => "applied".green().to_string(),
        StepOutcome::Verified => "verified".green().to_string(),
        StepOutcome::Skipped(reason) => format!("skipped ({reason})"),
        StepOutcome::Degraded(reason) => format!("{} ({reason})", "degraded".yellow()),
    }
}

pub fn render_text_summary(summary: &ProvisionSummary) -> String {
    let mut out = String::new();
    let mut line = |text: String| {
        out.push_str(&text);
        out.push('\n');
    };

    line(String::new());
    line(format!("{}", "==========================================".bold()));
    line(format!("{}", " Provisioning summary".bold()));
    line(format!("{}", "==========================================".bold()));
    line(format!("Run id:             {}", summary.run_id));
    line(format!("Resource group:     {}", summary.resource_group));
    line(format!("Location:           {}", summary.location));
    line(format!("Cluster:            {}", summary.cluster_name));
    line(format!("Log workspace:      {}", summary.workspace_name));
    if let Some(id) = &summary.workspace_id {
        line(format!("Workspace id:       {id}"));
    }
    line(format!("App namespace:      {}", summary.app_namespace));
    line(format!("Secret:             {}", summary.secret_name));
    line(format!(
        "Ingress controller: {} (namespace {})",
        summary.ingress_release, summary.ingress_namespace
    ));

    let ip_line = match &summary.external_ip {
        IpStatus::Assigned { ip, .. } => ip.green().bold().to_string(),
        IpStatus::Pending { attempts } => {
            format!("{} after {attempts} attempt(s)", "pending".yellow())
        }
        IpStatus::Interrupted { attempts } => {
            format!("{} after {attempts} attempt(s)", "interrupted".yellow())
        }
        IpStatus::NotChecked => "not checked".to_string(),
    };
    line(format!("External IP:        {ip_line}"));

    if !summary.steps.is_empty() {
        line(String::new());
        line("Steps:".to_string());
        for record in &summary.steps {
            line(format!("  - {:<24} {}", record.step.to_string(), outcome_label(&record.outcome)));
        }
    }

    if !summary.next_steps.is_empty() {
        line(String::new());
        line("Next steps:".to_string());
        for (i, step) in summary.next_steps.iter().enumerate() {
            line(format!("  {}. {}", i + 1, step));
        }
    }

    let elapsed = summary.finished_at - summary.started_at;
    line(String::new());
    line(format!("Finished in {}s", elapsed.num_seconds().max(0)));
    out
}
