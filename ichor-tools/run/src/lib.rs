//! Ichor Runner
//!
//! Sample effect programs, running one under a configuration, and the
//! report printed afterwards.

use std::path::Path;

use anyhow::{bail, Context as _, Result};
use serde::Serialize;
use tracing::{debug, info};

use ichor_runtime::stats::{self, RuntimeStats};
use ichor_runtime::{os, Context, RuntimeConfig};

pub mod programs;

pub use programs::{find, render, Program, PROGRAMS};

/// Outcome of one program run.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub program: &'static str,
    pub input: i64,
    pub result: String,
    /// Counter growth while the program ran.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<RuntimeStats>,
}

impl Report {
    /// Human-readable form.
    pub fn to_text(&self) -> String {
        let mut text = format!("{}({}) = {}\n", self.program, self.input, self.result);
        if let Some(stats) = &self.stats {
            text.push_str(&stats.to_string());
            text.push('\n');
        }
        text
    }

    /// Pretty JSON form, newline terminated.
    pub fn to_json(&self) -> Result<String> {
        let mut text = serde_json::to_string_pretty(self)?;
        text.push('\n');
        Ok(text)
    }

    pub fn format(&self, json: bool) -> Result<String> {
        if json {
            self.to_json()
        } else {
            Ok(self.to_text())
        }
    }
}

/// Run the program called `name` in a fresh context.
///
/// `input` defaults to the program's own. With `with_stats` the report
/// carries the counter growth of the run.
pub fn run_program(config: RuntimeConfig, name: &str, input: Option<i64>, with_stats: bool) -> Result<Report> {
    let Some(program) = find(name) else {
        let known: Vec<&str> = PROGRAMS.iter().map(|p| p.name).collect();
        bail!("unknown program `{name}` (available: {})", known.join(", "));
    };
    let input = input.unwrap_or(program.default_input);
    debug!("Running {}({})", program.name, input);

    let mut ctx = Context::new(config);
    let before = stats::snapshot();
    let value = ctx
        .run(|ctx| program.run(ctx, input))
        .with_context(|| format!("Program `{}` did not complete", program.name))?;
    let result = render(&value);
    drop(value);
    let delta = stats::snapshot().since(&before);

    Ok(Report {
        program: program.name,
        input,
        result,
        stats: with_stats.then_some(delta),
    })
}

/// Write report `text` to `output`, or to stdout when there is none.
pub fn emit(text: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            os::write_text_file(path, text)
                .with_context(|| format!("Failed to write report: {}", path.display()))?;
            info!("Wrote report to {}", path.display());
        }
        None => print!("{text}"),
    }
    Ok(())
}
