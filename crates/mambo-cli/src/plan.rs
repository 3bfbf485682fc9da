//! JSON run plans: an ordered list of steps executed by `mambo run`.
//!
//! ```json
//! {
//!   "steps": [
//!     { "step": "mode", "input": "go.tsv", "mode": "gene", "dataset": "GO", "dataset_id": 0 },
//!     { "step": "mode", "input": "hugo.tsv", "mode": "gene", "dataset": "HUGO", "dataset_id": 1 }
//!   ]
//! }
//! ```
//!
//! Step fields are the long options of the matching subcommand, in snake
//! case. Relative paths resolve against the plan file's directory.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::{CrossnetArgs, MappedModeArgs, MappingArgs, ModeArgs};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunPlan {
    pub steps: Vec<PlanStep>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "step", rename_all = "kebab-case")]
pub enum PlanStep {
    Mode(ModeArgs),
    MappedMode(MappedModeArgs),
    Crossnet(CrossnetArgs),
    Mapping(MappingArgs),
}

impl PlanStep {
    pub fn name(&self) -> &'static str {
        match self {
            PlanStep::Mode(_) => "mode",
            PlanStep::MappedMode(_) => "mapped-mode",
            PlanStep::Crossnet(_) => "crossnet",
            PlanStep::Mapping(_) => "mapping",
        }
    }

    fn rebase(&mut self, base: &Path) {
        match self {
            PlanStep::Mode(args) => args.rebase(base),
            PlanStep::MappedMode(args) => args.rebase(base),
            PlanStep::Crossnet(args) => args.rebase(base),
            PlanStep::Mapping(args) => args.rebase(base),
        }
    }
}

impl RunPlan {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read plan {}", path.display()))?;
        let mut plan: RunPlan = serde_json::from_str(&text)
            .with_context(|| format!("failed to parse plan {}", path.display()))?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        for step in &mut plan.steps {
            step.rebase(base);
        }
        Ok(plan)
    }
}
