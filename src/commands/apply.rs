//! `apply` and `plan`
//!
//! Both load one declaration, open a session and hand the resource to the
//! lifecycle driver. `plan` always runs in check mode.

use anyhow::{Result, anyhow};
use declarative::Error;
use std::path::Path;

use crate::Context;
use crate::input;
use crate::resource::{self, Declared};
use crate::ui;

/// Converge the declared resource and print the output record
pub fn apply(ctx: &Context, file: &Path, check: bool) -> Result<()> {
    let declared = load(file)?;
    let client = cloudstack::connect(&ctx.connection).map_err(reported)?;

    let report = declared.run(&client, check).map_err(reported)?;
    if !ctx.quiet {
        let name = declared.resource.name();
        let label = format!("{} {name}", declared.resource.kind());
        match (report.changed, check) {
            (true, true) => ui::warn(&format!("{label} would change (check mode)")),
            (true, false) => ui::success(&format!("{label} changed")),
            (false, _) => ui::info(&format!("{label} is up to date")),
        }
    }
    ui::report(&report)
}

/// Show what `apply` would do, then the check-mode output record
pub fn plan(ctx: &Context, file: &Path) -> Result<()> {
    let declared = load(file)?;
    let client = cloudstack::connect(&ctx.connection).map_err(reported)?;

    let action = declared.plan(&client).map_err(reported)?;
    ui::header("Plan");
    ui::kv("type", declared.resource.kind());
    ui::kv("resource", &declared.resource.name());
    ui::kv("state", &declared.common.state.to_string());
    ui::kv("action", &ui::action_label(&action));
    if let Some(existing) = action.existing() {
        ui::kv("id", existing.id());
    }
    let commands = action.commands();
    if commands.is_empty() {
        ui::dim("no mutating calls");
    } else {
        ui::kv("calls", &commands.join(" → "));
    }
    println!();

    let report = declared.run(&client, true).map_err(reported)?;
    ui::report(&report)
}

fn load(file: &Path) -> Result<Declared> {
    let declaration = input::load(file)?;
    resource::declare(&declaration.kind, declaration.body).map_err(reported)
}

/// Print the category advice for a run error and hand it on
fn reported(err: Error) -> anyhow::Error {
    let category = err.category();
    ui::error(&format!("{category}: {err}"));
    ui::dim(category.advice());
    anyhow!(err)
}
