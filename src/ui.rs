use colored::Colorize;
use declarative::{Action, RunReport};

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print a warning message
pub fn warn(msg: &str) {
    println!("{} {}", "⚠".yellow(), msg);
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Print a dim/muted message
pub fn dim(msg: &str) {
    println!("  {}", msg.dimmed());
}

/// Print a header/title
pub fn header(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", "─".repeat(title.chars().count()).dimmed());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

/// One-word verb for a planned action
pub fn action_label(action: &Action) -> String {
    let verb = action.to_string();
    match action {
        Action::Unchanged(_) => verb.dimmed().to_string(),
        Action::Create(_) => verb.green().to_string(),
        Action::Update { .. } => verb.yellow().to_string(),
        Action::Replace { .. } | Action::Delete { .. } => verb.red().to_string(),
    }
}

/// Print the output record
pub fn report(report: &RunReport) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}
