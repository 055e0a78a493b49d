use colored::Colorize;

use crate::resource::TYPES;
use crate::ui;

/// List the supported resource types
pub fn run() {
    ui::header("Resource types");
    let width = TYPES.iter().map(|t| t.name.len()).max().unwrap_or(0);
    for info in TYPES {
        let name = format!("{:<width$}", info.name);
        println!("  {}  {}", name.bold(), info.description);
        ui::dim(&format!("{:<width$}  identified by {}", "", info.key));
    }
}
