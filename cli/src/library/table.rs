use std::io::Write;

use console::style;
use tabled::{
    builder::Builder,
    settings::{Style, Theme},
};
use zsnap_library::retention::RetentionPlan;

/// Renders the retention plan, kept snapshots first, both newest first.
pub fn plan_table(plan: &RetentionPlan, created: Option<&str>) -> String {
    let header = ["Snapshot Name", "Created", "Action"]
        .iter()
        .map(|s| style(s).green().bold().to_string())
        .collect::<Vec<String>>();

    let mut builder = Builder::default();
    builder.push_record(header);

    for record in plan.kept() {
        let name = record.fully_qualified_name();
        let action = match created == Some(name.as_str()) {
            true => style("new").cyan().to_string(),
            false => "keep".to_string(),
        };

        builder.push_record([name, record.created().to_string(), action]);
    }

    for record in plan.garbage() {
        builder.push_record([
            record.fully_qualified_name(),
            record.created().to_string(),
            style("destroy").red().to_string(),
        ]);
    }

    let mut table = builder.build();

    let mut style = Theme::from_style(Style::markdown());
    style.remove_borders_horizontal();

    table.with(style);

    table.to_string()
}

pub fn print_plan_table(
    out: &mut impl Write,
    plan: &RetentionPlan,
    created: Option<&str>,
) -> anyhow::Result<()> {
    writeln!(out, "{}", plan_table(plan, created))?;

    Ok(())
}
