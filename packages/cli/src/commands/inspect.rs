use super::compose;
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use luthor_runtime::{Availability, Category, Composition};
use serde::Serialize;
use std::path::Path;

#[derive(Debug, Args)]
pub struct InspectArgs {
    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub extensions: Vec<ExtensionRow>,
    pub commands: Vec<CommandRow>,
    pub node_types: Vec<NodeTypeRow>,
    pub overrides: Vec<OverrideRow>,
}

#[derive(Debug, Serialize)]
pub struct ExtensionRow {
    pub id: String,
    pub categories: Vec<Category>,
}

#[derive(Debug, Serialize)]
pub struct CommandRow {
    pub name: String,
    pub owner: String,
    pub availability: Option<Availability>,
}

#[derive(Debug, Serialize)]
pub struct NodeTypeRow {
    pub tag: String,
    pub owner: String,
    pub restricted: bool,
    pub codec: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverrideRow {
    pub kind: String,
    pub name: String,
    pub previous_owner: String,
    pub owner: String,
}

impl Report {
    pub fn of(composition: &Composition) -> Self {
        let extensions = composition
            .extensions()
            .iter()
            .map(|info| ExtensionRow {
                id: info.id.clone(),
                categories: info.categories.clone(),
            })
            .collect();

        let commands = composition
            .command_names()
            .into_iter()
            .map(|name| CommandRow {
                owner: composition.command_owner(&name).unwrap_or_default().to_string(),
                availability: composition.command_availability(&name),
                name,
            })
            .collect();

        let node_types = composition
            .node_types()
            .iter()
            .map(|(tag, entry)| NodeTypeRow {
                tag: tag.to_string(),
                owner: entry.owner.clone(),
                restricted: entry.spec.restricted,
                codec: entry.spec.codec.is_some(),
            })
            .collect();

        let overrides = composition
            .overrides()
            .iter()
            .map(|o| OverrideRow {
                kind: o.kind.to_string(),
                name: o.name.clone(),
                previous_owner: o.previous_owner.clone(),
                owner: o.owner.clone(),
            })
            .collect();

        Self {
            extensions,
            commands,
            node_types,
            overrides,
        }
    }
}

pub fn inspect(args: InspectArgs, cwd: &Path) -> Result<()> {
    let composition = compose(cwd)?;
    let report = Report::of(&composition);
    composition.dispose();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("{}", "Extensions".bright_blue().bold());
    for extension in &report.extensions {
        let categories: Vec<String> = extension.categories.iter().map(|c| format!("{:?}", c)).collect();
        println!("  {} {}", extension.id, categories.join(", ").dimmed());
    }

    println!("\n{}", "Commands".bright_blue().bold());
    for command in &report.commands {
        let availability = match command.availability {
            Some(Availability::Active) | None => "active".green(),
            Some(Availability::Disabled) => "disabled".yellow(),
            Some(Availability::Suppressed) => "suppressed".yellow(),
        };
        println!("  {} {} {}", command.name, command.owner.dimmed(), availability);
    }

    println!("\n{}", "Node types".bright_blue().bold());
    for node_type in &report.node_types {
        let mut flags = Vec::new();
        if node_type.restricted {
            flags.push("restricted");
        }
        if node_type.codec {
            flags.push("codec");
        }
        println!("  {} {} {}", node_type.tag, node_type.owner.dimmed(), flags.join(" ").cyan());
    }

    if !report.overrides.is_empty() {
        println!("\n{}", "Overrides".bright_blue().bold());
        for o in &report.overrides {
            println!(
                "  {} {} {} → {}",
                "⚠️".yellow(),
                o.name,
                o.previous_owner.dimmed(),
                o.owner
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_report_reflects_config() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("luthor.config.json"),
            r#"{"featureFlags": {"table": false}}"#,
        )
        .unwrap();

        let composition = compose(dir.path()).unwrap();
        let report = Report::of(&composition);

        let insert_table = report.commands.iter().find(|c| c.name == "insertTable").unwrap();
        assert_eq!(insert_table.owner, "table");
        assert_eq!(insert_table.availability, Some(Availability::Disabled));

        let code = report.node_types.iter().find(|n| n.tag == "code").unwrap();
        assert!(code.restricted);
        assert!(report.node_types.iter().any(|n| n.tag == "image" && n.codec));
        assert!(report.overrides.is_empty());
    }

    #[test]
    fn test_bad_config_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("luthor.config.json"), "{ nope").unwrap();
        let error = compose(dir.path()).unwrap_err();
        assert!(error.to_string().contains("editor config"));
    }
}
