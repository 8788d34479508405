//! Configuration command.
//!
//! Shows the merged configuration with the layer each value came from, or
//! the config file locations. Secrets are always masked.

use crate::cli::ConfigArgs;
use crate::config::{
    CliOverrides, ConfigLayer, PROJECT_CONFIG_FILENAME, Settings, default_config_layer,
    load_project_config, load_user_config, user_config_path,
};
use crate::error::Result;
use crate::output::OutputContext;
use rich_rust::prelude::*;
use serde_json::json;
use std::path::PathBuf;
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConfigSource {
    Default,
    User,
    Project,
    Environment,
    Cli,
}

impl ConfigSource {
    const fn label(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::User => "user config",
            Self::Project => "project config",
            Self::Environment => "environment",
            Self::Cli => "cli",
        }
    }
}

struct ConfigEntry {
    key: String,
    value: String,
    source: ConfigSource,
}

struct LayerWithSource {
    source: ConfigSource,
    layer: ConfigLayer,
}

/// Execute the config command.
///
/// # Errors
///
/// Returns an error if a config file cannot be read or a value is invalid.
pub fn execute(args: &ConfigArgs, ctx: &OutputContext, overrides: &CliOverrides) -> Result<()> {
    if args.paths {
        show_paths(ctx, overrides);
        return Ok(());
    }

    let layers = build_layers(overrides)?;
    let merged = ConfigLayer::merge_layers(
        &layers.iter().map(|l| l.layer.clone()).collect::<Vec<_>>(),
    );
    let settings = Settings::from_layer(&merged)?;
    let entries: Vec<ConfigEntry> = settings
        .masked_entries()
        .into_iter()
        .map(|(key, value)| {
            let source = resolve_source(&key, &layers);
            trace!(key = %key, source = ?source, "Config source resolved");
            ConfigEntry { key, value, source }
        })
        .collect();

    if ctx.is_json() {
        let values: serde_json::Map<String, serde_json::Value> = entries
            .iter()
            .map(|entry| {
                (
                    entry.key.clone(),
                    json!({"value": entry.value, "source": entry.source.label()}),
                )
            })
            .collect();
        ctx.json_pretty(&values);
    } else if ctx.is_rich() {
        render_config_table("Configuration", &entries, ctx);
    } else if !ctx.is_quiet() {
        let width = entries.iter().map(|e| e.key.len()).max().unwrap_or(0);
        for entry in &entries {
            let value = if entry.value.is_empty() {
                "(unset)"
            } else {
                entry.value.as_str()
            };
            println!("{:<width$}  {value}  [{}]", entry.key, entry.source.label());
        }
    }
    Ok(())
}

fn build_layers(overrides: &CliOverrides) -> Result<Vec<LayerWithSource>> {
    Ok(vec![
        LayerWithSource {
            source: ConfigSource::Default,
            layer: default_config_layer(),
        },
        LayerWithSource {
            source: ConfigSource::User,
            layer: load_user_config()?,
        },
        LayerWithSource {
            source: ConfigSource::Project,
            layer: load_project_config(overrides.config.as_deref())?,
        },
        LayerWithSource {
            source: ConfigSource::Environment,
            layer: ConfigLayer::from_env(),
        },
        LayerWithSource {
            source: ConfigSource::Cli,
            layer: overrides.as_layer(),
        },
    ])
}

fn resolve_source(key: &str, layers: &[LayerWithSource]) -> ConfigSource {
    layers
        .iter()
        .rev()
        .find(|layer| layer.layer.get(key).is_some())
        .map_or(ConfigSource::Default, |layer| layer.source)
}

fn render_config_table(title: &str, entries: &[ConfigEntry], ctx: &OutputContext) {
    let theme = ctx.theme();
    let mut table = Table::new()
        .box_style(theme.box_style)
        .border_style(theme.panel_border.clone())
        .title(Text::styled(title, theme.panel_title.clone()));

    table = table
        .with_column(Column::new("Key").min_width(16).max_width(30))
        .with_column(Column::new("Value").min_width(12).max_width(50))
        .with_column(Column::new("Source").min_width(12).max_width(20));

    for entry in entries {
        let key_cell = Cell::new(Text::styled(&entry.key, theme.emphasis.clone()));
        let value_cell = if entry.value.is_empty() {
            Cell::new(Text::styled("(unset)", theme.muted.clone()))
        } else {
            Cell::new(Text::new(entry.value.clone()))
        };
        let source_cell = Cell::new(Text::styled(entry.source.label(), theme.dimmed.clone()));
        table.add_row(Row::new(vec![key_cell, value_cell, source_cell]));
    }

    ctx.render(&table);
}

/// Show config file paths.
fn show_paths(ctx: &OutputContext, overrides: &CliOverrides) {
    let user = user_config_path();
    let project = overrides
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(PROJECT_CONFIG_FILENAME));

    if ctx.is_json() {
        ctx.json_pretty(&json!({
            "user_config": user.as_ref().map(|p| p.display().to_string()),
            "project_config": project.display().to_string(),
        }));
        return;
    }

    let status = |path: &PathBuf| if path.exists() { "exists" } else { "not found" };
    match &user {
        Some(path) => println!("User config: {} ({})", path.display(), status(path)),
        None => println!("User config: (none)"),
    }
    println!("Project config: {} ({})", project.display(), status(&project));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layer(pairs: &[(&str, &str)]) -> ConfigLayer {
        let mut layer = ConfigLayer::default();
        for (key, value) in pairs {
            layer.set(key, *value);
        }
        layer
    }

    #[test]
    fn highest_layer_names_the_source() {
        let layers = vec![
            LayerWithSource {
                source: ConfigSource::Default,
                layer: default_config_layer(),
            },
            LayerWithSource {
                source: ConfigSource::Project,
                layer: layer(&[("http.timeout", "5")]),
            },
            LayerWithSource {
                source: ConfigSource::Environment,
                layer: layer(&[("jira.url", "https://jira.example")]),
            },
        ];
        assert_eq!(resolve_source("http.timeout", &layers), ConfigSource::Project);
        assert_eq!(resolve_source("jira.url", &layers), ConfigSource::Environment);
        assert_eq!(resolve_source("backup.poll-interval", &layers), ConfigSource::Default);
        assert_eq!(resolve_source("xray.url", &layers), ConfigSource::Default);
    }
}
