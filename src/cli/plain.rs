//! Request/response commands that never start a call

use std::error::Error;

use serde_json::{Map, Value};

use crate::cli::{CliContext, TargetArgs};
use crate::core::inspector::InspectorController;

pub async fn list_tools(context: &CliContext, target: &TargetArgs) -> Result<(), Box<dyn Error>> {
    let controller = InspectorController::new(context.connect()?);
    let target = target.to_target(&context.config);
    let tools = controller.list_tools(&target).await?;

    if tools.is_empty() {
        println!("No tools available for {}", target.label());
        return Ok(());
    }

    println!("Tools for {}:", target.label());
    for tool in tools {
        let required = tool.required_arguments();
        let mut line = format!("  {}", tool.name);
        if !required.is_empty() {
            line.push_str(&format!(" (requires: {})", required.join(", ")));
        }
        if let Some(description) = tool.description.as_deref().filter(|d| !d.trim().is_empty()) {
            line.push_str(" - ");
            line.push_str(first_line(description));
        }
        println!("{line}");
    }
    Ok(())
}

pub async fn read_resource(
    context: &CliContext,
    target: &TargetArgs,
    uri: &str,
) -> Result<(), Box<dyn Error>> {
    let controller = InspectorController::new(context.connect()?);
    let value = controller
        .read_resource(&target.to_target(&context.config), uri)
        .await?;
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

pub async fn get_prompt(
    context: &CliContext,
    target: &TargetArgs,
    name: &str,
    raw_args: &[String],
) -> Result<(), Box<dyn Error>> {
    let arguments = parse_prompt_arguments(raw_args)?;
    let controller = InspectorController::new(context.connect()?);
    let value = controller
        .get_prompt(&target.to_target(&context.config), name, arguments)
        .await?;
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

/// Parses repeated `KEY=VALUE` flags. Prompt arguments are always strings.
pub(crate) fn parse_prompt_arguments(
    raw_args: &[String],
) -> Result<Option<Map<String, Value>>, String> {
    if raw_args.is_empty() {
        return Ok(None);
    }

    let mut arguments = Map::new();
    for raw in raw_args {
        let Some((key, value)) = raw.split_once('=') else {
            return Err(format!("Prompt argument '{raw}' must look like KEY=VALUE"));
        };
        let key = key.trim();
        if key.is_empty() {
            return Err(format!("Prompt argument '{raw}' has an empty key"));
        }
        arguments.insert(key.to_string(), Value::String(value.to_string()));
    }
    Ok(Some(arguments))
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or_default().trim()
}
