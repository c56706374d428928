//! /model command - list and switch models

use super::CommandResult;
use prism_ai::models;

pub struct ModelCommand;

impl ModelCommand {
    /// Lists models with no args, otherwise switches to the first match
    pub fn execute(args: &str, current: &str) -> CommandResult {
        if args.is_empty() {
            return CommandResult::Message(list_models(current));
        }
        match models::find_model(args) {
            Some(model) => CommandResult::ChangeModel(model),
            None => CommandResult::Message(format!(
                "No model found matching '{}'\nUse /model to list available models",
                args
            )),
        }
    }
}

fn list_models(current: &str) -> String {
    let mut output = String::from("Available models:\n");
    let mut lab = "";

    for model in models::get_all_models() {
        if model.lab != lab {
            lab = model.lab;
            output.push_str(&format!("\n{}:\n", lab));
        }
        let marker = if model.id == current { " *" } else { "" };
        let reasoning = if model.reasoning { " (reasoning)" } else { "" };
        output.push_str(&format!(
            "  {:<40} {}{}{}\n",
            model.id, model.name, reasoning, marker
        ));
    }

    output.push_str("\nSwitch with: /model <name>");
    output
}
