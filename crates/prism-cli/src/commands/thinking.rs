//! /thinking command - show and set reasoning level

use super::CommandResult;
use prism_ai::ReasoningLevel;

pub struct ThinkingCommand;

impl ThinkingCommand {
    pub fn execute(args: &str, current: ReasoningLevel) -> CommandResult {
        if args.is_empty() {
            return CommandResult::Message(show_levels(current));
        }
        match ReasoningLevel::parse(args) {
            Some(level) => CommandResult::ChangeReasoning(level),
            None => CommandResult::Message(format!(
                "Unknown reasoning level: '{}'\nValid levels: off, low, medium, high",
                args
            )),
        }
    }
}

fn show_levels(current: ReasoningLevel) -> String {
    let levels = [
        (ReasoningLevel::Off, "No extended thinking"),
        (ReasoningLevel::Low, "Light reasoning"),
        (ReasoningLevel::Medium, "Moderate reasoning"),
        (ReasoningLevel::High, "Deep reasoning"),
    ];

    let mut output = String::from("Reasoning levels:\n\n");
    for (level, desc) in levels {
        let marker = if level == current { " *" } else { "" };
        output.push_str(&format!("  {:<10} {}{}\n", level.name(), desc, marker));
    }
    output.push_str("\nOnly sent to models that support reasoning.\nSet with: /thinking <level>");
    output
}
