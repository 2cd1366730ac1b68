//! System prompt assembly

use crate::agent::Agent;

pub(crate) const MARKDOWN_INSTRUCTION: &str = "Use markdown to format your answers.";

const TEAM_LEADER_PREAMBLE: &str = "You are the leader of a team of AI Agents.
- You can either respond directly or transfer tasks to other Agents in your team depending on the tools available to them.
- If you transfer a task to another Agent, make sure to include a clear description of the task and the expected output.
- You must always validate the output of the other Agents before responding to the user, you can re-assign the task if you are not satisfied with the result.";

pub(crate) fn system_prompt(agent: &Agent) -> String {
    let mut sections = Vec::new();

    if let Some(description) = agent.description() {
        sections.push(description.to_string());
    }

    if let Some(role) = agent.role() {
        sections.push(format!("Your role is: {}", role));
    }

    if !agent.team().is_empty() {
        let mut team = format!("{}\n\n## Agents in your team:", TEAM_LEADER_PREAMBLE);
        for (i, member) in agent.team().iter().enumerate() {
            team.push_str(&format!("\n### Agent {}:\nName: {}", i + 1, member.name()));
            if let Some(role) = member.role() {
                team.push_str(&format!("\nRole: {}", role));
            }
            let tools = member.tool_names();
            if !tools.is_empty() {
                team.push_str(&format!("\nAvailable tools: {}", tools.join(", ")));
            }
        }
        sections.push(team);
    }

    let mut instructions: Vec<&str> = agent.instructions().iter().map(String::as_str).collect();
    if agent.output().markdown {
        instructions.push(MARKDOWN_INSTRUCTION);
    }
    if !instructions.is_empty() {
        sections.push(format!("## Instructions\n- {}", instructions.join("\n- ")));
    }

    sections.join("\n\n")
}
