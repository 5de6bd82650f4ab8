//! Output rendering for forgectl.
//!
//! Formats workflow/artifact/log information for terminal display as plain
//! text tables, with no dependency on a TUI crate.

use crate::client::{GetWorkflowResponse, RunResponse, StartWorkflowResponse};
use forge_core::ResumableWorkflow;

pub fn print_start_result(result: &StartWorkflowResponse) {
    if result.ok {
        println!("Started workflow: {}", result.workflow_id.as_deref().unwrap_or("?"));
        println!("  {}", result.message);
    } else {
        println!("Refused: {}", result.message);
    }
}

pub fn print_run_result(result: &RunResponse) {
    println!("Workflow: {}", result.workflow_id);
    println!("  Status:  {}", if result.ok { "OK" } else { "FAILED" });
    println!("  Message: {}", result.message);
    if let Some(agent) = &result.failed_agent {
        println!("  Failed agent: {agent}");
    }
}

pub fn print_workflow_list(ids: &[String]) {
    if ids.is_empty() {
        println!("No workflows found.");
        return;
    }
    println!("{:<24}", "WORKFLOW ID");
    println!("{}", "-".repeat(24));
    for id in ids {
        println!("{id:<24}");
    }
    println!();
    println!("{} workflow(s)", ids.len());
}

pub fn print_resumable_list(rows: &[ResumableWorkflow]) {
    if rows.is_empty() {
        println!("No resumable workflows found.");
        return;
    }
    println!("{:<24}  {:<8}  {:<20}  {:<18}", "WORKFLOW ID", "PROGRESS", "NEXT AGENT", "COMPLETED AGENTS");
    println!("{}", "-".repeat(90));
    for row in rows {
        println!(
            "{:<24}  {:<7}%  {:<20}  {}",
            row.workflow_id.as_str(),
            row.progress_percentage,
            row.next_agent.as_deref().unwrap_or("-"),
            row.completed_agents.join(", "),
        );
    }
}

pub fn print_workflow_detail(detail: &GetWorkflowResponse) {
    println!("Workflow: {}", detail.workflow_id);
    println!("  Artifacts:");
    for artifact in &detail.artifacts {
        println!("    {artifact}");
    }
}

pub fn print_artifact(value: &serde_json::Value) {
    println!("{}", serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string()));
}
