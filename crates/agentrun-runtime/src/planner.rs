use agentrun_core::ToolSchema;

use crate::capability::CapabilityFlags;
use crate::registry::ToolRegistry;

pub const ALWAYS_ON_TOOLS: &[&str] = &["task_finish", "ask_user"];
const WORKSPACE_TOOLS: &[&str] = &["read_file", "write_file", "list_files", "file_info", "file_str_replace", "workspace_grep"];
const COMPUTER_TOOLS: &[&str] = &["bash", "check_background_command", "read_image"];
const SUB_AGENT_TOOLS: &[&str] = &["create_sub_task", "batch_sub_tasks"];
const DOCUMENT_TOOLS: &[&str] = &[];
const WORKFLOW_TOOLS: &[&str] = &[];

/// Decides which of the registry's tools are visible to the model for one
/// cycle, given the task's capability flags and current memory pressure.
pub struct ToolPlanner;

impl ToolPlanner {
    /// `memory_usage_percentage` is the effective-length ratio computed by
    /// the memory manager; `memory_threshold_percentage` is the task's
    /// configured compaction trigger. `has_sub_agents` reflects whether the
    /// task configured any named sub-agents at all.
    pub fn plan(
        registry: &ToolRegistry,
        capabilities: CapabilityFlags,
        has_sub_agents: bool,
        memory_usage_percentage: f64,
        memory_threshold_percentage: f64,
    ) -> Vec<ToolSchema> {
        Self::plan_names(capabilities, has_sub_agents, memory_usage_percentage, memory_threshold_percentage)
            .into_iter()
            .filter_map(|name| registry.find(name))
            .map(|handler| handler.schema())
            .collect()
    }

    pub fn plan_names(
        capabilities: CapabilityFlags,
        has_sub_agents: bool,
        memory_usage_percentage: f64,
        memory_threshold_percentage: f64,
    ) -> Vec<&'static str> {
        let mut visible_names: Vec<&str> = ALWAYS_ON_TOOLS.to_vec();
        visible_names.push("todo_write");

        if capabilities.use_workspace {
            visible_names.extend_from_slice(WORKSPACE_TOOLS);
        }
        if capabilities.computer_agent {
            visible_names.extend_from_slice(COMPUTER_TOOLS);
        }
        if capabilities.native_multimodal && !visible_names.contains(&"read_image") {
            visible_names.push("read_image");
        }
        if has_sub_agents {
            visible_names.extend_from_slice(SUB_AGENT_TOOLS);
        }
        if capabilities.enable_document_tools {
            visible_names.extend_from_slice(DOCUMENT_TOOLS);
        }
        if capabilities.enable_workflow_tools {
            visible_names.extend_from_slice(WORKFLOW_TOOLS);
        }
        if memory_usage_percentage >= memory_threshold_percentage {
            visible_names.push("compress_memory");
        }
        visible_names
    }
}
