use serde::{Deserialize, Serialize};

/// Which optional tool groups a task exposes to the planner: capability-flag
/// gating used to decide which tool families are visible for a given agent
/// type.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct CapabilityFlags {
    pub use_workspace: bool,
    pub native_multimodal: bool,
    pub allow_interruption: bool,
    pub enable_document_tools: bool,
    pub enable_workflow_tools: bool,
    pub computer_agent: bool,
}

impl CapabilityFlags {
    pub fn all() -> Self {
        Self {
            use_workspace: true,
            native_multimodal: true,
            allow_interruption: true,
            enable_document_tools: true,
            enable_workflow_tools: true,
            computer_agent: true,
        }
    }
}
