pub const HELLO_WORLD_PROMPT_YML: &str = include_str!("../templates/hello_world.prompt.yml");
pub const PROMPTS_WORKFLOW_YML: &str = include_str!("../templates/workflow.yml");
