//! Sample component implementations: two `Callable` tools (math, echo), a
//! `Readable` in-memory resource, and a `Renderable` templated prompt.
//! Illustrative of the capability-trait contract, not part of the protocol
//! surface itself.

pub mod echo_tool;
pub mod math_tool;
pub mod memory_resource;
pub mod templated_prompt;

pub use echo_tool::EchoTool;
pub use math_tool::MathTool;
pub use memory_resource::InMemoryResource;
pub use templated_prompt::TemplatedPrompt;
