//! Tool definitions, handlers, and concurrent execution.

pub mod definition;
pub mod executor;
pub mod handler;
pub mod registry;
pub mod schema;

pub use definition::{builtin_definitions, ToolDefinition, READ_FILE_TOOL, SEARCH_DOCUMENTS_TOOL};
pub use executor::ToolExecutor;
pub use handler::{FnToolHandler, ToolContext, ToolHandler, ToolHandlers, ToolOutput};
pub use registry::{ToolFilter, ToolRegistry};
pub use schema::SchemaBuilder;
