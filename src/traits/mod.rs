pub mod channel;
pub mod launcher;
pub mod processor;
pub mod resources;
pub mod workspace;

pub use crate::config::ProcessorMap;
pub use channel::{ChannelConnector, ConsumerHandle, MessageChannel, MessageHandler};
pub use launcher::AgentLauncher;
pub use processor::{Processor, ProcessorRequest, ProcessorResponse};
pub use resources::{ResourceLocator, ResourceRecord};
pub use workspace::{FileQuery, FileRecord, Workspace, WorkspaceResolver};
