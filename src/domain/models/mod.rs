pub mod agent;
pub mod config;
pub mod dag;
pub mod event;
pub mod mission;
pub mod slot;
pub mod task;
pub mod workspace;

pub use agent::{Agent, AgentStatus, LogLine};
pub use config::Config;
pub use dag::{DagError, DagNode, TaskDag};
pub use event::{Event, EventKind};
pub use mission::{Mission, MissionBrief, MissionStatus, TaskBuckets, UserTask};
pub use slot::{SlotMetrics, SlotStatus, WorkerSlot};
pub use task::{Priority, Task, TaskStatus, TaskType};
pub use workspace::{Workspace, WorkspaceMetadataFile};
