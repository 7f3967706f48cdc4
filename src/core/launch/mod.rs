pub mod descriptor;
pub mod hooks;
pub mod orchestrator;
pub mod state;
pub mod supervisor;

pub use descriptor::{LaunchDescriptor, RuntimePrefs};
pub use orchestrator::{LaunchOrchestrator, LaunchOutcome};
pub use state::{GameProcess, LaunchPhase, ProcessExit};
pub use supervisor::{CommandSupervisor, ProcessSupervisor};
