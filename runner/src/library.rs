pub mod command;
pub mod locale;
pub mod mock;
pub mod preflight;
pub mod system;

pub use command::{Command, CommandOutput, CommandRunner, RunnerError};
pub use locale::{LocaleGuard, LocaleOverride};
pub use mock::MockRunner;
pub use system::SystemRunner;
