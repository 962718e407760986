//! Archivist story runner
//!
//! Executes YAML stories, ordered lists of client operations, against one
//! tenant. Steps name the entities they create with labels so later steps can
//! refer to them.
//!
//! # Example
//!
//! ```rust,no_run
//! use archivist_client::{Archivist, ArchivistConfig};
//! use archivist_runner::{Story, StoryRunner};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let archivist = Archivist::from_config(ArchivistConfig::from_env()?)?;
//! let story = Story::from_file("stories/door.yaml")?;
//! let report = StoryRunner::new(archivist).run(&story).await?;
//! println!("{} steps", report.outcomes.len());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod error;
mod labels;
mod runner;
mod story;

pub use error::{RunnerError, RunnerResult};
pub use labels::{EntityKind, LabelRegistry};
pub use runner::{RunReport, StepOutcome, StoryRunner};
pub use story::{Action, Step, Story};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
