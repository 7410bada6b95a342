//! # nest
//!
//! Build and expand ZIP archives ("nests") whose in-archive paths and
//! expansion paths are indirected through named **locations**.
//!
//! There are three location namespaces: *source* (where content is read
//! from), *nest* (where it is stored inside the archive) and *expand* (where
//! it is written when the nest is expanded). A named location can be declared
//! before it is linked to a path, can be relative to another location of the
//! same namespace, and is only resolved while a build or an expansion runs.
//!
//! ## Key Modules
//!
//! - [`location`]: the location value type, namespace tables and resolver.
//! - [`build`]: the [`NestBuilder`] session and build pipeline.
//! - [`expand`]: the [`NestExpander`] session, expand pipeline and listing.
//! - [`attachment`]: the binary codec for metadata carried in ZIP extra fields.
//! - [`archive`]: the thin ZIP container layer.
//!
//! ## Examples
//!
//! ```no_run
//! # fn main() -> nest::Result<()> {
//! use nest::{NestBuilder, NestExpander};
//!
//! let archive = NestBuilder::new()
//!     .name_nest_location("DIR_A", "a/")?
//!     .add("/tmp/x/a")?
//!     .build("/tmp/out", "nest.zip")?;
//!
//! NestExpander::open(&archive)?
//!     .name_nest_location("DIR_A", "a/")?
//!     .link_nest_location("DIR_A")?
//!     .to_path("dirs/dir_a")?
//!     .expand("/tmp/y")?;
//! # Ok(())
//! # }
//! ```

pub mod archive;
pub mod attachment;
pub mod build;
pub mod cli;
pub mod entry;
pub mod error;
pub mod expand;
pub mod fsx;
pub mod location;

pub use build::{EntryBuilder, NestBuilder};
pub use error::{NestError, Result};
pub use expand::{list_entries, ExpandSummary, LinkBuilder, NestExpander, NestListing};
pub use location::{Location, Namespace};
