//! On-disk SVN repository access.

pub mod client;
pub mod parser;

pub use client::{ChangedFile, ContentSource, Repository, Revision};
pub use parser::{Change, CopyFrom};
