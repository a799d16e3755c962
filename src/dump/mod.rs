//! Reading the upstream Wikidata JSON dump (`latest-all.json.gz`).

pub mod entity;
pub mod matcher;
pub mod reader;

pub use entity::DumpEntity;
pub use matcher::MatchStrategy;
pub use reader::{open_dump, DumpLine, DumpLines};
