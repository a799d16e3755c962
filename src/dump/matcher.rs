//! Recognising outstanding entities in dump lines.
//!
//! Both strategies answer the same question: does this line hold an item
//! whose numeric id is still in the work set? `LineScan` answers it from the
//! raw bytes and only decodes hits; `Decode` decodes every line.

use anyhow::{bail, Result};
use memchr::memmem;

use super::entity::DumpEntity;
use crate::config::ScanStrategy;
use crate::database_ops::work_set::WorkSet;

/// Literal prefix of an item's id in the dump's compact JSON.
pub const ITEM_ID_NEEDLE: &[u8] = br#""type":"item","id":"Q"#;

pub trait MatchStrategy {
    fn name(&self) -> &'static str;

    /// Return the decoded entity when `line` is an outstanding item.
    fn match_line(&mut self, line: &str, work: &WorkSet) -> Result<Option<DumpEntity>>;
}

impl ScanStrategy {
    pub fn build(self) -> Box<dyn MatchStrategy> {
        match self {
            ScanStrategy::LineScan => Box::new(LineScan::new()),
            ScanStrategy::Decode => Box::new(Decode),
        }
    }
}

pub struct LineScan {
    finder: memmem::Finder<'static>,
}

impl LineScan {
    pub fn new() -> Self {
        Self {
            finder: memmem::Finder::new(ITEM_ID_NEEDLE),
        }
    }

    /// Numeric id following `"type":"item","id":"Q`, provided the digits are
    /// closed by a quote. `Q123` is never read out of `Q12345"`.
    pub fn item_id(&self, line: &[u8]) -> Option<i64> {
        let start = self.finder.find(line)? + ITEM_ID_NEEDLE.len();
        let rest = &line[start..];
        let digits = rest.iter().take_while(|b| b.is_ascii_digit()).count();
        if digits == 0 || rest.get(digits) != Some(&b'"') {
            return None;
        }
        atoi::atoi::<i64>(&rest[..digits])
    }
}

impl Default for LineScan {
    fn default() -> Self {
        Self::new()
    }
}

impl MatchStrategy for LineScan {
    fn name(&self) -> &'static str {
        "line-scan"
    }

    fn match_line(&mut self, line: &str, work: &WorkSet) -> Result<Option<DumpEntity>> {
        let Some(item_id) = self.item_id(line.as_bytes()) else {
            return Ok(None);
        };
        if !work.contains(item_id) {
            return Ok(None);
        }
        let entity = DumpEntity::from_line(line)?;
        if entity.item_id() != Some(item_id) {
            bail!(
                "line prefilter saw Q{item_id} but the record decodes as {}",
                entity.id
            );
        }
        Ok(Some(entity))
    }
}

pub struct Decode;

impl MatchStrategy for Decode {
    fn name(&self) -> &'static str {
        "decode"
    }

    fn match_line(&mut self, line: &str, work: &WorkSet) -> Result<Option<DumpEntity>> {
        let entity = DumpEntity::from_line(line)?;
        match entity.item_id() {
            Some(id) if work.contains(id) => Ok(Some(entity)),
            _ => Ok(None),
        }
    }
}
