//! File hierarchy reassembly
//!
//! Folds the order-restored record objects into
//! `CwrFile -> Group -> Transaction -> detail records`. The fold threads an
//! owned `BuildState` through every step; nothing is shared across steps.

use crate::config::{ConverterConfig, TransactionKeying};
use crate::error::{missing_field, ConvertError, Result};
use crate::record::RecordTag;
use cwrgraph_storage::{ContentId, MetaObject};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::mem;
use tracing::{debug, warn};

/// Field every record object carries its tag in
pub const RECORD_TYPE_FIELD: &str = "record_type";

/// One main record (`NWR`/`REV`) plus its detail records
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(rename = "MainRecord")]
    pub main_record: BTreeMap<RecordTag, ContentId>,
    #[serde(rename = "DetailRecords")]
    pub detail_records: BTreeMap<RecordTag, Vec<ContentId>>,
}

/// Group header plus the transactions it encloses
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    #[serde(rename = "GRH")]
    pub header: Option<ContentId>,
    #[serde(rename = "Transactions")]
    pub transactions: BTreeMap<RecordTag, Vec<Transaction>>,
}

/// Root of the object graph
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CwrFile {
    /// `HDR` and `TRL`
    #[serde(rename = "Records")]
    pub records: BTreeMap<RecordTag, ContentId>,
    #[serde(rename = "Groups")]
    pub groups: Vec<Group>,
}

impl CwrFile {
    pub fn transaction_count(&self) -> usize {
        self.groups
            .iter()
            .flat_map(|group| group.transactions.values())
            .map(Vec::len)
            .sum()
    }
}

#[derive(Debug, Default)]
struct BuildState {
    file: CwrFile,
    group: Group,
    group_open: bool,
    transaction: Transaction,
    opened_by: Option<RecordTag>,
    details: Vec<ContentId>,
}

impl BuildState {
    fn apply(self, tag: RecordTag, id: ContentId, builder: &GraphBuilder) -> Result<Self> {
        match tag {
            RecordTag::HDR | RecordTag::TRL => Ok(self.set_file_record(tag, id)),
            RecordTag::GRH => self.open_group(id, builder.strict_groups),
            RecordTag::GRT => self.close_group(builder),
            RecordTag::NWR | RecordTag::REV => Ok(self.add_main_record(tag, id, builder.keying)),
            RecordTag::SPU => Ok(self.add_detail(id)),
        }
    }

    fn set_file_record(mut self, tag: RecordTag, id: ContentId) -> Self {
        self.file.records.insert(tag, id);
        self
    }

    fn open_group(mut self, header: ContentId, strict: bool) -> Result<Self> {
        if self.group_open {
            if strict {
                return Err(ConvertError::DanglingGroup(
                    "group header while previous group is still open".to_string(),
                ));
            }
            warn!(
                "Dropping unterminated group with {} transaction keys",
                self.group.transactions.len()
            );
        }
        self.group = Group {
            header: Some(header),
            transactions: BTreeMap::new(),
        };
        self.group_open = true;
        Ok(self)
    }

    fn close_group(self, builder: &GraphBuilder) -> Result<Self> {
        if !self.group_open && builder.strict_groups {
            return Err(ConvertError::DanglingGroup(
                "group trailer without group header".to_string(),
            ));
        }
        let mut state = self.finish_transaction(builder.keying);
        let group = mem::take(&mut state.group);
        state.file.groups.push(group);
        state.group_open = false;
        Ok(state)
    }

    fn add_main_record(mut self, tag: RecordTag, id: ContentId, keying: TransactionKeying) -> Self {
        if self.transaction.main_record.contains_key(&tag) {
            self = self.finish_transaction(keying);
        }
        self.transaction.main_record.insert(tag, id);
        self.opened_by.get_or_insert(tag);
        self
    }

    fn add_detail(mut self, id: ContentId) -> Self {
        self.details.push(id);
        self
    }

    /// Flush pending details and file the transaction under its group key.
    /// Runs even when no main record was seen.
    fn finish_transaction(mut self, keying: TransactionKeying) -> Self {
        let details = mem::take(&mut self.details);
        self.transaction.detail_records.insert(RecordTag::SPU, details);

        let key = match keying {
            TransactionKeying::WorkRegistration => RecordTag::NWR,
            TransactionKeying::MainRecord => self.opened_by.unwrap_or(RecordTag::NWR),
        };
        let transaction = mem::take(&mut self.transaction);
        self.group.transactions.entry(key).or_default().push(transaction);
        self.opened_by = None;
        self
    }

    fn finish(self, strict: bool) -> Result<CwrFile> {
        if self.group_open {
            if strict {
                return Err(ConvertError::DanglingGroup(
                    "input ended before group trailer".to_string(),
                ));
            }
            warn!("Input ended inside a group; dropping unterminated group");
        }
        if !self.transaction.main_record.is_empty() || !self.details.is_empty() {
            debug!("Discarding transaction not closed by a group trailer");
        }
        Ok(self.file)
    }
}

/// Reassembles record objects into a [`CwrFile`]
#[derive(Debug, Clone)]
pub struct GraphBuilder {
    keying: TransactionKeying,
    strict_groups: bool,
}

impl GraphBuilder {
    pub fn new(config: &ConverterConfig) -> Self {
        Self {
            keying: config.transaction_keying,
            strict_groups: config.strict_groups,
        }
    }

    /// Fold objects in sequence order
    ///
    /// `objects[i]` must be the object for sequence index `i`. Objects with a
    /// tag outside the supported set leave the state unchanged.
    pub fn build(&self, objects: &[MetaObject]) -> Result<CwrFile> {
        let state = objects.iter().enumerate().try_fold(
            BuildState::default(),
            |state, (index, object)| {
                let tag = object
                    .get_string(RECORD_TYPE_FIELD)
                    .map_err(|e| missing_field(e, RECORD_TYPE_FIELD, index))?;
                match tag.parse::<RecordTag>() {
                    Ok(tag) => state.apply(tag, object.id().clone(), self),
                    Err(_) => Ok(state),
                }
            },
        )?;
        state.finish(self.strict_groups)
    }
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self::new(&ConverterConfig::default())
    }
}
