//! Fixed-width CWR record parsing
//!
//! Every line starts with a 3-byte record tag. Each supported tag has a
//! fixed table of `[start, end)` byte ranges; a range running past the end of
//! the line yields an empty field, so truncated lines never fail to parse.
//! Columns are cut on bytes and decoded lossily, so Latin-1 text survives as
//! replacement characters instead of failing the line.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::str::FromStr;
use thiserror::Error;

/// Record type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RecordTag {
    HDR,
    TRL,
    GRH,
    GRT,
    NWR,
    REV,
    SPU,
}

impl RecordTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordTag::HDR => "HDR",
            RecordTag::TRL => "TRL",
            RecordTag::GRH => "GRH",
            RecordTag::GRT => "GRT",
            RecordTag::NWR => "NWR",
            RecordTag::REV => "REV",
            RecordTag::SPU => "SPU",
        }
    }

    /// `None` for tags outside the supported set
    pub fn from_bytes(tag: &[u8]) -> Option<Self> {
        match tag {
            b"HDR" => Some(RecordTag::HDR),
            b"TRL" => Some(RecordTag::TRL),
            b"GRH" => Some(RecordTag::GRH),
            b"GRT" => Some(RecordTag::GRT),
            b"NWR" => Some(RecordTag::NWR),
            b"REV" => Some(RecordTag::REV),
            b"SPU" => Some(RecordTag::SPU),
            _ => None,
        }
    }

    /// Main record of a work-registration transaction
    pub fn is_work_registration(&self) -> bool {
        matches!(self, RecordTag::NWR | RecordTag::REV)
    }
}

/// Tag outside the supported set
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unsupported record tag: {0:?}")]
pub struct UnknownRecordTag(pub String);

impl FromStr for RecordTag {
    type Err = UnknownRecordTag;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_bytes(s.as_bytes()).ok_or_else(|| UnknownRecordTag(s.to_string()))
    }
}

impl std::fmt::Display for RecordTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// HDR: transmission header
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub sender_type: String,
    pub sender_id: String,
    pub sender_name: String,
}

/// GRH: group header
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupHeader {
    pub transaction_type: String,
    pub group_id: String,
}

/// GRT: group trailer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupTrailer {
    pub group_id: String,
}

/// NWR / REV: work registration, shared by both variants
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkRegistration {
    pub transaction_sequence: String,
    pub record_sequence: String,
    pub title: String,
    pub language_code: String,
    pub submitter_work_number: String,
    pub iswc: String,
    pub copyright_date: String,
    pub distribution_category: String,
    pub duration: String,
    pub recorded_indicator: String,
    pub text_music_relationship: String,
    pub composite_type: String,
    pub version_type: String,
    pub priority_flag: String,
}

/// SPU: publisher controlled by submitter
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublisherControl {
    pub transaction_sequence: String,
    pub record_sequence: String,
    pub publisher_sequence: String,
}

/// Parsed CWR line
///
/// Encodes with a `record_type` field carrying the tag, which is how the
/// graph builder recognizes objects after they come back from the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "record_type")]
pub enum Record {
    #[serde(rename = "HDR")]
    Header(Header),
    #[serde(rename = "TRL")]
    Trailer,
    #[serde(rename = "GRH")]
    GroupHeader(GroupHeader),
    #[serde(rename = "GRT")]
    GroupTrailer(GroupTrailer),
    #[serde(rename = "NWR")]
    NewWork(WorkRegistration),
    #[serde(rename = "REV")]
    RevisedWork(WorkRegistration),
    #[serde(rename = "SPU")]
    PublisherControl(PublisherControl),
}

impl Record {
    /// Parse one line, without its terminator. Unsupported tags return `None`.
    pub fn parse<L: AsRef<[u8]> + ?Sized>(line: &L) -> Option<Record> {
        let line = line.as_ref();
        let record = match RecordTag::from_bytes(column(line, 0, 3))? {
            RecordTag::HDR => Record::Header(Header {
                sender_type: field(line, 3, 6),
                sender_id: field(line, 6, 14),
                sender_name: trimmed(line, 14, 59),
            }),
            RecordTag::TRL => Record::Trailer,
            RecordTag::GRH => Record::GroupHeader(GroupHeader {
                transaction_type: field(line, 3, 6),
                group_id: field(line, 6, 11),
            }),
            RecordTag::GRT => Record::GroupTrailer(GroupTrailer {
                group_id: field(line, 3, 8),
            }),
            RecordTag::NWR => Record::NewWork(WorkRegistration::parse(line)),
            RecordTag::REV => Record::RevisedWork(WorkRegistration::parse(line)),
            RecordTag::SPU => Record::PublisherControl(PublisherControl {
                transaction_sequence: field(line, 3, 12),
                record_sequence: field(line, 12, 19),
                publisher_sequence: field(line, 19, 21),
            }),
        };
        Some(record)
    }

    pub fn tag(&self) -> RecordTag {
        match self {
            Record::Header(_) => RecordTag::HDR,
            Record::Trailer => RecordTag::TRL,
            Record::GroupHeader(_) => RecordTag::GRH,
            Record::GroupTrailer(_) => RecordTag::GRT,
            Record::NewWork(_) => RecordTag::NWR,
            Record::RevisedWork(_) => RecordTag::REV,
            Record::PublisherControl(_) => RecordTag::SPU,
        }
    }
}

impl WorkRegistration {
    fn parse(line: &[u8]) -> Self {
        Self {
            transaction_sequence: field(line, 3, 12),
            record_sequence: field(line, 12, 19),
            title: trimmed(line, 19, 79),
            language_code: field(line, 79, 81),
            submitter_work_number: field(line, 81, 95),
            iswc: field(line, 95, 106),
            copyright_date: field(line, 106, 113),
            distribution_category: field(line, 127, 129),
            duration: field(line, 129, 135),
            recorded_indicator: field(line, 135, 136),
            text_music_relationship: field(line, 136, 139),
            composite_type: field(line, 140, 142),
            version_type: field(line, 142, 145),
            priority_flag: field(line, 259, 260),
        }
    }
}

// Whole range or nothing
fn column(line: &[u8], start: usize, end: usize) -> &[u8] {
    line.get(start..end).unwrap_or(&[])
}

fn decoded(line: &[u8], start: usize, end: usize) -> Cow<'_, str> {
    String::from_utf8_lossy(column(line, start, end))
}

fn field(line: &[u8], start: usize, end: usize) -> String {
    decoded(line, start, end).into_owned()
}

fn trimmed(line: &[u8], start: usize, end: usize) -> String {
    decoded(line, start, end).trim().to_string()
}
