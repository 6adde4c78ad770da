//! Kernel event datagram parser.
//!
//! A uevent datagram is a bounded sequence of NUL-separated ASCII records.
//! Parsing is a single pass over the records against a declarative table
//! of recognized key prefixes; the output is a plain field table consumed
//! by independent handlers. Parsing knows nothing about dispatch.

use std::collections::HashMap;

/// Maximum accepted datagram length; matches the kernel-side buffer that
/// all uevent consumers use.
pub const UEVENT_MSG_LEN: usize = 2048;

/// Recognized uevent fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKey {
    Driver,
    DevPath,
    Subsystem,
    Product,
    MicBreakStatus,
    MicDegradeStatus,
    GpuEventType,
    GpuEventInfo,
    ThermalAbnormalType,
    ThermalAbnormalInfo,
    TypeCPartner,
}

/// Ordered prefix table: first match wins per record. Records matching no
/// prefix are ignored without error.
const RECOGNIZED: &[(&str, FieldKey)] = &[
    ("DRIVER=", FieldKey::Driver),
    ("DEVPATH=", FieldKey::DevPath),
    ("SUBSYSTEM=", FieldKey::Subsystem),
    ("PRODUCT=", FieldKey::Product),
    ("MIC_BREAK_STATUS=", FieldKey::MicBreakStatus),
    ("MIC_DEGRADE_STATUS=", FieldKey::MicDegradeStatus),
    ("GPU_UEVENT_TYPE=", FieldKey::GpuEventType),
    ("GPU_UEVENT_INFO=", FieldKey::GpuEventInfo),
    ("THERMAL_ABNORMAL_TYPE=", FieldKey::ThermalAbnormalType),
    ("THERMAL_ABNORMAL_INFO=", FieldKey::ThermalAbnormalInfo),
];

/// Default Type-C partner announcement prefix.
pub const DEFAULT_TYPEC_PARTNER_PREFIX: &str = "POWER_SUPPLY_NAME=tcpm-source-psy-";

/// Transient key/value table for one decoded datagram.
///
/// Fields absent from the datagram are absent from the table; downstream
/// handlers check for the fields they need.
#[derive(Debug, Clone, Default)]
pub struct FieldTable {
    fields: HashMap<FieldKey, String>,
}

impl FieldTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: FieldKey) -> Option<&str> {
        self.fields.get(&key).map(String::as_str)
    }

    pub fn contains(&self, key: FieldKey) -> bool {
        self.fields.contains_key(&key)
    }

    pub fn set(&mut self, key: FieldKey, value: impl Into<String>) {
        self.fields.insert(key, value.into());
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Datagram decoder with a configurable Type-C partner prefix.
#[derive(Debug, Clone)]
pub struct UeventParser {
    typec_partner_prefix: String,
}

impl Default for UeventParser {
    fn default() -> Self {
        Self {
            typec_partner_prefix: DEFAULT_TYPEC_PARTNER_PREFIX.to_string(),
        }
    }
}

impl UeventParser {
    pub fn new(typec_partner_prefix: impl Into<String>) -> Self {
        Self {
            typec_partner_prefix: typec_partner_prefix.into(),
        }
    }

    /// Decode one datagram into a field table.
    ///
    /// Tolerant of truncation: a buffer lacking the terminating empty
    /// record is still valid up to the last well-formed record. Records
    /// with non-UTF-8 bytes are skipped.
    pub fn parse(&self, datagram: &[u8]) -> FieldTable {
        let mut table = FieldTable::new();

        for record in datagram.split(|&b| b == 0) {
            if record.is_empty() {
                continue;
            }
            let Ok(record) = std::str::from_utf8(record) else {
                continue;
            };

            if let Some((prefix, key)) = RECOGNIZED
                .iter()
                .find(|(prefix, _)| record.starts_with(prefix))
            {
                table.set(*key, &record[prefix.len()..]);
            } else if record.starts_with(&self.typec_partner_prefix) {
                table.set(
                    FieldKey::TypeCPartner,
                    &record[self.typec_partner_prefix.len()..],
                );
            }
        }

        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn datagram(records: &[&str]) -> Vec<u8> {
        let mut buf = Vec::new();
        for r in records {
            buf.extend_from_slice(r.as_bytes());
            buf.push(0);
        }
        buf.push(0); // terminating empty record
        buf
    }

    #[test]
    fn single_driver_record_populates_one_field() {
        let parser = UeventParser::default();
        let table = parser.parse(&datagram(&["DRIVER=x"]));
        assert_eq!(table.len(), 1);
        assert_eq!(table.get(FieldKey::Driver), Some("x"));
        assert!(table.get(FieldKey::DevPath).is_none());
    }

    #[test]
    fn recognized_fields_are_extracted_and_others_ignored() {
        let parser = UeventParser::default();
        let table = parser.parse(&datagram(&[
            "add@/devices/platform/soc/audio",
            "ACTION=add",
            "DEVPATH=/devices/platform/soc/audio",
            "SUBSYSTEM=sound",
            "MIC_BREAK_STATUS=true",
            "SEQNUM=4711",
        ]));
        assert_eq!(table.len(), 3);
        assert_eq!(
            table.get(FieldKey::DevPath),
            Some("/devices/platform/soc/audio")
        );
        assert_eq!(table.get(FieldKey::Subsystem), Some("sound"));
        assert_eq!(table.get(FieldKey::MicBreakStatus), Some("true"));
    }

    #[test]
    fn truncated_datagram_without_trailing_nul_still_parses() {
        let parser = UeventParser::default();
        let mut buf = Vec::new();
        buf.extend_from_slice(b"DRIVER=google,battery");
        buf.push(0);
        buf.extend_from_slice(b"SUBSYSTEM=power_supply"); // no terminator
        let table = parser.parse(&buf);
        assert_eq!(table.get(FieldKey::Driver), Some("google,battery"));
        assert_eq!(table.get(FieldKey::Subsystem), Some("power_supply"));
    }

    #[test]
    fn later_record_overwrites_earlier_slot() {
        let parser = UeventParser::default();
        let table = parser.parse(&datagram(&["DRIVER=first", "DRIVER=second"]));
        assert_eq!(table.get(FieldKey::Driver), Some("second"));
    }

    #[test]
    fn non_utf8_record_is_skipped() {
        let parser = UeventParser::default();
        let mut buf = Vec::new();
        buf.extend_from_slice(b"DRIVER=ok");
        buf.push(0);
        buf.extend_from_slice(&[0x44, 0x52, 0xff, 0xfe, 0x01]);
        buf.push(0);
        let table = parser.parse(&buf);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn typec_partner_prefix_is_configurable() {
        let parser = UeventParser::new("POWER_SUPPLY_NAME=custom-psy-");
        let table = parser.parse(&datagram(&["POWER_SUPPLY_NAME=custom-psy-7"]));
        assert!(table.contains(FieldKey::TypeCPartner));
        assert_eq!(table.get(FieldKey::TypeCPartner), Some("7"));
    }

    #[test]
    fn empty_datagram_is_empty_table() {
        let parser = UeventParser::default();
        assert!(parser.parse(&[]).is_empty());
        assert!(parser.parse(&[0, 0]).is_empty());
    }
}
