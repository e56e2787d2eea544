//! MARC record parser
//!
//! Parses raw MARC21 data (ISO 2709) into a structured representation.

use std::collections::HashMap;

/// A MARC record containing leader and fields
#[derive(Debug, Clone, Default)]
pub struct MarcRecord {
    /// The 24-character record leader
    pub leader: String,
    /// Control fields (00X)
    pub control_fields: HashMap<String, String>,
    /// Data fields with indicators and subfields
    pub data_fields: Vec<DataField>,
}

/// A MARC data field (010-999)
#[derive(Debug, Clone)]
pub struct DataField {
    /// Field tag (3 characters)
    pub tag: String,
    /// First indicator
    pub ind1: char,
    /// Second indicator
    pub ind2: char,
    /// Subfields
    pub subfields: Vec<Subfield>,
}

/// A MARC subfield
#[derive(Debug, Clone)]
pub struct Subfield {
    /// Subfield code (single character)
    pub code: char,
    /// Subfield data
    pub data: String,
}

impl MarcRecord {
    /// Parse a MARC record from raw bytes (ISO 2709 format)
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < 24 {
            return None;
        }

        // Parse leader
        let leader = String::from_utf8_lossy(&data[0..24]).to_string();

        // Get base address of data
        let base_address: usize = String::from_utf8_lossy(&data[12..17]).parse().ok()?;
        if base_address < 25 || base_address > data.len() {
            return None;
        }

        // Parse directory (between leader and record separator)
        let directory_data = &data[24..base_address - 1];
        let mut control_fields = HashMap::new();
        let mut data_fields = Vec::new();

        // Each directory entry is 12 bytes: tag(3) + length(4) + start(5)
        let mut pos = 0;
        while pos + 12 <= directory_data.len() {
            let entry = &directory_data[pos..pos + 12];
            let tag = String::from_utf8_lossy(&entry[0..3]).to_string();
            let length: usize = String::from_utf8_lossy(&entry[3..7]).parse().ok()?;
            let start: usize = String::from_utf8_lossy(&entry[7..12]).parse().ok()?;

            // Get field data
            let field_start = base_address + start;
            let field_end = field_start + length.saturating_sub(1); // -1 for field terminator

            if field_start <= field_end && field_end <= data.len() {
                let field_data = &data[field_start..field_end];

                if tag.starts_with("00") {
                    // Control field
                    control_fields.insert(tag, String::from_utf8_lossy(field_data).to_string());
                } else {
                    // Data field
                    if let Some(data_field) = Self::parse_data_field(&tag, field_data) {
                        data_fields.push(data_field);
                    }
                }
            }

            pos += 12;
        }

        Some(MarcRecord {
            leader,
            control_fields,
            data_fields,
        })
    }

    /// Parse a data field from raw bytes
    fn parse_data_field(tag: &str, data: &[u8]) -> Option<DataField> {
        if data.len() < 2 {
            return None;
        }

        let ind1 = data[0] as char;
        let ind2 = data[1] as char;

        let mut subfields = Vec::new();
        let subfield_data = &data[2..];

        // Subfields are separated by 0x1F (unit separator)
        for part in subfield_data.split(|&b| b == 0x1F) {
            if part.is_empty() {
                continue;
            }
            let code = part[0] as char;
            let data = String::from_utf8_lossy(&part[1..]).to_string();
            subfields.push(Subfield { code, data });
        }

        Some(DataField {
            tag: tag.to_string(),
            ind1,
            ind2,
            subfields,
        })
    }

    /// Get a control field value
    pub fn control_field(&self, tag: &str) -> Option<&str> {
        self.control_fields.get(tag).map(String::as_str)
    }

    /// Get the first data field with a given tag
    pub fn first_field(&self, tag: &str) -> Option<&DataField> {
        self.data_fields.iter().find(|f| f.tag == tag)
    }

    /// Get all data fields with a specific tag, in record order
    pub fn fields<'a>(&'a self, tag: &str) -> impl Iterator<Item = &'a DataField> + 'a {
        let tag = tag.to_string();
        self.data_fields.iter().filter(move |f| f.tag == tag)
    }

    /// Get the first subfield value for a tag/code pair anywhere in the record
    pub fn subfield(&self, tag: &str, code: char) -> Option<&str> {
        self.fields(tag).find_map(|f| f.subfield(code))
    }
}

impl DataField {
    /// Get a subfield value by code
    pub fn subfield(&self, code: char) -> Option<&str> {
        self.subfields
            .iter()
            .find(|sf| sf.code == code)
            .map(|sf| sf.data.as_str())
    }

    /// Get all subfield values for a code
    pub fn all_subfields(&self, code: char) -> Vec<&str> {
        self.subfields
            .iter()
            .filter(|sf| sf.code == code)
            .map(|sf| sf.data.as_str())
            .collect()
    }

    /// Join the values of the given subfield codes, in code order, with spaces
    pub fn joined_subfields(&self, codes: &str) -> String {
        let mut values = Vec::new();
        for code in codes.chars() {
            if let Some(value) = self.subfield(code) {
                values.push(value);
            }
        }
        values.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Build a minimal ISO 2709 record from (tag, field-body) pairs.
    fn build_record(fields: &[(&str, Vec<u8>)]) -> Vec<u8> {
        let mut directory = Vec::new();
        let mut body = Vec::new();
        for (tag, field) in fields {
            let mut data = field.clone();
            data.push(0x1E); // field terminator
            directory.extend_from_slice(
                format!("{}{:04}{:05}", tag, data.len(), body.len()).as_bytes(),
            );
            body.extend_from_slice(&data);
        }
        directory.push(0x1E);
        body.push(0x1D); // record terminator

        let base_address = 24 + directory.len();
        let total = base_address + body.len();
        let mut record = format!("{:05}nam a22{:05}   4500", total, base_address).into_bytes();
        record.extend_from_slice(&directory);
        record.extend_from_slice(&body);
        record
    }

    fn data_field(subfields: &[(char, &str)]) -> Vec<u8> {
        let mut field = vec![b' ', b' '];
        for (code, value) in subfields {
            field.push(0x1F);
            field.push(*code as u8);
            field.extend_from_slice(value.as_bytes());
        }
        field
    }

    #[test]
    fn test_parse_empty() {
        assert!(MarcRecord::from_bytes(&[]).is_none());
    }

    #[test]
    fn test_parse_short() {
        assert!(MarcRecord::from_bytes(&[0; 20]).is_none());
    }

    #[test]
    fn test_parse_control_and_data_fields() {
        let raw = build_record(&[
            ("001", b"12345678".to_vec()),
            ("245", data_field(&[('a', "Annals of mathematics"), ('b', "second series.")])),
        ]);
        let record = MarcRecord::from_bytes(&raw).expect("record should parse");

        assert_eq!(record.control_field("001"), Some("12345678"));
        assert_eq!(record.subfield("245", 'a'), Some("Annals of mathematics"));
        assert_eq!(record.subfield("245", 'b'), Some("second series."));
        assert_eq!(record.subfield("245", 'z'), None);
    }

    #[test]
    fn test_repeated_fields_preserve_order() {
        let raw = build_record(&[
            ("866", data_field(&[('0', "h1"), ('a', "v.1-10")])),
            ("866", data_field(&[('0', "h1"), ('a', "v.11-20")])),
        ]);
        let record = MarcRecord::from_bytes(&raw).expect("record should parse");

        let values: Vec<_> = record
            .fields("866")
            .filter_map(|f| f.subfield('a'))
            .collect();
        assert_eq!(values, vec!["v.1-10", "v.11-20"]);
    }

    #[test]
    fn test_joined_subfields() {
        let raw = build_record(&[("050", data_field(&[('a', "QA1"), ('b', ".A6")]))]);
        let record = MarcRecord::from_bytes(&raw).expect("record should parse");
        let field = record.first_field("050").unwrap();
        assert_eq!(field.joined_subfields("ab"), "QA1 .A6");
    }
}
