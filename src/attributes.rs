//! Attribute tables keyed by record index.
//!
//! Layers only need two things from attributes: resolving a field name to a
//! column, and reading a cell as a string. [`DbfTable`] serves the `.dbf`
//! file that sits beside a shapefile; [`MemoryTable`] serves rows built in
//! code.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};

use camino::{Utf8Path, Utf8PathBuf};
use dbase::FieldValue;
use encoding_rs::Encoding;

use crate::errors::ShapefileError;
use crate::log::debug;

/// Columnar attribute store.
pub trait AttributeTable {
    fn field_names(&self) -> Vec<String>;

    fn num_records(&self) -> usize;

    /// Case-insensitive column lookup.
    fn field_index(&self, name: &str) -> Option<usize> {
        self.field_names()
            .iter()
            .position(|f| f.eq_ignore_ascii_case(name))
    }

    fn read_string(&mut self, record: usize, field: usize) -> Result<String, ShapefileError>;

    /// Values of several columns for one record, in the order given.
    fn read_values(&mut self, record: usize, fields: &[usize]) -> Result<Vec<String>, ShapefileError> {
        fields.iter().map(|&f| self.read_string(record, f)).collect()
    }
}

fn attribute_error(message: impl Into<String>) -> ShapefileError {
    ShapefileError::Attributes {
        message: message.into(),
    }
}

// ============================================================================
// In-memory table
// ============================================================================

#[derive(Clone, Debug, Default, PartialEq)]
pub struct MemoryTable {
    fields: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl MemoryTable {
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        MemoryTable {
            fields: fields.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Append a row; missing trailing cells read as empty strings.
    pub fn with_row<I, S>(mut self, row: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rows.push(row.into_iter().map(Into::into).collect());
        self
    }
}

impl AttributeTable for MemoryTable {
    fn field_names(&self) -> Vec<String> {
        self.fields.clone()
    }

    fn num_records(&self) -> usize {
        self.rows.len()
    }

    fn read_string(&mut self, record: usize, field: usize) -> Result<String, ShapefileError> {
        if field >= self.fields.len() {
            return Err(attribute_error(format!("field {field} does not exist")));
        }
        let row = self
            .rows
            .get(record)
            .ok_or_else(|| attribute_error(format!("record {record} does not exist")))?;
        Ok(row.get(field).cloned().unwrap_or_default())
    }
}

// ============================================================================
// dBASE table
// ============================================================================

/// Offset of the language driver id in a dBASE header.
const LDID_OFFSET: usize = 29;

/// Code page named by a dBASE language driver id. `None` for ids that are
/// unset or unknown; those tables are read as UTF-8.
pub fn ldid_encoding(ldid: u8) -> Option<&'static Encoding> {
    let encoding = match ldid {
        0x03 | 0x57 | 0x58 | 0x59 => encoding_rs::WINDOWS_1252,
        0xc8 => encoding_rs::WINDOWS_1250,
        0xc9 => encoding_rs::WINDOWS_1251,
        0xcb => encoding_rs::WINDOWS_1253,
        0xca => encoding_rs::WINDOWS_1254,
        0x7d => encoding_rs::WINDOWS_1255,
        0x7e => encoding_rs::WINDOWS_1256,
        0xcc => encoding_rs::WINDOWS_1257,
        0x26 | 0x65 => encoding_rs::IBM866,
        0x13 | 0x7b => encoding_rs::SHIFT_JIS,
        0x4d | 0x7a => encoding_rs::GBK,
        0x4e | 0x79 => encoding_rs::EUC_KR,
        0x4f | 0x78 => encoding_rs::BIG5,
        _ => return None,
    };
    Some(encoding)
}

/// Read-only dBASE table. Records are loaded when the table is opened.
#[derive(Debug)]
pub struct DbfTable {
    path: Utf8PathBuf,
    fields: Vec<String>,
    records: Vec<dbase::Record>,
}

impl DbfTable {
    pub fn open(path: impl AsRef<Utf8Path>) -> Result<Self, ShapefileError> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|source| ShapefileError::Io {
            path: path.clone(),
            source,
        })?;
        Self::from_reader(BufReader::new(file), path)
    }

    /// Decode a table, picking the text encoding from the header's
    /// language driver id.
    pub fn from_reader<R: Read + Seek>(mut reader: R, path: Utf8PathBuf) -> Result<Self, ShapefileError> {
        let mut head = [0u8; 32];
        reader
            .read_exact(&mut head)
            .and_then(|_| reader.seek(SeekFrom::Start(0)))
            .map_err(|_| attribute_error(format!("{path}: truncated dBASE header")))?;
        let dbf_error = |e: dbase::Error| attribute_error(format!("{path}: {e}"));

        let ldid = head[LDID_OFFSET];
        let mut dbf = match ldid_encoding(ldid) {
            Some(encoding) => {
                debug!(%path, ldid, encoding = encoding.name(), "dBASE code page");
                dbase::Reader::new_with_encoding(reader, dbase::encoding::EncodingRs::from(encoding))
            }
            None => dbase::Reader::new(reader),
        }
        .map_err(dbf_error)?;

        let fields = dbf.fields().iter().map(|f| f.name().to_string()).collect();
        let records = dbf.read().map_err(dbf_error)?;
        Ok(DbfTable { path, fields, records })
    }
}

/// Text form of a cell, as the layer filter and tile locations expect it.
fn cell_text(value: &FieldValue) -> String {
    match value {
        FieldValue::Character(Some(s)) => s.trim().to_string(),
        FieldValue::Memo(s) => s.trim().to_string(),
        FieldValue::Numeric(Some(n)) => n.to_string(),
        FieldValue::Float(Some(n)) => n.to_string(),
        FieldValue::Integer(n) => n.to_string(),
        FieldValue::Double(n) | FieldValue::Currency(n) => n.to_string(),
        FieldValue::Logical(Some(b)) => String::from(if *b { "T" } else { "F" }),
        FieldValue::Date(Some(d)) => format!("{:04}{:02}{:02}", d.year(), d.month(), d.day()),
        _ => String::new(),
    }
}

impl AttributeTable for DbfTable {
    fn field_names(&self) -> Vec<String> {
        self.fields.clone()
    }

    fn num_records(&self) -> usize {
        self.records.len()
    }

    fn read_string(&mut self, record: usize, field: usize) -> Result<String, ShapefileError> {
        let Some(name) = self.fields.get(field) else {
            return Err(attribute_error(format!("field {field} does not exist")));
        };
        let row = self
            .records
            .get(record)
            .ok_or_else(|| attribute_error(format!("{}: record {record} does not exist", self.path)))?;
        Ok(row.get(name).map(cell_text).unwrap_or_default())
    }
}
