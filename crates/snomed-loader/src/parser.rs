//! Streaming reader for tab-delimited RF2 files: validates headers against
//! the concrete record type's expected columns, then yields parsed,
//! filtered records one at a time rather than loading a whole release file
//! into memory.

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::marker::PhantomData;
use std::path::Path;

use csv::{Reader, ReaderBuilder, StringRecord};
use snomed_types::SctId;

use crate::types::{Rf2Config, Rf2Error, Rf2Result};

/// A record type that can be parsed out of one RF2 row.
pub trait Rf2Record: Sized {
    const EXPECTED_COLUMNS: &'static [&'static str];

    fn from_record(record: &StringRecord) -> Rf2Result<Self>;

    fn passes_filter(&self, config: &Rf2Config) -> bool;
}

pub struct Rf2Parser<R: Read, T: Rf2Record> {
    reader: Reader<R>,
    config: Rf2Config,
    records_read: usize,
    _marker: PhantomData<T>,
}

impl<T: Rf2Record> Rf2Parser<BufReader<File>, T> {
    pub fn from_path<P: AsRef<Path>>(path: P, config: Rf2Config) -> Rf2Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Rf2Error::FileNotFound { path: path.display().to_string() });
        }

        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file), config)
    }

    /// Fast newline count for progress reporting; the header row doesn't count.
    pub fn count_lines<P: AsRef<Path>>(path: P) -> Rf2Result<usize> {
        let file = File::open(path.as_ref())?;
        let count = BufReader::new(file).lines().count();
        Ok(count.saturating_sub(1))
    }
}

impl<R: Read, T: Rf2Record> Rf2Parser<R, T> {
    pub fn from_reader(reader: R, config: Rf2Config) -> Rf2Result<Self> {
        let mut csv_reader =
            ReaderBuilder::new().delimiter(b'\t').has_headers(true).flexible(false).trim(csv::Trim::None).from_reader(reader);

        Self::validate_headers(&mut csv_reader)?;

        Ok(Self { reader: csv_reader, config, records_read: 0, _marker: PhantomData })
    }

    fn validate_headers(reader: &mut Reader<R>) -> Rf2Result<()> {
        let headers = reader.headers()?;
        let expected = T::EXPECTED_COLUMNS;

        if headers.len() < expected.len() {
            return Err(Rf2Error::InvalidHeader { expected: expected.len(), found: headers.len() });
        }

        for (i, expected_col) in expected.iter().enumerate() {
            let found = headers.get(i).unwrap_or("");
            let found = found.trim_start_matches('\u{feff}'); // strip a leading UTF-8 BOM
            if found != *expected_col {
                return Err(Rf2Error::UnexpectedColumn { position: i, expected: expected_col.to_string(), found: found.to_string() });
            }
        }

        Ok(())
    }

    pub fn records_read(&self) -> usize {
        self.records_read
    }

    pub fn config(&self) -> &Rf2Config {
        &self.config
    }

    /// Collects every record that passes the filter into memory at once.
    pub fn parse_all(mut self) -> Rf2Result<Vec<T>> {
        let mut results = Vec::new();
        for record in self.by_ref().flatten() {
            results.push(record);
        }
        Ok(results)
    }

    /// Drains the file in fixed-size batches, handing each to `callback` as
    /// it fills, so a caller can bound peak memory on a large release file.
    pub fn parse_batched<F>(mut self, mut callback: F) -> Rf2Result<usize>
    where
        F: FnMut(Vec<T>) -> Rf2Result<()>,
    {
        let batch_size = self.config.batch_size;
        let mut batch = Vec::with_capacity(batch_size);
        let mut total = 0;

        for record in self.by_ref().flatten() {
            batch.push(record);
            if batch.len() >= batch_size {
                total += batch.len();
                callback(std::mem::take(&mut batch))?;
                batch = Vec::with_capacity(batch_size);
            }
        }

        if !batch.is_empty() {
            total += batch.len();
            callback(batch)?;
        }

        Ok(total)
    }
}

impl<R: Read, T: Rf2Record> Iterator for Rf2Parser<R, T> {
    type Item = Rf2Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let mut record = StringRecord::new();
            match self.reader.read_record(&mut record) {
                Ok(true) => {
                    self.records_read += 1;

                    if record.is_empty() || record.iter().all(|f| f.trim().is_empty()) {
                        continue;
                    }

                    match T::from_record(&record) {
                        Ok(parsed) => {
                            if parsed.passes_filter(&self.config) {
                                return Some(Ok(parsed));
                            }
                            continue;
                        }
                        Err(e) => return Some(Err(e)),
                    }
                }
                Ok(false) => return None,
                Err(e) => return Some(Err(e.into())),
            }
        }
    }
}

/// Column-value parsers shared by every `Rf2Record` impl.
pub mod parse {
    use super::{Rf2Error, Rf2Result, SctId};

    pub fn sctid(value: &str) -> Rf2Result<SctId> {
        value.parse::<i64>().map_err(|_| Rf2Error::InvalidSctId { value: value.to_string() })
    }

    /// Some RF2 fields carry the term alongside the id in pipe notation,
    /// e.g. `71388002 |Procedure (procedure)|` — this reads just the id.
    pub fn sctid_with_term(value: &str) -> Rf2Result<SctId> {
        let numeric_part = value.split_whitespace().next().unwrap_or("");
        if numeric_part.is_empty() {
            return Err(Rf2Error::InvalidSctId { value: value.to_string() });
        }

        numeric_part.parse::<i64>().map_err(|_| Rf2Error::InvalidSctId { value: value.to_string() })
    }

    pub fn boolean(value: &str) -> Rf2Result<bool> {
        match value {
            "0" => Ok(false),
            "1" => Ok(true),
            _ => Err(Rf2Error::InvalidBoolean { value: value.to_string() }),
        }
    }

    pub fn effective_time(value: &str) -> Rf2Result<u32> {
        if value.len() != 8 {
            return Err(Rf2Error::InvalidDate { value: value.to_string() });
        }
        value.parse::<u32>().map_err(|_| Rf2Error::InvalidDate { value: value.to_string() })
    }

    pub fn integer<T: std::str::FromStr>(value: &str) -> Rf2Result<T> {
        value.parse::<T>().map_err(|_| Rf2Error::InvalidInteger { value: value.to_string() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sctid_rejects_non_numeric_input() {
        assert_eq!(parse::sctid("404684003").unwrap(), 404684003i64);
        assert_eq!(parse::sctid("900000000000207008").unwrap(), 900000000000207008i64);
        assert!(parse::sctid("not_a_number").is_err());
        assert!(parse::sctid("").is_err());
    }

    #[test]
    fn sctid_with_term_reads_only_the_numeric_prefix() {
        assert_eq!(parse::sctid_with_term("71388002 |Procedure (procedure)|").unwrap(), 71388002i64);
        assert!(parse::sctid_with_term("").is_err());
    }

    #[test]
    fn boolean_accepts_only_zero_or_one() {
        assert!(!parse::boolean("0").unwrap());
        assert!(parse::boolean("1").unwrap());
        assert!(parse::boolean("true").is_err());
        assert!(parse::boolean("2").is_err());
    }

    #[test]
    fn effective_time_requires_eight_digits() {
        assert_eq!(parse::effective_time("20020131").unwrap(), 20020131u32);
        assert_eq!(parse::effective_time("20251201").unwrap(), 20251201u32);
        assert!(parse::effective_time("2020-01-31").is_err());
        assert!(parse::effective_time("2002013").is_err());
    }

    #[test]
    fn integer_is_generic_over_the_target_type() {
        assert_eq!(parse::integer::<u16>("0").unwrap(), 0u16);
        assert_eq!(parse::integer::<u16>("123").unwrap(), 123u16);
        assert!(parse::integer::<u16>("abc").is_err());
    }
}
