//! Wire types for the pprof `profile.proto` container, plus raw decoding.
//!
//! Only the messages the cost-table builder reads are declared in full; everything is
//! derived with `prost` so no code generation step is needed.

use prost::Message;

use std::borrow::Cow;
use std::io::Read;
use std::path::Path;

use crate::{IoContext, ProfError, ProfResult};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Profile {
    #[prost(message, repeated, tag = "1")]
    pub sample_types: Vec<ValueType>,
    #[prost(message, repeated, tag = "2")]
    pub samples: Vec<Sample>,
    #[prost(message, repeated, tag = "3")]
    pub mappings: Vec<Mapping>,
    #[prost(message, repeated, tag = "4")]
    pub locations: Vec<Location>,
    #[prost(message, repeated, tag = "5")]
    pub functions: Vec<Function>,
    #[prost(string, repeated, tag = "6")]
    pub string_table: Vec<String>,
    #[prost(int64, tag = "7")]
    pub drop_frames: i64,
    #[prost(int64, tag = "8")]
    pub keep_frames: i64,
    #[prost(int64, tag = "9")]
    pub time_nanos: i64,
    #[prost(int64, tag = "10")]
    pub duration_nanos: i64,
    #[prost(message, optional, tag = "11")]
    pub period_type: Option<ValueType>,
    #[prost(int64, tag = "12")]
    pub period: i64,
    #[prost(int64, repeated, tag = "13")]
    pub comment: Vec<i64>,
    #[prost(int64, tag = "14")]
    pub default_sample_type: i64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Sample {
    /// Leaf first.
    #[prost(uint64, repeated, tag = "1")]
    pub location_ids: Vec<u64>,
    #[prost(int64, repeated, tag = "2")]
    pub values: Vec<i64>,
    #[prost(message, repeated, tag = "3")]
    pub labels: Vec<Label>,
}

#[derive(Copy, Clone, PartialEq, ::prost::Message)]
pub struct ValueType {
    #[prost(int64, tag = "1")]
    pub r#type: i64,
    #[prost(int64, tag = "2")]
    pub unit: i64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Label {
    #[prost(int64, tag = "1")]
    pub key: i64,
    #[prost(int64, tag = "2")]
    pub str: i64,
    #[prost(int64, tag = "3")]
    pub num: i64,
    #[prost(int64, tag = "4")]
    pub num_unit: i64,
}

#[derive(Copy, Clone, PartialEq, ::prost::Message)]
pub struct Mapping {
    #[prost(uint64, tag = "1")]
    pub id: u64,
    #[prost(uint64, tag = "2")]
    pub memory_start: u64,
    #[prost(uint64, tag = "3")]
    pub memory_limit: u64,
    #[prost(uint64, tag = "4")]
    pub file_offset: u64,
    #[prost(int64, tag = "5")]
    pub filename: i64,
    #[prost(int64, tag = "6")]
    pub build_id: i64,
    #[prost(bool, tag = "7")]
    pub has_functions: bool,
    #[prost(bool, tag = "8")]
    pub has_filenames: bool,
    #[prost(bool, tag = "9")]
    pub has_line_numbers: bool,
    #[prost(bool, tag = "10")]
    pub has_inline_frames: bool,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Location {
    #[prost(uint64, tag = "1")]
    pub id: u64,
    #[prost(uint64, tag = "2")]
    pub mapping_id: u64,
    #[prost(uint64, tag = "3")]
    pub address: u64,
    /// Innermost inlined frame first; the last entry is the caller.
    #[prost(message, repeated, tag = "4")]
    pub lines: Vec<Line>,
    #[prost(bool, tag = "5")]
    pub is_folded: bool,
}

#[derive(Copy, Clone, PartialEq, ::prost::Message)]
pub struct Line {
    #[prost(uint64, tag = "1")]
    pub function_id: u64,
    #[prost(int64, tag = "2")]
    pub line: i64,
}

#[derive(Copy, Clone, PartialEq, ::prost::Message)]
pub struct Function {
    #[prost(uint64, tag = "1")]
    pub id: u64,
    #[prost(int64, tag = "2")]
    pub name: i64,
    #[prost(int64, tag = "3")]
    pub system_name: i64,
    #[prost(int64, tag = "4")]
    pub filename: i64,
}

impl Profile {
    /// Resolves a string-table index; out-of-range indexes are reported against `source`.
    pub fn string_at(&self, index: i64, source: &Path) -> ProfResult<&str> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.string_table.get(i))
            .map(String::as_str)
            .ok_or_else(|| {
                ProfError::decode(
                    source,
                    format!(
                        "string index {index} out of range (table has {} entries)",
                        self.string_table.len()
                    ),
                )
            })
    }
}

pub fn read_profile(path: &Path) -> ProfResult<Profile> {
    let bytes = std::fs::read(path).with_path("read", path)?;
    decode_profile(path, &bytes)
}

/// Decodes raw or gzip-wrapped profile bytes. `path` is only used for error context.
pub fn decode_profile(path: &Path, bytes: &[u8]) -> ProfResult<Profile> {
    let raw: Cow<'_, [u8]> = if bytes.starts_with(&GZIP_MAGIC) {
        let mut decoder = libflate::gzip::Decoder::new(bytes)
            .map_err(|e| ProfError::decode(path, format!("invalid gzip header: {e}")))?;
        let mut out = Vec::new();
        decoder
            .read_to_end(&mut out)
            .map_err(|e| ProfError::decode(path, format!("truncated gzip stream: {e}")))?;
        Cow::Owned(out)
    } else {
        Cow::Borrowed(bytes)
    };
    Profile::decode(raw.as_ref()).map_err(|e| ProfError::decode(path, e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn tiny_profile() -> Profile {
        Profile {
            string_table: vec![String::new(), "main.work".to_string()],
            functions: vec![Function {
                id: 1,
                name: 1,
                ..Default::default()
            }],
            locations: vec![Location {
                id: 1,
                lines: vec![Line {
                    function_id: 1,
                    line: 10,
                }],
                ..Default::default()
            }],
            samples: vec![Sample {
                location_ids: vec![1],
                values: vec![42],
                labels: Vec::new(),
            }],
            ..Default::default()
        }
    }

    #[test]
    fn decodes_plain_and_gzip_wrapped_bytes() {
        let profile = tiny_profile();
        let plain = profile.encode_to_vec();

        let mut encoder = libflate::gzip::Encoder::new(Vec::new()).expect("encoder");
        encoder.write_all(&plain).expect("write");
        let gzipped = encoder.finish().into_result().expect("finish");
        assert!(gzipped.starts_with(&GZIP_MAGIC));

        let path = Path::new("cpu.out");
        assert_eq!(decode_profile(path, &plain).expect("plain"), profile);
        assert_eq!(decode_profile(path, &gzipped).expect("gzip"), profile);
    }

    #[test]
    fn truncated_gzip_is_decode_error_with_path() {
        let plain = tiny_profile().encode_to_vec();
        let mut encoder = libflate::gzip::Encoder::new(Vec::new()).expect("encoder");
        encoder.write_all(&plain).expect("write");
        let gzipped = encoder.finish().into_result().expect("finish");
        let cut = &gzipped[..gzipped.len() / 2];

        match decode_profile(Path::new("bench/t/bin/B/B_cpu.out"), cut).expect_err("must fail") {
            ProfError::Decode { file, .. } => {
                assert_eq!(file, Path::new("bench/t/bin/B/B_cpu.out"))
            }
            other => panic!("expected decode error, got {other:?}"),
        }
    }

    #[test]
    fn garbage_is_decode_error() {
        let err = decode_profile(Path::new("x.out"), &[0xff, 0xff, 0xff, 0xff]).expect_err("must fail");
        assert!(matches!(err, ProfError::Decode { .. }), "got {err:?}");
    }

    #[test]
    fn unreadable_file_is_io_error() {
        let path = std::env::temp_dir().join(format!("proftrack-pprof-{}.out", uuid::Uuid::new_v4()));
        match read_profile(&path).expect_err("must fail") {
            ProfError::FileIo { op, path: p, .. } => {
                assert_eq!(op, "read");
                assert_eq!(p, path);
            }
            other => panic!("expected io error, got {other:?}"),
        }
    }

    #[test]
    fn string_at_rejects_out_of_range() {
        let profile = tiny_profile();
        assert_eq!(profile.string_at(1, Path::new("x")).expect("in range"), "main.work");
        assert!(profile.string_at(9, Path::new("x")).is_err());
        assert!(profile.string_at(-1, Path::new("x")).is_err());
    }
}
