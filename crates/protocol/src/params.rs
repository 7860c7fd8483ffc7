use std::collections::HashMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants;

/// Error parsing a request parameter bag.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParamError {
    #[error("missing parameter: {0}")]
    Missing(&'static str),

    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

/// Parameters sent with every chunk request (and every test-chunk probe).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumableParams {
    #[serde(rename = "resumableFilename")]
    pub filename: String,
    #[serde(rename = "resumableTotalSize")]
    pub total_size: u64,
    #[serde(rename = "resumableChunkNumber")]
    pub chunk_number: u32,
    #[serde(rename = "resumableCurrentChunkSize")]
    pub current_chunk_size: u64,
    #[serde(
        rename = "resumableChunkSize",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub chunk_size: Option<u64>,
    #[serde(
        rename = "resumableTotalChunks",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub total_chunks: Option<u32>,
    #[serde(
        rename = "resumableIdentifier",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub identifier: Option<String>,
    #[serde(
        rename = "resumableRelativePath",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub relative_path: Option<String>,
    #[serde(
        rename = "resumableType",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub content_type: Option<String>,
}

impl ResumableParams {
    /// Builds the required part of a parameter bag.
    pub fn new(
        filename: impl Into<String>,
        total_size: u64,
        chunk_number: u32,
        current_chunk_size: u64,
    ) -> Self {
        Self {
            filename: filename.into(),
            total_size,
            chunk_number,
            current_chunk_size,
            chunk_size: None,
            total_chunks: None,
            identifier: None,
            relative_path: None,
            content_type: None,
        }
    }

    /// Parses form or query pairs. Numbers are decimal strings; unknown keys
    /// are ignored and a repeated key keeps its last value.
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self, ParamError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let bag: HashMap<String, String> = pairs
            .into_iter()
            .map(|(k, v)| (k.as_ref().to_string(), v.as_ref().to_string()))
            .collect();

        let chunk_number: u32 = required_number(&bag, constants::CHUNK_NUMBER)?;
        if chunk_number == 0 {
            return Err(ParamError::Invalid {
                key: constants::CHUNK_NUMBER,
                value: "0".into(),
            });
        }

        Ok(Self {
            filename: required(&bag, constants::FILENAME)?.to_string(),
            total_size: required_number(&bag, constants::TOTAL_SIZE)?,
            chunk_number,
            current_chunk_size: required_number(&bag, constants::CURRENT_CHUNK_SIZE)?,
            chunk_size: optional_number(&bag, constants::CHUNK_SIZE)?,
            total_chunks: optional_number(&bag, constants::TOTAL_CHUNKS)?,
            identifier: bag.get(constants::IDENTIFIER).cloned(),
            relative_path: bag.get(constants::RELATIVE_PATH).cloned(),
            content_type: bag.get(constants::CONTENT_TYPE).cloned(),
        })
    }

    /// Renders the bag as string pairs, required keys first.
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            (constants::FILENAME, self.filename.clone()),
            (constants::TOTAL_SIZE, self.total_size.to_string()),
            (constants::CHUNK_NUMBER, self.chunk_number.to_string()),
            (
                constants::CURRENT_CHUNK_SIZE,
                self.current_chunk_size.to_string(),
            ),
        ];
        if let Some(v) = self.chunk_size {
            pairs.push((constants::CHUNK_SIZE, v.to_string()));
        }
        if let Some(v) = self.total_chunks {
            pairs.push((constants::TOTAL_CHUNKS, v.to_string()));
        }
        if let Some(v) = &self.identifier {
            pairs.push((constants::IDENTIFIER, v.clone()));
        }
        if let Some(v) = &self.relative_path {
            pairs.push((constants::RELATIVE_PATH, v.clone()));
        }
        if let Some(v) = &self.content_type {
            pairs.push((constants::CONTENT_TYPE, v.clone()));
        }
        pairs
    }
}

fn required<'a>(bag: &'a HashMap<String, String>, key: &'static str) -> Result<&'a str, ParamError> {
    bag.get(key).map(String::as_str).ok_or(ParamError::Missing(key))
}

fn required_number<T: FromStr>(
    bag: &HashMap<String, String>,
    key: &'static str,
) -> Result<T, ParamError> {
    parse_number(key, required(bag, key)?)
}

fn optional_number<T: FromStr>(
    bag: &HashMap<String, String>,
    key: &'static str,
) -> Result<Option<T>, ParamError> {
    bag.get(key).map(|v| parse_number(key, v)).transpose()
}

fn parse_number<T: FromStr>(key: &'static str, value: &str) -> Result<T, ParamError> {
    value.trim().parse().map_err(|_| ParamError::Invalid {
        key,
        value: value.to_string(),
    })
}
