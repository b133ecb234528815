// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("could not read image file '{0}': {1}")]
    Io(String, #[source] std::io::Error),

    #[error("unrecognized image format for file '{0}'")]
    UnsupportedFormat(String),

    #[error("truncated or malformed header in '{0}'")]
    Truncated(String),
}
