// Copyright 2026 Dropbox (created by Andrew Yates <ayates@dropbox.com>)

//! # AccessGraph Redaction
//!
//! Pattern-based masking applied before any log bytes reach a sink. Three
//! patterns run in a fixed order so their replacements never interact:
//!
//! 1. ARN account segments: `arn:aws:<svc>:<region>:<12 digits>:` loses the
//!    account segment.
//! 2. Standalone 12-digit numbers are replaced outright.
//! 3. `secret`/`password`/`token`/`key` key-value pairs lose their value;
//!    the separator is preserved.
//!
//! [`RedactingWriter`] wraps any `io::Write` sink, and
//! [`RedactingMakeWriter`] adapts a `tracing_subscriber` writer factory so
//! the whole subscriber output is masked.

use regex::Regex;
use std::io;
use std::sync::LazyLock;
use tracing_subscriber::fmt::MakeWriter;

#[allow(clippy::unwrap_used)]
static ARN_ACCOUNT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"arn:aws:([a-z0-9-]+):([a-z0-9-]*):(\d{12}):").unwrap());

#[allow(clippy::unwrap_used)]
static ACCOUNT_ID_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b\d{12}\b").unwrap());

#[allow(clippy::unwrap_used)]
static SECRET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(secret|password|token|key)([\s:=]+)(\S+)").unwrap());

/// Mask account ids, ARN account segments, and secret values.
#[must_use]
pub fn redact(input: &str) -> String {
    // Order is fixed: ARN accounts first, then bare account ids, then
    // secrets, so earlier replacements cannot re-expose later patterns.
    let masked = ARN_ACCOUNT_RE.replace_all(input, "arn:aws:${1}:${2}:***:");
    let masked = ACCOUNT_ID_RE.replace_all(&masked, "************");
    SECRET_RE.replace_all(&masked, "${1}${2}***").into_owned()
}

/// An `io::Write` adapter that redacts every chunk before forwarding it.
pub struct RedactingWriter<W: io::Write> {
    inner: W,
}

impl<W: io::Write> RedactingWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }
}

impl<W: io::Write> io::Write for RedactingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let masked = redact(&String::from_utf8_lossy(buf));
        self.inner.write_all(masked.as_bytes())?;
        // Report the original length; the caller's view of the chunk is
        // unchanged even when masking altered its size.
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// `MakeWriter` adapter for `tracing_subscriber`.
pub struct RedactingMakeWriter<M> {
    inner: M,
}

impl<M> RedactingMakeWriter<M> {
    pub fn new(inner: M) -> Self {
        Self { inner }
    }
}

impl<'a, M> MakeWriter<'a> for RedactingMakeWriter<M>
where
    M: MakeWriter<'a>,
{
    type Writer = RedactingWriter<M::Writer>;

    fn make_writer(&'a self) -> Self::Writer {
        RedactingWriter::new(self.inner.make_writer())
    }
}
