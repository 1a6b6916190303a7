// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Append-only PDF byte log.
//
// Objects are written in order, numbered sequentially from 1, and the byte
// offset of each one is recorded as it is written. `finish` appends the
// cross-reference table and trailer that index those offsets.

use docscan_core::error::ScanError;
use tracing::{debug, error};

use super::object::{ObjectNumber, PdfDict, PdfValue};

/// `%PDF-1.4` followed by a comment of four high-bit bytes so transfer tools
/// treat the file as binary.
const HEADER: &[u8] = b"%PDF-1.4\n%\xE2\xE3\xCF\xD3\n";

/// Cross-reference entry for the free-list head (20 bytes, EOL included).
const FREE_LIST_HEAD: &[u8] = b"0000000000 65535 f \n";

/// Byte log plus one offset per written object.
#[derive(Debug, Clone)]
pub struct ObjectLog {
    buf: Vec<u8>,
    offsets: Vec<usize>,
}

impl Default for ObjectLog {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectLog {
    /// Start a new file; the header is written immediately.
    pub fn new() -> Self {
        Self {
            buf: HEADER.to_vec(),
            offsets: Vec::new(),
        }
    }

    /// Number the next written object will receive.
    pub fn next_number(&self) -> ObjectNumber {
        self.offsets.len() as ObjectNumber + 1
    }

    /// Objects written so far.
    pub fn object_count(&self) -> usize {
        self.offsets.len()
    }

    /// Bytes written so far.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Offset of an already written object.
    pub fn offset_of(&self, number: ObjectNumber) -> Option<usize> {
        let index = (number as usize).checked_sub(1)?;
        self.offsets.get(index).copied()
    }

    /// Write `value` as indirect object `number`.
    ///
    /// `number` must be the next number in sequence: callers compute
    /// references ahead of time and this is where a wrong guess is caught.
    pub fn write_object(&mut self, number: ObjectNumber, value: &PdfValue) -> Result<(), ScanError> {
        self.begin(number)?;
        value.write_to(&mut self.buf);
        self.buf.extend_from_slice(b"\nendobj\n");
        Ok(())
    }

    /// Write a stream object. `dict` must already carry a `/Length` equal to
    /// `data.len()`; anything else is a bug in the caller and is refused.
    pub fn write_stream(
        &mut self,
        number: ObjectNumber,
        dict: &PdfDict,
        data: &[u8],
    ) -> Result<(), ScanError> {
        match dict.get("Length") {
            Some(PdfValue::Integer(len)) if *len == data.len() as i64 => {}
            Some(other) => {
                error!(number, declared = ?other, actual = data.len(), "stream /Length mismatch");
                return Err(ScanError::PdfEncoding(format!(
                    "object {} declares /Length {:?} but has {} bytes",
                    number,
                    other,
                    data.len()
                )));
            }
            None => {
                error!(number, "stream written without /Length");
                return Err(ScanError::PdfEncoding(format!(
                    "object {} is a stream without /Length",
                    number
                )));
            }
        }

        self.begin(number)?;
        dict.write_to(&mut self.buf);
        self.buf.extend_from_slice(b"\nstream\n");
        self.buf.extend_from_slice(data);
        self.buf.extend_from_slice(b"\nendstream\nendobj\n");
        Ok(())
    }

    /// Append the xref table and trailer and return the complete file.
    pub fn finish(mut self, root: ObjectNumber) -> Result<Vec<u8>, ScanError> {
        if self.offset_of(root).is_none() {
            return Err(ScanError::PdfEncoding(format!(
                "trailer root {} was never written",
                root
            )));
        }

        let size = self.offsets.len() + 1;
        let xref_offset = self.buf.len();

        self.buf.extend_from_slice(format!("xref\n0 {}\n", size).as_bytes());
        self.buf.extend_from_slice(FREE_LIST_HEAD);
        for offset in &self.offsets {
            self.buf
                .extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
        }

        let trailer = PdfDict::new()
            .with("Size", PdfValue::Integer(size as i64))
            .with("Root", PdfValue::Reference(root));
        self.buf.extend_from_slice(b"trailer\n");
        trailer.write_to(&mut self.buf);
        self.buf
            .extend_from_slice(format!("\nstartxref\n{}\n%%EOF\n", xref_offset).as_bytes());

        debug!(objects = self.offsets.len(), bytes = self.buf.len(), "PDF finished");
        Ok(self.buf)
    }

    fn begin(&mut self, number: ObjectNumber) -> Result<(), ScanError> {
        let expected = self.next_number();
        if number != expected {
            error!(number, expected, "object written out of sequence");
            return Err(ScanError::PdfEncoding(format!(
                "object {} written out of sequence (next is {})",
                number, expected
            )));
        }
        self.offsets.push(self.buf.len());
        self.buf
            .extend_from_slice(format!("{} 0 obj\n", number).as_bytes());
        Ok(())
    }
}
