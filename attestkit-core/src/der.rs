//! Minimal DER TLV reader for certificate extensions that x509-parser has no
//! typed parser for (Android key description, Apple nonce).

use crate::error::DataConversionError;

pub(crate) const CLASS_UNIVERSAL: u8 = 0;
pub(crate) const CLASS_CONTEXT: u8 = 2;

pub(crate) const TAG_INTEGER: u32 = 0x02;
pub(crate) const TAG_OCTET_STRING: u32 = 0x04;
pub(crate) const TAG_NULL: u32 = 0x05;
pub(crate) const TAG_ENUMERATED: u32 = 0x0a;
pub(crate) const TAG_SEQUENCE: u32 = 0x10;
pub(crate) const TAG_SET: u32 = 0x11;

fn malformed(reason: &str) -> DataConversionError {
    DataConversionError::Der(reason.to_string())
}

/// One decoded element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Tlv<'a> {
    pub class: u8,
    pub constructed: bool,
    pub number: u32,
    pub content: &'a [u8],
}

impl<'a> Tlv<'a> {
    pub fn is(&self, class: u8, number: u32) -> bool {
        self.class == class && self.number == number
    }

    pub fn children(&self) -> DerReader<'a> {
        DerReader::new(self.content)
    }

    /// Non-negative INTEGER or ENUMERATED that fits in a u64.
    pub fn as_u64(&self) -> Result<u64, DataConversionError> {
        if !(self.is(CLASS_UNIVERSAL, TAG_INTEGER) || self.is(CLASS_UNIVERSAL, TAG_ENUMERATED)) {
            return Err(malformed("expected INTEGER"));
        }
        let bytes = match self.content {
            [] => return Err(malformed("empty INTEGER")),
            [first, ..] if first & 0x80 != 0 => return Err(malformed("negative INTEGER")),
            [0, rest @ ..] => rest,
            all => all,
        };
        if bytes.len() > 8 {
            return Err(malformed("INTEGER too large"));
        }
        Ok(bytes.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b)))
    }

    pub fn expect(self, class: u8, number: u32, what: &str) -> Result<Self, DataConversionError> {
        if self.is(class, number) {
            Ok(self)
        } else {
            Err(DataConversionError::Der(format!("expected {what}")))
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct DerReader<'a> {
    input: &'a [u8],
}

impl<'a> DerReader<'a> {
    pub fn new(input: &'a [u8]) -> Self {
        Self { input }
    }

    pub fn is_empty(&self) -> bool {
        self.input.is_empty()
    }

    fn take_byte(&mut self) -> Result<u8, DataConversionError> {
        let (first, rest) = self
            .input
            .split_first()
            .ok_or_else(|| malformed("unexpected end of input"))?;
        self.input = rest;
        Ok(*first)
    }

    pub fn read(&mut self) -> Result<Tlv<'a>, DataConversionError> {
        let identifier = self.take_byte()?;
        let class = identifier >> 6;
        let constructed = identifier & 0x20 != 0;
        let mut number = u32::from(identifier & 0x1f);
        if number == 0x1f {
            number = 0;
            loop {
                let b = self.take_byte()?;
                if number > (u32::MAX >> 7) {
                    return Err(malformed("tag number too large"));
                }
                number = (number << 7) | u32::from(b & 0x7f);
                if b & 0x80 == 0 {
                    break;
                }
            }
        }

        let first = self.take_byte()?;
        let len = if first & 0x80 == 0 {
            usize::from(first)
        } else {
            let count = usize::from(first & 0x7f);
            if count == 0 || count > 4 {
                return Err(malformed("unsupported length encoding"));
            }
            let mut len = 0usize;
            for _ in 0..count {
                len = (len << 8) | usize::from(self.take_byte()?);
            }
            len
        };

        if self.input.len() < len {
            return Err(malformed("element is truncated"));
        }
        let (content, rest) = self.input.split_at(len);
        self.input = rest;
        Ok(Tlv {
            class,
            constructed,
            number,
            content,
        })
    }
}

impl<'a> Iterator for DerReader<'a> {
    type Item = Result<Tlv<'a>, DataConversionError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.is_empty() {
            return None;
        }
        let item = self.read();
        if item.is_err() {
            self.input = &[];
        }
        Some(item)
    }
}
