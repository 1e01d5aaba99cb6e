//! Structured save/restore of component state.
//!
//! A component describes its state as an ordered list of fields. It
//! reports the encoded size up front through [`Stateful::state_size`], then
//! writes and reads the same fields in the same order. All multi-byte values
//! are little-endian.
//!
//! [`StateWriter::write_component`] and [`StateReader::read_component`]
//! compare the advertised size with the number of bytes actually processed,
//! so a component whose size and encoding drift apart is caught the first
//! time it is saved rather than producing a silently truncated buffer.

use thiserror::Error;

/// Failure while encoding or decoding component state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    /// The buffer ended before the field could be read.
    #[error("state truncated: needed {needed} bytes, {remaining} remaining")]
    Truncated { needed: usize, remaining: usize },
    /// A field holds a value outside its valid range.
    #[error("invalid value {value} for {field}")]
    InvalidField { field: &'static str, value: u64 },
    /// A component processed a different number of bytes than it advertised.
    #[error("{component}: advertised {expected} state bytes but processed {actual}")]
    SizeMismatch {
        component: &'static str,
        expected: usize,
        actual: usize,
    },
}

/// A component whose complete state can be saved and restored.
pub trait Stateful {
    /// Number of bytes [`save_state`](Self::save_state) will write.
    fn state_size(&self) -> usize;

    /// Append the component's state to `writer`.
    fn save_state(&self, writer: &mut StateWriter);

    /// Replace the component's state with the next fields of `reader`.
    ///
    /// After a successful load, `state_size` must equal the number of
    /// bytes consumed.
    fn load_state(&mut self, reader: &mut StateReader<'_>) -> Result<(), StateError>;
}

/// Growable output buffer for [`Stateful::save_state`].
#[derive(Debug, Default)]
pub struct StateWriter {
    buf: Vec<u8>,
}

impl StateWriter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    /// Bytes written so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub fn write_bool(&mut self, value: bool) {
        self.buf.push(u8::from(value));
    }

    pub fn write_u16(&mut self, value: u16) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_u64(&mut self, value: u64) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Save a whole component and check its size contract.
    pub fn write_component<T: Stateful + ?Sized>(
        &mut self,
        component: &'static str,
        value: &T,
    ) -> Result<(), StateError> {
        let expected = value.state_size();
        let start = self.buf.len();
        value.save_state(self);
        let actual = self.buf.len() - start;
        if actual == expected {
            Ok(())
        } else {
            Err(StateError::SizeMismatch {
                component,
                expected,
                actual,
            })
        }
    }

    #[must_use]
    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }
}

/// Cursor over a saved state buffer for [`Stateful::load_state`].
#[derive(Debug)]
pub struct StateReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> StateReader<'a> {
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Bytes consumed so far.
    #[must_use]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes left to read.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Borrow the next `len` bytes.
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], StateError> {
        let remaining = self.remaining();
        if len > remaining {
            return Err(StateError::Truncated {
                needed: len,
                remaining,
            });
        }
        let bytes = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }

    /// Fill `out` from the next `out.len()` bytes.
    pub fn read_into(&mut self, out: &mut [u8]) -> Result<(), StateError> {
        out.copy_from_slice(self.read_bytes(out.len())?);
        Ok(())
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], StateError> {
        let mut out = [0; N];
        self.read_into(&mut out)?;
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8, StateError> {
        Ok(self.read_array::<1>()?[0])
    }

    /// Read a flag stored as 0 or 1. Any other byte is rejected.
    pub fn read_bool(&mut self) -> Result<bool, StateError> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(StateError::InvalidField {
                field: "flag",
                value: u64::from(other),
            }),
        }
    }

    pub fn read_u16(&mut self) -> Result<u16, StateError> {
        self.read_array().map(u16::from_le_bytes)
    }

    pub fn read_u32(&mut self) -> Result<u32, StateError> {
        self.read_array().map(u32::from_le_bytes)
    }

    pub fn read_u64(&mut self) -> Result<u64, StateError> {
        self.read_array().map(u64::from_le_bytes)
    }

    /// Load a whole component and check its size contract.
    pub fn read_component<T: Stateful + ?Sized>(
        &mut self,
        component: &'static str,
        value: &mut T,
    ) -> Result<(), StateError> {
        let start = self.pos;
        value.load_state(self)?;
        let actual = self.pos - start;
        let expected = value.state_size();
        if actual == expected {
            Ok(())
        } else {
            Err(StateError::SizeMismatch {
                component,
                expected,
                actual,
            })
        }
    }
}
