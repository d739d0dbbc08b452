use crate::AcpiError;

/// A bounds-checked, little-endian view over a firmware table.
#[derive(Copy, Clone, Debug)]
pub struct TableBytes<'a> {
    bytes: &'a [u8],
}

impl<'a> TableBytes<'a> {
    #[inline]
    #[must_use]
    pub const fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.bytes.len()
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    #[inline]
    #[must_use]
    pub const fn as_slice(&self) -> &'a [u8] {
        self.bytes
    }

    /// `N` bytes starting at `offset`.
    ///
    /// # Errors
    /// [`AcpiError::Truncated`] if the range leaves the table.
    pub fn array<const N: usize>(&self, offset: usize) -> Result<[u8; N], AcpiError> {
        let end = offset.checked_add(N).ok_or(AcpiError::Truncated {
            offset,
            len: self.bytes.len(),
        })?;
        self.bytes
            .get(offset..end)
            .and_then(|s| s.try_into().ok())
            .ok_or(AcpiError::Truncated {
                offset,
                len: self.bytes.len(),
            })
    }

    /// # Errors
    /// [`AcpiError::Truncated`] if `offset` is past the end.
    pub fn u8(&self, offset: usize) -> Result<u8, AcpiError> {
        self.array::<1>(offset).map(|[b]| b)
    }

    /// # Errors
    /// [`AcpiError::Truncated`] if the field leaves the table.
    pub fn u16(&self, offset: usize) -> Result<u16, AcpiError> {
        self.array(offset).map(u16::from_le_bytes)
    }

    /// # Errors
    /// [`AcpiError::Truncated`] if the field leaves the table.
    pub fn u32(&self, offset: usize) -> Result<u32, AcpiError> {
        self.array(offset).map(u32::from_le_bytes)
    }

    /// # Errors
    /// [`AcpiError::Truncated`] if the field leaves the table.
    pub fn u64(&self, offset: usize) -> Result<u64, AcpiError> {
        self.array(offset).map(u64::from_le_bytes)
    }

    /// The sub-view `[offset, offset + len)`.
    ///
    /// # Errors
    /// [`AcpiError::Truncated`] if the range leaves the table.
    pub fn slice(&self, offset: usize, len: usize) -> Result<Self, AcpiError> {
        offset
            .checked_add(len)
            .and_then(|end| self.bytes.get(offset..end))
            .map(Self::new)
            .ok_or(AcpiError::Truncated {
                offset,
                len: self.bytes.len(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_little_endian_and_checks_bounds() {
        let raw = [0x78, 0x56, 0x34, 0x12, 0xAA];
        let t = TableBytes::new(&raw);
        assert_eq!(t.u32(0), Ok(0x1234_5678));
        assert_eq!(t.u16(3), Ok(0xAA12));
        assert_eq!(t.u8(4), Ok(0xAA));
        assert_eq!(t.u32(2), Err(AcpiError::Truncated { offset: 2, len: 5 }));
        assert_eq!(t.u8(usize::MAX).unwrap_err(), AcpiError::Truncated {
            offset: usize::MAX,
            len: 5
        });
        assert!(t.slice(4, 2).is_err());
        assert_eq!(t.slice(1, 2).unwrap().as_slice(), &[0x56, 0x34]);
    }
}
