//! `Range` header parsing.
//!
//! Only the two shapes resumable downloaders actually send are
//! recognized: `bytes=<start>-<end>` and `bytes=<start>-`. Everything
//! else, including suffix ranges and multi-range sets, falls back to
//! serving the whole file rather than erroring.

/// A byte interval with inclusive bounds, in the units of `Range` and
/// `Content-Range` headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    /// First byte offset named by the client.
    pub start: u64,
    /// Last byte offset, inclusive. Open-ended requests are resolved to
    /// the final byte of the file at parse time.
    pub end: u64,
}

impl ByteRange {
    pub fn new(start: u64, end: u64) -> Self {
        ByteRange { start, end }
    }

    /// Number of bytes the range names. Inverted bounds count as zero.
    pub fn len(&self) -> u64 {
        if self.end < self.start {
            0
        } else {
            (self.end - self.start).saturating_add(1)
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Parse a `Range` header value against a file of `file_size` bytes.
///
/// `bytes=<start>-<end>` yields the bounds verbatim; `bytes=<start>-`
/// runs to the last byte of the file. Returns `None` for an absent
/// header or any value outside those two shapes, which callers treat
/// as a request for the whole file. Bounds are not checked against
/// `file_size` here; the response composer decides what an
/// out-of-bounds start means.
pub fn parse_range(header: Option<&str>, file_size: u64) -> Option<ByteRange> {
    let spec = header?.trim().strip_prefix("bytes=")?;
    let (start, end) = spec.split_once('-')?;

    let start = start.parse::<u64>().ok()?;
    let end = if end.is_empty() {
        file_size.saturating_sub(1)
    } else {
        end.parse::<u64>().ok()?
    };

    Some(ByteRange::new(start, end))
}

#[cfg(test)]
mod tests {
    use super::{parse_range, ByteRange};

    #[test]
    fn test_parse_range() {
        let cases: &[(Option<&str>, u64, Option<ByteRange>)] = &[
            // the two supported shapes
            (Some("bytes=0-499"), 10000, Some(ByteRange::new(0, 499))),
            (Some("bytes=500-999"), 10000, Some(ByteRange::new(500, 999))),
            (Some("bytes=500-"), 10000, Some(ByteRange::new(500, 9999))),
            (Some("bytes=0-"), 10000, Some(ByteRange::new(0, 9999))),
            // open-ended against an empty file pins end to zero
            (Some("bytes=0-"), 0, Some(ByteRange::new(0, 0))),
            // bounds are taken verbatim, even past end of file
            (Some("bytes=9999-20000"), 10000, Some(ByteRange::new(9999, 20000))),
            (Some("bytes=12000-"), 10000, Some(ByteRange::new(12000, 9999))),
            // absent or empty header
            (None, 10000, None),
            (Some(""), 10000, None),
            // suffix and multi-range forms are not recognized
            (Some("bytes=-500"), 10000, None),
            (Some("bytes=0-100,200-300"), 10000, None),
            // malformed values
            (Some("bytes="), 10000, None),
            (Some("bytes=-"), 10000, None),
            (Some("bytes=abc-"), 10000, None),
            (Some("bytes=0-abc"), 10000, None),
            (Some("bytes=1-2-3"), 10000, None),
            (Some("bites=0-499"), 10000, None),
            (Some("0-499"), 10000, None),
            // past u64::MAX
            (Some("bytes=18446744073709551616-"), 10000, None),
        ];

        for (header, file_size, expected) in cases {
            assert_eq!(
                *expected,
                parse_range(*header, *file_size),
                "parse_range({header:?}, {file_size})",
            );
        }
    }

    #[test]
    fn test_range_len() {
        assert_eq!(500, ByteRange::new(0, 499).len());
        assert_eq!(1, ByteRange::new(9, 9).len());
        assert_eq!(0, ByteRange::new(10, 9).len());
        assert!(ByteRange::new(10, 9).is_empty());
        assert!(!ByteRange::new(0, 0).is_empty());
    }
}
