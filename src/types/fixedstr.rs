//! Helpers for encoding short ASCII identifiers into fixed-size,
//! NUL-padded byte arrays for on-disk records, and decoding them back.

/// Writes `s` into `buf`, NUL-padding the remainder. Truncates `s` to
/// `buf.len()` bytes if it doesn't fit; callers validate lengths before
/// this point so truncation here is a last-resort safety net, not the
/// primary length check.
pub fn write_fixed(buf: &mut [u8], s: &[u8]) {
    let n = s.len().min(buf.len());
    buf[..n].copy_from_slice(&s[..n]);
    for b in &mut buf[n..] {
        *b = 0;
    }
}

/// Reads a NUL-terminated (or fully-populated) byte array back into a
/// `String`, lossily for any non-UTF8 bytes (host aliases and message
/// names are ASCII in practice; lossiness only matters for corrupted
/// tables, which are already a data-corruption condition per spec §7).
pub fn read_fixed(buf: &[u8]) -> String {
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    String::from_utf8_lossy(&buf[..end]).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_short_string() {
        let mut buf = [0u8; 8];
        write_fixed(&mut buf, b"host1");
        assert_eq!(read_fixed(&buf), "host1");
    }

    #[test]
    fn truncates_overlong_string() {
        let mut buf = [0u8; 4];
        write_fixed(&mut buf, b"abcdef");
        assert_eq!(read_fixed(&buf), "abcd");
    }
}
