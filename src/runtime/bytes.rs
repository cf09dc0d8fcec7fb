//! Byte utilities over linear memory
//!
//! The translated module has no C library of its own, so its `memcpy`,
//! `memmove`, `memset`, `memcmp`, `strlen`, `strcmp` and `strncmp` land here.
//! Every operation works on module offsets into a borrowed byte slice,
//! never allocates, and refuses to touch anything outside the slice.

use super::{BridgeError, BridgeResult};
use std::ops::Range;

/// Check that `[offset, offset + len)` lies inside a region of `size` bytes
///
/// Computed in 64-bit arithmetic so `offset + len` cannot wrap.
#[inline]
pub fn check_range(size: usize, offset: u32, len: u32) -> BridgeResult<Range<usize>> {
    let start = u64::from(offset);
    let end = start + u64::from(len);
    if end > size as u64 {
        return Err(BridgeError::bounds(start, u64::from(len), size as u64));
    }
    Ok(start as usize..end as usize)
}

/// memcpy. Overlapping ranges are handled like [`move_bytes`].
pub fn copy(mem: &mut [u8], dst: u32, src: u32, len: u32) -> BridgeResult<()> {
    move_bytes(mem, dst, src, len)
}

/// memmove: both ranges are checked before any byte is written
pub fn move_bytes(mem: &mut [u8], dst: u32, src: u32, len: u32) -> BridgeResult<()> {
    let from = check_range(mem.len(), src, len)?;
    let to = check_range(mem.len(), dst, len)?;
    mem.copy_within(from, to.start);
    Ok(())
}

/// memset
pub fn fill(mem: &mut [u8], dst: u32, value: u8, len: u32) -> BridgeResult<()> {
    let range = check_range(mem.len(), dst, len)?;
    mem[range].fill(value);
    Ok(())
}

/// memcmp: difference of the first pair of differing bytes, 0 if equal
pub fn compare(mem: &[u8], lhs: u32, rhs: u32, len: u32) -> BridgeResult<i32> {
    let l = &mem[check_range(mem.len(), lhs, len)?];
    let r = &mem[check_range(mem.len(), rhs, len)?];
    Ok(l.iter()
        .zip(r)
        .find(|(a, b)| a != b)
        .map(|(a, b)| i32::from(*a) - i32::from(*b))
        .unwrap_or(0))
}

/// strlen: a string without a terminator before the end of memory is out of bounds
pub fn length(mem: &[u8], offset: u32) -> BridgeResult<u32> {
    let tail = &mem[check_range(mem.len(), offset, 0)?.start..];
    match tail.iter().position(|&b| b == 0) {
        Some(len) => Ok(len as u32),
        None => Err(BridgeError::bounds(u64::from(offset), tail.len() as u64 + 1, mem.len() as u64)),
    }
}

/// strcmp
pub fn compare_str(mem: &[u8], lhs: u32, rhs: u32) -> BridgeResult<i32> {
    compare_str_bounded(mem, lhs, rhs, u32::MAX)
}

/// strncmp: compares at most `n` bytes, stopping after a terminator
pub fn compare_str_bounded(mem: &[u8], lhs: u32, rhs: u32, n: u32) -> BridgeResult<i32> {
    for i in 0..n {
        let l = byte_at(mem, lhs, i)?;
        let r = byte_at(mem, rhs, i)?;
        if l != r || l == 0 {
            return Ok(i32::from(l) - i32::from(r));
        }
    }
    Ok(0)
}

fn byte_at(mem: &[u8], base: u32, index: u32) -> BridgeResult<u8> {
    let addr = u64::from(base) + u64::from(index);
    mem.get(addr as usize)
        .copied()
        .ok_or_else(|| BridgeError::bounds(addr, 1, mem.len() as u64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn memory_with(prefix: &[u8]) -> Vec<u8> {
        let mut mem = vec![0u8; 64];
        mem[..prefix.len()].copy_from_slice(prefix);
        mem
    }

    #[rstest]
    #[case(0, 64, true)]
    #[case(63, 1, true)]
    #[case(64, 0, true)]
    #[case(64, 1, false)]
    #[case(65, 0, false)]
    #[case(u32::MAX, 2, false)]
    fn test_check_range(#[case] offset: u32, #[case] len: u32, #[case] ok: bool) {
        assert_eq!(check_range(64, offset, len).is_ok(), ok);
    }

    #[test]
    fn test_copy_disjoint() {
        let mut mem = memory_with(b"hello");
        copy(&mut mem, 10, 0, 5).unwrap();
        assert_eq!(&mem[10..15], b"hello");
    }

    #[test]
    fn test_move_overlapping_forward() {
        let mut mem = memory_with(b"abcdef");
        move_bytes(&mut mem, 2, 0, 4).unwrap();
        assert_eq!(&mem[..6], b"ababcd");
    }

    #[test]
    fn test_move_overlapping_backward() {
        let mut mem = memory_with(b"abcdef");
        move_bytes(&mut mem, 0, 2, 4).unwrap();
        assert_eq!(&mem[..6], b"cdefef");
    }

    #[test]
    fn test_move_out_of_bounds_writes_nothing() {
        let mut mem = memory_with(b"abcdef");
        let before = mem.clone();
        assert!(matches!(
            move_bytes(&mut mem, 62, 0, 4),
            Err(BridgeError::BoundsViolation { .. })
        ));
        assert_eq!(mem, before);
    }

    #[test]
    fn test_fill() {
        let mut mem = memory_with(b"");
        fill(&mut mem, 4, 0xAB, 3).unwrap();
        assert_eq!(&mem[3..8], &[0, 0xAB, 0xAB, 0xAB, 0]);
        assert!(fill(&mut mem, 60, 1, 5).is_err());
        assert_eq!(mem[60..].iter().filter(|&&b| b != 0).count(), 0);
    }

    #[rstest]
    #[case(b"abc\0abd\0", 0, 4, 3, -1)]
    #[case(b"abd\0abc\0", 0, 4, 3, 1)]
    #[case(b"abc\0abc\0", 0, 4, 3, 0)]
    #[case(b"abc\0abd\0", 0, 4, 0, 0)]
    fn test_compare(#[case] prefix: &[u8], #[case] l: u32, #[case] r: u32, #[case] n: u32, #[case] expected: i32) {
        let mem = memory_with(prefix);
        assert_eq!(compare(&mem, l, r, n).unwrap(), expected);
    }

    #[test]
    fn test_length() {
        let mem = memory_with(b"blink\0");
        assert_eq!(length(&mem, 0).unwrap(), 5);
        assert_eq!(length(&mem, 5).unwrap(), 0);

        // No terminator before the end of memory
        let mem = vec![b'x'; 16];
        assert!(matches!(length(&mem, 0), Err(BridgeError::BoundsViolation { .. })));
        assert!(length(&mem, 17).is_err());
    }

    #[test]
    fn test_compare_str() {
        let mem = memory_with(b"pin\0pinMode\0pin\0");
        assert_eq!(compare_str(&mem, 0, 12).unwrap(), 0);
        assert!(compare_str(&mem, 0, 4).unwrap() < 0);
        assert!(compare_str(&mem, 4, 0).unwrap() > 0);
    }

    #[test]
    fn test_compare_str_bounded() {
        let mem = memory_with(b"pin\0pinMode\0");
        assert_eq!(compare_str_bounded(&mem, 0, 4, 3).unwrap(), 0);
        assert!(compare_str_bounded(&mem, 0, 4, 4).unwrap() < 0);
        assert_eq!(compare_str_bounded(&mem, 0, 4, 0).unwrap(), 0);
    }

    #[test]
    fn test_compare_str_runs_off_the_end() {
        let mem = vec![b'a'; 8];
        assert!(matches!(
            compare_str(&mem, 0, 0),
            Err(BridgeError::BoundsViolation { offset: 8, .. })
        ));
    }
}
