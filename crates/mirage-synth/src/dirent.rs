//! In-place filtering of raw `linux_dirent64` buffers.
//!
//! `getdents64` returns a packed stream of variable-length records. The
//! filter walks the stream with bounds-checked slices, compacting the
//! surviving records forward and returning the new total length. Record
//! bytes are never altered, only dropped, so the surviving layout stays
//! exactly what the kernel produced.

/// Field offsets inside one `linux_dirent64` record
const OFF_RECLEN: usize = 16;
const OFF_NAME: usize = 19;

/// Filter a `getdents64` result buffer in place. `len` is the byte count
/// the real call returned; `hide` is called with each entry name (without
/// the trailing NUL) and returns true to drop the record. Returns the new
/// byte count.
///
/// A malformed record (zero or out-of-bounds length) ends the walk at the
/// last well-formed boundary rather than reading past it.
pub fn filter_dirents64<F>(buf: &mut [u8], len: usize, mut hide: F) -> usize
where
    F: FnMut(&[u8]) -> bool,
{
    let len = len.min(buf.len());
    let mut read = 0usize;
    let mut write = 0usize;

    while read + OFF_NAME < len {
        let reclen =
            u16::from_ne_bytes([buf[read + OFF_RECLEN], buf[read + OFF_RECLEN + 1]]) as usize;
        if reclen <= OFF_NAME || read + reclen > len {
            break;
        }
        let name_area = &buf[read + OFF_NAME..read + reclen];
        let name_len = name_area.iter().position(|&b| b == 0).unwrap_or(name_area.len());
        let drop = hide(&name_area[..name_len]);

        if !drop {
            if write != read {
                buf.copy_within(read..read + reclen, write);
            }
            write += reclen;
        }
        read += reclen;
    }
    write
}

/// True when an entry name is all ASCII digits, i.e. a pid entry in `/proc`.
pub fn is_pid_name(name: &[u8]) -> bool {
    !name.is_empty() && name.iter().all(u8::is_ascii_digit)
}
