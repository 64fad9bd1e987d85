//! Line/record filtering of real host content.
//!
//! The maps and mount filters drop whole lines containing disallowed
//! substrings while preserving the exact bytes and order of everything
//! else. The environ filter works on NUL-separated records. The status
//! filter rewrites the parent and namespace identifier fields and keeps
//! every other line verbatim.

use mirage_profile::FilterRules;

use crate::classify::FilterKind;

/// Apply the filter for `kind` to real content. `pid` and `ppid` feed the
/// status rewrite; the other kinds ignore them.
pub fn apply(
    kind: FilterKind,
    rules: &FilterRules,
    content: &[u8],
    pid: u32,
    ppid: u32,
) -> Vec<u8> {
    match kind {
        FilterKind::Maps => filter_lines(content, &rules.maps_needles),
        FilterKind::Mounts => filter_lines(content, &rules.mount_needles),
        FilterKind::Environ => {
            filter_environ(content, &rules.hidden_env_prefixes, &rules.lib_name)
        }
        FilterKind::Status => rewrite_status(content, pid, ppid),
    }
}

/// Drop every line containing any needle. Surviving lines keep their
/// exact bytes, order, and newline termination; a final unterminated
/// line is preserved unterminated.
pub fn filter_lines(content: &[u8], needles: &[String]) -> Vec<u8> {
    let mut out = Vec::with_capacity(content.len());
    let mut rest = content;
    while !rest.is_empty() {
        let (line, remainder) = match rest.iter().position(|&b| b == b'\n') {
            Some(pos) => rest.split_at(pos + 1),
            None => (rest, &[][..]),
        };
        if !needles.iter().any(|n| contains(line, n.as_bytes())) {
            out.extend_from_slice(line);
        }
        rest = remainder;
    }
    out
}

/// Drop NUL-separated records that start with a hidden `NAME=` prefix or
/// mention the shim library itself.
pub fn filter_environ(content: &[u8], hidden_prefixes: &[String], lib_name: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(content.len());
    for record in content.split(|&b| b == 0) {
        if record.is_empty() {
            continue;
        }
        let hidden = hidden_prefixes
            .iter()
            .any(|p| record.starts_with(p.as_bytes()))
            || contains(record, lib_name.as_bytes());
        if !hidden {
            out.extend_from_slice(record);
            out.push(0);
        }
    }
    out
}

/// Rewrite `/proc/self/status`: namespace identifier fields collapse to
/// the ordinary pid, the parent field becomes the synthetic ppid, every
/// other line passes through byte-identical.
pub fn rewrite_status(content: &[u8], pid: u32, ppid: u32) -> Vec<u8> {
    let mut out = Vec::with_capacity(content.len());
    let mut rest = content;
    while !rest.is_empty() {
        let (line, remainder) = match rest.iter().position(|&b| b == b'\n') {
            Some(pos) => rest.split_at(pos + 1),
            None => (rest, &[][..]),
        };
        if line.starts_with(b"PPid:") {
            out.extend_from_slice(format!("PPid:\t{ppid}\n").as_bytes());
        } else if line.starts_with(b"NSpid:") {
            out.extend_from_slice(format!("NSpid:\t{pid}\n").as_bytes());
        } else if line.starts_with(b"NStgid:") {
            out.extend_from_slice(format!("NStgid:\t{pid}\n").as_bytes());
        } else if line.starts_with(b"NSpgid:") {
            out.extend_from_slice(format!("NSpgid:\t{pid}\n").as_bytes());
        } else if line.starts_with(b"NSsid:") {
            out.extend_from_slice(format!("NSsid:\t{pid}\n").as_bytes());
        } else {
            out.extend_from_slice(line);
        }
        rest = remainder;
    }
    out
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    !needle.is_empty()
        && haystack.len() >= needle.len()
        && haystack.windows(needle.len()).any(|w| w == needle)
}
