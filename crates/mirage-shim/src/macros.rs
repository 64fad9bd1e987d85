/// Log into the ring buffer (and stderr when `MIRAGE_DEBUG` is set)
/// without heap allocation: stack-buffer formatting only, safe inside
/// any intercepted call.
#[macro_export]
macro_rules! shim_log {
    ($($arg:tt)*) => {{
        use std::fmt::Write;
        let mut buf = [0u8; 512];
        let mut writer = mirage_synth::stackbuf::StackWriter::new(&mut buf);
        let pid = unsafe { libc::getpid() };
        let _ = write!(writer, "[mirage][{}] ", pid);
        let _ = write!(writer, $($arg)*);
        let _ = writeln!(writer);
        $crate::state::LOGGER.log(writer.as_str());
    }};
}
