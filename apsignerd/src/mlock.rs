//! Best-effort `mlock` of the daemon's address space (spec §4.1, §9:
//! "the master key and decrypted key bytes live in heap memory attempted
//! to be locked against swap"). Real per-allocation locking would need a
//! custom allocator; this workspace doesn't carry one, so the daemon locks
//! its whole resident set instead, which is the coarse approximation the
//! spec's "best-effort" language allows.

/// Returns `true` on success. On non-unix targets this is always a no-op
/// success, matching the teacher's existing `#[cfg(unix)]` / fallback split
/// in `apsigner_keystore::passphrase_command::kill_process_group`.
#[cfg(unix)]
pub fn lock_memory() -> bool {
    // SAFETY: mlockall only changes paging behavior for the calling
    // process; it has no memory-safety implications.
    let rc = unsafe { libc::mlockall(libc::MCL_CURRENT | libc::MCL_FUTURE) };
    rc == 0
}

#[cfg(not(unix))]
pub fn lock_memory() -> bool {
    true
}
