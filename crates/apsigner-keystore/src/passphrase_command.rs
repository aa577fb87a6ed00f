//! External passphrase helper protocol (spec §6, "Passphrase-command
//! protocol"): when `passphrase_command_argv` is configured, the daemon
//! shells out to it instead of reading a passphrase directly, for both
//! reads (unlock/generate/export) and writes (passphrase rotation, not
//! currently exposed over the wire but reserved for a future admin op).

use crate::error::{KeystoreError, Result};
use apsigner_crypto::constant_time_eq;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::time::timeout;

const STDOUT_CAP: usize = 8 * 1024;
const HELPER_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Read,
    Write,
}

impl Mode {
    fn as_str(self) -> &'static str {
        match self {
            Mode::Read => "read",
            Mode::Write => "write",
        }
    }
}

/// Invoke `argv[0] read ...argv[1..]`, returning the decoded passphrase
/// bytes.
pub async fn read_passphrase(argv: &[String]) -> Result<Vec<u8>> {
    let raw = run_helper(argv, Mode::Read, None).await?;
    decode_passphrase(&raw)
}

/// Invoke `argv[0] write ...argv[1..]` feeding `passphrase` on stdin
/// (encoded the same way reads are decoded, i.e. raw bytes — helpers that
/// want a prefixed encoding re-encode on their own side), then re-read the
/// helper to verify the round trip with a constant-time compare (spec §6:
/// "Writes round-trip through the helper and are verified with
/// constant-time compare").
pub async fn write_passphrase(argv: &[String], passphrase: &[u8]) -> Result<()> {
    run_helper(argv, Mode::Write, Some(passphrase)).await?;
    let confirmed = read_passphrase(argv).await?;
    if !constant_time_eq(&confirmed, passphrase) {
        return Err(KeystoreError::PassphraseCommand(
            "write round-trip verification failed".into(),
        ));
    }
    Ok(())
}

async fn run_helper(argv: &[String], mode: Mode, stdin_payload: Option<&[u8]>) -> Result<Vec<u8>> {
    let (program, rest) = argv
        .split_first()
        .ok_or_else(|| KeystoreError::PassphraseCommand("empty passphrase_command_argv".into()))?;

    let mut command = Command::new(program);
    command.arg(mode.as_str()).args(rest);
    command.stdout(Stdio::piped());
    command.stdin(if stdin_payload.is_some() {
        Stdio::piped()
    } else {
        Stdio::null()
    });
    command.stderr(Stdio::null());
    command.kill_on_drop(true);
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        // New process group rooted at the child so a timeout can kill the
        // whole tree, not just the immediate helper process.
        command.process_group(0);
    }

    let mut child = command
        .spawn()
        .map_err(|e| KeystoreError::PassphraseCommand(format!("spawn failed: {e}")))?;

    if let Some(payload) = stdin_payload {
        use tokio::io::AsyncWriteExt;
        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(payload)
                .await
                .map_err(|e| KeystoreError::PassphraseCommand(format!("stdin write: {e}")))?;
        }
    }

    let pid = child.id();
    let result = timeout(HELPER_TIMEOUT, async {
        let mut stdout = child
            .stdout
            .take()
            .expect("stdout is always piped above");
        let mut buf = Vec::with_capacity(256);
        let mut limited = (&mut stdout).take((STDOUT_CAP + 1) as u64);
        limited
            .read_to_end(&mut buf)
            .await
            .map_err(|e| KeystoreError::PassphraseCommand(format!("stdout read: {e}")))?;
        let status = child
            .wait()
            .await
            .map_err(|e| KeystoreError::PassphraseCommand(format!("wait failed: {e}")))?;
        if !status.success() {
            return Err(KeystoreError::PassphraseCommand(format!(
                "helper exited with {status}"
            )));
        }
        Ok(buf)
    })
    .await;

    match result {
        Ok(inner) => {
            let buf = inner?;
            if buf.len() > STDOUT_CAP {
                return Err(KeystoreError::PassphraseCommand(format!(
                    "helper stdout exceeded {STDOUT_CAP} bytes"
                )));
            }
            Ok(buf)
        }
        Err(_elapsed) => {
            kill_process_group(pid);
            Err(KeystoreError::PassphraseCommand(format!(
                "helper did not complete within {:?}",
                HELPER_TIMEOUT
            )))
        }
    }
}

#[cfg(unix)]
fn kill_process_group(pid: Option<u32>) {
    if let Some(pid) = pid {
        // SAFETY: `pid` is a positive process id this process just spawned
        // with `process_group(0)`, so its pgid equals its pid; negating it
        // targets the whole group per `kill(2)`.
        unsafe {
            libc::kill(-(pid as i32), libc::SIGKILL);
        }
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pid: Option<u32>) {}

/// Strip exactly one trailing newline, then decode a `base64:`/`hex:`
/// prefix if present, rejecting any embedded NUL byte (spec §6).
fn decode_passphrase(raw: &[u8]) -> Result<Vec<u8>> {
    let mut bytes = raw;
    if bytes.last() == Some(&b'\n') {
        bytes = &bytes[..bytes.len() - 1];
    }
    let decoded = if let Some(rest) = strip_prefix(bytes, b"base64:") {
        base64_decode(rest)?
    } else if let Some(rest) = strip_prefix(bytes, b"hex:") {
        hex::decode(rest)
            .map_err(|e| KeystoreError::PassphraseCommand(format!("invalid hex: {e}")))?
    } else {
        bytes.to_vec()
    };
    if decoded.contains(&0) {
        return Err(KeystoreError::PassphraseCommand(
            "passphrase contains a NUL byte".into(),
        ));
    }
    Ok(decoded)
}

fn strip_prefix<'a>(bytes: &'a [u8], prefix: &[u8]) -> Option<&'a [u8]> {
    bytes.starts_with(prefix).then(|| &bytes[prefix.len()..])
}

/// Minimal standard-alphabet base64 decoder with padding, avoiding a new
/// dependency for a single narrow use site.
fn base64_decode(input: &[u8]) -> Result<Vec<u8>> {
    fn val(c: u8) -> Option<u8> {
        match c {
            b'A'..=b'Z' => Some(c - b'A'),
            b'a'..=b'z' => Some(c - b'a' + 26),
            b'0'..=b'9' => Some(c - b'0' + 52),
            b'+' => Some(62),
            b'/' => Some(63),
            _ => None,
        }
    }
    let input: Vec<u8> = input.iter().copied().filter(|&b| b != b'=').collect();
    let mut out = Vec::with_capacity(input.len() * 3 / 4 + 3);
    for chunk in input.chunks(4) {
        let vals: Vec<u8> = chunk
            .iter()
            .map(|&c| val(c).ok_or_else(|| KeystoreError::PassphraseCommand("invalid base64".into())))
            .collect::<Result<_>>()?;
        let n = vals.len();
        let mut buf = [0u8; 4];
        buf[..n].copy_from_slice(&vals);
        let combined = ((buf[0] as u32) << 18)
            | ((buf[1] as u32) << 12)
            | ((buf[2] as u32) << 6)
            | (buf[3] as u32);
        out.push((combined >> 16) as u8);
        if n > 2 {
            out.push((combined >> 8) as u8);
        }
        if n > 3 {
            out.push(combined as u8);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_strips_single_trailing_newline() {
        assert_eq!(decode_passphrase(b"hunter2\n").unwrap(), b"hunter2");
        assert_eq!(decode_passphrase(b"hunter2\n\n").unwrap(), b"hunter2\n");
    }

    #[test]
    fn decode_handles_hex_prefix() {
        assert_eq!(decode_passphrase(b"hex:68656c6c6f").unwrap(), b"hello");
    }

    #[test]
    fn decode_handles_base64_prefix() {
        assert_eq!(decode_passphrase(b"base64:aGVsbG8=").unwrap(), b"hello");
    }

    #[test]
    fn decode_rejects_embedded_nul() {
        assert!(decode_passphrase(b"hex:00ff").is_err());
    }

    #[tokio::test]
    async fn read_passphrase_via_shell_helper() {
        let argv = vec!["sh".to_string(), "-c".to_string(), "echo -n hex:68656c6c6f".to_string()];
        let passphrase = read_passphrase(&argv).await.unwrap();
        assert_eq!(passphrase, b"hello");
    }

    #[tokio::test]
    async fn helper_timeout_is_enforced() {
        let argv = vec![
            "sh".to_string(),
            "-c".to_string(),
            "sleep 30".to_string(),
        ];
        let start = std::time::Instant::now();
        let result = run_helper(&argv, Mode::Read, None).await;
        assert!(result.is_err());
        assert!(start.elapsed() < Duration::from_secs(10));
    }
}
