//! No-echo terminal entry for secrets.
//!
//! Secrets never arrive via argv or files: argv leaks through process
//! listings and files outlive intent. Entry is echo-suppressed on a TTY and
//! falls back to plain line reads when input is piped (tests, scripts).

use secrecy::SecretString;
use std::io::{self, BufRead, IsTerminal, Write};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("io error")]
    Io(#[from] io::Error),

    #[error("input cannot be empty")]
    Empty,

    #[error("entries do not match")]
    Mismatch,
}

/// Prompt for the real secret, with confirmation.
pub fn prompt_real_secret() -> Result<SecretString, PromptError> {
    let first = read_hidden_line("Real secret: ")?;
    if first.is_empty() {
        return Err(PromptError::Empty);
    }
    let second = read_hidden_line("Confirm real secret: ")?;
    if first != second {
        return Err(PromptError::Mismatch);
    }
    Ok(SecretString::new(first.into_boxed_str()))
}

/// Prompt for one value under a caller-supplied label (decoys, test input).
pub fn prompt_secret(label: &str) -> Result<SecretString, PromptError> {
    let value = read_hidden_line(label)?;
    if value.is_empty() {
        return Err(PromptError::Empty);
    }
    Ok(SecretString::new(value.into_boxed_str()))
}

fn read_hidden_line(label: &str) -> Result<String, PromptError> {
    eprint!("{label}");
    io::stderr().flush()?;

    #[cfg(unix)]
    if io::stdin().is_terminal() {
        return read_without_echo();
    }

    read_line()
}

fn read_line() -> Result<String, PromptError> {
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\n', '\r']).to_string())
}

#[cfg(unix)]
fn read_without_echo() -> Result<String, PromptError> {
    use std::mem::MaybeUninit;
    use std::os::unix::io::AsRawFd;

    let stdin = io::stdin();
    let fd = stdin.as_raw_fd();

    unsafe {
        let mut saved = MaybeUninit::<libc::termios>::uninit();
        if libc::tcgetattr(fd, saved.as_mut_ptr()) != 0 {
            // Not a real terminal after all; read plainly.
            return read_line();
        }
        let saved = saved.assume_init();

        let mut silenced = saved;
        silenced.c_lflag &= !(libc::ECHO | libc::ECHONL);
        let _restore = EchoRestore {
            fd,
            saved,
            engaged: libc::tcsetattr(fd, libc::TCSANOW, &silenced) == 0,
        };

        let line = read_line()?;
        eprintln!();
        Ok(line)
    }
}

#[cfg(unix)]
struct EchoRestore {
    fd: i32,
    saved: libc::termios,
    engaged: bool,
}

#[cfg(unix)]
impl Drop for EchoRestore {
    fn drop(&mut self) {
        if self.engaged {
            unsafe {
                let _ = libc::tcsetattr(self.fd, libc::TCSANOW, &self.saved);
            }
        }
    }
}
