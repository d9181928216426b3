//! Interactive prompting
//!
//! All user interaction goes through the [`Prompter`] trait so the pipeline
//! can be driven by a script of answers in tests. [`TerminalPrompter`] is the
//! real implementation, built on `inquire`; without a terminal it falls back
//! to plain lines on stdin.

use crate::error::{InstallError, Result};
use crate::types::{GpuDriver, Secret};
use crate::validation;
use inquire::error::InquireError;
use inquire::{Confirm, Password, PasswordDisplayMode, Text};
use std::collections::VecDeque;
use std::io::{self, BufRead, Write};
use tracing::debug;

/// Source of user answers.
///
/// `Ok(None)` means end of input. An error of kind
/// [`io::ErrorKind::Interrupted`] means the user cancelled the prompt.
pub trait Prompter {
    /// Print `prompt` and read one line.
    fn read_line(&mut self, prompt: &str) -> io::Result<Option<String>>;

    /// Like `read_line`, without echoing what is typed.
    fn read_secret(&mut self, prompt: &str) -> io::Result<Option<String>>;

    /// Show a message to the user.
    fn say(&mut self, message: &str);

    /// Ask a yes/no question. Only `y` and `yes` (any case) count as yes.
    fn confirm(&mut self, question: &str) -> io::Result<Option<bool>> {
        Ok(self
            .read_line(&format!("{} [y/N]: ", question))?
            .map(|answer| is_yes(&answer)))
    }
}

/// Cancelling a prompt aborts the installation
fn input_error(e: io::Error) -> InstallError {
    if e.kind() == io::ErrorKind::Interrupted {
        InstallError::Aborted
    } else {
        InstallError::Io(e)
    }
}

/// Read a trimmed line, treating end of input as an error.
fn ask(prompter: &mut dyn Prompter, prompt: &str) -> Result<String> {
    match prompter.read_line(prompt).map_err(input_error)? {
        Some(line) => Ok(line.trim().to_string()),
        None => Err(InstallError::InputClosed),
    }
}

fn ask_secret(prompter: &mut dyn Prompter, prompt: &str) -> Result<String> {
    prompter
        .read_secret(prompt)
        .map_err(input_error)?
        .ok_or(InstallError::InputClosed)
}

/// Ask a yes/no question, or answer yes without asking in auto-yes mode.
pub fn confirm(prompter: &mut dyn Prompter, question: &str, auto_yes: bool) -> Result<bool> {
    if auto_yes {
        debug!("Auto-confirming: {}", question);
        return Ok(true);
    }
    prompter
        .confirm(question)
        .map_err(input_error)?
        .ok_or(InstallError::InputClosed)
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

/// Ask until `accept` returns true, printing `hint` after each rejection.
pub fn prompt_until(
    prompter: &mut dyn Prompter,
    prompt: &str,
    hint: &str,
    accept: impl Fn(&str) -> bool,
) -> Result<String> {
    loop {
        let answer = ask(prompter, prompt)?;
        if accept(&answer) {
            return Ok(answer);
        }
        prompter.say(hint);
    }
}

/// Ask for a password twice until both entries match and are non-empty.
pub fn prompt_password(prompter: &mut dyn Prompter, label: &str) -> Result<Secret> {
    loop {
        let first = ask_secret(prompter, &format!("Enter {} password: ", label))?;
        if !validation::is_valid_password(&first) {
            prompter.say("Password cannot be empty. Please try again.");
            continue;
        }
        let second = ask_secret(prompter, &format!("Re-enter {} password: ", label))?;
        if first != second {
            prompter.say("Passwords do not match. Please try again.");
            continue;
        }
        return Ok(Secret::new(first));
    }
}

/// Show the driver menu and ask until a valid choice is made.
pub fn prompt_gpu(prompter: &mut dyn Prompter) -> Result<GpuDriver> {
    let prompt = format!("{}Enter choice [0-4]: ", GpuDriver::menu());
    let answer = prompt_until(prompter, &prompt, validation::GPU_HINT, |s| {
        GpuDriver::from_choice(s).is_some()
    })?;
    validation::check_gpu_choice(&answer)
}

/// Prompter on the controlling terminal.
#[derive(Debug, Default)]
pub struct TerminalPrompter;

impl TerminalPrompter {
    pub fn new() -> Self {
        Self
    }

    /// Plain prompt on stdout, answer from stdin
    fn read_plain(prompt: &str) -> io::Result<Option<String>> {
        let mut stdout = io::stdout();
        write!(stdout, "{}", prompt)?;
        stdout.flush()?;

        let mut line = String::new();
        let read = io::stdin().lock().read_line(&mut line)?;
        if read == 0 {
            return Ok(None);
        }
        while line.ends_with('\n') || line.ends_with('\r') {
            line.pop();
        }
        Ok(Some(line))
    }
}

/// Split a prompt into the lines shown before it and the question itself.
///
/// `inquire` renders a single-line message, so menus are printed first.
/// The question loses its trailing `": "`.
fn split_prompt(prompt: &str) -> (Option<&str>, &str) {
    let (preamble, last) = match prompt.rsplit_once('\n') {
        Some((preamble, last)) => (Some(preamble.trim_end_matches('\n')), last),
        None => (None, prompt),
    };
    (preamble, last.trim_end().trim_end_matches(':'))
}

/// Map an `inquire` outcome onto the [`Prompter`] contract.
///
/// `None` from `fallback` is returned as-is; it runs only when there is no
/// terminal.
fn from_inquire<T>(
    result: std::result::Result<T, InquireError>,
    fallback: impl FnOnce() -> io::Result<Option<T>>,
) -> io::Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(InquireError::NotTTY) => fallback(),
        Err(InquireError::OperationCanceled | InquireError::OperationInterrupted) => {
            Err(io::Error::new(io::ErrorKind::Interrupted, "prompt cancelled"))
        }
        Err(InquireError::IO(e)) => Err(e),
        Err(e) => Err(io::Error::other(e)),
    }
}

impl Prompter for TerminalPrompter {
    fn read_line(&mut self, prompt: &str) -> io::Result<Option<String>> {
        let (preamble, message) = split_prompt(prompt);
        if let Some(preamble) = preamble {
            println!("{}", preamble);
        }
        from_inquire(Text::new(message).prompt(), || {
            Self::read_plain(&format!("{}: ", message))
        })
    }

    fn read_secret(&mut self, prompt: &str) -> io::Result<Option<String>> {
        let (_, message) = split_prompt(prompt);
        let answer = Password::new(message)
            .without_confirmation()
            .with_display_mode(PasswordDisplayMode::Hidden)
            .prompt();
        from_inquire(answer, || {
            debug!("stdin is not a terminal, reading secret as a plain line");
            Self::read_plain(prompt)
        })
    }

    fn say(&mut self, message: &str) {
        println!("{}", message);
    }

    fn confirm(&mut self, question: &str) -> io::Result<Option<bool>> {
        let answer = Confirm::new(question).with_default(false).prompt();
        from_inquire(answer, || {
            Ok(Self::read_plain(&format!("{} [y/N]: ", question))?.map(|a| is_yes(&a)))
        })
    }
}

/// Prompter that replays canned answers. Used by tests and dry runs.
///
/// Secrets and plain lines share one queue, consumed in order. Everything
/// shown to the user (prompts and messages) is kept in `transcript`.
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    answers: VecDeque<String>,
    pub transcript: Vec<String>,
}

impl ScriptedPrompter {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: answers.into_iter().map(Into::into).collect(),
            transcript: Vec::new(),
        }
    }

    /// Number of answers not yet consumed
    pub fn remaining(&self) -> usize {
        self.answers.len()
    }

    /// True if any prompt or message contained `needle`
    pub fn saw(&self, needle: &str) -> bool {
        self.transcript.iter().any(|line| line.contains(needle))
    }
}

impl Prompter for ScriptedPrompter {
    fn read_line(&mut self, prompt: &str) -> io::Result<Option<String>> {
        self.transcript.push(prompt.to_string());
        Ok(self.answers.pop_front())
    }

    fn read_secret(&mut self, prompt: &str) -> io::Result<Option<String>> {
        self.read_line(prompt)
    }

    fn say(&mut self, message: &str) {
        self.transcript.push(message.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confirm_accepts_only_yes() {
        for (answer, expected) in [("y", true), ("YES", true), (" yes ", true), ("n", false), ("", false), ("yeah", false)] {
            let mut p = ScriptedPrompter::new([answer]);
            assert_eq!(confirm(&mut p, "Continue?", false).unwrap(), expected, "answer {answer:?}");
            assert!(p.saw("Continue? [y/N]: "));
        }
    }

    #[test]
    fn test_confirm_auto_yes_reads_nothing() {
        let mut p = ScriptedPrompter::new(["n"]);
        assert!(confirm(&mut p, "Reboot?", true).unwrap());
        assert_eq!(p.remaining(), 1);
    }

    #[test]
    fn test_confirm_eof_is_an_error() {
        let mut p = ScriptedPrompter::default();
        assert!(matches!(confirm(&mut p, "Go?", false), Err(InstallError::InputClosed)));
    }

    #[test]
    fn test_prompt_until_repeats_with_hint() {
        let mut p = ScriptedPrompter::new(["", "Bad", "good"]);
        let answer = prompt_until(&mut p, "Name: ", "try again", |s| s == "good").unwrap();
        assert_eq!(answer, "good");
        assert_eq!(p.transcript.iter().filter(|l| *l == "try again").count(), 2);
    }

    /// Stands in for a terminal where the user pressed Ctrl-C or Esc
    struct Cancelling;

    impl Prompter for Cancelling {
        fn read_line(&mut self, _: &str) -> io::Result<Option<String>> {
            Err(io::Error::new(io::ErrorKind::Interrupted, "prompt cancelled"))
        }

        fn read_secret(&mut self, prompt: &str) -> io::Result<Option<String>> {
            self.read_line(prompt)
        }

        fn say(&mut self, _: &str) {}
    }

    #[test]
    fn test_cancelled_prompt_aborts() {
        assert!(matches!(confirm(&mut Cancelling, "Go?", false), Err(InstallError::Aborted)));
        assert!(matches!(prompt_password(&mut Cancelling, "root"), Err(InstallError::Aborted)));
        assert!(matches!(
            prompt_until(&mut Cancelling, "Name: ", "again", |_| true),
            Err(InstallError::Aborted)
        ));
    }

    #[test]
    fn test_split_prompt_moves_menu_above_question() {
        assert_eq!(split_prompt("Enter your hostname: "), (None, "Enter your hostname"));
        let (preamble, message) = split_prompt("Select GPU:\n0 -> mesa\n1 -> nvidia\nEnter choice [0-4]: ");
        assert_eq!(preamble, Some("Select GPU:\n0 -> mesa\n1 -> nvidia"));
        assert_eq!(message, "Enter choice [0-4]");
    }

    #[test]
    fn test_inquire_errors_map_to_prompter_contract() {
        let ok: io::Result<Option<String>> = from_inquire(Ok("sda".to_string()), || unreachable!());
        assert_eq!(ok.unwrap().as_deref(), Some("sda"));

        let no_tty = from_inquire::<String>(Err(InquireError::NotTTY), || Ok(Some("piped".into())));
        assert_eq!(no_tty.unwrap().as_deref(), Some("piped"));

        for cancel in [InquireError::OperationCanceled, InquireError::OperationInterrupted] {
            let err = from_inquire::<String>(Err(cancel), || unreachable!()).unwrap_err();
            assert_eq!(err.kind(), io::ErrorKind::Interrupted);
        }

        let io_err = InquireError::IO(io::Error::new(io::ErrorKind::BrokenPipe, "gone"));
        let err = from_inquire::<bool>(Err(io_err), || unreachable!()).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }

    #[test]
    fn test_prompt_password_requires_match() {
        let mut p = ScriptedPrompter::new(["", "one", "two", "s3cret", "s3cret"]);
        let secret = prompt_password(&mut p, "root").unwrap();
        assert_eq!(secret.expose(), "s3cret");
        assert!(p.saw("Password cannot be empty"));
        assert!(p.saw("Passwords do not match"));
        assert!(p.saw("Enter root password: "));
        assert!(p.saw("Re-enter root password: "));
    }

    #[test]
    fn test_prompt_password_keeps_surrounding_spaces() {
        let mut p = ScriptedPrompter::new([" pass word ", " pass word "]);
        assert_eq!(prompt_password(&mut p, "user").unwrap().expose(), " pass word ");
    }

    #[test]
    fn test_prompt_gpu_menu() {
        let mut p = ScriptedPrompter::new(["7", "abc", "2"]);
        assert_eq!(prompt_gpu(&mut p).unwrap(), GpuDriver::NvidiaProprietary);
        assert!(p.saw("1 -> new open nvidia (nvidia-open-dkms)"));
        assert!(p.saw(validation::GPU_HINT));
    }
}
