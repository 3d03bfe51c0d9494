//! Where answers come from when no default applies.
//!
//! [`TerminalSource`] prompts on a terminal, [`ScriptedSource`] replays canned
//! answers (tests, batch front ends) and [`NonInteractive`] refuses to ask.

use std::collections::VecDeque;
use std::io::{self, BufRead, Write};

use super::MetadataError;

/// Capability to ask a human (or a stand-in) for missing run metadata.
///
/// Methods return the raw answer; validation and re-prompting belong to the
/// resolver.
pub trait MetadataSource {
    /// Ask for a flow rate in mL/min.
    fn ask_flow_rate(&mut self, subject: &str) -> Result<String, MetadataError>;

    /// Ask for an FPLC column volume in mL.
    fn ask_column_volume(&mut self, subject: &str) -> Result<String, MetadataError>;

    /// Ask for a channel label.
    fn ask_channel(&mut self, subject: &str) -> Result<String, MetadataError>;

    /// Ask which of several detectors should provide `channel`.
    ///
    /// The answer is a 1-based index into `detectors` or a detector name.
    fn ask_detector(&mut self, channel: &str, detectors: &[String]) -> Result<String, MetadataError>;

    /// Ask for an experiment id when no file provided one.
    fn ask_experiment_id(&mut self) -> Result<String, MetadataError>;

    /// Ask a yes/no question.
    fn confirm(&mut self, question: &str) -> Result<bool, MetadataError>;
}

/// Prompts on a line-oriented terminal.
#[derive(Debug)]
pub struct TerminalSource<R, W> {
    input: R,
    output: W,
}

impl TerminalSource<io::StdinLock<'static>, io::Stdout> {
    /// Prompt on the process's stdin/stdout.
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> TerminalSource<R, W> {
    /// Prompt on arbitrary streams.
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    fn ask(&mut self, prompt: &str) -> Result<String, MetadataError> {
        #[cfg(feature = "colorized_output")]
        let shown = console::style(prompt).bold().to_string();
        #[cfg(not(feature = "colorized_output"))]
        let shown = prompt.to_string();

        write!(self.output, "{} ", shown)?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Err(MetadataError::InputExhausted(prompt.to_string()));
        }
        Ok(line.trim().to_string())
    }
}

impl<R: BufRead, W: Write> MetadataSource for TerminalSource<R, W> {
    fn ask_flow_rate(&mut self, subject: &str) -> Result<String, MetadataError> {
        self.ask(&format!("Flow rate for {} (mL/min):", subject))
    }

    fn ask_column_volume(&mut self, subject: &str) -> Result<String, MetadataError> {
        self.ask(&format!("FPLC column volume for {} (mL):", subject))
    }

    fn ask_channel(&mut self, subject: &str) -> Result<String, MetadataError> {
        self.ask(&format!("Channel name for {}:", subject))
    }

    fn ask_detector(&mut self, channel: &str, detectors: &[String]) -> Result<String, MetadataError> {
        writeln!(self.output, "More than one detector reports channel '{}':", channel)?;
        for (i, detector) in detectors.iter().enumerate() {
            writeln!(self.output, "  {}. {}", i + 1, detector)?;
        }
        self.ask("Use which detector?")
    }

    fn ask_experiment_id(&mut self) -> Result<String, MetadataError> {
        self.ask("Experiment name:")
    }

    fn confirm(&mut self, question: &str) -> Result<bool, MetadataError> {
        let answer = self.ask(&format!("{} (y/n)", question))?;
        Ok(answer.to_ascii_lowercase().starts_with('y'))
    }
}

/// Replays a fixed list of answers in order and records every prompt.
#[derive(Debug, Clone, Default)]
pub struct ScriptedSource {
    answers: VecDeque<String>,
    asked: Vec<String>,
}

impl ScriptedSource {
    /// Source that answers with `answers`, front to back.
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: answers.into_iter().map(Into::into).collect(),
            asked: Vec::new(),
        }
    }

    /// Source with no answers; any prompt fails.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Every prompt issued so far.
    pub fn asked(&self) -> &[String] {
        &self.asked
    }

    /// Answers not consumed yet.
    pub fn remaining(&self) -> usize {
        self.answers.len()
    }

    fn next(&mut self, prompt: String) -> Result<String, MetadataError> {
        let answer = self.answers.pop_front();
        self.asked.push(prompt.clone());
        answer.ok_or(MetadataError::InputExhausted(prompt))
    }
}

impl MetadataSource for ScriptedSource {
    fn ask_flow_rate(&mut self, subject: &str) -> Result<String, MetadataError> {
        self.next(format!("flow rate: {}", subject))
    }

    fn ask_column_volume(&mut self, subject: &str) -> Result<String, MetadataError> {
        self.next(format!("column volume: {}", subject))
    }

    fn ask_channel(&mut self, subject: &str) -> Result<String, MetadataError> {
        self.next(format!("channel: {}", subject))
    }

    fn ask_detector(&mut self, channel: &str, detectors: &[String]) -> Result<String, MetadataError> {
        self.next(format!("detector for {}: {}", channel, detectors.join(", ")))
    }

    fn ask_experiment_id(&mut self) -> Result<String, MetadataError> {
        self.next("experiment id".to_string())
    }

    fn confirm(&mut self, question: &str) -> Result<bool, MetadataError> {
        let answer = self.next(format!("confirm: {}", question))?;
        Ok(answer.to_ascii_lowercase().starts_with('y'))
    }
}

/// Never prompts: every question is an error and every confirmation is "no".
#[derive(Debug, Clone, Copy, Default)]
pub struct NonInteractive;

impl MetadataSource for NonInteractive {
    fn ask_flow_rate(&mut self, subject: &str) -> Result<String, MetadataError> {
        Err(MetadataError::Unresolved(format!("flow rate for {}", subject)))
    }

    fn ask_column_volume(&mut self, subject: &str) -> Result<String, MetadataError> {
        Err(MetadataError::Unresolved(format!("column volume for {}", subject)))
    }

    fn ask_channel(&mut self, subject: &str) -> Result<String, MetadataError> {
        Err(MetadataError::Unresolved(format!("channel name for {}", subject)))
    }

    fn ask_detector(&mut self, channel: &str, _detectors: &[String]) -> Result<String, MetadataError> {
        Err(MetadataError::Unresolved(format!("detector for channel '{}'", channel)))
    }

    fn ask_experiment_id(&mut self) -> Result<String, MetadataError> {
        Err(MetadataError::Unresolved("experiment id".to_string()))
    }

    fn confirm(&mut self, _question: &str) -> Result<bool, MetadataError> {
        Ok(false)
    }
}
