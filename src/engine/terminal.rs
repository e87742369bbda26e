use std::collections::VecDeque;
use std::io::{self, Write};

use rustyline::{error::ReadlineError, DefaultEditor};
use tracing::debug;

/// Output sink and confirmation source used by command handlers
pub trait Terminal {
    /// Print a block followed by a newline
    fn print(&mut self, text: &str);

    /// Write a fragment without a newline and flush it
    fn write_fragment(&mut self, text: &str);

    /// Ask a yes/no question. Anything but an explicit yes is a no.
    fn confirm(&mut self, question: &str) -> bool;

    fn clear_screen(&mut self);
}

/// Terminal writing to stdout and reading through the line editor
#[derive(Debug)]
pub struct StdTerminal {
    editor: DefaultEditor,
}

impl StdTerminal {
    pub fn new() -> rustyline::Result<Self> {
        Ok(Self {
            editor: DefaultEditor::new()?,
        })
    }

    /// Read one line at `prompt`, recording non-blank lines in history
    pub fn read_line(&mut self, prompt: &str) -> rustyline::Result<String> {
        let line = self.editor.readline(prompt)?;
        if !line.trim().is_empty() {
            let _ = self.editor.add_history_entry(line.as_str());
        }
        Ok(line)
    }
}

impl Terminal for StdTerminal {
    fn print(&mut self, text: &str) {
        println!("{}", text);
    }

    fn write_fragment(&mut self, text: &str) {
        let mut stdout = io::stdout();
        let _ = stdout.write_all(text.as_bytes());
        let _ = stdout.flush();
    }

    fn confirm(&mut self, question: &str) -> bool {
        match self.editor.readline(&format!("{} [y/N]: ", question)) {
            Ok(answer) => is_yes(&answer),
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => false,
            Err(e) => {
                debug!(error = %e, "confirmation read failed");
                false
            }
        }
    }

    fn clear_screen(&mut self) {
        let _ = self.editor.clear_screen();
    }
}

/// True for `y` or `yes`, case-insensitively
pub fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

/// Captures output and replays scripted confirmation answers
#[derive(Debug, Default)]
pub struct RecordingTerminal {
    output: String,
    answers: VecDeque<bool>,
    questions: Vec<String>,
    clears: usize,
}

impl RecordingTerminal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue answers for upcoming confirmations; an empty queue answers no
    pub fn with_answers(answers: &[bool]) -> Self {
        Self {
            answers: answers.iter().copied().collect(),
            ..Self::default()
        }
    }

    /// Everything printed so far
    pub fn output(&self) -> &str {
        &self.output
    }

    /// Return and reset the captured output
    pub fn take_output(&mut self) -> String {
        std::mem::take(&mut self.output)
    }

    pub fn questions(&self) -> &[String] {
        &self.questions
    }

    pub fn clear_count(&self) -> usize {
        self.clears
    }
}

impl Terminal for RecordingTerminal {
    fn print(&mut self, text: &str) {
        self.output.push_str(text);
        self.output.push('\n');
    }

    fn write_fragment(&mut self, text: &str) {
        self.output.push_str(text);
    }

    fn confirm(&mut self, question: &str) -> bool {
        self.questions.push(question.to_string());
        self.answers.pop_front().unwrap_or(false)
    }

    fn clear_screen(&mut self) {
        self.clears += 1;
    }
}
