//! Synchronous user prompts.
//!
//! Every prompt blocks the interaction until answered. A dismissed prompt
//! yields `None` (or `false` for confirmations).

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use log::debug;

pub trait Prompter {
    /// Picks one of `choices`; returns its index.
    fn choose(&mut self, prompt: &str, choices: &[String], default: Option<usize>) -> Option<usize>;

    fn read_string(&mut self, prompt: &str) -> Option<String>;

    fn confirm(&mut self, prompt: &str) -> bool;

    fn read_file_path(&mut self, prompt: &str, start_dir: Option<&Path>) -> Option<PathBuf>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedAnswer {
    Choice(usize),
    /// Accept the default of a choice prompt.
    DefaultChoice,
    Text(String),
    Confirm(bool),
    Path(PathBuf),
    Dismiss,
}

/// Answers prompts from a queue. An answer of the wrong shape, or an empty
/// queue, dismisses the prompt.
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    answers: VecDeque<ScriptedAnswer>,
    asked: Vec<String>,
}

impl ScriptedPrompter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn answer(mut self, answer: ScriptedAnswer) -> Self {
        self.answers.push_back(answer);
        self
    }

    pub fn choice(self, index: usize) -> Self {
        self.answer(ScriptedAnswer::Choice(index))
    }

    pub fn text(self, text: &str) -> Self {
        self.answer(ScriptedAnswer::Text(text.to_string()))
    }

    pub fn confirm_with(self, yes: bool) -> Self {
        self.answer(ScriptedAnswer::Confirm(yes))
    }

    pub fn path(self, path: impl Into<PathBuf>) -> Self {
        self.answer(ScriptedAnswer::Path(path.into()))
    }

    pub fn dismiss(self) -> Self {
        self.answer(ScriptedAnswer::Dismiss)
    }

    /// Prompts asked so far, in order.
    pub fn asked(&self) -> &[String] {
        &self.asked
    }

    pub fn remaining(&self) -> usize {
        self.answers.len()
    }

    fn next(&mut self, prompt: &str) -> Option<ScriptedAnswer> {
        debug!("Prompt: {prompt}");
        self.asked.push(prompt.to_string());
        self.answers.pop_front()
    }
}

impl Prompter for ScriptedPrompter {
    fn choose(&mut self, prompt: &str, choices: &[String], default: Option<usize>) -> Option<usize> {
        match self.next(prompt)? {
            ScriptedAnswer::Choice(index) if index < choices.len() => Some(index),
            ScriptedAnswer::DefaultChoice => default.filter(|&d| d < choices.len()),
            _ => None,
        }
    }

    fn read_string(&mut self, prompt: &str) -> Option<String> {
        match self.next(prompt)? {
            ScriptedAnswer::Text(text) => Some(text),
            _ => None,
        }
    }

    fn confirm(&mut self, prompt: &str) -> bool {
        matches!(self.next(prompt), Some(ScriptedAnswer::Confirm(true)))
    }

    fn read_file_path(&mut self, prompt: &str, _start_dir: Option<&Path>) -> Option<PathBuf> {
        match self.next(prompt)? {
            ScriptedAnswer::Path(path) => Some(path),
            ScriptedAnswer::Text(text) => Some(PathBuf::from(text)),
            _ => None,
        }
    }
}
