use std::io::{BufRead, Write};

use crate::classify::Resolution;
use crate::data::model::{ChainLength, ReferenceTable};
use crate::error::PromptError;

// ---------------------------------------------------------------------------
// Yes / no vocabulary
// ---------------------------------------------------------------------------

/// Recognizes affirmative and negative answers. Phrasing and locale are up
/// to the implementation.
pub trait ResponseMatcher {
    fn is_affirmative(&self, answer: &str) -> bool;
    fn is_negative(&self, answer: &str) -> bool;
}

/// Case-insensitive token lists, usually from the config file.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenSet {
    pub affirmative: Vec<String>,
    pub negative: Vec<String>,
}

impl Default for TokenSet {
    fn default() -> Self {
        Self {
            affirmative: vec!["y".into(), "yes".into()],
            negative: vec!["n".into(), "no".into()],
        }
    }
}

impl ResponseMatcher for TokenSet {
    fn is_affirmative(&self, answer: &str) -> bool {
        self.affirmative.iter().any(|t| t.eq_ignore_ascii_case(answer))
    }

    fn is_negative(&self, answer: &str) -> bool {
        self.negative.iter().any(|t| t.eq_ignore_ascii_case(answer))
    }
}

// ---------------------------------------------------------------------------
// Prompter
// ---------------------------------------------------------------------------

/// Line-oriented prompts with a retry budget. Every invalid answer prints a
/// reason and asks again; after `max_attempts` invalid answers the prompt
/// gives up with [`PromptError::TooManyAttempts`].
pub struct Prompter<R, W> {
    input: R,
    output: W,
    max_attempts: u32,
}

impl<R: BufRead, W: Write> Prompter<R, W> {
    pub fn new(input: R, output: W, max_attempts: u32) -> Self {
        Self {
            input,
            output,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Write free text (candidate listings and the like).
    pub fn say(&mut self, text: &str) -> Result<(), PromptError> {
        writeln!(self.output, "{text}")?;
        self.output.flush()?;
        Ok(())
    }

    /// Ask `question` until `parse` accepts the trimmed answer.
    pub fn ask<T>(
        &mut self,
        question: &str,
        mut parse: impl FnMut(&str) -> Result<T, String>,
    ) -> Result<T, PromptError> {
        for attempt in 1..=self.max_attempts {
            writeln!(self.output, "{question}")?;
            self.output.flush()?;

            let mut line = String::new();
            if self.input.read_line(&mut line)? == 0 {
                return Err(PromptError::InputClosed(question.to_string()));
            }
            match parse(line.trim()) {
                Ok(value) => return Ok(value),
                Err(reason) => {
                    log::debug!("Rejected answer {:?} (attempt {attempt})", line.trim());
                    writeln!(self.output, "{reason}\n")?;
                }
            }
        }
        Err(PromptError::TooManyAttempts {
            prompt: question.to_string(),
            attempts: self.max_attempts,
        })
    }

    pub fn confirm(
        &mut self,
        question: &str,
        matcher: &dyn ResponseMatcher,
    ) -> Result<bool, PromptError> {
        self.ask(question, |answer| {
            if matcher.is_affirmative(answer) {
                Ok(true)
            } else if matcher.is_negative(answer) {
                Ok(false)
            } else {
                Err("Invalid response. Please answer 'yes' or 'no'.".to_string())
            }
        })
    }

    /// One comma-separated entry per chain: a retention time or `skip_token`.
    pub fn reference_times(
        &mut self,
        chains: &[ChainLength],
        skip_token: &str,
    ) -> Result<ReferenceTable, PromptError> {
        let labels: Vec<&str> = chains.iter().map(|c| c.label()).collect();
        let question = format!(
            "Enter retention times for {} separated by commas (type '{skip_token}' for any you don't want to use):",
            labels.join(", ")
        );
        self.ask(&question, |answer| parse_reference_times(answer, chains, skip_token))
    }

    /// 1-based choice among `count` candidates, or `skip_token`.
    pub fn choose(
        &mut self,
        question: &str,
        count: usize,
        skip_token: &str,
    ) -> Result<Resolution, PromptError> {
        self.ask(question, |answer| {
            if answer.eq_ignore_ascii_case(skip_token) {
                return Ok(Resolution::Skip);
            }
            match answer.parse::<usize>() {
                Ok(n) if (1..=count).contains(&n) => Ok(Resolution::Pick(n - 1)),
                _ => Err(format!("Enter a number from 1 to {count}, or '{skip_token}'.")),
            }
        })
    }
}

fn parse_reference_times(
    answer: &str,
    chains: &[ChainLength],
    skip_token: &str,
) -> Result<ReferenceTable, String> {
    let entries: Vec<&str> = answer.split(',').map(str::trim).collect();
    if entries.len() != chains.len() {
        return Err(format!(
            "Invalid input. Please provide exactly {} values (got {}).",
            chains.len(),
            entries.len()
        ));
    }
    chains
        .iter()
        .zip(entries)
        .map(|(&chain, entry)| {
            if entry.eq_ignore_ascii_case(skip_token) {
                return Ok((chain, None));
            }
            match entry.parse::<f64>() {
                Ok(rt) if rt.is_finite() && rt > 0.0 => Ok((chain, Some(rt))),
                _ => Err(format!("Invalid retention time '{entry}' for {chain}.")),
            }
        })
        .collect()
}
