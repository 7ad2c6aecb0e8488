use std::io::{BufRead, Write};
use std::path::PathBuf;

use crate::classify::{CandidateResolver, NearTie, Resolution};
use crate::color::{color_name, generate_palette};
use crate::data::model::{ChainLength, ReferenceTable};
use crate::error::PromptError;
use crate::pipeline::Operator;
use crate::ui::plot::save_near_tie;
use crate::ui::prompt::{Prompter, ResponseMatcher};

// ---------------------------------------------------------------------------
// Console operator
// ---------------------------------------------------------------------------

/// The interactive [`Operator`]: a person at a terminal, with near-tie
/// figures written next to the run log.
pub struct ConsoleOperator<R, W> {
    prompter: Prompter<R, W>,
    matcher: Box<dyn ResponseMatcher>,
    skip_token: String,
    /// Reference times preset in the config; skips typing them in.
    preset: Option<ReferenceTable>,
    /// Where near-tie figures go; `None` disables rendering.
    figures: Option<PathBuf>,
}

impl<R: BufRead, W: Write> ConsoleOperator<R, W> {
    pub fn new(
        prompter: Prompter<R, W>,
        matcher: Box<dyn ResponseMatcher>,
        skip_token: impl Into<String>,
    ) -> Self {
        Self {
            prompter,
            matcher,
            skip_token: skip_token.into(),
            preset: None,
            figures: None,
        }
    }

    pub fn with_preset(mut self, preset: Option<ReferenceTable>) -> Self {
        self.preset = preset;
        self
    }

    pub fn with_figures(mut self, dir: PathBuf) -> Self {
        self.figures = Some(dir);
        self
    }
}

impl<R: BufRead, W: Write> CandidateResolver for ConsoleOperator<R, W> {
    fn resolve(&mut self, tie: &NearTie) -> Result<Resolution, PromptError> {
        if let Some(dir) = &self.figures {
            match save_near_tie(tie, dir) {
                Ok(path) => self.prompter.say(&format!("Figure: {}", path.display()))?,
                Err(e) => log::warn!("Could not render near-tie figure: {e}"),
            }
        }

        self.prompter.say(&format!(
            "Close matches for {} ({}) - {} at rt {}:",
            tie.sample_id, tie.group, tie.chain, tie.target_rt
        ))?;
        let colors = generate_palette(tie.candidates.len());
        for (i, (c, color)) in tie.candidates.iter().zip(colors).enumerate() {
            let area = c.area.map_or_else(|| "n/a".to_string(), |a| format!("{a:.3}"));
            self.prompter.say(&format!(
                "  {}: rt {:.2} (Δ {:.3}), area {area} [{}]",
                i + 1,
                c.rt,
                (c.rt - tie.target_rt).abs(),
                color_name(color)
            ))?;
        }

        let question = format!(
            "Enter the number associated with the correct retention time for {} in sample {} ({}), or type '{}' to skip:",
            tie.chain, tie.sample_id, tie.group, self.skip_token
        );
        let skip = self.skip_token.clone();
        self.prompter.choose(&question, tie.candidates.len(), &skip)
    }
}

impl<R: BufRead, W: Write> Operator for ConsoleOperator<R, W> {
    fn reference_table(
        &mut self,
        chains: &[ChainLength],
    ) -> Result<Option<ReferenceTable>, PromptError> {
        let wanted = self.prompter.confirm(
            "Do you want to detect components in this dataset by retention time? (Y/N):",
            self.matcher.as_ref(),
        )?;
        if !wanted {
            self.prompter.say("Component detection not selected.")?;
            return Ok(None);
        }
        if let Some(preset) = &self.preset {
            log::info!("Using {} preset reference retention times", preset.active().count());
            return Ok(Some(preset.clone()));
        }
        let skip = self.skip_token.clone();
        self.prompter.reference_times(chains, &skip).map(Some)
    }

    fn as_resolver(&mut self) -> &mut dyn CandidateResolver {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::Candidate;
    use crate::data::model::GroupKey;
    use crate::ui::prompt::TokenSet;
    use std::io::Cursor;

    fn operator(input: &str) -> ConsoleOperator<Cursor<Vec<u8>>, Vec<u8>> {
        let prompter = Prompter::new(Cursor::new(input.as_bytes().to_vec()), Vec::new(), 3);
        ConsoleOperator::new(prompter, Box::new(TokenSet::default()), "none")
    }

    fn tie() -> NearTie {
        NearTie {
            sample_id: "Lake 4cm".into(),
            group: GroupKey {
                date: "01/05/2024".into(),
                time: "10:00:00".into(),
            },
            chain: ChainLength::C18,
            target_rt: 500.0,
            trace: vec![(499.9, 4.0), (500.1, 5.0)],
            candidates: vec![
                Candidate { index: 0, rt: 499.9, area: Some(4.0) },
                Candidate { index: 1, rt: 500.1, area: Some(5.0) },
            ],
        }
    }

    #[test]
    fn declining_detection_returns_no_table() {
        let mut op = operator("no\n");
        assert_eq!(op.reference_table(&ChainLength::ALL).unwrap(), None);
    }

    #[test]
    fn reference_times_are_typed_in() {
        let mut op = operator("y\n450,500,none,none,510,none,none,none,none\n");
        let table = op.reference_table(&ChainLength::ALL).unwrap().unwrap();
        assert_eq!(table.get(ChainLength::C18), Some(500.0));
        assert_eq!(table.get(ChainLength::C24), Some(510.0));
        assert_eq!(table.active().count(), 3);
    }

    #[test]
    fn preset_skips_the_time_prompt() {
        let preset: ReferenceTable = [(ChainLength::C20, Some(520.0))].into_iter().collect();
        let mut op = operator("yes\n").with_preset(Some(preset.clone()));
        assert_eq!(op.reference_table(&ChainLength::ALL).unwrap(), Some(preset));
    }

    #[test]
    fn near_tie_prompt_renders_and_picks() {
        let dir = tempfile::tempdir().unwrap();
        let mut op = operator("2\n").with_figures(dir.path().to_path_buf());
        assert_eq!(op.resolve(&tie()).unwrap(), Resolution::Pick(1));
        assert!(dir.path().join("Sample Lake 4cm Chain C18 rt 500.png").is_file());
    }

    #[test]
    fn near_tie_can_be_skipped() {
        let mut op = operator("none\n");
        assert_eq!(op.resolve(&tie()).unwrap(), Resolution::Skip);
    }
}
