use super::{DeletionOutcome, DeletionRecord, DeletionSummary};
use crate::analysis::{Finding, RunError};
use crate::cluster::{scope_of, CancelFlag, ClusterApi};
use colored::Colorize;
use dialoguer::{theme::ColorfulTheme, Confirm};
use std::collections::VecDeque;
use std::io;
use tracing::{info, warn};

/// Reply to a deletion prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Answer {
    Yes,
    No,
    /// Ctrl-C at the prompt; stops the whole deletion pass
    Interrupted,
}

impl From<bool> for Answer {
    fn from(yes: bool) -> Self {
        if yes {
            Answer::Yes
        } else {
            Answer::No
        }
    }
}

/// Source of answers during interactive deletion
pub trait Prompter {
    fn confirm_delete(&mut self, finding: &Finding) -> Answer;

    /// Asked after a declined deletion
    fn confirm_flag_used(&mut self, finding: &Finding) -> Answer;
}

/// Terminal prompts. A prompt that cannot be shown counts as "no".
///
/// The prompt reads the terminal in raw mode, so Ctrl-C arrives as an
/// interrupted read rather than a signal.
pub struct DialoguerPrompter {
    theme: ColorfulTheme,
}

impl DialoguerPrompter {
    pub fn new() -> Self {
        Self {
            theme: ColorfulTheme::default(),
        }
    }

    fn ask(&self, prompt: String) -> Answer {
        match Confirm::with_theme(&self.theme)
            .with_prompt(prompt)
            .default(false)
            .interact()
        {
            Ok(answer) => answer.into(),
            Err(dialoguer::Error::IO(e)) if e.kind() == io::ErrorKind::Interrupted => {
                Answer::Interrupted
            }
            Err(e) => {
                warn!(error = %e, "Prompt failed, treating as no");
                Answer::No
            }
        }
    }
}

impl Default for DialoguerPrompter {
    fn default() -> Self {
        Self::new()
    }
}

impl Prompter for DialoguerPrompter {
    fn confirm_delete(&mut self, finding: &Finding) -> Answer {
        self.ask(format!(
            "Delete {} '{}' in namespace '{}'?",
            finding.kind,
            finding.name(),
            finding.namespace
        ))
    }

    fn confirm_flag_used(&mut self, finding: &Finding) -> Answer {
        self.ask(format!(
            "Label {} '{}' as used (kor/used=true) so it is skipped next time?",
            finding.kind,
            finding.name()
        ))
    }
}

/// Pre-recorded answers, consumed in order; "no" once they run out.
/// Accepts plain `bool`s or [`Answer`]s.
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    answers: VecDeque<Answer>,
}

impl ScriptedPrompter {
    pub fn new<A: Into<Answer>>(answers: impl IntoIterator<Item = A>) -> Self {
        Self {
            answers: answers.into_iter().map(Into::into).collect(),
        }
    }

    fn next(&mut self) -> Answer {
        self.answers.pop_front().unwrap_or(Answer::No)
    }
}

impl Prompter for ScriptedPrompter {
    fn confirm_delete(&mut self, _finding: &Finding) -> Answer {
        self.next()
    }

    fn confirm_flag_used(&mut self, _finding: &Finding) -> Answer {
        self.next()
    }
}

/// Deletes findings through the transport, optionally confirming each one
pub struct SafeDeleter<'a> {
    api: &'a dyn ClusterApi,
    interactive: bool,
    prompter: Box<dyn Prompter + 'a>,
    cancel: CancelFlag,
}

impl<'a> SafeDeleter<'a> {
    pub fn new(api: &'a dyn ClusterApi, interactive: bool) -> Self {
        Self {
            api,
            interactive,
            prompter: Box::new(DialoguerPrompter::new()),
            cancel: CancelFlag::new(),
        }
    }

    pub fn with_prompter(mut self, prompter: impl Prompter + 'a) -> Self {
        self.prompter = Box::new(prompter);
        self
    }

    pub fn with_boxed_prompter(mut self, prompter: Box<dyn Prompter + 'a>) -> Self {
        self.prompter = prompter;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Delete every finding. Failures are recorded and the run moves on.
    pub fn delete(&mut self, findings: Vec<Finding>) -> DeletionSummary {
        let mut summary = DeletionSummary::default();

        if findings.is_empty() {
            return summary;
        }

        if self.interactive {
            eprintln!();
            eprintln!("{}", "Interactive mode - confirm each deletion:".cyan().bold());
        }

        for finding in findings {
            let outcome = self.delete_one(&finding, &mut summary.errors);
            summary.records.push(DeletionRecord { finding, outcome });
        }

        info!(
            deleted = summary.deleted(),
            total = summary.records.len(),
            "Deletion finished"
        );
        summary
    }

    fn delete_one(&mut self, finding: &Finding, errors: &mut Vec<RunError>) -> DeletionOutcome {
        if self.cancel.is_cancelled() {
            return DeletionOutcome::Cancelled;
        }

        let kind = finding.kind;
        let namespace = scope_of(kind, &finding.namespace);

        if self.interactive {
            match self.prompter.confirm_delete(finding) {
                Answer::Yes => {}
                Answer::Interrupted => return self.interrupt(),
                Answer::No => {
                    return match self.prompter.confirm_flag_used(finding) {
                        Answer::Yes => self.flag_used(finding, errors),
                        Answer::No => DeletionOutcome::Skipped,
                        Answer::Interrupted => self.interrupt(),
                    };
                }
            }
        }

        match self.api.delete(kind, namespace, finding.name()) {
            Ok(()) => {
                eprintln!("  {} Deleted {} '{}'", "✓".green(), kind, finding.name());
                DeletionOutcome::Deleted
            }
            Err(source) => {
                eprintln!(
                    "  {} Failed to delete {} '{}': {}",
                    "✗".red(),
                    kind,
                    finding.name(),
                    source
                );
                let message = source.to_string();
                errors.push(RunError::Delete {
                    kind,
                    namespace: finding.namespace.clone(),
                    name: finding.name().to_string(),
                    source,
                });
                DeletionOutcome::Failed(message)
            }
        }
    }

    /// Label a declined finding `kor/used=true`
    fn flag_used(&self, finding: &Finding, errors: &mut Vec<RunError>) -> DeletionOutcome {
        let kind = finding.kind;
        match self
            .api
            .flag_used(kind, scope_of(kind, &finding.namespace), finding.name())
        {
            Ok(()) => {
                eprintln!("  {} Labelled {} '{}' as used", "→".dimmed(), kind, finding.name());
                DeletionOutcome::FlaggedUsed
            }
            Err(source) => {
                warn!(kind = %kind, name = finding.name(), error = %source, "Failed to label as used");
                errors.push(RunError::Delete {
                    kind,
                    namespace: finding.namespace.clone(),
                    name: finding.name().to_string(),
                    source,
                });
                DeletionOutcome::Skipped
            }
        }
    }

    /// Cancel the run; this and every remaining finding is left alone
    fn interrupt(&self) -> DeletionOutcome {
        warn!("Interrupted at prompt, no further deletions");
        self.cancel.cancel();
        DeletionOutcome::Cancelled
    }
}
