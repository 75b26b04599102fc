//! One `kor` invocation: audit, optional deletion, grouping, report

use crate::analysis::{AuditOutcome, Auditor, ExceptionSet, GroupBy, GroupedResults, RunError};
use crate::cluster::{CancelFlag, ClusterApi, ResourceKind};
use crate::config::Config;
use crate::delete::{DeletionSummary, Prompter, SafeDeleter};
use crate::filters::{FilterChain, FilterOptions};
use crate::notify::{SlackNotifier, SlackTarget};
use crate::report::{print_errors, ReportFormat, Reporter};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use miette::{IntoDiagnostic, Result};
use tracing::info;

/// Run-level options that are not filters
#[derive(Debug, Clone, Default)]
pub struct Opts {
    pub delete: bool,
    pub no_interactive: bool,
    pub group_by: GroupBy,
    pub show_reason: bool,
    pub format: ReportFormat,
    pub slack: Option<SlackTarget>,
}

/// Everything a run produced
#[derive(Debug)]
pub struct ScanReport {
    /// What gets rendered: the findings, or the deletion records when
    /// `--delete` was given
    pub results: GroupedResults,
    pub errors: Vec<RunError>,
    pub cancelled: bool,
    pub deletion: Option<DeletionSummary>,
}

impl ScanReport {
    /// Findings that are still unused after the run. Without deletion this
    /// is every finding.
    pub fn still_unused(&self) -> GroupedResults {
        match &self.deletion {
            Some(summary) => GroupedResults::from_findings(
                self.results.group_by(),
                summary.still_unused().map(|r| r.finding.clone()),
            ),
            None => self.results.clone(),
        }
    }
}

pub struct Scanner<'a> {
    api: &'a dyn ClusterApi,
    filter_options: FilterOptions,
    filters: FilterChain,
    exceptions: ExceptionSet,
    config_errors: Vec<RunError>,
    opts: Opts,
    cancel: CancelFlag,
    prompter: Option<Box<dyn Prompter + 'a>>,
    progress: bool,
}

impl<'a> Scanner<'a> {
    /// Validate filters and compile exceptions.
    ///
    /// Bad filter options abort; a bad exception entry only drops that
    /// entry and is reported with the run's other errors.
    pub fn new(
        api: &'a dyn ClusterApi,
        filter_options: FilterOptions,
        config: &Config,
        opts: Opts,
    ) -> std::result::Result<Self, RunError> {
        let filters = FilterChain::from_options(&filter_options)
            .map_err(|e| RunError::Setup(e.to_string()))?;

        let (exceptions, config_errors) = ExceptionSet::from_config(config);

        Ok(Self {
            api,
            filter_options,
            filters,
            exceptions,
            config_errors: config_errors.into_iter().map(RunError::from).collect(),
            opts,
            cancel: CancelFlag::new(),
            prompter: None,
            progress: false,
        })
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Answer deletion prompts with `prompter` instead of the terminal
    pub fn with_prompter(mut self, prompter: impl Prompter + 'a) -> Self {
        self.prompter = Some(Box::new(prompter));
        self
    }

    /// Show a progress bar on stderr while auditing
    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    pub fn opts(&self) -> &Opts {
        &self.opts
    }

    pub fn scan(&mut self, kinds: &[ResourceKind]) -> std::result::Result<ScanReport, RunError> {
        let mut auditor = Auditor::new(
            self.api,
            &self.filter_options,
            &self.filters,
            &self.exceptions,
        )
        .with_cancel(self.cancel.clone());

        if self.progress {
            auditor = auditor.with_progress(progress_bar());
        }

        let AuditOutcome {
            findings,
            errors,
            cancelled,
        } = auditor.audit(kinds)?;

        let mut all_errors = self.config_errors.clone();
        all_errors.extend(errors);

        if !self.opts.delete {
            return Ok(ScanReport {
                results: GroupedResults::from_findings(self.opts.group_by, findings),
                errors: all_errors,
                cancelled,
                deletion: None,
            });
        }

        let mut deleter = SafeDeleter::new(self.api, !self.opts.no_interactive)
            .with_cancel(self.cancel.clone());
        if let Some(prompter) = self.prompter.take() {
            deleter = deleter.with_boxed_prompter(prompter);
        }

        let mut summary = deleter.delete(findings);
        all_errors.append(&mut summary.errors);

        Ok(ScanReport {
            results: summary.to_results(self.opts.group_by),
            errors: all_errors,
            cancelled: cancelled || self.cancel.is_cancelled(),
            deletion: Some(summary),
        })
    }
}

fn progress_bar() -> ProgressBar {
    let pb = ProgressBar::new(0);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
    {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb
}

/// Print the report, then errors, then send it to Slack if configured
pub fn publish(report: &ScanReport, opts: &Opts) -> Result<()> {
    let reporter = Reporter::new(opts.format).with_show_reason(opts.show_reason);
    let output = reporter.render(&report.results).into_diagnostic()?;
    println!("{}", output.trim_end());

    if report.cancelled {
        eprintln!("{}", "Run interrupted, results may be incomplete.".yellow());
    }
    print_errors(&report.errors);

    if let Some(summary) = &report.deletion {
        info!(
            deleted = summary.deleted(),
            still_unused = summary.still_unused().count(),
            "Deletion summary"
        );
    }

    if let Some(target) = &opts.slack {
        let plain = reporter
            .with_color(false)
            .render(&report.results)
            .into_diagnostic()?;
        SlackNotifier::new(target.clone()).notify(&plain);
    }

    Ok(())
}
