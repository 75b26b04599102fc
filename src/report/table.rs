use crate::analysis::{GroupBy, GroupedResults, ReportEntry};
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL_CONDENSED, ContentArrangement, Table};

/// Human-readable report, one table per outer group
pub struct TableReporter {
    show_reason: bool,
    color: bool,
}

impl TableReporter {
    pub fn new(show_reason: bool) -> Self {
        Self {
            show_reason,
            color: true,
        }
    }

    /// Plain headings without terminal escape codes when `false`
    pub fn with_color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }

    pub fn render(&self, results: &GroupedResults) -> String {
        if results.is_empty() {
            let message = "No unused resources found.";
            return if self.color {
                format!("{}\n", message.green().bold())
            } else {
                format!("{}\n", message)
            };
        }

        let with_status = results.all_entries().any(|e| e.deletion.is_some());
        let mut output = String::new();

        for (outer, groups) in results.groups() {
            output.push_str(&self.heading(results.group_by(), outer));
            output.push('\n');

            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL_CONDENSED)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(self.header(results.group_by(), with_status));

            let mut index = 0;
            for (inner, entries) in groups {
                for entry in entries {
                    index += 1;
                    table.add_row(self.row(index, inner, entry, with_status));
                }
            }

            output.push_str(&table.to_string());
            output.push_str("\n\n");
        }

        output
    }

    fn header(&self, group_by: GroupBy, with_status: bool) -> Vec<&'static str> {
        let inner = match group_by {
            GroupBy::Namespace => "RESOURCE TYPE",
            GroupBy::Resource => "NAMESPACE",
        };
        let mut header = vec!["#", inner, "RESOURCE NAME"];
        if self.show_reason {
            header.push("REASON");
        }
        if with_status {
            header.push("STATUS");
        }
        header
    }

    fn row(&self, index: usize, inner: &str, entry: &ReportEntry, with_status: bool) -> Vec<String> {
        let mut row = vec![index.to_string(), inner.to_string(), entry.name.clone()];
        if self.show_reason {
            row.push(entry.reason.clone());
        }
        if with_status {
            let status = match &entry.deletion {
                Some(outcome) => outcome.label().to_string(),
                None => String::new(),
            };
            row.push(status);
        }
        row
    }

    fn heading(&self, group_by: GroupBy, outer: &str) -> String {
        let text = match group_by {
            GroupBy::Namespace if outer.is_empty() => {
                "Unused cluster-scoped resources:".to_string()
            }
            GroupBy::Namespace => format!("Unused resources in namespace: \"{}\"", outer),
            GroupBy::Resource => format!("Unused {}s:", outer),
        };
        if self.color {
            text.cyan().bold().to_string()
        } else {
            text
        }
    }
}
