use colored::Colorize;

use super::OutputFormatter;
use crate::colors::CatppuccinExt;
use crate::status::{ResolutionResult, Status};
use crate::tracked::DomainReport;

pub struct HumanFormatter {
    use_colors: bool,
}

impl Default for HumanFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl HumanFormatter {
    pub fn new() -> Self {
        Self { use_colors: true }
    }

    pub fn without_colors(mut self) -> Self {
        self.use_colors = false;
        self
    }

    fn label(&self, text: &str) -> String {
        if self.use_colors {
            text.sky().bold().to_string()
        } else {
            text.to_string()
        }
    }

    fn value(&self, text: &str) -> String {
        if self.use_colors {
            text.ctp_white().to_string()
        } else {
            text.to_string()
        }
    }

    fn muted(&self, text: &str) -> String {
        if self.use_colors {
            text.overlay1().to_string()
        } else {
            text.to_string()
        }
    }

    fn badge(&self, status: Status) -> String {
        let text = format!("{:<8}", status.as_str().to_uppercase());
        if self.use_colors {
            text.status_color(status).bold().to_string()
        } else {
            text
        }
    }

    fn header(&self, text: &str) -> String {
        if self.use_colors {
            format!("\n{}\n{}", text.lavender().bold(), "─".repeat(text.len()).subtext0())
        } else {
            format!("\n{}\n{}", text, "-".repeat(text.len()))
        }
    }

    fn expiry_line(&self, days: Option<i64>, date: Option<chrono::NaiveDate>) -> Option<String> {
        let date = date?.format("%Y-%m-%d").to_string();
        let text = match days {
            Some(d) if d < 0 => format!("{} (expired {} days ago)", date, -d),
            Some(0) => format!("{} (expires today!)", date),
            Some(d) => format!("{} ({} days)", date, d),
            None => date,
        };
        Some(text)
    }
}

impl OutputFormatter for HumanFormatter {
    fn format_result(&self, result: &ResolutionResult) -> String {
        let mut output = Vec::new();

        output.push(self.header(&format!("Expiry: {}", result.domain)));
        output.push(format!(
            "  {}: {}",
            self.label("Status"),
            self.badge(result.status).trim_end()
        ));

        if let Some(expiry) = self.expiry_line(result.days_remaining, result.expiration_date) {
            output.push(format!("  {}: {}", self.label("Expires"), self.value(&expiry)));
        }

        if let Some(ref registrar) = result.registrar {
            output.push(format!(
                "  {}: {}",
                self.label("Registrar"),
                self.value(registrar)
            ));
        }

        if let Some(ref error) = result.error {
            output.push(format!("  {}: {}", self.label("Error"), self.muted(error)));
        }

        if let Some(source) = result.source {
            output.push(format!(
                "  {}: {}",
                self.label("Source"),
                self.muted(source.as_str())
            ));
        }

        output.join("\n")
    }

    fn format_report(&self, report: &[DomainReport]) -> String {
        let mut output = Vec::new();
        output.push(self.header(&format!("Domain expiry report ({} domains)", report.len())));

        let width = report.iter().map(|r| r.domain.len()).max().unwrap_or(0);

        for row in report {
            let detail = match (&row.error, self.expiry_line(row.days_left, row.expiration_date)) {
                (Some(error), _) => self.muted(error),
                (None, Some(expiry)) => {
                    let registrar = row.registrar.as_deref().unwrap_or("-");
                    format!("{}  {}", self.value(&expiry), self.muted(registrar))
                }
                (None, None) => self.muted("-"),
            };
            output.push(format!(
                "  {:>3}  {}  {:<width$}  {}",
                row.id,
                self.badge(row.status),
                row.domain,
                detail,
                width = width
            ));
        }

        let mut counts: Vec<(Status, usize)> = Vec::new();
        for row in report {
            match counts.iter_mut().find(|(s, _)| *s == row.status) {
                Some((_, n)) => *n += 1,
                None => counts.push((row.status, 1)),
            }
        }
        counts.sort_by_key(|(s, _)| std::cmp::Reverse(s.severity()));

        if !counts.is_empty() {
            let summary: Vec<String> = counts
                .iter()
                .map(|(s, n)| format!("{} {}", n, s.as_str()))
                .collect();
            output.push(String::new());
            output.push(format!("  {}", self.muted(&summary.join(", "))));
        }

        output.join("\n")
    }
}
