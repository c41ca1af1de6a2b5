use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;

use crate::query::Quantifier;
use crate::search::stats::SearchStatistics;
use crate::search::worklist::Verdict;

/// One replayed firing, with the transition resolved to its name and the
/// full-space binding index it fired under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceRow {
    pub transition: String,
    pub binding: u64,
}

/// The outcome of checking one query, printable as text or JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckReport {
    pub query: String,
    pub quantifier: Quantifier,
    pub verdict: Verdict,
    pub complete: bool,
    pub statistics: SearchStatistics,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace: Option<Vec<TraceRow>>,
}

impl CheckReport {
    pub fn new(
        query: String,
        quantifier: Quantifier,
        verdict: Verdict,
        complete: bool,
        statistics: SearchStatistics,
    ) -> Self {
        CheckReport {
            query,
            quantifier,
            verdict,
            complete,
            statistics,
            trace: None,
        }
    }

    pub fn with_trace(mut self, trace: Vec<TraceRow>) -> Self {
        self.trace = Some(trace);
        self
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Saves the JSON rendering to a file.
    pub fn save_to_file(&self, file_path: &str) -> std::io::Result<()> {
        let mut file = std::fs::File::create(file_path)?;
        let report = serde_json::to_string_pretty(&self)?;
        file.write_all(report.as_bytes())
    }
}

impl fmt::Display for CheckReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Query {} ({}): {}",
            self.query, self.quantifier, self.verdict
        )?;
        writeln!(
            f,
            "  exploration:       {}",
            if self.complete { "complete" } else { "incomplete" }
        )?;
        let stats = &self.statistics;
        writeln!(f, "  discovered states: {}", stats.discovered_states)?;
        writeln!(f, "  explored states:   {}", stats.explored_states)?;
        writeln!(f, "  checked states:    {}", stats.checked_states)?;
        writeln!(f, "  peak waiting:      {}", stats.peak_waiting_states)?;
        writeln!(f, "  end waiting:       {}", stats.end_waiting_states)?;
        writeln!(f, "  biggest encoding:  {} bytes", stats.biggest_encoding)?;
        match &self.trace {
            Some(steps) if steps.is_empty() => {
                writeln!(f, "  trace: the initial marking")?;
            }
            Some(steps) => {
                let rendered: Vec<String> = steps
                    .iter()
                    .map(|row| format!("{}[{}]", row.transition, row.binding))
                    .collect();
                writeln!(f, "  trace: {}", rendered.join(" -> "))?;
            }
            None => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_report() -> CheckReport {
        let statistics = SearchStatistics {
            discovered_states: 12,
            explored_states: 9,
            checked_states: 9,
            peak_waiting_states: 4,
            end_waiting_states: 2,
            biggest_encoding: 17,
        };
        CheckReport::new(
            "someone-eats".to_owned(),
            Quantifier::ExistsFinally,
            Verdict::Satisfied,
            true,
            statistics,
        )
        .with_trace(vec![
            TraceRow {
                transition: "sit".to_owned(),
                binding: 2,
            },
            TraceRow {
                transition: "eat".to_owned(),
                binding: 0,
            },
        ])
    }

    #[test]
    fn text_rendering_names_the_verdict_and_trace() {
        let text = sample_report().to_string();
        assert!(text.contains("Query someone-eats (EF): satisfied"));
        assert!(text.contains("discovered states: 12"));
        assert!(text.contains("trace: sit[2] -> eat[0]"));
    }

    #[test]
    fn empty_traces_blame_the_initial_marking() {
        let mut report = sample_report();
        report.trace = Some(Vec::new());
        assert!(report.to_string().contains("trace: the initial marking"));

        report.trace = None;
        assert!(!report.to_string().contains("trace:"));
    }

    #[test]
    fn json_round_trips() {
        let report = sample_report();
        let text = report.to_json().unwrap();
        let back: CheckReport = serde_json::from_str(&text).unwrap();
        assert_eq!(back, report);
    }

    #[test]
    fn untraced_reports_omit_the_field() {
        let mut report = sample_report();
        report.trace = None;
        assert!(!report.to_json().unwrap().contains("\"trace\""));
    }

    #[test]
    fn reports_save_as_json() {
        let path = std::env::temp_dir().join(format!("cpn-report-{}.json", std::process::id()));
        let report = sample_report();
        report.save_to_file(path.to_str().unwrap()).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).ok();
        let back: CheckReport = serde_json::from_str(&content).unwrap();
        assert_eq!(back, report);
    }
}
