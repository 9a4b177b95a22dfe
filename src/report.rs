use std::fmt::Display;
use std::path::PathBuf;
use tracing::*;

/// Result of one item in a batch: the files it produced or why it failed.
#[derive(Clone, Debug, PartialEq)]
pub struct ItemOutcome {
    pub id: String,
    pub result: Result<Vec<PathBuf>, String>,
}

impl ItemOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Ordered outcomes of a batch that keeps going past failures.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BatchReport {
    pub name: String,
    pub items: Vec<ItemOutcome>,
}

impl BatchReport {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            items: vec![],
        }
    }

    pub fn record_success(&mut self, id: impl Into<String>, paths: Vec<PathBuf>) {
        self.items.push(ItemOutcome {
            id: id.into(),
            result: Ok(paths),
        });
    }

    pub fn record_failure(&mut self, id: impl Into<String>, reason: impl Display) {
        let id = id.into();
        warn!("{}: {id} failed: {reason}", self.name);
        self.items.push(ItemOutcome {
            id,
            result: Err(reason.to_string()),
        });
    }

    pub fn succeeded(&self) -> usize {
        self.items.iter().filter(|item| item.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.items.len() - self.succeeded()
    }

    pub fn failures(&self) -> impl Iterator<Item = &ItemOutcome> {
        self.items.iter().filter(|item| !item.is_ok())
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn extend(&mut self, other: BatchReport) {
        self.items.extend(other.items);
    }

    pub fn log_summary(&self) {
        if self.failed() > 0 {
            warn!("{self}");
        } else {
            info!("{self}");
        }
    }
}

impl Display for BatchReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {} succeeded, {} failed",
            self.name,
            self.succeeded(),
            self.failed()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts() {
        let mut report = BatchReport::new("landsat");
        report.record_success("a", vec![PathBuf::from("a.tif")]);
        report.record_failure("b", "HTTP 404");
        report.record_success("c", vec![]);
        assert_eq!(report.succeeded(), 2);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.failures().next().unwrap().id, "b");
        assert_eq!(report.to_string(), "landsat: 2 succeeded, 1 failed");
    }

    #[test]
    fn test_extend_keeps_order() {
        let mut first = BatchReport::new("all");
        first.record_success("a", vec![]);
        let mut second = BatchReport::new("sentinel");
        second.record_failure("b", "boom");
        first.extend(second);
        let ids: Vec<&str> = first.items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }
}
