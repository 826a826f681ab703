//! Result types for bulk operations.

/// Result of a batch operation for a single item.
///
/// This struct represents the outcome of one operation within a bulk request.
/// It indicates whether the operation succeeded and includes the server's
/// error reason if it failed.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchOperationResult {
    /// The document id, as assigned or echoed by the server.
    pub id: String,
    /// Whether the operation succeeded.
    pub success: bool,
    /// Error reason if the operation failed.
    pub error: Option<String>,
}

/// Summary of a batch operation containing aggregate statistics and individual results.
///
/// This struct provides a complete overview of a bulk operation, including the total
/// number of items processed, how many succeeded and failed, and detailed results for
/// each individual item. This allows callers to handle partial failures gracefully.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchOperationSummary {
    /// Total number of items in the batch.
    pub total: usize,
    /// Number of successful operations.
    pub succeeded: usize,
    /// Number of failed operations.
    pub failed: usize,
    /// Individual results for each item.
    pub results: Vec<BatchOperationResult>,
}

impl BatchOperationSummary {
    /// Fold another summary, e.g. from a later bulk request, into this one.
    pub fn merge(&mut self, other: BatchOperationSummary) {
        self.total += other.total;
        self.succeeded += other.succeeded;
        self.failed += other.failed;
        self.results.extend(other.results);
    }

    /// Build a summary from per-item results.
    pub fn from_results(results: Vec<BatchOperationResult>) -> Self {
        let succeeded = results.iter().filter(|r| r.success).count();
        Self {
            total: results.len(),
            succeeded,
            failed: results.len() - succeeded,
            results,
        }
    }

    pub fn is_complete_success(&self) -> bool {
        self.failed == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(id: &str, success: bool) -> BatchOperationResult {
        BatchOperationResult {
            id: id.to_string(),
            success,
            error: (!success).then(|| "mapper_parsing_exception".to_string()),
        }
    }

    #[test]
    fn test_merge_summaries() {
        let mut summary = BatchOperationSummary::from_results(vec![result("1", true)]);
        summary.merge(BatchOperationSummary::from_results(vec![
            result("2", true),
            result("3", false),
        ]));

        assert_eq!(summary.total, 3);
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.results[2].id, "3");
        assert!(!summary.is_complete_success());
    }

    #[test]
    fn test_empty_summary() {
        let summary = BatchOperationSummary::default();
        assert_eq!(summary.total, 0);
        assert!(summary.results.is_empty());
        assert!(summary.is_complete_success());
    }
}
