//! Result types produced by running a `GherkinDocument` through a
//! `BddExecutor`.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    Passed,
    Failed,
    Pending,
    Undefined,
    Skipped,
}

#[derive(Debug, Clone)]
pub struct StepResult {
    pub keyword: String,
    pub text: String,
    pub status: StepStatus,
    pub duration_ms: u64,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioStatus {
    Passed,
    Failed,
    Skipped,
    Pending,
    Undefined,
}

#[derive(Debug, Clone)]
pub struct ScenarioResult {
    pub name: String,
    pub status: ScenarioStatus,
    pub steps: Vec<StepResult>,
    pub duration_ms: u64,
    pub tags: Vec<String>,
    pub line: usize,
    pub hook_error: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct Summary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub pending: usize,
    pub undefined: usize,
}

impl Summary {
    pub fn record(&mut self, status: ScenarioStatus) {
        self.total += 1;
        match status {
            ScenarioStatus::Passed => self.passed += 1,
            ScenarioStatus::Failed => self.failed += 1,
            ScenarioStatus::Skipped => self.skipped += 1,
            ScenarioStatus::Pending => self.pending += 1,
            ScenarioStatus::Undefined => self.undefined += 1,
        }
    }

    pub fn merge(&mut self, other: &Summary) {
        self.total += other.total;
        self.passed += other.passed;
        self.failed += other.failed;
        self.skipped += other.skipped;
        self.pending += other.pending;
        self.undefined += other.undefined;
    }
}

#[derive(Debug, Clone)]
pub struct FeatureResult {
    pub name: String,
    pub scenarios: Vec<ScenarioResult>,
    pub summary: Summary,
}
