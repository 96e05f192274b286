use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("no idle workers available")]
    NoWorkers,
    #[error("unknown strategy {0:?}")]
    UnknownStrategy(String),
    #[error(transparent)]
    TagExpr(#[from] browsecraft_bdd::TagExprError),
}
