use clap::ValueEnum;
use flowcv_core::SolverKind;

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum SolverChoice {
    Lbfgs,
    Bb,
    Dore,
}

impl SolverChoice {
    /// Per-solver iteration budget before the multiplier is applied.
    pub fn base_iterations(self) -> usize {
        match self {
            SolverChoice::Lbfgs => 50,
            SolverChoice::Bb => 200,
            SolverChoice::Dore => 105,
        }
    }
}

impl From<SolverChoice> for SolverKind {
    fn from(choice: SolverChoice) -> Self {
        match choice {
            SolverChoice::Lbfgs => SolverKind::Lbfgs,
            SolverChoice::Bb => SolverKind::Bb,
            SolverChoice::Dore => SolverKind::Dore,
        }
    }
}
