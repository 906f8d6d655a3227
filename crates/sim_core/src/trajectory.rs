use nalgebra::DMatrix;

/// Time-indexed state history.
///
/// `states` has one row per state variable (in `names` order) and one
/// column per entry of `times`.
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
    names: Vec<String>,
    times: Vec<f64>,
    states: DMatrix<f64>,
}

impl Trajectory {
    pub fn new(names: Vec<String>, times: Vec<f64>, states: DMatrix<f64>) -> Self {
        assert_eq!(names.len(), states.nrows(), "one name per state row");
        assert_eq!(times.len(), states.ncols(), "one column per time point");
        Self {
            names,
            times,
            states,
        }
    }

    pub fn from_names(names: &[&str], times: Vec<f64>, states: DMatrix<f64>) -> Self {
        Self::new(names.iter().map(|n| n.to_string()).collect(), times, states)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn states(&self) -> &DMatrix<f64> {
        &self.states
    }

    /// Number of time points.
    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Number of state variables.
    pub fn dimension(&self) -> usize {
        self.names.len()
    }

    pub fn value(&self, variable: usize, step: usize) -> f64 {
        self.states[(variable, step)]
    }

    pub fn series(&self, variable: usize) -> Vec<f64> {
        self.states.row(variable).iter().copied().collect()
    }

    pub fn series_by_name(&self, name: &str) -> Option<Vec<f64>> {
        let index = self.names.iter().position(|n| n == name)?;
        Some(self.series(index))
    }
}
