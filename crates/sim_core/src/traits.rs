use num_traits::{Float, FromPrimitive};
use std::fmt::Debug;

/// A trait for types that can be used as scalars in our dynamical systems.
/// Must support basic arithmetic, debug printing, and conversion from f64.
pub trait Scalar: Float + FromPrimitive + Debug + 'static {}

impl<T: Float + FromPrimitive + Debug + 'static> Scalar for T {}

/// Right-hand side of an ODE system dx/dt = f(t, x).
pub trait DynamicalSystem<T: Scalar> {
    /// Returns the dimension of the state space.
    fn dimension(&self) -> usize;

    /// Evaluates the vector field.
    /// x: current state
    /// t: current time
    /// out: buffer to write dx/dt into
    fn apply(&self, t: T, x: &[T], out: &mut [T]);
}

/// A trait for embedded Runge-Kutta pairs that attempt one step and report
/// how far the candidate is from the requested tolerance.
pub trait AdaptiveStepper<T: Scalar> {
    /// Order of the embedded error estimator, used for step-size control.
    fn error_order(&self) -> usize;

    /// Number of right-hand-side evaluations performed by one attempt.
    fn evaluations_per_step(&self) -> usize;

    /// Attempts a step of size `dt` from `(t, state)`.
    /// f0: derivative at `(t, state)`
    /// state_out: candidate state at `t + dt`
    /// f_out: derivative at the candidate
    ///
    /// Returns the weighted RMS error norm; the step is acceptable when it is below one.
    #[allow(clippy::too_many_arguments)]
    fn attempt(
        &mut self,
        system: &impl DynamicalSystem<T>,
        t: T,
        state: &[T],
        f0: &[T],
        dt: T,
        rtol: T,
        atol: T,
        state_out: &mut [T],
        f_out: &mut [T],
    ) -> T;
}
