use nalgebra::{DMatrix, DVector};

/// Iteration cap and convergence tolerances for the iterative solver.
///
/// `btol` bounds the relative residual of the estimate (compatible-system
/// test); `atol` bounds the relative normal-equation residual
/// (least-squares test).
#[derive(Debug, Clone)]
pub struct SolverOptions {
    pub iter_lim: usize,
    pub atol: f64,
    pub btol: f64,
}

impl Default for SolverOptions {
    fn default() -> Self {
        SolverOptions {
            iter_lim: 1000,
            atol: 1e-6,
            btol: 1e-6,
        }
    }
}

/// How the solver terminated. Non-convergence is a reportable outcome, not
/// an error; the best available solution is still returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveStatus {
    /// The right-hand side was zero; x = 0 is the exact solution.
    ZeroRhs,
    /// A x = b is satisfied within `btol`.
    Exact,
    /// The normal-equation residual is within `atol`; x is a least-squares
    /// solution of an incompatible (or rank-deficient) system.
    LeastSquares,
    /// The iteration cap was reached before either tolerance was met.
    IterationLimit,
}

impl std::fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let msg = match self {
            SolveStatus::ZeroRhs => "right-hand side is zero; solution is zero",
            SolveStatus::Exact => "exact solution found",
            SolveStatus::LeastSquares => "approximate least-squares solution found",
            SolveStatus::IterationLimit => "iteration limit reached",
        };
        write!(f, "{}", msg)
    }
}

#[derive(Debug, Clone)]
pub struct LsqrSolution {
    pub x: DVector<f64>,
    pub status: SolveStatus,
    pub iterations: usize,
    /// ||b - A x|| at termination.
    pub residual_norm: f64,
    /// ||A^T (b - A x)|| at termination.
    pub normal_residual_norm: f64,
}

/// LSQR (Paige-Saunders) for `A x = b` in the least-squares sense, suitable
/// for rank-deficient or ill-conditioned systems. Bidiagonalizes A and
/// applies Givens rotations; mathematically equivalent to conjugate
/// gradients on the normal equations but numerically better behaved.
pub fn lsqr(a: &DMatrix<f64>, b: &DVector<f64>, opts: &SolverOptions) -> LsqrSolution {
    let n = a.ncols();
    let mut x = DVector::<f64>::zeros(n);

    let bnorm = b.norm();
    if bnorm == 0.0 {
        return LsqrSolution {
            x,
            status: SolveStatus::ZeroRhs,
            iterations: 0,
            residual_norm: 0.0,
            normal_residual_norm: 0.0,
        };
    }

    let mut u = b / bnorm;
    let beta0 = bnorm;
    let mut v = a.transpose() * &u;
    let mut alpha = v.norm();
    if alpha == 0.0 {
        // b is orthogonal to the range of A; x = 0 already minimizes.
        return LsqrSolution {
            x,
            status: SolveStatus::LeastSquares,
            iterations: 0,
            residual_norm: bnorm,
            normal_residual_norm: 0.0,
        };
    }
    v /= alpha;

    let mut w = v.clone();
    let mut rhobar = alpha;
    let mut phibar = beta0;
    let mut anorm_sq = 0.0f64;
    let mut rnorm = beta0;
    let mut arnorm = alpha * beta0;

    let mut status = SolveStatus::IterationLimit;
    let mut iterations = opts.iter_lim;

    for itn in 1..=opts.iter_lim {
        // Next step of the Golub-Kahan bidiagonalization.
        u = a * &v - &u * alpha;
        let beta = u.norm();
        if beta > 0.0 {
            u /= beta;
        }
        anorm_sq += alpha * alpha + beta * beta;

        v = a.transpose() * &u - &v * beta;
        alpha = v.norm();
        if alpha > 0.0 {
            v /= alpha;
        }

        // Rotate the lower-bidiagonal structure away.
        let rho = rhobar.hypot(beta);
        let c = rhobar / rho;
        let s = beta / rho;
        let theta = s * alpha;
        rhobar = -c * alpha;
        let phi = c * phibar;
        phibar *= s;

        x += &w * (phi / rho);
        w = &v - &w * (theta / rho);

        rnorm = phibar;
        arnorm = alpha * (c * phibar).abs();

        let anorm = anorm_sq.sqrt();
        let xnorm = x.norm();
        let test_normal = if anorm > 0.0 && rnorm > 0.0 {
            arnorm / (anorm * rnorm)
        } else {
            0.0
        };
        let test_residual = rnorm / bnorm;

        let mut stop = None;
        if test_normal <= opts.atol {
            stop = Some(SolveStatus::LeastSquares);
        }
        if test_residual <= opts.btol + opts.atol * anorm * xnorm / bnorm {
            stop = Some(SolveStatus::Exact);
        }
        if let Some(s) = stop {
            status = s;
            iterations = itn;
            break;
        }
    }

    LsqrSolution {
        x,
        status,
        iterations,
        residual_norm: rnorm,
        normal_residual_norm: arnorm,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_system_is_solved_exactly() {
        let a = DMatrix::<f64>::identity(4, 4);
        let b = DVector::from_vec(vec![1.0, -2.0, 0.5, 3.0]);
        let sol = lsqr(&a, &b, &SolverOptions::default());
        assert_eq!(sol.status, SolveStatus::Exact);
        assert!((sol.x - b).norm() < 1e-10);
    }

    #[test]
    fn singular_system_reports_least_squares() {
        let a = DMatrix::from_row_slice(2, 2, &[1.0, 0.0, 0.0, 0.0]);
        let b = DVector::from_vec(vec![1.0, 1.0]);
        let sol = lsqr(&a, &b, &SolverOptions::default());
        assert!(matches!(
            sol.status,
            SolveStatus::LeastSquares | SolveStatus::IterationLimit
        ));
        assert!((sol.x[0] - 1.0).abs() < 1e-8);
        assert!((sol.residual_norm - 1.0).abs() < 1e-8);
    }

    #[test]
    fn overdetermined_consistent_system_recovers_the_solution() {
        // Three equations, two unknowns, consistent by construction.
        let a = DMatrix::from_row_slice(3, 2, &[1.0, 1.0, 1.0, -1.0, 2.0, 1.0]);
        let x_true = DVector::from_vec(vec![0.7, -1.2]);
        let b = &a * &x_true;
        let sol = lsqr(&a, &b, &SolverOptions::default());
        assert_eq!(sol.status, SolveStatus::Exact);
        assert!((sol.x - x_true).norm() < 1e-8);
    }

    #[test]
    fn inconsistent_system_minimizes_the_residual() {
        let a = DMatrix::from_row_slice(3, 1, &[1.0, 1.0, 1.0]);
        let b = DVector::from_vec(vec![0.0, 1.0, 2.0]);
        let sol = lsqr(&a, &b, &SolverOptions::default());
        assert_eq!(sol.status, SolveStatus::LeastSquares);
        assert!((sol.x[0] - 1.0).abs() < 1e-8);
    }

    #[test]
    fn zero_rhs_short_circuits() {
        let a = DMatrix::<f64>::identity(3, 3);
        let b = DVector::zeros(3);
        let sol = lsqr(&a, &b, &SolverOptions::default());
        assert_eq!(sol.status, SolveStatus::ZeroRhs);
        assert_eq!(sol.x.norm(), 0.0);
    }

    #[test]
    fn iteration_cap_is_honored_and_reported() {
        let a = DMatrix::from_row_slice(3, 3, &[3.0, 1.0, 0.0, 1.0, 2.0, 1.0, 0.0, 1.0, 4.0]);
        let b = DVector::from_vec(vec![1.0, 2.0, 3.0]);
        let tight = SolverOptions {
            iter_lim: 1,
            atol: 1e-14,
            btol: 1e-14,
        };
        let sol = lsqr(&a, &b, &tight);
        assert_eq!(sol.status, SolveStatus::IterationLimit);
        assert_eq!(sol.iterations, 1);
        // The best-effort estimate is still usable downstream.
        assert!(sol.x.norm() > 0.0);
    }
}
