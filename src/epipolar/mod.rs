pub mod fundamental;
pub mod projection;

pub use fundamental::{
    estimate_fundamental_matrix, solve_fundamental_matrix, FundamentalEstimate,
    MIN_CORRESPONDENCES,
};
pub use projection::{project_epipolar_lines, EpipolarLine};

#[derive(thiserror::Error, Debug)]
pub enum EpipolarError {
    #[error("At least 8 correspondences are required to solve the fundamental matrix, got {got}")]
    InsufficientCorrespondences { got: usize },
    #[error("Correspondence count mismatch: {left} points in the first image, {right} in the second")]
    MismatchedCorrespondenceCount { left: usize, right: usize },
    #[error("Singular value decomposition of the design matrix failed")]
    SvdFailed,
}
