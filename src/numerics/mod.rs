//! Numerical building blocks: compensated summation, Chebyshev series and
//! the Newhall fitting matrices.
pub mod chebyshev_series;
pub mod double_precision;
pub mod newhall;
