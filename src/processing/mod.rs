//! Sample processing

pub mod heading_filter;

pub use heading_filter::HeadingFilter;
