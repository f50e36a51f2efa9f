pub mod gallery;
pub mod panel;
pub mod selector;
pub mod welcome;
