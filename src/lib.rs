pub mod args;
pub mod build;
pub mod container;
pub mod csv;
pub mod errors;
pub mod git;
pub mod resolver;
pub mod rewrite;
#[cfg(test)]
pub mod test_data;
