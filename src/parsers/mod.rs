//! Parsers for the two document formats the pipeline handles.

pub mod html;
pub mod markdown;

#[cfg(test)]
mod tests;
