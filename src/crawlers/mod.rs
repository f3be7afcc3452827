pub mod fetcher;
pub mod web;
