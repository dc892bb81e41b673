//! HTTP adapter for the remote recommendation service.

pub mod client;

pub use client::{HttpRecommendationClient, HttpRecommendationClientBuilder};
