//! Nodebird backend library.
//!
//! A small social network API: accounts with cookie sessions, posts with
//! images and hashtags, comments, likes, retweets and follows.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod hashtag;
pub mod storage;
pub mod web;
