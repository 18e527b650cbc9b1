pub mod bot;
pub mod config;
pub mod cooldown;
pub mod mailer;
pub mod mastodon;
pub mod openai;
pub mod prompt;
pub mod schedule;
