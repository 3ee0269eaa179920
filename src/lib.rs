pub mod calendar;
pub mod discovery;
pub mod exec;
pub mod feed;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod provider;
pub mod transform;
