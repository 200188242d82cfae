pub mod convert;
pub mod currencies;
pub mod history;
pub mod jobs;
pub mod refresh;
pub mod serve;
pub mod setup;
pub mod ui;
