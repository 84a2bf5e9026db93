// Banter - a roster of AI personas discussing a topic, with the user able to join in
// Library exports

pub mod cli;
pub mod config;
pub mod credentials;
pub mod discussion;
pub mod logging;
pub mod providers;
pub mod storage;
