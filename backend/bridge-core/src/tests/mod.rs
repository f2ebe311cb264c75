mod channel;
mod config;
mod engine;
mod fakes;
