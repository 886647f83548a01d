pub mod did;
pub mod fetch;
pub mod metadata;
pub mod muxer;
pub mod payload;
pub mod pipeline;
pub mod poller;
pub mod registry;
pub mod replicate;
pub mod storage;
pub mod tts;

#[cfg(test)]
pub(crate) mod stub_server;
