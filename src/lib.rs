pub mod ab;
pub mod config;
pub mod datalayer;
pub mod delivery;
pub mod encoding;
pub mod referrer;
pub mod session;
pub mod storage;
pub mod tracker;
